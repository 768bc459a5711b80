//! Score vectors shared by defy sides and block memberships.

use serde::{Deserialize, Serialize};

/// The 4-tuple `[points, attempts, fails, hints]`.
///
/// Persisted as a plain JSON array in that order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct ScoreVector {
    pub points: u32,
    pub attempts: u32,
    pub fails: u32,
    pub hints: u32,
}

impl ScoreVector {
    pub const fn new(points: u32, attempts: u32, fails: u32, hints: u32) -> Self {
        Self {
            points,
            attempts,
            fails,
            hints,
        }
    }

    pub const fn as_array(&self) -> [u32; 4] {
        [self.points, self.attempts, self.fails, self.hints]
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Add every component of `delta`, points included.
    pub fn accumulate(&mut self, delta: &Self) {
        self.points = self.points.saturating_add(delta.points);
        self.add_counters(delta);
    }

    /// Add attempts, fails and hints only. Points are left untouched.
    pub fn add_counters(&mut self, delta: &Self) {
        self.attempts = self.attempts.saturating_add(delta.attempts);
        self.fails = self.fails.saturating_add(delta.fails);
        self.hints = self.hints.saturating_add(delta.hints);
    }

    pub fn add_points(&mut self, points: u32) {
        self.points = self.points.saturating_add(points);
    }
}

impl From<[u32; 4]> for ScoreVector {
    fn from([points, attempts, fails, hints]: [u32; 4]) -> Self {
        Self::new(points, attempts, fails, hints)
    }
}

impl From<ScoreVector> for [u32; 4] {
    fn from(v: ScoreVector) -> Self {
        v.as_array()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape_is_array() {
        let v = ScoreVector::new(80, 3, 2, 1);
        assert_eq!(serde_json::to_string(&v).unwrap(), "[80,3,2,1]");
        let back: ScoreVector = serde_json::from_str("[10,2,1,0]").unwrap();
        assert_eq!(back, ScoreVector::new(10, 2, 1, 0));
    }

    #[test]
    fn test_add_counters_skips_points() {
        let mut v = ScoreVector::new(5, 1, 0, 0);
        v.add_counters(&ScoreVector::new(50, 2, 1, 3));
        assert_eq!(v, ScoreVector::new(5, 3, 1, 3));

        v.accumulate(&ScoreVector::new(20, 1, 0, 1));
        assert_eq!(v, ScoreVector::new(25, 4, 1, 4));
    }
}
