//! Answered-exercise events coming from the exercise player.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Markers that precede the defy id inside a location token, most encoded first.
const DEFY_LOCATION_MARKERS: [&str; 3] = ["defy%253D", "defy%3D", "defy="];

/// One answered exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEvent {
    /// 1 for a first-try answer.
    pub attempt_number: u32,
    pub hints_used: u32,
    /// Page location the answer was given on; carries the defy id.
    #[serde(default, alias = "locationToken")]
    pub location: Option<String>,
}

impl AnswerEvent {
    pub fn new(attempt_number: u32, hints_used: u32) -> Self {
        Self {
            attempt_number,
            hints_used,
            location: None,
        }
    }

    pub fn from_json(payload: &str) -> DomainResult<Self> {
        let event: Self = serde_json::from_str(payload)?;
        event.validate()?;
        Ok(event)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.attempt_number == 0 {
            return Err(DomainError::ValidationFailed(
                "attemptNumber must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Extract the defy id from the location token.
    ///
    /// The id is whatever follows the last `defy=` marker (in any of its
    /// URL-encoded forms); nothing may come after it.
    pub fn defy_id(&self) -> DomainResult<Uuid> {
        let location = self
            .location
            .as_deref()
            .ok_or_else(|| DomainError::ValidationFailed("answer event has no location".to_string()))?;
        parse_location_token(location)
    }
}

pub fn parse_location_token(location: &str) -> DomainResult<Uuid> {
    let raw = DEFY_LOCATION_MARKERS
        .iter()
        .find_map(|marker| location.rsplit_once(marker).map(|(_, id)| id))
        .ok_or_else(|| {
            DomainError::ValidationFailed(format!("location does not reference a defy: {location}"))
        })?;

    Uuid::parse_str(raw.trim())
        .map_err(|e| DomainError::ValidationFailed(format!("invalid defy id in location: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_with_double_encoded_location() {
        let id = Uuid::new_v4();
        let payload = format!(
            r#"{{"attemptNumber": 2, "hintsUsed": 1, "location": "https://course/arena%3Fdefy%253D{id}"}}"#
        );
        let event = AnswerEvent::from_json(&payload).unwrap();
        assert_eq!(event.attempt_number, 2);
        assert_eq!(event.hints_used, 1);
        assert_eq!(event.defy_id().unwrap(), id);
    }

    #[test]
    fn test_plain_marker() {
        let id = Uuid::new_v4();
        assert_eq!(parse_location_token(&format!("/arena?defy={id}")).unwrap(), id);
    }

    #[test]
    fn test_rejects_bad_events() {
        assert!(AnswerEvent::from_json(r#"{"attemptNumber": 0, "hintsUsed": 0}"#).is_err());
        assert!(AnswerEvent::new(1, 0).defy_id().is_err());
        assert!(parse_location_token("/arena?other=1").is_err());
        assert!(parse_location_token("/arena?defy=not-a-uuid").is_err());
    }
}
