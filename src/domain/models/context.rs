//! Per-request context handed to every engine operation.

use std::sync::Arc;

use super::config::CourseConfig;

/// Who is acting, and in which course.
///
/// Identity resolution and course loading happen outside the engine; the
/// result is passed in explicitly instead of being read from ambient state.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub actor: String,
    pub course: Arc<CourseConfig>,
}

impl RequestContext {
    pub fn new(actor: impl Into<String>, course: Arc<CourseConfig>) -> Self {
        Self {
            actor: actor.into(),
            course,
        }
    }

    /// Same course, different actor.
    pub fn acting_as(&self, actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            course: Arc::clone(&self.course),
        }
    }

    pub fn wins_required(&self) -> u32 {
        self.course.wins_required
    }
}
