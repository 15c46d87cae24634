//! Retry state and backoff for the guarded extraction loop.

use std::time::Duration;

/// Which attempt is next and which model it uses.
///
/// The state only moves forward through [`RetryState::after_failure`], which
/// switches to the fallback model at most once: after the first attempt, and
/// only if the fallback differs from the model that just failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    /// Zero-based index of the next attempt.
    pub attempt: u32,
    /// Model for the next attempt.
    pub current_model: String,
    /// Whether the fallback switch has happened.
    pub switched_to_fallback: bool,
}

impl RetryState {
    /// State before the first attempt.
    #[must_use]
    pub fn new(primary_model: impl Into<String>) -> Self {
        Self {
            attempt: 0,
            current_model: primary_model.into(),
            switched_to_fallback: false,
        }
    }

    /// State after the current attempt failed.
    #[must_use]
    pub fn after_failure(self, fallback_model: &str) -> Self {
        let switch = self.attempt == 0
            && !self.switched_to_fallback
            && self.current_model != fallback_model;

        Self {
            attempt: self.attempt + 1,
            current_model: if switch {
                fallback_model.to_string()
            } else {
                self.current_model
            },
            switched_to_fallback: self.switched_to_fallback || switch,
        }
    }
}

/// Delay before the attempt following `attempt`: `base_ms * 2^attempt`, saturating.
#[must_use]
pub fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor))
}

/// Coarse progress fraction reported before `attempt` of `total`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn attempt_progress(attempt: u32, total: u32) -> f32 {
    0.25 + 0.25 * (attempt as f32 / total.max(1) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switches_to_fallback_once() {
        let state = RetryState::new("primary");
        let state = state.after_failure("fallback");
        assert_eq!(state.attempt, 1);
        assert_eq!(state.current_model, "fallback");
        assert!(state.switched_to_fallback);

        let state = state.after_failure("fallback").after_failure("fallback");
        assert_eq!(state.attempt, 3);
        assert_eq!(state.current_model, "fallback");
    }

    #[test]
    fn test_no_switch_when_primary_is_fallback() {
        let state = RetryState::new("same").after_failure("same");
        assert_eq!(state.current_model, "same");
        assert!(!state.switched_to_fallback);
    }

    #[test]
    fn test_model_changes_at_most_once() {
        let mut state = RetryState::new("primary");
        let mut changes = 0;
        for _ in 0..10 {
            let before = state.current_model.clone();
            state = state.after_failure("fallback");
            if state.current_model != before {
                changes += 1;
            }
        }
        assert_eq!(changes, 1);
    }

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff_delay(1000, 0), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1000, 1), Duration::from_millis(2000));
        assert_eq!(backoff_delay(1000, 3), Duration::from_millis(8000));
        assert_eq!(backoff_delay(0, 5), Duration::ZERO);
    }

    #[test]
    fn test_backoff_saturates() {
        assert_eq!(backoff_delay(10, 200), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_attempt_progress_range() {
        assert!((attempt_progress(0, 3) - 0.25).abs() < f32::EPSILON);
        assert!(attempt_progress(2, 3) < 0.5);
        assert!((attempt_progress(0, 0) - 0.25).abs() < f32::EPSILON);
    }
}
