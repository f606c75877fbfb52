//! Predicates supplied by the application.

use anyhow::Result;
use std::fmt;

/// A function closure that represents a condition to be checked.
pub type ConditionCheck = Box<dyn FnMut() -> Result<bool> + Send>;

/// A boolean-valued, no-argument predicate.
///
/// Evaluated at most once per tick by whatever owns it. A fallible predicate's error
/// aborts the tick it was evaluated in.
pub struct Condition {
    check: ConditionCheck,
}

impl Condition {
    /// Wraps an infallible predicate.
    pub fn new(mut check: impl FnMut() -> bool + Send + 'static) -> Self {
        Self {
            check: Box::new(move || Ok(check())),
        }
    }

    /// Wraps a predicate that can fail.
    pub fn fallible(check: impl FnMut() -> Result<bool> + Send + 'static) -> Self {
        Self {
            check: Box::new(check),
        }
    }

    /// A predicate with a fixed answer.
    pub fn always(value: bool) -> Self {
        Self::new(move || value)
    }

    pub fn evaluate(&mut self) -> Result<bool> {
        (self.check)()
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_reads_live_state() {
        let mut count = 0;
        let mut condition = Condition::new(move || {
            count += 1;
            count >= 2
        });
        assert!(!condition.evaluate().unwrap());
        assert!(condition.evaluate().unwrap());
    }

    #[test]
    fn test_fallible_condition_propagates() {
        let mut condition = Condition::fallible(|| anyhow::bail!("sensor unplugged"));
        let err = condition.evaluate().unwrap_err();
        assert_eq!(err.to_string(), "sensor unplugged");
    }
}
