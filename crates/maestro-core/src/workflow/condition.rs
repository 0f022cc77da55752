//! Loop continuation conditions.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::outcome::IterationOutcome;
use super::schema::LoopConditionSpec;
use crate::config::EngineConfig;

/// Caller-supplied continuation test: `(iteration, last_iteration) -> keep going`.
pub type LoopPredicate = Arc<dyn Fn(u32, &IterationOutcome) -> bool + Send + Sync>;

/// Decides, after each iteration, whether a loop workflow runs again.
///
/// Whatever the condition says, the engine's safety ceiling still applies.
#[derive(Clone)]
pub enum LoopCondition {
    /// Continue while `iteration < max_iterations`.
    Count { max_iterations: u32 },
    /// Continue while the predicate returns true. Without a predicate the
    /// loop stops after the first iteration.
    Predicate(Option<LoopPredicate>),
    /// Continue while less than `max_duration` has elapsed since the loop
    /// started.
    Time { max_duration: Duration },
}

impl LoopCondition {
    pub fn count(max_iterations: u32) -> Self {
        LoopCondition::Count { max_iterations }
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(u32, &IterationOutcome) -> bool + Send + Sync + 'static,
    {
        LoopCondition::Predicate(Some(Arc::new(f)))
    }

    pub fn time(max_duration: Duration) -> Self {
        LoopCondition::Time { max_duration }
    }

    /// Materialise a serialised condition, filling limits from `config`.
    pub fn from_spec(spec: &LoopConditionSpec, config: &EngineConfig) -> Self {
        match spec {
            LoopConditionSpec::Count { max_iterations } => LoopCondition::Count {
                max_iterations: max_iterations.unwrap_or(config.default_max_iterations),
            },
            LoopConditionSpec::Time { max_duration_ms } => LoopCondition::Time {
                max_duration: Duration::from_millis(
                    max_duration_ms.unwrap_or(config.default_max_duration_ms),
                ),
            },
            LoopConditionSpec::Predicate => LoopCondition::Predicate(None),
        }
    }

    pub fn default_for(config: &EngineConfig) -> Self {
        LoopCondition::Count {
            max_iterations: config.default_max_iterations,
        }
    }

    /// Iterations the condition itself allows, if it counts them.
    pub(crate) fn declared_iterations(&self) -> Option<u32> {
        match self {
            LoopCondition::Count { max_iterations } => Some(*max_iterations),
            _ => None,
        }
    }

    pub(crate) fn should_continue(&self, iteration: u32, last: &IterationOutcome, started: Instant) -> bool {
        match self {
            LoopCondition::Count { max_iterations } => iteration < *max_iterations,
            LoopCondition::Predicate(Some(f)) => f(iteration, last),
            LoopCondition::Predicate(None) => false,
            LoopCondition::Time { max_duration } => started.elapsed() < *max_duration,
        }
    }
}

impl fmt::Debug for LoopCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopCondition::Count { max_iterations } => f
                .debug_struct("Count")
                .field("max_iterations", max_iterations)
                .finish(),
            LoopCondition::Predicate(p) => f
                .debug_tuple("Predicate")
                .field(&p.as_ref().map(|_| "<fn>"))
                .finish(),
            LoopCondition::Time { max_duration } => f
                .debug_struct("Time")
                .field("max_duration", max_duration)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty(iteration: u32) -> IterationOutcome {
        IterationOutcome {
            iteration,
            steps: Vec::new(),
        }
    }

    #[test]
    fn test_count() {
        let cond = LoopCondition::count(3);
        let now = Instant::now();
        assert!(cond.should_continue(1, &empty(1), now));
        assert!(cond.should_continue(2, &empty(2), now));
        assert!(!cond.should_continue(3, &empty(3), now));
    }

    #[test]
    fn test_predicate_without_function_stops() {
        let cond = LoopCondition::Predicate(None);
        assert!(!cond.should_continue(1, &empty(1), Instant::now()));
    }

    #[test]
    fn test_predicate_sees_iteration() {
        let cond = LoopCondition::predicate(|i, last| i < 5 && last.success());
        assert!(cond.should_continue(4, &empty(4), Instant::now()));
        assert!(!cond.should_continue(5, &empty(5), Instant::now()));
    }

    #[test]
    fn test_from_spec_uses_config_defaults() {
        let config = EngineConfig::default();
        match LoopCondition::from_spec(&LoopConditionSpec::Count { max_iterations: None }, &config) {
            LoopCondition::Count { max_iterations } => assert_eq!(max_iterations, 10),
            other => panic!("unexpected condition: {other:?}"),
        }
        match LoopCondition::from_spec(&LoopConditionSpec::Time { max_duration_ms: None }, &config) {
            LoopCondition::Time { max_duration } => {
                assert_eq!(max_duration, Duration::from_millis(60_000))
            }
            other => panic!("unexpected condition: {other:?}"),
        }
    }

    #[test]
    fn test_time_elapsed() {
        let cond = LoopCondition::time(Duration::from_millis(0));
        assert!(!cond.should_continue(1, &empty(1), Instant::now()));
    }
}
