//! Per-operation emergency breaker
//!
//! A small failure counter for wrapping risky operations outside the render
//! path. Independent of the detector's render breakers: tripping one never
//! affects the other.

use crate::types::ComponentId;
use std::sync::atomic::{AtomicU32, Ordering};

/// Counts consecutive failures for one component's operation and refuses
/// execution once the limit is reached. A success resets the count.
#[derive(Debug)]
pub struct EmergencyBreaker {
    component: ComponentId,
    max_failures: u32,
    failures: AtomicU32,
}

impl EmergencyBreaker {
    /// Create a breaker allowing up to `max_failures` consecutive failures
    #[must_use]
    pub fn new(component: impl Into<ComponentId>, max_failures: u32) -> Self {
        Self {
            component: component.into(),
            max_failures,
            failures: AtomicU32::new(0),
        }
    }

    /// Whether the guarded operation may run.
    #[must_use]
    pub fn can_execute(&self) -> bool {
        self.failures.load(Ordering::Acquire) < self.max_failures
    }

    /// Record a failed execution.
    pub fn record_failure(&self) {
        let failures = self.failures.fetch_add(1, Ordering::AcqRel) + 1;
        if failures >= self.max_failures {
            tracing::warn!(
                component = %self.component,
                failures,
                max_failures = self.max_failures,
                "emergency breaker tripped"
            );
        }
    }

    /// Record a successful execution, resetting the failure count.
    pub fn record_success(&self) {
        self.failures.store(0, Ordering::Release);
    }

    /// Whether the failure limit has been reached.
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        !self.can_execute()
    }

    /// Current consecutive failure count.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.failures.load(Ordering::Acquire)
    }

    /// Component this breaker belongs to
    #[inline]
    #[must_use]
    pub fn component(&self) -> &ComponentId {
        &self.component
    }

    /// Reset the breaker to its initial state.
    pub fn reset(&self) {
        self.failures.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_after_max_failures() {
        let breaker = EmergencyBreaker::new("canvas", 3);
        assert!(breaker.can_execute());

        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.can_execute());

        breaker.record_failure();
        assert!(breaker.is_tripped());
        assert!(!breaker.can_execute());
        assert_eq!(breaker.failure_count(), 3);
    }

    #[test]
    fn success_resets_failure_count() {
        let breaker = EmergencyBreaker::new("canvas", 2);
        breaker.record_failure();
        breaker.record_success();

        assert_eq!(breaker.failure_count(), 0);
        breaker.record_failure();
        assert!(breaker.can_execute());
    }

    #[test]
    fn reset_reopens_a_tripped_breaker() {
        let breaker = EmergencyBreaker::new("canvas", 1);
        breaker.record_failure();
        assert!(breaker.is_tripped());

        breaker.reset();
        assert!(breaker.can_execute());
    }
}
