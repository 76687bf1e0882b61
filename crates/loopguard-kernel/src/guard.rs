//! Guarded state setters
//!
//! Wraps a state-mutation function with emergency gating, rate limiting,
//! deduplication, and throttling. The pipeline per call is strictly ordered:
//!
//! 1. global emergency gate (unless forced)
//! 2. update-depth accounting and rate limit
//! 3. deduplication — before throttling, so identical rapid-fire values
//!    don't consume throttle budget
//! 4. throttling — too-soon updates are deferred, not dropped
//! 5. render accounting in the loop detector
//! 6. the underlying setter, the last and only effectful step
//!
//! Setter failures become a failed [`GuardedUpdateResult`] and never
//! propagate to the caller.

use crate::config::GuardOptions;
use crate::detector::InfiniteLoopDetector;
use crate::diagnostics::RenderLoopDiagnostics;
use crate::error::SetterError;
use crate::monitor::UpdateDepthMonitor;
use crate::types::{ComponentId, GuardedUpdateResult, RenderAssessment};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Reason string for emergency-mode rejections.
pub const REASON_EMERGENCY: &str = "Emergency mode active";
/// Reason string for rate-limit rejections.
pub const REASON_RATE_LIMIT: &str = "Update rate limit exceeded";
/// Reason string for deduplicated updates.
pub const REASON_DUPLICATE: &str = "Duplicate update deduplicated";
/// Reason annotation for deferred (throttled) updates.
pub const REASON_THROTTLED: &str = "scheduled (throttled)";

/// The wrapped state-mutation function.
pub type SetterFn<T> = dyn Fn(T) -> Result<(), SetterError> + Send + Sync;

struct GuardInner<T> {
    options: GuardOptions,
    setter: Box<SetterFn<T>>,
    monitor: Arc<UpdateDepthMonitor>,
    detector: Arc<InfiniteLoopDetector>,
    diagnostics: Arc<RenderLoopDiagnostics>,
    /// Last value actually applied, for deduplication.
    last_applied: Mutex<Option<(T, Instant)>>,
    /// When the setter last ran, for throttling.
    last_invoked_at: Mutex<Option<Instant>>,
    /// In-flight deferred re-invocations.
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl<T> GuardInner<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    fn apply(self: &Arc<Self>, value: T, forced: bool) -> GuardedUpdateResult<T> {
        let component = &self.options.component;
        let state = self.options.state.as_str();

        if self.options.debug_mode {
            tracing::debug!(component = %component, state, forced, "guarded update attempt");
        }

        // 1. Emergency gate: highest precedence, no side effects yet.
        if !forced && self.monitor.is_emergency_mode() {
            self.diagnostics
                .record_blocked_update(component, state, REASON_EMERGENCY);
            return GuardedUpdateResult::blocked(value, REASON_EMERGENCY);
        }

        // 2. Every attempt is recorded; forced updates bypass the verdict
        //    but still count against the window.
        let allowed = self.monitor.record_update(component, Some(state));
        if !allowed && !forced {
            self.diagnostics
                .record_blocked_update(component, state, REASON_RATE_LIMIT);
            return GuardedUpdateResult::blocked(value, REASON_RATE_LIMIT);
        }

        let now = Instant::now();

        // 3. Deduplication.
        if self.options.enable_deduplication && !forced {
            let is_duplicate = {
                let last = self.last_applied.lock();
                last.as_ref().is_some_and(|(prev, at)| {
                    *prev == value && now.duration_since(*at) <= self.options.dedup_window
                })
            };
            if is_duplicate {
                self.diagnostics.record_duplicate_update(component, state);
                return GuardedUpdateResult::blocked(value, REASON_DUPLICATE);
            }
        }

        // 4. Throttling: defer via a cancellable scheduled re-invocation.
        if self.options.enable_throttling && !forced {
            let interval = self.options.throttle_interval();
            let last_invoked = *self.last_invoked_at.lock();
            if let Some(at) = last_invoked {
                let since = now.duration_since(at);
                if since < interval {
                    let delay = interval - since;
                    self.schedule_deferred(value.clone(), delay);
                    self.diagnostics.record_throttled_update(
                        component,
                        state,
                        delay.as_millis() as u64,
                    );
                    return GuardedUpdateResult::scheduled(value, REASON_THROTTLED);
                }
            }
        }

        // 5. Render accounting.
        match self.detector.record_render(component) {
            RenderAssessment::Normal | RenderAssessment::Warning { .. } => {}
            RenderAssessment::CircuitOpen { reason } => {
                if !forced {
                    self.diagnostics
                        .record_blocked_update(component, state, &reason);
                    return GuardedUpdateResult::blocked(
                        value,
                        format!("Circuit breaker open: {reason}"),
                    );
                }
                #[cfg(feature = "strict-debug")]
                panic!("forced update past open circuit breaker for {component}: {reason}");
            }
        }

        // 6. The mutation itself. Dedup and throttle state advance only
        //    once the setter succeeds, so a failed value stays retryable.
        match (self.setter)(value.clone()) {
            Ok(()) => {
                *self.last_invoked_at.lock() = Some(now);
                *self.last_applied.lock() = Some((value.clone(), now));
                GuardedUpdateResult::applied(value)
            }
            Err(e) => {
                tracing::error!(component = %component, state, error = %e, "guarded setter failed");
                self.diagnostics
                    .record_setter_failure(component, state, &e.to_string());
                GuardedUpdateResult::failed(value, format!("setter failed: {e}"))
            }
        }
    }

    fn schedule_deferred(self: &Arc<Self>, value: T, delay: Duration) {
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Full pipeline again: the deferred attempt may itself be
            // throttled and rescheduled until it finds an open slot.
            let result = inner.apply(value.clone(), false);
            if inner.options.debug_mode {
                tracing::debug!(
                    component = %inner.options.component,
                    state = inner.options.state.as_str(),
                    success = result.success,
                    reason = result.reason.as_deref().unwrap_or(""),
                    "deferred update resolved"
                );
            }
            // An update already reported as scheduled must not vanish when
            // the re-entry lands during rate-limit or emergency pressure;
            // it stays deferred until it applies or is cancelled.
            let under_pressure = result.blocked
                && result
                    .reason
                    .as_deref()
                    .is_some_and(|r| r == REASON_RATE_LIMIT || r == REASON_EMERGENCY);
            if under_pressure {
                inner.schedule_deferred(value, inner.options.throttle_interval());
            }
        });

        let mut pending = self.pending.lock();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }
}

/// A state setter wrapped with guard semantics.
///
/// Cloning is cheap and shares the guard state, so a component and its
/// teardown path can hold the same setter.
pub struct GuardedSetter<T> {
    inner: Arc<GuardInner<T>>,
}

impl<T> Clone for GuardedSetter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> GuardedSetter<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    /// Wrap `setter` with guard semantics.
    #[must_use]
    pub fn new<F>(
        setter: F,
        options: GuardOptions,
        monitor: Arc<UpdateDepthMonitor>,
        detector: Arc<InfiniteLoopDetector>,
        diagnostics: Arc<RenderLoopDiagnostics>,
    ) -> Self
    where
        F: Fn(T) -> Result<(), SetterError> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(GuardInner {
                options,
                setter: Box::new(setter),
                monitor,
                detector,
                diagnostics,
                last_applied: Mutex::new(None),
                last_invoked_at: Mutex::new(None),
                pending: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Run the guarded pipeline for `value`.
    pub fn set(&self, value: T) -> GuardedUpdateResult<T> {
        self.inner.apply(value, false)
    }

    /// Run the pipeline bypassing emergency gating and rate-limit verdicts.
    ///
    /// The attempt is still recorded in the monitor and detector.
    pub fn set_forced(&self, value: T) -> GuardedUpdateResult<T> {
        self.inner.apply(value, true)
    }

    /// Abort any scheduled throttled re-invocations.
    ///
    /// Call on component teardown so deferred updates cannot fire against a
    /// torn-down target.
    pub fn cancel_pending(&self) {
        let mut pending = self.inner.pending.lock();
        for handle in pending.drain(..) {
            handle.abort();
        }
    }

    /// Number of deferred re-invocations still in flight.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        let mut pending = self.inner.pending.lock();
        pending.retain(|h| !h.is_finished());
        pending.len()
    }

    /// The component this setter belongs to.
    #[inline]
    #[must_use]
    pub fn component(&self) -> &ComponentId {
        &self.inner.options.component
    }

    /// Guard options for this setter.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &GuardOptions {
        &self.inner.options
    }
}

impl<T> std::fmt::Debug for GuardedSetter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedSetter")
            .field("component", &self.inner.options.component)
            .field("state", &self.inner.options.state)
            .finish_non_exhaustive()
    }
}
