//! Infinite loop detector
//!
//! Per-component render counting with warning/error thresholds and an
//! independent circuit breaker per component. Breakers are never shared:
//! one runaway subtree must not disable guards elsewhere.

use crate::config::DetectorConfig;
use crate::diagnostics::RenderLoopDiagnostics;
use crate::types::{
    CircuitBreakerState, ComponentId, ComponentReport, RenderAssessment, RenderMetrics,
    RenderRecord,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct RenderState {
    render_count: u64,
    first_render_at: Option<Instant>,
    last_render_at: Option<Instant>,
    last_record: Option<RenderRecord>,
    breaker: CircuitBreakerState,
}

impl RenderState {
    /// Close an expired latch and forget the old render window, so the stale
    /// count cannot re-trip the breaker on the next render.
    fn expire_breaker(&mut self) {
        self.breaker = CircuitBreakerState::closed();
        self.render_count = 0;
        self.first_render_at = None;
        self.last_render_at = None;
        self.last_record = None;
    }
}

/// Render-count tracker with per-component circuit breakers.
pub struct InfiniteLoopDetector {
    config: DetectorConfig,
    components: Mutex<HashMap<ComponentId, RenderState>>,
    diagnostics: Option<Arc<RenderLoopDiagnostics>>,
}

impl InfiniteLoopDetector {
    /// Create a detector
    #[must_use]
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            components: Mutex::new(HashMap::new()),
            diagnostics: None,
        }
    }

    /// Mirror breaker transitions into a diagnostics buffer
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Arc<RenderLoopDiagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Record one render for `component` and assess it.
    ///
    /// Crossing the warning threshold yields [`RenderAssessment::Warning`];
    /// crossing the error threshold opens the component's breaker for the
    /// configured cooldown and yields [`RenderAssessment::CircuitOpen`].
    pub fn record_render(&self, component: &ComponentId) -> RenderAssessment {
        let now = Instant::now();
        let mut components = self.components.lock();
        let state = components.entry(component.clone()).or_default();

        if state.breaker.open && !state.breaker.is_open_at(now) {
            // Cooldown elapsed; this render starts a fresh window.
            state.expire_breaker();
            tracing::debug!(component = %component, "circuit breaker cooldown elapsed");
            if let Some(diag) = &self.diagnostics {
                diag.record_circuit_closed(component, "cooldown elapsed");
            }
        }

        state.render_count += 1;
        let first = *state.first_render_at.get_or_insert(now);
        let since_previous = state.last_render_at.map(|last| now.duration_since(last));
        state.last_render_at = Some(now);
        state.last_record = Some(RenderRecord {
            component: component.clone(),
            timestamp: now,
            render_count: state.render_count,
            since_first_render: now.duration_since(first),
            since_previous_render: since_previous,
        });

        if state.breaker.is_open_at(now) {
            let reason = state
                .breaker
                .reason
                .clone()
                .unwrap_or_else(|| "circuit breaker open".to_string());
            return RenderAssessment::CircuitOpen { reason };
        }

        if state.render_count >= self.config.error_threshold {
            let reason = format!(
                "render count {} reached error threshold {}",
                state.render_count, self.config.error_threshold
            );
            state.breaker =
                CircuitBreakerState::open_until(now + self.config.breaker_cooldown, reason.clone());
            tracing::warn!(component = %component, %reason, "circuit breaker opened");
            if let Some(diag) = &self.diagnostics {
                diag.record_circuit_opened(component, &reason);
            }
            return RenderAssessment::CircuitOpen { reason };
        }

        if state.render_count >= self.config.warning_threshold {
            tracing::warn!(
                component = %component,
                render_count = state.render_count,
                "render count crossed warning threshold"
            );
            return RenderAssessment::Warning {
                render_count: state.render_count,
            };
        }

        RenderAssessment::Normal
    }

    /// Latest aggregated report for `component`, if it has rendered.
    #[must_use]
    pub fn latest_report(&self, component: &ComponentId) -> Option<ComponentReport> {
        let now = Instant::now();
        let components = self.components.lock();
        let state = components.get(component)?;
        Some(ComponentReport {
            metrics: RenderMetrics {
                render_count: state.render_count,
                since_first_render: state.first_render_at.map(|t| now.duration_since(t)),
                since_previous_render: state
                    .last_record
                    .as_ref()
                    .and_then(|r| r.since_previous_render),
            },
            circuit_breaker: state.breaker.clone(),
        })
    }

    /// Whether `component`'s breaker is currently open.
    #[must_use]
    pub fn is_flagged(&self, component: &ComponentId) -> bool {
        let now = Instant::now();
        let mut components = self.components.lock();
        match components.get_mut(component) {
            None => false,
            Some(state) => {
                if state.breaker.open && !state.breaker.is_open_at(now) {
                    state.expire_breaker();
                }
                state.breaker.is_open_at(now)
            }
        }
    }

    /// Open `component`'s breaker until `open_until`.
    pub fn open_breaker(
        &self,
        component: &ComponentId,
        open_until: Instant,
        reason: impl Into<String>,
    ) {
        let reason = reason.into();
        let mut components = self.components.lock();
        let state = components.entry(component.clone()).or_default();
        state.breaker = CircuitBreakerState::open_until(open_until, reason.clone());
        tracing::warn!(component = %component, %reason, "circuit breaker opened explicitly");
        if let Some(diag) = &self.diagnostics {
            diag.record_circuit_opened(component, &reason);
        }
    }

    /// Close `component`'s breaker immediately and unconditionally.
    ///
    /// The render count is reset as well, so re-enabled components start from
    /// defaults instead of tripping on their next render.
    pub fn close_breaker(&self, component: &ComponentId) {
        let mut components = self.components.lock();
        if let Some(state) = components.get_mut(component) {
            state.breaker = CircuitBreakerState::closed();
            state.render_count = 0;
            state.first_render_at = None;
            state.last_render_at = None;
            state.last_record = None;
            tracing::info!(component = %component, "circuit breaker closed");
            if let Some(diag) = &self.diagnostics {
                diag.record_circuit_closed(component, "closed explicitly");
            }
        }
    }

    /// Components whose breaker is currently open.
    #[must_use]
    pub fn flagged_components(&self) -> Vec<ComponentId> {
        let now = Instant::now();
        self.components
            .lock()
            .iter()
            .filter(|(_, state)| state.breaker.is_open_at(now))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Detector configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Drop all per-component state.
    pub fn reset(&self) {
        self.components.lock().clear();
    }
}

impl std::fmt::Debug for InfiniteLoopDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfiniteLoopDetector")
            .field("config", &self.config)
            .field("tracked_components", &self.components.lock().len())
            .finish_non_exhaustive()
    }
}
