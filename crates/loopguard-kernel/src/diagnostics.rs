//! Render-loop diagnostics
//!
//! Append-only ring buffer of typed diagnostic events, bounded at a fixed
//! capacity with FIFO eviction. A development instrument: recording defaults
//! to debug builds and is a no-op when disabled.

use crate::config::DiagnosticsConfig;
use crate::error::DiagnosticsError;
use crate::types::{
    ComponentId, DiagnosticEvent, DiagnosticExport, DiagnosticKind, DiagnosticsSummary,
};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Bounded diagnostic event buffer shared across the guard stack.
pub struct RenderLoopDiagnostics {
    config: DiagnosticsConfig,
    buffer: Mutex<VecDeque<DiagnosticEvent>>,
}

impl RenderLoopDiagnostics {
    /// Create a diagnostics buffer
    #[must_use]
    pub fn new(config: DiagnosticsConfig) -> Self {
        let capacity = config.capacity;
        Self {
            config,
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Whether recording is active
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Record a raw event. All convenience methods funnel through here.
    pub fn record(
        &self,
        kind: DiagnosticKind,
        component: Option<&ComponentId>,
        payload: serde_json::Value,
    ) {
        if !self.config.enabled {
            return;
        }
        let mut buffer = self.buffer.lock();
        while buffer.len() >= self.config.capacity {
            buffer.pop_front();
        }
        buffer.push_back(DiagnosticEvent {
            kind,
            component: component.cloned(),
            recorded_at: Utc::now(),
            payload,
        });
    }

    /// A guarded update was refused
    pub fn record_blocked_update(&self, component: &ComponentId, state: &str, reason: &str) {
        self.record(
            DiagnosticKind::BlockedUpdate,
            Some(component),
            json!({ "state": state, "reason": reason }),
        );
    }

    /// A guarded update was dropped as a duplicate
    pub fn record_duplicate_update(&self, component: &ComponentId, state: &str) {
        self.record(
            DiagnosticKind::DuplicateUpdate,
            Some(component),
            json!({ "state": state }),
        );
    }

    /// A guarded update was deferred by throttling
    pub fn record_throttled_update(&self, component: &ComponentId, state: &str, delay_ms: u64) {
        self.record(
            DiagnosticKind::ThrottledUpdate,
            Some(component),
            json!({ "state": state, "delay_ms": delay_ms }),
        );
    }

    /// Global emergency mode engaged
    pub fn record_emergency_activated(&self, component: &ComponentId, attempt_count: usize) {
        self.record(
            DiagnosticKind::EmergencyActivated,
            Some(component),
            json!({ "attempt_count": attempt_count }),
        );
    }

    /// Global emergency mode cleared
    pub fn record_emergency_cleared(&self) {
        self.record(DiagnosticKind::EmergencyCleared, None, json!({}));
    }

    /// A component circuit breaker opened
    pub fn record_circuit_opened(&self, component: &ComponentId, reason: &str) {
        self.record(
            DiagnosticKind::CircuitOpened,
            Some(component),
            json!({ "reason": reason }),
        );
    }

    /// A component circuit breaker closed
    pub fn record_circuit_closed(&self, component: &ComponentId, reason: &str) {
        self.record(
            DiagnosticKind::CircuitClosed,
            Some(component),
            json!({ "reason": reason }),
        );
    }

    /// Render-rate stability warning from the lifecycle tracker
    pub fn record_stability_warning(&self, component: &ComponentId, renders_in_window: usize) {
        self.record(
            DiagnosticKind::StabilityWarning,
            Some(component),
            json!({ "renders_in_window": renders_in_window }),
        );
    }

    /// Potential effect loop from the lifecycle tracker
    pub fn record_effect_loop_warning(&self, component: &ComponentId, effects_in_window: usize) {
        self.record(
            DiagnosticKind::EffectLoopWarning,
            Some(component),
            json!({ "effects_in_window": effects_in_window }),
        );
    }

    /// State change storm from the lifecycle tracker
    pub fn record_state_storm(&self, component: &ComponentId, state_changes_in_window: usize) {
        self.record(
            DiagnosticKind::StateStorm,
            Some(component),
            json!({ "state_changes_in_window": state_changes_in_window }),
        );
    }

    /// The underlying setter failed inside a guarded call
    pub fn record_setter_failure(&self, component: &ComponentId, state: &str, error: &str) {
        self.record(
            DiagnosticKind::SetterFailure,
            Some(component),
            json!({ "state": state, "error": error }),
        );
    }

    /// Outcome of an emergency recovery attempt
    pub fn record_recovery_attempt(
        &self,
        component: &ComponentId,
        strategy: &str,
        success: bool,
        message: &str,
    ) {
        self.record(
            DiagnosticKind::RecoveryAttempt,
            Some(component),
            json!({ "strategy": strategy, "success": success, "message": message }),
        );
    }

    /// Copy of the buffered events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.buffer.lock().iter().cloned().collect()
    }

    /// Number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    /// Aggregate the buffer into counts by kind, distinct components per
    /// kind, and the covered time range.
    #[must_use]
    pub fn summary(&self) -> DiagnosticsSummary {
        let buffer = self.buffer.lock();
        let mut counts_by_kind: BTreeMap<String, usize> = BTreeMap::new();
        let mut components_by_kind: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for event in buffer.iter() {
            let label = event.kind.as_str().to_string();
            *counts_by_kind.entry(label.clone()).or_insert(0) += 1;
            if let Some(component) = &event.component {
                components_by_kind
                    .entry(label)
                    .or_default()
                    .insert(component.as_str().to_string());
            }
        }

        DiagnosticsSummary {
            total_events: buffer.len(),
            counts_by_kind,
            components_by_kind,
            first_event_at: buffer.front().map(|e| e.recorded_at),
            last_event_at: buffer.back().map(|e| e.recorded_at),
        }
    }

    /// Serialize buffer plus summary as a JSON string.
    ///
    /// # Errors
    /// Returns [`DiagnosticsError::Serialization`] when encoding fails; the
    /// error is logged and never panics the host.
    pub fn export(&self) -> Result<String, DiagnosticsError> {
        self.export_with(serde_json::to_string)
    }

    /// Pretty-printed variant of [`RenderLoopDiagnostics::export`].
    ///
    /// # Errors
    /// Same as [`RenderLoopDiagnostics::export`].
    pub fn export_pretty(&self) -> Result<String, DiagnosticsError> {
        self.export_with(serde_json::to_string_pretty)
    }

    /// Drop all buffered events.
    pub fn reset(&self) {
        self.buffer.lock().clear();
    }

    fn export_with(
        &self,
        encode: fn(&DiagnosticExport) -> serde_json::Result<String>,
    ) -> Result<String, DiagnosticsError> {
        let export = DiagnosticExport {
            timestamp: Utc::now(),
            events: self.events(),
            summary: self.summary(),
        };
        encode(&export).map_err(|e| {
            tracing::error!(error = %e, "diagnostic export failed");
            DiagnosticsError::from(e)
        })
    }
}

impl std::fmt::Debug for RenderLoopDiagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderLoopDiagnostics")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> RenderLoopDiagnostics {
        RenderLoopDiagnostics::new(DiagnosticsConfig::new().enabled())
    }

    #[test]
    fn record_and_read_back() {
        let diag = enabled();
        let c = ComponentId::new("canvas");

        diag.record_blocked_update(&c, "zoom", "Update rate limit exceeded");
        diag.record_circuit_opened(&c, "runaway");

        let events = diag.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, DiagnosticKind::BlockedUpdate);
        assert_eq!(events[1].kind, DiagnosticKind::CircuitOpened);
    }

    #[test]
    fn ring_buffer_evicts_oldest() {
        let diag = RenderLoopDiagnostics::new(
            DiagnosticsConfig::new().enabled().with_capacity(200),
        );
        for i in 0..201 {
            diag.record(DiagnosticKind::StabilityWarning, None, json!({ "seq": i }));
        }

        let events = diag.events();
        assert_eq!(events.len(), 200);
        assert_eq!(events[0].payload["seq"], 1);
        assert_eq!(events[199].payload["seq"], 200);
    }

    #[test]
    fn disabled_buffer_records_nothing() {
        let diag = RenderLoopDiagnostics::new(DiagnosticsConfig::new().disabled());
        diag.record_emergency_cleared();
        assert!(diag.is_empty());
    }

    #[test]
    fn summary_counts_and_components() {
        let diag = enabled();
        diag.record_circuit_opened(&ComponentId::new("a"), "x");
        diag.record_circuit_opened(&ComponentId::new("b"), "y");
        diag.record_emergency_cleared();

        let summary = diag.summary();
        assert_eq!(summary.total_events, 3);
        assert_eq!(summary.counts_by_kind["circuit-opened"], 2);
        assert_eq!(summary.counts_by_kind["emergency-cleared"], 1);
        let components = &summary.components_by_kind["circuit-opened"];
        assert!(components.contains("a") && components.contains("b"));
        assert!(summary.first_event_at.is_some());
    }

    #[test]
    fn export_round_trips() {
        let diag = enabled();
        diag.record_circuit_opened(&ComponentId::new("canvas"), "runaway");
        diag.record_emergency_cleared();

        let exported = diag.export().unwrap();
        let parsed: DiagnosticExport = serde_json::from_str(&exported).unwrap();
        assert_eq!(parsed.events.len(), diag.events().len());
        assert_eq!(parsed.summary.total_events, diag.len());
    }
}
