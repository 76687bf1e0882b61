//! Update-depth monitor
//!
//! Counts per-component update attempts in a sliding time window, rejects
//! excessive rates, and escalates sustained bursts into a global emergency
//! mode that gates every guarded setter.

use crate::config::MonitorConfig;
use crate::diagnostics::RenderLoopDiagnostics;
use crate::types::{ComponentId, UpdateRecord};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Sliding-window rate monitor over update attempts.
///
/// Every attempt — accepted or rejected — is recorded; rejection is a
/// judgment over the recorded history, not a gap in it. Per-component
/// histories are pruned lazily on the next write, so memory stays bounded by
/// the window without a background task.
pub struct UpdateDepthMonitor {
    config: MonitorConfig,
    histories: Mutex<HashMap<ComponentId, VecDeque<UpdateRecord>>>,
    global_window: Mutex<VecDeque<Instant>>,
    emergency_until: Mutex<Option<Instant>>,
    diagnostics: Option<Arc<RenderLoopDiagnostics>>,
}

impl UpdateDepthMonitor {
    /// Create a monitor
    #[must_use]
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            histories: Mutex::new(HashMap::new()),
            global_window: Mutex::new(VecDeque::new()),
            emergency_until: Mutex::new(None),
            diagnostics: None,
        }
    }

    /// Mirror emergency transitions into a diagnostics buffer
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Arc<RenderLoopDiagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Record an update attempt for `key`. Returns `true` when the update is
    /// allowed.
    ///
    /// The attempt is rejected when the component's attempt count within the
    /// window exceeds `max_updates_per_component`, or when the global
    /// per-second budget is exhausted. Sustained bursts past the escalation
    /// threshold engage global emergency mode.
    pub fn record_update(&self, key: &ComponentId, tag: Option<&str>) -> bool {
        let now = Instant::now();

        let global_ok = self.record_global(now);

        let count = {
            let mut histories = self.histories.lock();
            let history = histories.entry(key.clone()).or_default();
            Self::prune(history, now, self.config.time_window);
            history.push_back(UpdateRecord {
                timestamp: now,
                tag: tag.map(str::to_string),
            });
            history.len()
        };

        if count > self.config.escalation_threshold() {
            self.engage_emergency(key, count, now);
        }

        let allowed = global_ok && count <= self.config.max_updates_per_component;
        if !allowed {
            tracing::warn!(
                component = %key,
                count,
                window_ms = self.config.time_window.as_millis() as u64,
                "update rate limit exceeded"
            );
        }
        allowed
    }

    /// Whether global emergency mode is active.
    ///
    /// With auto-recovery enabled the flag clears itself once the cooldown
    /// has elapsed since the last escalation-level burst.
    pub fn is_emergency_mode(&self) -> bool {
        let mut slot = self.emergency_until.lock();
        match *slot {
            None => false,
            Some(until) => {
                if self.config.enable_auto_recovery && Instant::now() >= until {
                    *slot = None;
                    tracing::info!("emergency mode cleared after cooldown");
                    if let Some(diag) = &self.diagnostics {
                        diag.record_emergency_cleared();
                    }
                    false
                } else {
                    true
                }
            }
        }
    }

    /// Clear emergency mode unconditionally.
    pub fn clear_emergency(&self) {
        let was_active = self.emergency_until.lock().take().is_some();
        if was_active {
            tracing::info!("emergency mode cleared explicitly");
            if let Some(diag) = &self.diagnostics {
                diag.record_emergency_cleared();
            }
        }
    }

    /// Raw attempt history for `key` (for inspection and tests).
    #[must_use]
    pub fn component_stats(&self, key: &ComponentId) -> Vec<UpdateRecord> {
        self.histories
            .lock()
            .get(key)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of components with a recorded history.
    #[must_use]
    pub fn tracked_components(&self) -> usize {
        self.histories.lock().len()
    }

    /// Monitor configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Drop all histories and clear emergency mode.
    pub fn reset(&self) {
        self.histories.lock().clear();
        self.global_window.lock().clear();
        *self.emergency_until.lock() = None;
    }

    fn record_global(&self, now: Instant) -> bool {
        let mut window = self.global_window.lock();
        Self::prune_instants(&mut window, now, Duration::from_secs(1));
        window.push_back(now);
        window.len() <= self.config.max_updates_per_second
    }

    fn engage_emergency(&self, key: &ComponentId, count: usize, now: Instant) {
        let mut slot = self.emergency_until.lock();
        let newly_engaged = slot.is_none();
        // Each escalation-level burst extends the deadline.
        *slot = Some(now + self.config.emergency_cooldown);
        drop(slot);

        if newly_engaged {
            tracing::warn!(
                component = %key,
                count,
                threshold = self.config.escalation_threshold(),
                "emergency mode engaged"
            );
            if let Some(diag) = &self.diagnostics {
                diag.record_emergency_activated(key, count);
            }
        }
    }

    fn prune(history: &mut VecDeque<UpdateRecord>, now: Instant, window: Duration) {
        while let Some(front) = history.front() {
            if now.duration_since(front.timestamp) >= window {
                history.pop_front();
            } else {
                break;
            }
        }
    }

    fn prune_instants(window_buf: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(front) = window_buf.front() {
            if now.duration_since(*front) >= window {
                window_buf.pop_front();
            } else {
                break;
            }
        }
    }
}

impl std::fmt::Debug for UpdateDepthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateDepthMonitor")
            .field("config", &self.config)
            .field("tracked_components", &self.histories.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tight_config() -> MonitorConfig {
        MonitorConfig::new()
            .with_max_updates_per_component(5)
            .with_max_updates_per_second(1000)
            .with_time_window(Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn allows_updates_within_budget() {
        let monitor = UpdateDepthMonitor::new(tight_config());
        let key = ComponentId::new("canvas");

        for _ in 0..5 {
            assert!(monitor.record_update(&key, None));
        }
        assert!(!monitor.record_update(&key, None));
    }

    #[tokio::test(start_paused = true)]
    async fn window_expiry_restores_budget() {
        let monitor = UpdateDepthMonitor::new(tight_config());
        let key = ComponentId::new("canvas");

        for _ in 0..5 {
            assert!(monitor.record_update(&key, None));
        }
        assert!(!monitor.record_update(&key, None));

        tokio::time::advance(Duration::from_millis(1100)).await;
        assert!(monitor.record_update(&key, None));
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let monitor = UpdateDepthMonitor::new(tight_config());
        let a = ComponentId::new("a");
        let b = ComponentId::new("b");

        for _ in 0..6 {
            monitor.record_update(&a, None);
        }
        assert!(monitor.record_update(&b, None));
    }

    #[tokio::test(start_paused = true)]
    async fn escalation_engages_emergency_mode() {
        let monitor = UpdateDepthMonitor::new(tight_config());
        let key = ComponentId::new("canvas");

        for _ in 0..12 {
            monitor.record_update(&key, None);
        }
        assert!(monitor.is_emergency_mode());
    }

    #[tokio::test(start_paused = true)]
    async fn emergency_auto_clears_after_cooldown() {
        let config = tight_config().with_emergency_cooldown(Duration::from_secs(2));
        let monitor = UpdateDepthMonitor::new(config);
        let key = ComponentId::new("canvas");

        for _ in 0..12 {
            monitor.record_update(&key, None);
        }
        assert!(monitor.is_emergency_mode());

        tokio::time::advance(Duration::from_millis(2100)).await;
        assert!(!monitor.is_emergency_mode());
    }

    #[tokio::test(start_paused = true)]
    async fn emergency_is_sticky_without_auto_recovery() {
        let config = tight_config()
            .with_emergency_cooldown(Duration::from_millis(100))
            .with_auto_recovery(false);
        let monitor = UpdateDepthMonitor::new(config);
        let key = ComponentId::new("canvas");

        for _ in 0..12 {
            monitor.record_update(&key, None);
        }
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(monitor.is_emergency_mode());

        monitor.clear_emergency();
        assert!(!monitor.is_emergency_mode());
    }

    #[tokio::test(start_paused = true)]
    async fn component_stats_exposes_history_with_tags() {
        let monitor = UpdateDepthMonitor::new(tight_config());
        let key = ComponentId::new("canvas");

        monitor.record_update(&key, Some("zoom"));
        monitor.record_update(&key, None);

        let stats = monitor.component_stats(&key);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].tag.as_deref(), Some("zoom"));
        assert_eq!(stats[1].tag, None);
    }

    #[tokio::test(start_paused = true)]
    async fn global_per_second_budget_applies_across_keys() {
        let config = MonitorConfig::new()
            .with_max_updates_per_component(1000)
            .with_max_updates_per_second(3);
        let monitor = UpdateDepthMonitor::new(config);

        assert!(monitor.record_update(&ComponentId::new("a"), None));
        assert!(monitor.record_update(&ComponentId::new("b"), None));
        assert!(monitor.record_update(&ComponentId::new("c"), None));
        assert!(!monitor.record_update(&ComponentId::new("d"), None));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_clears_everything() {
        let monitor = UpdateDepthMonitor::new(tight_config());
        let key = ComponentId::new("canvas");

        for _ in 0..12 {
            monitor.record_update(&key, None);
        }
        monitor.reset();

        assert!(!monitor.is_emergency_mode());
        assert!(monitor.component_stats(&key).is_empty());
        assert!(monitor.record_update(&key, None));
    }
}
