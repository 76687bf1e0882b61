//! Configuration for the guard stack
//!
//! Every policy constant from the monitors lives here; nothing is hard-coded
//! at call sites. All configs are plain structs with `Default` impls and
//! `with_*` builders.

use crate::types::ComponentId;
use std::time::Duration;

/// Update-depth monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Maximum update attempts per component within `time_window`
    pub max_updates_per_component: usize,
    /// Global update budget per second across all components
    pub max_updates_per_second: usize,
    /// Sliding window over which per-component attempts are counted
    pub time_window: Duration,
    /// Multiple of `max_updates_per_component` past which global emergency
    /// mode engages
    pub escalation_multiplier: f64,
    /// How long emergency mode persists after the last escalation-level burst
    pub emergency_cooldown: Duration,
    /// Whether emergency mode auto-clears once the cooldown elapses
    pub enable_auto_recovery: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_updates_per_component: 25,
            max_updates_per_second: 120,
            time_window: Duration::from_secs(1),
            escalation_multiplier: 2.0,
            emergency_cooldown: Duration::from_secs(5),
            enable_auto_recovery: true,
        }
    }
}

impl MonitorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With per-component attempt budget
    #[inline]
    #[must_use]
    pub fn with_max_updates_per_component(mut self, max: usize) -> Self {
        self.max_updates_per_component = max;
        self
    }

    /// With global per-second budget
    #[inline]
    #[must_use]
    pub fn with_max_updates_per_second(mut self, max: usize) -> Self {
        self.max_updates_per_second = max;
        self
    }

    /// With sliding window length
    #[inline]
    #[must_use]
    pub fn with_time_window(mut self, window: Duration) -> Self {
        self.time_window = window;
        self
    }

    /// With emergency cooldown
    #[inline]
    #[must_use]
    pub fn with_emergency_cooldown(mut self, cooldown: Duration) -> Self {
        self.emergency_cooldown = cooldown;
        self
    }

    /// With auto-recovery toggled
    #[inline]
    #[must_use]
    pub fn with_auto_recovery(mut self, enabled: bool) -> Self {
        self.enable_auto_recovery = enabled;
        self
    }

    /// Attempt count past which global emergency mode engages
    #[inline]
    #[must_use]
    pub fn escalation_threshold(&self) -> usize {
        (self.max_updates_per_component as f64 * self.escalation_multiplier).ceil() as usize
    }
}

/// Infinite loop detector configuration.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Render count at which a warning is reported
    pub warning_threshold: u64,
    /// Render count at which the component's breaker opens
    pub error_threshold: u64,
    /// How long an automatically opened breaker stays open
    pub breaker_cooldown: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            warning_threshold: 12,
            error_threshold: 15,
            breaker_cooldown: Duration::from_secs(5),
        }
    }
}

impl DetectorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With warning threshold
    #[inline]
    #[must_use]
    pub fn with_warning_threshold(mut self, threshold: u64) -> Self {
        self.warning_threshold = threshold;
        self
    }

    /// With error threshold
    #[inline]
    #[must_use]
    pub fn with_error_threshold(mut self, threshold: u64) -> Self {
        self.error_threshold = threshold;
        self
    }

    /// With breaker cooldown
    #[inline]
    #[must_use]
    pub fn with_breaker_cooldown(mut self, cooldown: Duration) -> Self {
        self.breaker_cooldown = cooldown;
        self
    }
}

/// Options for one guarded setter.
#[derive(Debug, Clone)]
pub struct GuardOptions {
    /// Component the setter belongs to
    pub component: ComponentId,
    /// Name of the state slot being guarded
    pub state: String,
    /// Per-setter update budget per second, used to derive the throttle
    /// interval
    pub max_updates_per_second: u32,
    /// Drop identical values arriving within `dedup_window`
    pub enable_deduplication: bool,
    /// Defer too-frequent updates instead of applying them immediately
    pub enable_throttling: bool,
    /// Window within which identical values are considered duplicates
    pub dedup_window: Duration,
    /// Log every guarded call at debug level
    pub debug_mode: bool,
}

impl GuardOptions {
    /// Create options for a component/state pair
    #[inline]
    #[must_use]
    pub fn new(component: impl Into<ComponentId>, state: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            state: state.into(),
            max_updates_per_second: 30,
            enable_deduplication: true,
            enable_throttling: true,
            dedup_window: Duration::from_millis(16),
            debug_mode: false,
        }
    }

    /// With per-setter update budget
    #[inline]
    #[must_use]
    pub fn with_max_updates_per_second(mut self, max: u32) -> Self {
        self.max_updates_per_second = max;
        self
    }

    /// With deduplication toggled
    #[inline]
    #[must_use]
    pub fn with_deduplication(mut self, enabled: bool) -> Self {
        self.enable_deduplication = enabled;
        self
    }

    /// With throttling toggled
    #[inline]
    #[must_use]
    pub fn with_throttling(mut self, enabled: bool) -> Self {
        self.enable_throttling = enabled;
        self
    }

    /// With debug logging toggled
    #[inline]
    #[must_use]
    pub fn with_debug_mode(mut self, enabled: bool) -> Self {
        self.debug_mode = enabled;
        self
    }

    /// Minimum interval between applied updates under throttling
    #[inline]
    #[must_use]
    pub fn throttle_interval(&self) -> Duration {
        Duration::from_secs(1) / self.max_updates_per_second.max(1)
    }
}

/// Lifecycle tracker policy.
#[derive(Debug, Clone)]
pub struct LifecyclePolicy {
    /// Event list capacity; the oldest half is dropped on overflow
    pub max_events: usize,
    /// Window the per-event analysis inspects
    pub analysis_window: Duration,
    /// Renders within the window past which a stability warning is reported
    pub render_warning_threshold: usize,
    /// Effects within the window past which an effect-loop warning is reported
    pub effect_warning_threshold: usize,
    /// State changes within the window past which a state storm is reported
    pub state_change_warning_threshold: usize,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            max_events: 1000,
            analysis_window: Duration::from_secs(1),
            render_warning_threshold: 10,
            effect_warning_threshold: 5,
            state_change_warning_threshold: 20,
        }
    }
}

impl LifecyclePolicy {
    /// Create default policy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With event capacity
    #[inline]
    #[must_use]
    pub fn with_max_events(mut self, max: usize) -> Self {
        self.max_events = max;
        self
    }

    /// With analysis window
    #[inline]
    #[must_use]
    pub fn with_analysis_window(mut self, window: Duration) -> Self {
        self.analysis_window = window;
        self
    }
}

/// Diagnostics ring buffer configuration.
#[derive(Debug, Clone)]
pub struct DiagnosticsConfig {
    /// Ring buffer capacity
    pub capacity: usize,
    /// Whether recording is active. Defaults to debug builds only; this is a
    /// development instrument, not a production telemetry pipeline.
    pub enabled: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            capacity: 200,
            enabled: cfg!(debug_assertions),
        }
    }
}

impl DiagnosticsConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With recording enabled regardless of build profile
    #[inline]
    #[must_use]
    pub fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }

    /// With recording disabled
    #[inline]
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// With buffer capacity
    #[inline]
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

/// Aggregate configuration for a [`crate::runtime::GuardRuntime`].
#[derive(Debug, Clone, Default)]
pub struct GuardConfig {
    /// Update-depth monitor settings
    pub monitor: MonitorConfig,
    /// Loop detector settings
    pub detector: DetectorConfig,
    /// Lifecycle tracker policy
    pub lifecycle: LifecyclePolicy,
    /// Diagnostics settings
    pub diagnostics: DiagnosticsConfig,
}

impl GuardConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With monitor settings
    #[inline]
    #[must_use]
    pub fn with_monitor(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = monitor;
        self
    }

    /// With detector settings
    #[inline]
    #[must_use]
    pub fn with_detector(mut self, detector: DetectorConfig) -> Self {
        self.detector = detector;
        self
    }

    /// With lifecycle policy
    #[inline]
    #[must_use]
    pub fn with_lifecycle(mut self, lifecycle: LifecyclePolicy) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// With diagnostics settings
    #[inline]
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: DiagnosticsConfig) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalation_threshold_scales_with_budget() {
        let config = MonitorConfig::new().with_max_updates_per_component(5);
        assert_eq!(config.escalation_threshold(), 10);
    }

    #[test]
    fn throttle_interval_from_budget() {
        let options = GuardOptions::new("canvas", "zoom").with_max_updates_per_second(2);
        assert_eq!(options.throttle_interval(), Duration::from_millis(500));
    }

    #[test]
    fn throttle_interval_survives_zero_budget() {
        let options = GuardOptions::new("canvas", "zoom").with_max_updates_per_second(0);
        assert_eq!(options.throttle_interval(), Duration::from_secs(1));
    }

    #[test]
    fn config_builders() {
        let config = GuardConfig::new()
            .with_monitor(MonitorConfig::new().with_max_updates_per_component(5))
            .with_diagnostics(DiagnosticsConfig::new().enabled());

        assert_eq!(config.monitor.max_updates_per_component, 5);
        assert!(config.diagnostics.enabled);
    }
}
