//! Core types for the loopguard kernel
//!
//! Defines the fundamental records shared across the guard stack:
//! - Component identity
//! - Update and render records
//! - Circuit breaker state
//! - Guarded update results
//! - Lifecycle and diagnostic events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio::time::Instant;

/// Component identity used as the key for every per-component store.
///
/// Components are identified by the name the UI layer registers them under
/// (e.g. `"design-canvas"`), not by synthetic ids, so diagnostics stay
/// readable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentId(String);

impl ComponentId {
    /// Create a component id
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the underlying name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ComponentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One recorded update attempt (accepted or rejected).
///
/// Owned by [`crate::monitor::UpdateDepthMonitor`]; retained only within the
/// configured time window and pruned lazily on the next write.
#[derive(Debug, Clone)]
pub struct UpdateRecord {
    /// When the attempt was made
    pub timestamp: Instant,
    /// Optional caller-supplied tag (typically the state name)
    pub tag: Option<String>,
}

/// One recorded render, owned by [`crate::detector::InfiniteLoopDetector`].
#[derive(Debug, Clone)]
pub struct RenderRecord {
    /// Component that rendered
    pub component: ComponentId,
    /// When the render was recorded
    pub timestamp: Instant,
    /// Total renders recorded for this component so far
    pub render_count: u64,
    /// Time since the component's first recorded render
    pub since_first_render: Duration,
    /// Time since the previous render, if any
    pub since_previous_render: Option<Duration>,
}

/// Rolling render metrics for one component.
#[derive(Debug, Clone)]
pub struct RenderMetrics {
    /// Total renders recorded
    pub render_count: u64,
    /// Time since the first recorded render
    pub since_first_render: Option<Duration>,
    /// Interval between the two most recent renders
    pub since_previous_render: Option<Duration>,
}

/// Aggregated per-component report from the loop detector.
#[derive(Debug, Clone)]
pub struct ComponentReport {
    /// Rolling render metrics
    pub metrics: RenderMetrics,
    /// Current circuit breaker state
    pub circuit_breaker: CircuitBreakerState,
}

/// Per-component circuit breaker latch.
///
/// Invariant: `open == true` is only meaningful while `now < open_until`;
/// readers must go through [`CircuitBreakerState::is_open_at`], which treats
/// an expired breaker as closed.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerState {
    /// Whether the breaker latch is set
    pub open: bool,
    /// Deadline after which the latch no longer applies
    pub open_until: Option<Instant>,
    /// Why the breaker was opened
    pub reason: Option<String>,
}

impl CircuitBreakerState {
    /// A closed breaker
    #[inline]
    #[must_use]
    pub fn closed() -> Self {
        Self {
            open: false,
            open_until: None,
            reason: None,
        }
    }

    /// A breaker open until `open_until`
    #[inline]
    #[must_use]
    pub fn open_until(open_until: Instant, reason: impl Into<String>) -> Self {
        Self {
            open: true,
            open_until: Some(open_until),
            reason: Some(reason.into()),
        }
    }

    /// Whether the breaker is effectively open at `now`
    #[inline]
    #[must_use]
    pub fn is_open_at(&self, now: Instant) -> bool {
        self.open && self.open_until.is_some_and(|until| now < until)
    }
}

impl Default for CircuitBreakerState {
    fn default() -> Self {
        Self::closed()
    }
}

/// Outcome of a single render recording.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderAssessment {
    /// Render rate is unremarkable
    Normal,
    /// Warning threshold crossed; render is still allowed
    Warning {
        /// Renders recorded so far
        render_count: u64,
    },
    /// The component's circuit breaker is open
    CircuitOpen {
        /// Why the breaker opened
        reason: String,
    },
}

/// Result of one guarded setter call.
///
/// Ephemeral: returned synchronously per call and never persisted. The
/// submitted value always travels back so callers can retry or inspect it.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardedUpdateResult<T> {
    /// Whether the call ended in an applied (or scheduled) mutation
    pub success: bool,
    /// Whether the guard refused the mutation
    pub blocked: bool,
    /// The value that was submitted
    pub value: T,
    /// Why the call was blocked, deferred, or failed
    pub reason: Option<String>,
}

impl<T> GuardedUpdateResult<T> {
    /// The mutation was applied
    #[inline]
    #[must_use]
    pub fn applied(value: T) -> Self {
        Self {
            success: true,
            blocked: false,
            value,
            reason: None,
        }
    }

    /// The mutation was refused before any side effect
    #[inline]
    #[must_use]
    pub fn blocked(value: T, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            blocked: true,
            value,
            reason: Some(reason.into()),
        }
    }

    /// The mutation was deferred; it will be re-attempted later
    #[inline]
    #[must_use]
    pub fn scheduled(value: T, reason: impl Into<String>) -> Self {
        Self {
            success: true,
            blocked: false,
            value,
            reason: Some(reason.into()),
        }
    }

    /// The underlying setter failed
    #[inline]
    #[must_use]
    pub fn failed(value: T, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            blocked: false,
            value,
            reason: Some(reason.into()),
        }
    }
}

/// A component lifecycle event observed by the tracker.
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    /// Component the event belongs to
    pub component: ComponentId,
    /// When the event was recorded
    pub timestamp: Instant,
    /// Event payload
    pub kind: LifecycleKind,
}

impl LifecycleEvent {
    /// Create an event stamped with the current time
    #[inline]
    #[must_use]
    pub fn now(component: impl Into<ComponentId>, kind: LifecycleKind) -> Self {
        Self {
            component: component.into(),
            timestamp: Instant::now(),
            kind,
        }
    }

    /// Mount event
    #[inline]
    #[must_use]
    pub fn mount(component: impl Into<ComponentId>) -> Self {
        Self::now(component, LifecycleKind::Mount)
    }

    /// Unmount event
    #[inline]
    #[must_use]
    pub fn unmount(component: impl Into<ComponentId>) -> Self {
        Self::now(component, LifecycleKind::Unmount)
    }

    /// Render event with an optional measured duration
    #[inline]
    #[must_use]
    pub fn render(component: impl Into<ComponentId>, duration: Option<Duration>) -> Self {
        Self::now(component, LifecycleKind::Render { duration })
    }

    /// Effect event
    #[inline]
    #[must_use]
    pub fn effect(component: impl Into<ComponentId>, effect_name: impl Into<String>) -> Self {
        Self::now(
            component,
            LifecycleKind::Effect {
                effect_name: effect_name.into(),
            },
        )
    }

    /// State change event
    #[inline]
    #[must_use]
    pub fn state_change(component: impl Into<ComponentId>, state_name: impl Into<String>) -> Self {
        Self::now(
            component,
            LifecycleKind::StateChange {
                state_name: state_name.into(),
            },
        )
    }
}

/// Lifecycle event payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleKind {
    /// Component mounted
    Mount,
    /// Component unmounted
    Unmount,
    /// Component received new props/inputs
    Update,
    /// Component rendered
    Render {
        /// Measured render duration, when timing was active
        duration: Option<Duration>,
    },
    /// An effect ran
    Effect {
        /// Effect label
        effect_name: String,
    },
    /// A piece of state changed
    StateChange {
        /// State slot name
        state_name: String,
    },
}

impl LifecycleKind {
    /// Stable label for summaries and logs
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            LifecycleKind::Mount => "mount",
            LifecycleKind::Unmount => "unmount",
            LifecycleKind::Update => "update",
            LifecycleKind::Render { .. } => "render",
            LifecycleKind::Effect { .. } => "effect",
            LifecycleKind::StateChange { .. } => "state-change",
        }
    }
}

/// Rolling per-component metrics derived from lifecycle events.
#[derive(Debug, Clone, Default)]
pub struct ComponentMetrics {
    /// Renders recorded
    pub render_count: u64,
    /// Renders that carried a measured duration
    pub timed_renders: u64,
    /// Running average render time in milliseconds (incremental mean)
    pub avg_render_ms: f64,
    /// Maximum render time in milliseconds
    pub max_render_ms: f64,
    /// Mounts recorded
    pub mounts: u64,
    /// Unmounts recorded
    pub unmounts: u64,
    /// Prop/input updates recorded
    pub updates: u64,
    /// Effects recorded
    pub effects: u64,
    /// State changes recorded
    pub state_changes: u64,
}

/// Classification of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// A guarded update was refused
    BlockedUpdate,
    /// A guarded update was dropped as a duplicate
    DuplicateUpdate,
    /// A guarded update was deferred by throttling
    ThrottledUpdate,
    /// Global emergency mode engaged
    EmergencyActivated,
    /// Global emergency mode cleared
    EmergencyCleared,
    /// A component circuit breaker opened
    CircuitOpened,
    /// A component circuit breaker closed
    CircuitClosed,
    /// Render-rate stability warning
    StabilityWarning,
    /// Potential effect loop
    EffectLoopWarning,
    /// State change storm
    StateStorm,
    /// The underlying setter failed
    SetterFailure,
    /// Outcome of a recovery attempt
    RecoveryAttempt,
}

impl DiagnosticKind {
    /// Stable kebab-case label, matching the serialized form
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::BlockedUpdate => "blocked-update",
            DiagnosticKind::DuplicateUpdate => "duplicate-update",
            DiagnosticKind::ThrottledUpdate => "throttled-update",
            DiagnosticKind::EmergencyActivated => "emergency-activated",
            DiagnosticKind::EmergencyCleared => "emergency-cleared",
            DiagnosticKind::CircuitOpened => "circuit-opened",
            DiagnosticKind::CircuitClosed => "circuit-closed",
            DiagnosticKind::StabilityWarning => "stability-warning",
            DiagnosticKind::EffectLoopWarning => "effect-loop-warning",
            DiagnosticKind::StateStorm => "state-storm",
            DiagnosticKind::SetterFailure => "setter-failure",
            DiagnosticKind::RecoveryAttempt => "recovery-attempt",
        }
    }
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One diagnostic event held in the ring buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    /// Event classification
    pub kind: DiagnosticKind,
    /// Component the event concerns, if any
    pub component: Option<ComponentId>,
    /// Wall-clock time of recording
    pub recorded_at: DateTime<Utc>,
    /// Type-specific payload
    pub payload: serde_json::Value,
}

/// Aggregate view over the diagnostics buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsSummary {
    /// Events currently buffered
    pub total_events: usize,
    /// Event counts keyed by kind label
    pub counts_by_kind: BTreeMap<String, usize>,
    /// Distinct component names per kind label
    pub components_by_kind: BTreeMap<String, BTreeSet<String>>,
    /// Oldest buffered event time
    pub first_event_at: Option<DateTime<Utc>>,
    /// Newest buffered event time
    pub last_event_at: Option<DateTime<Utc>>,
}

/// Serialized diagnostic export: buffer plus summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticExport {
    /// When the export was taken
    pub timestamp: DateTime<Utc>,
    /// Buffered events at export time
    pub events: Vec<DiagnosticEvent>,
    /// Summary over the same events
    pub summary: DiagnosticsSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_id_display() {
        let id = ComponentId::new("design-canvas");
        assert_eq!(id.to_string(), "design-canvas");
        assert_eq!(id.as_str(), "design-canvas");
    }

    #[test]
    fn breaker_closed_by_default() {
        let state = CircuitBreakerState::default();
        assert!(!state.open);
        assert!(!state.is_open_at(Instant::now()));
    }

    #[test]
    fn breaker_open_respects_deadline() {
        let now = Instant::now();
        let state = CircuitBreakerState::open_until(now + Duration::from_secs(5), "runaway");
        assert!(state.is_open_at(now));
        assert!(!state.is_open_at(now + Duration::from_secs(6)));
    }

    #[test]
    fn guarded_result_constructors() {
        let applied = GuardedUpdateResult::applied(1);
        assert!(applied.success && !applied.blocked);

        let blocked = GuardedUpdateResult::blocked(2, "Update rate limit exceeded");
        assert!(!blocked.success && blocked.blocked);
        assert!(blocked.reason.as_deref().unwrap().contains("rate limit"));

        let scheduled = GuardedUpdateResult::scheduled(3, "scheduled (throttled)");
        assert!(scheduled.success && !scheduled.blocked);
    }

    #[test]
    fn lifecycle_kind_labels() {
        assert_eq!(LifecycleKind::Mount.label(), "mount");
        assert_eq!(
            LifecycleKind::StateChange {
                state_name: "zoom".into()
            }
            .label(),
            "state-change"
        );
    }

    #[test]
    fn diagnostic_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&DiagnosticKind::StateStorm).unwrap();
        assert_eq!(json, "\"state-storm\"");
        assert_eq!(DiagnosticKind::StateStorm.as_str(), "state-storm");
    }
}
