//! Render-loop guard kernel
//!
//! Detection and containment of runaway update cycles: a sliding-window
//! update monitor with global emergency mode, per-component render loop
//! detection with circuit breakers, guarded state setters with
//! deduplication and throttling, lifecycle tracking, and a bounded
//! diagnostics buffer. Everything composes through [`runtime::GuardRuntime`];
//! there are no global instances.

pub mod breaker;
pub mod config;
pub mod detector;
pub mod diagnostics;
pub mod error;
pub mod guard;
pub mod lifecycle;
pub mod monitor;
pub mod runtime;
pub mod test_harness;
pub mod types;

pub use breaker::EmergencyBreaker;
pub use config::{
    DetectorConfig, DiagnosticsConfig, GuardConfig, GuardOptions, LifecyclePolicy, MonitorConfig,
};
pub use detector::InfiniteLoopDetector;
pub use diagnostics::RenderLoopDiagnostics;
pub use error::{DiagnosticsError, SetterError};
pub use guard::GuardedSetter;
pub use lifecycle::ComponentLifecycleTracker;
pub use monitor::UpdateDepthMonitor;
pub use runtime::GuardRuntime;
pub use types::*;

/// Re-export test harness for external use
pub use test_harness::{run_simulator, SimulatorConfig, TestHarness};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Whether forced updates past an open circuit breaker panic instead of
/// proceeding silently.
#[must_use]
pub const fn strict_debug() -> bool {
    cfg!(feature = "strict-debug")
}
