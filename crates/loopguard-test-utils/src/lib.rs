//! Testing utilities for the loopguard workspace
//!
//! Shared fixtures: runtimes with tight thresholds, storm drivers, and
//! recovery contexts.

#![allow(missing_docs)]

use loopguard_kernel::config::{
    DetectorConfig, DiagnosticsConfig, GuardConfig, GuardOptions, MonitorConfig,
};
use loopguard_kernel::guard::GuardedSetter;
use loopguard_kernel::runtime::GuardRuntime;
use loopguard_kernel::types::{ComponentId, LifecycleEvent};
use loopguard_recovery::{RecoveryContext, RecoveryEnv};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A runtime with small budgets so tests trip guards quickly, and
/// diagnostics enabled regardless of build profile.
pub fn tight_runtime() -> GuardRuntime {
    GuardRuntime::new(
        GuardConfig::new()
            .with_monitor(
                MonitorConfig::new()
                    .with_max_updates_per_component(5)
                    .with_max_updates_per_second(100_000)
                    .with_emergency_cooldown(Duration::from_secs(2)),
            )
            .with_detector(
                DetectorConfig::new()
                    .with_warning_threshold(4)
                    .with_error_threshold(6),
            )
            .with_diagnostics(DiagnosticsConfig::new().enabled()),
    )
}

/// Guard options with dedup and throttling off, for deterministic
/// apply-or-block outcomes.
pub fn plain_options(component: &str, state: &str) -> GuardOptions {
    GuardOptions::new(component, state)
        .with_deduplication(false)
        .with_throttling(false)
}

/// A guarded setter that counts applied values.
pub fn counting_setter(
    runtime: &GuardRuntime,
    options: GuardOptions,
) -> (GuardedSetter<u64>, Arc<AtomicU64>) {
    let applied = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&applied);
    let setter = runtime.guarded_setter(
        move |_value: u64| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        options,
    );
    (setter, applied)
}

/// Drive `attempts` updates through a fresh setter for `component`.
pub fn drive_storm(runtime: &GuardRuntime, component: &str, attempts: u64) -> Arc<AtomicU64> {
    let (setter, applied) = counting_setter(runtime, plain_options(component, "value"));
    for i in 0..attempts {
        setter.set(i);
    }
    applied
}

/// Record `count` render events for `component`.
pub fn drive_renders(runtime: &GuardRuntime, component: &str, count: usize) {
    let id = ComponentId::new(component);
    for _ in 0..count {
        runtime
            .lifecycle()
            .record_event(LifecycleEvent::render(id.clone(), None));
    }
}

/// A single-component recovery context.
pub fn context_for(component: &str, error_count: u32) -> RecoveryContext {
    RecoveryContext::new(ComponentId::new(component), "render-loop", error_count)
}

/// A fresh recovery environment with default timing.
pub fn recovery_env() -> Arc<RecoveryEnv> {
    Arc::new(RecoveryEnv::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn tight_runtime_trips_fast() {
        let rt = tight_runtime();
        let applied = drive_storm(&rt, "canvas", 12);

        assert_eq!(applied.load(Ordering::SeqCst), 5);
        assert!(rt.monitor().is_emergency_mode());
    }

    #[tokio::test(start_paused = true)]
    async fn drive_renders_feeds_the_lifecycle_tracker() {
        let rt = tight_runtime();
        drive_renders(&rt, "canvas", 3);
        assert_eq!(rt.lifecycle().event_count(), 3);
    }
}
