//! End-to-end pipeline tests through a full `GuardRuntime`.

use loopguard_kernel::config::{
    DetectorConfig, DiagnosticsConfig, GuardConfig, GuardOptions, MonitorConfig,
};
use loopguard_kernel::guard::{GuardedSetter, REASON_EMERGENCY, REASON_RATE_LIMIT};
use loopguard_kernel::runtime::GuardRuntime;
use loopguard_kernel::types::{ComponentId, DiagnosticKind, LifecycleEvent};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn runtime(max_per_component: usize) -> GuardRuntime {
    GuardRuntime::new(
        GuardConfig::new()
            .with_monitor(
                MonitorConfig::new()
                    .with_max_updates_per_component(max_per_component)
                    .with_max_updates_per_second(100_000),
            )
            .with_detector(DetectorConfig::new().with_error_threshold(1_000))
            .with_diagnostics(DiagnosticsConfig::new().enabled()),
    )
}

fn counting_setter(rt: &GuardRuntime, options: GuardOptions) -> (GuardedSetter<u32>, Arc<AtomicU32>) {
    let applied = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&applied);
    let setter = rt.guarded_setter(
        move |_value: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        options,
    );
    (setter, applied)
}

fn plain_options(component: &str) -> GuardOptions {
    GuardOptions::new(component, "value")
        .with_deduplication(false)
        .with_throttling(false)
}

#[tokio::test(start_paused = true)]
async fn storm_is_contained_to_budget() {
    let rt = runtime(5);
    let (setter, applied) = counting_setter(&rt, plain_options("storm"));

    for i in 0..8 {
        setter.set(i);
    }

    assert_eq!(applied.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn budget_restores_after_window() {
    let rt = runtime(5);
    let (setter, applied) = counting_setter(&rt, plain_options("storm"));

    for i in 0..6 {
        setter.set(i);
    }
    assert_eq!(applied.load(Ordering::SeqCst), 5);

    tokio::time::advance(Duration::from_millis(1100)).await;
    assert!(setter.set(100).success);
    assert_eq!(applied.load(Ordering::SeqCst), 6);
}

#[tokio::test(start_paused = true)]
async fn emergency_gates_every_component() {
    let rt = runtime(5);
    let (storm, _) = counting_setter(&rt, plain_options("storm"));
    let (quiet, quiet_applied) = counting_setter(&rt, plain_options("quiet"));

    // Past the escalation threshold (5 * 2.0 = 10).
    for i in 0..11 {
        storm.set(i);
    }
    assert!(rt.monitor().is_emergency_mode());

    let result = quiet.set(1);
    assert!(result.blocked);
    assert_eq!(result.reason.as_deref(), Some(REASON_EMERGENCY));
    assert_eq!(quiet_applied.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn emergency_clears_and_quiet_component_recovers() {
    let rt = runtime(5);
    let (storm, _) = counting_setter(&rt, plain_options("storm"));
    let (quiet, quiet_applied) = counting_setter(&rt, plain_options("quiet"));

    for i in 0..11 {
        storm.set(i);
    }
    assert!(rt.monitor().is_emergency_mode());

    tokio::time::advance(Duration::from_secs(6)).await;
    assert!(!rt.monitor().is_emergency_mode());
    assert!(quiet.set(1).success);
    assert_eq!(quiet_applied.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn quiet_component_is_unaffected_by_a_storm_elsewhere() {
    let rt = runtime(50);
    let (storm, _) = counting_setter(&rt, plain_options("storm"));
    let (quiet, quiet_applied) = counting_setter(&rt, plain_options("quiet"));

    for i in 0..50 {
        storm.set(i);
        if i % 10 == 0 {
            assert!(quiet.set(i).success);
        }
    }
    assert_eq!(quiet_applied.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn open_breaker_blocks_only_its_component() {
    let rt = GuardRuntime::new(
        GuardConfig::new()
            .with_detector(
                DetectorConfig::new()
                    .with_warning_threshold(3)
                    .with_error_threshold(4),
            )
            .with_diagnostics(DiagnosticsConfig::new().enabled()),
    );
    let (hot, hot_applied) = counting_setter(&rt, plain_options("hot"));
    let (cold, cold_applied) = counting_setter(&rt, plain_options("cold"));

    for i in 0..6 {
        hot.set(i);
    }
    // The render crossing the error threshold is itself refused.
    assert!(rt.detector().is_flagged(&ComponentId::new("hot")));
    assert_eq!(hot_applied.load(Ordering::SeqCst), 3);

    assert!(cold.set(1).success);
    assert_eq!(cold_applied.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn blocked_and_lifecycle_events_share_one_diagnostics_buffer() {
    let rt = runtime(1);
    let (setter, _) = counting_setter(&rt, plain_options("canvas"));

    setter.set(1);
    setter.set(2);
    rt.lifecycle()
        .record_event(LifecycleEvent::mount(ComponentId::new("canvas")));

    let events = rt.diagnostics().events();
    assert!(events.iter().any(|e| e.kind == DiagnosticKind::BlockedUpdate));

    let blocked = events
        .iter()
        .find(|e| e.kind == DiagnosticKind::BlockedUpdate)
        .unwrap();
    assert_eq!(blocked.payload["reason"], REASON_RATE_LIMIT);
}

#[tokio::test(start_paused = true)]
async fn throttled_burst_applies_everything_eventually() {
    let rt = runtime(1_000);
    let options = GuardOptions::new("canvas", "zoom")
        .with_deduplication(false)
        .with_max_updates_per_second(5);
    let (setter, applied) = counting_setter(&rt, options);

    for i in 0..5 {
        assert!(setter.set(i).success);
    }
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(applied.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn forced_set_applies_during_emergency() {
    let rt = runtime(2);
    let (setter, applied) = counting_setter(&rt, plain_options("canvas"));

    for i in 0..6 {
        setter.set(i);
    }
    assert!(rt.monitor().is_emergency_mode());

    assert!(setter.set_forced(99).success);
    assert_eq!(applied.load(Ordering::SeqCst), 3);
}
