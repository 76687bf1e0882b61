//! Component lifecycle tracker
//!
//! Records mount/unmount/render/effect/state-change events per component and
//! derives rolling metrics. A windowed analysis after each event reports
//! render storms, effect loops, and state storms to diagnostics. This module
//! only observes and reports; it never blocks an update.

use crate::config::LifecyclePolicy;
use crate::diagnostics::RenderLoopDiagnostics;
use crate::types::{ComponentId, ComponentMetrics, LifecycleEvent, LifecycleKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Lifecycle event recorder with rolling per-component metrics.
pub struct ComponentLifecycleTracker {
    policy: LifecyclePolicy,
    diagnostics: Arc<RenderLoopDiagnostics>,
    events: Mutex<Vec<LifecycleEvent>>,
    metrics: Mutex<HashMap<ComponentId, ComponentMetrics>>,
    render_timers: Mutex<HashMap<ComponentId, Instant>>,
}

impl ComponentLifecycleTracker {
    /// Create a tracker that reports warnings into `diagnostics`
    #[must_use]
    pub fn new(policy: LifecyclePolicy, diagnostics: Arc<RenderLoopDiagnostics>) -> Self {
        Self {
            policy,
            diagnostics,
            events: Mutex::new(Vec::new()),
            metrics: Mutex::new(HashMap::new()),
            render_timers: Mutex::new(HashMap::new()),
        }
    }

    /// Record one lifecycle event and run the windowed analysis for its
    /// component.
    pub fn record_event(&self, event: LifecycleEvent) {
        self.update_metrics(&event);

        {
            let mut events = self.events.lock();
            events.push(event.clone());
            if events.len() > self.policy.max_events {
                // Halve on overflow: drop the oldest half.
                let drop_count = events.len() / 2;
                events.drain(..drop_count);
            }
        }

        self.analyze_component(&event.component);
    }

    /// Begin timing a render for `component`.
    pub fn start_render_timing(&self, component: &ComponentId) {
        self.render_timers
            .lock()
            .insert(component.clone(), Instant::now());
    }

    /// Finish timing a render, record a render event carrying the measured
    /// duration, and return it. Returns `None` when no timing was started.
    pub fn end_render_timing(&self, component: &ComponentId) -> Option<Duration> {
        let started = self.render_timers.lock().remove(component)?;
        let duration = started.elapsed();
        self.record_event(LifecycleEvent::render(component.clone(), Some(duration)));
        Some(duration)
    }

    /// Events for `component` within the trailing `window`.
    #[must_use]
    pub fn recent_events(&self, component: &ComponentId, window: Duration) -> Vec<LifecycleEvent> {
        let now = Instant::now();
        self.events
            .lock()
            .iter()
            .filter(|e| e.component == *component && now.duration_since(e.timestamp) <= window)
            .cloned()
            .collect()
    }

    /// Rolling metrics for `component`, if any events were recorded.
    #[must_use]
    pub fn component_metrics(&self, component: &ComponentId) -> Option<ComponentMetrics> {
        self.metrics.lock().get(component).cloned()
    }

    /// Total buffered events (all components).
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }

    /// Tracker policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    /// Drop all events, metrics, and in-flight timings.
    pub fn reset(&self) {
        self.events.lock().clear();
        self.metrics.lock().clear();
        self.render_timers.lock().clear();
    }

    fn update_metrics(&self, event: &LifecycleEvent) {
        let mut metrics = self.metrics.lock();
        let m = metrics.entry(event.component.clone()).or_default();
        match &event.kind {
            LifecycleKind::Mount => m.mounts += 1,
            LifecycleKind::Unmount => m.unmounts += 1,
            LifecycleKind::Update => m.updates += 1,
            LifecycleKind::Render { duration } => {
                m.render_count += 1;
                if let Some(duration) = duration {
                    let ms = duration.as_secs_f64() * 1000.0;
                    m.timed_renders += 1;
                    // Incremental mean keeps this O(1) per event.
                    m.avg_render_ms += (ms - m.avg_render_ms) / m.timed_renders as f64;
                    if ms > m.max_render_ms {
                        m.max_render_ms = ms;
                    }
                }
            }
            LifecycleKind::Effect { .. } => m.effects += 1,
            LifecycleKind::StateChange { .. } => m.state_changes += 1,
        }
    }

    fn analyze_component(&self, component: &ComponentId) {
        let now = Instant::now();
        let window = self.policy.analysis_window;

        let (renders, effects, state_changes) = {
            let events = self.events.lock();
            let mut renders = 0usize;
            let mut effects = 0usize;
            let mut state_changes = 0usize;
            // Events are appended in time order; walk back until the window
            // is exhausted.
            for event in events.iter().rev() {
                if now.duration_since(event.timestamp) > window {
                    break;
                }
                if event.component != *component {
                    continue;
                }
                match event.kind {
                    LifecycleKind::Render { .. } => renders += 1,
                    LifecycleKind::Effect { .. } => effects += 1,
                    LifecycleKind::StateChange { .. } => state_changes += 1,
                    _ => {}
                }
            }
            (renders, effects, state_changes)
        };

        if renders > self.policy.render_warning_threshold {
            tracing::warn!(component = %component, renders, "render rate stability warning");
            self.diagnostics.record_stability_warning(component, renders);
        }
        if effects > self.policy.effect_warning_threshold {
            tracing::warn!(component = %component, effects, "potential effect loop");
            self.diagnostics
                .record_effect_loop_warning(component, effects);
        }
        if state_changes > self.policy.state_change_warning_threshold {
            tracing::warn!(component = %component, state_changes, "state change storm");
            self.diagnostics
                .record_state_storm(component, state_changes);
        }
    }
}

impl std::fmt::Debug for ComponentLifecycleTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentLifecycleTracker")
            .field("policy", &self.policy)
            .field("event_count", &self.event_count())
            .finish_non_exhaustive()
    }
}
