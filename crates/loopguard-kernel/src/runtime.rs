//! Guard runtime
//!
//! Composition root wiring the monitor, detector, lifecycle tracker, and
//! diagnostics together. There is no global instance: hosts construct a
//! runtime, share it via `Arc`, and every guarded setter created through it
//! shares the same accounting.

use crate::breaker::EmergencyBreaker;
use crate::config::{GuardConfig, GuardOptions};
use crate::detector::InfiniteLoopDetector;
use crate::diagnostics::RenderLoopDiagnostics;
use crate::error::SetterError;
use crate::guard::GuardedSetter;
use crate::lifecycle::ComponentLifecycleTracker;
use crate::monitor::UpdateDepthMonitor;
use crate::types::ComponentId;
use std::sync::Arc;

/// Shared guard stack for one host application.
#[derive(Debug)]
pub struct GuardRuntime {
    config: GuardConfig,
    monitor: Arc<UpdateDepthMonitor>,
    detector: Arc<InfiniteLoopDetector>,
    lifecycle: Arc<ComponentLifecycleTracker>,
    diagnostics: Arc<RenderLoopDiagnostics>,
}

impl GuardRuntime {
    /// Build a runtime from `config`, wiring diagnostics into every part.
    #[must_use]
    pub fn new(config: GuardConfig) -> Self {
        let diagnostics = Arc::new(RenderLoopDiagnostics::new(config.diagnostics.clone()));
        let monitor = Arc::new(
            UpdateDepthMonitor::new(config.monitor.clone())
                .with_diagnostics(Arc::clone(&diagnostics)),
        );
        let detector = Arc::new(
            InfiniteLoopDetector::new(config.detector.clone())
                .with_diagnostics(Arc::clone(&diagnostics)),
        );
        let lifecycle = Arc::new(ComponentLifecycleTracker::new(
            config.lifecycle.clone(),
            Arc::clone(&diagnostics),
        ));
        Self {
            config,
            monitor,
            detector,
            lifecycle,
            diagnostics,
        }
    }

    /// Wrap `setter` with guard semantics backed by this runtime's
    /// accounting.
    pub fn guarded_setter<T, F>(&self, setter: F, options: GuardOptions) -> GuardedSetter<T>
    where
        T: Clone + PartialEq + Send + 'static,
        F: Fn(T) -> Result<(), SetterError> + Send + Sync + 'static,
    {
        GuardedSetter::new(
            setter,
            options,
            Arc::clone(&self.monitor),
            Arc::clone(&self.detector),
            Arc::clone(&self.diagnostics),
        )
    }

    /// Create a standalone failure breaker for one component's operation.
    ///
    /// Independent of the detector's render breakers.
    #[must_use]
    pub fn emergency_breaker(
        &self,
        component: impl Into<ComponentId>,
        max_failures: u32,
    ) -> EmergencyBreaker {
        EmergencyBreaker::new(component, max_failures)
    }

    /// Update-depth monitor
    #[inline]
    #[must_use]
    pub fn monitor(&self) -> &Arc<UpdateDepthMonitor> {
        &self.monitor
    }

    /// Loop detector
    #[inline]
    #[must_use]
    pub fn detector(&self) -> &Arc<InfiniteLoopDetector> {
        &self.detector
    }

    /// Lifecycle tracker
    #[inline]
    #[must_use]
    pub fn lifecycle(&self) -> &Arc<ComponentLifecycleTracker> {
        &self.lifecycle
    }

    /// Diagnostics buffer
    #[inline]
    #[must_use]
    pub fn diagnostics(&self) -> &Arc<RenderLoopDiagnostics> {
        &self.diagnostics
    }

    /// Runtime configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Reset every part of the stack to its initial state.
    pub fn reset_all(&self) {
        self.monitor.reset();
        self.detector.reset();
        self.lifecycle.reset();
        self.diagnostics.reset();
        tracing::info!("guard runtime reset");
    }
}

impl Default for GuardRuntime {
    fn default() -> Self {
        Self::new(GuardConfig::default())
    }
}
