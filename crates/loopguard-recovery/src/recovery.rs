//! Emergency recovery orchestrator
//!
//! Walks the strategy ladder for a failing component: the first applicable
//! strategy that succeeds ends the attempt, a failing strategy escalates to
//! the next level, and concurrent attempts are refused while one is in
//! flight.

use crate::strategy::{default_strategies, RecoveryEnv, RecoveryStrategy};
use loopguard_kernel::diagnostics::RenderLoopDiagnostics;
use loopguard_kernel::types::ComponentId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// What failed and how often, handed to [`EmergencyRecovery::attempt_recovery`].
#[derive(Debug, Clone)]
pub struct RecoveryContext {
    /// Component at the center of the failure
    pub component: ComponentId,
    /// Host-defined failure classification
    pub error_type: String,
    /// Consecutive failures observed for this component
    pub error_count: u32,
    /// All components involved; starts with just `component`
    pub affected_components: Vec<ComponentId>,
}

impl RecoveryContext {
    /// Create a context for a single-component failure
    #[must_use]
    pub fn new(
        component: ComponentId,
        error_type: impl Into<String>,
        error_count: u32,
    ) -> Self {
        Self {
            affected_components: vec![component.clone()],
            component,
            error_type: error_type.into(),
            error_count,
        }
    }

    /// With an additional affected component
    #[must_use]
    pub fn with_affected(mut self, component: ComponentId) -> Self {
        self.affected_components.push(component);
        self
    }
}

/// Outcome of one recovery attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryResult {
    /// Whether a strategy completed successfully
    pub success: bool,
    /// Name of the strategy that produced this result
    pub strategy: String,
    /// Human-readable outcome description
    pub message: String,
    /// Whether the host must reload the surface to finish recovery
    pub requires_reload: bool,
}

impl RecoveryResult {
    /// A successful outcome from `strategy`
    #[must_use]
    pub fn applied(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            strategy: strategy.into(),
            message: message.into(),
            requires_reload: false,
        }
    }

    /// A failed outcome from `strategy`
    #[must_use]
    pub fn failed(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            strategy: strategy.into(),
            message: message.into(),
            requires_reload: false,
        }
    }

    /// Mark this result as requiring a reload
    #[must_use]
    pub fn with_reload(mut self) -> Self {
        self.requires_reload = true;
        self
    }
}

/// Recovery failures.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// A strategy started but could not complete
    #[error("strategy {strategy} failed: {message}")]
    StrategyFailed {
        /// Strategy name
        strategy: &'static str,
        /// Failure description
        message: String,
    },
    /// State rollback found no snapshot to restore
    #[error("no snapshot stored for {component}")]
    MissingSnapshot {
        /// Component missing a snapshot
        component: ComponentId,
    },
}

/// Orchestrator over the escalation ladder.
pub struct EmergencyRecovery {
    env: Arc<RecoveryEnv>,
    strategies: Vec<Box<dyn RecoveryStrategy>>,
    in_flight: AtomicBool,
    history: Mutex<Vec<RecoveryResult>>,
    diagnostics: Option<Arc<RenderLoopDiagnostics>>,
}

impl EmergencyRecovery {
    /// Create an orchestrator with the built-in strategy ladder
    #[must_use]
    pub fn new(env: Arc<RecoveryEnv>) -> Self {
        Self::with_strategies(env, default_strategies())
    }

    /// Create an orchestrator with a custom ladder; strategies are sorted by
    /// priority
    #[must_use]
    pub fn with_strategies(
        env: Arc<RecoveryEnv>,
        mut strategies: Vec<Box<dyn RecoveryStrategy>>,
    ) -> Self {
        strategies.sort_by_key(|s| s.priority());
        Self {
            env,
            strategies,
            in_flight: AtomicBool::new(false),
            history: Mutex::new(Vec::new()),
            diagnostics: None,
        }
    }

    /// Mirror attempt outcomes into a diagnostics buffer
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Arc<RenderLoopDiagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Try strategies in escalation order until one succeeds.
    ///
    /// Only one attempt runs at a time; a concurrent call returns a failed
    /// result immediately without touching the history.
    pub async fn attempt_recovery(&self, ctx: &RecoveryContext) -> RecoveryResult {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(component = %ctx.component, "recovery already in progress");
            return RecoveryResult::failed("none", "Recovery already in progress");
        }

        let result = self.run_ladder(ctx).await;
        self.record(ctx, &result);
        self.in_flight.store(false, Ordering::Release);
        result
    }

    /// Whether an attempt is currently in flight.
    #[must_use]
    pub fn is_recovering(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// All recorded attempt outcomes, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<RecoveryResult> {
        self.history.lock().clone()
    }

    /// Shared recovery environment
    #[inline]
    #[must_use]
    pub fn env(&self) -> &Arc<RecoveryEnv> {
        &self.env
    }

    /// Clear the history and in-flight flag.
    pub fn reset(&self) {
        self.history.lock().clear();
        self.in_flight.store(false, Ordering::Release);
    }

    async fn run_ladder(&self, ctx: &RecoveryContext) -> RecoveryResult {
        for strategy in &self.strategies {
            if !strategy.can_apply(ctx, &self.env) {
                continue;
            }
            tracing::info!(
                component = %ctx.component,
                strategy = strategy.name(),
                "attempting recovery strategy"
            );
            match strategy.execute(ctx, &self.env).await {
                Ok(result) if result.success => return result,
                Ok(result) => {
                    // A strategy may report failure as a result instead of an
                    // error; both escalate to the next level.
                    tracing::warn!(
                        component = %ctx.component,
                        strategy = strategy.name(),
                        message = %result.message,
                        "recovery strategy reported failure, escalating"
                    );
                }
                Err(e) => {
                    // Escalate to the next level.
                    tracing::warn!(
                        component = %ctx.component,
                        strategy = strategy.name(),
                        error = %e,
                        "recovery strategy failed, escalating"
                    );
                }
            }
        }

        tracing::error!(component = %ctx.component, "all recovery strategies exhausted");
        RecoveryResult::failed("all-failed", "every applicable strategy failed")
    }

    fn record(&self, ctx: &RecoveryContext, result: &RecoveryResult) {
        self.history.lock().push(result.clone());
        if let Some(diag) = &self.diagnostics {
            diag.record_recovery_attempt(
                &ctx.component,
                &result.strategy,
                result.success,
                &result.message,
            );
        }
    }
}

impl std::fmt::Debug for EmergencyRecovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmergencyRecovery")
            .field("strategies", &self.strategies.len())
            .field("in_flight", &self.is_recovering())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct AlwaysFails;

    #[async_trait]
    impl RecoveryStrategy for AlwaysFails {
        fn name(&self) -> &'static str {
            "always-fails"
        }
        fn priority(&self) -> u8 {
            1
        }
        fn can_apply(&self, _ctx: &RecoveryContext, _env: &RecoveryEnv) -> bool {
            true
        }
        async fn execute(
            &self,
            _ctx: &RecoveryContext,
            _env: &RecoveryEnv,
        ) -> Result<RecoveryResult, RecoveryError> {
            Err(RecoveryError::StrategyFailed {
                strategy: "always-fails",
                message: "nope".to_string(),
            })
        }
    }

    struct FailsSoftly;

    #[async_trait]
    impl RecoveryStrategy for FailsSoftly {
        fn name(&self) -> &'static str {
            "fails-softly"
        }
        fn priority(&self) -> u8 {
            1
        }
        fn can_apply(&self, _ctx: &RecoveryContext, _env: &RecoveryEnv) -> bool {
            true
        }
        async fn execute(
            &self,
            _ctx: &RecoveryContext,
            _env: &RecoveryEnv,
        ) -> Result<RecoveryResult, RecoveryError> {
            Ok(RecoveryResult::failed("fails-softly", "nothing to do"))
        }
    }

    fn ctx(error_count: u32) -> RecoveryContext {
        RecoveryContext::new(ComponentId::new("canvas"), "render-loop", error_count)
    }

    #[tokio::test(start_paused = true)]
    async fn first_applicable_strategy_wins() {
        let recovery = EmergencyRecovery::new(Arc::new(RecoveryEnv::default()));

        let result = recovery.attempt_recovery(&ctx(1)).await;
        assert!(result.success);
        assert_eq!(result.strategy, "component-isolation");
        assert_eq!(recovery.history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_strategy_escalates_to_next() {
        let env = Arc::new(RecoveryEnv::default());
        let recovery = EmergencyRecovery::with_strategies(
            Arc::clone(&env),
            vec![Box::new(AlwaysFails), Box::new(crate::strategy::ForceRemount)],
        );

        let result = recovery.attempt_recovery(&ctx(3)).await;
        assert!(result.success);
        assert_eq!(result.strategy, "force-remount");
    }

    #[tokio::test(start_paused = true)]
    async fn unsuccessful_result_escalates_like_an_error() {
        let env = Arc::new(RecoveryEnv::default());
        let recovery = EmergencyRecovery::with_strategies(
            Arc::clone(&env),
            vec![Box::new(FailsSoftly), Box::new(crate::strategy::ForceRemount)],
        );

        // Only success ends the attempt; Ok-but-failed moves down the ladder.
        let result = recovery.attempt_recovery(&ctx(3)).await;
        assert!(result.success);
        assert_eq!(result.strategy, "force-remount");
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_ladder_reports_all_failed() {
        let recovery = EmergencyRecovery::with_strategies(
            Arc::new(RecoveryEnv::default()),
            vec![Box::new(AlwaysFails)],
        );

        let result = recovery.attempt_recovery(&ctx(1)).await;
        assert!(!result.success);
        assert_eq!(result.strategy, "all-failed");
    }

    #[tokio::test(start_paused = true)]
    async fn multi_component_failure_escalates_past_isolation() {
        let recovery = EmergencyRecovery::new(Arc::new(RecoveryEnv::default()));
        let context = ctx(3).with_affected(ComponentId::new("sidebar"));

        let result = recovery.attempt_recovery(&context).await;
        assert!(result.success);
        assert_eq!(result.strategy, "force-remount");
    }

    #[tokio::test(start_paused = true)]
    async fn reload_is_the_last_resort() {
        let recovery = EmergencyRecovery::new(Arc::new(RecoveryEnv::default()));
        let context = RecoveryContext {
            affected_components: vec![ComponentId::new("canvas"), ComponentId::new("sidebar")],
            ..ctx(5)
        };
        // Two affected components, no snapshot: isolation and rollback don't
        // apply, remount does at error_count >= 3.
        let result = recovery.attempt_recovery(&context).await;
        assert_eq!(result.strategy, "force-remount");

        let recovery = EmergencyRecovery::with_strategies(
            Arc::new(RecoveryEnv::default()),
            vec![Box::new(crate::strategy::PageReload)],
        );
        let result = recovery.attempt_recovery(&ctx(5)).await;
        assert!(result.requires_reload);
        assert_eq!(result.strategy, "page-reload");
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_attempts_are_refused() {
        let recovery = Arc::new(EmergencyRecovery::new(Arc::new(RecoveryEnv::default())));

        let background = {
            let recovery = Arc::clone(&recovery);
            tokio::spawn(async move { recovery.attempt_recovery(&ctx(1)).await })
        };
        // Let the background attempt reach its stabilization sleep.
        tokio::task::yield_now().await;
        assert!(recovery.is_recovering());

        let result = recovery.attempt_recovery(&ctx(1)).await;
        assert!(!result.success);
        assert_eq!(result.strategy, "none");

        let first = background.await.unwrap();
        assert!(first.success);
        // The refused attempt is not part of the history.
        assert_eq!(recovery.history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_clears_history() {
        let recovery = EmergencyRecovery::new(Arc::new(RecoveryEnv::default()));
        recovery.attempt_recovery(&ctx(1)).await;
        assert_eq!(recovery.history().len(), 1);

        recovery.reset();
        assert!(recovery.history().is_empty());
        assert!(!recovery.is_recovering());
    }
}
