//! Recovery strategies
//!
//! Each strategy is one escalation level. [`EmergencyRecovery`] tries them in
//! priority order; a strategy only runs when `can_apply` says the failure
//! shape fits.
//!
//! [`EmergencyRecovery`]: crate::recovery::EmergencyRecovery

use crate::recovery::{RecoveryContext, RecoveryError, RecoveryResult};
use crate::session::{SessionStore, RECOVERY_DATA_KEY};
use crate::signal::{RecoverySignal, SignalBus};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Timing knobs for the built-in strategies.
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Pause between disabling and re-enabling an isolated component
    pub stabilization_delay: Duration,
    /// Pause between the unmount and remount signals
    pub remount_cooldown: Duration,
    /// Pause before a reload is requested, letting state writes settle
    pub reload_delay: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            stabilization_delay: Duration::from_millis(100),
            remount_cooldown: Duration::from_millis(50),
            reload_delay: Duration::from_millis(250),
        }
    }
}

/// Shared environment strategies act against.
#[derive(Debug)]
pub struct RecoveryEnv {
    /// Session-scoped recovery bookkeeping
    pub session: Arc<SessionStore>,
    /// Signal bus toward the host
    pub signals: Arc<SignalBus>,
    /// Strategy timing
    pub config: RecoveryConfig,
}

impl RecoveryEnv {
    /// Create an environment with fresh session and signal bus
    #[must_use]
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            session: Arc::new(SessionStore::new()),
            signals: Arc::new(SignalBus::default()),
            config,
        }
    }
}

impl Default for RecoveryEnv {
    fn default() -> Self {
        Self::new(RecoveryConfig::default())
    }
}

/// One escalation level of the recovery ladder.
#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    /// Strategy name used in results and diagnostics
    fn name(&self) -> &'static str;

    /// Position in the escalation order; lower runs first
    fn priority(&self) -> u8;

    /// Whether this strategy fits the failure described by `ctx`
    fn can_apply(&self, ctx: &RecoveryContext, env: &RecoveryEnv) -> bool;

    /// Execute the strategy.
    async fn execute(
        &self,
        ctx: &RecoveryContext,
        env: &RecoveryEnv,
    ) -> Result<RecoveryResult, RecoveryError>;
}

/// Disable the affected component, let the tree stabilize, re-enable it.
pub struct ComponentIsolation;

#[async_trait]
impl RecoveryStrategy for ComponentIsolation {
    fn name(&self) -> &'static str {
        "component-isolation"
    }

    fn priority(&self) -> u8 {
        1
    }

    fn can_apply(&self, ctx: &RecoveryContext, _env: &RecoveryEnv) -> bool {
        // Isolation only makes sense when the damage is confined.
        ctx.affected_components.len() == 1
    }

    async fn execute(
        &self,
        ctx: &RecoveryContext,
        env: &RecoveryEnv,
    ) -> Result<RecoveryResult, RecoveryError> {
        let component = &ctx.component;
        env.session.disable(component);
        env.signals.publish(RecoverySignal::ComponentDisabled {
            component: component.clone(),
        });

        tokio::time::sleep(env.config.stabilization_delay).await;

        // Re-enable with defaults: any staged restored state is discarded.
        let _ = env.session.take_restored_state(component);
        env.session.enable(component);
        env.signals.publish(RecoverySignal::ComponentRestored {
            component: component.clone(),
        });

        Ok(RecoveryResult::applied(
            self.name(),
            format!("isolated and restored {component}"),
        ))
    }
}

/// Roll the component's state back to the last stored snapshot.
pub struct StateRollback;

#[async_trait]
impl RecoveryStrategy for StateRollback {
    fn name(&self) -> &'static str {
        "state-rollback"
    }

    fn priority(&self) -> u8 {
        2
    }

    fn can_apply(&self, ctx: &RecoveryContext, env: &RecoveryEnv) -> bool {
        env.session.snapshot(&ctx.component).is_some()
    }

    async fn execute(
        &self,
        ctx: &RecoveryContext,
        env: &RecoveryEnv,
    ) -> Result<RecoveryResult, RecoveryError> {
        let component = &ctx.component;
        let snapshot = env
            .session
            .snapshot(component)
            .ok_or_else(|| RecoveryError::MissingSnapshot {
                component: component.clone(),
            })?;

        env.session.store_restored_state(component, snapshot);
        env.signals.publish(RecoverySignal::StateRestored {
            component: component.clone(),
        });

        Ok(RecoveryResult::applied(
            self.name(),
            format!("rolled back state for {component}"),
        ))
    }
}

/// Unmount and remount the component after a cooldown.
pub struct ForceRemount;

#[async_trait]
impl RecoveryStrategy for ForceRemount {
    fn name(&self) -> &'static str {
        "force-remount"
    }

    fn priority(&self) -> u8 {
        3
    }

    fn can_apply(&self, ctx: &RecoveryContext, _env: &RecoveryEnv) -> bool {
        ctx.error_count >= 3
    }

    async fn execute(
        &self,
        ctx: &RecoveryContext,
        env: &RecoveryEnv,
    ) -> Result<RecoveryResult, RecoveryError> {
        let component = &ctx.component;
        env.signals.publish(RecoverySignal::UnmountRequested {
            component: component.clone(),
        });

        tokio::time::sleep(env.config.remount_cooldown).await;

        env.signals.publish(RecoverySignal::RemountRequested {
            component: component.clone(),
        });

        Ok(RecoveryResult::applied(
            self.name(),
            format!("remounted {component}"),
        ))
    }
}

/// Last resort: persist the recovery context and request a full reload.
pub struct PageReload;

#[async_trait]
impl RecoveryStrategy for PageReload {
    fn name(&self) -> &'static str {
        "page-reload"
    }

    fn priority(&self) -> u8 {
        4
    }

    fn can_apply(&self, ctx: &RecoveryContext, _env: &RecoveryEnv) -> bool {
        ctx.error_count >= 5
    }

    async fn execute(
        &self,
        ctx: &RecoveryContext,
        env: &RecoveryEnv,
    ) -> Result<RecoveryResult, RecoveryError> {
        // Persist enough context for the host to resume after reload.
        env.session.store_recovery_data(
            RECOVERY_DATA_KEY,
            json!({
                "component": ctx.component.as_str(),
                "error_type": ctx.error_type,
                "error_count": ctx.error_count,
            }),
        );

        tokio::time::sleep(env.config.reload_delay).await;
        env.signals.publish(RecoverySignal::ReloadRequested);

        Ok(RecoveryResult::applied(self.name(), "reload requested").with_reload())
    }
}

/// The built-in escalation ladder in priority order.
#[must_use]
pub fn default_strategies() -> Vec<Box<dyn RecoveryStrategy>> {
    vec![
        Box::new(ComponentIsolation),
        Box::new(StateRollback),
        Box::new(ForceRemount),
        Box::new(PageReload),
    ]
}
