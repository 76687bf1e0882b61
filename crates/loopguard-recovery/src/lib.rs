//! Escalating recovery for contained render loops
//!
//! When the kernel's guards flag a component as unrecoverable by containment
//! alone, this crate walks an escalation ladder: isolate the component, roll
//! its state back, force a remount, and finally request a reload. Hosts
//! observe recovery through typed [`signal::RecoverySignal`]s and the
//! [`session::SessionStore`] instead of global state.

pub mod recovery;
pub mod session;
pub mod signal;
pub mod strategy;

pub use recovery::{EmergencyRecovery, RecoveryContext, RecoveryError, RecoveryResult};
pub use session::SessionStore;
pub use signal::{RecoverySignal, SignalBus};
pub use strategy::{
    default_strategies, ComponentIsolation, ForceRemount, PageReload, RecoveryConfig, RecoveryEnv,
    RecoveryStrategy, StateRollback,
};
