//! Recovery signals
//!
//! Typed broadcast channel the host subscribes to for recovery actions it
//! must carry out: disabling a component, restoring state, remounting, or
//! reloading. Publishing never fails; a signal with no subscribers is simply
//! dropped.

use loopguard_kernel::types::ComponentId;
use tokio::sync::broadcast;

/// An action the host should apply in response to recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverySignal {
    /// Stop rendering `component` until restored
    ComponentDisabled { component: ComponentId },
    /// `component` may render again
    ComponentRestored { component: ComponentId },
    /// Replace `component`'s state with the stored snapshot
    StateRestored { component: ComponentId },
    /// Unmount `component` ahead of a remount
    UnmountRequested { component: ComponentId },
    /// Remount `component` after the cooldown
    RemountRequested { component: ComponentId },
    /// Reload the whole surface; recovery context is persisted first
    ReloadRequested,
}

/// Broadcast bus for [`RecoverySignal`]s.
#[derive(Debug)]
pub struct SignalBus {
    sender: broadcast::Sender<RecoverySignal>,
}

impl SignalBus {
    /// Create a bus buffering up to `capacity` undelivered signals per
    /// subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all future signals.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RecoverySignal> {
        self.sender.subscribe()
    }

    /// Publish a signal to every subscriber.
    pub fn publish(&self, signal: RecoverySignal) {
        tracing::debug!(?signal, "recovery signal published");
        // No subscribers is not an error.
        let _ = self.sender.send(signal);
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_signals() {
        let bus = SignalBus::default();
        let mut rx = bus.subscribe();

        bus.publish(RecoverySignal::ReloadRequested);
        assert_eq!(rx.recv().await.unwrap(), RecoverySignal::ReloadRequested);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_noop() {
        let bus = SignalBus::default();
        bus.publish(RecoverySignal::ComponentDisabled {
            component: ComponentId::new("canvas"),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_signal() {
        let bus = SignalBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let signal = RecoverySignal::ComponentRestored {
            component: ComponentId::new("canvas"),
        };
        bus.publish(signal.clone());

        assert_eq!(a.recv().await.unwrap(), signal);
        assert_eq!(b.recv().await.unwrap(), signal);
    }
}
