//! Single-shot cancellation shared by both loops and the coordinator.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// What tore the daemon down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Interrupt,
    ProducerFailed,
    ConsumerFailed,
    SignalFailed,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Interrupt => write!(f, "interrupt"),
            CancelReason::ProducerFailed => write!(f, "producer failed"),
            CancelReason::ConsumerFailed => write!(f, "consumer failed"),
            CancelReason::SignalFailed => write!(f, "signal handler failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    Cancelled(CancelReason),
}

/// `Running -> Cancelled`, once. Clones share the same state.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: Arc<watch::Sender<LifecycleState>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Running);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.state(), LifecycleState::Cancelled(_))
    }

    /// First caller wins; later calls leave the recorded reason untouched.
    /// Returns whether this call performed the transition.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        let transitioned = self.state.send_if_modified(|state| match state {
            LifecycleState::Running => {
                *state = LifecycleState::Cancelled(reason);
                true
            }
            LifecycleState::Cancelled(_) => false,
        });
        if transitioned {
            tracing::info!(reason = %reason, "daemon lifecycle cancelled");
        }
        transitioned
    }

    /// Resolves once cancelled, with the reason.
    pub async fn cancelled(&self) -> CancelReason {
        let mut rx = self.state.subscribe();
        loop {
            if let LifecycleState::Cancelled(reason) = *rx.borrow_and_update() {
                return reason;
            }
            // The sender lives as long as `self`, so this only waits.
            if rx.changed().await.is_err() {
                return CancelReason::Interrupt;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn starts_running() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), LifecycleState::Running);
        assert!(!lifecycle.is_cancelled());
    }

    #[test]
    fn first_cancel_wins_and_never_reverts() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.cancel(CancelReason::ProducerFailed));
        assert!(!lifecycle.cancel(CancelReason::Interrupt));
        assert_eq!(
            lifecycle.state(),
            LifecycleState::Cancelled(CancelReason::ProducerFailed)
        );
    }

    #[tokio::test]
    async fn clones_observe_cancellation() {
        let lifecycle = Lifecycle::new();
        let observer = lifecycle.clone();
        let waiter = tokio::spawn(async move { observer.cancelled().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        lifecycle.cancel(CancelReason::ConsumerFailed);

        let reason = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter resolves")
            .expect("join");
        assert_eq!(reason, CancelReason::ConsumerFailed);
    }

    #[test]
    fn cancelled_stays_pending_while_running() {
        use tokio_test::{assert_pending, assert_ready_eq, task};

        let lifecycle = Lifecycle::new();
        let mut waiter = task::spawn(lifecycle.cancelled());
        assert_pending!(waiter.poll());

        lifecycle.cancel(CancelReason::SignalFailed);
        assert!(waiter.is_woken());
        assert_ready_eq!(waiter.poll(), CancelReason::SignalFailed);
    }

    #[tokio::test]
    async fn cancelled_resolves_immediately_when_already_cancelled() {
        let lifecycle = Lifecycle::new();
        lifecycle.cancel(CancelReason::Interrupt);
        assert_eq!(lifecycle.cancelled().await, CancelReason::Interrupt);
    }
}
