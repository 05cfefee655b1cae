use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::debug;

use super::RefreshError;

/// The new access token, or why there is none.
pub type RefreshOutcome = std::result::Result<String, RefreshError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshState {
    #[default]
    Idle,
    Refreshing,
}

#[derive(Debug, Default)]
struct Inner {
    state: RefreshState,
    queue: Vec<oneshot::Sender<RefreshOutcome>>,
}

/// Makes sure at most one refresh is in flight, and parks everyone else who needs it.
///
/// State and queue live under one mutex, so moving to `Refreshing` and parking a request are both
/// atomic with respect to settlement.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    inner: Mutex<Inner>,
}

/// The result of [`RefreshCoordinator::begin`].
#[derive(Debug)]
pub enum Ticket {
    /// The caller must perform the refresh and settle it.
    Leader(RefreshLeader),
    /// A refresh is already underway; wait for its outcome.
    Pending(PendingRequest),
}

impl RefreshCoordinator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> RefreshState {
        self.lock().state
    }

    /// Number of requests parked behind the current refresh.
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn begin(self: &Arc<Self>) -> Ticket {
        let mut inner = self.lock();
        match inner.state {
            RefreshState::Idle => {
                inner.state = RefreshState::Refreshing;
                Ticket::Leader(RefreshLeader {
                    coordinator: Arc::clone(self),
                    settled: false,
                })
            }
            RefreshState::Refreshing => {
                let (tx, rx) = oneshot::channel();
                inner.queue.push(tx);
                debug!(position = inner.queue.len(), "parked request behind refresh");
                Ticket::Pending(PendingRequest { rx })
            }
        }
    }

    /// Return to `Idle` and hand `outcome` to every parked request. Returns how many were settled.
    pub fn settle_all(&self, outcome: &RefreshOutcome) -> usize {
        let mut inner = self.lock();
        inner.state = RefreshState::Idle;
        let queue = std::mem::take(&mut inner.queue);
        let settled = queue.len();
        for tx in queue {
            // The waiter may have been cancelled. Nothing to deliver then.
            let _ = tx.send(outcome.clone());
        }
        settled
    }
}

/// Held by the one request performing the refresh. Dropping it unsettled settles with
/// [`RefreshError::Abandoned`].
#[derive(Debug)]
pub struct RefreshLeader {
    coordinator: Arc<RefreshCoordinator>,
    settled: bool,
}

impl RefreshLeader {
    pub fn settle(mut self, outcome: &RefreshOutcome) -> usize {
        self.settled = true;
        self.coordinator.settle_all(outcome)
    }
}

impl Drop for RefreshLeader {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.settle_all(&Err(RefreshError::Abandoned));
        }
    }
}

/// A request parked until the in-flight refresh settles.
#[derive(Debug)]
pub struct PendingRequest {
    rx: oneshot::Receiver<RefreshOutcome>,
}

impl PendingRequest {
    pub async fn wait(self) -> RefreshOutcome {
        self.rx.await.unwrap_or(Err(RefreshError::Abandoned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leader(ticket: Ticket) -> RefreshLeader {
        match ticket {
            Ticket::Leader(leader) => leader,
            Ticket::Pending(_) => panic!("expected to lead the refresh"),
        }
    }

    fn pending(ticket: Ticket) -> PendingRequest {
        match ticket {
            Ticket::Pending(pending) => pending,
            Ticket::Leader(_) => panic!("expected to wait on the refresh"),
        }
    }

    #[tokio::test]
    async fn test_one_leader_and_queue_drains() {
        let coordinator = RefreshCoordinator::new();
        assert_eq!(coordinator.state(), RefreshState::Idle);

        let lead = leader(coordinator.begin());
        assert_eq!(coordinator.state(), RefreshState::Refreshing);
        let waiters: Vec<_> = (0..3).map(|_| pending(coordinator.begin())).collect();
        assert_eq!(coordinator.pending(), 3);

        assert_eq!(lead.settle(&Ok("T2".to_string())), 3);
        assert_eq!(coordinator.state(), RefreshState::Idle);
        assert_eq!(coordinator.pending(), 0);
        for waiter in waiters {
            assert_eq!(waiter.wait().await, Ok("T2".to_string()));
        }

        // A settled coordinator starts a fresh cycle.
        let lead = leader(coordinator.begin());
        assert_eq!(lead.settle(&Err(RefreshError::MissingRefreshToken)), 0);
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter() {
        let coordinator = RefreshCoordinator::new();
        let lead = leader(coordinator.begin());
        let a = pending(coordinator.begin());
        let b = pending(coordinator.begin());
        lead.settle(&Err(RefreshError::Timeout(std::time::Duration::from_secs(1))));
        assert!(matches!(a.wait().await, Err(RefreshError::Timeout(_))));
        assert!(matches!(b.wait().await, Err(RefreshError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_dropped_leader_abandons_queue() {
        let coordinator = RefreshCoordinator::new();
        let lead = leader(coordinator.begin());
        let waiter = pending(coordinator.begin());
        drop(lead);
        assert_eq!(coordinator.state(), RefreshState::Idle);
        assert_eq!(waiter.wait().await, Err(RefreshError::Abandoned));
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_block_settlement() {
        let coordinator = RefreshCoordinator::new();
        let lead = leader(coordinator.begin());
        drop(pending(coordinator.begin()));
        let waiter = pending(coordinator.begin());
        assert_eq!(lead.settle(&Ok("T2".to_string())), 2);
        assert_eq!(waiter.wait().await, Ok("T2".to_string()));
    }

    #[test]
    fn test_coordinators_are_independent() {
        let a = RefreshCoordinator::new();
        let b = RefreshCoordinator::new();
        let _lead_a = leader(a.begin());
        let _lead_b = leader(b.begin());
        assert_eq!(a.pending(), 0);
        assert_eq!(b.pending(), 0);
    }
}
