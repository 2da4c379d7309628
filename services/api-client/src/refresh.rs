//! Single-flight token refresh
//!
//! [`RefreshCoordinator`] makes sure at most one refresh call is in flight.
//! The first request to see a 401 becomes the leader and performs the
//! refresh; every request that sees a 401 while it runs is queued and woken
//! with the leader's outcome once the refresh settles.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};

/// Why a refresh did not produce a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshFailure {
    /// The refresh call failed; the session is gone
    Rejected,
    /// The leader was cancelled before the refresh finished
    Abandoned,
}

/// Outcome handed to queued requests: the new access token or the failure
pub type RefreshOutcome = Result<String, RefreshFailure>;

/// A request waiting for the in-flight refresh
#[derive(Debug)]
struct PendingRequest {
    id: Uuid,
    responder: oneshot::Sender<RefreshOutcome>,
}

#[derive(Debug, Default)]
enum RefreshState {
    #[default]
    Idle,
    Refreshing {
        pending: Vec<PendingRequest>,
    },
}

/// Coordinates token refreshes across concurrent requests
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

/// Result of [`RefreshCoordinator::acquire_or_queue`]
#[derive(Debug)]
pub enum Ticket<'a> {
    /// No refresh was running; the holder must perform it and settle the lease
    Leader(RefreshLease<'a>),
    /// A refresh is running; wait for its outcome
    Queued(QueuedRequest<'a>),
}

impl RefreshCoordinator {
    /// Create a new coordinator in the idle state
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Become the refresh leader, or join the queue of the running refresh
    pub fn acquire_or_queue(&self) -> Ticket<'_> {
        let mut state = self.lock();

        match &mut *state {
            RefreshState::Idle => {
                *state = RefreshState::Refreshing {
                    pending: Vec::new(),
                };
                Ticket::Leader(RefreshLease {
                    coordinator: self,
                    settled: false,
                })
            }
            RefreshState::Refreshing { pending } => {
                let (responder, receiver) = oneshot::channel();
                let id = Uuid::new_v4();
                pending.push(PendingRequest { id, responder });
                debug!("Queued request {} behind in-flight refresh ({} waiting)", id, pending.len());

                Ticket::Queued(QueuedRequest {
                    coordinator: self,
                    id,
                    receiver,
                })
            }
        }
    }

    /// Whether a refresh is in flight
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock(), RefreshState::Refreshing { .. })
    }

    /// Number of requests queued behind the in-flight refresh
    pub fn pending_len(&self) -> usize {
        match &*self.lock() {
            RefreshState::Idle => 0,
            RefreshState::Refreshing { pending } => pending.len(),
        }
    }

    /// Return to idle and hand `outcome` to every queued request.
    ///
    /// Returns the number of requests woken.
    fn settle(&self, outcome: RefreshOutcome) -> usize {
        let pending = match std::mem::take(&mut *self.lock()) {
            RefreshState::Idle => Vec::new(),
            RefreshState::Refreshing { pending } => pending,
        };

        let woken = pending.len();
        for request in pending {
            // The receiver is gone when the waiter was dropped
            let _ = request.responder.send(outcome.clone());
        }

        woken
    }

    /// Remove a queued request. Returns false if it was already drained.
    fn withdraw(&self, id: Uuid) -> bool {
        match &mut *self.lock() {
            RefreshState::Idle => false,
            RefreshState::Refreshing { pending } => {
                let before = pending.len();
                pending.retain(|request| request.id != id);
                pending.len() != before
            }
        }
    }
}

/// Held by the refresh leader until the refresh settles.
///
/// Dropping an unsettled lease settles it with [`RefreshFailure::Abandoned`],
/// so the coordinator always returns to idle.
#[derive(Debug)]
pub struct RefreshLease<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl RefreshLease<'_> {
    /// Settle the refresh, waking every queued request with `outcome`.
    ///
    /// Returns the number of requests woken.
    pub fn settle(mut self, outcome: RefreshOutcome) -> usize {
        self.settled = true;
        self.coordinator.settle(outcome)
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let woken = self.coordinator.settle(Err(RefreshFailure::Abandoned));
            warn!("Token refresh abandoned, released {} queued request(s)", woken);
        }
    }
}

/// A request queued behind the in-flight refresh.
///
/// Dropping it removes it from the queue.
#[derive(Debug)]
pub struct QueuedRequest<'a> {
    coordinator: &'a RefreshCoordinator,
    id: Uuid,
    receiver: oneshot::Receiver<RefreshOutcome>,
}

impl QueuedRequest<'_> {
    /// Wait for the refresh outcome until `deadline`.
    ///
    /// Fails with [`ClientError::Timeout`] when the deadline passes first.
    pub async fn wait_until(mut self, deadline: Instant) -> ClientResult<RefreshOutcome> {
        match tokio::time::timeout_at(deadline, &mut self.receiver).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => Ok(Err(RefreshFailure::Abandoned)),
            Err(_) => {
                debug!("Request {} timed out waiting for token refresh", self.id);
                Err(ClientError::Timeout)
            }
        }
    }
}

impl Drop for QueuedRequest<'_> {
    fn drop(&mut self) {
        self.coordinator.withdraw(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn leader(ticket: Ticket<'_>) -> RefreshLease<'_> {
        match ticket {
            Ticket::Leader(lease) => lease,
            Ticket::Queued(_) => panic!("expected to lead the refresh"),
        }
    }

    fn queued(ticket: Ticket<'_>) -> QueuedRequest<'_> {
        match ticket {
            Ticket::Queued(request) => request,
            Ticket::Leader(_) => panic!("expected to be queued"),
        }
    }

    #[tokio::test]
    async fn test_only_first_caller_leads() {
        let coordinator = RefreshCoordinator::new();
        assert!(!coordinator.is_refreshing());

        let lease = leader(coordinator.acquire_or_queue());
        assert!(coordinator.is_refreshing());

        let first = queued(coordinator.acquire_or_queue());
        let second = queued(coordinator.acquire_or_queue());
        assert_eq!(coordinator.pending_len(), 2);

        assert_eq!(lease.settle(Ok("access-2".to_string())), 2);
        assert!(!coordinator.is_refreshing());

        let deadline = Instant::now() + Duration::from_secs(1);
        assert_eq!(first.wait_until(deadline).await.unwrap(), Ok("access-2".to_string()));
        assert_eq!(second.wait_until(deadline).await.unwrap(), Ok("access-2".to_string()));
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter() {
        let coordinator = RefreshCoordinator::new();
        let lease = leader(coordinator.acquire_or_queue());
        let waiter = queued(coordinator.acquire_or_queue());

        lease.settle(Err(RefreshFailure::Rejected));

        let deadline = Instant::now() + Duration::from_secs(1);
        assert_eq!(
            waiter.wait_until(deadline).await.unwrap(),
            Err(RefreshFailure::Rejected)
        );
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_dropped_lease_resets_state() {
        let coordinator = RefreshCoordinator::new();
        let lease = leader(coordinator.acquire_or_queue());
        let waiter = queued(coordinator.acquire_or_queue());

        drop(lease);
        assert!(!coordinator.is_refreshing());

        let deadline = Instant::now() + Duration::from_secs(1);
        assert_eq!(
            waiter.wait_until(deadline).await.unwrap(),
            Err(RefreshFailure::Abandoned)
        );

        // The next 401 starts a fresh refresh
        assert!(matches!(coordinator.acquire_or_queue(), Ticket::Leader(_)));
    }

    #[tokio::test]
    async fn test_timed_out_waiter_leaves_the_queue() {
        let coordinator = RefreshCoordinator::new();
        let lease = leader(coordinator.acquire_or_queue());
        let waiter = queued(coordinator.acquire_or_queue());
        let patient = queued(coordinator.acquire_or_queue());
        assert_eq!(coordinator.pending_len(), 2);

        let result = waiter
            .wait_until(Instant::now() + Duration::from_millis(10))
            .await;
        assert!(matches!(result, Err(ClientError::Timeout)));
        assert_eq!(coordinator.pending_len(), 1);

        assert_eq!(lease.settle(Ok("access-2".to_string())), 1);
        drop(patient);
    }

    #[test]
    fn test_dropped_waiter_leaves_the_queue() {
        let coordinator = RefreshCoordinator::new();
        let _lease = leader(coordinator.acquire_or_queue());

        let waiter = queued(coordinator.acquire_or_queue());
        assert_eq!(coordinator.pending_len(), 1);
        drop(waiter);
        assert_eq!(coordinator.pending_len(), 0);
        assert!(coordinator.is_refreshing());
    }
}
