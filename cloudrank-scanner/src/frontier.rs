use crate::result::UserId;
use std::collections::{HashSet, VecDeque};
use tokio::sync::{Mutex, Notify};
use tracing::debug;

#[derive(Default)]
struct FrontierState {
    visited: HashSet<UserId>,
    /// Ids sitting in `pending` or dequeued but not yet claimed.
    queued: HashSet<UserId>,
    pending: VecDeque<UserId>,
    in_flight: usize,
    shed: u64,
    closed: bool,
}

/// Visited set plus work queue shared by all crawl workers.
///
/// Every operation takes the single state lock, so `claim` is one atomic
/// test-and-set and no id is ever handed to two workers. The frontier closes
/// itself once nothing is pending and nothing is in flight.
pub struct Frontier {
    state: Mutex<FrontierState>,
    available: Notify,
    capacity: Option<usize>,
}

impl Frontier {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FrontierState::default()),
            available: Notify::new(),
            capacity: None,
        }
    }

    /// A frontier holding at most `capacity` pending ids. Discoveries beyond
    /// that are shed rather than blocking the worker that made them.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::new()
        }
    }

    /// Marks `id` visited. Returns true only for the first caller.
    pub async fn claim(&self, id: UserId) -> bool {
        let mut state = self.state.lock().await;
        state.queued.remove(&id);
        state.visited.insert(id)
    }

    /// Queues `id` regardless of what the frontier has seen. Used for seeds.
    pub async fn enqueue(&self, id: UserId) {
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return;
            }
            state.queued.insert(id);
            state.pending.push_back(id);
        }
        self.available.notify_one();
    }

    /// Queues a discovered id unless it was already visited or is already
    /// waiting. Returns whether the id was queued.
    pub async fn offer(&self, id: UserId) -> bool {
        {
            let mut state = self.state.lock().await;
            if state.closed || state.visited.contains(&id) || state.queued.contains(&id) {
                return false;
            }
            if let Some(capacity) = self.capacity
                && state.pending.len() >= capacity
            {
                state.shed += 1;
                debug!("Frontier full ({} pending), shedding user {}", capacity, id);
                return false;
            }
            state.queued.insert(id);
            state.pending.push_back(id);
        }
        self.available.notify_one();
        true
    }

    /// Waits for the next id. `None` means the frontier is closed, either
    /// explicitly or because the graph was exhausted.
    pub async fn dequeue(&self) -> Option<UserId> {
        loop {
            let notified = self.available.notified();
            {
                let mut state = self.state.lock().await;
                if state.closed {
                    return None;
                }
                if let Some(id) = state.pending.pop_front() {
                    state.in_flight += 1;
                    return Some(id);
                }
                if state.in_flight == 0 {
                    state.closed = true;
                    drop(state);
                    self.available.notify_waiters();
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Reports that a dequeued id has been fully handled.
    pub async fn complete(&self) {
        let exhausted = {
            let mut state = self.state.lock().await;
            state.in_flight = state.in_flight.saturating_sub(1);
            let exhausted = !state.closed && state.in_flight == 0 && state.pending.is_empty();
            if exhausted {
                state.closed = true;
            }
            exhausted
        };
        if exhausted {
            debug!("Frontier exhausted");
            self.available.notify_waiters();
        }
    }

    /// Stops dispatching and wakes every waiting worker.
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.available.notify_waiters();
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Number of ids waiting for dispatch.
    pub async fn len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.pending.is_empty()
    }

    pub async fn visited_count(&self) -> usize {
        self.state.lock().await.visited.len()
    }

    pub async fn shed_count(&self) -> u64 {
        self.state.lock().await.shed
    }
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_claims_admit_exactly_one() {
        let frontier = Arc::new(Frontier::new());

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let frontier = frontier.clone();
                tokio::spawn(async move { frontier.claim(7).await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert!(!frontier.claim(7).await);
    }

    #[tokio::test]
    async fn test_offer_skips_visited_and_pending() {
        let frontier = Frontier::new();
        frontier.claim(1).await;

        assert!(!frontier.offer(1).await, "visited ids are never re-queued");
        assert!(frontier.offer(2).await);
        assert!(!frontier.offer(2).await, "pending ids are queued once");
        assert_eq!(frontier.len().await, 1);
    }

    #[tokio::test]
    async fn test_dequeued_but_unclaimed_id_is_not_requeued() {
        let frontier = Frontier::new();
        frontier.enqueue(5).await;

        assert_eq!(frontier.dequeue().await, Some(5));
        assert!(!frontier.offer(5).await);
        assert!(frontier.claim(5).await);
        assert!(!frontier.offer(5).await);
    }

    #[tokio::test]
    async fn test_dequeue_waits_for_work_while_units_are_in_flight() {
        let frontier = Arc::new(Frontier::new());
        frontier.enqueue(1).await;
        assert_eq!(frontier.dequeue().await, Some(1));

        let waiter = {
            let frontier = frontier.clone();
            tokio::spawn(async move { frontier.dequeue().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        frontier.offer(2).await;
        let next = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("dequeue should wake up")
            .unwrap();
        assert_eq!(next, Some(2));
    }

    #[tokio::test]
    async fn test_frontier_closes_when_exhausted() {
        let frontier = Frontier::new();
        frontier.enqueue(1).await;

        assert_eq!(frontier.dequeue().await, Some(1));
        frontier.claim(1).await;
        frontier.complete().await;

        assert!(frontier.is_closed().await);
        assert_eq!(frontier.dequeue().await, None);
    }

    #[tokio::test]
    async fn test_close_wakes_waiting_workers() {
        let frontier = Arc::new(Frontier::new());
        frontier.enqueue(1).await;
        frontier.dequeue().await;

        let waiter = {
            let frontier = frontier.clone();
            tokio::spawn(async move { frontier.dequeue().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        frontier.close().await;
        let next = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("close should wake waiters")
            .unwrap();
        assert_eq!(next, None);
        assert!(!frontier.offer(3).await);
    }

    #[tokio::test]
    async fn test_bounded_frontier_sheds_overflow() {
        let frontier = Frontier::with_capacity(2);

        assert!(frontier.offer(1).await);
        assert!(frontier.offer(2).await);
        assert!(!frontier.offer(3).await);
        assert_eq!(frontier.shed_count().await, 1);

        frontier.dequeue().await;
        assert!(frontier.offer(3).await, "shed ids may be offered again later");
    }
}
