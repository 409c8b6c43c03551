//! DomainQueue: the in-memory scheduler enforcing per-host concurrency,
//! global concurrency, and minimum per-host dispatch spacing during Phase 2.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::task::JoinSet;

#[derive(Debug, Clone, Copy)]
pub struct DomainQueueConfig {
    pub max_concurrent_per_domain: u32,
    pub max_total_concurrent: u32,
    pub domain_delay: Duration,
}

struct State<T> {
    order: Vec<String>,
    queues: HashMap<String, VecDeque<T>>,
    active_count: HashMap<String, u32>,
    last_dispatch: HashMap<String, Instant>,
    total_active: u32,
}

impl<T> State<T> {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            queues: HashMap::new(),
            active_count: HashMap::new(),
            last_dispatch: HashMap::new(),
            total_active: 0,
        }
    }

    fn push(&mut self, host: String, item: T) {
        if !self.queues.contains_key(&host) {
            self.order.push(host.clone());
        }
        self.queues.entry(host).or_default().push_back(item);
    }

    fn is_empty(&self) -> bool {
        self.queues.values().all(|q| q.is_empty())
    }
}

/// Drives the collected list under (a) per-host concurrency, (b) global
/// concurrency, and (c) a minimum per-host dispatch gap.
pub struct DomainQueue<T> {
    config: DomainQueueConfig,
    state: Mutex<State<T>>,
}

const SLEEP_GRANULARITY: Duration = Duration::from_millis(50);
const FALLBACK_WAIT: Duration = Duration::from_millis(100);

impl<T: Send + 'static> DomainQueue<T> {
    pub fn new(config: DomainQueueConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::new()),
        }
    }

    pub async fn push(&self, host: String, item: T) {
        self.state.lock().await.push(host, item);
    }

    /// Scans hosts in insertion order; atomically pops the first eligible
    /// host's head item, bumping its counters and dispatch timestamp.
    pub async fn next_available(&self) -> Option<(String, T)> {
        let mut state = self.state.lock().await;
        if state.total_active >= self.config.max_total_concurrent {
            return None;
        }

        let now = Instant::now();
        let eligible_host = state.order.iter().find(|host| {
            let non_empty = state.queues.get(*host).map(|q| !q.is_empty()).unwrap_or(false);
            if !non_empty {
                return false;
            }
            let active = *state.active_count.get(*host).unwrap_or(&0);
            if active >= self.config.max_concurrent_per_domain {
                return false;
            }
            match state.last_dispatch.get(*host) {
                Some(last) => now.duration_since(*last) >= self.config.domain_delay,
                None => true,
            }
        })
        .cloned();

        let host = eligible_host?;
        let item = state.queues.get_mut(&host)?.pop_front()?;
        *state.active_count.entry(host.clone()).or_insert(0) += 1;
        state.total_active += 1;
        state.last_dispatch.insert(host.clone(), now);
        Some((host, item))
    }

    /// Minimum time until any host could become dispatchable: `0` if one
    /// already is, `100ms` if nothing is dispatchable yet (e.g. the global
    /// cap is saturated), else the smallest remaining per-host delay.
    pub async fn wait_time(&self) -> Duration {
        let state = self.state.lock().await;
        if state.total_active >= self.config.max_total_concurrent {
            return FALLBACK_WAIT;
        }

        let now = Instant::now();
        let mut min_wait: Option<Duration> = None;
        let mut any_now = false;

        for host in &state.order {
            let non_empty = state.queues.get(host).map(|q| !q.is_empty()).unwrap_or(false);
            if !non_empty {
                continue;
            }
            let active = *state.active_count.get(host).unwrap_or(&0);
            if active >= self.config.max_concurrent_per_domain {
                continue;
            }
            let remaining = match state.last_dispatch.get(host) {
                Some(last) => {
                    let elapsed = now.duration_since(*last);
                    self.config.domain_delay.saturating_sub(elapsed)
                }
                None => Duration::ZERO,
            };
            if remaining.is_zero() {
                any_now = true;
                break;
            }
            min_wait = Some(min_wait.map_or(remaining, |m: Duration| m.min(remaining)));
        }

        if any_now {
            Duration::ZERO
        } else {
            min_wait.unwrap_or(FALLBACK_WAIT)
        }
    }

    /// Decrements the per-host and global active counters. Must not
    /// underflow: clamps at zero if called more than the matching dispatch.
    pub async fn mark_complete(&self, host: &str) {
        let mut state = self.state.lock().await;
        if let Some(count) = state.active_count.get_mut(host) {
            *count = count.saturating_sub(1);
        }
        state.total_active = state.total_active.saturating_sub(1);
    }

    async fn is_empty(&self) -> bool {
        self.state.lock().await.is_empty()
    }

    /// `(active, queued)` snapshot, used for progress reporting such as
    /// `"Phase 2: Crawling [k/N] (A active, Q queued)"`.
    pub async fn snapshot_counts(&self) -> (u32, usize) {
        let state = self.state.lock().await;
        let queued = state.queues.values().map(|q| q.len()).sum();
        (state.total_active, queued)
    }

    /// Runs `processor` over every pushed item, honoring the dispatch loop
    /// in the component contract: drain dispatchable items eagerly, wait
    /// for either an in-flight completion or the next dispatch window,
    /// and exit once all queues are empty and no futures remain in flight.
    /// Takes `self` via `Arc` so dispatched work can release its own slot
    /// (`mark_complete`) from a spawned task once it finishes.
    pub async fn run<F, Fut>(self: std::sync::Arc<Self>, processor: F)
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.run_cancellable(processor, &crate::cancel::CancellationToken::new())
            .await
    }

    /// As `run`, but once `token` is cancelled the loop stops dispatching
    /// new items and waits only for already in-flight work to finish its
    /// current suspension, abandoning whatever remains queued.
    pub async fn run_cancellable<F, Fut>(
        self: std::sync::Arc<Self>,
        processor: F,
        token: &crate::cancel::CancellationToken,
    ) where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut in_flight: JoinSet<()> = JoinSet::new();
        let processor = std::sync::Arc::new(processor);

        loop {
            if token.is_cancelled() {
                while in_flight.join_next().await.is_some() {}
                break;
            }

            if let Some((host, item)) = self.next_available().await {
                let processor = processor.clone();
                let queue = self.clone();
                in_flight.spawn(async move {
                    processor(item).await;
                    queue.mark_complete(&host).await;
                });
                continue;
            }

            if !in_flight.is_empty() {
                let wait = self.wait_time().await;
                tokio::select! {
                    _ = in_flight.join_next() => {}
                    _ = tokio::time::sleep(wait) => {}
                    _ = token.cancelled() => {}
                }
                continue;
            }

            if self.is_empty().await {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(SLEEP_GRANULARITY) => {}
                _ = token.cancelled() => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn config(per_domain: u32, total: u32, delay_ms: u64) -> DomainQueueConfig {
        DomainQueueConfig {
            max_concurrent_per_domain: per_domain,
            max_total_concurrent: total,
            domain_delay: Duration::from_millis(delay_ms),
        }
    }

    #[tokio::test]
    async fn per_host_concurrency_cap_is_enforced() {
        let queue: DomainQueue<u32> = DomainQueue::new(config(2, 10, 0));
        for i in 0..6 {
            queue.push("host-a".to_string(), i).await;
        }

        let mut dispatched = Vec::new();
        for _ in 0..2 {
            let (host, item) = queue.next_available().await.unwrap();
            dispatched.push(item);
            assert_eq!(host, "host-a");
        }
        assert!(queue.next_available().await.is_none());

        queue.mark_complete("host-a").await;
        assert!(queue.next_available().await.is_some());
    }

    #[tokio::test]
    async fn global_cap_blocks_dispatch_even_with_domain_capacity() {
        let queue: DomainQueue<u32> = DomainQueue::new(config(5, 1, 0));
        queue.push("host-a".to_string(), 1).await;
        queue.push("host-b".to_string(), 2).await;

        assert!(queue.next_available().await.is_some());
        assert!(queue.next_available().await.is_none());
    }

    #[tokio::test]
    async fn domain_delay_is_respected_between_dispatches_to_same_host() {
        let queue: DomainQueue<u32> = DomainQueue::new(config(5, 10, 50));
        queue.push("host-a".to_string(), 1).await;
        queue.push("host-a".to_string(), 2).await;

        let (_, _) = queue.next_available().await.unwrap();
        queue.mark_complete("host-a").await;
        assert!(queue.next_available().await.is_none());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(queue.next_available().await.is_some());
    }

    #[tokio::test]
    async fn zero_delay_still_enforces_per_domain_concurrency_cap() {
        let queue: DomainQueue<u32> = DomainQueue::new(config(1, 10, 0));
        queue.push("host-a".to_string(), 1).await;
        queue.push("host-a".to_string(), 2).await;

        assert!(queue.next_available().await.is_some());
        assert!(queue.next_available().await.is_none());
    }

    #[tokio::test]
    async fn mark_complete_does_not_underflow() {
        let queue: DomainQueue<u32> = DomainQueue::new(config(1, 1, 0));
        queue.mark_complete("never-dispatched").await;
        queue.push("host-a".to_string(), 1).await;
        assert!(queue.next_available().await.is_some());
    }

    #[tokio::test]
    async fn run_processes_every_item_under_bounded_concurrency() {
        let queue = Arc::new(DomainQueue::<u32>::new(config(2, 10, 10)));
        for i in 0..6u32 {
            queue.push("host-a".to_string(), i).await;
        }

        let processed = Arc::new(AtomicU32::new(0));
        let counter = processed.clone();
        queue
            .run(move |_item| {
                let counter = counter.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;

        assert_eq!(processed.load(Ordering::SeqCst), 6);
    }
}
