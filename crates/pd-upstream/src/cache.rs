//! Bounded prefetch cache of block templates, keeping `work_cache_size`
//! templates (counting in-flight requests) ready at all times so a
//! `getwork` call from a miner never blocks on the upstream round-trip.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use pd_core::types::Template;
use tokio::sync::Notify;
use tracing::warn;

use crate::client::UpstreamClient;

pub struct UpstreamService {
    client: Arc<UpstreamClient>,
    queue: Mutex<VecDeque<Template>>,
    work_cache_size: usize,
    in_flight: AtomicUsize,
    /// Fired every time a template is pushed into the queue.
    work_available: Notify,
}

impl UpstreamService {
    pub fn new(client: Arc<UpstreamClient>, work_cache_size: usize) -> Arc<Self> {
        Arc::new(Self {
            client,
            queue: Mutex::new(VecDeque::new()),
            work_cache_size,
            in_flight: AtomicUsize::new(0),
            work_available: Notify::new(),
        })
    }

    pub fn client(&self) -> &UpstreamClient {
        &self.client
    }

    pub fn has_work(&self) -> bool {
        !self.queue.lock().is_empty()
    }

    /// Pops the freshest cached template, if any, and tops the cache back
    /// up. LIFO, not FIFO: serving the most recently fetched template
    /// first minimizes staleness when a block lands mid-cache.
    pub fn get_work(self: &Arc<Self>) -> Option<Template> {
        let work = self.queue.lock().pop_front();
        self.fill();
        work
    }

    /// Resolves once new work has been pushed into the cache since the
    /// call was made. Used by the orchestrator to wake up `serve_work`.
    pub async fn wait_for_work(&self) {
        self.work_available.notified().await;
    }

    /// Drops all cached and in-flight-tracked work and starts fetching a
    /// fresh batch against the new chain tip.
    pub fn notify_new_block(self: &Arc<Self>) {
        self.queue.lock().clear();
        self.in_flight.store(0, Ordering::SeqCst);
        self.fill();
    }

    fn fill(self: &Arc<Self>) {
        loop {
            let queued = self.queue.lock().len();
            let in_flight = self.in_flight.load(Ordering::SeqCst);
            if queued + in_flight >= self.work_cache_size {
                break;
            }
            self.in_flight.fetch_add(1, Ordering::SeqCst);

            let task_self = Arc::clone(self);
            tokio::spawn(async move {
                let result = task_self.client.get_work().await;
                task_self.in_flight.fetch_sub(1, Ordering::SeqCst);

                match result {
                    Ok(template) => {
                        task_self.queue.lock().push_front(template);
                        task_self.work_available.notify_waiters();
                        task_self.fill();
                    }
                    Err(e) => {
                        warn!(error = %e, "getwork request to upstream failed");
                        task_self.fill();
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let client = Arc::new(UpstreamClient::new("http://127.0.0.1:8332/", "u", "p"));
        let svc = UpstreamService::new(client, 10);
        assert!(!svc.has_work());
    }
}
