//! # pd-monitor
//! Polls the upstream node for its current block height and notifies
//! subscribers the moment the tip advances.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pd_upstream::UpstreamClient;
use tokio::task::JoinHandle;
use tracing::warn;

/// Polls `getblockcount` on a fixed cadence and fires a callback whenever
/// the reported height increases. `start`/`stop` are idempotent, and the
/// first poll after `start` happens immediately rather than after the
/// first latency interval.
pub struct BlockMonitor {
    client: Arc<UpstreamClient>,
    latency: Duration,
    current_block: AtomicU64,
    started: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BlockMonitor {
    pub fn new(client: Arc<UpstreamClient>, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            client,
            latency,
            current_block: AtomicU64::new(0),
            started: AtomicBool::new(false),
            handle: Mutex::new(None),
        })
    }

    pub fn current_block(&self) -> u64 {
        self.current_block.load(Ordering::SeqCst)
    }

    /// Starts the polling loop. A second call while already started is a
    /// no-op.
    pub fn start<F>(self: &Arc<Self>, on_change: F)
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                if !this.started.load(Ordering::SeqCst) {
                    break;
                }

                match this.client.get_block_count().await {
                    Ok(block) => {
                        let prev = this.current_block.load(Ordering::SeqCst);
                        if block > prev {
                            this.current_block.store(block, Ordering::SeqCst);
                            if this.started.load(Ordering::SeqCst) {
                                on_change(block);
                            }
                        }
                    }
                    Err(e) => warn!(error = %e, "getblockcount failed"),
                }

                if !this.started.load(Ordering::SeqCst) {
                    break;
                }
                tokio::time::sleep(this.latency).await;
            }
        });

        *self.handle.lock() = Some(handle);
    }

    /// Stops the polling loop. A second call while already stopped is a
    /// no-op.
    pub fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_block_zero() {
        let client = Arc::new(UpstreamClient::new("http://127.0.0.1:8332/", "u", "p"));
        let monitor = BlockMonitor::new(client, Duration::from_millis(250));
        assert_eq!(monitor.current_block(), 0);
    }

    #[test]
    fn stop_before_start_is_a_no_op() {
        let client = Arc::new(UpstreamClient::new("http://127.0.0.1:8332/", "u", "p"));
        let monitor = BlockMonitor::new(client, Duration::from_millis(250));
        monitor.stop();
    }
}
