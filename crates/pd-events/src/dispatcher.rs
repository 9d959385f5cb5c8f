//! Fan-out of pool activity to the event log and to in-process observers
//! (the round manager subscribes to share/block events).
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use pd_core::error::ShareOutcome;

use crate::file_logger::FileLogger;

/// Per-request client identity, pulled from HTTP basic auth and headers.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub user: String,
    pub password: String,
    pub remote_addr: String,
    pub user_agent: String,
}

/// Observer interface for components that react to pool events without
/// owning the dispatcher's lifetime. The dispatcher holds only weak
/// references, so a dropped observer is simply skipped on the next event.
pub trait PoolObserver: Send + Sync {
    fn on_work_validated(&self, _outcome: ShareOutcome, _user: &str, _password: &str) {}
    fn on_block_found(&self, _block: u64, _user: &str, _password: &str) {}
}

pub struct EventDispatcher {
    logger: Option<FileLogger>,
    observers: Mutex<Vec<Weak<dyn PoolObserver>>>,
}

fn timestamp_str() -> String {
    chrono::Utc::now().format("%d/%b/%Y:%H:%M:%S +0000").to_string()
}

impl EventDispatcher {
    pub fn new(logger: Option<FileLogger>) -> Self {
        Self {
            logger,
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, observer: &Arc<dyn PoolObserver>) {
        self.observers.lock().push(Arc::downgrade(observer));
    }

    fn for_each_observer(&self, f: impl Fn(&dyn PoolObserver)) {
        self.observers.lock().retain(|weak| {
            if let Some(observer) = weak.upgrade() {
                f(observer.as_ref());
                true
            } else {
                false
            }
        });
    }

    fn log(&self, entry: impl Into<String>) {
        if let Some(logger) = &self.logger {
            logger.log(entry);
        }
    }

    pub fn notify_work_validated(
        &self,
        info: &ClientInfo,
        outcome: ShareOutcome,
        reason: Option<&str>,
    ) {
        self.for_each_observer(|o| o.on_work_validated(outcome, &info.user, &info.password));

        if outcome == ShareOutcome::Success {
            self.log(format!(
                "[{}]\tWORK-ACCEPTED\t\"{}\"\t\"{}\"\t{}\t\"{}\"",
                timestamp_str(),
                info.user,
                info.password,
                info.remote_addr,
                info.user_agent
            ));
        } else {
            self.log(format!(
                "[{}]\tWORK-REJECTED\t\"{}\"\t\"{}\"\t{}\t\"{}\"\t{}\t\"{}\"",
                timestamp_str(),
                info.user,
                info.password,
                info.remote_addr,
                info.user_agent,
                outcome.as_str(),
                reason.unwrap_or(""),
            ));
        }
    }

    pub fn notify_work_sent(&self, info: &ClientInfo) {
        self.log(format!(
            "[{}]\tWORK-SERVED\t\"{}\"\t\"{}\"\t{}\t\"{}\"",
            timestamp_str(),
            info.user,
            info.password,
            info.remote_addr,
            info.user_agent
        ));
    }

    pub fn notify_work_requested(&self, info: &ClientInfo) {
        self.log(format!(
            "[{}]\tWORK-REQUESTED\t\"{}\"\t\"{}\"\t{}\t\"{}\"",
            timestamp_str(),
            info.user,
            info.password,
            info.remote_addr,
            info.user_agent
        ));
    }

    pub fn notify_work_submitted(&self, info: &ClientInfo) {
        self.log(format!(
            "[{}]\tWORK-SUBMITTED\t\"{}\"\t\"{}\"\t{}\t\"{}\"",
            timestamp_str(),
            info.user,
            info.password,
            info.remote_addr,
            info.user_agent
        ));
    }

    pub fn notify_current_block(&self, block: u64) {
        self.log(format!("[{}]\tCURRENT-BLOCK\t{}", timestamp_str(), block));
    }

    pub fn notify_block_found(&self, block: u64, info: &ClientInfo) {
        self.for_each_observer(|o| o.on_block_found(block, &info.user, &info.password));

        self.log(format!(
            "[{}]\tBLOCK-FOUND\t{}\t\"{}\"\t\"{}\"",
            timestamp_str(),
            block,
            info.user,
            info.password
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingObserver {
        validated: AtomicUsize,
        blocks: AtomicUsize,
    }

    impl PoolObserver for CountingObserver {
        fn on_work_validated(&self, _outcome: ShareOutcome, _user: &str, _password: &str) {
            self.validated.fetch_add(1, Ordering::SeqCst);
        }

        fn on_block_found(&self, _block: u64, _user: &str, _password: &str) {
            self.blocks.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn notifies_subscribed_observers() {
        let dispatcher = EventDispatcher::new(None);
        let observer = Arc::new(CountingObserver {
            validated: AtomicUsize::new(0),
            blocks: AtomicUsize::new(0),
        });
        let as_trait: Arc<dyn PoolObserver> = observer.clone();
        dispatcher.subscribe(&as_trait);

        let info = ClientInfo::default();
        dispatcher.notify_work_validated(&info, ShareOutcome::Success, None);
        dispatcher.notify_block_found(42, &info);

        assert_eq!(observer.validated.load(Ordering::SeqCst), 1);
        assert_eq!(observer.blocks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drops_observers_that_have_been_released() {
        let dispatcher = EventDispatcher::new(None);
        {
            let observer: Arc<dyn PoolObserver> = Arc::new(CountingObserver {
                validated: AtomicUsize::new(0),
                blocks: AtomicUsize::new(0),
            });
            dispatcher.subscribe(&observer);
        }
        // observer dropped; the weak ref should be pruned without panicking.
        dispatcher.notify_current_block(1);
        assert_eq!(dispatcher.observers.lock().len(), 0);
    }
}
