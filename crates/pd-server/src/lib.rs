//! # pd-server
//! Client-facing `getwork` protocol endpoint: a JSON-RPC dispatcher on `/`
//! and an HTTP long-polling endpoint on `/lp`. Plain getwork callers park
//! directly in the orchestrator's getwork queue; long-poll connections park
//! separately and are only promoted into that queue on the next new block,
//! so the orchestrator still only ever has to drain one queue.
pub mod http;
pub mod queue;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::Router;
use pd_events::EventDispatcher;
use pd_upstream::UpstreamClient;
use pd_validator::WorkValidator;
use tokio::sync::Notify;

use crate::queue::{GetworkQueue, LongPollSet, PendingRequest};

struct Inner {
    queue: GetworkQueue,
    /// Long-poll connections parked until the next new-block event; moved
    /// into `queue` only from `notify_new_block`, never served early.
    lp_conns: LongPollSet,
    block_num: AtomicU64,
    dispatcher: Arc<EventDispatcher>,
    validator: Arc<WorkValidator>,
    client: Arc<UpstreamClient>,
    /// Fired every time a request is parked, so the orchestrator's drain
    /// loop wakes even when the upstream cache already has work ready.
    request_available: Notify,
}

/// Shared handle passed both to the axum router (as `State`) and to the
/// orchestrator, which drains the getwork queue whenever the upstream
/// cache has work available.
#[derive(Clone)]
pub struct PoolServer(Arc<Inner>);

impl PoolServer {
    pub fn new(
        dispatcher: Arc<EventDispatcher>,
        validator: Arc<WorkValidator>,
        client: Arc<UpstreamClient>,
    ) -> Self {
        Self(Arc::new(Inner {
            queue: GetworkQueue::new(),
            lp_conns: LongPollSet::new(),
            block_num: AtomicU64::new(0),
            dispatcher,
            validator,
            client,
            request_available: Notify::new(),
        }))
    }

    pub fn router(&self) -> Router {
        http::router(self.clone())
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.0.dispatcher
    }

    pub fn validator(&self) -> &Arc<WorkValidator> {
        &self.0.validator
    }

    pub fn client(&self) -> &Arc<UpstreamClient> {
        &self.0.client
    }

    /// Whether at least one request is parked waiting for a template.
    pub fn need_work(&self) -> bool {
        self.0.queue.has_pending()
    }

    /// Pops the oldest parked request, if any.
    pub fn pop_request(&self) -> Option<PendingRequest> {
        self.0.queue.pop()
    }

    /// Parks a request (used by the HTTP layer). A plain getwork caller
    /// joins the getwork queue immediately; a long-poll connection is held
    /// back in `lp_conns` until the next new-block event promotes it, so it
    /// is never served a template that was already cached when it arrived.
    pub fn push_request(&self, request: PendingRequest) {
        if request.from_lp {
            self.0.lp_conns.park(request);
        } else {
            self.0.queue.push(request);
            self.0.request_available.notify_waiters();
        }
    }

    /// Resolves once a request has been parked since the call was made.
    pub async fn wait_for_request(&self) {
        self.0.request_available.notified().await;
    }

    /// Records the new chain tip and promotes every parked long-poll
    /// connection into the getwork queue, mirroring
    /// `pool_server_notify_new_block`'s `lp_conns` -> `getwork_queue` move.
    pub fn notify_new_block(&self, block: u64) {
        self.0.block_num.store(block, Ordering::SeqCst);
        self.0.lp_conns.drain_into(&self.0.queue);
        self.0.request_available.notify_waiters();
    }

    pub fn current_block(&self) -> u64 {
        self.0.block_num.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pd_upstream::UpstreamClient;

    fn server() -> PoolServer {
        let client = Arc::new(UpstreamClient::new("http://127.0.0.1:8332/", "u", "p"));
        let validator = WorkValidator::new(client.clone(), &"f".repeat(64)).unwrap();
        let dispatcher = Arc::new(EventDispatcher::new(None));
        PoolServer::new(dispatcher, validator, client)
    }

    #[test]
    fn tracks_chain_tip_for_the_blocknum_header() {
        let server = server();
        assert_eq!(server.current_block(), 0);
        server.notify_new_block(42);
        assert_eq!(server.current_block(), 42);
    }

    #[tokio::test]
    async fn parked_request_resolves_once_popped_and_answered() {
        use pd_core::types::Template;
        use serde_json::Map;

        let server = server();
        assert!(!server.need_work());

        let (reply, rx) = tokio::sync::oneshot::channel();
        server.push_request(PendingRequest {
            reply,
            from_lp: false,
            info: pd_events::ClientInfo::default(),
        });
        assert!(server.need_work());

        let pending = server.pop_request().unwrap();
        let template = Template {
            data: "0".repeat(256),
            target: "f".repeat(64),
            extra: Map::new(),
        };
        let _ = pending.reply.send(template);

        let resolved = rx.await.unwrap();
        assert_eq!(resolved.data.len(), 256);
    }

    #[test]
    fn long_poll_request_is_not_servable_until_next_block() {
        let server = server();
        let (reply, _rx) = tokio::sync::oneshot::channel();
        server.push_request(PendingRequest {
            reply,
            from_lp: true,
            info: pd_events::ClientInfo::default(),
        });

        assert!(!server.need_work());
        assert!(server.pop_request().is_none());

        server.notify_new_block(101);

        assert!(server.need_work());
        let pending = server.pop_request().unwrap();
        assert!(pending.from_lp);
    }
}
