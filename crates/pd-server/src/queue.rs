//! FIFO of parked `getwork` requests awaiting a template, plus a separate
//! set of long-poll connections that only enter that FIFO once a new block
//! promotes them.
//!
//! The original keeps plain RPC callers (blocked until the cache has a
//! template) in `getwork_queue` but holds long-polling connections in a
//! distinct `lp_conns` list, moving them into `getwork_queue` only from
//! `pool_server_notify_new_block`. A oneshot-per-request is the natural
//! Rust shape for either list — an axum handler that hasn't been answered
//! yet is just a task awaiting its own receiver, so there is no connection
//! bookkeeping to free on close — but the two lists stay separate so a
//! long-poll connection is never served a pre-existing cached template.
use std::collections::VecDeque;

use parking_lot::Mutex;
use pd_core::types::Template;
use pd_events::ClientInfo;
use tokio::sync::oneshot;

pub struct PendingRequest {
    pub reply: oneshot::Sender<Template>,
    pub from_lp: bool,
    pub info: ClientInfo,
}

#[derive(Default)]
pub struct GetworkQueue {
    requests: Mutex<VecDeque<PendingRequest>>,
}

impl GetworkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, request: PendingRequest) {
        self.requests.lock().push_back(request);
    }

    pub fn pop(&self) -> Option<PendingRequest> {
        self.requests.lock().pop_front()
    }

    pub fn has_pending(&self) -> bool {
        !self.requests.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }
}

/// Long-poll connections parked until the next new-block event. Distinct
/// from `GetworkQueue` so a `/lp` caller never gets served a template that
/// was already sitting in the cache when it connected.
#[derive(Default)]
pub struct LongPollSet {
    parked: Mutex<Vec<PendingRequest>>,
}

impl LongPollSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn park(&self, request: PendingRequest) {
        self.parked.lock().push(request);
    }

    pub fn len(&self) -> usize {
        self.parked.lock().len()
    }

    /// Moves every parked long-poll connection into `queue`, equivalent to
    /// `pool_server_notify_new_block`'s `g_queue_push_head`-ing `lp_conns`
    /// onto `getwork_queue`.
    pub fn drain_into(&self, queue: &GetworkQueue) {
        let parked = std::mem::take(&mut *self.parked.lock());
        for request in parked {
            queue.push(request);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_fifo_order() {
        let queue = GetworkQueue::new();
        let (tx1, _rx1) = oneshot::channel();
        let (tx2, _rx2) = oneshot::channel();
        queue.push(PendingRequest { reply: tx1, from_lp: false, info: ClientInfo::default() });
        queue.push(PendingRequest { reply: tx2, from_lp: true, info: ClientInfo::default() });

        assert_eq!(queue.len(), 2);
        let first = queue.pop().unwrap();
        assert!(!first.from_lp);
        let second = queue.pop().unwrap();
        assert!(second.from_lp);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn long_poll_connections_stay_parked_until_drained() {
        let queue = GetworkQueue::new();
        let lp_conns = LongPollSet::new();
        let (tx, _rx) = oneshot::channel();
        lp_conns.park(PendingRequest { reply: tx, from_lp: true, info: ClientInfo::default() });

        assert_eq!(lp_conns.len(), 1);
        assert!(!queue.has_pending());

        lp_conns.drain_into(&queue);

        assert_eq!(lp_conns.len(), 0);
        assert!(queue.has_pending());
        assert!(queue.pop().unwrap().from_lp);
    }
}
