//! Wires every component together and runs the two background loops the
//! original drives from callbacks: `block_monitor_on_block_change` (fan
//! out a new chain tip) and `serve_work` (drain parked getwork requests
//! against the upstream cache).
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use pd_core::constants::POOL_SHARE_TARGET_HEX;
use pd_events::{EventDispatcher, FileLogger};
use pd_monitor::BlockMonitor;
use pd_round::RoundManager;
use pd_server::PoolServer;
use pd_upstream::{UpstreamClient, UpstreamService};
use pd_validator::WorkValidator;
use tracing::info;

use crate::config::PoolDanceConfig;

pub struct Orchestrator {
    pub upstream: Arc<UpstreamService>,
    pub monitor: Arc<BlockMonitor>,
    pub server: PoolServer,
    pub validator: Arc<WorkValidator>,
    pub dispatcher: Arc<EventDispatcher>,
    /// Kept alive for its subscription to `dispatcher`; never read directly.
    _round_manager: Arc<RoundManager>,
}

impl Orchestrator {
    pub async fn build(config: &PoolDanceConfig) -> Result<Self> {
        let client = Arc::new(UpstreamClient::new(
            config.upstream.url.clone(),
            config.upstream.user.clone(),
            config.upstream.password.clone(),
        ));

        let upstream = UpstreamService::new(client.clone(), config.upstream.work_cache_size);
        let validator = WorkValidator::new(client.clone(), POOL_SHARE_TARGET_HEX)
            .context("pool share target is not valid hex")?;

        let logger = FileLogger::new(&config.pool.log_file)
            .await
            .with_context(|| format!("opening event log {}", config.pool.log_file))?;
        let dispatcher = Arc::new(EventDispatcher::new(Some(logger)));

        let round_manager = RoundManager::start(config.round.round_file.clone())
            .await
            .with_context(|| format!("opening round file {}", config.round.round_file))?;
        let observer: Arc<dyn pd_events::PoolObserver> = round_manager.clone();
        dispatcher.subscribe(&observer);

        let server = PoolServer::new(dispatcher.clone(), validator.clone(), client.clone());

        let monitor = BlockMonitor::new(client, Duration::from_millis(config.monitor.latency_ms));

        Ok(Self {
            upstream,
            monitor,
            server,
            validator,
            dispatcher,
            _round_manager: round_manager,
        })
    }

    /// Starts the block monitor (which immediately fires one poll) and the
    /// getwork-serving background task. Returns once both are running;
    /// they continue for the lifetime of their spawned tasks.
    pub fn start(&self) {
        let upstream = self.upstream.clone();
        let server = self.server.clone();
        let validator = self.validator.clone();
        let dispatcher = self.dispatcher.clone();

        self.monitor.start(move |block| {
            info!(block, "new block");
            upstream.notify_new_block();
            server.notify_new_block(block);
            validator.notify_new_block(block);
            dispatcher.notify_current_block(block);
        });

        tokio::spawn(serve_work_loop(self.server.clone(), self.upstream.clone()));
    }
}

/// Equivalent of `serve_work`/`upstream_service_on_has_work`/
/// `pool_server_on_getwork`: whenever either "a request is parked" or
/// "the upstream cache gained a template" happens, drain as many matched
/// pairs as possible.
async fn serve_work_loop(server: PoolServer, upstream: Arc<UpstreamService>) {
    loop {
        drain(&server, &upstream);

        tokio::select! {
            _ = server.wait_for_request() => {}
            _ = upstream.wait_for_work() => {}
        }
    }
}

/// Only ever serves the getwork queue, never `lp_conns` directly — a
/// long-poll connection joins this queue only once `PoolServer::notify_new_block`
/// promotes it, so it cannot be handed a template that was already cached
/// when it connected.
fn drain(server: &PoolServer, upstream: &Arc<UpstreamService>) {
    while server.need_work() {
        let Some(template) = upstream.get_work() else { break };
        let Some(pending) = server.pop_request() else { break };

        let user = pending.info.user.clone();
        let sent = pending.reply.send(template.clone()).is_ok();

        if sent {
            server.dispatcher().notify_work_sent(&pending.info);
            server.validator().track_work_sent(&template.data, user);
        }
    }
}
