//! Compile-time defaults and protocol constants shared by every component.

/// Difficulty-1 target (easiest). The pool rewrites the `target` field of
/// every outgoing template to this value before handing it to a miner.
pub const POOL_SHARE_TARGET_HEX: &str =
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffff00000000";

/// Default number of upstream templates the work cache keeps ready,
/// including in-flight prefetch requests.
pub const DEFAULT_WORK_CACHE_SIZE: usize = 10;

/// Default delay between successful `getblockcount` polls.
pub const DEFAULT_POLL_LATENCY_MS: u64 = 250;

/// Default pool server bind address.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0";

/// Default pool server bind port.
pub const DEFAULT_LISTEN_PORT: u16 = 8335;

/// Long-polling endpoint path.
pub const LONG_POLL_PATH: &str = "/lp";

/// Default round journal path.
pub const DEFAULT_ROUND_FILE: &str = "/var/lib/pool-dance/round";

/// Default event log path.
pub const DEFAULT_LOG_FILE: &str = "/var/log/pool-dance.log";

/// Default pid file path (daemonization only; see Non-goals).
pub const DEFAULT_PID_FILE: &str = "/var/run/pool-dance.pid";

/// Default configuration file path.
pub const DEFAULT_CONFIG_FILE: &str = "/etc/pool-dance/pool-dance.conf";

/// Number of concurrent Phase-2 (SHA-256d) validation workers.
pub const DEFAULT_VALIDATOR_WORKERS: usize = 4;

/// `Server` response header value.
pub fn server_header() -> String {
    format!("pool-dance/{}", env!("CARGO_PKG_VERSION"))
}

/// Length in hex characters of a full block header template (`data` field).
pub const TEMPLATE_DATA_HEX_LEN: usize = 256;

/// Hex-character offsets of fields within the 256-char `data` string.
/// See SPEC_FULL.md §3 for the derivation of these against the original
/// `pool-dance` C implementation.
pub mod offsets {
    pub const VERSION: std::ops::Range<usize> = 0..8;
    pub const PREV_BLOCK_HASH: std::ops::Range<usize> = 8..72;
    pub const MERKLE_ROOT: std::ops::Range<usize> = 72..136;
    pub const TIMESTAMP: std::ops::Range<usize> = 136..144;
    pub const NONCE: std::ops::Range<usize> = 152..160;
    /// Length, in hex chars, of the header preimage once padding is stripped.
    pub const HEADER_HEX_LEN: usize = 160;
}
