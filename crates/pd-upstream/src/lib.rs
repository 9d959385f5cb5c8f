//! # pd-upstream
//! JSON-RPC client for, and bounded prefetch cache of, the upstream
//! Bitcoin node's block templates.

pub mod cache;
pub mod client;

pub use cache::UpstreamService;
pub use client::UpstreamClient;
