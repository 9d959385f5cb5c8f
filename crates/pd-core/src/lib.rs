//! # pd-core
//! Foundation types, constants and errors shared by every pool-dance crate.

pub mod chain;
pub mod constants;
pub mod error;
pub mod hexutil;
pub mod types;
