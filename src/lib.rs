//! # Crossway
//!
//! Chain-access layer for the Crossway cross-chain swap/bridge toolkit:
//! per-chain sessions over rotating JSON-RPC endpoints, batched reads through
//! on-chain aggregator contracts, and cascading fee resolution over sparse
//! per-route fee schedules.

pub mod batch;
pub mod cli;
pub mod config;
pub mod constants;
pub mod endpoints;
pub mod error;
pub mod fees;
pub mod metrics;
pub mod quote;
pub mod registry;
pub mod session;
pub mod types;
