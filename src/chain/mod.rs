//! Chain module - the JSON-RPC endpoint and receipt lookup
//!
//! This module provides:
//! - A provider wrapper with per-request timeouts and typed errors
//! - Fixed-delay and backoff receipt waiting

pub mod provider;
pub mod receipt;

pub use provider::{ChainProvider, GasPrice};
pub use receipt::{ReceiptStatus, ReceiptWaiter};
