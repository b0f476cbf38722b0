//! Core types and trait definitions for the Claimpay payout ledger.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod engine;
pub mod error;
pub mod matcher;
pub mod payout;
pub mod provider;
pub mod recipient;
pub mod reconciliation;
pub mod store;
pub mod trigger;
pub mod webhook;

pub use error::{Error, Result};
