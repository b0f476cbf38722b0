//! dLocal Payouts API client and the outbound email notifier.
//!
//! Supplies the production implementations of the `PayoutProvider` and
//! `Notifier` seams from `claimpay-core`. In sandbox mode the client never
//! touches the network: submissions resolve to deterministic provider ids
//! derived from the idempotency reference.

mod client;
mod notify;

pub mod error;

pub use client::{DlocalClient, DlocalConfig};
pub use error::{Error, Result};
pub use notify::{HttpNotifier, NotifierConfig};
