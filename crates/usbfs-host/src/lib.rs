//! Host side of the usbfs protocol.
//!
//! [`Client`] writes one command frame, waits for the matching response and
//! decodes it. Request ids start at 1 and increase per request.

pub mod client;
pub mod error;
pub mod listing;

pub use client::Client;
pub use error::{HostError, Result};
pub use listing::{EntryKind, Listing, ListingEntry};
