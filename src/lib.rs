//! Asynchronous buffered bulk log-shipping client
//!
//! Callers submit schema-free records; the client enriches them with a
//! timestamp and default fields, serializes them, and accumulates them in
//! memory. Batches are transmitted to the bulk-ingest endpoint when the
//! buffer reaches its size threshold, when the periodic timer fires, or on
//! an explicit flush. Delivery is best-effort: failed batches are dropped,
//! never retried.

pub mod buffer;
pub mod client;
pub mod config;
pub mod errors;
pub mod record;
pub mod transport;

pub use buffer::{Batch, LogBuffer};
pub use client::Client;
pub use config::Config;
pub use errors::{Error, Result};
pub use record::{Level, Record};
pub use transport::{Delivery, HttpTransport, Transport};
