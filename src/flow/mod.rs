//! Chain access for the hotspot registry
//!
//! Talks to a Flow access node over its REST API and signs admin
//! transactions locally.
//!
//! ## How a registry write works:
//! 1. Lease a free admin key index from the [`KeyPool`](crate::keys::KeyPool)
//! 2. Read that key's sequence number and the latest sealed block
//! 3. Build, sign and submit the transaction envelope
//! 4. Poll the transaction result until it is sealed, then release the key

pub mod access;
pub mod cadence;
pub mod scripts;
pub mod service;
pub mod signer;
pub mod types;

use async_trait::async_trait;
use types::{Hotspot, Location, TxOutcome};

pub use service::FlowService;

/// The registry operations the background jobs depend on
#[async_trait]
pub trait Registry: Send + Sync {
    async fn all_hotspots(&self) -> anyhow::Result<Vec<Hotspot>>;

    async fn update_location(&self, id: u64, location: Location) -> anyhow::Result<TxOutcome>;

    async fn update_status(&self, id: u64, online: bool) -> anyhow::Result<TxOutcome>;
}
