//! Keeper service for an on-chain 5G hotspot registry
//!
//! Assigns placeholder coordinates to unlocated hotspots, simulates their
//! online status, and rotates over a pool of admin signing keys so that
//! registry writes can be in flight concurrently.

pub mod config;
pub mod flow;
pub mod http;
pub mod jobs;
pub mod keys;
