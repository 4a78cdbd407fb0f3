//! BarSync Core — data acquisition, partitioning, and the local CSV layout.
//!
//! This crate contains the local half of the partition-and-sync pipeline:
//! - Market-data provider seam and the Binance klines implementation
//! - Year/month partitioner over raw bars
//! - CSV layout writer (`<base>/<year>/<month>.csv`)
//! - Pipeline configuration
//!
//! Remote side effects (object-store mirror, catalog reconciliation) live
//! in `barsync-cloud`.

pub mod config;
pub mod data;
pub mod layout;
pub mod partition;
