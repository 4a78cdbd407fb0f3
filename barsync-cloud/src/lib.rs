//! BarSync Cloud — remote side effects of the partition-and-sync pipeline.
//!
//! - Object-store seam and the signed S3 client
//! - Remote mirror: local `<year>/<month>.csv` layout → Hive-style keys
//! - Catalog seam, Glue client, and the crawler reconciler
//! - Pipeline orchestration (`run_sync`, `run_crawl`)
//!
//! Everything here is synchronous and blocking; the only suspension point
//! is the reconciler's fixed-interval poll loop.

pub mod aws;
pub mod catalog;
pub mod glue;
pub mod mirror;
pub mod pipeline;
pub mod s3;
pub mod store;
