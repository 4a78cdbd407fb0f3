//! Pipeline orchestration — the two entry points as library calls.
//!
//! `run_sync` is fetch → partition → write → mirror; `run_crawl` is
//! ensure database → upsert crawler → start and wait. Both run strictly
//! sequentially against trait objects so every collaborator can be faked.
//! There is no rollback: a failure after a partial upload leaves the
//! already-uploaded objects in place.

use thiserror::Error;

use barsync_core::config::PipelineConfig;
use barsync_core::data::{DataError, MarketDataProvider};
use barsync_core::layout::{self, LayoutError};
use barsync_core::partition::partition;

use crate::catalog::{
    self, CatalogApi, CatalogError, CrawlOutcome, CrawlProgress, CrawlerDefinition, PollSettings,
};
use crate::mirror::{self, MirrorError, MirrorProgress};
use crate::store::ObjectStore;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("mirror error: {0}")]
    Mirror(#[from] MirrorError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Counters from one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub fetched: usize,
    pub dropped_rows: usize,
    pub files_written: usize,
    pub objects_uploaded: usize,
}

/// Fetch bars, partition them, write the local layout, mirror it.
pub fn run_sync(
    config: &PipelineConfig,
    provider: &dyn MarketDataProvider,
    store: &dyn ObjectStore,
    progress: &dyn MirrorProgress,
) -> Result<SyncReport, PipelineError> {
    let records = provider.fetch(&config.fetch_request())?;
    let fetched = records.len();

    let partitioned = partition(&records);
    if partitioned.dropped_rows > 0 {
        eprintln!(
            "WARNING: dropped {} row(s) with unparseable timestamps",
            partitioned.dropped_rows
        );
    }

    let written = layout::write_groups(&partitioned.groups, &config.output_dir)?;

    let uploaded = mirror::mirror(
        &config.output_dir,
        &config.bucket,
        &config.key_prefix,
        store,
        progress,
    )?;

    Ok(SyncReport {
        fetched,
        dropped_rows: partitioned.dropped_rows,
        files_written: written.len(),
        objects_uploaded: uploaded,
    })
}

/// Reconcile the catalog database and crawler, then run it to completion.
///
/// A crawl that terminates `FAILED` is reported through `progress` and
/// returned as an outcome, not an error; only transport failures and the
/// poll timeout raise.
pub fn run_crawl(
    config: &PipelineConfig,
    catalog_api: &dyn CatalogApi,
    progress: &dyn CrawlProgress,
) -> Result<CrawlOutcome, PipelineError> {
    let action = catalog::ensure_database(catalog_api, &config.database_name)?;
    progress.on_database(&config.database_name, action);

    let definition = CrawlerDefinition::for_pipeline(config);
    let action = catalog::upsert_crawler(catalog_api, &definition)?;
    progress.on_crawler(&definition.name, action, &definition.s3_target);

    let settings = PollSettings::from_config(config);
    let outcome = catalog::run_and_wait(catalog_api, &definition.name, &settings, progress)?;
    Ok(outcome)
}
