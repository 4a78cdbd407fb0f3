//! Catalog reconciliation — database, crawler definition, run polling.
//!
//! The crawler is a remote state machine we observe but do not own:
//! idle (`READY`) → `RUNNING` → idle again with a last-crawl outcome.
//! The reconciler models that explicitly instead of re-deriving it from
//! loose string fields on every poll.

use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use barsync_core::config::PipelineConfig;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("catalog call rejected ({kind}): {message}")]
    Api { kind: String, message: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("missing credentials: {0}")]
    Credentials(String),

    #[error("timed out after {waited:?} waiting for crawler '{crawler}' to go idle")]
    Timeout { crawler: String, waited: Duration },
}

/// Remote crawler lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrawlerState {
    Ready,
    Running,
    Stopping,
}

/// Terminal status of the most recent crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrawlStatus {
    Succeeded,
    Failed,
    Cancelled,
}

/// How the crawler folds schema changes back into the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateBehavior {
    Log,
    UpdateInDatabase,
}

/// What happens to tables whose backing data disappeared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeleteBehavior {
    Log,
    DeleteFromDatabase,
    DeprecateInDatabase,
}

/// Whether every run re-reads everything or only new folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecrawlBehavior {
    CrawlEverything,
    CrawlNewFoldersOnly,
}

/// Desired crawler definition. Updates overwrite the whole definition,
/// they never patch.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlerDefinition {
    pub name: String,
    pub role_arn: String,
    pub database_name: String,
    pub s3_target: String,
    pub table_prefix: String,
    pub update_behavior: UpdateBehavior,
    pub delete_behavior: DeleteBehavior,
    pub recrawl_behavior: RecrawlBehavior,
}

impl CrawlerDefinition {
    /// The fixed definition this pipeline maintains: update tables in
    /// place, deprecate removed data, recrawl everything every run.
    pub fn for_pipeline(config: &PipelineConfig) -> Self {
        Self {
            name: config.crawler_name.clone(),
            role_arn: config.role_arn.clone(),
            database_name: config.database_name.clone(),
            s3_target: config.s3_target_path(),
            table_prefix: String::new(),
            update_behavior: UpdateBehavior::UpdateInDatabase,
            delete_behavior: DeleteBehavior::DeprecateInDatabase,
            recrawl_behavior: RecrawlBehavior::CrawlEverything,
        }
    }
}

/// Catalog database summary as returned by a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSummary {
    pub name: String,
}

/// Observed crawler snapshot from one poll.
#[derive(Debug, Clone)]
pub struct CrawlerSnapshot {
    pub state: CrawlerState,
    pub last_crawl: Option<CrawlStatus>,
}

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// The crawler was already mid-run; not an error, polling proceeds.
    AlreadyRunning,
}

/// Remote catalog operations the reconciler needs. "Not found" lookups
/// return `None`; every other remote failure is a `CatalogError`.
pub trait CatalogApi {
    fn get_database(&self, name: &str) -> Result<Option<DatabaseSummary>, CatalogError>;
    fn create_database(&self, name: &str, description: &str) -> Result<(), CatalogError>;
    fn get_crawler(&self, name: &str) -> Result<Option<CrawlerSnapshot>, CatalogError>;
    fn create_crawler(&self, definition: &CrawlerDefinition) -> Result<(), CatalogError>;
    fn update_crawler(&self, definition: &CrawlerDefinition) -> Result<(), CatalogError>;
    fn start_crawler(&self, name: &str) -> Result<StartOutcome, CatalogError>;
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Created,
    Updated,
}

/// "Fetch, then create or overwrite" — the idempotent upsert idiom the
/// database and crawler resources share.
fn upsert<T>(
    fetch: impl FnOnce() -> Result<Option<T>, CatalogError>,
    create: impl FnOnce() -> Result<(), CatalogError>,
    update: impl FnOnce(T) -> Result<(), CatalogError>,
) -> Result<UpsertAction, CatalogError> {
    match fetch()? {
        None => {
            create()?;
            Ok(UpsertAction::Created)
        }
        Some(existing) => {
            update(existing)?;
            Ok(UpsertAction::Updated)
        }
    }
}

/// Ensure the catalog database exists. Calling twice never errors.
pub fn ensure_database(
    catalog: &dyn CatalogApi,
    name: &str,
) -> Result<UpsertAction, CatalogError> {
    upsert(
        || catalog.get_database(name),
        || catalog.create_database(name, &format!("Data catalog for {name}")),
        // Databases carry no definition of ours to overwrite.
        |_existing| Ok(()),
    )
}

/// Create the crawler if absent, otherwise overwrite it with `definition`.
pub fn upsert_crawler(
    catalog: &dyn CatalogApi,
    definition: &CrawlerDefinition,
) -> Result<UpsertAction, CatalogError> {
    upsert(
        || catalog.get_crawler(&definition.name),
        || catalog.create_crawler(definition),
        |_existing| catalog.update_crawler(definition),
    )
}

/// Classified outcome of one reconciled crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    Succeeded,
    /// The crawl itself failed. Reported, not raised — the crawler is
    /// idle again and the pipeline's work is done.
    Failed,
    /// Idle again without a classifiable last-crawl status.
    Idle,
}

/// Poll cadence and ceiling for `run_and_wait`.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(1800),
        }
    }
}

impl PollSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.poll_interval_s),
            timeout: Duration::from_secs(config.timeout_s),
        }
    }
}

/// Progress callbacks for the reconcile + poll sequence.
pub trait CrawlProgress {
    fn on_database(&self, name: &str, action: UpsertAction);
    fn on_crawler(&self, name: &str, action: UpsertAction, s3_target: &str);
    fn on_started(&self, crawler: &str);
    fn on_already_running(&self, crawler: &str);
    fn on_poll(&self, crawler: &str, snapshot: &CrawlerSnapshot);
    fn on_idle(&self, crawler: &str, outcome: CrawlOutcome);
}

/// Prints the reconcile and poll lines the original crawler script did.
pub struct StdoutCrawlProgress;

impl CrawlProgress for StdoutCrawlProgress {
    fn on_database(&self, name: &str, action: UpsertAction) {
        match action {
            UpsertAction::Created => println!("Created database: {name}"),
            UpsertAction::Updated => println!("Database already exists: {name}"),
        }
    }

    fn on_crawler(&self, name: &str, action: UpsertAction, s3_target: &str) {
        match action {
            UpsertAction::Created => println!("Created crawler: {name} (target: {s3_target})"),
            UpsertAction::Updated => println!("Updated crawler: {name} (target: {s3_target})"),
        }
    }

    fn on_started(&self, crawler: &str) {
        println!("Running crawler: {crawler} ...");
    }

    fn on_already_running(&self, crawler: &str) {
        println!("Crawler already running: {crawler}");
    }

    fn on_poll(&self, _crawler: &str, snapshot: &CrawlerSnapshot) {
        println!(
            "State: {:?} | last crawl: {}",
            snapshot.state,
            snapshot
                .last_crawl
                .map(|s| format!("{s:?}"))
                .unwrap_or_else(|| "-".to_string())
        );
    }

    fn on_idle(&self, _crawler: &str, outcome: CrawlOutcome) {
        match outcome {
            CrawlOutcome::Succeeded => println!("Crawler finished successfully."),
            CrawlOutcome::Failed => println!("Crawler FAILED."),
            CrawlOutcome::Idle => println!("Crawler idle."),
        }
    }
}

/// Silent progress for tests and embedding.
pub struct NoCrawlProgress;

impl CrawlProgress for NoCrawlProgress {
    fn on_database(&self, _name: &str, _action: UpsertAction) {}
    fn on_crawler(&self, _name: &str, _action: UpsertAction, _s3_target: &str) {}
    fn on_started(&self, _crawler: &str) {}
    fn on_already_running(&self, _crawler: &str) {}
    fn on_poll(&self, _crawler: &str, _snapshot: &CrawlerSnapshot) {}
    fn on_idle(&self, _crawler: &str, _outcome: CrawlOutcome) {}
}

/// Start the crawler and block until it is idle again, classifying the
/// run from its last-crawl status.
///
/// A crawler that is already running is joined, not restarted. If the
/// idle state is not reached within `settings.timeout`, the call fails
/// with [`CatalogError::Timeout`] and makes no further remote calls; the
/// remote run keeps going on its own.
pub fn run_and_wait(
    catalog: &dyn CatalogApi,
    name: &str,
    settings: &PollSettings,
    progress: &dyn CrawlProgress,
) -> Result<CrawlOutcome, CatalogError> {
    match catalog.start_crawler(name)? {
        StartOutcome::Started => progress.on_started(name),
        StartOutcome::AlreadyRunning => progress.on_already_running(name),
    }

    let started = Instant::now();
    loop {
        let snapshot = catalog.get_crawler(name)?.ok_or_else(|| CatalogError::Api {
            kind: "EntityNotFoundException".into(),
            message: format!("crawler '{name}' disappeared while polling"),
        })?;
        progress.on_poll(name, &snapshot);

        if snapshot.state == CrawlerState::Ready {
            let outcome = match snapshot.last_crawl {
                Some(CrawlStatus::Succeeded) => CrawlOutcome::Succeeded,
                Some(CrawlStatus::Failed) => CrawlOutcome::Failed,
                _ => CrawlOutcome::Idle,
            };
            progress.on_idle(name, outcome);
            return Ok(outcome);
        }

        if started.elapsed() >= settings.timeout {
            return Err(CatalogError::Timeout {
                crawler: name.to_string(),
                waited: started.elapsed(),
            });
        }

        thread::sleep(settings.interval);
    }
}
