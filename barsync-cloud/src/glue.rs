//! Glue catalog client — AWS JSON 1.1 protocol over signed POSTs.
//!
//! Every operation is a POST to the regional endpoint with an
//! `X-Amz-Target: AWSGlue.<Operation>` header. Errors come back as JSON
//! with a `__type` discriminator; `EntityNotFoundException` and
//! `CrawlerRunningException` are the two the reconciler treats specially.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::aws::{sign_request, Credentials, SigningParams};
use crate::catalog::{
    CatalogApi, CatalogError, CrawlStatus, CrawlerDefinition, CrawlerSnapshot, CrawlerState,
    DatabaseSummary, DeleteBehavior, RecrawlBehavior, StartOutcome, UpdateBehavior,
};

const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

pub struct GlueCatalog {
    client: reqwest::blocking::Client,
    credentials: Credentials,
    region: String,
}

/// Error body shape shared by all operations.
#[derive(Debug, Deserialize)]
struct GlueErrorBody {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(rename = "Message", alias = "message")]
    message: Option<String>,
}

/// A rejected call, reduced to its discriminator and message.
struct GlueError {
    kind: String,
    message: String,
}

/// How one operation failed: rejected by the service, or never answered.
enum CallError {
    Rejected(GlueError),
    Transport(CatalogError),
}

impl GlueCatalog {
    pub fn new(credentials: Credentials, region: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            credentials,
            region: region.into(),
        }
    }

    /// Build a client with credentials from the environment.
    pub fn from_env(region: impl Into<String>) -> Result<Self, CatalogError> {
        let credentials =
            Credentials::from_env().map_err(|e| CatalogError::Credentials(e.to_string()))?;
        Ok(Self::new(credentials, region))
    }

    fn host(&self) -> String {
        format!("glue.{}.amazonaws.com", self.region)
    }

    /// Issue one operation against the regional endpoint.
    fn call(&self, operation: &str, payload: &impl Serialize) -> Result<String, CallError> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| CallError::Transport(CatalogError::ResponseFormatChanged(e.to_string())))?;
        let host = self.host();
        let target = format!("AWSGlue.{operation}");

        let extra = [
            ("content-type".to_string(), CONTENT_TYPE.to_string()),
            ("x-amz-target".to_string(), target.clone()),
        ];
        let params = SigningParams {
            credentials: &self.credentials,
            region: &self.region,
            service: "glue",
            now: Utc::now(),
        };
        let signed = sign_request(&params, "POST", &host, "/", "", &extra, &body);

        let mut request = self
            .client
            .post(format!("https://{host}/"))
            .header("content-type", CONTENT_TYPE)
            .header("x-amz-target", &target)
            .header("x-amz-date", &signed.amz_date)
            .header("authorization", &signed.authorization)
            .body(body);
        if let Some(token) = &signed.session_token {
            request = request.header("x-amz-security-token", token);
        }

        let response = request
            .send()
            .map_err(|e| CallError::Transport(CatalogError::NetworkUnreachable(e.to_string())))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|e| CallError::Transport(CatalogError::NetworkUnreachable(e.to_string())))?;

        if status.is_success() {
            return Ok(text);
        }

        let parsed: Option<GlueErrorBody> = serde_json::from_str(&text).ok();
        let kind = parsed
            .as_ref()
            .and_then(|e| e.error_type.as_deref())
            // `__type` may arrive namespaced: `com.amazonaws.glue#Name`.
            .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
            .unwrap_or_else(|| format!("HTTP{}", status.as_u16()));
        let message = parsed
            .and_then(|e| e.message)
            .unwrap_or_else(|| text.clone());

        Err(CallError::Rejected(GlueError { kind, message }))
    }
}

/// Collapse a failed call into `CatalogError` once the caller has handled
/// the kinds it treats specially.
fn api_error(error: CallError) -> CatalogError {
    match error {
        CallError::Rejected(rejected) => CatalogError::Api {
            kind: rejected.kind,
            message: rejected.message,
        },
        CallError::Transport(transport) => transport,
    }
}

fn is_kind(error: &CallError, kind: &str) -> bool {
    matches!(error, CallError::Rejected(rejected) if rejected.kind == kind)
}

// ── Wire payloads ────────────────────────────────────────────────────

#[derive(Serialize)]
struct NameRequest<'a> {
    #[serde(rename = "Name")]
    name: &'a str,
}

#[derive(Serialize)]
struct CreateDatabaseRequest<'a> {
    #[serde(rename = "DatabaseInput")]
    database_input: DatabaseInput<'a>,
}

#[derive(Serialize)]
struct DatabaseInput<'a> {
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Description")]
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct GetDatabaseResponse {
    #[serde(rename = "Database")]
    database: DatabasePayload,
}

#[derive(Debug, Deserialize)]
struct DatabasePayload {
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Serialize)]
struct CrawlerRequest<'a> {
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Role")]
    role: &'a str,
    #[serde(rename = "DatabaseName")]
    database_name: &'a str,
    #[serde(rename = "Targets")]
    targets: Targets<'a>,
    #[serde(rename = "TablePrefix")]
    table_prefix: &'a str,
    #[serde(rename = "SchemaChangePolicy")]
    schema_change_policy: SchemaChangePolicy,
    #[serde(rename = "RecrawlPolicy")]
    recrawl_policy: RecrawlPolicy,
}

#[derive(Serialize)]
struct Targets<'a> {
    #[serde(rename = "S3Targets")]
    s3_targets: Vec<S3Target<'a>>,
}

#[derive(Serialize)]
struct S3Target<'a> {
    #[serde(rename = "Path")]
    path: &'a str,
}

#[derive(Serialize)]
struct SchemaChangePolicy {
    #[serde(rename = "UpdateBehavior")]
    update_behavior: UpdateBehavior,
    #[serde(rename = "DeleteBehavior")]
    delete_behavior: DeleteBehavior,
}

#[derive(Serialize)]
struct RecrawlPolicy {
    #[serde(rename = "RecrawlBehavior")]
    recrawl_behavior: RecrawlBehavior,
}

impl<'a> CrawlerRequest<'a> {
    fn from_definition(definition: &'a CrawlerDefinition) -> Self {
        Self {
            name: &definition.name,
            role: &definition.role_arn,
            database_name: &definition.database_name,
            targets: Targets {
                s3_targets: vec![S3Target {
                    path: &definition.s3_target,
                }],
            },
            table_prefix: &definition.table_prefix,
            schema_change_policy: SchemaChangePolicy {
                update_behavior: definition.update_behavior,
                delete_behavior: definition.delete_behavior,
            },
            recrawl_policy: RecrawlPolicy {
                recrawl_behavior: definition.recrawl_behavior,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GetCrawlerResponse {
    #[serde(rename = "Crawler")]
    crawler: CrawlerPayload,
}

#[derive(Debug, Deserialize)]
struct CrawlerPayload {
    #[serde(rename = "State")]
    state: CrawlerState,
    #[serde(rename = "LastCrawl")]
    last_crawl: Option<LastCrawlPayload>,
}

#[derive(Debug, Deserialize)]
struct LastCrawlPayload {
    #[serde(rename = "Status")]
    status: Option<CrawlStatus>,
}

fn parse_response<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, CatalogError> {
    serde_json::from_str(text).map_err(|e| CatalogError::ResponseFormatChanged(e.to_string()))
}

impl CatalogApi for GlueCatalog {
    fn get_database(&self, name: &str) -> Result<Option<DatabaseSummary>, CatalogError> {
        match self.call("GetDatabase", &NameRequest { name }) {
            Ok(text) => {
                let response: GetDatabaseResponse = parse_response(&text)?;
                Ok(Some(DatabaseSummary {
                    name: response.database.name,
                }))
            }
            Err(error) if is_kind(&error, "EntityNotFoundException") => Ok(None),
            Err(error) => Err(api_error(error)),
        }
    }

    fn create_database(&self, name: &str, description: &str) -> Result<(), CatalogError> {
        self.call(
            "CreateDatabase",
            &CreateDatabaseRequest {
                database_input: DatabaseInput { name, description },
            },
        )
        .map(|_| ())
        .map_err(api_error)
    }

    fn get_crawler(&self, name: &str) -> Result<Option<CrawlerSnapshot>, CatalogError> {
        match self.call("GetCrawler", &NameRequest { name }) {
            Ok(text) => {
                let response: GetCrawlerResponse = parse_response(&text)?;
                Ok(Some(CrawlerSnapshot {
                    state: response.crawler.state,
                    last_crawl: response.crawler.last_crawl.and_then(|c| c.status),
                }))
            }
            Err(error) if is_kind(&error, "EntityNotFoundException") => Ok(None),
            Err(error) => Err(api_error(error)),
        }
    }

    fn create_crawler(&self, definition: &CrawlerDefinition) -> Result<(), CatalogError> {
        self.call("CreateCrawler", &CrawlerRequest::from_definition(definition))
            .map(|_| ())
            .map_err(api_error)
    }

    fn update_crawler(&self, definition: &CrawlerDefinition) -> Result<(), CatalogError> {
        self.call("UpdateCrawler", &CrawlerRequest::from_definition(definition))
            .map(|_| ())
            .map_err(api_error)
    }

    fn start_crawler(&self, name: &str) -> Result<StartOutcome, CatalogError> {
        match self.call("StartCrawler", &NameRequest { name }) {
            Ok(_) => Ok(StartOutcome::Started),
            Err(error) if is_kind(&error, "CrawlerRunningException") => {
                Ok(StartOutcome::AlreadyRunning)
            }
            Err(error) => Err(api_error(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crawler_request_serializes_the_full_definition() {
        let definition = CrawlerDefinition {
            name: "crawler_btc".into(),
            role_arn: "arn:aws:iam::123456789012:role/GlueCrawlerRole".into(),
            database_name: "trade_data".into(),
            s3_target: "s3://btc-bars/btc/".into(),
            table_prefix: String::new(),
            update_behavior: UpdateBehavior::UpdateInDatabase,
            delete_behavior: DeleteBehavior::DeprecateInDatabase,
            recrawl_behavior: RecrawlBehavior::CrawlEverything,
        };

        let json =
            serde_json::to_value(CrawlerRequest::from_definition(&definition)).unwrap();
        assert_eq!(json["Name"], "crawler_btc");
        assert_eq!(json["Targets"]["S3Targets"][0]["Path"], "s3://btc-bars/btc/");
        assert_eq!(json["TablePrefix"], "");
        assert_eq!(
            json["SchemaChangePolicy"]["UpdateBehavior"],
            "UPDATE_IN_DATABASE"
        );
        assert_eq!(
            json["SchemaChangePolicy"]["DeleteBehavior"],
            "DEPRECATE_IN_DATABASE"
        );
        assert_eq!(json["RecrawlPolicy"]["RecrawlBehavior"], "CRAWL_EVERYTHING");
    }

    #[test]
    fn crawler_snapshot_parses_from_wire_shape() {
        let text = r#"{
            "Crawler": {
                "Name": "crawler_btc",
                "State": "READY",
                "LastCrawl": { "Status": "SUCCEEDED" }
            }
        }"#;

        let response: GetCrawlerResponse = parse_response(text).unwrap();
        assert_eq!(response.crawler.state, CrawlerState::Ready);
        assert_eq!(
            response.crawler.last_crawl.unwrap().status,
            Some(CrawlStatus::Succeeded)
        );
    }

    #[test]
    fn namespaced_error_types_are_stripped() {
        let text = r#"{"__type":"com.amazonaws.glue#EntityNotFoundException","Message":"no such"}"#;
        let parsed: GlueErrorBody = serde_json::from_str(text).unwrap();
        let kind = parsed
            .error_type
            .as_deref()
            .map(|t| t.rsplit('#').next().unwrap_or(t))
            .unwrap();
        assert_eq!(kind, "EntityNotFoundException");
    }
}
