//! S3 object store — signed HTTP PUT to the virtual-hosted bucket endpoint.

use std::time::Duration;

use chrono::Utc;

use crate::aws::{sign, Credentials, SigningParams};
use crate::store::{ObjectStore, StoreError};

pub struct S3Store {
    client: reqwest::blocking::Client,
    credentials: Credentials,
    region: String,
}

impl S3Store {
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

    /// Build a store with credentials from the environment.
    pub fn from_env(region: impl Into<String>) -> Result<Self, StoreError> {
        let credentials =
            Credentials::from_env().map_err(|e| StoreError::Credentials(e.to_string()))?;
        Ok(Self::new(credentials, region))
    }

    fn host(&self, bucket: &str) -> String {
        format!("{bucket}.s3.{}.amazonaws.com", self.region)
    }
}

impl ObjectStore for S3Store {
    fn name(&self) -> &str {
        "s3"
    }

    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), StoreError> {
        let host = self.host(bucket);
        // The canonical path doubles as the request path; S3 decodes it
        // back into the object key.
        let path = format!("/{}", sign::uri_encode(key, false));

        let params = SigningParams {
            credentials: &self.credentials,
            region: &self.region,
            service: "s3",
            now: Utc::now(),
        };
        let signed = sign::sign_request(&params, "PUT", &host, &path, "", &[], body);

        let mut request = self
            .client
            .put(format!("https://{host}{path}"))
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-content-sha256", &signed.content_sha256)
            .header("authorization", &signed.authorization)
            .body(body.to_vec());
        if let Some(token) = &signed.session_token {
            request = request.header("x-amz-security-token", token);
        }

        let response = request
            .send()
            .map_err(|e| StoreError::NetworkUnreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_hosted_endpoint() {
        let store = S3Store::new(Credentials::new("AKID", "secret", None), "eu-south-2");
        assert_eq!(store.host("btc-bars"), "btc-bars.s3.eu-south-2.amazonaws.com");
    }
}
