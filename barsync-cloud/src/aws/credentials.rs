//! Static credentials resolved from the environment.
//!
//! The richer named-profile/session collaborator stays outside this
//! pipeline; the standard `AWS_*` variables are enough for both clients.

use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("missing credentials: {0} is not set")]
pub struct CredentialsError(pub &'static str);

#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Credentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
        }
    }

    /// Resolve from `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`
    /// (+ optional `AWS_SESSION_TOKEN`).
    pub fn from_env() -> Result<Self, CredentialsError> {
        let access_key_id =
            env::var("AWS_ACCESS_KEY_ID").map_err(|_| CredentialsError("AWS_ACCESS_KEY_ID"))?;
        let secret_access_key = env::var("AWS_SECRET_ACCESS_KEY")
            .map_err(|_| CredentialsError("AWS_SECRET_ACCESS_KEY"))?;
        let session_token = env::var("AWS_SESSION_TOKEN").ok();

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secrets() {
        let credentials = Credentials::new("AKIDEXAMPLE", "very-secret", Some("token".into()));
        let debug = format!("{credentials:?}");
        assert!(debug.contains("AKIDEXAMPLE"));
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("token"));
    }
}
