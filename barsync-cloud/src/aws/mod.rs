//! Minimal AWS request plumbing shared by the S3 and Glue clients.

pub mod credentials;
pub mod sign;

pub use credentials::{Credentials, CredentialsError};
pub use sign::{sign_request, SignedHeaders, SigningParams};
