//! # token-warden
//!
//! RS256 JSON Web Token validation against an RSA public key taken from a
//! bundled X.509 certificate, with structured telemetry for every attempt.
//!
//! ## Features
//!
//! - RSA public key extraction from a PEM or DER certificate resource
//! - Signature verification pinned to RS256
//! - Exact issuer and audience matching, lifetime checks with zero clock skew
//! - Case-insensitive matching of the `userid` and `entityid` custom claims
//! - One telemetry event per validation attempt, delivered to Elasticsearch,
//!   `tracing` or any custom [`TelemetrySink`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use token_warden::telemetry::{ElasticsearchConfig, ElasticsearchSink, Telemetry};
//! use token_warden::{TokenValidator, ValidateToken, ValidatorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (sink, worker) = ElasticsearchSink::spawn(ElasticsearchConfig::default());
//!
//!     let config = ValidatorConfig::new("https://issuer.example", "api://aud");
//!     let validator = TokenValidator::new(config, Telemetry::new(sink)).await?;
//!
//!     let token = "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9...";
//!     if validator.is_valid_token(token, "abc123", "xyz789") {
//!         println!("Token is valid.");
//!     }
//!
//!     drop(validator);
//!     worker.closed().await;
//!     Ok(())
//! }
//! ```

mod claims;
mod config;
mod error;
mod key_provider;
pub mod resources;
pub mod telemetry;
mod validator;

// Re-exports for public API
pub use claims::StandardClaims;
pub use claims::TokenClaims;
pub use config::ValidatorConfig;
pub use error::Error;
pub use error::Result;
pub use key_provider::KeyProvider;
pub use key_provider::RsaPublicKey;
pub use telemetry::Correlation;
pub use telemetry::TelemetrySink;
pub use validator::TokenValidator;
pub use validator::ValidateToken;
pub use validator::ValidationRequest;
