use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::Algorithm;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Certificate resource '{0}' not found")]
    ResourceNotFound(String),
    #[error("Failed to read certificate resource '{name}'")]
    ResourceRead {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Reading certificate resource '{name}' did not finish within {timeout:?}")]
    ResourceTimeout { name: String, timeout: Duration },
    #[error("Failed to parse certificate: {0}")]
    CertificateParse(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("Token is not a well-formed JWT")]
    TokenStructure(#[source] jsonwebtoken::errors::Error),
    #[error("Token signature or algorithm rejected")]
    SignatureOrAlgorithm(#[source] jsonwebtoken::errors::Error),
    #[error("Token issuer, audience or lifetime rejected")]
    IssuerAudienceLifetime(#[source] jsonwebtoken::errors::Error),
    #[error("Token header algorithm {0:?} is not RS256")]
    AlgorithmMismatch(Algorithm),
    #[error("Claim '{0}' is missing from the token")]
    MissingClaim(&'static str),
    #[error("Claim '{0}' does not match the expected value")]
    ClaimMismatch(&'static str),
    #[error("Telemetry delivery failed: {0}")]
    Telemetry(String),
}

impl Error {
    /// True for tokens that verified cleanly but do not carry the expected
    /// algorithm header or authorization claims. These are reported at info
    /// level; everything else is an error-level event.
    pub fn is_authorization_mismatch(&self) -> bool {
        matches!(
            self,
            Error::AlgorithmMismatch(_) | Error::MissingClaim(_) | Error::ClaimMismatch(_)
        )
    }

    /// Render the error together with its source chain.
    pub fn describe(&self) -> String {
        let mut description = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            description.push_str(": ");
            description.push_str(&cause.to_string());
            source = cause.source();
        }
        description
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        match error.kind() {
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::InvalidRsaKey(_) => Error::SignatureOrAlgorithm(error),
            ErrorKind::ExpiredSignature
            | ErrorKind::ImmatureSignature
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::MissingRequiredClaim(_) => Error::IssuerAudienceLifetime(error),
            _ => Error::TokenStructure(error),
        }
    }
}

pub(crate) fn index_document_error(error: reqwest::Error) -> Error {
    Error::Telemetry(format!("Failed to index telemetry document: {error}"))
}

pub(crate) fn certificate_parse_error(error: impl std::fmt::Display) -> Error {
    Error::CertificateParse(error.to_string())
}
