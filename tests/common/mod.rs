#![allow(dead_code)]

use std::sync::Arc;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use token_warden::telemetry::{MemorySink, Telemetry};
use token_warden::{TokenValidator, ValidatorConfig};

pub const ISSUER: &str = "https://issuer.example";
pub const AUDIENCE: &str = "api://aud";
pub const USER_ID: &str = "ABC123";
pub const ENTITY_ID: &str = "XYZ789";

/// Certificate bundled with the crate (public half of `signer_key`)
pub const CERTIFICATE_PEM: &str = include_str!("../../resources/certificate.pem");
pub const EC_CERTIFICATE_PEM: &str = include_str!("../fixtures/ec_certificate.pem");

// Test-only RSA keys, DO NOT use in production
const SIGNER_KEY_PEM: &str = include_str!("../fixtures/signer_key.pem");
const OTHER_KEY_PEM: &str = include_str!("../fixtures/other_key.pem");

/// Private key matching the bundled certificate
pub fn signer_key() -> EncodingKey {
    EncodingKey::from_rsa_pem(SIGNER_KEY_PEM.as_bytes()).expect("Failed to create signer key")
}

/// An unrelated RSA key
pub fn other_key() -> EncodingKey {
    EncodingKey::from_rsa_pem(OTHER_KEY_PEM.as_bytes()).expect("Failed to create other key")
}

/// DER encoding of the bundled certificate
pub fn certificate_der() -> Vec<u8> {
    pem::parse(CERTIFICATE_PEM)
        .expect("Failed to parse bundled certificate")
        .contents()
        .to_vec()
}

/// Create an RS256 JWT
pub fn create_test_jwt<T: Serialize>(claims: &T, key: &EncodingKey) -> String {
    create_jwt_with_algorithm(claims, key, Algorithm::RS256)
}

/// Create a JWT signed with the given algorithm
pub fn create_jwt_with_algorithm<T: Serialize>(
    claims: &T,
    key: &EncodingKey,
    algorithm: Algorithm,
) -> String {
    jsonwebtoken::encode(&Header::new(algorithm), claims, key).expect("Failed to encode JWT")
}

/// Build a validator for `ISSUER`/`AUDIENCE` that records telemetry in memory
pub async fn memory_validator() -> (TokenValidator, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let config = ValidatorConfig::new(ISSUER, AUDIENCE);
    let validator = TokenValidator::new(config, Telemetry::from_shared(sink.clone()))
        .await
        .expect("Failed to build validator");
    (validator, sink)
}

/// Claims for tokens issued in tests
#[derive(Debug, Clone, Serialize)]
pub struct TestClaims {
    pub iss: String,
    pub aud: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entityid: Option<String>,
}

impl TestClaims {
    /// Create valid claims that expire in 1 hour
    pub fn valid() -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            exp: Some(now + 3600),
            nbf: None,
            iat: Some(now),
            userid: Some(USER_ID.to_string()),
            entityid: Some(ENTITY_ID.to_string()),
        }
    }

    /// Create claims that expired the given number of seconds ago
    pub fn expired_by(seconds: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            exp: Some(now - seconds),
            iat: Some(now - 3600),
            ..Self::valid()
        }
    }

    /// Create claims that only become valid in 10 minutes
    pub fn not_yet_valid() -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            nbf: Some(now + 600),
            ..Self::valid()
        }
    }

    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.iss = issuer.to_string();
        self
    }

    pub fn with_audience(mut self, audience: &str) -> Self {
        self.aud = audience.to_string();
        self
    }

    pub fn without_exp(mut self) -> Self {
        self.exp = None;
        self
    }

    pub fn without_entity_id(mut self) -> Self {
        self.entityid = None;
        self
    }

    pub fn with_user_id(mut self, user_id: &str) -> Self {
        self.userid = Some(user_id.to_string());
        self
    }
}
