use std::time::Instant;

use chrono::Utc;
use jsonwebtoken::decode;
use jsonwebtoken::decode_header;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::Algorithm;
use jsonwebtoken::TokenData;
use jsonwebtoken::Validation;

use crate::claims::ExpectedClaims;
use crate::claims::StandardClaims;
use crate::claims::TokenClaims;
use crate::config::ValidatorConfig;
use crate::error::Error;
use crate::error::Result;
use crate::key_provider::KeyProvider;
use crate::key_provider::RsaPublicKey;
use crate::telemetry::Correlation;
use crate::telemetry::Telemetry;

const REQUIRED_CLAIMS: [&str; 3] = ["exp", "iss", "aud"];

const VALIDATION_SUCCEEDED: &str = "Token validation successful.";
const VALIDATION_MISMATCHED: &str =
    "Token validation failed: token does not match the expected algorithm or claims.";
const VALIDATION_FAILED: &str = "Token validation failed.";

/// A single validation call: the token and the claim values it must carry
#[derive(Debug, Clone, Copy)]
pub struct ValidationRequest<'a> {
    pub token: &'a str,
    pub user_id: &'a str,
    pub entity_id: &'a str,
}

impl<'a> ValidationRequest<'a> {
    pub fn new(token: &'a str, user_id: &'a str, entity_id: &'a str) -> Self {
        Self {
            token,
            user_id,
            entity_id,
        }
    }

    fn correlation(&self) -> Correlation {
        Correlation::new(self.token, self.user_id, self.entity_id)
    }
}

/// Trait for token validation
pub trait ValidateToken {
    /// Validate a token, reporting why it was rejected
    fn validate(&self, request: &ValidationRequest<'_>) -> Result<()>;

    /// Validate a token, collapsing every rejection to `false`
    fn is_valid_token(&self, token: &str, user_id: &str, entity_id: &str) -> bool {
        self.validate(&ValidationRequest::new(token, user_id, entity_id))
            .is_ok()
    }
}

/// Everything fixed at construction: expectations, key and verification rules
struct ValidationContext {
    issuer: String,
    audience: String,
    public_key: RsaPublicKey,
    validation: Validation,
}

impl ValidationContext {
    fn new(issuer: String, audience: String, public_key: RsaPublicKey) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[&issuer]);
        validation.set_audience(&[&audience]);
        validation.set_required_spec_claims(&REQUIRED_CLAIMS);

        Self {
            issuer,
            audience,
            public_key,
            validation,
        }
    }
}

/// RS256 token validator bound to one issuer, one audience and one
/// certificate-backed public key
///
/// The key is resolved once at construction and never changes afterwards, so a
/// validator can be shared across threads and called concurrently.
pub struct TokenValidator {
    context: ValidationContext,
    telemetry: Telemetry,
}

impl TokenValidator {
    /// Create a validator, resolving the public key from the configured
    /// certificate resource
    ///
    /// # Errors
    /// Returns the key provider's error if the certificate cannot be read or
    /// parsed, or `Error::InvalidConfiguration` for an empty issuer or audience.
    pub async fn new(config: ValidatorConfig, telemetry: Telemetry) -> Result<Self> {
        Self::with_correlation(config, telemetry, Correlation::default()).await
    }

    /// Like [`TokenValidator::new`], tagging the key resolution event with the
    /// given correlation fields
    ///
    /// The correlation only feeds telemetry; any content is accepted.
    pub async fn with_correlation(
        config: ValidatorConfig,
        telemetry: Telemetry,
        correlation: Correlation,
    ) -> Result<Self> {
        config.validate()?;

        let provider = KeyProvider::new(
            config.certificate_source,
            config.resource_name,
            config.resource_timeout,
            telemetry.clone(),
        );
        let public_key = provider.resolve_public_key(&correlation).await?;

        Ok(Self {
            context: ValidationContext::new(config.issuer, config.audience, public_key),
            telemetry,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.context.issuer
    }

    pub fn audience(&self) -> &str {
        &self.context.audience
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.context.public_key
    }

    /// Parse, verify the signature and check issuer, audience and lifetime
    fn verify(&self, token: &str) -> Result<TokenData<TokenClaims>> {
        decode_header(token).map_err(Error::TokenStructure)?;

        let token_data = decode::<TokenClaims>(
            token,
            self.context.public_key.decoding_key(),
            &self.context.validation,
        )?;

        check_lifetime(&token_data.claims, Utc::now().timestamp())?;

        Ok(token_data)
    }

    /// Confirm the algorithm header and match the expected custom claims
    fn authorize(
        &self,
        token_data: &TokenData<TokenClaims>,
        request: &ValidationRequest<'_>,
    ) -> Result<()> {
        if !is_rs256(token_data.header.alg) {
            return Err(Error::AlgorithmMismatch(token_data.header.alg));
        }

        ExpectedClaims {
            user_id: request.user_id,
            entity_id: request.entity_id,
        }
        .check(&token_data.claims)
    }
}

impl ValidateToken for TokenValidator {
    fn validate(&self, request: &ValidationRequest<'_>) -> Result<()> {
        let started = Instant::now();

        let result = self
            .verify(request.token)
            .and_then(|token_data| self.authorize(&token_data, request));

        let correlation = request.correlation();
        match &result {
            Ok(()) => self.telemetry.info(VALIDATION_SUCCEEDED, started, &correlation),
            Err(err) if err.is_authorization_mismatch() => {
                tracing::debug!(reason = %err, "token does not match expected claims");
                self.telemetry.info(VALIDATION_MISMATCHED, started, &correlation)
            }
            Err(err) => {
                tracing::debug!(reason = %err, "token rejected");
                self.telemetry.error(VALIDATION_FAILED, err, started, &correlation)
            }
        }

        result
    }
}

/// Zero-tolerance lifetime check on top of the decoder's own
fn check_lifetime(claims: &impl StandardClaims, now: i64) -> Result<()> {
    if claims.exp() < now {
        return Err(Error::IssuerAudienceLifetime(
            ErrorKind::ExpiredSignature.into(),
        ));
    }

    let not_yet_valid = claims.nbf().is_some_and(|nbf| nbf > now)
        || claims.iat().is_some_and(|iat| iat > now);
    if not_yet_valid {
        return Err(Error::IssuerAudienceLifetime(
            ErrorKind::ImmatureSignature.into(),
        ));
    }

    Ok(())
}

fn is_rs256(algorithm: Algorithm) -> bool {
    algorithm == Algorithm::RS256
}
