//! RSA public key acquisition from a bundled X.509 certificate
//!
//! The provider reads one certificate resource, parses it (PEM armor is
//! detected, anything else is treated as DER) and keeps the RSA public key.
//! Each call to [`KeyProvider::resolve_public_key`] is timed and reported as a
//! single telemetry event, whatever the outcome.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use jsonwebtoken::DecodingKey;
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;
use x509_parser::public_key::PublicKey;

use crate::error::certificate_parse_error;
use crate::error::Error;
use crate::error::Result;
use crate::resources::CertificateSource;
use crate::telemetry::Correlation;
use crate::telemetry::Telemetry;

const PEM_CERTIFICATE_TAG: &str = "CERTIFICATE";
const PEM_ARMOR: &[u8] = b"-----BEGIN";

/// RSA public key taken from a certificate
#[derive(Clone)]
pub struct RsaPublicKey {
    decoding_key: DecodingKey,
    modulus_bits: usize,
    subject: String,
}

impl RsaPublicKey {
    /// Extract the RSA public key from PEM or DER certificate bytes
    ///
    /// # Errors
    /// Returns `Error::CertificateParse` if the bytes are not a certificate or
    /// the certificate does not hold an RSA key.
    pub fn from_certificate(bytes: &[u8]) -> Result<Self> {
        let der = certificate_der(bytes)?;
        let (_, certificate) = X509Certificate::from_der(&der).map_err(certificate_parse_error)?;

        let rsa = match certificate.public_key().parsed().map_err(certificate_parse_error)? {
            PublicKey::RSA(rsa) => rsa,
            _ => {
                return Err(Error::CertificateParse(
                    "certificate does not carry an RSA public key".to_string(),
                ))
            }
        };

        // DER integers keep a leading zero byte for positive values
        let modulus = strip_leading_zeros(rsa.modulus);
        let exponent = strip_leading_zeros(rsa.exponent);
        if modulus.is_empty() || exponent.is_empty() {
            return Err(Error::CertificateParse(
                "RSA public key has an empty modulus or exponent".to_string(),
            ));
        }

        Ok(Self {
            decoding_key: DecodingKey::from_rsa_raw_components(modulus, exponent),
            modulus_bits: bit_length(modulus),
            subject: certificate.subject().to_string(),
        })
    }

    /// Size of the RSA modulus in bits
    pub fn modulus_bits(&self) -> usize {
        self.modulus_bits
    }

    /// Subject distinguished name of the certificate the key came from
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for RsaPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaPublicKey")
            .field("modulus_bits", &self.modulus_bits)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

/// Resolves the validator's public key from a certificate resource
#[derive(Debug, Clone)]
pub struct KeyProvider {
    source: Arc<dyn CertificateSource>,
    resource_name: String,
    read_timeout: Duration,
    telemetry: Telemetry,
}

impl KeyProvider {
    pub fn new(
        source: Arc<dyn CertificateSource>,
        resource_name: impl Into<String>,
        read_timeout: Duration,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            source,
            resource_name: resource_name.into(),
            read_timeout,
            telemetry,
        }
    }

    /// Load the certificate resource and extract its RSA public key
    ///
    /// The correlation is only attached to the telemetry event.
    ///
    /// # Errors
    /// `ResourceNotFound`, `ResourceRead` or `ResourceTimeout` when the
    /// resource cannot be read, `CertificateParse` when it holds no usable key.
    #[tracing::instrument(skip_all, fields(resource = %self.resource_name))]
    pub async fn resolve_public_key(&self, correlation: &Correlation) -> Result<RsaPublicKey> {
        let started = Instant::now();

        match self.load().await {
            Ok(key) => {
                tracing::debug!(
                    modulus_bits = key.modulus_bits(),
                    subject = %key.subject(),
                    "resolved RSA public key"
                );
                self.telemetry
                    .info("Certificate loaded successfully.", started, correlation);
                Ok(key)
            }
            Err(err) => {
                tracing::debug!(error = %err, "public key resolution failed");
                self.telemetry.error(
                    "Failed to extract public key from certificate.",
                    &err,
                    started,
                    correlation,
                );
                Err(err)
            }
        }
    }

    async fn load(&self) -> Result<RsaPublicKey> {
        let bytes = tokio::time::timeout(self.read_timeout, self.source.read(&self.resource_name))
            .await
            .map_err(|_| Error::ResourceTimeout {
                name: self.resource_name.clone(),
                timeout: self.read_timeout,
            })??;

        RsaPublicKey::from_certificate(&bytes)
    }
}

fn certificate_der(bytes: &[u8]) -> Result<Vec<u8>> {
    if !bytes.trim_ascii_start().starts_with(PEM_ARMOR) {
        return Ok(bytes.to_vec());
    }

    let pem = pem::parse(bytes).map_err(certificate_parse_error)?;
    if pem.tag() != PEM_CERTIFICATE_TAG {
        return Err(Error::CertificateParse(format!(
            "expected a PEM '{PEM_CERTIFICATE_TAG}' block, found '{}'",
            pem.tag()
        )));
    }
    Ok(pem.contents().to_vec())
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn bit_length(magnitude: &[u8]) -> usize {
    match magnitude.first() {
        Some(first) => magnitude.len() * 8 - first.leading_zeros() as usize,
        None => 0,
    }
}
