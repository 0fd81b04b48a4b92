use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;
use crate::error::Result;
use crate::resources::CertificateSource;
use crate::resources::EmbeddedResources;
use crate::resources::DEFAULT_CERTIFICATE_RESOURCE;

const DEFAULT_RESOURCE_TIMEOUT_SECS: u64 = 5;

/// Configuration for the token validator
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// The expected `iss` claim, matched exactly
    pub(crate) issuer: String,
    /// The expected `aud` claim, matched exactly
    pub(crate) audience: String,
    /// Where the signing certificate is read from (default: the bundled resources)
    pub(crate) certificate_source: Arc<dyn CertificateSource>,
    /// Logical name of the certificate resource
    pub(crate) resource_name: String,
    /// Deadline for reading the certificate resource (default: 5 seconds)
    pub(crate) resource_timeout: Duration,
}

impl ValidatorConfig {
    /// Create a configuration for the given issuer and audience, reading the
    /// certificate bundled with the crate
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            certificate_source: Arc::new(EmbeddedResources::bundled()),
            resource_name: DEFAULT_CERTIFICATE_RESOURCE.to_string(),
            resource_timeout: Duration::from_secs(DEFAULT_RESOURCE_TIMEOUT_SECS),
        }
    }

    /// Read the certificate from a different source
    pub fn with_certificate_source(mut self, source: impl CertificateSource + 'static) -> Self {
        self.certificate_source = Arc::new(source);
        self
    }

    /// Set the logical name of the certificate resource
    pub fn with_resource_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = name.into();
        self
    }

    /// Set the deadline for reading the certificate resource
    pub fn with_resource_timeout(mut self, timeout: Duration) -> Self {
        self.resource_timeout = timeout;
        self
    }

    /// # Errors
    /// Returns `Error::InvalidConfiguration` if the issuer or audience is empty
    pub(crate) fn validate(&self) -> Result<()> {
        if self.issuer.is_empty() {
            return Err(Error::InvalidConfiguration("expected issuer must not be empty"));
        }
        if self.audience.is_empty() {
            return Err(Error::InvalidConfiguration("expected audience must not be empty"));
        }
        Ok(())
    }
}
