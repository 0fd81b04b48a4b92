use std::collections::HashMap;
use std::fmt::Debug;
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Error;
use crate::error::Result;

/// Logical name of the certificate bundled with this crate
pub const DEFAULT_CERTIFICATE_RESOURCE: &str = "resources/certificate.pem";

static BUNDLED_CERTIFICATE: &[u8] = include_bytes!("../resources/certificate.pem");

/// Source of certificate bytes, addressed by logical resource name
#[async_trait]
pub trait CertificateSource: Debug + Send + Sync {
    /// Read the named resource fully into memory
    async fn read(&self, name: &str) -> Result<Vec<u8>>;
}

/// Resources compiled into the binary
#[derive(Debug, Clone, Default)]
pub struct EmbeddedResources {
    resources: HashMap<String, &'static [u8]>,
}

impl EmbeddedResources {
    /// An empty resource table
    pub fn empty() -> Self {
        Self::default()
    }

    /// The table shipped with the crate, holding the signing certificate under
    /// [`DEFAULT_CERTIFICATE_RESOURCE`]
    pub fn bundled() -> Self {
        Self::empty().with_resource(DEFAULT_CERTIFICATE_RESOURCE, BUNDLED_CERTIFICATE)
    }

    pub fn with_resource(mut self, name: impl Into<String>, bytes: &'static [u8]) -> Self {
        self.resources.insert(name.into(), bytes);
        self
    }
}

#[async_trait]
impl CertificateSource for EmbeddedResources {
    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.resources
            .get(name)
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| Error::ResourceNotFound(name.to_string()))
    }
}

/// Resources laid out as files below a root directory
#[derive(Debug, Clone)]
pub struct DirectoryResources {
    root: PathBuf,
}

impl DirectoryResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl CertificateSource for DirectoryResources {
    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.root.join(name);
        tokio::fs::read(&path).await.map_err(|source| match source.kind() {
            ErrorKind::NotFound => Error::ResourceNotFound(name.to_string()),
            _ => Error::ResourceRead {
                name: name.to_string(),
                source,
            },
        })
    }
}
