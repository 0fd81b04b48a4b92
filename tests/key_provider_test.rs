mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use token_warden::resources::{CertificateSource, DirectoryResources, EmbeddedResources};
use token_warden::telemetry::{Level, MemorySink, Telemetry};
use token_warden::{
    Correlation, Error, KeyProvider, TokenValidator, ValidateToken, ValidatorConfig,
};

use common::{
    certificate_der, create_test_jwt, signer_key, TestClaims, AUDIENCE, EC_CERTIFICATE_PEM, ISSUER,
};

/// Source that never answers within any reasonable deadline
#[derive(Debug)]
struct StalledSource;

#[async_trait]
impl CertificateSource for StalledSource {
    async fn read(&self, _name: &str) -> token_warden::Result<Vec<u8>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }
}

fn provider(source: Arc<dyn CertificateSource>, name: &str) -> (KeyProvider, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let provider = KeyProvider::new(
        source,
        name,
        Duration::from_millis(200),
        Telemetry::from_shared(sink.clone()),
    );
    (provider, sink)
}

#[tokio::test]
async fn der_certificate_from_directory_validates_tokens() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("signer.der"), certificate_der()).unwrap();

    let config = ValidatorConfig::new(ISSUER, AUDIENCE)
        .with_certificate_source(DirectoryResources::new(dir.path()))
        .with_resource_name("signer.der");
    let validator = TokenValidator::new(config, Telemetry::new(MemorySink::new()))
        .await
        .unwrap();

    let token = create_test_jwt(&TestClaims::valid(), &signer_key());
    assert!(validator.is_valid_token(&token, "abc123", "xyz789"));
}

#[tokio::test]
async fn missing_resource_fails_construction() {
    let sink = Arc::new(MemorySink::new());
    let config = ValidatorConfig::new(ISSUER, AUDIENCE)
        .with_certificate_source(EmbeddedResources::empty());

    let result = TokenValidator::new(config, Telemetry::from_shared(sink.clone())).await;

    assert!(matches!(result, Err(Error::ResourceNotFound(_))));
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].level, Level::Error);
}

#[tokio::test]
async fn non_rsa_certificate_fails_construction() {
    let source = EmbeddedResources::empty().with_resource("ec.pem", EC_CERTIFICATE_PEM.as_bytes());
    let config = ValidatorConfig::new(ISSUER, AUDIENCE)
        .with_certificate_source(source)
        .with_resource_name("ec.pem");

    let result = TokenValidator::new(config, Telemetry::new(MemorySink::new())).await;

    assert!(matches!(result, Err(Error::CertificateParse(_))));
}

#[tokio::test]
async fn corrupt_certificate_fails_construction() {
    let source = EmbeddedResources::empty().with_resource("bad.crt", b"\x30\x82\x01\x00garbage");
    let config = ValidatorConfig::new(ISSUER, AUDIENCE)
        .with_certificate_source(source)
        .with_resource_name("bad.crt");

    let result = TokenValidator::new(config, Telemetry::new(MemorySink::new())).await;

    assert!(matches!(result, Err(Error::CertificateParse(_))));
}

#[tokio::test]
async fn stalled_read_hits_the_deadline() {
    let (provider, sink) = provider(Arc::new(StalledSource), "certificate.pem");

    let started = std::time::Instant::now();
    let result = provider.resolve_public_key(&Correlation::default()).await;

    assert!(matches!(result, Err(Error::ResourceTimeout { .. })));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(sink.events()[0].level, Level::Error);
}

#[tokio::test]
async fn each_resolution_is_reported() {
    let (provider, sink) = provider(
        Arc::new(EmbeddedResources::bundled()),
        token_warden::resources::DEFAULT_CERTIFICATE_RESOURCE,
    );

    for _ in 0..3 {
        provider
            .resolve_public_key(&Correlation::new("seed", "u", "e"))
            .await
            .unwrap();
    }

    let events = sink.events();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|event| event.level == Level::Info));
    assert!(events.iter().all(|event| event.token == "seed"));
}

#[tokio::test]
async fn each_validator_resolves_its_own_key() {
    let sink = Arc::new(MemorySink::new());
    let telemetry = Telemetry::from_shared(sink.clone());

    TokenValidator::new(ValidatorConfig::new(ISSUER, AUDIENCE), telemetry.clone())
        .await
        .unwrap();
    TokenValidator::new(ValidatorConfig::new(ISSUER, AUDIENCE), telemetry)
        .await
        .unwrap();

    assert_eq!(sink.len(), 2);
}
