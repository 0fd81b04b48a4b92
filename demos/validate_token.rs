use token_warden::telemetry::{Telemetry, TracingSink};
use token_warden::{TokenValidator, ValidateToken, ValidationRequest, ValidatorConfig};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: validate_token <issuer> <audience> <token> <user-id> <entity-id>";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [issuer, audience, token, user_id, entity_id] = args.as_slice() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    // Events go to the local log instead of Elasticsearch
    let config = ValidatorConfig::new(issuer.as_str(), audience.as_str());
    let validator = TokenValidator::new(config, Telemetry::new(TracingSink)).await?;

    println!("Signing certificate: {}", validator.public_key().subject());

    match validator.validate(&ValidationRequest::new(token, user_id, entity_id)) {
        Ok(()) => println!("Token is valid."),
        Err(e) => {
            println!("Token is invalid.");
            eprintln!("  reason: {}", e.describe());
        }
    }

    Ok(())
}
