//! Configuration validation.
//!
//! Semantic checks on an already-deserialized config. Returns every
//! violation, not just the first.

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::GatewayConfig;

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid bind address `{0}`")]
    BindAddress(String),
    #[error("multiplex_concurrency must be greater than zero")]
    ZeroConcurrency,
    #[error("resource_timeout_ms must be greater than zero")]
    ZeroTimeout,
    #[error("mapping `{name}` has an invalid URL template `{template}`")]
    InvalidMapping { name: String, template: String },
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.executor.multiplex_concurrency == 0 {
        errors.push(ValidationError::ZeroConcurrency);
    }
    if config.executor.resource_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    for (name, template) in &config.mappings {
        if Url::parse(template).is_err() {
            errors.push(ValidationError::InvalidMapping {
                name: name.clone(),
                template: template.clone(),
            });
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
