//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate backend and search addresses
//! - Validate value ranges (timeouts > 0, bucket count, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ZipperConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Misordered timeouts are logged at startup, not rejected

use std::net::SocketAddr;
use thiserror::Error;

use crate::backend::client::parse_address;
use crate::config::schema::ZipperConfig;
use crate::observability::metrics::MAX_BUCKETS;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no backends configured")]
    NoBackends,

    #[error("backend '{address}': {reason}")]
    InvalidBackend { address: String, reason: String },

    #[error("carbonsearch needs both prefix and backend")]
    IncompleteSearch,

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("{field} '{value}' is not a socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("buckets must be at most {max}, got {value}")]
    TooManyBuckets { value: usize, max: usize },
}

pub fn validate_config(config: &ZipperConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }
    for address in &config.backends {
        if let Err(reason) = parse_address(address) {
            errors.push(ValidationError::InvalidBackend {
                address: address.clone(),
                reason,
            });
        }
    }

    let search = &config.carbonsearch;
    if search.is_partial() {
        errors.push(ValidationError::IncompleteSearch);
    } else if search.is_enabled() {
        if let Err(reason) = parse_address(&search.backend) {
            errors.push(ValidationError::InvalidBackend {
                address: search.backend.clone(),
                reason,
            });
        }
    }

    if config.timeouts.global_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("global_ms"));
    }
    if config.timeouts.connect_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_ms"));
    }

    if config.buckets > MAX_BUCKETS {
        errors.push(ValidationError::TooManyBuckets {
            value: config.buckets,
            max: MAX_BUCKETS,
        });
    }

    if config.listen.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listen",
            value: config.listen.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
