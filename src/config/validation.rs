//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0 and bounded, attempt counts >= 1)
//! - Check instance addresses are at least non-empty
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DispatchConfig → Result<(), Vec<ValidationError>>
//! - Malformed instance URLs are NOT rejected here; the endpoint factory
//!   skips them at runtime the same way it skips bad discovered instances

use thiserror::Error;

use crate::config::schema::DispatchConfig;

/// Longest breaker window or cooldown accepted, in seconds (one day).
pub const MAX_BREAKER_SECS: u64 = 86_400;

/// Longest overall call timeout accepted, in milliseconds (one hour).
pub const MAX_OVERALL_TIMEOUT_MS: u64 = 3_600_000;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("service.name must not be empty")]
    EmptyServiceName,

    #[error("service.operation must not be empty")]
    EmptyOperation,

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} ({value}) exceeds the maximum of {max}")]
    TooLarge { field: &'static str, value: u64, max: u64 },

    #[error("retries.attempt_timeout_ms ({attempt}) exceeds retries.overall_timeout_ms ({overall})")]
    AttemptExceedsOverall { attempt: u64, overall: u64 },

    #[error("discovery.instances[{index}] is blank")]
    BlankInstance { index: usize },
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &DispatchConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::EmptyServiceName);
    }
    if config.service.operation.trim().is_empty() {
        errors.push(ValidationError::EmptyOperation);
    }

    let positive: [(&'static str, u64); 6] = [
        ("breaker.interval_secs", config.breaker.interval_secs),
        ("breaker.cooldown_secs", config.breaker.cooldown_secs),
        ("breaker.max_requests", u64::from(config.breaker.max_requests)),
        ("retries.max_attempts", u64::from(config.retries.max_attempts)),
        ("retries.overall_timeout_ms", config.retries.overall_timeout_ms),
        ("transport.connect_timeout_ms", config.transport.connect_timeout_ms),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    let bounded: [(&'static str, u64, u64); 3] = [
        ("breaker.interval_secs", config.breaker.interval_secs, MAX_BREAKER_SECS),
        ("breaker.cooldown_secs", config.breaker.cooldown_secs, MAX_BREAKER_SECS),
        ("retries.overall_timeout_ms", config.retries.overall_timeout_ms, MAX_OVERALL_TIMEOUT_MS),
    ];
    for (field, value, max) in bounded {
        if value > max {
            errors.push(ValidationError::TooLarge { field, value, max });
        }
    }

    if let Some(attempt) = config.retries.attempt_timeout_ms {
        if attempt == 0 {
            errors.push(ValidationError::Zero {
                field: "retries.attempt_timeout_ms",
            });
        } else if attempt > config.retries.overall_timeout_ms {
            errors.push(ValidationError::AttemptExceedsOverall {
                attempt,
                overall: config.retries.overall_timeout_ms,
            });
        }
    }

    for (index, instance) in config.discovery.instances.iter().enumerate() {
        if instance.trim().is_empty() {
            errors.push(ValidationError::BlankInstance { index });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
