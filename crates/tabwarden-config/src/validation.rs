//! Configuration validation

use crate::schema::RawConfig;
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("{field} must be within [0, 1], got {value}")]
    NotAProbability { field: String, value: f64 },

    #[error("{field} contains an empty entry")]
    EmptyPattern { field: String },

    #[error("Duplicate blacklist site: {0}")]
    DuplicateSite(String),
}

impl ValidationError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate a raw configuration, collecting every problem
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(sites) = &config.blacklist.default_sites {
        errors.extend(validate_patterns("blacklist.default_sites", sites));

        let mut seen = HashSet::new();
        for site in sites {
            if !site.is_empty() && !seen.insert(site.as_str()) {
                errors.push(ValidationError::DuplicateSite(site.clone()));
            }
        }
    }

    if config.budget.daily_seconds == Some(0) {
        errors.push(ValidationError::invalid(
            "budget.daily_seconds",
            "must be greater than zero",
        ));
    }

    for (field, value) in [
        ("probability.step", config.probability.step),
        ("probability.decay_per_hour", config.probability.decay_per_hour),
    ] {
        if let Some(value) = value
            && !(0.0..=1.0).contains(&value)
        {
            errors.push(ValidationError::NotAProbability {
                field: field.to_string(),
                value,
            });
        }
    }

    if config.cooldown.window_minutes == Some(0) {
        errors.push(ValidationError::invalid(
            "cooldown.window_minutes",
            "must be greater than zero",
        ));
    }

    if config.grace.seconds == Some(0) {
        errors.push(ValidationError::invalid("grace.seconds", "must be greater than zero"));
    }

    if let Some(contexts) = &config.grace.search_contexts {
        errors.extend(validate_patterns("grace.search_contexts", contexts));
    }

    if let Some(len) = config.navigation.history_len
        && len < 2
    {
        errors.push(ValidationError::invalid(
            "navigation.history_len",
            format!("must keep at least 2 URLs, got {}", len),
        ));
    }

    if config.scheduler.tick_ms == Some(0) {
        errors.push(ValidationError::invalid("scheduler.tick_ms", "must be greater than zero"));
    }

    if config.scheduler.maintenance_seconds == Some(0) {
        errors.push(ValidationError::invalid(
            "scheduler.maintenance_seconds",
            "must be greater than zero",
        ));
    }

    errors
}

/// Substring patterns must be non-empty: an empty pattern matches every URL
fn validate_patterns(field: &str, patterns: &[String]) -> Vec<ValidationError> {
    if patterns.iter().any(|p| p.trim().is_empty()) {
        vec![ValidationError::EmptyPattern {
            field: field.to_string(),
        }]
    } else {
        Vec::new()
    }
}
