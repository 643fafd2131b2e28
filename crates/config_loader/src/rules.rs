//! Configuration validation
//!
//! Rules:
//! - field bounds declared on the contract types (`validator` derive)
//! - subscriber topics are non-empty and unique
//! - initial_backoff_ms <= max_backoff_ms
//! - seed record keys are non-empty and unique
//! - mutation keys are non-empty

use std::collections::HashSet;

use contracts::{ContractError, PipelineBlueprint};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate a PipelineBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    validate_bounds(blueprint)?;
    validate_topics(blueprint)?;
    validate_backoff(blueprint)?;
    validate_seed_records(blueprint)?;
    validate_mutations(blueprint)?;
    Ok(())
}

/// Declarative field bounds
fn validate_bounds(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| {
        let (field, message) = first_violation(&errors, String::new());
        ContractError::config_validation(field, message)
    })
}

/// Walk nested validation errors down to the first field-level violation
fn first_violation(errors: &ValidationErrors, prefix: String) -> (String, String) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let message = field_errors
                    .first()
                    .map(|e| match &e.message {
                        Some(m) => m.to_string(),
                        None => format!("failed '{}' check", e.code),
                    })
                    .unwrap_or_else(|| "invalid value".to_string());
                return (path, message);
            }
            ValidationErrorsKind::Struct(inner) => return first_violation(inner, path),
            ValidationErrorsKind::List(items) => {
                if let Some((idx, inner)) = items.iter().next() {
                    return first_violation(inner, format!("{path}[{idx}]"));
                }
            }
        }
    }
    (prefix, "invalid value".to_string())
}

/// Topic names must be unique and non-empty
fn validate_topics(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, topic) in blueprint.subscriber.topics.iter().enumerate() {
        if topic.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("subscriber.topics[{idx}]"),
                "topic name cannot be empty",
            ));
        }
        if !seen.insert(topic) {
            return Err(ContractError::config_validation(
                format!("subscriber.topics[{idx}]"),
                format!("duplicate topic '{topic}'"),
            ));
        }
    }
    Ok(())
}

/// Backoff window must be ordered
fn validate_backoff(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let publisher = &blueprint.publisher;
    if publisher.initial_backoff_ms > publisher.max_backoff_ms {
        return Err(ContractError::config_validation(
            "publisher.initial_backoff_ms / publisher.max_backoff_ms",
            format!(
                "initial_backoff_ms ({}) must be <= max_backoff_ms ({})",
                publisher.initial_backoff_ms, publisher.max_backoff_ms
            ),
        ));
    }
    Ok(())
}

/// Seed record keys
fn validate_seed_records(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, record) in blueprint.source.records.iter().enumerate() {
        if record.key.is_empty() {
            return Err(ContractError::config_validation(
                format!("source.records[{idx}].key"),
                "record key cannot be empty",
            ));
        }
        if !seen.insert(&record.key) {
            return Err(ContractError::config_validation(
                format!("source.records[key={}]", record.key),
                "duplicate record key",
            ));
        }
    }
    Ok(())
}

/// Mutation keys
fn validate_mutations(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    for (idx, mutation) in blueprint.source.mutations.iter().enumerate() {
        if mutation.key().is_empty() {
            return Err(ContractError::config_validation(
                format!("source.mutations[{idx}].key"),
                "mutation key cannot be empty",
            ));
        }
    }
    Ok(())
}
