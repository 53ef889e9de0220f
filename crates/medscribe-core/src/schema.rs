//! JSON Schema for the validated-record wire shape.
//!
//! Consumers of a serialized [`ValidatedRecord`](crate::ValidatedRecord)
//! can check it against `schema/validated_record.schema.json`, which is
//! embedded here at compile time.

use std::sync::OnceLock;
use thiserror::Error;

/// Embedded record schema (loaded at compile time).
pub const RECORD_SCHEMA_JSON: &str = include_str!("../schema/validated_record.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Errors from schema loading.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

/// Get the compiled validator, building it on first use.
///
/// A broken embedded schema is a build defect; the error is cached so
/// every call reports it the same way.
fn get_validator() -> Result<&'static jsonschema::Validator, SchemaError> {
    COMPILED_SCHEMA
        .get_or_init(|| {
            let schema_value: serde_json::Value = serde_json::from_str(RECORD_SCHEMA_JSON)
                .map_err(|e| format!("Invalid schema JSON: {}", e))?;
            jsonschema::options()
                .build(&schema_value)
                .map_err(|e| format!("Failed to compile schema: {}", e))
        })
        .as_ref()
        .map_err(|e| SchemaError::LoadError(e.clone()))
}

/// Validate a serialized record against the schema.
///
/// Returns every violation as `"<message> at <instance path>"`.
pub fn validate_record_schema(record_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(record_json)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
