//! Validation of rule definitions before they are stored.
//!
//! Everything that enters the rule table passes through here, so the lenient
//! parsing done while matching should only ever fail on corrupted data.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    Error,
    rule::{ParsedActions, ParsedConditions, pattern::compile_pattern},
};

/// Parse and validate the raw JSON text of a rule's conditions.
///
/// # Errors
/// Returns [Error::InvalidRuleDefinition] if `raw` is not a JSON object, if a
/// pattern is not a string, or if a pattern is not a valid regular expression.
pub fn validate_conditions(raw: &str) -> Result<ParsedConditions, Error> {
    let conditions: ParsedConditions = parse_object(raw, "conditions")?;

    for (field, pattern) in [
        ("merchantPattern", &conditions.merchant_pattern),
        ("descriptionPattern", &conditions.description_pattern),
    ] {
        if let Some(pattern) = pattern {
            compile_pattern(pattern).map_err(|error| {
                Error::InvalidRuleDefinition(format!(
                    "{field} is not a valid regular expression: {error}"
                ))
            })?;
        }
    }

    Ok(conditions)
}

/// Parse and validate the raw JSON text of a rule's actions.
///
/// # Errors
/// Returns [Error::InvalidRuleDefinition] if `raw` is not a JSON object, or if
/// `targetCategoryId` is missing or not a positive integer.
pub fn validate_actions(raw: &str) -> Result<ParsedActions, Error> {
    let actions: ParsedActions = parse_object(raw, "actions")?;

    if actions.target_category_id <= 0 {
        return Err(Error::InvalidRuleDefinition(
            "targetCategoryId must be a positive integer".to_owned(),
        ));
    }

    Ok(actions)
}

/// Convert a `conditions` or `actions` value from a request body to raw JSON text.
///
/// Clients may send either the object itself or a string containing its JSON
/// encoding.
///
/// # Errors
/// Returns [Error::InvalidRuleDefinition] for any other kind of JSON value.
pub fn definition_to_raw(value: &Value, field: &str) -> Result<String, Error> {
    match value {
        Value::String(raw) => Ok(raw.clone()),
        Value::Object(_) => Ok(value.to_string()),
        _ => Err(Error::InvalidRuleDefinition(format!(
            "{field} must be a JSON object"
        ))),
    }
}

/// Validate the conditions from a request body, returning their canonical
/// JSON text ready for storage.
///
/// # Errors
/// Returns [Error::InvalidRuleDefinition] if the conditions are invalid.
pub fn canonical_conditions(value: &Value) -> Result<String, Error> {
    let conditions = validate_conditions(&definition_to_raw(value, "conditions")?)?;

    to_canonical_json(&conditions)
}

/// Validate the actions from a request body, returning them with their
/// canonical JSON text.
///
/// # Errors
/// Returns [Error::InvalidRuleDefinition] if the actions are invalid.
pub fn canonical_actions(value: &Value) -> Result<(ParsedActions, String), Error> {
    let actions = validate_actions(&definition_to_raw(value, "actions")?)?;
    let raw = to_canonical_json(&actions)?;

    Ok((actions, raw))
}

fn to_canonical_json(value: &impl serde::Serialize) -> Result<String, Error> {
    serde_json::to_string(value).map_err(|error| {
        Error::InvalidRuleDefinition(format!("could not encode definition: {error}"))
    })
}

fn parse_object<T: DeserializeOwned>(raw: &str, field: &str) -> Result<T, Error> {
    let value: Value = serde_json::from_str(raw).map_err(|error| {
        Error::InvalidRuleDefinition(format!("{field} is not valid JSON: {error}"))
    })?;

    if !value.is_object() {
        return Err(Error::InvalidRuleDefinition(format!(
            "{field} must be a JSON object"
        )));
    }

    serde_json::from_value(value)
        .map_err(|error| Error::InvalidRuleDefinition(format!("invalid {field}: {error}")))
}
