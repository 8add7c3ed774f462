//! Size and shape checks applied before any statement reaches the database

use crate::schema::{MAX_PARAMS_LENGTH, MAX_QUERY_LENGTH};
use crate::{Error, Result};
use serde_json::Value;

/// Validate query text and optional positional parameters
///
/// Rejects empty text, text longer than [`MAX_QUERY_LENGTH`] characters,
/// non-scalar parameters, and parameter arrays whose JSON form is longer
/// than [`MAX_PARAMS_LENGTH`] characters.
pub fn validate_statement(text: &str, params: Option<&[Value]>) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::Validation("Query must not be empty".to_string()));
    }

    let length = text.chars().count();
    if length > MAX_QUERY_LENGTH {
        return Err(Error::Validation(format!(
            "Query is {} characters long, the maximum is {}",
            length, MAX_QUERY_LENGTH
        )));
    }

    if let Some(params) = params {
        if params
            .iter()
            .any(|param| param.is_array() || param.is_object())
        {
            return Err(Error::Validation(
                "Parameters must be strings, numbers, booleans or null".to_string(),
            ));
        }

        let serialized = serde_json::to_string(params)
            .map_err(|error| Error::Validation(error.to_string()))?;
        let serialized_length = serialized.chars().count();
        if serialized_length > MAX_PARAMS_LENGTH {
            return Err(Error::Validation(format!(
                "Parameters are {} characters long when serialized, the maximum is {}",
                serialized_length, MAX_PARAMS_LENGTH
            )));
        }
    }

    Ok(())
}
