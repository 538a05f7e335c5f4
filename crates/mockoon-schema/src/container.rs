//! Extraction of environment definitions from a data file.
//!
//! A data file is either a single bare environment object, or an export
//! bundle of the form `{ "source": .., "data": [ { "type": .., "item": .. } ] }`
//! where only `type == "environment"` items are environments.

use crate::environment::RawEnvironment;
use serde_json::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;

const BUNDLE_SOURCE_KEY: &str = "source";
const BUNDLE_DATA_KEY: &str = "data";
const ENVIRONMENT_ITEM_TYPE: &str = "environment";

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read data file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed data: {0}")]
    Malformed(String),
    #[error("No environments exist in specified file")]
    NoEnvironments,
}

/// Parse a data document and extract its environments in file order.
pub fn parse_data_str(input: &str) -> Result<Vec<RawEnvironment>, DataError> {
    let value: Value =
        serde_json::from_str(input).map_err(|e| DataError::Malformed(e.to_string()))?;
    extract_environments(value)
}

pub fn parse_data_file(path: impl AsRef<Path>) -> Result<Vec<RawEnvironment>, DataError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_data_str(&content)
}

/// Normalize a parsed document into a list of raw environments.
pub fn extract_environments(value: Value) -> Result<Vec<RawEnvironment>, DataError> {
    let Value::Object(mut root) = value else {
        return Err(DataError::Malformed(
            "expected a JSON object at the document root".to_owned(),
        ));
    };

    if !(root.contains_key(BUNDLE_SOURCE_KEY) && root.contains_key(BUNDLE_DATA_KEY)) {
        return Ok(vec![RawEnvironment::new(root)]);
    }

    let Some(Value::Array(items)) = root.remove(BUNDLE_DATA_KEY) else {
        return Err(DataError::Malformed(
            "bundle 'data' must be an array".to_owned(),
        ));
    };

    let mut environments = Vec::new();
    for (position, item) in items.into_iter().enumerate() {
        let Value::Object(mut entry) = item else {
            tracing::debug!("skipping non-object bundle item at {position}");
            continue;
        };
        if entry.get("type").and_then(Value::as_str) != Some(ENVIRONMENT_ITEM_TYPE) {
            continue;
        }
        match entry.remove("item") {
            Some(Value::Object(env)) => environments.push(RawEnvironment::new(env)),
            _ => {
                return Err(DataError::Malformed(format!(
                    "bundle item {position} is an environment without an object 'item'"
                )))
            }
        }
    }

    if environments.is_empty() {
        return Err(DataError::NoEnvironments);
    }
    Ok(environments)
}
