//! Flattening of resolver error trees into client-facing error records.

use std::sync::LazyLock;

use {
    async_graphql::{Response, ServerError},
    regex::Regex,
    serde::Serialize,
    serde_json::{Map, Value, json},
};

use crate::{context::Localizer, error::ResolveError};

const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
const UNKNOWN_ERROR: &str = "An unknown error occurred.";

#[allow(clippy::expect_used)]
static HASH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z_\d]{10,}$").expect("hash pattern is a valid regex"));

/// Flat error entry returned to clients under `originalError`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Whether an opaque message looks like a localizable hash such as
/// `USER_NOT_FOUND_01`.
pub fn looks_like_hash(message: &str) -> bool {
    message.contains('_') && HASH_PATTERN.is_match(message)
}

/// Collect the leaves of an error tree, depth first.
pub fn leaves(err: &ResolveError) -> Vec<&ResolveError> {
    fn walk<'a>(err: &'a ResolveError, out: &mut Vec<&'a ResolveError>) {
        match err {
            ResolveError::Wrapped { cause, .. } => walk(cause, out),
            ResolveError::Aggregate { errors, .. } if !errors.is_empty() => {
                for inner in errors {
                    walk(inner, out);
                }
            },
            ResolveError::Domain(_) | ResolveError::Aggregate { .. } | ResolveError::Opaque(_) => {
                out.push(err);
            },
        }
    }

    let mut out = Vec::new();
    walk(err, &mut out);
    out
}

/// Normalize a single leaf.
pub fn normalize_leaf(err: &ResolveError, localizer: Option<&dyn Localizer>) -> NormalizedError {
    let mut normalized = match err {
        ResolveError::Domain(action) => NormalizedError {
            hash: Some(action.hash.clone()),
            code: action.options.code.clone(),
            message: action.options.message.clone().unwrap_or_default(),
            details: action
                .details
                .clone()
                .or_else(|| action.options.details.clone()),
        },
        other => {
            let mut message = other.to_string();
            if message.is_empty() {
                message = INTERNAL_SERVER_ERROR.to_string();
            }
            NormalizedError {
                hash: looks_like_hash(&message).then(|| message.clone()),
                message,
                ..NormalizedError::default()
            }
        },
    };

    if let Some(hash) = &normalized.hash {
        match localizer {
            Some(localizer) => normalized.message = localizer.translate(hash),
            None if normalized.message.is_empty() => normalized.message = hash.clone(),
            None => {},
        }
    }
    normalized
}

/// Normalize every leaf of an error tree.
pub fn normalize(err: &ResolveError, localizer: Option<&dyn Localizer>) -> Vec<NormalizedError> {
    leaves(err)
        .into_iter()
        .map(|leaf| normalize_leaf(leaf, localizer))
        .collect()
}

/// Client error record: the engine's extensions, `message`,
/// `originalError`, and `locations` / `path` when known.
pub fn format_error(error: &ServerError, localizer: Option<&dyn Localizer>) -> Value {
    let mut record = Map::new();
    if let Some(Ok(Value::Object(extensions))) = error.extensions.as_ref().map(serde_json::to_value) {
        record.extend(extensions);
    }

    let message = if error.message.is_empty() {
        UNKNOWN_ERROR
    } else {
        &error.message
    };
    record.insert("message".into(), json!(message));

    let original = error
        .source::<ResolveError>()
        .map(|tree| normalize(tree, localizer));
    record.insert(
        "originalError".into(),
        serde_json::to_value(original).unwrap_or(Value::Null),
    );

    if !error.locations.is_empty()
        && let Ok(locations) = serde_json::to_value(&error.locations)
    {
        record.insert("locations".into(), locations);
    }
    if !error.path.is_empty()
        && let Ok(path) = serde_json::to_value(&error.path)
    {
        record.insert("path".into(), path);
    }
    Value::Object(record)
}

/// Full response body: `{data, errors?, extensions?}`.
pub fn format_response(response: Response, localizer: Option<&dyn Localizer>) -> Value {
    let mut body = Map::new();
    body.insert(
        "data".into(),
        response.data.into_json().unwrap_or(Value::Null),
    );
    if !response.errors.is_empty() {
        let errors = response
            .errors
            .iter()
            .map(|e| format_error(e, localizer))
            .collect();
        body.insert("errors".into(), Value::Array(errors));
    }
    if !response.extensions.is_empty()
        && let Ok(extensions) = serde_json::to_value(&response.extensions)
    {
        body.insert("extensions".into(), extensions);
    }
    Value::Object(body)
}
