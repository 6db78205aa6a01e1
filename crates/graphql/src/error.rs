//! Error types: build-time failures and the runtime resolver error tree.

use std::path::PathBuf;

use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

/// Schema building and registration failures. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read type definitions from {}: {source}", path.display())]
    TypeDefsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid type definitions in {origin}: {source}")]
    Syntax {
        origin: String,
        #[source]
        source: async_graphql_parser::Error,
    },

    #[error("invalid resolver path \"{path}\": {reason}")]
    ResolverPath { path: String, reason: String },

    #[error("resolver path \"{path}\" bound by both {previous} and {current}")]
    DuplicateResolver {
        path: String,
        previous: String,
        current: String,
    },

    #[error("{what} \"{id}\" is already registered")]
    DuplicateRegistration { what: &'static str, id: String },

    #[error("unknown controller \"{0}\"")]
    UnknownController(String),

    #[error("controller \"{0}\" is remote and cannot own actions")]
    RemoteActions(String),

    #[error("{origin}: type \"{name}\" is defined as both {first} and {second}")]
    KindConflict {
        origin: String,
        name: String,
        first: &'static str,
        second: &'static str,
    },

    #[error("{origin}: field {type_name}.{field} is defined as `{first}` and `{second}`")]
    FieldConflict {
        origin: String,
        type_name: String,
        field: String,
        first: String,
        second: String,
    },

    #[error("{origin}: unknown type \"{name}\" referenced by {at}")]
    UnknownType {
        origin: String,
        name: String,
        at: String,
    },

    #[error("{origin}: {message}")]
    InvalidType { origin: String, message: String },

    #[error("{origin}: resolver \"{path}\" is defined but {target} is not in the schema")]
    OrphanResolver {
        origin: String,
        path: String,
        target: String,
    },

    #[error("remote controller \"{id}\": {message}")]
    Remote { id: String, message: String },

    #[error("schema build failed: {0}")]
    Schema(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Structured options attached to an [`ActionError`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Domain error raised by actions. `hash` is a stable, localizable key such
/// as `USER_NOT_FOUND_01`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionError {
    pub hash: String,
    #[serde(rename = "errorOptions", default)]
    pub options: ErrorOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ActionError {
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            options: ErrorOptions::default(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.options.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.options.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl std::fmt::Display for ActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.options.message.as_deref().unwrap_or(&self.hash))
    }
}

impl std::error::Error for ActionError {}

/// Discriminant of a [`ResolveError`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Domain,
    Aggregate,
    Wrapped,
    Opaque,
}

/// Error returned by resolvers and executors.
///
/// The producer decides the kind; the normalizer only walks the tree.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    #[error("{0}")]
    Domain(ActionError),

    #[error("{message}")]
    Aggregate {
        message: String,
        errors: Vec<ResolveError>,
    },

    #[error("{message}")]
    Wrapped {
        message: String,
        cause: Box<ResolveError>,
    },

    #[error("{0}")]
    Opaque(String),
}

impl ResolveError {
    pub fn opaque(message: impl Into<String>) -> Self {
        Self::Opaque(message.into())
    }

    pub fn wrap(message: impl Into<String>, cause: impl Into<ResolveError>) -> Self {
        Self::Wrapped {
            message: message.into(),
            cause: Box::new(cause.into()),
        }
    }

    pub fn aggregate(message: impl Into<String>, errors: Vec<ResolveError>) -> Self {
        Self::Aggregate {
            message: message.into(),
            errors,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(_) => ErrorKind::Domain,
            Self::Aggregate { .. } => ErrorKind::Aggregate,
            Self::Wrapped { .. } => ErrorKind::Wrapped,
            Self::Opaque(_) => ErrorKind::Opaque,
        }
    }
}

impl From<ActionError> for ResolveError {
    fn from(err: ActionError) -> Self {
        Self::Domain(err)
    }
}

impl From<serde_json::Error> for ResolveError {
    fn from(err: serde_json::Error) -> Self {
        Self::Opaque(format!("failed to encode value: {err}"))
    }
}

/// Hand a resolver error to the engine, keeping the tree as the error source
/// so the normalizer can recover it from the response.
pub fn gql_err(err: ResolveError) -> async_graphql::Error {
    async_graphql::Error::new_with_source(err)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use {super::*, serde_json::json};

    #[test]
    fn action_error_displays_override_or_hash() {
        let err = ActionError::new("USER_NOT_FOUND_01");
        assert_eq!(err.to_string(), "USER_NOT_FOUND_01");
        assert_eq!(err.with_message("no such user").to_string(), "no such user");
    }

    #[test]
    fn action_error_reads_error_options_payload() {
        let err: ActionError = serde_json::from_value(json!({
            "hash": "H",
            "errorOptions": {"code": "C", "message": "M"}
        }))
        .expect("payload");
        assert_eq!(err.options.code.as_deref(), Some("C"));
        assert_eq!(err.options.message.as_deref(), Some("M"));
        assert!(err.details.is_none());
    }

    #[test]
    fn kinds_are_explicit() {
        let tree = ResolveError::wrap(
            "outer",
            ResolveError::aggregate("many", vec![ActionError::new("X_Y_Z_0000").into()]),
        );
        assert_eq!(tree.kind(), ErrorKind::Wrapped);
        assert_eq!(tree.to_string(), "outer");
        let ResolveError::Wrapped { cause, .. } = tree else {
            unreachable!()
        };
        assert_eq!(cause.kind(), ErrorKind::Aggregate);
    }

    #[test]
    fn engine_error_keeps_source() {
        let err = gql_err(ActionError::new("SOME_HASH_01").into());
        assert_eq!(err.message, "SOME_HASH_01");
        let source = err.source.expect("source");
        assert!(source.downcast_ref::<ResolveError>().is_some());
    }
}
