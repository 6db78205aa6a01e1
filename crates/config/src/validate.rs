//! Semantic checks that serde cannot express.

use std::collections::HashSet;

use crate::schema::AppConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "graphql.endpoint"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Validate a parsed config.
#[must_use]
pub fn validate(config: &AppConfig) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    let gql = &config.graphql;

    check_route("graphql.endpoint", &gql.endpoint, &mut out);
    if let Some(ref path) = gql.ui.path {
        check_route("graphql.ui.path", path, &mut out);
    }
    if gql.ui.enabled && gql.ui_path() == gql.endpoint {
        out.push(Diagnostic::error(
            "graphql.ui.path",
            "explorer path must differ from the endpoint",
        ));
    }
    if gql.pagination_timeout_secs == 0 {
        out.push(Diagnostic::error(
            "graphql.pagination_timeout_secs",
            "must be greater than zero",
        ));
    }
    if gql.use_mocks {
        out.push(Diagnostic::warning(
            "graphql.use_mocks",
            "mocks are enabled, bound resolvers will not run",
        ));
    }

    let mut seen = HashSet::new();
    for (i, remote) in config.remote_controllers.iter().enumerate() {
        if !seen.insert(remote.id.as_str()) {
            out.push(Diagnostic::error(
                format!("remote_controllers[{i}].id"),
                format!("duplicate remote controller id \"{}\"", remote.id),
            ));
        }
        if !(remote.uri.starts_with("http://") || remote.uri.starts_with("https://")) {
            out.push(Diagnostic::error(
                format!("remote_controllers[{i}].uri"),
                "expected an http(s) URI",
            ));
        }
    }

    if let Some(ref locale) = config.i18n.default_locale
        && !config.i18n.catalogs.contains_key(locale)
    {
        out.push(Diagnostic::warning(
            "i18n.default_locale",
            format!("no catalog for default locale \"{locale}\""),
        ));
    }

    out
}

fn check_route(path: &str, value: &str, out: &mut Vec<Diagnostic>) {
    if !value.starts_with('/') {
        out.push(Diagnostic::error(path, "must start with '/'"));
    } else if value.len() > 1 && value.ends_with('/') {
        out.push(Diagnostic::error(path, "must not end with '/'"));
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::schema::{GraphqlConfig, RemoteControllerConfig},
    };

    #[test]
    fn default_config_is_clean() {
        assert!(validate(&AppConfig::default()).is_empty());
    }

    #[test]
    fn flags_duplicate_remote_ids_and_bad_uris() {
        let remote = |id: &str, uri: &str| RemoteControllerConfig {
            id: id.into(),
            uri: uri.into(),
        };
        let cfg = AppConfig {
            remote_controllers: vec![
                remote("billing", "http://a/graphql"),
                remote("billing", "ftp://b"),
            ],
            ..AppConfig::default()
        };

        let diags = validate(&cfg);
        let paths: Vec<_> = diags.iter().map(|d| d.path.as_str()).collect();
        assert!(paths.contains(&"remote_controllers[1].id"));
        assert!(paths.contains(&"remote_controllers[1].uri"));
        assert!(diags.iter().all(Diagnostic::is_error));
    }

    #[test]
    fn mocks_only_warn() {
        let cfg = AppConfig {
            graphql: GraphqlConfig {
                use_mocks: true,
                ..GraphqlConfig::default()
            },
            ..AppConfig::default()
        };
        let diags = validate(&cfg);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Warning);
    }
}
