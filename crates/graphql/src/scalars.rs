//! Custom scalars and JSON <-> GraphQL value conversion.

use std::{fmt, sync::Arc};

use async_graphql::{Name, Value};

#[derive(Debug, thiserror::Error)]
pub enum ScalarError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("unsupported value type")]
    UnsupportedValueType,
}

type Validator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Behaviour of a custom scalar: description and an input validator.
/// Output values pass through unchanged.
#[derive(Clone, Default)]
pub struct ScalarSpec {
    pub description: Option<String>,
    pub specified_by_url: Option<String>,
    validator: Option<Validator>,
}

impl fmt::Debug for ScalarSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarSpec")
            .field("description", &self.description)
            .field("specified_by_url", &self.specified_by_url)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl ScalarSpec {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn specified_by_url(mut self, url: impl Into<String>) -> Self {
        self.specified_by_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn validator(mut self, f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.validator = Some(Arc::new(f));
        self
    }

    pub fn is_valid(&self, value: &Value) -> bool {
        self.validator.as_ref().is_none_or(|f| f(value))
    }

    pub(crate) fn validator_fn(&self) -> Option<Validator> {
        self.validator.clone()
    }
}

/// `Uuid`: a hyphenated or simple UUID string.
pub fn uuid_scalar() -> ScalarSpec {
    ScalarSpec::new()
        .description("UUID string")
        .specified_by_url("https://www.rfc-editor.org/rfc/rfc4122")
        .validator(|v| matches!(v, Value::String(s) if uuid::Uuid::parse_str(s).is_ok()))
}

/// `Json`: any JSON-compatible value.
pub fn json_scalar() -> ScalarSpec {
    ScalarSpec::new()
        .description("Arbitrary JSON value")
        .validator(|v| gql_value_to_json(v.clone()).is_ok())
}

/// `Date`: RFC 3339 timestamp, calendar date (`YYYY-MM-DD`), or epoch
/// milliseconds.
pub fn date_scalar() -> ScalarSpec {
    ScalarSpec::new()
        .description("Date as RFC 3339, YYYY-MM-DD, or epoch milliseconds")
        .validator(|v| match v {
            Value::String(s) => {
                chrono::DateTime::parse_from_rfc3339(s).is_ok()
                    || chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
            },
            Value::Number(n) => n.is_i64() || n.is_u64(),
            _ => false,
        })
}

/// Convert an engine value into JSON. Enum values become strings.
pub fn gql_value_to_json(v: Value) -> Result<serde_json::Value, ScalarError> {
    match v {
        Value::Null => Ok(serde_json::Value::Null),
        Value::Number(n) => Ok(serde_json::to_value(n)?),
        Value::String(s) => Ok(serde_json::Value::String(s)),
        Value::Boolean(b) => Ok(serde_json::Value::Bool(b)),
        Value::Enum(name) => Ok(serde_json::Value::String(name.to_string())),
        Value::List(l) => {
            let items: Result<Vec<serde_json::Value>, _> =
                l.into_iter().map(gql_value_to_json).collect();
            Ok(serde_json::Value::Array(items?))
        },
        Value::Object(m) => {
            let map: Result<serde_json::Map<String, serde_json::Value>, _> = m
                .into_iter()
                .map(|(k, v)| gql_value_to_json(v).map(|jv| (k.to_string(), jv)))
                .collect();
            Ok(serde_json::Value::Object(map?))
        },
        Value::Binary(_) => Err(ScalarError::UnsupportedValueType),
    }
}

/// Convert JSON into an engine value.
pub fn json_to_gql_value(v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else if let Some(f) = n.as_f64() {
                async_graphql::Number::from_f64(f).map_or(Value::Null, Value::Number)
            } else {
                Value::Null
            }
        },
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(a) => Value::List(a.iter().map(json_to_gql_value).collect()),
        serde_json::Value::Object(m) => {
            let map: async_graphql::indexmap::IndexMap<Name, Value> = m
                .iter()
                .map(|(k, v)| (Name::new(k), json_to_gql_value(v)))
                .collect();
            Value::Object(map)
        },
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn json_conversion_round_trips_structures() {
        let input = Value::Object(
            [
                (Name::new("a"), Value::Number(1.into())),
                (Name::new("b"), Value::Boolean(true)),
                (
                    Name::new("c"),
                    Value::List(vec![Value::String("x".into()), Value::Null]),
                ),
                (Name::new("d"), Value::Enum(Name::new("ACTIVE"))),
            ]
            .into_iter()
            .collect(),
        );

        let json = gql_value_to_json(input).expect("to json");
        assert_eq!(json["a"], 1);
        assert_eq!(json["b"], true);
        assert_eq!(json["c"][0], "x");
        assert_eq!(json["d"], "ACTIVE");

        let back = json_to_gql_value(&json);
        assert_eq!(gql_value_to_json(back).expect("again"), json);
    }

    #[test]
    fn binary_values_are_rejected() {
        let err = gql_value_to_json(Value::Binary(vec![1u8, 2].into())).expect_err("binary");
        assert!(err.to_string().contains("unsupported value type"));
        assert!(!json_scalar().is_valid(&Value::Binary(vec![0u8].into())));
    }

    #[test]
    fn uuid_scalar_validates_strings() {
        let spec = uuid_scalar();
        assert!(spec.is_valid(&Value::String(
            "67e55044-10b1-426f-9247-bb680e5fe0c8".into()
        )));
        assert!(!spec.is_valid(&Value::String("nope".into())));
        assert!(!spec.is_valid(&Value::Number(1.into())));
    }

    #[test]
    fn date_scalar_accepts_common_shapes() {
        let spec = date_scalar();
        assert!(spec.is_valid(&Value::String("2024-02-29".into())));
        assert!(spec.is_valid(&Value::String("2024-02-29T10:00:00Z".into())));
        assert!(spec.is_valid(&Value::Number(1_700_000_000_000i64.into())));
        assert!(!spec.is_valid(&Value::String("yesterday".into())));
        assert!(!spec.is_valid(&Value::Boolean(true)));
    }

    #[test]
    fn floats_survive_conversion() {
        let v = json_to_gql_value(&serde_json::json!(1.5));
        assert_eq!(gql_value_to_json(v).expect("float"), serde_json::json!(1.5));
    }
}
