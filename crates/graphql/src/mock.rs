//! Mock values for running a schema without resolvers.
//!
//! Objects mock to `{}` and their fields are mocked when they are selected,
//! so recursive types never expand eagerly.

use {
    rand::Rng,
    serde_json::{Value, json},
};

use crate::types::{DefKind, Ty, TypeDefs};

const MOCK_STRING: &str = "Hello World";
const LIST_LEN: usize = 2;

/// Mock a value for the field type `ty`.
pub fn mock_value(defs: &TypeDefs, ty: &Ty) -> Value {
    match ty {
        Ty::NonNull(inner) => mock_value(defs, inner),
        Ty::List(inner) => Value::Array((0..LIST_LEN).map(|_| mock_value(defs, inner)).collect()),
        Ty::Named(name) => mock_named(defs, name),
    }
}

fn mock_named(defs: &TypeDefs, name: &str) -> Value {
    let Some(def) = defs.get(name) else {
        return mock_scalar(name);
    };
    match &def.kind {
        DefKind::Scalar => mock_scalar(name),
        DefKind::Enum { values } => values.first().map_or(Value::Null, |v| json!(v)),
        DefKind::Object { .. } => json!({}),
        DefKind::Interface { .. } | DefKind::Union { .. } => defs
            .possible_types(name)
            .first()
            .map_or(Value::Null, |first| json!({ "__typename": first })),
        DefKind::InputObject { .. } => Value::Null,
    }
}

/// Mock a built-in or well-known custom scalar. Unknown scalars get a string.
pub fn mock_scalar(name: &str) -> Value {
    let mut rng = rand::rng();
    match name {
        "Int" => json!(rng.random_range(-100..=100)),
        "Float" => json!(rng.random_range(-100.0..100.0)),
        "Boolean" => json!(rng.random_bool(0.5)),
        "ID" | "Uuid" => json!(uuid::Uuid::new_v4().to_string()),
        "Date" => json!(chrono::Utc::now().to_rfc3339()),
        "Json" => json!({}),
        _ => json!(MOCK_STRING),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn defs() -> TypeDefs {
        TypeDefs::parse(
            "mocks",
            "type Query { a: Int }\n\
             enum Color { RED GREEN }\n\
             type User { id: ID }\n\
             union Thing = User\n\
             scalar Custom",
        )
        .expect("sdl")
    }

    #[test]
    fn scalars_follow_fixed_rules() {
        for _ in 0..50 {
            let n = mock_scalar("Int").as_i64().unwrap();
            assert!((-100..=100).contains(&n));
            let f = mock_scalar("Float").as_f64().unwrap();
            assert!((-100.0..100.0).contains(&f));
        }
        assert_eq!(mock_scalar("String"), json!("Hello World"));
        assert!(mock_scalar("Boolean").is_boolean());
        assert!(uuid::Uuid::parse_str(mock_scalar("ID").as_str().unwrap()).is_ok());
        assert!(chrono::DateTime::parse_from_rfc3339(mock_scalar("Date").as_str().unwrap()).is_ok());
        assert_eq!(mock_scalar("Json"), json!({}));
    }

    #[test]
    fn composite_types() {
        let defs = defs();
        let list = Ty::NonNull(Box::new(Ty::List(Box::new(Ty::Named("Color".into())))));
        assert_eq!(mock_value(&defs, &list), json!(["RED", "RED"]));
        assert_eq!(mock_value(&defs, &Ty::Named("User".into())), json!({}));
        assert_eq!(
            mock_value(&defs, &Ty::Named("Thing".into())),
            json!({"__typename": "User"})
        );
        assert_eq!(mock_value(&defs, &Ty::Named("Custom".into())), json!("Hello World"));
    }
}
