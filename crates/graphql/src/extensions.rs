//! Schema extensions merged into every local controller's sub-schema.

use serde_json::Value;

use crate::{
    error::ResolveError,
    resolver::{ResolverMap, leaf},
    scalars::{date_scalar, json_scalar, uuid_scalar},
    types::QUERY,
};

/// Extra type definitions and resolvers appended to each controller.
///
/// Controller resolvers win over extension resolvers bound at the same path.
#[derive(Debug, Clone, Default)]
pub struct ExtensionDescriptor {
    pub type_defs: String,
    pub resolvers: ResolverMap,
}

const TYPES_SDL: &str = "\
scalar Uuid
scalar Json
scalar Date
";

/// `Uuid`, `Json` and `Date` scalars.
pub fn types_extension() -> ExtensionDescriptor {
    let mut resolvers = ResolverMap::new();
    resolvers.insert_scalar("Uuid", uuid_scalar());
    resolvers.insert_scalar("Json", json_scalar());
    resolvers.insert_scalar("Date", date_scalar());
    ExtensionDescriptor {
        type_defs: TYPES_SDL.to_string(),
        resolvers,
    }
}

const PAGINATION_SDL: &str = "\
type Pagination {
  total: Int
  limit: Int
  offset: Int
}

extend type Query {
  pagination(key: String): Pagination
}
";

/// `pagination(key:)` query field answered by the per-request pagination
/// slot of the same key. A missing or empty key resolves to `null`.
pub fn pagination_extension() -> ExtensionDescriptor {
    let pagination = leaf(|params| async move {
        let Some(key) = params
            .args
            .get("key")
            .and_then(Value::as_str)
            .filter(|key| !key.is_empty())
        else {
            return Ok(Value::Null);
        };
        params
            .request
            .pagination(key)
            .wait(params.request.pagination_timeout())
            .await
            .map_err(|e| ResolveError::opaque(e.to_string()))
    });
    ExtensionDescriptor {
        type_defs: PAGINATION_SDL.to_string(),
        resolvers: ResolverMap::with_field(QUERY, "pagination", pagination),
    }
}
