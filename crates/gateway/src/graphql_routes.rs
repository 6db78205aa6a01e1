//! GraphQL HTTP handlers for the gateway.
//!
//! These handlers bridge `AppState` to the composed schema, providing query
//! and mutation execution on `GET`/`POST` at the configured endpoint and
//! GraphiQL at the UI path.

use std::sync::Arc;

use {
    actiongraph_graphql::{Identity, RequestContext, RequestMeta},
    async_graphql::http::GraphiQLSource,
    async_graphql_axum::GraphQLRequest,
    axum::{
        Extension, Json,
        extract::State,
        http::{HeaderMap, Method, Uri, header},
        response::{Html, IntoResponse, Response},
    },
    serde_json::Value,
    tracing::debug,
};

use crate::server::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Execute a GraphQL request. Errors are part of the body; the status is
/// always `200`.
pub async fn graphql_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    identity: Option<Extension<Identity>>,
    req: GraphQLRequest,
) -> Json<Value> {
    let ctx = request_context(&state, method, uri, headers, identity.map(|Extension(i)| i));
    debug!(trace_id = %ctx.trace_id, "executing graphql request");

    // Clone out so a concurrent rebuild does not wait on this request.
    let schema = state.schema.read().await.clone();
    Json(schema.execute_json(req.into_inner(), Arc::new(ctx)).await)
}

/// Serve GraphiQL pointed at the endpoint.
pub async fn graphiql_handler(State(state): State<AppState>) -> Response {
    Html(
        GraphiQLSource::build()
            .endpoint(&state.transport.options().endpoint)
            .title("actiongraph")
            .finish(),
    )
    .into_response()
}

fn request_context(
    state: &AppState,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    identity: Option<Identity>,
) -> RequestContext {
    let trace_id = trace_id(&headers);
    let localizer = state.catalogs.negotiate(
        headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok()),
    );

    state
        .transport
        .request_context(RequestMeta {
            method,
            uri,
            headers,
        })
        .with_identity(identity.unwrap_or_default())
        .with_trace_id(trace_id)
        .with_localizer(localizer)
}

/// `x-request-id` when present and printable, a fresh UUID otherwise.
fn trace_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use {super::*, axum::http::HeaderValue};

    #[test]
    fn trace_id_prefers_the_request_header() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static(" req-42 "));
        assert_eq!(trace_id(&headers), "req-42");
    }

    #[test]
    fn trace_id_falls_back_to_a_uuid() {
        let id = trace_id(&HeaderMap::new());
        assert!(uuid::Uuid::parse_str(&id).is_ok());

        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static(""));
        assert!(uuid::Uuid::parse_str(&trace_id(&headers)).is_ok());
    }
}
