//! Request-scoped and invocation-scoped contexts.

use std::{fmt, future::Future, sync::Arc, time::Duration};

use {
    http::{HeaderMap, Method, Uri},
    serde_json::Value,
};

use crate::{
    action::{ActionDef, ControllerDef},
    cache::{CacheContext, CachedFuture},
    error::ResolveError,
    pagination::{Deferred, PaginationSlots},
    resolver::{FieldInfo, ResolveParams},
};

/// Translates error hashes into human-readable messages for one request.
pub trait Localizer: Send + Sync {
    fn translate(&self, hash: &str) -> String;
}

/// Authenticated principal, placed in request extensions by the auth layer.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub user: Option<Value>,
    pub auth_info: Option<Value>,
}

/// The parts of the HTTP request resolvers may look at.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

const DEFAULT_PAGINATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything that lives for exactly one GraphQL request.
///
/// Created by the transport for each inbound request and dropped with the
/// response. Shared by all resolvers of that request.
pub struct RequestContext {
    pub request: RequestMeta,
    pub identity: Identity,
    pub trace_id: String,
    pub cache: CacheContext,
    pub localizer: Option<Arc<dyn Localizer>>,
    pagination: PaginationSlots,
    pagination_timeout: Duration,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(RequestMeta::default())
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request", &self.request)
            .field("identity", &self.identity)
            .field("trace_id", &self.trace_id)
            .field("localized", &self.localizer.is_some())
            .finish_non_exhaustive()
    }
}

impl RequestContext {
    pub fn new(request: RequestMeta) -> Self {
        Self {
            request,
            identity: Identity::default(),
            trace_id: uuid::Uuid::new_v4().to_string(),
            cache: CacheContext::new(),
            localizer: None,
            pagination: PaginationSlots::default(),
            pagination_timeout: DEFAULT_PAGINATION_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    #[must_use]
    pub fn with_localizer(mut self, localizer: Option<Arc<dyn Localizer>>) -> Self {
        self.localizer = localizer;
        self
    }

    #[must_use]
    pub fn with_pagination_timeout(mut self, timeout: Duration) -> Self {
        self.pagination_timeout = timeout;
        self
    }

    /// Pagination slot for `key`, shared by producer and consumer.
    pub fn pagination(&self, key: &str) -> Arc<Deferred> {
        self.pagination.get(key)
    }

    pub fn pagination_timeout(&self) -> Duration {
        self.pagination_timeout
    }
}

/// Identifies the transport that invoked an action.
#[derive(Debug, Clone)]
pub struct TransportInfo {
    pub name: &'static str,
    pub id: Option<String>,
    pub endpoint: String,
}

impl TransportInfo {
    pub fn graphql(id: Option<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: "GraphQL",
            id,
            endpoint: endpoint.into(),
        }
    }
}

/// Context handed to executors and action instances for one field
/// resolution.
pub struct ActionContext {
    pub controller: Arc<ControllerDef>,
    pub action: Arc<ActionDef>,
    pub transport: Arc<TransportInfo>,
    pub request: Arc<RequestContext>,
    pub user: Option<Value>,
    pub auth_info: Option<Value>,
    pub trace_id: String,
    /// Raw field arguments.
    pub params: Value,
    /// Parent object of the field.
    pub root: Value,
    pub info: FieldInfo,
}

impl fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("controller", &self.controller.id)
            .field("action", &self.action.id)
            .field("trace_id", &self.trace_id)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl ActionContext {
    pub(crate) fn new(
        controller: Arc<ControllerDef>,
        action: Arc<ActionDef>,
        transport: Arc<TransportInfo>,
        params: ResolveParams,
    ) -> Self {
        let ResolveParams {
            root,
            args,
            request,
            info,
        } = params;
        Self {
            controller,
            action,
            transport,
            user: request.identity.user.clone(),
            auth_info: request.identity.auth_info.clone(),
            trace_id: request.trace_id.clone(),
            request,
            params: args,
            root,
            info,
        }
    }

    /// Run the default dispatch (build the action, validate, execute).
    /// Custom executors use this to wrap rather than replace it.
    pub async fn original_executor(self: Arc<Self>) -> Result<Value, ResolveError> {
        crate::binder::default_executor(self).await
    }

    /// Memoize `compute` under `key` for the rest of the request.
    pub fn cache<F, Fut>(&self, key: impl Into<String>, compute: F) -> CachedFuture
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, ResolveError>> + Send + 'static,
    {
        self.request.cache.cache(key, compute)
    }

    pub fn pagination(&self, key: &str) -> Arc<Deferred> {
        self.request.pagination(key)
    }

    pub fn localize(&self, hash: &str) -> Option<String> {
        self.request.localizer.as_ref().map(|l| l.translate(hash))
    }
}
