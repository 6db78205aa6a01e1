//! Controller and action definitions consumed by the binder.

use std::{fmt, future::Future, marker::PhantomData, path::PathBuf, sync::Arc};

use {
    async_graphql::indexmap::IndexMap,
    async_trait::async_trait,
    futures::{FutureExt, future::BoxFuture},
    serde_json::Value,
};

use crate::{
    context::ActionContext,
    error::{Error, ResolveError, Result},
    remote::RemoteFetcher,
    resolver::ResolverMap,
};

/// One executable unit of application behaviour.
///
/// A fresh instance is built per field resolution and bound to that
/// resolution's [`ActionContext`].
#[async_trait]
pub trait Action: Send + Sync {
    /// Check and normalize the incoming arguments. Pass-through by default.
    async fn validate(&self, params: Value) -> Result<Value, ResolveError> {
        Ok(params)
    }

    async fn exec(&self, params: Value) -> Result<Value, ResolveError>;
}

/// Builds an action instance for one invocation.
pub type ActionFactory = Arc<dyn Fn(Arc<ActionContext>) -> Box<dyn Action> + Send + Sync>;

/// Factory from a constructor such as `MyAction::new`.
pub fn factory<A, F>(build: F) -> ActionFactory
where
    A: Action + 'static,
    F: Fn(Arc<ActionContext>) -> A + Send + Sync + 'static,
{
    Arc::new(move |ctx| Box::new(build(ctx)))
}

/// Factory for actions that are a single async function.
pub fn action_fn<F, Fut>(f: F) -> ActionFactory
where
    F: Fn(Arc<ActionContext>, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ResolveError>> + Send + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |ctx| {
        Box::new(FnAction {
            ctx,
            f: Arc::clone(&f),
            _fut: PhantomData,
        })
    })
}

struct FnAction<F, Fut> {
    ctx: Arc<ActionContext>,
    f: Arc<F>,
    _fut: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> Action for FnAction<F, Fut>
where
    F: Fn(Arc<ActionContext>, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ResolveError>> + Send + 'static,
{
    async fn exec(&self, params: Value) -> Result<Value, ResolveError> {
        (self.f)(Arc::clone(&self.ctx), params).await
    }
}

/// Replaces the default dispatch for one resolver path.
pub type Executor =
    Arc<dyn Fn(Arc<ActionContext>) -> BoxFuture<'static, Result<Value, ResolveError>> + Send + Sync>;

/// Wrap an async closure into an [`Executor`].
pub fn executor<F, Fut>(f: F) -> Executor
where
    F: Fn(Arc<ActionContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ResolveError>> + Send + 'static,
{
    Arc::new(move |ctx| f(ctx).boxed())
}

#[derive(Clone)]
pub enum ResolverSpec {
    /// Build the action and run it.
    Default,
    Custom(Executor),
}

impl fmt::Debug for ResolverSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Resolver paths an action answers, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ActionDescriptor {
    resolvers: IndexMap<String, ResolverSpec>,
}

impl ActionDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `path` to the default executor.
    #[must_use]
    pub fn resolver(mut self, path: impl Into<String>) -> Self {
        self.resolvers.insert(path.into(), ResolverSpec::Default);
        self
    }

    /// Bind `path` to a custom executor.
    #[must_use]
    pub fn executor(mut self, path: impl Into<String>, executor: Executor) -> Self {
        self.resolvers
            .insert(path.into(), ResolverSpec::Custom(executor));
        self
    }

    pub fn resolvers(&self) -> impl Iterator<Item = (&String, &ResolverSpec)> {
        self.resolvers.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl From<&str> for ActionDescriptor {
    fn from(path: &str) -> Self {
        Self::new().resolver(path)
    }
}

impl From<String> for ActionDescriptor {
    fn from(path: String) -> Self {
        Self::new().resolver(path)
    }
}

impl From<Vec<&str>> for ActionDescriptor {
    fn from(paths: Vec<&str>) -> Self {
        paths.into_iter().fold(Self::new(), Self::resolver)
    }
}

impl<const N: usize> From<[&str; N]> for ActionDescriptor {
    fn from(paths: [&str; N]) -> Self {
        paths.into_iter().fold(Self::new(), Self::resolver)
    }
}

pub struct ActionDef {
    pub id: String,
    pub factory: ActionFactory,
    pub graphql: ActionDescriptor,
}

impl fmt::Debug for ActionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDef")
            .field("id", &self.id)
            .field("graphql", &self.graphql)
            .finish_non_exhaustive()
    }
}

/// Type definitions and controller-level resolvers of a local controller.
#[derive(Debug, Clone, Default)]
pub struct ControllerDescriptor {
    pub type_defs: String,
    pub resolvers: ResolverMap,
}

impl ControllerDescriptor {
    pub fn new(type_defs: impl Into<String>) -> Self {
        Self {
            type_defs: type_defs.into(),
            resolvers: ResolverMap::new(),
        }
    }

    #[must_use]
    pub fn with_resolvers(mut self, resolvers: ResolverMap) -> Self {
        self.resolvers = resolvers;
        self
    }
}

/// How a controller's type definitions are supplied.
#[derive(Debug, Clone)]
pub enum ControllerSource {
    /// SDL text, or an absolute path / `file://` URI pointing at an SDL file.
    Sdl(String),
    Descriptor(ControllerDescriptor),
}

impl From<&str> for ControllerSource {
    fn from(sdl: &str) -> Self {
        Self::Sdl(sdl.to_string())
    }
}

impl From<String> for ControllerSource {
    fn from(sdl: String) -> Self {
        Self::Sdl(sdl)
    }
}

impl From<ControllerDescriptor> for ControllerSource {
    fn from(descriptor: ControllerDescriptor) -> Self {
        Self::Descriptor(descriptor)
    }
}

impl ControllerSource {
    /// Resolve into a descriptor, reading the SDL file when the string is
    /// an absolute path or a `file://` URI.
    pub fn load(self) -> Result<ControllerDescriptor> {
        match self {
            Self::Descriptor(descriptor) => Ok(descriptor),
            Self::Sdl(text) => match sdl_file_path(&text) {
                Some(path) => {
                    let type_defs = std::fs::read_to_string(&path)
                        .map_err(|source| Error::TypeDefsIo { path, source })?;
                    Ok(ControllerDescriptor::new(type_defs))
                },
                None => Ok(ControllerDescriptor::new(text)),
            },
        }
    }
}

fn sdl_file_path(text: &str) -> Option<PathBuf> {
    if let Some(rest) = text.strip_prefix("file://") {
        return Some(PathBuf::from(rest));
    }
    (text.starts_with('/') && !text.contains('\n')).then(|| PathBuf::from(text))
}

/// Where a remote controller's schema lives.
#[derive(Clone, Default)]
pub struct RemoteDescriptor {
    pub uri: Option<String>,
    /// Pre-built fetcher, used instead of an HTTP client for `uri`.
    pub fetcher: Option<Arc<dyn RemoteFetcher>>,
}

impl fmt::Debug for RemoteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteDescriptor")
            .field("uri", &self.uri)
            .field("fetcher", &self.fetcher.is_some())
            .finish()
    }
}

impl RemoteDescriptor {
    pub fn uri(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            fetcher: None,
        }
    }

    pub fn fetcher(fetcher: Arc<dyn RemoteFetcher>) -> Self {
        Self {
            uri: None,
            fetcher: Some(fetcher),
        }
    }
}

impl From<&str> for RemoteDescriptor {
    fn from(uri: &str) -> Self {
        Self::uri(uri)
    }
}

#[derive(Debug, Clone)]
pub enum ControllerKind {
    Local(ControllerDescriptor),
    Remote(RemoteDescriptor),
}

#[derive(Debug)]
pub struct ControllerDef {
    pub id: String,
    pub kind: ControllerKind,
    pub actions: Vec<Arc<ActionDef>>,
}

impl ControllerDef {
    pub fn is_remote(&self) -> bool {
        matches!(self.kind, ControllerKind::Remote(_))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use {super::*, std::io::Write};

    #[test]
    fn literal_sdl_is_kept_byte_identical() {
        let sdl = "type Query { hello: String }";
        let descriptor = ControllerSource::from(sdl).load().unwrap();
        assert_eq!(descriptor.type_defs, sdl);
    }

    #[test]
    fn absolute_path_and_file_uri_load_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let body = "type Query {\n  fromFile: Int\n}\n";
        file.write_all(body.as_bytes()).unwrap();
        let path = file.path().to_str().unwrap().to_string();
        assert!(path.starts_with('/'));

        let by_path = ControllerSource::from(path.as_str()).load().unwrap();
        assert_eq!(by_path.type_defs, body);

        let by_uri = ControllerSource::from(format!("file://{path}"))
            .load()
            .unwrap();
        assert_eq!(by_uri.type_defs, body);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = ControllerSource::from("/definitely/not/here.graphql")
            .load()
            .unwrap_err();
        assert!(matches!(err, Error::TypeDefsIo { .. }));
    }

    #[test]
    fn descriptor_sugar() {
        let single = ActionDescriptor::from("Query.user");
        let many = ActionDescriptor::from(["Query.a", "Query.b"]);
        let explicit = ActionDescriptor::new()
            .resolver("Query.c")
            .executor("Query.d", executor(|_ctx| async { Ok(Value::Null) }));

        assert_eq!(single.resolvers().count(), 1);
        let paths: Vec<_> = many.resolvers().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, ["Query.a", "Query.b"]);
        let kinds: Vec<_> = explicit
            .resolvers()
            .map(|(_, s)| matches!(s, ResolverSpec::Custom(_)))
            .collect();
        assert_eq!(kinds, [false, true]);
    }
}
