//! Schema composition: per-controller sub-schemas merged into one
//! executable schema.

use std::sync::Arc;

use {
    actiongraph_config::GraphqlConfig,
    async_graphql::dynamic::Schema,
    futures::future::try_join_all,
    serde_json::Value,
    tracing::{debug, info},
};

use crate::{
    action::{ControllerDef, ControllerKind},
    binder::ResolverBinder,
    context::{RequestContext, TransportInfo},
    error::{Error, Result},
    extensions::ExtensionDescriptor,
    normalize::format_response,
    registry::Registry,
    remote::load_remote_schema,
    resolver::{MergePolicy, ResolverMap},
    runtime::build_executable,
    types::TypeDefs,
};

/// Type definitions and resolvers contributed by one controller.
#[derive(Debug, Clone)]
pub struct SubSchema {
    pub origin: String,
    pub type_defs: TypeDefs,
    pub resolvers: ResolverMap,
}

impl SubSchema {
    /// Parse and validate `sdl` together with `resolvers`.
    pub fn new(origin: impl Into<String>, sdl: &str, resolvers: ResolverMap) -> Result<Self> {
        let origin = origin.into();
        let type_defs = TypeDefs::parse(&origin, sdl)?;
        type_defs.validate(&origin)?;
        type_defs.check_resolvers(&origin, &resolvers)?;
        Ok(Self {
            origin,
            type_defs,
            resolvers,
        })
    }
}

/// Union sub-schemas in order. Later resolvers replace earlier ones at the
/// same path.
pub fn merge_sub_schemas(subs: Vec<SubSchema>) -> Result<(TypeDefs, ResolverMap)> {
    let mut type_defs = TypeDefs::new();
    let mut resolvers = ResolverMap::new();
    for sub in subs {
        type_defs.merge(&sub.origin, sub.type_defs)?;
        for path in resolvers.merge(&sub.resolvers, MergePolicy::Overwrite) {
            debug!(origin = %sub.origin, path = %path, "resolver replaced while merging");
        }
    }
    Ok((type_defs, resolvers))
}

/// The executable schema shared by all requests.
#[derive(Clone)]
pub struct ComposedSchema {
    schema: Schema,
    type_defs: Arc<TypeDefs>,
}

impl ComposedSchema {
    pub fn new(type_defs: TypeDefs, resolvers: &ResolverMap, mocks: bool) -> Result<Self> {
        type_defs.validate("merged schema")?;
        let schema = build_executable(&type_defs, resolvers, mocks)?;
        Ok(Self {
            schema,
            type_defs: Arc::new(type_defs),
        })
    }

    pub fn sdl(&self) -> String {
        self.schema.sdl()
    }

    pub fn type_defs(&self) -> &TypeDefs {
        &self.type_defs
    }

    /// Execute with `ctx` available to every resolver.
    pub async fn execute(
        &self,
        request: impl Into<async_graphql::Request>,
        ctx: Arc<RequestContext>,
    ) -> async_graphql::Response {
        self.schema.execute(request.into().data(ctx)).await
    }

    /// Execute and normalize into the client JSON body.
    pub async fn execute_json(
        &self,
        request: impl Into<async_graphql::Request>,
        ctx: Arc<RequestContext>,
    ) -> Value {
        let localizer = ctx.localizer.clone();
        let response = self.execute(request, ctx).await;
        format_response(response, localizer.as_deref())
    }
}

/// Builds the merged schema of a registry.
pub struct SchemaComposer<'a> {
    registry: &'a Registry,
    extensions: &'a [ExtensionDescriptor],
    options: &'a GraphqlConfig,
    binder: ResolverBinder,
}

impl<'a> SchemaComposer<'a> {
    pub fn new(
        registry: &'a Registry,
        extensions: &'a [ExtensionDescriptor],
        options: &'a GraphqlConfig,
        transport: Arc<TransportInfo>,
    ) -> Self {
        Self {
            registry,
            extensions,
            options,
            binder: ResolverBinder::new(transport).strict(options.strict_resolver_paths),
        }
    }

    /// Controller SDL followed by every extension's SDL; controller resolvers
    /// take precedence over extension resolvers.
    pub fn local_sub_schema(&self, controller: &Arc<ControllerDef>) -> Result<SubSchema> {
        let ControllerKind::Local(descriptor) = &controller.kind else {
            return Err(Error::InvalidType {
                origin: format!("controller {}", controller.id),
                message: "remote controllers have no local type definitions".into(),
            });
        };

        let mut resolvers = self.binder.bind_controller(controller)?;
        let mut sdl = descriptor.type_defs.clone();
        for extension in self.extensions {
            sdl.push('\n');
            sdl.push_str(&extension.type_defs);
            for path in resolvers.merge(&extension.resolvers, MergePolicy::KeepExisting) {
                debug!(controller = %controller.id, path = %path, "controller resolver shadows extension");
            }
        }

        SubSchema::new(format!("controller {}", controller.id), &sdl, resolvers)
    }

    pub async fn remote_sub_schema(&self, controller: &ControllerDef) -> Result<SubSchema> {
        let remote = load_remote_schema(controller, &self.options.remote_schema).await?;
        let origin = format!("remote controller {}", controller.id);
        remote.type_defs.validate(&origin)?;
        Ok(SubSchema {
            origin,
            type_defs: remote.type_defs,
            resolvers: remote.resolvers,
        })
    }

    /// Build every sub-schema, remote ones concurrently, and merge them in
    /// registration order.
    #[tracing::instrument(skip_all, fields(transport = ?self.options.id))]
    pub async fn build_schema(&self) -> Result<ComposedSchema> {
        let mut remotes = try_join_all(
            self.registry
                .remote_controllers()
                .map(|controller| self.remote_sub_schema(controller)),
        )
        .await?
        .into_iter();

        let mut subs = Vec::with_capacity(self.registry.controllers().len());
        for controller in self.registry.controllers() {
            if controller.is_remote() {
                subs.extend(remotes.next());
            } else {
                subs.push(self.local_sub_schema(controller)?);
            }
        }

        let (type_defs, resolvers) = merge_sub_schemas(subs)?;
        let composed = ComposedSchema::new(type_defs, &resolvers, self.options.use_mocks)?;
        info!(
            types = composed.type_defs().len(),
            resolvers = resolvers.leaves().len(),
            mocks = self.options.use_mocks,
            "schema built"
        );
        Ok(composed)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use {
        super::*,
        crate::{
            action::action_fn,
            extensions::{pagination_extension, types_extension},
            resolver::leaf,
        },
        serde_json::json,
    };

    fn transport() -> Arc<TransportInfo> {
        Arc::new(TransportInfo::graphql(None, "/graphql"))
    }

    #[tokio::test]
    async fn controllers_merge_into_one_schema() {
        let mut builder = Registry::builder();
        builder
            .register_controller("a", "type Query { a: Int }")
            .unwrap()
            .register_controller("b", "type Query { b: String }")
            .unwrap()
            .register_action("a", "a", action_fn(|_, _| async { Ok(json!(1)) }), "Query.a")
            .unwrap()
            .register_action("b", "b", action_fn(|_, _| async { Ok(json!("two")) }), "Query.b")
            .unwrap();
        let registry = builder.build();
        let options = GraphqlConfig::default();
        let composed = SchemaComposer::new(&registry, &[], &options, transport())
            .build_schema()
            .await
            .unwrap();

        let body = composed
            .execute_json("{ a b }", Arc::new(RequestContext::default()))
            .await;
        assert_eq!(body, json!({"data": {"a": 1, "b": "two"}}));
    }

    #[test]
    fn conflicting_fields_fail_the_merge() {
        let first = SubSchema::new("one", "type Query { a: Int }", ResolverMap::new()).unwrap();
        let second = SubSchema::new("two", "type Query { a: String }", ResolverMap::new()).unwrap();
        let err = merge_sub_schemas(vec![first, second]).unwrap_err();
        assert!(matches!(err, Error::FieldConflict { ref origin, .. } if origin == "two"));
    }

    #[tokio::test]
    async fn controller_resolvers_beat_extension_resolvers() {
        let mut own = ResolverMap::new();
        own.insert_path("Query.pagination", leaf(|_| async { Ok(json!({"total": 1})) }))
            .unwrap();
        let mut builder = Registry::builder();
        builder
            .register_controller(
                "c",
                crate::action::ControllerDescriptor::new("type Query { a: Int }").with_resolvers(own),
            )
            .unwrap();
        let registry = builder.build();
        let extensions = vec![types_extension(), pagination_extension()];
        let options = GraphqlConfig::default();
        let composed = SchemaComposer::new(&registry, &extensions, &options, transport())
            .build_schema()
            .await
            .unwrap();

        let body = composed
            .execute_json(
                "{ pagination(key: \"k\") { total } }",
                Arc::new(RequestContext::default()),
            )
            .await;
        assert_eq!(body, json!({"data": {"pagination": {"total": 1}}}));
    }

    #[tokio::test]
    async fn orphan_resolvers_are_rejected() {
        let mut builder = Registry::builder();
        builder
            .register_controller("c", "type Query { a: Int }")
            .unwrap()
            .register_action("c", "x", action_fn(|_, _| async { Ok(json!(1)) }), "Query.missing")
            .unwrap();
        let registry = builder.build();
        let options = GraphqlConfig::default();
        let err = SchemaComposer::new(&registry, &[], &options, transport())
            .build_schema()
            .await
            .err()
            .expect("orphan resolver");
        assert!(matches!(err, Error::OrphanResolver { .. }));
    }

    #[tokio::test]
    async fn empty_registry_has_no_query() {
        let registry = Registry::builder().build();
        let options = GraphqlConfig::default();
        let err = SchemaComposer::new(&registry, &[], &options, transport())
            .build_schema()
            .await
            .err()
            .expect("no query");
        assert!(err.to_string().contains("no Query type"));
    }
}
