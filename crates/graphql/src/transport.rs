//! The GraphQL transport: options, registry and extensions in one place.

use std::{sync::Arc, time::Duration};

use actiongraph_config::GraphqlConfig;

use crate::{
    context::{RequestContext, RequestMeta, TransportInfo},
    error::Result,
    extensions::{ExtensionDescriptor, pagination_extension, types_extension},
    registry::Registry,
    schema::{ComposedSchema, SchemaComposer},
};

pub struct GraphqlTransport {
    options: GraphqlConfig,
    registry: Arc<Registry>,
    extensions: Vec<ExtensionDescriptor>,
    info: Arc<TransportInfo>,
}

impl GraphqlTransport {
    /// Transport with the scalar and pagination extensions installed.
    pub fn new(options: GraphqlConfig, registry: Arc<Registry>) -> Self {
        let info = Arc::new(TransportInfo::graphql(
            options.id.clone(),
            options.endpoint.clone(),
        ));
        Self {
            options,
            registry,
            extensions: vec![types_extension(), pagination_extension()],
            info,
        }
    }

    /// Replace the installed extensions.
    #[must_use]
    pub fn with_extensions(mut self, extensions: Vec<ExtensionDescriptor>) -> Self {
        self.extensions = extensions;
        self
    }

    #[must_use]
    pub fn extension(mut self, extension: ExtensionDescriptor) -> Self {
        self.extensions.push(extension);
        self
    }

    pub fn options(&self) -> &GraphqlConfig {
        &self.options
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn info(&self) -> &Arc<TransportInfo> {
        &self.info
    }

    pub async fn build_schema(&self) -> Result<ComposedSchema> {
        SchemaComposer::new(
            &self.registry,
            &self.extensions,
            &self.options,
            Arc::clone(&self.info),
        )
        .build_schema()
        .await
    }

    /// Fresh per-request context carrying this transport's settings.
    pub fn request_context(&self, request: RequestMeta) -> RequestContext {
        RequestContext::new(request)
            .with_pagination_timeout(Duration::from_secs(self.options.pagination_timeout_secs))
    }
}
