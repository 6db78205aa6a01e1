//! Turns controller and action registrations into resolver maps.

use std::{collections::HashMap, sync::Arc};

use {
    futures::FutureExt,
    serde_json::Value,
    tracing::{debug, info, warn},
};

use crate::{
    action::{ActionDef, ControllerDef, ControllerKind, ResolverSpec},
    context::{ActionContext, TransportInfo},
    error::{Error, ResolveError, Result},
    resolver::{LeafFn, ResolveParams, Resolved, ResolverMap},
};

/// Build a fresh action for the invocation, validate the arguments and run it.
pub async fn default_executor(ctx: Arc<ActionContext>) -> Result<Value, ResolveError> {
    let action = (ctx.action.factory)(Arc::clone(&ctx));
    let params = action.validate(ctx.params.clone()).await?;
    action.exec(params).await
}

/// Wrap an action so it can sit in a [`ResolverMap`].
fn leaf_wrapper(
    controller: Arc<ControllerDef>,
    action: Arc<ActionDef>,
    spec: ResolverSpec,
    transport: Arc<TransportInfo>,
) -> LeafFn {
    Arc::new(move |params: ResolveParams| {
        let ctx = Arc::new(ActionContext::new(
            Arc::clone(&controller),
            Arc::clone(&action),
            Arc::clone(&transport),
            params,
        ));
        let fut = match &spec {
            ResolverSpec::Custom(executor) => executor(ctx),
            ResolverSpec::Default => default_executor(ctx).boxed(),
        };
        fut.map(|result| result.map(Resolved::Value)).boxed()
    })
}

pub struct ResolverBinder {
    transport: Arc<TransportInfo>,
    strict: bool,
}

impl ResolverBinder {
    pub fn new(transport: Arc<TransportInfo>) -> Self {
        Self {
            transport,
            strict: false,
        }
    }

    /// Treat a path bound by two actions as an error instead of letting the
    /// last one win.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    fn log_prefix(&self) -> String {
        match &self.transport.id {
            Some(id) => format!("[{}:{id}]", self.transport.name),
            None => format!("[{}]", self.transport.name),
        }
    }

    /// Resolver map of one local controller: its own resolvers with every
    /// action leaf installed on top. Remote controllers yield an empty map.
    pub fn bind_controller(&self, controller: &Arc<ControllerDef>) -> Result<ResolverMap> {
        let ControllerKind::Local(descriptor) = &controller.kind else {
            return Ok(ResolverMap::new());
        };
        let prefix = self.log_prefix();
        info!(controller = %controller.id, "{prefix} controller is applying");

        let mut map = descriptor.resolvers.clone();
        let mut owners: HashMap<String, String> = HashMap::new();

        for action in &controller.actions {
            let owner = format!("{}/{}", controller.id, action.id);
            for (path, spec) in action.graphql.resolvers() {
                if let Some(previous) = owners.get(path)
                    && *previous != owner
                {
                    if self.strict {
                        return Err(Error::DuplicateResolver {
                            path: path.clone(),
                            previous: previous.clone(),
                            current: owner,
                        });
                    }
                    warn!(
                        path = %path,
                        previous = %previous,
                        current = %owner,
                        "{prefix} resolver path bound twice, last registration wins"
                    );
                }

                let leaf = leaf_wrapper(
                    Arc::clone(controller),
                    Arc::clone(action),
                    spec.clone(),
                    Arc::clone(&self.transport),
                );
                let replaced = map.insert_path(path, leaf)?;
                if replaced.is_some() && !owners.contains_key(path) {
                    debug!(path = %path, "{prefix} action replaces controller resolver");
                }
                owners.insert(path.clone(), owner.clone());
                info!("{prefix} + resolver {path} ({owner})");
            }
        }
        Ok(map)
    }
}
