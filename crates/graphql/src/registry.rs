//! Write-once registration of controllers and actions.
//!
//! Registration happens during startup through a [`RegistryBuilder`]; once
//! [`RegistryBuilder::build`] returns, the resulting [`Registry`] is immutable
//! and shared behind an `Arc`.

use std::sync::Arc;

use {async_graphql::indexmap::IndexMap, tracing::debug};

use crate::{
    action::{
        ActionDef, ActionDescriptor, ActionFactory, ControllerDef, ControllerKind,
        ControllerSource, RemoteDescriptor,
    },
    error::{Error, Result},
};

struct PendingController {
    kind: ControllerKind,
    actions: IndexMap<String, ActionDef>,
}

#[derive(Default)]
pub struct RegistryBuilder {
    controllers: IndexMap<String, PendingController>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a local controller. `source` is SDL text, an absolute path or
    /// `file://` URI to an SDL file, or a full [`ControllerDescriptor`].
    ///
    /// [`ControllerDescriptor`]: crate::action::ControllerDescriptor
    pub fn register_controller(
        &mut self,
        id: impl Into<String>,
        source: impl Into<ControllerSource>,
    ) -> Result<&mut Self> {
        let id = id.into();
        let descriptor = source.into().load()?;
        self.insert_controller(id, ControllerKind::Local(descriptor))?;
        Ok(self)
    }

    /// Register a controller whose schema is served by another GraphQL
    /// endpoint.
    pub fn register_remote_controller(
        &mut self,
        id: impl Into<String>,
        descriptor: impl Into<RemoteDescriptor>,
    ) -> Result<&mut Self> {
        self.insert_controller(id.into(), ControllerKind::Remote(descriptor.into()))?;
        Ok(self)
    }

    pub fn register_action(
        &mut self,
        controller_id: &str,
        action_id: impl Into<String>,
        factory: ActionFactory,
        descriptor: impl Into<ActionDescriptor>,
    ) -> Result<&mut Self> {
        let action_id = action_id.into();
        let controller = self
            .controllers
            .get_mut(controller_id)
            .ok_or_else(|| Error::UnknownController(controller_id.to_string()))?;
        if matches!(controller.kind, ControllerKind::Remote(_)) {
            return Err(Error::RemoteActions(controller_id.to_string()));
        }
        if controller.actions.contains_key(&action_id) {
            return Err(Error::DuplicateRegistration {
                what: "action",
                id: format!("{controller_id}/{action_id}"),
            });
        }

        debug!(controller = controller_id, action = %action_id, "action registered");
        controller.actions.insert(action_id.clone(), ActionDef {
            id: action_id,
            factory,
            graphql: descriptor.into(),
        });
        Ok(self)
    }

    fn insert_controller(&mut self, id: String, kind: ControllerKind) -> Result<()> {
        if self.controllers.contains_key(&id) {
            return Err(Error::DuplicateRegistration {
                what: "controller",
                id,
            });
        }
        debug!(controller = %id, remote = matches!(kind, ControllerKind::Remote(_)), "controller registered");
        self.controllers.insert(id, PendingController {
            kind,
            actions: IndexMap::new(),
        });
        Ok(())
    }

    pub fn build(self) -> Registry {
        let controllers = self
            .controllers
            .into_iter()
            .map(|(id, pending)| {
                Arc::new(ControllerDef {
                    id,
                    kind: pending.kind,
                    actions: pending.actions.into_values().map(Arc::new).collect(),
                })
            })
            .collect();
        Registry { controllers }
    }
}

/// Frozen set of controllers in registration order.
#[derive(Debug, Default)]
pub struct Registry {
    controllers: Vec<Arc<ControllerDef>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn controllers(&self) -> &[Arc<ControllerDef>] {
        &self.controllers
    }

    pub fn controller(&self, id: &str) -> Option<&Arc<ControllerDef>> {
        self.controllers.iter().find(|c| c.id == id)
    }

    pub fn local_controllers(&self) -> impl Iterator<Item = &Arc<ControllerDef>> {
        self.controllers.iter().filter(|c| !c.is_remote())
    }

    pub fn remote_controllers(&self) -> impl Iterator<Item = &Arc<ControllerDef>> {
        self.controllers.iter().filter(|c| c.is_remote())
    }
}
