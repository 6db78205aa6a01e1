//! GraphQL binding layer for action-oriented applications.
//!
//! Controllers own type definitions, actions own dotted resolver paths
//! (`Query.user`, `User.posts`) and the behaviour behind them. This crate
//! binds the two into resolver maps, merges every controller (local or
//! remote) into one executable schema, and normalizes resolver errors into a
//! flat client-facing shape.
//!
//! The gateway crate is responsible for the HTTP handlers; this crate only
//! builds and executes the schema.

pub mod action;
pub mod binder;
pub mod cache;
pub mod context;
pub mod error;
pub mod extensions;
pub mod mock;
pub mod normalize;
pub mod pagination;
pub mod registry;
pub mod remote;
pub mod resolver;
pub mod runtime;
pub mod scalars;
pub mod schema;
pub mod transport;
pub mod types;

pub use {
    action::{
        Action, ActionDescriptor, ActionFactory, ControllerDescriptor, Executor,
        RemoteDescriptor, action_fn, executor, factory,
    },
    context::{ActionContext, Identity, Localizer, RequestContext, RequestMeta},
    error::{ActionError, Error, ResolveError},
    extensions::{ExtensionDescriptor, pagination_extension, types_extension},
    normalize::NormalizedError,
    registry::{Registry, RegistryBuilder},
    resolver::{ResolverMap, leaf},
    schema::ComposedSchema,
    transport::GraphqlTransport,
};
