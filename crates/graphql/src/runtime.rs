//! Translate merged type definitions and resolvers into an executable
//! `async_graphql::dynamic::Schema`.
//!
//! Every object field gets a resolver that either runs the bound leaf, reads
//! the property off its parent value, or produces a mock. Values are plain
//! JSON until they are shaped into engine values according to the field type.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use {
    async_graphql::{
        Context, Data, Name, PathSegment, QueryPathSegment, Response,
        dynamic::{
            Enum, EnumItem, Field, FieldFuture, FieldValue, InputObject, InputValue, Interface,
            InterfaceField, Object, ResolverContext, Scalar, Schema, TypeRef, Union,
        },
        extensions::{Extension, ExtensionContext, ExtensionFactory, NextExecute},
        parser::types as ast,
    },
    async_trait::async_trait,
    serde_json::Value,
    tracing::{debug, warn},
};

use crate::{
    context::RequestContext,
    error::{Error, ResolveError, Result, gql_err},
    mock::mock_value,
    resolver::{FieldInfo, Fragment, LeafFn, ResolveParams, Resolved, ResolverMap, Selection},
    scalars::{ScalarSpec, gql_value_to_json, json_to_gql_value},
    types::{DefKind, FieldDef, InputValueDef, MUTATION, QUERY, SUBSCRIPTION, Ty, TypeClass, TypeDefs},
};

/// Value of an object in the result tree.
#[derive(Debug, Clone)]
struct Parent {
    value: Value,
    /// Returned by a remote service: nested fields are read by response key
    /// instead of field name.
    forwarded: bool,
    /// Response path nulled when a non-null field below fails. Empty stands
    /// for `data` itself.
    nullable_at: Vec<PathSegment>,
}

/// Stand-in for a `null` list item of a composite type. The engine resolves
/// every list item, so the item is rendered from placeholders and replaced
/// by `null` once execution finishes.
struct NullItem;

/// Response paths to null out after execution, shared by one request.
#[derive(Default)]
struct NullPaths(Mutex<Vec<Vec<PathSegment>>>);

impl NullPaths {
    fn extend(&self, paths: impl IntoIterator<Item = Vec<PathSegment>>) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).extend(paths);
    }

    fn take(&self) -> Vec<Vec<PathSegment>> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

/// Engine extension that applies the recorded [`NullPaths`] to the response:
/// `null` list items, and the nearest nullable ancestor of a failed non-null
/// field.
struct NullPropagation;

impl ExtensionFactory for NullPropagation {
    fn create(&self) -> Arc<dyn Extension> {
        Arc::new(NullPropagation)
    }
}

#[async_trait]
impl Extension for NullPropagation {
    async fn execute(
        &self,
        ctx: &ExtensionContext<'_>,
        operation_name: Option<&str>,
        next: NextExecute<'_>,
    ) -> Response {
        let paths = Arc::new(NullPaths::default());
        let mut data = Data::default();
        data.insert(Arc::clone(&paths));
        let mut response = next.run_with_data(ctx, operation_name, data).await;
        for path in paths.take() {
            set_null(&mut response.data, &path);
        }
        response
    }
}

fn set_null(data: &mut async_graphql::Value, path: &[PathSegment]) {
    let mut current = data;
    for segment in path {
        let next = match (segment, current) {
            (PathSegment::Field(key), async_graphql::Value::Object(map)) => map.get_mut(key.as_str()),
            (PathSegment::Index(index), async_graphql::Value::List(items)) => items.get_mut(*index),
            _ => None,
        };
        // Gone when an ancestor was nulled first.
        let Some(next) = next else {
            return;
        };
        current = next;
    }
    *current = async_graphql::Value::Null;
}

fn record_null_paths(ctx: &Context<'_>, paths: impl IntoIterator<Item = Vec<PathSegment>>) {
    if let Some(null_paths) = ctx.data_opt::<Arc<NullPaths>>() {
        null_paths.extend(paths);
    }
}

/// Response position of the value being shaped.
#[derive(Default)]
struct Cursor {
    path: Vec<PathSegment>,
    /// Response paths of `null` list items found so far.
    null_items: Vec<Vec<PathSegment>>,
}

/// Response path of the field `ctx` resolves.
fn path_of(ctx: &Context<'_>) -> Vec<PathSegment> {
    let Some(node) = ctx.path_node.as_ref() else {
        return Vec::new();
    };
    let mut path: Vec<PathSegment> = std::iter::once(node)
        .chain(node.parents())
        .map(|node| match node.segment {
            QueryPathSegment::Name(name) => PathSegment::Field(name.to_string()),
            QueryPathSegment::Index(index) => PathSegment::Index(index),
        })
        .collect();
    path.reverse();
    path
}

/// Shared, read-only state of all field resolvers.
struct Shaper {
    defs: TypeDefs,
    mocks: bool,
}

impl Shaper {
    /// Shape `value` for a position of type `ty` at `cursor.path`.
    /// `nullable_at` is the nearest nullable position above it.
    fn to_field_value<'a>(
        &self,
        value: Value,
        ty: &Ty,
        forwarded: bool,
        nullable_at: &[PathSegment],
        cursor: &mut Cursor,
    ) -> std::result::Result<Option<FieldValue<'a>>, ResolveError> {
        if value.is_null() {
            return Ok(None);
        }
        let (ty, nullable_at) = match ty {
            Ty::NonNull(inner) => (inner.as_ref(), nullable_at.to_vec()),
            other => (other, cursor.path.clone()),
        };
        match ty {
            Ty::NonNull(_) => Err(ResolveError::opaque(format!("invalid type {ty}"))),
            Ty::List(inner) => {
                let Value::Array(items) = value else {
                    return Err(ResolveError::opaque(format!(
                        "expected a list for type {ty}, found {value}"
                    )));
                };
                let mut shaped = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    cursor.path.push(PathSegment::Index(index));
                    let value = match self.to_field_value(item, inner, forwarded, &nullable_at, cursor)? {
                        Some(value) => value,
                        None if matches!(**inner, Ty::NonNull(_)) => {
                            return Err(ResolveError::opaque(format!(
                                "list of type {ty} cannot hold null items"
                            )));
                        },
                        None => {
                            cursor.null_items.push(cursor.path.clone());
                            self.placeholder(inner)?
                        },
                    };
                    cursor.path.pop();
                    shaped.push(value);
                }
                Ok(Some(FieldValue::list(shaped)))
            },
            Ty::Named(name) => self.shape_named(value, name, forwarded, nullable_at).map(Some),
        }
    }

    fn shape_named<'a>(
        &self,
        value: Value,
        name: &str,
        forwarded: bool,
        nullable_at: Vec<PathSegment>,
    ) -> std::result::Result<FieldValue<'a>, ResolveError> {
        let parent = |value: Value| Parent {
            value,
            forwarded,
            nullable_at,
        };
        match self.defs.class_of(name) {
            Some(TypeClass::Scalar) => Ok(FieldValue::value(json_to_gql_value(&value))),
            Some(TypeClass::Enum) => match value {
                Value::String(item) => Ok(FieldValue::value(async_graphql::Value::Enum(Name::new(
                    item,
                )))),
                other => Err(ResolveError::opaque(format!(
                    "enum {name} cannot represent value {other}"
                ))),
            },
            Some(TypeClass::Object) => Ok(FieldValue::owned_any(parent(value))),
            Some(TypeClass::Abstract) => {
                let type_name = self.concrete_type(&value, name)?;
                Ok(FieldValue::owned_any(parent(value)).with_type(type_name))
            },
            Some(TypeClass::Input) | None => Err(ResolveError::opaque(format!(
                "type {name} cannot be used as an output type"
            ))),
        }
    }

    /// A value the engine accepts for `ty`, rendered in place of a `null`
    /// list item.
    fn placeholder<'a>(&self, ty: &Ty) -> std::result::Result<FieldValue<'a>, ResolveError> {
        match ty {
            Ty::NonNull(inner) => self.placeholder(inner),
            Ty::List(_) => Ok(FieldValue::list(Vec::<FieldValue<'a>>::new())),
            Ty::Named(name) => match self.defs.class_of(name) {
                Some(TypeClass::Object) => Ok(FieldValue::owned_any(NullItem)),
                Some(TypeClass::Abstract) => {
                    let type_name = self
                        .defs
                        .possible_types(name)
                        .first()
                        .map(|first| (*first).to_string())
                        .ok_or_else(|| {
                            ResolveError::opaque(format!("abstract type {name} has no object types"))
                        })?;
                    Ok(FieldValue::owned_any(NullItem).with_type(type_name))
                },
                _ => self.shape_named(mock_value(&self.defs, ty), name, false, Vec::new()),
            },
        }
    }

    /// Object type of a value returned for an interface or union.
    fn concrete_type(&self, value: &Value, abstract_name: &str) -> std::result::Result<String, ResolveError> {
        if let Some(type_name) = value.get("__typename").and_then(Value::as_str) {
            return Ok(type_name.to_string());
        }
        match self.defs.possible_types(abstract_name).as_slice() {
            [only] => Ok((*only).to_string()),
            _ => Err(ResolveError::opaque(format!(
                "abstract type {abstract_name} must resolve to an object type at runtime; \
                 return a \"__typename\""
            ))),
        }
    }
}

/// One object field and what resolves it.
struct FieldPlan {
    parent_type: String,
    name: String,
    ty: Ty,
    leaf: Option<LeafFn>,
}

/// Value bound to a variable of the running operation, or its default.
fn variable(ctx: &Context<'_>, name: &str) -> Option<async_graphql::Value> {
    let definition = ctx
        .query_env
        .operation
        .node
        .variable_definitions
        .iter()
        .find(|def| def.node.name.node == name)?;
    ctx.query_env
        .variables
        .get(&definition.node.name.node)
        .or_else(|| definition.node.default_value())
        .cloned()
}

/// The selected field as written in the operation, fragments included, with
/// variables replaced by their values.
fn selection_of(ctx: &Context<'_>, field: &ast::Field) -> Selection {
    let (children, fragments) = selection_set_of(ctx, &field.selection_set.node);
    Selection {
        name: field.name.node.to_string(),
        alias: field.alias.as_ref().map(|alias| alias.node.to_string()),
        arguments: field
            .arguments
            .iter()
            .filter_map(|(name, value)| {
                let value = value
                    .node
                    .clone()
                    .into_const_with(|var| variable(ctx, &var).ok_or(()))
                    .ok()?;
                Some((name.node.to_string(), value))
            })
            .collect(),
        children,
        fragments,
    }
}

fn selection_set_of(ctx: &Context<'_>, set: &ast::SelectionSet) -> (Vec<Selection>, Vec<Fragment>) {
    let mut children = Vec::new();
    let mut fragments = Vec::new();
    for item in &set.items {
        let (type_condition, selection_set) = match &item.node {
            ast::Selection::Field(field) => {
                children.push(selection_of(ctx, &field.node));
                continue;
            },
            ast::Selection::InlineFragment(fragment) => (
                fragment.node.type_condition.as_ref(),
                &fragment.node.selection_set.node,
            ),
            ast::Selection::FragmentSpread(spread) => {
                // Unknown fragments fail validation before execution.
                let Some(fragment) = ctx.query_env.fragments.get(&spread.node.fragment_name.node)
                else {
                    continue;
                };
                (
                    Some(&fragment.node.type_condition),
                    &fragment.node.selection_set.node,
                )
            },
        };
        let (inner_children, inner_fragments) = selection_set_of(ctx, selection_set);
        fragments.push(Fragment {
            type_condition: type_condition.map(|condition| condition.node.on.node.to_string()),
            children: inner_children,
            fragments: inner_fragments,
        });
    }
    (children, fragments)
}

fn request_of(ctx: &ResolverContext<'_>) -> Arc<RequestContext> {
    ctx.ctx
        .data_opt::<Arc<RequestContext>>()
        .cloned()
        .unwrap_or_default()
}

fn args_of(ctx: &ResolverContext<'_>) -> std::result::Result<Value, ResolveError> {
    let args = async_graphql::Value::Object(ctx.args.as_index_map().clone());
    gql_value_to_json(args).map_err(|e| ResolveError::opaque(e.to_string()))
}

async fn resolve_field<'a>(
    shaper: &Shaper,
    plan: &FieldPlan,
    ctx: ResolverContext<'a>,
) -> async_graphql::Result<Option<FieldValue<'a>>> {
    if ctx.parent_value.try_downcast_ref::<NullItem>().is_ok() {
        return match plan.ty {
            Ty::NonNull(_) => shaper.placeholder(&plan.ty).map(Some).map_err(gql_err),
            _ => Ok(None),
        };
    }

    let nullable_at = ctx
        .parent_value
        .try_downcast_ref::<Parent>()
        .map(|parent| parent.nullable_at.clone())
        .unwrap_or_default();
    let mut cursor = Cursor {
        path: path_of(ctx.ctx),
        null_items: Vec::new(),
    };
    let err = match produce(shaper, plan, &ctx, &nullable_at, &mut cursor).await {
        Ok(value) => {
            record_null_paths(ctx.ctx, cursor.null_items);
            return Ok(value);
        },
        Err(err) => err,
    };

    // The engine drops a failed field from its parent. Report the error at
    // its path and null the nearest nullable position instead.
    let error = ctx
        .ctx
        .set_error_path(gql_err(err).into_server_error(ctx.ctx.item.pos));
    ctx.ctx.add_error(error);
    if !matches!(plan.ty, Ty::NonNull(_)) {
        return Ok(None);
    }
    record_null_paths(ctx.ctx, [nullable_at]);
    shaper.placeholder(&plan.ty).map(Some).map_err(gql_err)
}

async fn produce<'a>(
    shaper: &Shaper,
    plan: &FieldPlan,
    ctx: &ResolverContext<'a>,
    nullable_at: &[PathSegment],
    cursor: &mut Cursor,
) -> std::result::Result<Option<FieldValue<'a>>, ResolveError> {
    let (value, forwarded) = if shaper.mocks {
        (mock_value(&shaper.defs, &plan.ty), false)
    } else {
        let field = &ctx.ctx.item.node;
        let response_key = field.response_key().node.to_string();
        let parent = ctx.parent_value.try_downcast_ref::<Parent>().ok();

        match &plan.leaf {
            Some(leaf) => {
                let params = ResolveParams {
                    root: parent.map(|p| p.value.clone()).unwrap_or(Value::Null),
                    args: args_of(ctx)?,
                    request: request_of(ctx),
                    info: FieldInfo {
                        parent_type: plan.parent_type.clone(),
                        field_name: plan.name.clone(),
                        response_key,
                        selection: selection_of(ctx.ctx, field),
                    },
                };
                match leaf(params).await? {
                    Resolved::Value(value) => (value, false),
                    Resolved::Forwarded(value) => (value, true),
                }
            },
            None => match parent {
                Some(Parent {
                    value, forwarded, ..
                }) => {
                    let key = if *forwarded { &response_key } else { &plan.name };
                    (value.get(key).cloned().unwrap_or_default(), *forwarded)
                },
                None => (Value::Null, false),
            },
        }
    };

    let shaped = shaper.to_field_value(value, &plan.ty, forwarded, nullable_at, cursor)?;
    if shaped.is_none() && matches!(plan.ty, Ty::NonNull(_)) {
        return Err(ResolveError::opaque(format!(
            "non-null field {}.{} resolved to null",
            plan.parent_type, plan.name
        )));
    }
    Ok(shaped)
}

fn type_ref(ty: &Ty) -> TypeRef {
    match ty {
        Ty::Named(name) => TypeRef::named(name.clone()),
        Ty::List(inner) => TypeRef::List(Box::new(type_ref(inner))),
        Ty::NonNull(inner) => TypeRef::NonNull(Box::new(type_ref(inner))),
    }
}

fn input_value(def: &InputValueDef) -> InputValue {
    let mut input = InputValue::new(&def.name, type_ref(&def.ty));
    if let Some(description) = &def.description {
        input = input.description(description);
    }
    if let Some(default) = &def.default {
        input = input.default_value(default.clone());
    }
    input
}

fn field(shaper: &Arc<Shaper>, parent_type: &str, def: &FieldDef, leaf: Option<LeafFn>) -> Field {
    let plan = Arc::new(FieldPlan {
        parent_type: parent_type.to_string(),
        name: def.name.clone(),
        ty: def.ty.clone(),
        leaf,
    });
    let shaper = Arc::clone(shaper);
    let mut field = Field::new(&def.name, type_ref(&def.ty), move |ctx| {
        let shaper = Arc::clone(&shaper);
        let plan = Arc::clone(&plan);
        FieldFuture::new(async move { resolve_field(&shaper, &plan, ctx).await })
    });
    if let Some(description) = &def.description {
        field = field.description(description);
    }
    for arg in &def.args {
        field = field.argument(input_value(arg));
    }
    field
}

fn scalar(name: &str, description: Option<&String>, spec: Option<&ScalarSpec>) -> Scalar {
    let mut scalar = Scalar::new(name);
    if let Some(description) = spec.and_then(|s| s.description.as_ref()).or(description) {
        scalar = scalar.description(description);
    }
    if let Some(url) = spec.and_then(|s| s.specified_by_url.as_ref()) {
        scalar = scalar.specified_by_url(url);
    }
    if let Some(validator) = spec.and_then(ScalarSpec::validator_fn) {
        scalar = scalar.validator(move |value| validator(value));
    }
    scalar
}

/// Map every resolver leaf onto the `(type, field)` it answers. A path longer
/// than `Type.field` descends through the named return types.
fn leaf_targets(defs: &TypeDefs, resolvers: &ResolverMap) -> HashMap<(String, String), LeafFn> {
    let mut targets = HashMap::new();
    for (path, leaf) in resolvers.leaves() {
        let segments: Vec<&str> = path.split('.').collect();
        let Some((field, parents)) = segments.split_last() else {
            continue;
        };
        let Some((first, through)) = parents.split_first() else {
            continue;
        };
        let mut owner = (*first).to_string();
        let mut reachable = true;
        for segment in through {
            match defs.field(&owner, segment) {
                Some(def) => owner = def.ty.named().to_string(),
                None => {
                    reachable = false;
                    break;
                },
            }
        }
        if !reachable {
            warn!(path = %path, "resolver path does not resolve to a field, skipping");
            continue;
        }
        if targets
            .insert((owner.clone(), (*field).to_string()), leaf)
            .is_some()
        {
            debug!(path = %path, target = %format!("{owner}.{field}"), "resolver replaces an earlier binding");
        }
    }
    targets
}

/// Build the executable schema.
pub fn build_executable(defs: &TypeDefs, resolvers: &ResolverMap, mocks: bool) -> Result<Schema> {
    let mut targets = leaf_targets(defs, resolvers);
    let scalar_specs: HashMap<&str, &ScalarSpec> =
        resolvers.scalars().map(|(name, spec)| (name.as_str(), spec)).collect();

    let mutation = defs.get(MUTATION).is_some().then_some(MUTATION);
    if defs.get(SUBSCRIPTION).is_some() {
        warn!("Subscription type is not supported and will be ignored");
    }

    let shaper = Arc::new(Shaper {
        defs: defs.clone(),
        mocks,
    });
    let mut builder = Schema::build(QUERY, mutation, None).extension(NullPropagation);

    for def in defs.iter().filter(|d| d.name != SUBSCRIPTION) {
        builder = match &def.kind {
            DefKind::Scalar => builder.register(scalar(
                &def.name,
                def.description.as_ref(),
                scalar_specs.get(def.name.as_str()).copied(),
            )),
            DefKind::Object { implements, fields } => {
                let mut object = Object::new(&def.name);
                if let Some(description) = &def.description {
                    object = object.description(description);
                }
                for interface in implements {
                    object = object.implement(interface);
                }
                for field_def in fields.values() {
                    let leaf = targets
                        .remove(&(def.name.clone(), field_def.name.clone()))
                        .or_else(|| {
                            implements.iter().find_map(|interface| {
                                targets
                                    .get(&(interface.clone(), field_def.name.clone()))
                                    .cloned()
                            })
                        });
                    object = object.field(field(&shaper, &def.name, field_def, leaf));
                }
                builder.register(object)
            },
            DefKind::Interface { implements, fields } => {
                let mut interface = Interface::new(&def.name);
                if let Some(description) = &def.description {
                    interface = interface.description(description);
                }
                for parent in implements {
                    interface = interface.implement(parent);
                }
                for field_def in fields.values() {
                    let mut field = InterfaceField::new(&field_def.name, type_ref(&field_def.ty));
                    for arg in &field_def.args {
                        field = field.argument(input_value(arg));
                    }
                    interface = interface.field(field);
                }
                builder.register(interface)
            },
            DefKind::Union { members } => {
                let mut union = Union::new(&def.name);
                if let Some(description) = &def.description {
                    union = union.description(description);
                }
                for member in members {
                    union = union.possible_type(member);
                }
                builder.register(union)
            },
            DefKind::Enum { values } => {
                let mut enumeration = Enum::new(&def.name);
                if let Some(description) = &def.description {
                    enumeration = enumeration.description(description);
                }
                for value in values {
                    enumeration = enumeration.item(EnumItem::new(value));
                }
                builder.register(enumeration)
            },
            DefKind::InputObject { fields } => {
                let mut input = InputObject::new(&def.name);
                if let Some(description) = &def.description {
                    input = input.description(description);
                }
                for field_def in fields.values() {
                    input = input.field(input_value(field_def));
                }
                builder.register(input)
            },
        };
    }

    builder.finish().map_err(|e| Error::Schema(e.to_string()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use {
        super::*,
        crate::resolver::leaf,
        async_graphql::Request,
        serde_json::json,
    };

    fn schema(sdl: &str, resolvers: ResolverMap, mocks: bool) -> Schema {
        let defs = TypeDefs::parse("test", sdl).unwrap();
        build_executable(&defs, &resolvers, mocks).unwrap()
    }

    async fn data(schema: &Schema, query: &str) -> Value {
        let response = schema.execute(Request::new(query)).await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        response.data.into_json().unwrap()
    }

    #[tokio::test]
    async fn nested_values_use_default_property_resolvers() {
        let mut map = ResolverMap::new();
        map.insert_path(
            "Query.user",
            leaf(|_| async {
                Ok(json!({
                    "name": "ada",
                    "role": "ADMIN",
                    "tags": ["a", "b"],
                    "friends": [{"name": "bob"}, null]
                }))
            }),
        )
        .unwrap();
        let schema = schema(
            "type Query { user: User }\n\
             enum Role { ADMIN USER }\n\
             type User { name: String role: Role tags: [String!] friends: [User] }",
            map,
            false,
        );

        assert_eq!(
            data(&schema, "{ user { name role tags friends { name } } }").await,
            json!({"user": {
                "name": "ada",
                "role": "ADMIN",
                "tags": ["a", "b"],
                "friends": [{"name": "bob"}, null]
            }})
        );
    }

    #[tokio::test]
    async fn null_list_items_stay_null() {
        let mut map = ResolverMap::new();
        map.insert_path(
            "Query.users",
            leaf(|_| async {
                Ok(json!([
                    {"name": "ada", "tags": ["a", null], "pets": [null, {"id": "p1", "owner": {"name": "ada"}}]},
                    null
                ]))
            }),
        )
        .unwrap();
        let schema = schema(
            "type Query { users: [User] }\n\
             type User { name: String! tags: [String] pets: [Pet] }\n\
             type Pet { id: ID! owner: User! }",
            map,
            false,
        );

        assert_eq!(
            data(&schema, "{ users { name tags pets { id owner { name } } } }").await,
            json!({"users": [
                {"name": "ada", "tags": ["a", null], "pets": [null, {"id": "p1", "owner": {"name": "ada"}}]},
                null
            ]})
        );
    }

    #[tokio::test]
    async fn null_item_in_non_null_list_is_a_field_error() {
        let mut map = ResolverMap::new();
        map.insert_path("Query.ids", leaf(|_| async { Ok(json!(["a", null])) }))
            .unwrap();
        let schema = schema("type Query { ids: [ID!] }", map, false);
        let response = schema.execute(Request::new("{ ids }")).await;
        assert_eq!(response.data.into_json().unwrap(), json!({"ids": null}));
        assert!(response.errors[0].message.contains("null items"));
    }

    #[tokio::test]
    async fn leaf_and_deeper_leaf_both_resolve() {
        let mut map = ResolverMap::new();
        map.insert_path("Query.user", leaf(|_| async { Ok(json!({"id": 7, "name": "ada"})) }))
            .unwrap();
        map.insert_path(
            "Query.user.profile",
            leaf(|params| async move { Ok(json!({"bio": format!("user {}", params.root["id"])})) }),
        )
        .unwrap();
        let schema = schema(
            "type Query { user: User }\n\
             type User { id: Int name: String profile: Profile }\n\
             type Profile { bio: String }",
            map,
            false,
        );
        assert_eq!(
            data(&schema, "{ user { name profile { bio } } }").await,
            json!({"user": {"name": "ada", "profile": {"bio": "user 7"}}})
        );
    }

    #[tokio::test]
    async fn deep_paths_bind_through_return_types() {
        let mut map = ResolverMap::new();
        map.insert_path("Query.user", leaf(|_| async { Ok(json!({"id": 7})) }))
            .unwrap();
        map.insert_path(
            "Query.user.bio",
            leaf(|params| async move { Ok(json!(format!("user {}", params.root["id"]))) }),
        )
        .unwrap();
        let schema = schema(
            "type Query { user: User } type User { id: Int bio: String }",
            map,
            false,
        );
        assert_eq!(
            data(&schema, "{ user { bio } }").await,
            json!({"user": {"bio": "user 7"}})
        );
    }

    #[tokio::test]
    async fn abstract_types_resolve_by_typename() {
        let mut map = ResolverMap::new();
        map.insert_path(
            "Query.search",
            leaf(|_| async {
                Ok(json!([
                    {"__typename": "Book", "title": "Dune"},
                    {"__typename": "Film", "minutes": 155}
                ]))
            }),
        )
        .unwrap();
        let schema = schema(
            "type Query { search: [Hit!]! }\n\
             union Hit = Book | Film\n\
             type Book { title: String }\n\
             type Film { minutes: Int }",
            map,
            false,
        );
        assert_eq!(
            data(
                &schema,
                "{ search { __typename ... on Book { title } ... on Film { minutes } } }"
            )
            .await,
            json!({"search": [
                {"__typename": "Book", "title": "Dune"},
                {"__typename": "Film", "minutes": 155}
            ]})
        );
    }

    #[tokio::test]
    async fn leaves_receive_arguments_and_selection() {
        let mut map = ResolverMap::new();
        map.insert_path(
            "Query.echo",
            leaf(|params| async move {
                Ok(json!({
                    "args": params.args,
                    "key": params.info.response_key,
                    "parent": params.info.parent_type,
                }))
            }),
        )
        .unwrap();
        let schema = schema("type Query { echo(n: Int, s: String = \"d\"): Json } scalar Json", map, false);
        assert_eq!(
            data(&schema, "{ renamed: echo(n: 3, s: \"x\") }").await,
            json!({"renamed": {"args": {"n": 3, "s": "x"}, "key": "renamed", "parent": "Query"}})
        );
    }

    #[tokio::test]
    async fn leaves_see_fragments_with_their_type_condition() {
        let seen = Arc::new(Mutex::new(None));
        let mut map = ResolverMap::new();
        let sink = Arc::clone(&seen);
        map.insert_path(
            "Query.search",
            leaf(move |params| {
                *sink.lock().unwrap() = Some(params.info.selection);
                async { Ok(json!([])) }
            }),
        )
        .unwrap();
        let schema = schema(
            "type Query { search(term: String, limit: Int): [Hit!]! }\n\
             union Hit = Book | Film\n\
             type Book { title: String }\n\
             type Film { minutes: Int }",
            map,
            false,
        );

        let request = Request::new(
            "query Find($term: String, $limit: Int) {\n\
               search(term: $term, limit: $limit) { __typename ... on Book { title } ...film }\n\
             }\n\
             fragment film on Film { minutes }",
        )
        .variables(async_graphql::Variables::from_json(json!({"term": "dune"})));
        let response = schema.execute(request).await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);

        let selection = seen.lock().unwrap().take().expect("leaf ran");
        assert_eq!(
            selection.arguments,
            vec![
                ("term".to_string(), async_graphql::Value::String("dune".into())),
                ("limit".to_string(), async_graphql::Value::Null),
            ]
        );
        assert_eq!(selection.children.len(), 1);
        assert_eq!(selection.children[0].name, "__typename");
        let conditions: Vec<_> = selection
            .fragments
            .iter()
            .map(|f| (f.type_condition.as_deref(), f.children[0].name.as_str()))
            .collect();
        assert_eq!(conditions, vec![(Some("Book"), "title"), (Some("Film"), "minutes")]);
    }

    #[tokio::test]
    async fn mocks_replace_every_resolver() {
        let mut map = ResolverMap::new();
        map.insert_path("Query.name", leaf(|_| async { Ok(json!("real")) }))
            .unwrap();
        let schema = schema(
            "type Query { name: String users: [User!]! }\n\
             type User { id: ID! color: Color }\n\
             enum Color { BLUE RED }",
            map,
            true,
        );
        let out = data(&schema, "{ name users { id color } }").await;
        assert_eq!(out["name"], "Hello World");
        let users = out["users"].as_array().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0]["color"], "BLUE");
        assert!(uuid::Uuid::parse_str(users[0]["id"].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn resolver_errors_keep_their_tree() {
        let mut map = ResolverMap::new();
        map.insert_path(
            "Query.fail",
            leaf(|_| async { Err(ResolveError::opaque("SOMETHING_BROKE_01")) }),
        )
        .unwrap();
        let schema = schema("type Query { fail: Int }", map, false);
        let response = schema.execute(Request::new("{ fail }")).await;
        let error = &response.errors[0];
        assert!(error.source::<ResolveError>().is_some());
        assert_eq!(error.message, "SOMETHING_BROKE_01");
    }

    #[tokio::test]
    async fn failing_nullable_field_is_null_with_a_path() {
        let mut map = ResolverMap::new();
        map.insert_path("Query.hello", leaf(|_| async { Ok(json!("world")) }))
            .unwrap();
        map.insert_path(
            "Query.user",
            leaf(|_| async { Err(ResolveError::opaque("USER_NOT_FOUND_01")) }),
        )
        .unwrap();
        let schema = schema(
            "type Query { hello: String user: User } type User { id: ID }",
            map,
            false,
        );

        let response = schema
            .execute(Request::new("{ hello who: user { id } }"))
            .await;
        assert_eq!(response.errors.len(), 1);
        let error = &response.errors[0];
        assert_eq!(error.path, vec![PathSegment::Field("who".into())]);
        assert!(error.source::<ResolveError>().is_some());
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({"hello": "world", "who": null})
        );
    }

    #[tokio::test]
    async fn failing_non_null_field_nulls_its_parent() {
        let mut map = ResolverMap::new();
        map.insert_path("Query.user", leaf(|_| async { Ok(json!({"id": "1"})) }))
            .unwrap();
        map.insert_path(
            "User.secret",
            leaf(|_| async { Err(ResolveError::opaque("FORBIDDEN_01")) }),
        )
        .unwrap();
        let schema = schema(
            "type Query { user: User } type User { id: ID secret: String! }",
            map,
            false,
        );

        let response = schema.execute(Request::new("{ user { id secret } }")).await;
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "FORBIDDEN_01");
        assert_eq!(
            response.errors[0].path,
            vec![PathSegment::Field("user".into()), PathSegment::Field("secret".into())]
        );
        assert_eq!(response.data.into_json().unwrap(), json!({"user": null}));
    }

    #[tokio::test]
    async fn failing_non_null_root_field_nulls_data() {
        let mut map = ResolverMap::new();
        map.insert_path("Query.must", leaf(|_| async { Ok(Value::Null) }))
            .unwrap();
        map.insert_path("Query.other", leaf(|_| async { Ok(json!("x")) }))
            .unwrap();
        let schema = schema("type Query { must: String! other: String }", map, false);

        let response = schema.execute(Request::new("{ other must }")).await;
        assert_eq!(response.errors.len(), 1);
        assert!(response.errors[0].message.contains("Query.must"));
        assert_eq!(response.data.into_json().unwrap(), Value::Null);
    }
}
