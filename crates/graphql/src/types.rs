//! Mergeable in-memory form of GraphQL type definitions.
//!
//! SDL is parsed with `async-graphql-parser` into [`TypeDefs`], which can be
//! merged with other documents, validated, and checked against a
//! [`ResolverMap`] before being turned into an executable schema.

use std::fmt;

use {
    async_graphql::{Name, Value as ConstValue, indexmap::IndexMap},
    async_graphql_parser::{
        Positioned, parse_schema,
        types::{self as ast, BaseType, TypeSystemDefinition},
    },
    tracing::debug,
};

use crate::{
    error::{Error, Result},
    resolver::{ResolverMap, ResolverNode},
};

pub const BUILTIN_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];

pub const QUERY: &str = "Query";
pub const MUTATION: &str = "Mutation";
pub const SUBSCRIPTION: &str = "Subscription";

/// A type reference such as `[User!]!`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty {
    Named(String),
    List(Box<Ty>),
    NonNull(Box<Ty>),
}

impl Ty {
    /// Innermost named type.
    pub fn named(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::List(inner) | Self::NonNull(inner) => inner.named(),
        }
    }

    fn rename(&mut self, from: &str, to: &str) {
        match self {
            Self::Named(name) if name == from => *name = to.to_string(),
            Self::Named(_) => {},
            Self::List(inner) | Self::NonNull(inner) => inner.rename(from, to),
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::List(inner) => write!(f, "[{inner}]"),
            Self::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

impl From<&ast::Type> for Ty {
    fn from(ty: &ast::Type) -> Self {
        let base = match &ty.base {
            BaseType::Named(name) => Self::Named(name.to_string()),
            BaseType::List(inner) => Self::List(Box::new(Self::from(inner.as_ref()))),
        };
        if ty.nullable {
            base
        } else {
            Self::NonNull(Box::new(base))
        }
    }
}

/// Argument or input object field.
#[derive(Debug, Clone, PartialEq)]
pub struct InputValueDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: Ty,
    pub default: Option<ConstValue>,
}

impl InputValueDef {
    fn signature(&self) -> String {
        match &self.default {
            Some(default) => format!("{}: {} = {default}", self.name, self.ty),
            None => format!("{}: {}", self.name, self.ty),
        }
    }
}

impl From<&ast::InputValueDefinition> for InputValueDef {
    fn from(def: &ast::InputValueDefinition) -> Self {
        Self {
            name: def.name.node.to_string(),
            description: def.description.as_ref().map(|d| d.node.clone()),
            ty: Ty::from(&def.ty.node),
            default: def.default_value.as_ref().map(|v| v.node.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub description: Option<String>,
    pub args: Vec<InputValueDef>,
    pub ty: Ty,
}

impl FieldDef {
    /// `(a: Int, b: String): Result`, used to detect conflicting definitions.
    pub fn signature(&self) -> String {
        if self.args.is_empty() {
            return self.ty.to_string();
        }
        let args: Vec<String> = self.args.iter().map(InputValueDef::signature).collect();
        format!("({}): {}", args.join(", "), self.ty)
    }
}

impl From<&ast::FieldDefinition> for FieldDef {
    fn from(def: &ast::FieldDefinition) -> Self {
        Self {
            name: def.name.node.to_string(),
            description: def.description.as_ref().map(|d| d.node.clone()),
            args: def.arguments.iter().map(|a| InputValueDef::from(&a.node)).collect(),
            ty: Ty::from(&def.ty.node),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DefKind {
    Scalar,
    Object {
        implements: Vec<String>,
        fields: IndexMap<String, FieldDef>,
    },
    Interface {
        implements: Vec<String>,
        fields: IndexMap<String, FieldDef>,
    },
    Union {
        members: Vec<String>,
    },
    Enum {
        values: Vec<String>,
    },
    InputObject {
        fields: IndexMap<String, InputValueDef>,
    },
}

impl DefKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Object { .. } => "object",
            Self::Interface { .. } => "interface",
            Self::Union { .. } => "union",
            Self::Enum { .. } => "enum",
            Self::InputObject { .. } => "input object",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    pub name: String,
    pub description: Option<String>,
    pub kind: DefKind,
}

impl TypeDef {
    /// Output fields of an object or interface.
    pub fn fields(&self) -> Option<&IndexMap<String, FieldDef>> {
        match &self.kind {
            DefKind::Object { fields, .. } | DefKind::Interface { fields, .. } => Some(fields),
            _ => None,
        }
    }

    fn rename_refs(&mut self, from: &str, to: &str) {
        let rename_list = |names: &mut Vec<String>| {
            for name in names.iter_mut().filter(|n| n.as_str() == from) {
                *name = to.to_string();
            }
        };
        match &mut self.kind {
            DefKind::Object { implements, fields } | DefKind::Interface { implements, fields } => {
                rename_list(implements);
                for field in fields.values_mut() {
                    field.ty.rename(from, to);
                    for arg in &mut field.args {
                        arg.ty.rename(from, to);
                    }
                }
            },
            DefKind::Union { members } => rename_list(members),
            DefKind::InputObject { fields } => {
                for field in fields.values_mut() {
                    field.ty.rename(from, to);
                }
            },
            DefKind::Scalar | DefKind::Enum { .. } => {},
        }
    }
}

fn names(list: &[Positioned<Name>]) -> Vec<String> {
    list.iter().map(|n| n.node.to_string()).collect()
}

fn fields(list: &[Positioned<ast::FieldDefinition>]) -> IndexMap<String, FieldDef> {
    list.iter()
        .map(|f| (f.node.name.node.to_string(), FieldDef::from(&f.node)))
        .collect()
}

fn convert(def: &ast::TypeDefinition) -> TypeDef {
    let kind = match &def.kind {
        ast::TypeKind::Scalar => DefKind::Scalar,
        ast::TypeKind::Object(object) => DefKind::Object {
            implements: names(&object.implements),
            fields: fields(&object.fields),
        },
        ast::TypeKind::Interface(interface) => DefKind::Interface {
            implements: names(&interface.implements),
            fields: fields(&interface.fields),
        },
        ast::TypeKind::Union(members) => DefKind::Union {
            members: names(&members.members),
        },
        ast::TypeKind::Enum(enumeration) => DefKind::Enum {
            values: enumeration
                .values
                .iter()
                .map(|v| v.node.value.node.to_string())
                .collect(),
        },
        ast::TypeKind::InputObject(input) => DefKind::InputObject {
            fields: input
                .fields
                .iter()
                .map(|f| (f.node.name.node.to_string(), InputValueDef::from(&f.node)))
                .collect(),
        },
    };

    TypeDef {
        name: def.name.node.to_string(),
        description: def.description.as_ref().map(|d| d.node.clone()),
        kind,
    }
}

/// Broad category of a named type, as needed when shaping values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Scalar,
    Enum,
    Object,
    Abstract,
    Input,
}

/// A set of type definitions keyed by type name, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeDefs {
    types: IndexMap<String, TypeDef>,
}

impl TypeDefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an SDL document. `origin` names the document in errors.
    ///
    /// Type extensions are merged into their base definition. Root types
    /// renamed by a `schema { ... }` block are renamed back to `Query`,
    /// `Mutation` and `Subscription`.
    pub fn parse(origin: &str, sdl: &str) -> Result<Self> {
        let document = parse_schema(sdl).map_err(|source| Error::Syntax {
            origin: origin.to_string(),
            source,
        })?;

        let mut defs = Self::new();
        let mut roots: Vec<(String, &'static str)> = Vec::new();
        for definition in &document.definitions {
            match definition {
                TypeSystemDefinition::Schema(schema) => {
                    let schema = &schema.node;
                    for (name, root) in [
                        (&schema.query, QUERY),
                        (&schema.mutation, MUTATION),
                        (&schema.subscription, SUBSCRIPTION),
                    ] {
                        if let Some(name) = name {
                            roots.push((name.node.to_string(), root));
                        }
                    }
                },
                TypeSystemDefinition::Type(def) => {
                    defs.merge_type(origin, convert(&def.node))?;
                },
                TypeSystemDefinition::Directive(directive) => {
                    debug!(origin, directive = %directive.node.name.node, "ignoring directive definition");
                },
            }
        }

        for (from, to) in roots {
            if from != to {
                defs.rename_type(&from, to);
            }
        }
        Ok(defs)
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name) || BUILTIN_SCALARS.contains(&name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn field(&self, type_name: &str, field: &str) -> Option<&FieldDef> {
        self.get(type_name)?.fields()?.get(field)
    }

    pub fn class_of(&self, name: &str) -> Option<TypeClass> {
        if BUILTIN_SCALARS.contains(&name) {
            return Some(TypeClass::Scalar);
        }
        Some(match self.get(name)?.kind {
            DefKind::Scalar => TypeClass::Scalar,
            DefKind::Enum { .. } => TypeClass::Enum,
            DefKind::Object { .. } => TypeClass::Object,
            DefKind::Interface { .. } | DefKind::Union { .. } => TypeClass::Abstract,
            DefKind::InputObject { .. } => TypeClass::Input,
        })
    }

    /// Concrete object types an abstract type can resolve to.
    pub fn possible_types(&self, name: &str) -> Vec<&str> {
        match self.get(name).map(|t| &t.kind) {
            Some(DefKind::Union { members }) => members.iter().map(String::as_str).collect(),
            Some(DefKind::Interface { .. }) => self
                .types
                .values()
                .filter(|t| {
                    matches!(&t.kind, DefKind::Object { implements, .. }
                        if implements.iter().any(|i| i == name))
                })
                .map(|t| t.name.as_str())
                .collect(),
            Some(DefKind::Object { .. }) => self.get(name).map(|t| vec![t.name.as_str()]).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<TypeDef> {
        self.types.shift_remove(name)
    }

    /// Rename a type and every reference to it.
    pub fn rename_type(&mut self, from: &str, to: &str) {
        if let Some(mut def) = self.types.shift_remove(from) {
            def.name = to.to_string();
            self.types.insert(to.to_string(), def);
        }
        for def in self.types.values_mut() {
            def.rename_refs(from, to);
        }
    }

    /// Union `other` into `self`.
    pub fn merge(&mut self, origin: &str, other: TypeDefs) -> Result<()> {
        for (_, def) in other.types {
            self.merge_type(origin, def)?;
        }
        Ok(())
    }

    fn merge_type(&mut self, origin: &str, incoming: TypeDef) -> Result<()> {
        let existing = match self.types.get_mut(&incoming.name) {
            Some(existing) => existing,
            None => {
                self.types.insert(incoming.name.clone(), incoming);
                return Ok(());
            },
        };
        if existing.description.is_none() {
            existing.description = incoming.description;
        }

        let type_name = existing.name.clone();
        match (&mut existing.kind, incoming.kind) {
            (DefKind::Scalar, DefKind::Scalar) => {},
            (
                DefKind::Object { implements, fields },
                DefKind::Object {
                    implements: more,
                    fields: extra,
                },
            )
            | (
                DefKind::Interface { implements, fields },
                DefKind::Interface {
                    implements: more,
                    fields: extra,
                },
            ) => {
                union_names(implements, more);
                for (name, field) in extra {
                    match fields.get(&name) {
                        Some(current) if current.signature() != field.signature() => {
                            return Err(Error::FieldConflict {
                                origin: origin.to_string(),
                                type_name,
                                field: name,
                                first: current.signature(),
                                second: field.signature(),
                            });
                        },
                        Some(_) => {},
                        None => {
                            fields.insert(name, field);
                        },
                    }
                }
            },
            (DefKind::Union { members }, DefKind::Union { members: more }) => {
                union_names(members, more);
            },
            (DefKind::Enum { values }, DefKind::Enum { values: more }) => {
                union_names(values, more);
            },
            (DefKind::InputObject { fields }, DefKind::InputObject { fields: extra }) => {
                for (name, field) in extra {
                    match fields.get(&name) {
                        Some(current) if current.signature() != field.signature() => {
                            return Err(Error::FieldConflict {
                                origin: origin.to_string(),
                                type_name,
                                field: name,
                                first: current.signature(),
                                second: field.signature(),
                            });
                        },
                        Some(_) => {},
                        None => {
                            fields.insert(name, field);
                        },
                    }
                }
            },
            (mine, theirs) => {
                return Err(Error::KindConflict {
                    origin: origin.to_string(),
                    name: type_name,
                    first: mine.label(),
                    second: theirs.label(),
                });
            },
        }
        Ok(())
    }

    /// Check that the definitions form a consistent schema: `Query` exists,
    /// every reference points at a known type of the right category.
    pub fn validate(&self, origin: &str) -> Result<()> {
        let invalid = |message: String| Error::InvalidType {
            origin: origin.to_string(),
            message,
        };
        let unknown = |name: &str, at: String| Error::UnknownType {
            origin: origin.to_string(),
            name: name.to_string(),
            at,
        };

        match self.get(QUERY).map(|t| &t.kind) {
            Some(DefKind::Object { .. }) => {},
            Some(other) => {
                return Err(invalid(format!("Query must be an object, found {}", other.label())));
            },
            None => return Err(invalid("schema has no Query type".into())),
        }

        for def in self.types.values() {
            match &def.kind {
                DefKind::Object { implements, fields } | DefKind::Interface { implements, fields } => {
                    for name in implements {
                        match self.class_of(name) {
                            None => return Err(unknown(name, format!("{} implements", def.name))),
                            Some(_) if !matches!(self.get(name).map(|t| &t.kind), Some(DefKind::Interface { .. })) => {
                                return Err(invalid(format!(
                                    "{} implements {name}, which is not an interface",
                                    def.name
                                )));
                            },
                            Some(_) => {},
                        }
                    }
                    if fields.is_empty() {
                        return Err(invalid(format!("{} must define at least one field", def.name)));
                    }
                    for field in fields.values() {
                        let at = format!("{}.{}", def.name, field.name);
                        match self.class_of(field.ty.named()) {
                            None => return Err(unknown(field.ty.named(), at)),
                            Some(TypeClass::Input) => {
                                return Err(invalid(format!("{at} returns input type {}", field.ty.named())));
                            },
                            Some(_) => {},
                        }
                        for arg in &field.args {
                            self.check_input(origin, &arg.ty, format!("{at}({})", arg.name))?;
                        }
                    }
                },
                DefKind::Union { members } => {
                    for member in members {
                        match self.class_of(member) {
                            None => return Err(unknown(member, format!("union {}", def.name))),
                            Some(TypeClass::Object) => {},
                            Some(_) => {
                                return Err(invalid(format!(
                                    "union {} member {member} is not an object type",
                                    def.name
                                )));
                            },
                        }
                    }
                },
                DefKind::InputObject { fields } => {
                    for field in fields.values() {
                        self.check_input(origin, &field.ty, format!("{}.{}", def.name, field.name))?;
                    }
                },
                DefKind::Scalar | DefKind::Enum { .. } => {},
            }
        }
        Ok(())
    }

    fn check_input(&self, origin: &str, ty: &Ty, at: String) -> Result<()> {
        match self.class_of(ty.named()) {
            None => Err(Error::UnknownType {
                origin: origin.to_string(),
                name: ty.named().to_string(),
                at,
            }),
            Some(TypeClass::Scalar | TypeClass::Enum | TypeClass::Input) => Ok(()),
            Some(_) => Err(Error::InvalidType {
                origin: origin.to_string(),
                message: format!("{at} takes output type {}", ty.named()),
            }),
        }
    }

    /// Check that every resolver in `resolvers` targets something defined
    /// here. Paths longer than `Type.field` descend through the named return
    /// type of each field.
    pub fn check_resolvers(&self, origin: &str, resolvers: &ResolverMap) -> Result<()> {
        let orphan = |path: &str, target: String| Error::OrphanResolver {
            origin: origin.to_string(),
            path: path.to_string(),
            target,
        };

        for (name, node) in resolvers.iter() {
            if let ResolverNode::Scalar(_) = node
                && !matches!(self.get(name).map(|t| &t.kind), Some(DefKind::Scalar))
            {
                return Err(orphan(name, format!("scalar {name}")));
            }
        }

        for (path, _) in resolvers.leaves() {
            let mut segments = path.split('.');
            let Some(mut current) = segments.next().map(str::to_string) else {
                continue;
            };
            if self.get(&current).is_none() {
                return Err(orphan(&path, format!("type {current}")));
            }
            let mut target = current.clone();
            for segment in segments {
                let field = self
                    .field(&current, segment)
                    .ok_or_else(|| orphan(&path, format!("{current}.{segment}")))?;
                target = format!("{current}.{segment}");
                current = field.ty.named().to_string();
            }
            if target == current {
                return Err(orphan(&path, format!("a field of {current}")));
            }
        }
        Ok(())
    }

    /// Root field names of `Query` and `Mutation`.
    pub fn root_fields(&self) -> Vec<(&'static str, String)> {
        [QUERY, MUTATION]
            .into_iter()
            .filter_map(|root| self.get(root).and_then(TypeDef::fields).map(|f| (root, f)))
            .flat_map(|(root, fields)| fields.keys().map(move |name| (root, name.clone())))
            .collect()
    }
}

fn union_names(into: &mut Vec<String>, more: Vec<String>) {
    for name in more {
        if !into.contains(&name) {
            into.push(name);
        }
    }
}
