//! Resolver trees keyed by dotted paths.
//!
//! A [`ResolverMap`] mirrors the `Type.field` layout of a schema: the first
//! segment of a path names a type, the following segments descend through
//! fields, the last one holds the resolver. A field can carry a resolver and
//! deeper ones at once. Scalars hang directly off the root under their type
//! name.

use std::{fmt, future::Future, sync::Arc};

use {
    async_graphql::indexmap::IndexMap,
    futures::{FutureExt, future::BoxFuture},
    serde_json::Value,
};

use crate::{
    context::RequestContext,
    error::{Error, ResolveError, Result},
    scalars::ScalarSpec,
};

/// What a leaf hands back to the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// Value produced locally; nested fields are read by field name.
    Value(Value),
    /// Value returned by a remote service for the current selection; nested
    /// fields are keyed by response key (alias or name).
    Forwarded(Value),
}

impl From<Value> for Resolved {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// One selected field of the incoming operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub name: String,
    pub alias: Option<String>,
    pub arguments: Vec<(String, async_graphql::Value)>,
    /// Fields selected directly under this one.
    pub children: Vec<Selection>,
    /// Inline fragments and fragment spreads under this field.
    pub fragments: Vec<Fragment>,
}

/// Selections made under `... on Type` or a bare `...`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub type_condition: Option<String>,
    pub children: Vec<Selection>,
    pub fragments: Vec<Fragment>,
}

impl Selection {
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Static and per-call information about the field being resolved.
#[derive(Debug, Clone, Default)]
pub struct FieldInfo {
    pub parent_type: String,
    pub field_name: String,
    pub response_key: String,
    /// The field as selected, including arguments and sub-selections.
    pub selection: Selection,
}

/// Arguments of a leaf invocation: `(root, args, context, info)`.
#[derive(Clone)]
pub struct ResolveParams {
    /// Parent object (`null` for root fields).
    pub root: Value,
    /// Field arguments as a JSON object.
    pub args: Value,
    pub request: Arc<RequestContext>,
    pub info: FieldInfo,
}

pub type LeafFuture = BoxFuture<'static, std::result::Result<Resolved, ResolveError>>;

/// A bound leaf resolver.
pub type LeafFn = Arc<dyn Fn(ResolveParams) -> LeafFuture + Send + Sync>;

/// Wrap an async closure returning JSON into a [`LeafFn`].
pub fn leaf<F, Fut>(f: F) -> LeafFn
where
    F: Fn(ResolveParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Value, ResolveError>> + Send + 'static,
{
    Arc::new(move |params| f(params).map(|r| r.map(Resolved::Value)).boxed())
}

#[derive(Clone)]
pub enum ResolverNode {
    /// Resolver bound at this path, if any, and the resolvers bound beneath it.
    Field {
        leaf: Option<LeafFn>,
        children: ResolverMap,
    },
    Scalar(ScalarSpec),
}

impl ResolverNode {
    fn field() -> Self {
        Self::Field {
            leaf: None,
            children: ResolverMap::new(),
        }
    }
}

impl fmt::Debug for ResolverNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field { leaf, children } => f
                .debug_struct("Field")
                .field("leaf", &leaf.is_some())
                .field("children", children)
                .finish(),
            Self::Scalar(_) => f.write_str("Scalar"),
        }
    }
}

/// Which side keeps its leaf when two maps bind the same path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    KeepExisting,
    Overwrite,
}

#[derive(Clone, Default)]
pub struct ResolverMap {
    nodes: IndexMap<String, ResolverNode>,
}

impl fmt::Debug for ResolverMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.nodes.iter()).finish()
    }
}

fn split_path(path: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(Error::ResolverPath {
            path: path.to_string(),
            reason: "empty segment".into(),
        });
    }
    Ok(segments)
}

impl ResolverMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map holding a single leaf at `Type.field`.
    pub fn with_field(type_name: impl Into<String>, field: impl Into<String>, leaf: LeafFn) -> Self {
        let mut fields = ResolverMap::new();
        fields.nodes.insert(
            field.into(),
            ResolverNode::Field {
                leaf: Some(leaf),
                children: ResolverMap::new(),
            },
        );
        let mut map = ResolverMap::new();
        map.nodes.insert(
            type_name.into(),
            ResolverNode::Field {
                leaf: None,
                children: fields,
            },
        );
        map
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ResolverNode> {
        self.nodes.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ResolverNode)> {
        self.nodes.iter()
    }

    /// Bind `leaf` at `path`, creating intermediate nodes.
    ///
    /// An existing leaf at the same path is replaced and returned. A path may
    /// run below a bound leaf (`Query.user` and `Query.user.profile`), but not
    /// through a scalar.
    pub fn insert_path(&mut self, path: &str, leaf: LeafFn) -> Result<Option<LeafFn>> {
        let segments = split_path(path)?;
        let scalar = |segment: &str| Error::ResolverPath {
            path: path.to_string(),
            reason: format!("\"{segment}\" is already bound to a scalar"),
        };

        let mut map = self;
        let mut slot = None;
        for segment in segments {
            let node = map
                .nodes
                .entry(segment.to_string())
                .or_insert_with(ResolverNode::field);
            let ResolverNode::Field { leaf, children } = node else {
                return Err(scalar(segment));
            };
            slot = Some(leaf);
            map = children;
        }

        let slot = slot.ok_or_else(|| Error::ResolverPath {
            path: path.to_string(),
            reason: "empty path".into(),
        })?;
        Ok(slot.replace(leaf))
    }

    /// Register a custom scalar under its type name.
    pub fn insert_scalar(&mut self, name: impl Into<String>, spec: ScalarSpec) {
        self.nodes.insert(name.into(), ResolverNode::Scalar(spec));
    }

    /// Leaf bound at `path`, if any.
    pub fn leaf(&self, path: &str) -> Option<&LeafFn> {
        let mut segments = path.split('.').peekable();
        let mut map = self;
        while let Some(segment) = segments.next() {
            let ResolverNode::Field { leaf, children } = map.nodes.get(segment)? else {
                return None;
            };
            if segments.peek().is_none() {
                return leaf.as_ref();
            }
            map = children;
        }
        None
    }

    /// All leaves with their dotted paths, depth first in insertion order. A
    /// leaf comes before the leaves bound beneath it.
    pub fn leaves(&self) -> Vec<(String, LeafFn)> {
        fn walk(map: &ResolverMap, prefix: &str, out: &mut Vec<(String, LeafFn)>) {
            for (key, node) in &map.nodes {
                let ResolverNode::Field { leaf, children } = node else {
                    continue;
                };
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                if let Some(leaf) = leaf {
                    out.push((path.clone(), Arc::clone(leaf)));
                }
                walk(children, &path, out);
            }
        }

        let mut out = Vec::new();
        walk(self, "", &mut out);
        out
    }

    /// Custom scalars registered at the root.
    pub fn scalars(&self) -> impl Iterator<Item = (&String, &ScalarSpec)> {
        self.nodes.iter().filter_map(|(name, node)| match node {
            ResolverNode::Scalar(spec) => Some((name, spec)),
            _ => None,
        })
    }

    /// Deep-merge `other` into `self`. Nested resolvers merge recursively;
    /// when both sides bind a leaf or a scalar under the same path `policy`
    /// decides the winner. Returns the dotted paths that collided.
    pub fn merge(&mut self, other: &ResolverMap, policy: MergePolicy) -> Vec<String> {
        let mut collisions = Vec::new();
        self.merge_at(other, policy, "", &mut collisions);
        collisions
    }

    fn merge_at(
        &mut self,
        other: &ResolverMap,
        policy: MergePolicy,
        prefix: &str,
        collisions: &mut Vec<String>,
    ) {
        for (key, incoming) in &other.nodes {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            match (self.nodes.get_mut(key), incoming) {
                (None, _) => {
                    self.nodes.insert(key.clone(), incoming.clone());
                },
                (
                    Some(ResolverNode::Field { leaf, children }),
                    ResolverNode::Field {
                        leaf: their_leaf,
                        children: theirs,
                    },
                ) => {
                    match (leaf.is_some(), their_leaf) {
                        (_, None) => {},
                        (false, Some(theirs)) => *leaf = Some(Arc::clone(theirs)),
                        (true, Some(theirs)) => {
                            collisions.push(path.clone());
                            if policy == MergePolicy::Overwrite {
                                *leaf = Some(Arc::clone(theirs));
                            }
                        },
                    }
                    children.merge_at(theirs, policy, &path, collisions);
                },
                (Some(existing), _) => {
                    collisions.push(path);
                    if policy == MergePolicy::Overwrite {
                        *existing = incoming.clone();
                    }
                },
            }
        }
    }
}
