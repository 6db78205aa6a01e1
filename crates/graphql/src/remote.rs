//! Controllers whose schema lives behind another GraphQL endpoint.
//!
//! The remote schema is introspected once at build time and rendered back to
//! SDL. Every root field is bound to a leaf that forwards the selected field
//! to the remote endpoint.

use std::{fmt::Write as _, sync::Arc, time::Duration};

use {
    actiongraph_config::RemoteSchemaOptions,
    async_trait::async_trait,
    futures::FutureExt,
    reqwest::header::{HeaderMap, HeaderName, HeaderValue},
    serde::{Deserialize, Serialize},
    serde_json::Value,
    tracing::{debug, info},
};

use crate::{
    action::{ControllerDef, ControllerKind, RemoteDescriptor},
    error::{Error, ResolveError, Result},
    resolver::{Fragment, LeafFn, ResolveParams, Resolved, ResolverMap, Selection},
    types::{BUILTIN_SCALARS, MUTATION, TypeDefs},
};

pub const INTROSPECTION_QUERY: &str = r#"
query IntrospectionQuery {
  __schema {
    queryType { name }
    mutationType { name }
    subscriptionType { name }
    types { ...FullType }
  }
}

fragment FullType on __Type {
  kind
  name
  description
  fields(includeDeprecated: true) {
    name
    description
    args { ...InputValue }
    type { ...TypeRef }
  }
  inputFields { ...InputValue }
  interfaces { ...TypeRef }
  enumValues(includeDeprecated: true) { name description }
  possibleTypes { ...TypeRef }
}

fragment InputValue on __InputValue {
  name
  description
  type { ...TypeRef }
}

fragment TypeRef on __Type {
  kind
  name
  ofType {
    kind
    name
    ofType {
      kind
      name
      ofType {
        kind
        name
        ofType {
          kind
          name
          ofType {
            kind
            name
            ofType {
              kind
              name
              ofType { kind name }
            }
          }
        }
      }
    }
  }
}
"#;

#[derive(Debug, Clone, Serialize)]
pub struct RemoteRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

impl RemoteRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteGraphqlError {
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Option<Vec<RemoteGraphqlError>>,
}

/// Sends GraphQL requests to a remote endpoint.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, request: RemoteRequest) -> Result<RemoteResponse, ResolveError>;
}

#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    #[error("invalid header \"{0}\"")]
    Header(String),

    #[error(transparent)]
    Client(#[from] reqwest::Error),
}

/// [`RemoteFetcher`] posting JSON over HTTP.
pub struct HttpFetcher {
    client: reqwest::Client,
    uri: String,
}

impl HttpFetcher {
    pub fn new(uri: impl Into<String>, options: &RemoteSchemaOptions) -> Result<Self, FetcherError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| FetcherError::Header(name.clone()))?;
            let value =
                HeaderValue::from_str(value).map_err(|_| FetcherError::Header(name.to_string()))?;
            headers.insert(name, value);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            uri: uri.into(),
        })
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch(&self, request: RemoteRequest) -> Result<RemoteResponse, ResolveError> {
        let failed = |e: reqwest::Error| {
            ResolveError::opaque(format!("remote request to {} failed: {e}", self.uri))
        };
        self.client
            .post(&self.uri)
            .json(&request)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(failed)?
            .json::<RemoteResponse>()
            .await
            .map_err(failed)
    }
}

// Introspection result, as much of it as the SDL rendering needs.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntrospectionSchema {
    query_type: Option<NamedRef>,
    mutation_type: Option<NamedRef>,
    subscription_type: Option<NamedRef>,
    types: Vec<FullType>,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FullType {
    kind: String,
    name: String,
    description: Option<String>,
    fields: Option<Vec<IntrospectionField>>,
    input_fields: Option<Vec<IntrospectionInput>>,
    interfaces: Option<Vec<IntrospectionTypeRef>>,
    enum_values: Option<Vec<IntrospectionEnumValue>>,
    possible_types: Option<Vec<IntrospectionTypeRef>>,
}

#[derive(Debug, Deserialize)]
struct IntrospectionField {
    name: String,
    description: Option<String>,
    #[serde(default)]
    args: Vec<IntrospectionInput>,
    #[serde(rename = "type")]
    ty: IntrospectionTypeRef,
}

#[derive(Debug, Deserialize)]
struct IntrospectionInput {
    name: String,
    description: Option<String>,
    #[serde(rename = "type")]
    ty: IntrospectionTypeRef,
}

#[derive(Debug, Deserialize)]
struct IntrospectionEnumValue {
    name: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntrospectionTypeRef {
    kind: String,
    name: Option<String>,
    of_type: Option<Box<IntrospectionTypeRef>>,
}

impl IntrospectionTypeRef {
    fn render(&self) -> std::result::Result<String, String> {
        let inner = || {
            self.of_type
                .as_deref()
                .ok_or_else(|| format!("{} type reference without ofType", self.kind))?
                .render()
        };
        match self.kind.as_str() {
            "NON_NULL" => Ok(format!("{}!", inner()?)),
            "LIST" => Ok(format!("[{}]", inner()?)),
            _ => self
                .name
                .clone()
                .ok_or_else(|| format!("{} type reference without name", self.kind)),
        }
    }
}

fn write_description(out: &mut String, description: Option<&String>, indent: &str) {
    if let Some(text) = description.filter(|d| !d.is_empty()) {
        let _ = writeln!(out, "{indent}\"\"\"{}\"\"\"", text.replace("\"\"\"", "\\\"\"\""));
    }
}

fn write_inputs(out: &mut String, inputs: &[IntrospectionInput]) -> std::result::Result<(), String> {
    if inputs.is_empty() {
        return Ok(());
    }
    let rendered = inputs
        .iter()
        .map(|input| Ok(format!("{}: {}", input.name, input.ty.render()?)))
        .collect::<std::result::Result<Vec<_>, String>>()?;
    let _ = write!(out, "({})", rendered.join(", "));
    Ok(())
}

/// Render an introspection result (the `data` of [`INTROSPECTION_QUERY`]) as
/// SDL. Introspection types, built-in scalars and the subscription root are
/// skipped; default values are dropped since the remote applies its own.
pub fn introspection_to_sdl(data: &Value) -> std::result::Result<String, String> {
    let schema: IntrospectionSchema = serde_json::from_value(
        data.get("__schema")
            .cloned()
            .ok_or("introspection result has no __schema")?,
    )
    .map_err(|e| format!("malformed introspection result: {e}"))?;

    let subscription = schema.subscription_type.as_ref().map(|t| t.name.as_str());
    let mut out = String::new();

    let query = schema.query_type.as_ref().map(|t| t.name.as_str());
    let mutation = schema.mutation_type.as_ref().map(|t| t.name.as_str());
    if query.is_some_and(|q| q != "Query") || mutation.is_some_and(|m| m != MUTATION) {
        out.push_str("schema {\n");
        if let Some(query) = query {
            let _ = writeln!(out, "  query: {query}");
        }
        if let Some(mutation) = mutation {
            let _ = writeln!(out, "  mutation: {mutation}");
        }
        out.push_str("}\n\n");
    }

    for ty in &schema.types {
        if ty.name.starts_with("__")
            || BUILTIN_SCALARS.contains(&ty.name.as_str())
            || Some(ty.name.as_str()) == subscription
        {
            continue;
        }
        write_description(&mut out, ty.description.as_ref(), "");
        match ty.kind.as_str() {
            "SCALAR" => {
                let _ = writeln!(out, "scalar {}", ty.name);
            },
            "OBJECT" | "INTERFACE" => {
                let keyword = if ty.kind == "OBJECT" {
                    "type"
                } else {
                    "interface"
                };
                let _ = write!(out, "{keyword} {}", ty.name);
                let interfaces = ty
                    .interfaces
                    .iter()
                    .flatten()
                    .filter_map(|i| i.name.clone())
                    .collect::<Vec<_>>();
                if !interfaces.is_empty() {
                    let _ = write!(out, " implements {}", interfaces.join(" & "));
                }
                out.push_str(" {\n");
                for field in ty.fields.iter().flatten() {
                    write_description(&mut out, field.description.as_ref(), "  ");
                    let _ = write!(out, "  {}", field.name);
                    write_inputs(&mut out, &field.args)?;
                    let _ = writeln!(out, ": {}", field.ty.render()?);
                }
                out.push_str("}\n");
            },
            "UNION" => {
                let members = ty
                    .possible_types
                    .iter()
                    .flatten()
                    .filter_map(|t| t.name.clone())
                    .collect::<Vec<_>>();
                let _ = writeln!(out, "union {} = {}", ty.name, members.join(" | "));
            },
            "ENUM" => {
                let _ = writeln!(out, "enum {} {{", ty.name);
                for value in ty.enum_values.iter().flatten() {
                    write_description(&mut out, value.description.as_ref(), "  ");
                    let _ = writeln!(out, "  {}", value.name);
                }
                out.push_str("}\n");
            },
            "INPUT_OBJECT" => {
                let _ = writeln!(out, "input {} {{", ty.name);
                for field in ty.input_fields.iter().flatten() {
                    write_description(&mut out, field.description.as_ref(), "  ");
                    let _ = writeln!(out, "  {}: {}", field.name, field.ty.render()?);
                }
                out.push_str("}\n");
            },
            other => return Err(format!("unknown type kind {other} for {}", ty.name)),
        }
        out.push('\n');
    }
    Ok(out)
}

/// Render one selected field, adding `__typename` to composite selections.
/// Fragments keep their type condition.
pub fn render_selection(selection: &Selection, out: &mut String) {
    if let Some(alias) = &selection.alias {
        let _ = write!(out, "{alias}: ");
    }
    out.push_str(&selection.name);
    if !selection.arguments.is_empty() {
        let args: Vec<String> = selection
            .arguments
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect();
        let _ = write!(out, "({})", args.join(", "));
    }
    if selection.children.is_empty() && selection.fragments.is_empty() {
        return;
    }
    out.push_str(" {");
    render_members(&selection.children, &selection.fragments, out);
    if !selection
        .children
        .iter()
        .any(|c| c.name == "__typename" && c.alias.is_none())
    {
        out.push_str(" __typename");
    }
    out.push_str(" }");
}

fn render_members(children: &[Selection], fragments: &[Fragment], out: &mut String) {
    for child in children {
        out.push(' ');
        render_selection(child, out);
    }
    for fragment in fragments {
        out.push_str(" ...");
        if let Some(on) = &fragment.type_condition {
            let _ = write!(out, " on {on}");
        }
        out.push_str(" {");
        render_members(&fragment.children, &fragment.fragments, out);
        out.push_str(" }");
    }
}

fn forwarding_leaf(fetcher: Arc<dyn RemoteFetcher>, operation: &'static str) -> LeafFn {
    Arc::new(move |params: ResolveParams| {
        let fetcher = Arc::clone(&fetcher);
        async move {
            let mut query = format!("{operation} {{ ");
            render_selection(&params.info.selection, &mut query);
            query.push_str(" }");
            debug!(%query, "forwarding to remote controller");

            let response = fetcher.fetch(RemoteRequest::new(query)).await?;
            if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
                let message = errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                return Err(ResolveError::aggregate(
                    message,
                    errors
                        .into_iter()
                        .map(|e| ResolveError::opaque(e.message))
                        .collect(),
                ));
            }
            let value = response
                .data
                .and_then(|mut data| data.get_mut(&params.info.response_key).map(Value::take))
                .unwrap_or(Value::Null);
            Ok(Resolved::Forwarded(value))
        }
        .boxed()
    })
}

/// Sub-schema of a remote controller.
pub struct RemoteSchema {
    pub sdl: String,
    pub type_defs: TypeDefs,
    pub resolvers: ResolverMap,
}

fn fetcher_for(
    id: &str,
    descriptor: &RemoteDescriptor,
    options: &RemoteSchemaOptions,
) -> Result<Arc<dyn RemoteFetcher>> {
    if let Some(fetcher) = &descriptor.fetcher {
        return Ok(Arc::clone(fetcher));
    }
    let uri = descriptor.uri.as_ref().ok_or_else(|| Error::Remote {
        id: id.to_string(),
        message: "option remoteGraphQLUri is required".into(),
    })?;
    let fetcher = HttpFetcher::new(uri, options).map_err(|e| Error::Remote {
        id: id.to_string(),
        message: e.to_string(),
    })?;
    Ok(Arc::new(fetcher))
}

/// Introspect a remote controller and bind forwarding leaves on its root
/// fields.
#[tracing::instrument(skip_all, fields(controller = %controller.id))]
pub async fn load_remote_schema(
    controller: &ControllerDef,
    options: &RemoteSchemaOptions,
) -> Result<RemoteSchema> {
    let ControllerKind::Remote(descriptor) = &controller.kind else {
        return Err(Error::Remote {
            id: controller.id.clone(),
            message: "controller is not remote".into(),
        });
    };
    let remote_err = |message: String| Error::Remote {
        id: controller.id.clone(),
        message,
    };

    let fetcher = fetcher_for(&controller.id, descriptor, options)?;
    let response = fetcher
        .fetch(RemoteRequest::new(INTROSPECTION_QUERY))
        .await
        .map_err(|e| remote_err(format!("introspection failed: {e}")))?;
    if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
        let messages: Vec<_> = errors.into_iter().map(|e| e.message).collect();
        return Err(remote_err(format!("introspection failed: {}", messages.join("; "))));
    }
    let data = response
        .data
        .ok_or_else(|| remote_err("introspection returned no data".into()))?;

    let sdl = introspection_to_sdl(&data).map_err(remote_err)?;
    let type_defs = TypeDefs::parse(&format!("remote controller {}", controller.id), &sdl)?;

    let mut resolvers = ResolverMap::new();
    for (root, field) in type_defs.root_fields() {
        let operation = if root == MUTATION { "mutation" } else { "query" };
        resolvers.insert_path(
            &format!("{root}.{field}"),
            forwarding_leaf(Arc::clone(&fetcher), operation),
        )?;
    }
    info!(
        types = type_defs.len(),
        fields = resolvers.leaves().len(),
        "remote controller introspected"
    );

    Ok(RemoteSchema {
        sdl,
        type_defs,
        resolvers,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use {super::*, serde_json::json};

    fn named(kind: &str, name: &str) -> Value {
        json!({"kind": kind, "name": name, "ofType": null})
    }

    fn non_null(inner: Value) -> Value {
        json!({"kind": "NON_NULL", "name": null, "ofType": inner})
    }

    #[test]
    fn renders_introspection_as_sdl() {
        let data = json!({"__schema": {
            "queryType": {"name": "RootQuery"},
            "mutationType": null,
            "subscriptionType": null,
            "types": [
                {"kind": "OBJECT", "name": "RootQuery", "description": "Entry",
                 "fields": [{"name": "invoice", "description": null,
                             "args": [{"name": "id", "description": null, "type": non_null(named("SCALAR", "ID")), "defaultValue": "\"x\""}],
                             "type": named("OBJECT", "Invoice")}],
                 "inputFields": null, "interfaces": [], "enumValues": null, "possibleTypes": null},
                {"kind": "OBJECT", "name": "Invoice", "description": null,
                 "fields": [{"name": "status", "description": null, "args": [],
                             "type": {"kind": "LIST", "name": null, "ofType": named("ENUM", "Status")}}],
                 "inputFields": null, "interfaces": [], "enumValues": null, "possibleTypes": null},
                {"kind": "ENUM", "name": "Status", "description": null, "fields": null,
                 "inputFields": null, "interfaces": null,
                 "enumValues": [{"name": "PAID", "description": null}, {"name": "OPEN", "description": null}],
                 "possibleTypes": null},
                {"kind": "SCALAR", "name": "String", "description": null, "fields": null,
                 "inputFields": null, "interfaces": null, "enumValues": null, "possibleTypes": null},
                {"kind": "OBJECT", "name": "__Type", "description": null, "fields": [],
                 "inputFields": null, "interfaces": [], "enumValues": null, "possibleTypes": null}
            ]
        }});

        let sdl = introspection_to_sdl(&data).unwrap();
        assert!(sdl.contains("schema {\n  query: RootQuery\n}"), "{sdl}");
        assert!(sdl.contains("invoice(id: ID!): Invoice"), "{sdl}");
        assert!(!sdl.contains("__Type"));
        assert!(!sdl.contains("scalar String"));

        let defs = TypeDefs::parse("remote", &sdl).unwrap();
        assert!(defs.field("Query", "invoice").is_some());
        assert_eq!(defs.field("Invoice", "status").unwrap().ty.to_string(), "[Status]");
        defs.validate("remote").unwrap();
    }

    #[test]
    fn selection_rendering_adds_typename_to_composites() {
        let selection = Selection {
            name: "invoice".into(),
            alias: Some("first".into()),
            arguments: vec![
                ("id".into(), async_graphql::Value::String("a\"b".into())),
                ("n".into(), async_graphql::Value::Number(3.into())),
            ],
            children: vec![
                Selection {
                    name: "status".into(),
                    ..Selection::default()
                },
                Selection {
                    name: "customer".into(),
                    children: vec![Selection {
                        name: "name".into(),
                        ..Selection::default()
                    }],
                    ..Selection::default()
                },
            ],
            fragments: Vec::new(),
        };
        let mut out = String::new();
        render_selection(&selection, &mut out);
        assert_eq!(
            out,
            r#"first: invoice(id: "a\"b", n: 3) { status customer { name __typename } __typename }"#
        );
    }

    #[test]
    fn selection_rendering_keeps_fragment_type_conditions() {
        let field = |name: &str| Selection {
            name: name.into(),
            ..Selection::default()
        };
        let selection = Selection {
            name: "search".into(),
            children: vec![field("__typename")],
            fragments: vec![
                Fragment {
                    type_condition: Some("Book".into()),
                    children: vec![field("title")],
                    ..Fragment::default()
                },
                Fragment {
                    type_condition: None,
                    fragments: vec![Fragment {
                        type_condition: Some("Film".into()),
                        children: vec![field("minutes")],
                        ..Fragment::default()
                    }],
                    ..Fragment::default()
                },
            ],
            ..Selection::default()
        };
        let mut out = String::new();
        render_selection(&selection, &mut out);
        assert_eq!(
            out,
            "search { __typename ... on Book { title } ... { ... on Film { minutes } } }"
        );
    }

    #[tokio::test]
    async fn missing_uri_and_fetcher_is_an_error() {
        let controller = ControllerDef {
            id: "billing".into(),
            kind: ControllerKind::Remote(RemoteDescriptor::default()),
            actions: Vec::new(),
        };
        let err = load_remote_schema(&controller, &RemoteSchemaOptions::default())
            .await
            .err()
            .expect("error");
        assert!(err.to_string().contains("option remoteGraphQLUri is required"));
    }
}
