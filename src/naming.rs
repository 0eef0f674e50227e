//! Names for anonymous object schemas.
//!
//! Code generators need a type name for every object schema, including the
//! ones written inline in a response body or a property. This pass assigns
//! those names without touching the document: the result is a table keyed by
//! node identity.
//!
//! Response bodies are named first (from the body's shape and the operation),
//! then every registered component schema is scanned for nested inline
//! objects (from their title or enclosing property). Registered components
//! keep their registry names and never appear in the table.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::error::SoftLimit;
use crate::node::{unescape_pointer_segment, Document, NodeId};
use crate::types::{
    Limits, ALL_OF, COMPONENTS_KEY, HTTP_METHODS, PATHS_KEY, REF_KEY, RESPONSES_KEY,
    RESPONSE_REF_PREFIX, UNION_KEYWORDS,
};

/// Property-name endings that mark a collection.
const COLLECTION_SUFFIXES: &[&str] = &["list", "items", "collection", "set", "array", "page", "results"];

/// Most `#/components/responses/...` hops followed for one response.
const MAX_RESPONSE_HOPS: usize = 8;

/// Two schemas that derived the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameCollision {
    pub name: String,
    /// Node that held the name first (inline schema or registered component).
    pub existing: NodeId,
    /// Node that derived it again.
    pub node: NodeId,
}

/// Identity-keyed name table for inline schemas.
#[derive(Debug, Clone, Default)]
pub struct InlineSchemaNames {
    names: HashMap<NodeId, String>,
    order: Vec<NodeId>,
    collisions: Vec<NameCollision>,
    limits: Vec<SoftLimit>,
}

impl InlineSchemaNames {
    pub fn get(&self, id: NodeId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.names.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entries in the order names were assigned.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &str)> + '_ {
        self.order.iter().map(|id| (*id, self.names[id].as_str()))
    }

    /// Every node that was given `name`.
    pub fn names_for(&self, name: &str) -> Vec<NodeId> {
        self.iter()
            .filter(|(_, n)| *n == name)
            .map(|(id, _)| id)
            .collect()
    }

    /// Names derived more than once. Names are not rewritten.
    pub fn collisions(&self) -> &[NameCollision] {
        &self.collisions
    }

    /// Ceilings hit while scanning; schemas past them stay unnamed.
    pub fn limits(&self) -> &[SoftLimit] {
        &self.limits
    }

    pub fn is_complete(&self) -> bool {
        self.limits.is_empty()
    }
}

/// Name every inline object schema in response bodies and component schemas.
pub fn collect_inlined_schemas(doc: &Document) -> InlineSchemaNames {
    collect_inlined_schemas_with_limits(doc, Limits::NAMING)
}

/// As [`collect_inlined_schemas`], with explicit scan ceilings.
pub fn collect_inlined_schemas_with_limits(doc: &Document, limits: Limits) -> InlineSchemaNames {
    let mut namer = Namer::new(doc, limits);

    for (operation_id, response) in operation_responses(doc) {
        for schema in response_body_schemas(doc, response) {
            namer.name_response_body(schema, operation_id.as_deref());
        }
    }

    if let Some(responses) = doc
        .lookup(doc.root(), &[COMPONENTS_KEY, RESPONSES_KEY])
        .and_then(|id| doc.mapping(id))
    {
        for (name, response) in responses.iter() {
            for schema in response_body_schemas(doc, response) {
                namer.name_response_body(schema, Some(name));
            }
        }
    }

    if let Some(registry) = doc.schema_registry().and_then(|id| doc.mapping(id)) {
        for (_, schema) in registry.iter() {
            namer.scan(schema, None, 0);
        }
    }

    debug!(
        named = namer.names.len(),
        collisions = namer.names.collisions.len(),
        limits = namer.names.limits.len(),
        "collected inline schema names"
    );
    namer.names
}

struct Namer<'a> {
    doc: &'a Document,
    registered: HashMap<NodeId, String>,
    names: InlineSchemaNames,
    /// First holder of every assigned name.
    used: HashMap<String, NodeId>,
    counter: usize,
    visiting: HashSet<NodeId>,
    remaining: usize,
    exhausted: bool,
    limits: Limits,
}

impl<'a> Namer<'a> {
    fn new(doc: &'a Document, limits: Limits) -> Self {
        Self {
            doc,
            registered: doc.registered_names(),
            names: InlineSchemaNames::default(),
            used: HashMap::new(),
            counter: 0,
            visiting: HashSet::new(),
            remaining: limits.max_nodes,
            exhausted: false,
            limits,
        }
    }

    fn name_response_body(&mut self, schema: NodeId, operation_id: Option<&str>) {
        if self.doc.reference(schema).is_some() {
            return;
        }
        if is_inline_object(self.doc, schema) && self.is_unnamed(schema) {
            let candidate = self.response_candidate(schema, operation_id);
            self.assign(schema, candidate);
        } else if let Some(items) = self.doc.get(schema, "items") {
            if is_inline_object(self.doc, items) && self.is_unnamed(items) {
                let candidate = match operation_id {
                    Some(op) => format!("{}Item", op),
                    None => self.generic_name(),
                };
                self.assign(items, candidate);
            }
        }
        self.scan(schema, None, 0);
    }

    fn response_candidate(&mut self, schema: NodeId, operation_id: Option<&str>) -> String {
        let doc = self.doc;
        let properties: Vec<&str> = doc
            .get(schema, "properties")
            .and_then(|props| doc.mapping(props))
            .map(|props| props.keys().collect())
            .unwrap_or_default();

        if let [only] = properties.as_slice() {
            return only.to_string();
        }
        if let Some(collection) = properties.iter().find(|name| looks_like_collection(name)) {
            return collection.to_string();
        }
        match operation_id {
            Some(op) => format!("{}Response", op),
            None => self.generic_name(),
        }
    }

    /// Walk a schema's properties, items and composition branches, naming
    /// inline objects by title, else enclosing property, else counter.
    fn scan(&mut self, id: NodeId, enclosing: Option<&str>, depth: usize) {
        if depth > self.limits.max_depth {
            let limit = SoftLimit::depth(self.limits.max_depth, id.to_string());
            warn!(%limit, "naming walk too deep, abandoning branch");
            self.names.limits.push(limit);
            return;
        }
        if self.remaining == 0 {
            if !self.exhausted {
                self.exhausted = true;
                let limit = SoftLimit::nodes(self.limits.max_nodes, id.to_string());
                warn!(%limit, "naming node ceiling reached, remaining schemas stay unnamed");
                self.names.limits.push(limit);
            }
            return;
        }
        self.remaining -= 1;

        let doc = self.doc;
        let Some(map) = doc.mapping(id) else {
            return;
        };
        if map.contains_key(REF_KEY) || !self.visiting.insert(id) {
            return;
        }

        if is_inline_object(doc, id) && self.is_unnamed(id) {
            let candidate = match doc.get_str(id, "title").filter(|t| !t.trim().is_empty()) {
                Some(title) => title.to_string(),
                None => match enclosing {
                    Some(property) => property.to_string(),
                    None => self.generic_name(),
                },
            };
            self.assign(id, candidate);
        }

        if let Some(props) = map.get("properties").and_then(|p| doc.mapping(p)) {
            for (name, prop) in props.iter() {
                self.scan(prop, Some(name), depth + 1);
            }
        }
        for key in ["items", "additionalProperties"] {
            if let Some(child) = map.get(key) {
                self.scan(child, enclosing, depth + 1);
            }
        }
        for keyword in std::iter::once(ALL_OF).chain(UNION_KEYWORDS.iter().copied()) {
            let branches = map.get(keyword).and_then(|b| doc.sequence(b)).unwrap_or_default();
            for &branch in branches {
                self.scan(branch, enclosing, depth + 1);
            }
        }

        self.visiting.remove(&id);
    }

    fn is_unnamed(&self, id: NodeId) -> bool {
        !self.registered.contains_key(&id) && !self.names.contains(id)
    }

    /// Record a name unless the node is registered or already named.
    fn assign(&mut self, id: NodeId, candidate: String) {
        if !self.is_unnamed(id) {
            return;
        }
        let name = sanitize_identifier(&candidate);

        let existing = match self.doc.named_schema(&name) {
            Some(component) if component != id => Some(component),
            _ => self.used.get(&name).copied().filter(|holder| *holder != id),
        };
        if let Some(existing) = existing {
            warn!(name, %existing, node = %id, "inline schema name collision");
            self.names.collisions.push(NameCollision {
                name: name.clone(),
                existing,
                node: id,
            });
        }

        debug!(name, %id, "named inline schema");
        self.used.entry(name.clone()).or_insert(id);
        self.names.names.insert(id, name);
        self.names.order.push(id);
    }

    fn generic_name(&mut self) -> String {
        self.counter += 1;
        format!("InlineSchema{}", self.counter)
    }
}

/// Inline (unreferenced) object schema with a `properties` mapping.
fn is_inline_object(doc: &Document, id: NodeId) -> bool {
    doc.reference(id).is_none()
        && doc
            .get(id, "properties")
            .is_some_and(|props| doc.is_mapping(props))
}

fn looks_like_collection(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    if COLLECTION_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix)) {
        return true;
    }
    lower.len() > 2 && lower.ends_with('s') && !lower.ends_with("ss")
}

/// PascalCase identifier from arbitrary text. Empty results and results
/// starting with a digit get a `Schema` prefix.
pub fn sanitize_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for word in raw
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.push_str(chars.as_str());
        }
    }
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, "Schema");
    }
    out
}

/// Every response of every operation, with the operation's `operationId`.
/// Response references are followed.
pub(crate) fn operation_responses(doc: &Document) -> Vec<(Option<String>, NodeId)> {
    let mut out = Vec::new();
    let Some(paths) = doc.get(doc.root(), PATHS_KEY).and_then(|p| doc.mapping(p)) else {
        return out;
    };
    for (_, item) in paths.iter() {
        for method in HTTP_METHODS {
            let Some(operation) = doc.get(item, method) else {
                continue;
            };
            let operation_id = doc.get_str(operation, "operationId").map(str::to_string);
            let Some(responses) = doc.get(operation, RESPONSES_KEY).and_then(|r| doc.mapping(r))
            else {
                continue;
            };
            for (_, response) in responses.iter() {
                if let Some(response) = resolve_response_ref(doc, response) {
                    out.push((operation_id.clone(), response));
                }
            }
        }
    }
    out
}

/// Body schemas of a response: `content.*.schema`, or a bare `schema`.
pub(crate) fn response_body_schemas(doc: &Document, response: NodeId) -> Vec<NodeId> {
    let Some(response) = resolve_response_ref(doc, response) else {
        return Vec::new();
    };
    let mut schemas: Vec<NodeId> = doc
        .get(response, "content")
        .and_then(|c| doc.mapping(c))
        .map(|content| {
            content
                .values()
                .filter_map(|media| doc.get(media, "schema"))
                .collect()
        })
        .unwrap_or_default();
    if let Some(schema) = doc.get(response, "schema") {
        schemas.push(schema);
    }
    schemas
}

/// Follow `#/components/responses/Name` references.
pub(crate) fn resolve_response_ref(doc: &Document, id: NodeId) -> Option<NodeId> {
    let mut current = id;
    for _ in 0..MAX_RESPONSE_HOPS {
        let Some(reference) = doc.reference(current) else {
            return Some(current);
        };
        let name = unescape_pointer_segment(reference.strip_prefix(RESPONSE_REF_PREFIX)?);
        current = doc.lookup(doc.root(), &[COMPONENTS_KEY, RESPONSES_KEY, name.as_str()])?;
    }
    None
}
