//! Document tree stored as an arena of nodes.
//!
//! Every node gets a [`NodeId`] when it is allocated and keeps it for the
//! lifetime of the [`Document`]. Passes that need identity (cycle guards,
//! the inline-name table, reachability matching) key their tables by
//! `NodeId` instead of comparing pointers.
//!
//! Replacing a node's content with [`Document::replace`] keeps its id, which
//! is how the resolver inlines a reference "in place". Inserting an existing
//! id under a second key shares the node between both locations.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde_json::Value;

use crate::types::{COMPONENTS_KEY, REF_KEY, SCHEMAS_KEY};

/// Stable identity of a node inside one [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Position of the node in its arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "boolean",
            Scalar::Integer(_) | Scalar::Float(_) => "number",
            Scalar::String(_) => "string",
        }
    }
}

/// Ordered string-keyed mapping with unique keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    entries: Vec<(String, NodeId)>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<NodeId> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, id)| *id)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Insert or replace. A replaced key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, id: NodeId) -> Option<NodeId> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => Some(std::mem::replace(&mut entry.1, id)),
            None => {
                self.entries.push((key, id));
                None
            }
        }
    }

    /// Insert only when the key is absent. Returns whether it was inserted.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, id: NodeId) -> bool {
        let key = key.into();
        if self.contains_key(&key) {
            return false;
        }
        self.entries.push((key, id));
        true
    }

    pub fn remove(&mut self, key: &str) -> Option<NodeId> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeId)> + '_ {
        self.entries.iter().map(|(k, id)| (k.as_str(), *id))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.iter().map(|(_, id)| *id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One node of the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Mapping(Mapping),
    Sequence(Vec<NodeId>),
    Scalar(Scalar),
}

impl Node {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Mapping(_) => "mapping",
            Node::Sequence(_) => "sequence",
            Node::Scalar(s) => s.type_name(),
        }
    }

    /// Child ids in document order.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Node::Mapping(map) => map.values().collect(),
            Node::Sequence(items) => items.clone(),
            Node::Scalar(_) => Vec::new(),
        }
    }
}

/// A parsed document: an arena of nodes plus the id of its root.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    /// Nodes whose content was spliced in from a reference target.
    inlined: HashSet<NodeId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document whose root is an empty mapping.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::Mapping(Mapping::new())],
            root: NodeId(0),
            inlined: HashSet::new(),
        }
    }

    /// Build a document from a JSON value, preserving key order.
    pub fn from_json(value: &Value) -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            inlined: HashSet::new(),
        };
        doc.root = doc.alloc_json(value);
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.root = id;
    }

    /// Number of allocated nodes, reachable or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Overwrite the content of `id`, keeping its identity.
    pub fn replace(&mut self, id: NodeId, node: Node) -> Node {
        std::mem::replace(&mut self.nodes[id.index()], node)
    }

    /// Record that `id` now holds the content of a reference target.
    pub fn mark_inlined(&mut self, id: NodeId) {
        self.inlined.insert(id);
    }

    /// Whether `id` was a reference that resolution replaced in place.
    pub fn was_inlined(&self, id: NodeId) -> bool {
        self.inlined.contains(&id)
    }

    pub fn mapping(&self, id: NodeId) -> Option<&Mapping> {
        match self.node(id) {
            Node::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn mapping_mut(&mut self, id: NodeId) -> Option<&mut Mapping> {
        match &mut self.nodes[id.index()] {
            Node::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn sequence(&self, id: NodeId) -> Option<&[NodeId]> {
        match self.node(id) {
            Node::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn scalar(&self, id: NodeId) -> Option<&Scalar> {
        match self.node(id) {
            Node::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self, id: NodeId) -> Option<&str> {
        self.scalar(id).and_then(Scalar::as_str)
    }

    pub fn is_mapping(&self, id: NodeId) -> bool {
        matches!(self.node(id), Node::Mapping(_))
    }

    /// Child of a mapping by key.
    pub fn get(&self, id: NodeId, key: &str) -> Option<NodeId> {
        self.mapping(id)?.get(key)
    }

    /// String child of a mapping by key.
    pub fn get_str(&self, id: NodeId, key: &str) -> Option<&str> {
        self.get(id, key).and_then(|child| self.as_str(child))
    }

    /// Follow a chain of mapping keys.
    pub fn lookup(&self, id: NodeId, keys: &[&str]) -> Option<NodeId> {
        keys.iter().try_fold(id, |current, key| self.get(current, key))
    }

    /// The `$ref` string of a mapping node, if it carries one.
    pub fn reference(&self, id: NodeId) -> Option<&str> {
        self.get_str(id, REF_KEY)
    }

    /// Navigate a JSON pointer fragment (`#/a/b`, `/a/b` or `#`) from the root.
    pub fn pointer(&self, fragment: &str) -> Option<NodeId> {
        self.pointer_from(self.root, fragment)
    }

    pub fn pointer_from(&self, start: NodeId, fragment: &str) -> Option<NodeId> {
        let path = fragment.trim_start_matches('#');
        let path = path.strip_prefix('/').unwrap_or(path);
        if path.is_empty() {
            return Some(start);
        }

        let mut current = start;
        for part in path.split('/') {
            let key = unescape_pointer_segment(part);
            current = match self.node(current) {
                Node::Mapping(map) => map.get(&key)?,
                Node::Sequence(items) => *items.get(key.parse::<usize>().ok()?)?,
                Node::Scalar(_) => return None,
            };
        }
        Some(current)
    }

    /// Deep-copy a subtree of another document into this arena.
    pub fn import(&mut self, source: &Document, id: NodeId) -> NodeId {
        let node = match source.node(id) {
            Node::Mapping(map) => {
                let mut copy = Mapping::new();
                for (key, child) in map.iter() {
                    let child = self.import(source, child);
                    copy.insert(key, child);
                }
                Node::Mapping(copy)
            }
            Node::Sequence(items) => {
                Node::Sequence(items.iter().map(|item| self.import(source, *item)).collect())
            }
            Node::Scalar(s) => Node::Scalar(s.clone()),
        };
        self.alloc(node)
    }

    /// Allocate a JSON value (and its children) in this arena.
    pub fn alloc_json(&mut self, value: &Value) -> NodeId {
        let node = match value {
            Value::Null => Node::Scalar(Scalar::Null),
            Value::Bool(b) => Node::Scalar(Scalar::Bool(*b)),
            Value::Number(n) => Node::Scalar(match n.as_i64() {
                Some(i) => Scalar::Integer(i),
                None => Scalar::Float(n.as_f64().unwrap_or(f64::NAN)),
            }),
            Value::String(s) => Node::Scalar(Scalar::String(s.clone())),
            Value::Array(items) => {
                Node::Sequence(items.iter().map(|item| self.alloc_json(item)).collect())
            }
            Value::Object(obj) => {
                let mut map = Mapping::new();
                for (key, child) in obj {
                    let child = self.alloc_json(child);
                    map.insert(key.clone(), child);
                }
                Node::Mapping(map)
            }
        };
        self.alloc(node)
    }

    /// Render a subtree as JSON. Non-finite floats become `null`.
    pub fn to_json(&self, id: NodeId) -> Value {
        match self.node(id) {
            Node::Mapping(map) => Value::Object(
                map.iter()
                    .map(|(key, child)| (key.to_string(), self.to_json(child)))
                    .collect(),
            ),
            Node::Sequence(items) => {
                Value::Array(items.iter().map(|item| self.to_json(*item)).collect())
            }
            Node::Scalar(Scalar::Null) => Value::Null,
            Node::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            Node::Scalar(Scalar::Integer(i)) => Value::from(*i),
            Node::Scalar(Scalar::Float(f)) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Node::Scalar(Scalar::String(s)) => Value::String(s.clone()),
        }
    }

    /// `components.schemas`, if present.
    pub fn schema_registry(&self) -> Option<NodeId> {
        self.lookup(self.root, &[COMPONENTS_KEY, SCHEMAS_KEY])
            .filter(|id| self.is_mapping(*id))
    }

    /// `components.schemas`, created empty (with `components`) when missing.
    pub fn ensure_schema_registry(&mut self) -> NodeId {
        if let Some(id) = self.schema_registry() {
            return id;
        }
        let root = self.root;
        let components = match self.get(root, COMPONENTS_KEY) {
            Some(id) if self.is_mapping(id) => id,
            _ => {
                let id = self.alloc(Node::Mapping(Mapping::new()));
                if let Some(map) = self.mapping_mut(root) {
                    map.insert(COMPONENTS_KEY, id);
                }
                id
            }
        };
        let schemas = self.alloc(Node::Mapping(Mapping::new()));
        if let Some(map) = self.mapping_mut(components) {
            map.insert(SCHEMAS_KEY, schemas);
        }
        schemas
    }

    /// A top-level component schema by name.
    pub fn named_schema(&self, name: &str) -> Option<NodeId> {
        self.get(self.schema_registry()?, name)
    }

    /// Register `id` under `name` unless the name is taken.
    pub fn register_schema(&mut self, name: &str, id: NodeId) -> bool {
        let registry = self.ensure_schema_registry();
        self.mapping_mut(registry)
            .map(|map| map.insert_if_absent(name, id))
            .unwrap_or(false)
    }

    /// Name under which `id` is registered, if it is a top-level component.
    pub fn registered_name(&self, id: NodeId) -> Option<&str> {
        self.mapping(self.schema_registry()?)?
            .iter()
            .find(|(_, entry)| *entry == id)
            .map(|(name, _)| name)
    }

    /// Identity index of the registry: node id to component name.
    pub fn registered_names(&self) -> HashMap<NodeId, String> {
        let mut names = HashMap::new();
        if let Some(map) = self.schema_registry().and_then(|id| self.mapping(id)) {
            for (name, id) in map.iter() {
                names.entry(id).or_insert_with(|| name.to_string());
            }
        }
        names
    }

    /// First JSON pointer under which each reachable node appears.
    pub fn locate(&self) -> HashMap<NodeId, String> {
        let mut found = HashMap::new();
        let mut seen = HashSet::new();
        let mut stack = vec![(self.root, String::new())];

        while let Some((id, path)) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let mut children = Vec::new();
            match self.node(id) {
                Node::Mapping(map) => {
                    for (key, child) in map.iter() {
                        children.push((child, format!("{}/{}", path, escape_pointer_segment(key))));
                    }
                }
                Node::Sequence(items) => {
                    for (i, child) in items.iter().enumerate() {
                        children.push((*child, format!("{}/{}", path, i)));
                    }
                }
                Node::Scalar(_) => {}
            }
            found.insert(id, if path.is_empty() { "/".to_string() } else { path });
            // Reversed so the first child is visited first.
            stack.extend(children.into_iter().rev());
        }
        found
    }
}

/// Decode `~1` and `~0` in a JSON pointer segment.
pub fn unescape_pointer_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Encode a key for use as a JSON pointer segment.
pub fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}
