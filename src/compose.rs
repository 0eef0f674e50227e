//! Effective schemas for composition keywords.
//!
//! `allOf` branches are merged left to right into one schema: the first
//! branch to define a facet keeps it, `properties` are unioned without
//! overwriting, and `required` is an order-preserving union. For `oneOf` and
//! `anyOf` the first listed branch stands in for the whole union.
//!
//! Nothing here mutates the document. A merged schema refers to the
//! document's nodes by id.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::debug;

use crate::node::{Document, Mapping, Node, NodeId};
use crate::types::{
    schema_ref_name, Limits, ALL_OF, COMPOSITION_KEYWORDS, REF_KEY, UNION_KEYWORDS,
};

/// Most internal reference hops followed when resolving a schema reference.
const MAX_REF_HOPS: usize = 32;

/// The single schema that stands for a (possibly composed) schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectiveSchema {
    /// Nothing to merge; this is the node itself (or the chosen union branch).
    Original(NodeId),
    /// Result of merging intersection branches.
    Merged(MergedSchema),
}

/// Merged view over several schema nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedSchema {
    source: NodeId,
    facets: Mapping,
    properties: Mapping,
    required: Vec<String>,
}

impl MergedSchema {
    fn new(source: NodeId) -> Self {
        Self {
            source,
            facets: Mapping::new(),
            properties: Mapping::new(),
            required: Vec::new(),
        }
    }

    /// Fold one schema in. Existing facets and properties are never
    /// overwritten.
    fn merge_from(&mut self, doc: &Document, schema: &EffectiveSchema) {
        match schema {
            EffectiveSchema::Original(id) => {
                let Some(map) = doc.mapping(*id) else {
                    return;
                };
                for (key, value) in map.iter() {
                    match key {
                        "properties" => {
                            if let Some(props) = doc.mapping(value) {
                                for (name, prop) in props.iter() {
                                    self.properties.insert_if_absent(name, prop);
                                }
                            }
                        }
                        "required" => {
                            let names = doc.sequence(value).unwrap_or_default();
                            for name in names.iter().filter_map(|n| doc.as_str(*n)) {
                                self.add_required(name);
                            }
                        }
                        REF_KEY => {}
                        _ if COMPOSITION_KEYWORDS.contains(&key) => {}
                        _ => {
                            self.facets.insert_if_absent(key, value);
                        }
                    }
                }
            }
            EffectiveSchema::Merged(other) => {
                for (key, value) in other.facets.iter() {
                    self.facets.insert_if_absent(key, value);
                }
                for (name, prop) in other.properties.iter() {
                    self.properties.insert_if_absent(name, prop);
                }
                for name in &other.required {
                    self.add_required(name);
                }
            }
        }
    }

    fn add_required(&mut self, name: &str) {
        if !self.required.iter().any(|r| r == name) {
            self.required.push(name.to_string());
        }
    }
}

impl EffectiveSchema {
    /// The node this schema was computed for (the chosen node when original).
    pub fn node_id(&self) -> NodeId {
        match self {
            EffectiveSchema::Original(id) => *id,
            EffectiveSchema::Merged(merged) => merged.source,
        }
    }

    pub fn is_merged(&self) -> bool {
        matches!(self, EffectiveSchema::Merged(_))
    }

    /// Value of a facet such as `type`, `format` or `enum`.
    pub fn facet(&self, doc: &Document, key: &str) -> Option<NodeId> {
        match self {
            EffectiveSchema::Original(id) => doc.get(*id, key),
            EffectiveSchema::Merged(merged) => merged.facets.get(key),
        }
    }

    /// The `type` facet when it is a single string.
    pub fn schema_type<'d>(&self, doc: &'d Document) -> Option<&'d str> {
        self.facet(doc, "type").and_then(|id| doc.as_str(id))
    }

    /// Properties in merge order.
    pub fn properties(&self, doc: &Document) -> Vec<(String, NodeId)> {
        match self {
            EffectiveSchema::Original(id) => doc
                .get(*id, "properties")
                .and_then(|props| doc.mapping(props))
                .map(|props| props.iter().map(|(k, v)| (k.to_string(), v)).collect())
                .unwrap_or_default(),
            EffectiveSchema::Merged(merged) => merged
                .properties
                .iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    pub fn property(&self, doc: &Document, name: &str) -> Option<NodeId> {
        match self {
            EffectiveSchema::Original(id) => doc.lookup(*id, &["properties", name]),
            EffectiveSchema::Merged(merged) => merged.properties.get(name),
        }
    }

    pub fn required(&self, doc: &Document) -> Vec<String> {
        match self {
            EffectiveSchema::Original(id) => doc
                .get(*id, "required")
                .and_then(|req| doc.sequence(req))
                .map(|names| {
                    names
                        .iter()
                        .filter_map(|n| doc.as_str(*n).map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
            EffectiveSchema::Merged(merged) => merged.required.clone(),
        }
    }

    /// Declared `type: object`, or untyped with properties.
    pub fn is_object(&self, doc: &Document) -> bool {
        match self.schema_type(doc) {
            Some(t) => t == "object",
            None => !self.properties(doc).is_empty(),
        }
    }

    /// Render as a standalone JSON schema.
    pub fn to_json(&self, doc: &Document) -> Value {
        match self {
            EffectiveSchema::Original(id) => doc.to_json(*id),
            EffectiveSchema::Merged(merged) => {
                let mut out = Map::new();
                for (key, value) in merged.facets.iter() {
                    out.insert(key.to_string(), doc.to_json(value));
                }
                if !merged.properties.is_empty() {
                    let props = merged
                        .properties
                        .iter()
                        .map(|(name, prop)| (name.to_string(), doc.to_json(prop)))
                        .collect();
                    out.insert("properties".to_string(), Value::Object(props));
                }
                if !merged.required.is_empty() {
                    out.insert(
                        "required".to_string(),
                        Value::Array(merged.required.iter().cloned().map(Value::String).collect()),
                    );
                }
                Value::Object(out)
            }
        }
    }
}

/// Effective schema of `id`.
pub fn effective_schema(doc: &Document, id: NodeId) -> EffectiveSchema {
    effective_schema_at(doc, id, 0)
}

/// Effective schema of `id` at a given composition depth.
///
/// At or past the depth ceiling the node is returned as written. A branch
/// that leads back to a schema still being merged is skipped.
pub fn effective_schema_at(doc: &Document, id: NodeId, depth: usize) -> EffectiveSchema {
    let mut merging = HashSet::new();
    compose(doc, id, depth, &mut merging)
}

fn compose(doc: &Document, id: NodeId, depth: usize, merging: &mut HashSet<NodeId>) -> EffectiveSchema {
    if depth >= Limits::COMPOSITION.max_depth {
        debug!(%id, depth, "composition depth ceiling reached");
        return EffectiveSchema::Original(id);
    }
    merging.insert(id);
    let effective = compose_keywords(doc, id, depth, merging);
    merging.remove(&id);
    effective
}

fn compose_keywords(
    doc: &Document,
    id: NodeId,
    depth: usize,
    merging: &mut HashSet<NodeId>,
) -> EffectiveSchema {
    if let Some(branches) = doc.get(id, ALL_OF).and_then(|b| doc.sequence(b)) {
        let mut merged = MergedSchema::new(id);
        for &branch in branches {
            let Some(target) = resolve_schema_ref(doc, branch) else {
                debug!(%branch, reference = doc.reference(branch), "skipping unresolvable allOf branch");
                continue;
            };
            if merging.contains(&target) {
                debug!(%branch, %target, "skipping allOf branch that re-enters its own composition");
                continue;
            }
            let effective = compose(doc, target, depth + 1, merging);
            merged.merge_from(doc, &effective);
        }
        merged.merge_from(doc, &EffectiveSchema::Original(id));
        return EffectiveSchema::Merged(merged);
    }

    for keyword in UNION_KEYWORDS {
        let Some(branches) = doc.get(id, keyword).and_then(|b| doc.sequence(b)) else {
            continue;
        };
        let Some(&first) = branches.first() else {
            continue;
        };
        return match resolve_schema_ref(doc, first) {
            Some(target) if merging.contains(&target) => {
                debug!(%first, keyword, "first union branch re-enters its own composition");
                EffectiveSchema::Original(id)
            }
            Some(target) => compose(doc, target, depth + 1, merging),
            None => {
                debug!(%first, keyword, "first union branch is unresolvable");
                EffectiveSchema::Original(id)
            }
        };
    }

    EffectiveSchema::Original(id)
}

/// Follow internal `$ref` chains to the schema they name.
///
/// Nodes without a reference are returned unchanged. References that cannot
/// be followed (missing names, cycles, external or unsupported targets)
/// yield `None`.
pub fn resolve_schema_ref(doc: &Document, id: NodeId) -> Option<NodeId> {
    let mut current = id;
    for _ in 0..MAX_REF_HOPS {
        let Some(reference) = doc.reference(current) else {
            return Some(current);
        };
        current = match schema_ref_name(reference) {
            Some(name) => doc.named_schema(&name)?,
            None if reference.starts_with('#') => doc.pointer(reference)?,
            None => return None,
        };
    }
    None
}

/// True when the node carries any composition keyword.
pub fn has_composition(doc: &Document, id: NodeId) -> bool {
    match doc.node(id) {
        Node::Mapping(map) => COMPOSITION_KEYWORDS.iter().any(|k| map.contains_key(k)),
        _ => false,
    }
}
