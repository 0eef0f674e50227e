//! Component schemas reachable from response bodies.
//!
//! Generators running with a filter only emit the component schemas that
//! operation responses actually reach. The walk starts at every response
//! body (operations and `components.responses`) and follows references,
//! properties, array items and composition branches.
//!
//! After resolution an external reference has been replaced by its target's
//! content, so the node no longer says which component it was. Such nodes
//! are matched back by identity with the registry. Inlined arrays that were
//! not registered are matched through an index of the registry's array
//! schemas; arrays written inline are never matched that way.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, warn};

use crate::error::SoftLimit;
use crate::naming::{operation_responses, response_body_schemas};
use crate::node::{Document, NodeId};
use crate::types::{
    schema_ref_name, Limits, COMPONENTS_KEY, COMPOSITION_KEYWORDS, MAX_COMPOSITION_BRANCHES,
    RESPONSES_KEY,
};

/// Names of reachable component schemas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reachability {
    pub names: BTreeSet<String>,
    /// Branches abandoned at the depth or node ceiling.
    pub limits: Vec<SoftLimit>,
}

impl Reachability {
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// True when every branch was walked to the end.
    pub fn is_complete(&self) -> bool {
        self.limits.is_empty()
    }
}

/// Collect the component schema names reachable from response bodies.
pub fn collect_referenced_schema_names(doc: &Document) -> Reachability {
    collect_with_limits(doc, Limits::REACHABILITY)
}

/// As [`collect_referenced_schema_names`], with explicit ceilings. The node
/// ceiling applies per response body.
pub fn collect_with_limits(doc: &Document, limits: Limits) -> Reachability {
    let mut seeds: Vec<NodeId> = operation_responses(doc)
        .into_iter()
        .flat_map(|(_, response)| response_body_schemas(doc, response))
        .collect();
    if let Some(responses) = doc
        .lookup(doc.root(), &[COMPONENTS_KEY, RESPONSES_KEY])
        .and_then(|id| doc.mapping(id))
    {
        for (_, response) in responses.iter() {
            seeds.extend(response_body_schemas(doc, response));
        }
    }

    let mut collector = Collector::new(doc, limits);
    let locations = doc.locate();
    for seed in seeds {
        let label = locations
            .get(&seed)
            .cloned()
            .unwrap_or_else(|| seed.to_string());
        collector.collect_seed(seed, label);
    }

    debug!(
        reachable = collector.names.len(),
        limits = collector.soft_limits.len(),
        "collected reachable schemas"
    );
    Reachability {
        names: collector.names,
        limits: collector.soft_limits,
    }
}

struct Collector<'a> {
    doc: &'a Document,
    limits: Limits,
    registered: HashMap<NodeId, String>,
    /// `ref:<Name>` / `type:<t>` of a registry array schema's items to its name.
    array_index: HashMap<String, String>,
    names: BTreeSet<String>,
    soft_limits: Vec<SoftLimit>,
    visiting: HashSet<NodeId>,
    seed: String,
    remaining: usize,
    exhausted: bool,
}

impl<'a> Collector<'a> {
    fn new(doc: &'a Document, limits: Limits) -> Self {
        let registered = doc.registered_names();
        let array_index = build_array_index(doc, &registered);
        Self {
            doc,
            limits,
            registered,
            array_index,
            names: BTreeSet::new(),
            soft_limits: Vec::new(),
            visiting: HashSet::new(),
            seed: String::new(),
            remaining: 0,
            exhausted: false,
        }
    }

    fn collect_seed(&mut self, schema: NodeId, label: String) {
        self.seed = label;
        self.remaining = self.limits.max_nodes;
        self.exhausted = false;
        self.walk(schema, 0);
    }

    fn record(&mut self, name: &str) -> bool {
        let added = self.names.insert(name.to_string());
        if added {
            debug!(name, seed = %self.seed, "schema reachable");
        }
        added
    }

    /// Depth and node checks shared by every step. False abandons the branch.
    fn enter(&mut self, depth: usize) -> bool {
        if depth > self.limits.max_depth {
            let limit = SoftLimit::depth(self.limits.max_depth, self.seed.clone());
            warn!(%limit, "reachability walk too deep, abandoning branch");
            self.soft_limits.push(limit);
            return false;
        }
        if self.remaining == 0 {
            if !self.exhausted {
                self.exhausted = true;
                let limit = SoftLimit::nodes(self.limits.max_nodes, self.seed.clone());
                warn!(%limit, "reachability walk too large, abandoning response body");
                self.soft_limits.push(limit);
            }
            return false;
        }
        self.remaining -= 1;
        true
    }

    fn walk(&mut self, id: NodeId, depth: usize) {
        if !self.enter(depth) {
            return;
        }
        let doc = self.doc;

        if let Some(reference) = doc.reference(id) {
            match schema_ref_name(reference) {
                Some(name) => {
                    if self.record(&name) {
                        match doc.named_schema(&name) {
                            Some(target) if doc.reference(target).is_some() => {
                                self.walk(target, depth + 1)
                            }
                            Some(target) => self.walk_body(target, depth + 1),
                            None => debug!(name, "reference to a missing component"),
                        }
                    }
                }
                None => debug!(reference, "not a component schema reference"),
            }
            return;
        }

        // Content inlined in place still is the registered component.
        if let Some(name) = self.registered.get(&id).cloned() {
            if self.record(&name) {
                self.walk_body(id, depth);
            }
            return;
        }

        self.walk_body(id, depth);
    }

    fn walk_body(&mut self, id: NodeId, depth: usize) {
        let doc = self.doc;
        let Some(map) = doc.mapping(id) else {
            return;
        };
        if !self.visiting.insert(id) {
            return;
        }

        if is_array(doc, id) {
            if doc.was_inlined(id) && !self.registered.contains_key(&id) {
                if let Some(name) = self.array_origin(id) {
                    if self.record(&name) {
                        if let Some(target) = doc.named_schema(&name).filter(|t| *t != id) {
                            if self.enter(depth + 1) {
                                self.walk_body(target, depth + 1);
                            }
                        }
                    }
                }
            }
            // Only the items: siblings of an array do not describe its elements.
            if let Some(items) = map.get("items") {
                self.walk(items, depth + 1);
            }
        } else {
            for keyword in COMPOSITION_KEYWORDS {
                let branches = map
                    .get(keyword)
                    .and_then(|b| doc.sequence(b))
                    .unwrap_or_default();
                for &branch in branches.iter().take(MAX_COMPOSITION_BRANCHES) {
                    self.walk(branch, depth + 1);
                }
            }
            if let Some(props) = map.get("properties").and_then(|p| doc.mapping(p)) {
                for prop in props.values() {
                    self.walk(prop, depth + 1);
                }
            }
            if let Some(additional) = map.get("additionalProperties") {
                self.walk(additional, depth + 1);
            }
        }

        self.visiting.remove(&id);
    }

    fn array_origin(&self, id: NodeId) -> Option<String> {
        let key = array_key(self.doc, id, &self.registered)?;
        self.array_index.get(&key).cloned()
    }
}

/// An array schema: `type: array`, or untyped with `items`.
fn is_array(doc: &Document, id: NodeId) -> bool {
    match doc.get_str(id, "type") {
        Some(t) => t == "array",
        None => doc.get(id, "items").is_some(),
    }
}

/// Fallback key of an array schema: its item reference, else its item type.
fn array_key(doc: &Document, id: NodeId, registered: &HashMap<NodeId, String>) -> Option<String> {
    let items = doc.get(id, "items")?;
    if let Some(name) = doc.reference(items).and_then(schema_ref_name) {
        return Some(format!("ref:{}", name));
    }
    if let Some(name) = registered.get(&items) {
        return Some(format!("ref:{}", name));
    }
    doc.get_str(items, "type").map(|t| format!("type:{}", t))
}

/// Index the registry's array schemas by item key. Ambiguous type keys are
/// dropped; for reference keys the first component wins.
fn build_array_index(doc: &Document, registered: &HashMap<NodeId, String>) -> HashMap<String, String> {
    let mut index = HashMap::new();
    let mut type_keys: HashMap<String, Vec<String>> = HashMap::new();

    let Some(registry) = doc.schema_registry().and_then(|id| doc.mapping(id)) else {
        return index;
    };
    for (name, id) in registry.iter() {
        if !is_array(doc, id) {
            continue;
        }
        let Some(key) = array_key(doc, id, registered) else {
            continue;
        };
        if key.starts_with("type:") {
            type_keys.entry(key).or_default().push(name.to_string());
        } else {
            index.entry(key).or_insert_with(|| name.to_string());
        }
    }
    for (key, mut names) in type_keys {
        if names.len() == 1 {
            index.insert(key, names.remove(0));
        } else {
            debug!(key, candidates = names.len(), "ambiguous array index key ignored");
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api(paths: serde_json::Value, schemas: serde_json::Value) -> Document {
        Document::from_json(&json!({
            "openapi": "3.0.0",
            "paths": paths,
            "components": { "schemas": schemas }
        }))
    }

    fn ok_response(schema: serde_json::Value) -> serde_json::Value {
        json!({ "get": { "responses": { "200": { "content": { "application/json": { "schema": schema } } } } } })
    }

    #[test]
    fn array_of_refs_reaches_item_component() {
        let doc = api(
            json!({ "/orders": ok_response(json!({ "type": "array", "items": { "$ref": "#/components/schemas/Order" } })) }),
            json!({
                "Order": { "type": "object", "properties": { "id": { "type": "string" } } },
                "Unused": { "type": "object" }
            }),
        );
        let reach = collect_referenced_schema_names(&doc);
        assert!(reach.contains("Order"));
        assert!(!reach.contains("Unused"));
        assert!(reach.is_complete());
    }

    #[test]
    fn references_are_followed_transitively() {
        let doc = api(
            json!({ "/a": ok_response(json!({ "$ref": "#/components/schemas/A" })) }),
            json!({
                "A": { "properties": { "b": { "$ref": "#/components/schemas/B" } } },
                "B": { "allOf": [ { "$ref": "#/components/schemas/C" } ] },
                "C": { "additionalProperties": { "$ref": "#/components/schemas/D" } },
                "D": { "type": "string" },
                "Other": { "type": "string" }
            }),
        );
        let reach = collect_referenced_schema_names(&doc);
        let names: Vec<_> = reach.iter().collect();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn cycles_terminate() {
        let doc = api(
            json!({ "/a": ok_response(json!({ "$ref": "#/components/schemas/A" })) }),
            json!({
                "A": { "properties": { "b": { "$ref": "#/components/schemas/B" } } },
                "B": { "properties": { "a": { "$ref": "#/components/schemas/A" } } }
            }),
        );
        let reach = collect_referenced_schema_names(&doc);
        assert_eq!(reach.len(), 2);
    }

    #[test]
    fn array_siblings_are_not_walked() {
        let doc = api(
            json!({ "/a": ok_response(json!({
                "type": "array",
                "items": { "type": "string" },
                "not": { "$ref": "#/components/schemas/Sibling" }
            })) }),
            json!({ "Sibling": { "type": "object" } }),
        );
        assert!(collect_referenced_schema_names(&doc).is_empty());
    }

    #[test]
    fn inlined_components_are_matched_by_identity() {
        let mut doc = api(
            json!({ "/a": ok_response(json!({ "type": "object", "properties": {
                "owner": { "$ref": "#/components/schemas/Owner" }
            } })) }),
            json!({ "Owner": { "type": "object" } }),
        );
        let body = doc
            .pointer("#/paths/~1a/get/responses/200/content/application~1json/schema")
            .unwrap();
        doc.register_schema("Wrapper", body);

        let reach = collect_referenced_schema_names(&doc);
        assert!(reach.contains("Wrapper"));
        assert!(reach.contains("Owner"));
    }

    #[test]
    fn inlined_arrays_without_identity_use_the_index() {
        let mut doc = api(
            json!({ "/users": ok_response(json!({ "type": "array", "items": { "$ref": "#/components/schemas/User" } })) }),
            json!({
                "User": { "type": "object" },
                "Users": { "type": "array", "items": { "$ref": "#/components/schemas/User" } },
                "Tags": { "type": "array", "items": { "type": "string" } },
                "Labels": { "type": "array", "items": { "type": "string" } }
            }),
        );
        let body = doc
            .pointer("#/paths/~1users/get/responses/200/content/application~1json/schema")
            .unwrap();
        doc.mark_inlined(body);

        let reach = collect_referenced_schema_names(&doc);
        assert!(reach.contains("Users"));
        assert!(reach.contains("User"));

        let index = build_array_index(&doc, &doc.registered_names());
        assert_eq!(index.get("ref:User").map(String::as_str), Some("Users"));
        assert!(!index.contains_key("type:string"));
    }

    #[test]
    fn inline_arrays_do_not_match_lookalike_components() {
        let doc = api(
            json!({ "/tags": ok_response(json!({ "type": "array", "items": { "type": "string" } })) }),
            json!({ "Tags": { "type": "array", "items": { "type": "string" } } }),
        );
        assert!(collect_referenced_schema_names(&doc).is_empty());
    }

    #[test]
    fn node_ceiling_abandons_the_rest_of_a_body() {
        let doc = api(
            json!({ "/a": ok_response(json!({ "properties": {
                "a": { "$ref": "#/components/schemas/A" },
                "b": { "$ref": "#/components/schemas/B" },
                "c": { "$ref": "#/components/schemas/C" },
                "d": { "$ref": "#/components/schemas/D" }
            } })) }),
            json!({
                "A": { "type": "string" },
                "B": { "type": "string" },
                "C": { "type": "string" },
                "D": { "type": "string" }
            }),
        );

        let reach = collect_with_limits(&doc, Limits::new(64, 3));
        assert!(reach.contains("A"));
        assert!(reach.contains("B"));
        assert!(!reach.contains("D"));
        assert_eq!(reach.limits.len(), 1);
        assert_eq!(reach.limits[0].kind, crate::error::LimitKind::NodeCount);
        assert_eq!(reach.limits[0].limit, 3);
    }

    #[test]
    fn component_responses_are_seeds() {
        let doc = Document::from_json(&json!({
            "openapi": "3.0.0",
            "paths": { "/x": { "get": { "responses": { "404": { "$ref": "#/components/responses/NotFound" } } } } },
            "components": {
                "responses": { "NotFound": { "content": { "application/json": {
                    "schema": { "$ref": "#/components/schemas/Error" }
                } } } },
                "schemas": { "Error": { "type": "object" } }
            }
        }));
        assert!(collect_referenced_schema_names(&doc).contains("Error"));
    }

    #[test]
    fn deep_chains_report_soft_limits() {
        let mut schemas = serde_json::Map::new();
        for i in 0..10 {
            schemas.insert(
                format!("S{}", i),
                json!({ "properties": { "next": { "$ref": format!("#/components/schemas/S{}", i + 1) } } }),
            );
        }
        schemas.insert("S10".into(), json!({ "type": "string" }));
        let doc = api(
            json!({ "/deep": ok_response(json!({ "$ref": "#/components/schemas/S0" })) }),
            serde_json::Value::Object(schemas),
        );

        let reach = collect_with_limits(&doc, Limits::new(6, 5_000));
        assert!(!reach.is_complete());
        assert!(reach.contains("S0"));
        assert!(!reach.contains("S10"));
    }
}
