//! Reference resolution - inlines external references in place and registers
//! the schemas they bring in.
//!
//! Internal references of the root document (`#/components/schemas/Name`)
//! are left as written; consumers resolve them by name at the point of use.
//! External references (`models/User.yaml`, `common.yaml#/components/schemas/Error`)
//! are located, parsed, resolved recursively against their own file, and
//! spliced into the referencing node. Sibling keys of the referencing node
//! are kept.
//!
//! A schema brought in by an external reference is registered in the root's
//! `components.schemas` under its own name when that name is free. The
//! registry entry and the inlined occurrence are the same node.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ResolveError, SoftLimit};
use crate::loader::{is_api_description, normalize_entry, parse_location, Location};
use crate::node::{
    escape_pointer_segment, unescape_pointer_segment, Document, Mapping, Node, NodeId, Scalar,
};
use crate::types::{
    schema_ref_name, Limits, ResolveOptions, COMPONENTS_KEY, REFERENCE_EXTENSIONS, REF_KEY,
    SCHEMA_REF_PREFIX,
};

/// Classified `$ref` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference<'a> {
    /// `#...` pointer into the referencing document.
    Internal(&'a str),
    /// Relative file path with an optional pointer (without the `#`).
    External { path: &'a str, pointer: &'a str },
    /// URLs and paths without a recognized extension.
    Unsupported,
}

impl<'a> Reference<'a> {
    pub fn parse(reference: &'a str) -> Self {
        if reference.starts_with('#') {
            return Reference::Internal(reference);
        }
        if reference.contains("://") {
            return Reference::Unsupported;
        }
        let (path, pointer) = reference.split_once('#').unwrap_or((reference, ""));
        let recognized = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| REFERENCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if recognized {
            Reference::External { path, pointer }
        } else {
            Reference::Unsupported
        }
    }
}

/// Outcome of one resolution call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveReport {
    /// External and cross-file references spliced in place.
    pub inlined: usize,
    /// Names added to `components.schemas`, in registration order.
    pub registered: Vec<String>,
    /// Branches abandoned at a depth or size ceiling.
    pub limits: Vec<SoftLimit>,
    /// Schemas registered under another name because theirs was taken by a
    /// different schema: `(wanted, registered)`.
    pub renamed: Vec<(String, String)>,
    /// References whose non-mapping target replaced the sibling keys written
    /// next to them.
    pub dropped_siblings: Vec<String>,
}

impl ResolveReport {
    /// True when no branch was abandoned.
    pub fn is_complete(&self) -> bool {
        self.limits.is_empty()
    }
}

/// Resolve every reference in `document`, mutating it in place.
///
/// `location` is where the document came from; relative references are
/// looked up next to it, then under each search path, then (for archive
/// entries) at the archive root.
///
/// # Errors
///
/// Returns `ResolveError` when an external target cannot be located, read,
/// or does not contain the pointed-to node. Depth and size ceilings are not
/// errors; they are reported in [`ResolveReport::limits`].
pub fn resolve_references(
    document: &mut Document,
    location: &Location,
    options: &ResolveOptions,
) -> Result<ResolveReport, ResolveError> {
    ResolutionContext::new(document, options).resolve(location)
}

/// Where a node sits, as far as schema registration is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Other,
    Schema,
    /// Mapping whose values are schemas (`properties`, `$defs`, ...).
    SchemaMap,
    /// Sequence whose items are schemas (composition branches).
    SchemaList,
    /// The root document's `components.schemas`.
    Registry,
    /// A direct entry of the registry.
    RegistryEntry,
}

impl Position {
    fn child_of_mapping(self, key: &str) -> Position {
        match self {
            Position::SchemaMap => Position::Schema,
            Position::Registry => Position::RegistryEntry,
            _ => match key {
                "schema" | "items" | "additionalProperties" | "not" => Position::Schema,
                "allOf" | "oneOf" | "anyOf" => Position::SchemaList,
                "properties" | "patternProperties" | "definitions" | "$defs" | "schemas" => {
                    Position::SchemaMap
                }
                _ => Position::Other,
            },
        }
    }

    fn child_of_sequence(self) -> Position {
        match self {
            Position::SchemaList | Position::Schema => Position::Schema,
            _ => Position::Other,
        }
    }

    /// Position of content inlined at a node in this position.
    fn inlined(self) -> Position {
        match self {
            Position::RegistryEntry => Position::Schema,
            other => other,
        }
    }
}

/// The document whose references are currently being followed.
struct Frame {
    location: Location,
    /// Parsed content of an external file. `None` for the root document.
    source: Option<Document>,
}

impl Frame {
    fn is_root(&self) -> bool {
        self.source.is_none()
    }
}

/// A target on the active resolution path.
struct ActiveTarget {
    key: String,
    /// Node that receives (or is) the target's content.
    node: NodeId,
    remaining: usize,
    exhausted: bool,
}

/// State threaded through one resolution call.
pub struct ResolutionContext<'a> {
    document: &'a mut Document,
    search_paths: &'a [PathBuf],
    limits: Limits,
    /// Nodes on the active walk path.
    resolving: HashSet<NodeId>,
    /// Targets being inlined, outermost first.
    active: Vec<ActiveTarget>,
    /// Node holding the content of each target already brought in, by target key.
    bound: HashMap<String, NodeId>,
    /// Location of the root document, set by `resolve`.
    root: Option<Location>,
    report: ResolveReport,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(document: &'a mut Document, options: &'a ResolveOptions) -> Self {
        Self {
            document,
            search_paths: &options.search_paths,
            limits: options.limits,
            resolving: HashSet::new(),
            active: Vec::new(),
            bound: HashMap::new(),
            root: None,
            report: ResolveReport::default(),
        }
    }

    /// Walk the whole document from its root.
    ///
    /// A null root becomes an empty mapping, and API descriptions get an
    /// empty `components.schemas` when they lack one.
    pub fn resolve(mut self, location: &Location) -> Result<ResolveReport, ResolveError> {
        let root = self.document.root();
        if matches!(self.document.node(root), Node::Scalar(Scalar::Null)) {
            let empty = self.document.alloc(Node::Mapping(Mapping::new()));
            self.document.set_root(empty);
        }
        if is_api_description(self.document)
            || self.document.get(self.document.root(), COMPONENTS_KEY).is_some()
        {
            self.document.ensure_schema_registry();
        }
        self.root = Some(location.clone());

        let frame = Frame {
            location: location.clone(),
            source: None,
        };
        let root = self.document.root();
        self.walk(root, &frame, Position::Other)?;
        debug!(
            location = %location,
            inlined = self.report.inlined,
            registered = self.report.registered.len(),
            "resolved references"
        );
        Ok(self.report)
    }

    fn walk(&mut self, id: NodeId, frame: &Frame, pos: Position) -> Result<(), ResolveError> {
        if !self.charge_node() {
            return Ok(());
        }
        if !self.resolving.insert(id) {
            debug!(%id, "node already on the resolution path");
            return Ok(());
        }

        let items = match self.document.node(id) {
            Node::Mapping(_) => None,
            Node::Sequence(items) => Some(items.clone()),
            Node::Scalar(_) => Some(Vec::new()),
        };
        let result = match items {
            None => self.walk_mapping(id, frame, pos),
            Some(items) => items
                .into_iter()
                .try_for_each(|item| self.walk(item, frame, pos.child_of_sequence())),
        };

        self.resolving.remove(&id);
        result
    }

    fn walk_mapping(&mut self, id: NodeId, frame: &Frame, pos: Position) -> Result<(), ResolveError> {
        if let Some(reference) = self.document.reference(id).map(str::to_string) {
            return match Reference::parse(&reference) {
                // Root-document internal references stay lazy.
                Reference::Internal(pointer) => match &frame.source {
                    None => Ok(()),
                    Some(source) => self.resolve_internal(id, pointer, source, frame, pos),
                },
                Reference::External { path, pointer } => {
                    self.resolve_external(id, &reference, path, pointer, frame, pos)
                }
                Reference::Unsupported => {
                    debug!(reference, "leaving unsupported reference as written");
                    Ok(())
                }
            };
        }

        let registry = if frame.is_root() {
            self.document.schema_registry()
        } else {
            None
        };
        let entries: Vec<(String, NodeId)> = match self.document.mapping(id) {
            Some(map) => map.iter().map(|(k, v)| (k.to_string(), v)).collect(),
            None => return Ok(()),
        };
        for (key, child) in entries {
            let child_pos = if Some(child) == registry {
                Position::Registry
            } else {
                pos.child_of_mapping(&key)
            };
            self.walk(child, frame, child_pos)?;
        }
        Ok(())
    }

    fn resolve_external(
        &mut self,
        id: NodeId,
        reference: &str,
        path: &str,
        pointer: &str,
        frame: &Frame,
        pos: Position,
    ) -> Result<(), ResolveError> {
        let target = self.locate(path, reference, frame)?;
        let key = target_key(&target, pointer);
        let name = registration_name(pointer, &target);

        if let Some(in_progress) = self.in_progress(&key) {
            self.break_cycle(id, in_progress, &name);
            return Ok(());
        }
        if self.active.len() >= self.limits.max_depth {
            self.depth_exceeded(reference);
            return Ok(());
        }

        let source = parse_location(&target).map_err(|source| ResolveError::TargetUnreadable {
            reference: reference.to_string(),
            from: frame.location.to_string(),
            source,
        })?;
        let target_id = source
            .pointer(pointer)
            .ok_or_else(|| ResolveError::PointerNotFound {
                target: target.to_string(),
                pointer: format!("#{}", pointer),
            })?;

        debug!(reference, target = %target, "inlining external reference");
        let imported = self.document.import(&source, target_id);
        let child = Frame {
            location: target,
            source: Some(source),
        };
        self.enter(key.clone(), id);
        let walked = self.walk(imported, &child, pos.inlined());
        self.active.pop();
        walked?;

        self.splice(id, imported, reference);
        self.bound.entry(key).or_insert(id);
        self.report.inlined += 1;
        if pos == Position::Schema {
            self.register(&name, id);
        }
        Ok(())
    }

    /// An internal reference inside an external file points into that file.
    fn resolve_internal(
        &mut self,
        id: NodeId,
        pointer: &str,
        source: &Document,
        frame: &Frame,
        pos: Position,
    ) -> Result<(), ResolveError> {
        let fragment = pointer.trim_start_matches('#');
        let key = target_key(&frame.location, fragment);

        if let Some(name) = schema_ref_name(pointer) {
            // Keep the reference; make sure the root registry can answer it.
            if let Some(in_progress) = self.in_progress(&key) {
                self.break_cycle(id, in_progress, &name);
                return Ok(());
            }
            if let Some(&bound) = self.bound.get(&key) {
                self.point_at(id, bound, &name);
                return Ok(());
            }
            let target_id = source
                .pointer(fragment)
                .ok_or_else(|| ResolveError::PointerNotFound {
                    target: frame.location.to_string(),
                    pointer: pointer.to_string(),
                })?;
            if let Some(existing) = self.document.named_schema(&name) {
                if self.same_target(existing, &key, source, target_id) {
                    self.bound.insert(key, existing);
                    return Ok(());
                }
            }
            if self.active.len() >= self.limits.max_depth {
                self.depth_exceeded(pointer);
                return Ok(());
            }

            let imported = self.document.import(source, target_id);
            let registered = self.free_name(&name);
            if registered != name {
                warn!(
                    name,
                    registered,
                    location = %frame.location,
                    "component name taken by a different schema, registering under another name"
                );
                self.report.renamed.push((name.clone(), registered.clone()));
            }
            self.register(&registered, imported);
            self.bound.insert(key.clone(), imported);
            self.point_at(id, imported, &name);
            self.enter(key, imported);
            let walked = self.walk(imported, frame, Position::Schema);
            self.active.pop();
            return walked;
        }

        let name = registration_name(fragment, &frame.location);
        if let Some(in_progress) = self.in_progress(&key) {
            self.break_cycle(id, in_progress, &name);
            return Ok(());
        }
        if self.active.len() >= self.limits.max_depth {
            self.depth_exceeded(pointer);
            return Ok(());
        }
        let target_id = source
            .pointer(fragment)
            .ok_or_else(|| ResolveError::PointerNotFound {
                target: frame.location.to_string(),
                pointer: pointer.to_string(),
            })?;

        let imported = self.document.import(source, target_id);
        self.enter(key, id);
        let walked = self.walk(imported, frame, pos.inlined());
        self.active.pop();
        walked?;

        self.splice(id, imported, pointer);
        self.report.inlined += 1;
        if pos == Position::Schema && is_definition_pointer(fragment) {
            self.register(&name, id);
        }
        Ok(())
    }

    /// Find the file (or archive entry) an external reference names.
    fn locate(&self, path: &str, reference: &str, frame: &Frame) -> Result<Location, ResolveError> {
        let mut tried = Vec::new();

        match &frame.location {
            Location::Entry { archive, entry } => {
                let dir = entry.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
                let mut candidates = vec![join_entry(dir, path)];
                candidates.extend(
                    self.search_paths
                        .iter()
                        .map(|root| join_entry(&root.to_string_lossy(), path)),
                );
                candidates.push(join_entry("", path));

                for candidate in candidates {
                    match normalize_entry(&candidate) {
                        Some(normalized) if archive.contains(&normalized) => {
                            return Ok(Location::Entry {
                                archive: archive.clone(),
                                entry: normalized,
                            });
                        }
                        Some(normalized) => tried.push(normalized),
                        None => tried.push(candidate),
                    }
                }
            }
            Location::File(file) => {
                let base = file.parent().unwrap_or(Path::new("."));
                if let Some(found) = self.locate_on_disk(base, path, &mut tried) {
                    return Ok(found);
                }
            }
            Location::Directory(dir) => {
                if let Some(found) = self.locate_on_disk(dir, path, &mut tried) {
                    return Ok(found);
                }
            }
        }

        Err(ResolveError::TargetNotFound {
            reference: reference.to_string(),
            from: frame.location.to_string(),
            tried,
        })
    }

    fn locate_on_disk(&self, base: &Path, path: &str, tried: &mut Vec<String>) -> Option<Location> {
        let candidates =
            std::iter::once(base.join(path)).chain(self.search_paths.iter().map(|root| root.join(path)));
        for candidate in candidates {
            if candidate.is_file() {
                let canonical = candidate.canonicalize().unwrap_or(candidate);
                return Some(Location::File(canonical));
            }
            tried.push(candidate.display().to_string());
        }
        None
    }

    /// Replace the referencing node's content with the inlined target,
    /// keeping the referencing node's other keys.
    fn splice(&mut self, id: NodeId, imported: NodeId, reference: &str) {
        let mut host = self.document.mapping(id).cloned().unwrap_or_default();
        host.remove(REF_KEY);

        let merged = match self.document.node(imported).clone() {
            Node::Mapping(target) => {
                for (key, value) in target.iter() {
                    host.insert_if_absent(key, value);
                }
                Node::Mapping(host)
            }
            other => {
                if !host.is_empty() {
                    warn!(
                        reference,
                        kind = other.kind_name(),
                        dropped = host.len(),
                        "non-mapping reference target replaces sibling keys"
                    );
                    self.report.dropped_siblings.push(reference.to_string());
                }
                other
            }
        };
        self.document.replace(id, merged);
        self.document.mark_inlined(id);

        // A target that registered itself while being walked now lives at `id`.
        if let Some(name) = self.document.registered_name(imported).map(str::to_string) {
            let registry = self.document.ensure_schema_registry();
            if let Some(map) = self.document.mapping_mut(registry) {
                map.insert(name, id);
            }
        }
    }

    fn register(&mut self, name: &str, id: NodeId) {
        if self.document.registered_name(id).is_some() {
            return;
        }
        if self.document.register_schema(name, id) {
            debug!(name, "registered schema");
            self.report.registered.push(name.to_string());
        }
    }

    /// Rewrite a reference that re-enters an in-progress target into an
    /// internal reference to the name that target is registered under.
    fn break_cycle(&mut self, id: NodeId, target: NodeId, name: &str) {
        let name = match self.document.registered_name(target) {
            Some(existing) => existing.to_string(),
            None => {
                let free = self.free_name(name);
                self.document.register_schema(&free, target);
                self.report.registered.push(free.clone());
                free
            }
        };
        debug!(name, "reference cycle rewritten to internal reference");
        self.rewrite_ref(id, &name);
    }

    /// Make the internal reference at `id` name the component `node` is
    /// registered under, when that differs from the name it was written with.
    fn point_at(&mut self, id: NodeId, node: NodeId, written: &str) {
        let Some(name) = self.document.registered_name(node).map(str::to_string) else {
            return;
        };
        if name != written {
            debug!(written, name, "internal reference redirected");
            self.rewrite_ref(id, &name);
        }
    }

    fn rewrite_ref(&mut self, id: NodeId, name: &str) {
        let internal = format!("{}{}", SCHEMA_REF_PREFIX, escape_pointer_segment(name));
        let value = self.document.alloc(Node::Scalar(Scalar::String(internal)));
        if let Some(map) = self.document.mapping_mut(id) {
            map.insert(REF_KEY, value);
        }
    }

    /// Whether the component `existing` already stands for the target at
    /// `key`: it is a pending reference to that same target, or it has the
    /// same content.
    fn same_target(&self, existing: NodeId, key: &str, source: &Document, target: NodeId) -> bool {
        if let Some(pending) = self.pending_key(existing) {
            return pending == key;
        }
        self.document.to_json(existing) == source.to_json(target)
    }

    /// Target key of a root-document external reference not yet inlined.
    fn pending_key(&self, id: NodeId) -> Option<String> {
        let reference = self.document.reference(id)?;
        let Reference::External { path, pointer } = Reference::parse(reference) else {
            return None;
        };
        let frame = Frame {
            location: self.root.clone()?,
            source: None,
        };
        let target = self.locate(path, reference, &frame).ok()?;
        Some(target_key(&target, pointer))
    }

    fn free_name(&self, base: &str) -> String {
        if self.document.named_schema(base).is_none() {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{}{}", base, n))
            .find(|candidate| self.document.named_schema(candidate).is_none())
            .unwrap_or_else(|| base.to_string())
    }

    fn in_progress(&self, key: &str) -> Option<NodeId> {
        self.active
            .iter()
            .rev()
            .find(|target| target.key == key)
            .map(|target| target.node)
    }

    fn enter(&mut self, key: String, node: NodeId) {
        self.active.push(ActiveTarget {
            key,
            node,
            remaining: self.limits.max_nodes,
            exhausted: false,
        });
    }

    /// Count a visited node against the innermost target's budget.
    fn charge_node(&mut self) -> bool {
        let max_nodes = self.limits.max_nodes;
        let Some(target) = self.active.last_mut() else {
            return true;
        };
        if target.remaining > 0 {
            target.remaining -= 1;
            return true;
        }
        if !target.exhausted {
            target.exhausted = true;
            let limit = SoftLimit::nodes(max_nodes, target.key.clone());
            warn!(%limit, "abandoning the rest of an oversized reference target");
            self.report.limits.push(limit);
        }
        false
    }

    fn depth_exceeded(&mut self, reference: &str) {
        let limit = SoftLimit::depth(self.limits.max_depth, reference);
        warn!(%limit, "reference nesting too deep, leaving reference unresolved");
        self.report.limits.push(limit);
    }
}

/// Identity of a reference target across the active path.
fn target_key(location: &Location, pointer: &str) -> String {
    format!("{}#{}", location, pointer.trim_start_matches('#'))
}

/// Name a target is registered under: the last pointer segment, else the
/// file stem.
fn registration_name(pointer: &str, location: &Location) -> String {
    if let Some(last) = pointer.rsplit('/').find(|segment| !segment.is_empty()) {
        return unescape_pointer_segment(last);
    }
    let stem = match location {
        Location::File(path) | Location::Directory(path) => path.file_stem(),
        Location::Entry { entry, .. } => Path::new(entry).file_stem(),
    };
    stem.and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("Schema")
        .to_string()
}

/// Pointer into a definitions container (`#/definitions/X`, `#/$defs/X`, ...).
fn is_definition_pointer(fragment: &str) -> bool {
    let segments: Vec<&str> = fragment.split('/').filter(|s| !s.is_empty()).collect();
    matches!(
        segments.as_slice(),
        [.., "definitions" | "$defs" | "schemas", _]
    )
}

fn join_entry(dir: &str, path: &str) -> String {
    if dir.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", dir, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn reference_classification() {
        assert_eq!(
            Reference::parse("#/components/schemas/User"),
            Reference::Internal("#/components/schemas/User")
        );
        assert_eq!(
            Reference::parse("models/User.yaml"),
            Reference::External {
                path: "models/User.yaml",
                pointer: ""
            }
        );
        assert_eq!(
            Reference::parse("common.JSON#/components/schemas/Error"),
            Reference::External {
                path: "common.JSON",
                pointer: "/components/schemas/Error"
            }
        );
        assert_eq!(
            Reference::parse("https://example.com/schemas/User.yaml"),
            Reference::Unsupported
        );
        assert_eq!(Reference::parse("User"), Reference::Unsupported);
    }

    #[test]
    fn registration_names() {
        let file = Location::file("models/Users.yaml");
        assert_eq!(registration_name("", &file), "Users");
        assert_eq!(registration_name("/components/schemas/Error", &file), "Error");
        assert_eq!(registration_name("/definitions/a~1b", &file), "a/b");
    }

    #[test]
    fn definition_pointers() {
        assert!(is_definition_pointer("/definitions/Pet"));
        assert!(is_definition_pointer("/$defs/Pet"));
        assert!(is_definition_pointer("/components/schemas/Pet"));
        assert!(!is_definition_pointer("/properties/pet"));
        assert!(!is_definition_pointer("/definitions"));
    }

    #[test]
    fn root_internal_references_are_left_alone() {
        let mut doc = Document::from_json(&json!({
            "openapi": "3.0.0",
            "paths": {},
            "components": { "schemas": {
                "A": { "$ref": "#/components/schemas/B" },
                "B": { "type": "string" }
            } }
        }));
        let before = doc.to_json(doc.root());
        let report =
            resolve_references(&mut doc, &Location::directory("."), &ResolveOptions::new()).unwrap();
        assert_eq!(report.inlined, 0);
        assert_eq!(doc.to_json(doc.root()), before);
    }

    #[test]
    fn context_prepares_the_document_itself() {
        let options = ResolveOptions::new();
        let location = Location::directory(".");

        let mut empty = crate::loader::parse_content("null", Some("empty.json")).unwrap();
        ResolutionContext::new(&mut empty, &options).resolve(&location).unwrap();
        assert_eq!(empty.to_json(empty.root()), json!({}));

        let mut api = Document::from_json(&json!({ "openapi": "3.0.0", "paths": {} }));
        ResolutionContext::new(&mut api, &options).resolve(&location).unwrap();
        assert!(api.schema_registry().is_some());
    }

    #[test]
    fn sibling_keys_survive_inlining() {
        let dir = TempDir::new().unwrap();
        write(&dir, "Pet.yaml", "type: object\ndescription: from file\nproperties:\n  name: { type: string }\n");
        let root = write(
            &dir,
            "openapi.yaml",
            "openapi: 3.0.0\npaths: {}\ncomponents:\n  schemas:\n    Pet:\n      $ref: Pet.yaml\n      description: local\n",
        );
        let mut doc = crate::loader::parse(&root).unwrap();
        resolve_references(&mut doc, &Location::file(&root), &ResolveOptions::new()).unwrap();

        let pet = doc.named_schema("Pet").unwrap();
        assert!(doc.reference(pet).is_none());
        assert!(doc.was_inlined(pet));
        assert_eq!(doc.get_str(pet, "description"), Some("local"));
        assert_eq!(doc.get_str(pet, "type"), Some("object"));
    }

    #[test]
    fn missing_target_is_a_hard_error() {
        let dir = TempDir::new().unwrap();
        let root = write(
            &dir,
            "openapi.yaml",
            "openapi: 3.0.0\npaths: {}\ncomponents:\n  schemas:\n    Pet: { $ref: missing/Pet.yaml }\n",
        );
        let mut doc = crate::loader::parse(&root).unwrap();
        let result = resolve_references(&mut doc, &Location::file(&root), &ResolveOptions::new());
        match result {
            Err(ResolveError::TargetNotFound { reference, tried, .. }) => {
                assert_eq!(reference, "missing/Pet.yaml");
                assert_eq!(tried.len(), 1);
            }
            other => panic!("expected TargetNotFound, got {:?}", other),
        }
    }

    #[test]
    fn missing_pointer_is_a_hard_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "common.yaml", "components:\n  schemas:\n    Error: { type: object }\n");
        let root = write(
            &dir,
            "openapi.yaml",
            "openapi: 3.0.0\npaths: {}\ncomponents:\n  schemas:\n    Oops: { $ref: 'common.yaml#/components/schemas/Missing' }\n",
        );
        let mut doc = crate::loader::parse(&root).unwrap();
        let result = resolve_references(&mut doc, &Location::file(&root), &ResolveOptions::new());
        assert!(matches!(result, Err(ResolveError::PointerNotFound { .. })));
    }

    #[test]
    fn unparsable_target_is_a_hard_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "Broken.json", "{ nope");
        let root = write(
            &dir,
            "openapi.yaml",
            "openapi: 3.0.0\npaths: {}\ncomponents:\n  schemas:\n    Broken: { $ref: Broken.json }\n",
        );
        let mut doc = crate::loader::parse(&root).unwrap();
        let result = resolve_references(&mut doc, &Location::file(&root), &ResolveOptions::new());
        assert!(matches!(result, Err(ResolveError::TargetUnreadable { .. })));
    }

    #[test]
    fn unsupported_references_are_kept() {
        let mut doc = Document::from_json(&json!({
            "openapi": "3.0.0",
            "paths": {},
            "components": { "schemas": {
                "Remote": { "$ref": "https://example.com/Remote.yaml" }
            } }
        }));
        resolve_references(&mut doc, &Location::directory("."), &ResolveOptions::new()).unwrap();
        let remote = doc.named_schema("Remote").unwrap();
        assert_eq!(doc.reference(remote), Some("https://example.com/Remote.yaml"));
    }
}
