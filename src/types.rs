//! Core types and constants shared by the resolution passes.

use std::path::PathBuf;

use crate::node::unescape_pointer_segment;

/// Reference key on schema mappings.
pub const REF_KEY: &str = "$ref";

/// Prefix of internal references into the schema registry.
pub const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

/// Prefix of internal references into the response registry.
pub const RESPONSE_REF_PREFIX: &str = "#/components/responses/";

pub const COMPONENTS_KEY: &str = "components";
pub const SCHEMAS_KEY: &str = "schemas";
pub const RESPONSES_KEY: &str = "responses";
pub const PATHS_KEY: &str = "paths";

/// Intersection keyword.
pub const ALL_OF: &str = "allOf";

/// Union keywords (exclusive first).
pub const UNION_KEYWORDS: &[&str] = &["oneOf", "anyOf"];

/// All composition keywords.
pub const COMPOSITION_KEYWORDS: &[&str] = &["allOf", "oneOf", "anyOf"];

/// Operation keys of a path item.
pub const HTTP_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// File extensions recognized on external references.
pub const REFERENCE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Top-level keys marking an API description.
pub const API_DESCRIPTION_KEYS: &[&str] = &["openapi", "swagger", "paths"];

/// Top-level keys marking an SLA/NFR description.
pub const SERVICE_LEVEL_KEYS: &[&str] = &["sla", "slos", "nfr", "nfrs"];

/// Component name of an internal `#/components/schemas/Name` reference.
pub fn schema_ref_name(reference: &str) -> Option<String> {
    reference
        .strip_prefix(SCHEMA_REF_PREFIX)
        .filter(|name| !name.is_empty() && !name.contains('/'))
        .map(unescape_pointer_segment)
}

/// Data-interchange format of a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Format implied by a file name's extension, if recognized.
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }

    /// Format implied by the first non-whitespace character.
    pub fn sniff(content: &str) -> Self {
        match content.trim_start().chars().next() {
            Some('{') | Some('[') => Format::Json,
            _ => Format::Yaml,
        }
    }
}

/// What a top-level document describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    ApiDescription,
    ServiceLevel,
    Unknown,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::ApiDescription => "api",
            DocumentKind::ServiceLevel => "sla",
            DocumentKind::Unknown => "unknown",
        }
    }
}

/// Recursion-depth and size ceilings for one traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_depth: usize,
    pub max_nodes: usize,
}

impl Limits {
    pub const fn new(max_depth: usize, max_nodes: usize) -> Self {
        Self {
            max_depth,
            max_nodes,
        }
    }

    /// Reference following: nested external targets and nodes per target.
    pub const RESOLVER: Limits = Limits::new(15, 10_000);

    /// Composition merging. The node ceiling is unused here.
    pub const COMPOSITION: Limits = Limits::new(10, usize::MAX);

    /// Inline naming walk over component schemas.
    pub const NAMING: Limits = Limits::new(100, 50_000);

    /// Reachability walk: depth and nodes per seed.
    pub const REACHABILITY: Limits = Limits::new(64, 5_000);
}

impl Default for Limits {
    fn default() -> Self {
        Limits::RESOLVER
    }
}

/// Most composition branches walked per keyword while collecting reachability.
pub const MAX_COMPOSITION_BRANCHES: usize = 20;

/// Options for reference resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Additional roots tried, in order, when a relative external reference
    /// is not found next to its referencing document. Inside an archive these
    /// are directories within the archive.
    pub search_paths: Vec<PathBuf>,
    pub limits: Limits,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a search-path root.
    pub fn search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.limits.max_depth = max_depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_ref_names() {
        assert_eq!(schema_ref_name("#/components/schemas/Order").as_deref(), Some("Order"));
        assert_eq!(schema_ref_name("#/components/schemas/a~1b").as_deref(), Some("a/b"));
        assert_eq!(schema_ref_name("#/components/schemas/"), None);
        assert_eq!(schema_ref_name("#/components/schemas/Order/properties/id"), None);
        assert_eq!(schema_ref_name("#/components/responses/NotFound"), None);
    }

    #[test]
    fn format_from_name() {
        assert_eq!(Format::from_name("openapi.yaml"), Some(Format::Yaml));
        assert_eq!(Format::from_name("models/User.YML"), Some(Format::Yaml));
        assert_eq!(Format::from_name("spec.json"), Some(Format::Json));
        assert_eq!(Format::from_name("README"), None);
        assert_eq!(Format::from_name("notes.txt"), None);
    }

    #[test]
    fn format_sniff() {
        assert_eq!(Format::sniff("  {\"a\": 1}"), Format::Json);
        assert_eq!(Format::sniff("\n[1, 2]"), Format::Json);
        assert_eq!(Format::sniff("openapi: 3.0.0"), Format::Yaml);
        assert_eq!(Format::sniff(""), Format::Yaml);
    }

    #[test]
    fn resolve_options_builder() {
        let opts = ResolveOptions::new()
            .search_path("shared")
            .search_path("vendor/schemas")
            .max_depth(4);
        assert_eq!(
            opts.search_paths,
            vec![PathBuf::from("shared"), PathBuf::from("vendor/schemas")]
        );
        assert_eq!(opts.limits.max_depth, 4);
        assert_eq!(opts.limits.max_nodes, Limits::RESOLVER.max_nodes);
    }
}
