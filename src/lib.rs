//! Schema graph engine for multi-file API descriptions
//!
//! Loads an API description split across files (or bundled in a ZIP
//! archive), inlines its external references, and answers the questions code
//! generators ask of the resulting graph.
//!
//! # Example
//!
//! ```
//! use oas_graph::{
//!     collect_referenced_schema_names, effective_schema, parse_content, resolve_references,
//!     Location, ResolveOptions,
//! };
//!
//! let mut doc = parse_content(
//!     r##"
//! openapi: 3.0.3
//! paths:
//!   /orders:
//!     get:
//!       responses:
//!         "200":
//!           content:
//!             application/json:
//!               schema:
//!                 type: array
//!                 items: { $ref: "#/components/schemas/Order" }
//! components:
//!   schemas:
//!     Order:
//!       allOf:
//!         - type: object
//!           properties: { id: { type: string } }
//!           required: [id]
//!         - properties: { total: { type: number } }
//!     Draft: { type: object }
//! "##,
//!     Some("openapi.yaml"),
//! )
//! .unwrap();
//!
//! // Resolves nothing here: internal references stay as written.
//! let report = resolve_references(&mut doc, &Location::directory("."), &ResolveOptions::new()).unwrap();
//! assert_eq!(report.inlined, 0);
//!
//! let order = doc.named_schema("Order").unwrap();
//! let merged = effective_schema(&doc, order);
//! assert_eq!(merged.properties(&doc).len(), 2);
//! assert_eq!(merged.required(&doc), vec!["id"]);
//!
//! let reachable = collect_referenced_schema_names(&doc);
//! assert!(reachable.contains("Order"));
//! assert!(!reachable.contains("Draft"));
//! ```
//!
//! # Passes
//!
//! | Pass | Entry point | Mutates |
//! |------|-------------|---------|
//! | Reference resolution | [`resolve_references`] | yes |
//! | Composition merging | [`effective_schema`] | no |
//! | Inline schema naming | [`collect_inlined_schemas`] | no |
//! | Reachability | [`collect_referenced_schema_names`] | no |
//!
//! Resolution must finish before the read-only passes run.

mod compose;
mod error;
mod loader;
mod naming;
mod node;
mod reachability;
mod resolver;
mod types;

pub use compose::{
    effective_schema, effective_schema_at, has_composition, resolve_schema_ref, EffectiveSchema,
    MergedSchema,
};
pub use error::{LimitKind, ParseError, ResolveError, SoftLimit};
pub use loader::{
    detect_kind, is_api_description, is_service_level, normalize_entry, parse, parse_content,
    parse_entry, parse_location, Archive, Location,
};
pub use naming::{
    collect_inlined_schemas, collect_inlined_schemas_with_limits, sanitize_identifier,
    InlineSchemaNames, NameCollision,
};
pub use node::{
    escape_pointer_segment, unescape_pointer_segment, Document, Mapping, Node, NodeId, Scalar,
};
pub use reachability::{collect_referenced_schema_names, collect_with_limits, Reachability};
pub use resolver::{resolve_references, Reference, ResolutionContext, ResolveReport};
pub use types::{schema_ref_name, DocumentKind, Format, Limits, ResolveOptions};
