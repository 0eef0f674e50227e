//! Error types for loading and resolving API descriptions.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors turning a source into a [`Document`](crate::Document).
#[derive(Debug, Error)]
pub enum ParseError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open archive {path}: {source}")]
    ArchiveError {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("entry not found in archive {archive}: {entry}")]
    EntryNotFound { archive: String, entry: String },

    #[error("entry escapes archive root: {entry}")]
    EntryOutsideArchive { entry: String },

    // Content errors (exit code 2)
    #[error("invalid JSON in {name}: {source}")]
    InvalidJson {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML in {name}: {source}")]
    InvalidYaml {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unsupported mapping key in {name}: expected scalar, got {actual}")]
    InvalidKey { name: String, actual: String },
}

impl ParseError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ParseError::FileNotFound { .. }
            | ParseError::ReadError { .. }
            | ParseError::ArchiveError { .. }
            | ParseError::EntryNotFound { .. }
            | ParseError::EntryOutsideArchive { .. } => 3,
            _ => 2,
        }
    }
}

/// Hard failures of reference resolution. Any of these aborts the whole call.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("cannot locate {reference} referenced from {from} (tried: {})", .tried.join(", "))]
    TargetNotFound {
        reference: String,
        from: String,
        tried: Vec<String>,
    },

    #[error("cannot load {reference} referenced from {from}: {source}")]
    TargetUnreadable {
        reference: String,
        from: String,
        #[source]
        source: ParseError,
    },

    #[error("pointer {pointer} not found in {target}")]
    PointerNotFound { target: String, pointer: String },
}

impl ResolveError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ResolveError::TargetUnreadable { source, .. } => source.exit_code(),
            _ => 2,
        }
    }
}

/// Which ceiling a traversal ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    Depth,
    NodeCount,
}

/// A soft bound that made a walk abandon one branch.
///
/// These are continuable: the pass finishes with a partially explored graph
/// and reports every branch it gave up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftLimit {
    pub kind: LimitKind,
    pub limit: usize,
    /// Where the branch was abandoned (pointer or reference string).
    pub at: String,
}

impl SoftLimit {
    pub fn depth(limit: usize, at: impl Into<String>) -> Self {
        Self {
            kind: LimitKind::Depth,
            limit,
            at: at.into(),
        }
    }

    pub fn nodes(limit: usize, at: impl Into<String>) -> Self {
        Self {
            kind: LimitKind::NodeCount,
            limit,
            at: at.into(),
        }
    }
}

impl fmt::Display for SoftLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            LimitKind::Depth => "depth",
            LimitKind::NodeCount => "node count",
        };
        write!(f, "{} ceiling {} reached at {}", what, self.limit, self.at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_exit_codes() {
        let err = ParseError::FileNotFound {
            path: PathBuf::from("openapi.yaml"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = ParseError::InvalidKey {
            name: "openapi.yaml".into(),
            actual: "sequence".into(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn resolve_error_exit_codes() {
        let err = ResolveError::TargetNotFound {
            reference: "models/User.yaml".into(),
            from: "openapi.yaml".into(),
            tried: vec!["models/User.yaml".into()],
        };
        assert_eq!(err.exit_code(), 2);

        let err = ResolveError::TargetUnreadable {
            reference: "models/User.yaml".into(),
            from: "openapi.yaml".into(),
            source: ParseError::FileNotFound {
                path: PathBuf::from("models/User.yaml"),
            },
        };
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn target_not_found_lists_candidates() {
        let err = ResolveError::TargetNotFound {
            reference: "User.yaml".into(),
            from: "api/openapi.yaml".into(),
            tried: vec!["api/User.yaml".into(), "shared/User.yaml".into()],
        };
        assert_eq!(
            err.to_string(),
            "cannot locate User.yaml referenced from api/openapi.yaml (tried: api/User.yaml, shared/User.yaml)"
        );
    }

    #[test]
    fn soft_limit_display() {
        let limit = SoftLimit::depth(15, "models/Deep.yaml");
        assert_eq!(limit.to_string(), "depth ceiling 15 reached at models/Deep.yaml");
    }
}
