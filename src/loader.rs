//! Document loading from various sources.
//!
//! Handles loading API descriptions from files, strings, and ZIP archive
//! entries, in either JSON or YAML.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::ParseError;
use crate::node::{Document, Mapping, Node, NodeId, Scalar};
use crate::types::{DocumentKind, Format, API_DESCRIPTION_KEYS, SERVICE_LEVEL_KEYS};

/// Name used in errors for content without a name hint.
const ANONYMOUS_SOURCE: &str = "<memory>";

/// Where a document lives. Relative references are resolved against it.
#[derive(Debug, Clone)]
pub enum Location {
    /// A file on disk.
    File(PathBuf),
    /// An entry inside an archive. Lookups for this document stay inside it.
    Entry {
        archive: Arc<Archive>,
        entry: String,
    },
    /// A document without a file of its own (e.g. parsed from a string),
    /// resolving relative references against this directory.
    Directory(PathBuf),
}

impl Location {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Location::File(path.into())
    }

    pub fn entry(archive: Arc<Archive>, entry: &str) -> Self {
        Location::Entry {
            entry: normalize_entry(entry).unwrap_or_else(|| entry.to_string()),
            archive,
        }
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Location::Directory(path.into())
    }

    /// The archive this location is confined to, if any.
    pub fn archive(&self) -> Option<&Arc<Archive>> {
        match self {
            Location::Entry { archive, .. } => Some(archive),
            _ => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::File(path) | Location::Directory(path) => write!(f, "{}", path.display()),
            Location::Entry { archive, entry } => write!(f, "{}!/{}", archive.name(), entry),
        }
    }
}

/// A ZIP archive of API description files, read once into memory.
///
/// Only entries with a recognized document extension are kept. Entry names
/// use forward slashes.
#[derive(Debug)]
pub struct Archive {
    name: String,
    entries: BTreeMap<String, String>,
}

impl Archive {
    /// Open an archive from disk.
    pub fn open(path: &Path) -> Result<Self, ParseError> {
        if !path.exists() {
            return Err(ParseError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let file = std::fs::File::open(path).map_err(|source| ParseError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(&path.display().to_string(), file)
    }

    /// Read an archive already held in memory.
    pub fn from_bytes(name: &str, bytes: Vec<u8>) -> Result<Self, ParseError> {
        Self::from_reader(name, Cursor::new(bytes))
    }

    fn from_reader<R: Read + Seek>(name: &str, reader: R) -> Result<Self, ParseError> {
        let mut zip = zip::ZipArchive::new(reader).map_err(|source| ParseError::ArchiveError {
            path: name.to_string(),
            source,
        })?;

        let mut entries = BTreeMap::new();
        for i in 0..zip.len() {
            let mut file = zip
                .by_index(i)
                .map_err(|source| ParseError::ArchiveError {
                    path: name.to_string(),
                    source,
                })?;
            if file.is_dir() || Format::from_name(file.name()).is_none() {
                continue;
            }
            let Some(entry) = normalize_entry(file.name()) else {
                continue;
            };
            let mut content = String::new();
            file.read_to_string(&mut content)
                .map_err(|source| ParseError::ReadError {
                    path: PathBuf::from(&entry),
                    source,
                })?;
            entries.insert(entry, content);
        }

        debug!(archive = name, entries = entries.len(), "opened archive");
        Ok(Self {
            name: name.to_string(),
            entries,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contains(&self, entry: &str) -> bool {
        normalize_entry(entry).is_some_and(|e| self.entries.contains_key(&e))
    }

    pub fn entry_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    /// Text of an entry. The name is normalized first.
    pub fn read_entry(&self, entry: &str) -> Result<&str, ParseError> {
        let normalized = normalize_entry(entry).ok_or_else(|| ParseError::EntryOutsideArchive {
            entry: entry.to_string(),
        })?;
        self.entries
            .get(&normalized)
            .map(String::as_str)
            .ok_or_else(|| ParseError::EntryNotFound {
                archive: self.name.clone(),
                entry: normalized,
            })
    }
}

/// Normalize an archive entry path: forward slashes, no `.` segments,
/// `..` applied lexically. Returns `None` when the path climbs above the root.
pub fn normalize_entry(entry: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for part in entry.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

/// Load a document from a file path.
///
/// # Errors
///
/// Returns `ParseError::FileNotFound` if the file doesn't exist, or a content
/// error if it is neither valid JSON nor valid YAML for its detected format.
pub fn parse(path: &Path) -> Result<Document, ParseError> {
    if !path.exists() {
        return Err(ParseError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| ParseError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), bytes = content.len(), "parsing document");
    parse_content(&content, path.to_str())
}

/// Load a document from an in-memory string.
///
/// The format comes from `name_hint`'s extension when it has a recognized
/// one, otherwise from the leading content characters.
pub fn parse_content(text: &str, name_hint: Option<&str>) -> Result<Document, ParseError> {
    let name = name_hint.unwrap_or(ANONYMOUS_SOURCE);
    if text.trim().is_empty() {
        return Ok(Document::new());
    }

    let format = name_hint
        .and_then(Format::from_name)
        .unwrap_or_else(|| Format::sniff(text));

    match format {
        Format::Json => {
            let value: Value =
                serde_json::from_str(text).map_err(|source| ParseError::InvalidJson {
                    name: name.to_string(),
                    source,
                })?;
            Ok(Document::from_json(&value))
        }
        Format::Yaml => {
            let mut value: serde_yaml::Value =
                serde_yaml::from_str(text).map_err(|source| ParseError::InvalidYaml {
                    name: name.to_string(),
                    source,
                })?;
            value
                .apply_merge()
                .map_err(|source| ParseError::InvalidYaml {
                    name: name.to_string(),
                    source,
                })?;
            let mut doc = Document::new();
            let root = alloc_yaml(&mut doc, &value, name)?;
            doc.set_root(root);
            Ok(doc)
        }
    }
}

/// Load a document from an archive entry.
pub fn parse_entry(archive: &Archive, entry: &str) -> Result<Document, ParseError> {
    let content = archive.read_entry(entry)?;
    debug!(archive = archive.name(), entry, "parsing archive entry");
    parse_content(content, Some(entry))
}

/// Load the document a location points at.
///
/// A `Directory` location has no content of its own and yields a read error.
pub fn parse_location(location: &Location) -> Result<Document, ParseError> {
    match location {
        Location::File(path) => parse(path),
        Location::Entry { archive, entry } => parse_entry(archive, entry),
        Location::Directory(path) => Err(ParseError::ReadError {
            path: path.clone(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "location is a directory, not a document",
            ),
        }),
    }
}

fn alloc_yaml(doc: &mut Document, value: &serde_yaml::Value, name: &str) -> Result<NodeId, ParseError> {
    use serde_yaml::Value as Yaml;

    let node = match value {
        Yaml::Null => Node::Scalar(Scalar::Null),
        Yaml::Bool(b) => Node::Scalar(Scalar::Bool(*b)),
        Yaml::Number(n) => Node::Scalar(match n.as_i64() {
            Some(i) => Scalar::Integer(i),
            None => Scalar::Float(n.as_f64().unwrap_or(f64::NAN)),
        }),
        Yaml::String(s) => Node::Scalar(Scalar::String(s.clone())),
        Yaml::Sequence(items) => Node::Sequence(
            items
                .iter()
                .map(|item| alloc_yaml(doc, item, name))
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Mapping(entries) => {
            let mut map = Mapping::new();
            for (key, child) in entries {
                let key = yaml_key(key, name)?;
                let child = alloc_yaml(doc, child, name)?;
                map.insert(key, child);
            }
            Node::Mapping(map)
        }
        // Tags carry no meaning for API descriptions.
        Yaml::Tagged(tagged) => return alloc_yaml(doc, &tagged.value, name),
    };
    Ok(doc.alloc(node))
}

/// YAML allows non-string keys (`200:` response codes); stringify scalars.
fn yaml_key(key: &serde_yaml::Value, name: &str) -> Result<String, ParseError> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s.clone()),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        Yaml::Tagged(tagged) => yaml_key(&tagged.value, name),
        Yaml::Sequence(_) | Yaml::Mapping(_) => Err(ParseError::InvalidKey {
            name: name.to_string(),
            actual: if key.is_sequence() { "sequence" } else { "mapping" }.to_string(),
        }),
    }
}

/// Classify a document by its distinguishing top-level keys.
///
/// An API description wins when both kinds of keys are present.
pub fn detect_kind(doc: &Document) -> DocumentKind {
    let Some(root) = doc.mapping(doc.root()) else {
        return DocumentKind::Unknown;
    };
    if API_DESCRIPTION_KEYS.iter().any(|k| root.contains_key(k)) {
        DocumentKind::ApiDescription
    } else if SERVICE_LEVEL_KEYS.iter().any(|k| root.contains_key(k)) {
        DocumentKind::ServiceLevel
    } else {
        DocumentKind::Unknown
    }
}

pub fn is_api_description(doc: &Document) -> bool {
    detect_kind(doc) == DocumentKind::ApiDescription
}

pub fn is_service_level(doc: &Document) -> bool {
    detect_kind(doc) == DocumentKind::ServiceLevel
}
