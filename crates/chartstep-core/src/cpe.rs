//! Common Pipeline Environment (CPE) store
//!
//! Earlier pipeline steps persist their outputs as a directory tree: every
//! regular file is one key (its path relative to the root, `/`-joined) and
//! its content is the value. Files ending in `.json` hold structured values.
//!
//! ```text
//! .pipeline/commonPipelineEnvironment/
//!   artifactVersion                 -> Scalar("1.4.2")
//!   container/imageNames.json       -> List(["app", "sidecar"])
//!   custom/nativeBuild.json         -> Scalar("true")
//! ```
//!
//! The store is loaded once and is read-only afterwards. Looking up a key
//! that was never written yields `CpeValue::Absent`, never an error.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt;
use std::path::{Component, Path};
use walkdir::WalkDir;

use crate::error::{CoreError, Result};

/// Directory name of the CPE below the environment root path
pub const DEFAULT_CPE_DIR: &str = "commonPipelineEnvironment";

const JSON_SUFFIX: &str = ".json";

/// A value stored under one CPE key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CpeValue {
    /// Lookup result for a key that does not exist (never stored)
    Absent,
    Scalar(String),
    List(Vec<String>),
    Mapping(IndexMap<String, CpeValue>),
}

static ABSENT: CpeValue = CpeValue::Absent;

impl CpeValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, CpeValue::Absent)
    }

    /// The scalar content, if this is a scalar
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            CpeValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            CpeValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&IndexMap<String, CpeValue>> {
        match self {
            CpeValue::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Convert a decoded JSON document into a CPE value
    ///
    /// Returns `None` for `null`, which earlier steps write to clear a key.
    pub fn from_json(value: JsonValue) -> Option<Self> {
        match value {
            JsonValue::Null => None,
            JsonValue::String(s) => Some(CpeValue::Scalar(s)),
            JsonValue::Bool(b) => Some(CpeValue::Scalar(b.to_string())),
            JsonValue::Number(n) => Some(CpeValue::Scalar(n.to_string())),
            JsonValue::Array(items) => Some(CpeValue::List(
                items
                    .into_iter()
                    .filter(|item| !item.is_null())
                    .map(|item| match item {
                        JsonValue::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
            )),
            JsonValue::Object(obj) => Some(CpeValue::Mapping(
                obj.into_iter()
                    .filter_map(|(k, v)| Self::from_json(v).map(|v| (k, v)))
                    .collect(),
            )),
        }
    }
}

impl fmt::Display for CpeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpeValue::Absent => Ok(()),
            CpeValue::Scalar(s) => f.write_str(s),
            other => {
                let json = serde_json::to_string(other).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

/// In-memory view of the Common Pipeline Environment for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpeStore {
    entries: IndexMap<String, CpeValue>,
}

impl CpeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from already decoded entries
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, CpeValue)>,
        K: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .filter(|(_, v)| !v.is_absent())
                .map(|(k, v)| (k.into(), v))
                .collect(),
        }
    }

    /// Load the store from a persisted directory tree
    ///
    /// A missing root is a valid, empty environment. Entries that cannot be
    /// read or decoded are skipped with a warning so the step can proceed
    /// with whatever earlier steps did produce.
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();

        if !root.exists() {
            tracing::warn!(
                "pipeline environment {} does not exist, continuing with an empty environment",
                root.display()
            );
            return Ok(Self::new());
        }
        if !root.is_dir() {
            return Err(CoreError::NotADirectory {
                path: root.to_path_buf(),
            });
        }

        let mut entries = IndexMap::new();

        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    // The root itself vanishing mid-walk is not recoverable
                    if e.depth() == 0 {
                        return Err(CoreError::Walk {
                            path: root.to_path_buf(),
                            message: e.to_string(),
                        });
                    }
                    tracing::warn!("skipping unreadable pipeline environment entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let Some(key) = relative_key(root, entry.path()) else {
                tracing::warn!(
                    "skipping pipeline environment entry with unusable path {}",
                    entry.path().display()
                );
                continue;
            };

            if let Some((key, value)) = read_entry(entry.path(), key) {
                if entries.insert(key.clone(), value).is_some() {
                    tracing::warn!(
                        "pipeline environment key '{}' is stored twice, keeping {}",
                        key,
                        entry.path().display()
                    );
                }
            }
        }

        tracing::debug!(
            "loaded {} pipeline environment entries from {}",
            entries.len(),
            root.display()
        );

        Ok(Self { entries })
    }

    /// Look up a key; missing keys yield `CpeValue::Absent`
    pub fn get(&self, path: &str) -> &CpeValue {
        self.entries.get(path).unwrap_or(&ABSENT)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Read-only view of every entry in load order
    pub fn as_mapping(&self) -> &IndexMap<String, CpeValue> {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CpeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the `/`-joined key of a file relative to the store root
fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?.to_string()),
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Read and decode one entry, logging and skipping anything malformed
fn read_entry(path: &Path, key: String) -> Option<(String, CpeValue)> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(
                "skipping pipeline environment entry {}: {}",
                path.display(),
                e
            );
            return None;
        }
    };

    let Some(stripped) = key.strip_suffix(JSON_SUFFIX) else {
        return Some((key, CpeValue::Scalar(content)));
    };

    match serde_json::from_str::<JsonValue>(&content) {
        Ok(json) => CpeValue::from_json(json).map(|value| (stripped.to_string(), value)),
        Err(e) => {
            tracing::warn!(
                "skipping malformed JSON pipeline environment entry {}: {}",
                path.display(),
                e
            );
            None
        }
    }
}
