//! Values files taking part in a deployment

use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Default values file name inside a chart directory
pub const DEFAULT_VALUES_FILE: &str = "values.yaml";

/// Decide which values files are rendered and handed to the deployment tool
///
/// Rules:
/// - With explicit files: the chart's `values.yaml` (if present) comes first,
///   followed by the explicit files in the given order
/// - Without explicit files: the chart's `values.yaml` alone, and it must exist
///
/// Later files override earlier ones when the deployment tool merges them, so
/// the order is significant. A path listed twice is kept at its first position.
pub fn resolve_values_files(chart_path: &Path, explicit: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let default_file = chart_path.join(DEFAULT_VALUES_FILE);
    let default_exists = default_file.is_file();

    if explicit.is_empty() && !default_exists {
        return Err(CoreError::NoValuesFile {
            chart_path: chart_path.to_path_buf(),
        });
    }

    let mut files: Vec<PathBuf> = Vec::with_capacity(explicit.len() + 1);
    if default_exists {
        files.push(default_file);
    }
    for file in explicit {
        if files.contains(file) {
            tracing::debug!("values file {} listed twice, keeping first", file.display());
            continue;
        }
        files.push(file.clone());
    }

    Ok(files)
}

/// A values file and its raw content, held only for one render-then-write cycle
#[derive(Debug, Clone)]
pub struct ValuesFile {
    pub path: PathBuf,
    pub content: String,
}

impl ValuesFile {
    /// Read the file's current on-disk content
    pub fn read(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|source| CoreError::ReadFile {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, content })
    }

    /// Replace the file's content on disk
    pub fn write(&self, rendered: &str) -> Result<()> {
        std::fs::write(&self.path, rendered).map_err(|source| CoreError::WriteFile {
            path: self.path.clone(),
            source,
        })
    }
}
