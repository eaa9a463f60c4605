//! Artifact coordinates of the chart being deployed

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Name of the chart descriptor inside a chart directory
pub const CHART_DESCRIPTOR: &str = "Chart.yaml";

/// Identity of the deployable unit, produced once per run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactCoordinates {
    pub name: String,
    pub group: String,
    pub version: String,
    pub packaging: String,
}

impl fmt::Display for ArtifactCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}:{}:{}", self.name, self.version, self.packaging)
        } else {
            write!(
                f,
                "{}:{}:{}:{}",
                self.group, self.name, self.version, self.packaging
            )
        }
    }
}

/// Source of artifact coordinates
///
/// Implementations may be expensive (file reads, build tool calls), so
/// callers query them lazily and at most once per run.
pub trait CoordinateOracle: Send + Sync {
    fn coordinates(&self) -> Result<ArtifactCoordinates>;
}

/// Oracle returning fixed coordinates
#[derive(Debug, Clone)]
pub struct StaticOracle(pub ArtifactCoordinates);

impl CoordinateOracle for StaticOracle {
    fn coordinates(&self) -> Result<ArtifactCoordinates> {
        Ok(self.0.clone())
    }
}

/// The subset of `Chart.yaml` chartstep cares about
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDescriptor {
    #[serde(default, deserialize_with = "scalar_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub version: Option<String>,

    /// Every top-level key present in the descriptor
    #[serde(skip)]
    pub keys: Vec<String>,
}

/// Accept any YAML scalar as a string (`version: 1.0` is common unquoted)
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::Null => Ok(None),
        serde_yaml::Value::String(s) => Ok(Some(s)),
        serde_yaml::Value::Number(n) => Ok(Some(n.to_string())),
        serde_yaml::Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(D::Error::custom(format!(
            "expected a scalar, found {:?}",
            other
        ))),
    }
}

impl ChartDescriptor {
    /// Load `<chart_path>/Chart.yaml`
    pub fn load(chart_path: &Path) -> Result<Self> {
        let path = chart_path.join(CHART_DESCRIPTOR);
        let content = std::fs::read_to_string(&path).map_err(|source| CoreError::ReadFile {
            path: path.clone(),
            source,
        })?;

        let raw: serde_yaml::Value = serde_yaml::from_str(&content)?;
        let keys = raw
            .as_mapping()
            .map(|m| {
                m.keys()
                    .filter_map(|k| k.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let mut descriptor: Self =
            serde_yaml::from_value(raw).map_err(|e| CoreError::InvalidDescriptor {
                path: path.clone(),
                message: e.to_string(),
            })?;
        descriptor.keys = keys;
        Ok(descriptor)
    }
}

/// Oracle reading coordinates from the chart's `Chart.yaml`
#[derive(Debug, Clone)]
pub struct ChartDescriptorOracle {
    chart_path: PathBuf,
}

impl ChartDescriptorOracle {
    pub fn new(chart_path: impl Into<PathBuf>) -> Self {
        Self {
            chart_path: chart_path.into(),
        }
    }
}

impl CoordinateOracle for ChartDescriptorOracle {
    fn coordinates(&self) -> Result<ArtifactCoordinates> {
        let descriptor = ChartDescriptor::load(&self.chart_path)?;
        let path = self.chart_path.join(CHART_DESCRIPTOR);

        let name = descriptor
            .name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| CoreError::InvalidDescriptor {
                path: path.clone(),
                message: "missing `name`".to_string(),
            })?;
        let version = descriptor
            .version
            .filter(|v| !v.is_empty())
            .ok_or_else(|| CoreError::InvalidDescriptor {
                path,
                message: "missing `version`".to_string(),
            })?;

        Ok(ArtifactCoordinates {
            name,
            group: String::new(),
            version,
            packaging: "tgz".to_string(),
        })
    }
}
