//! Step telemetry with privacy filtering
//!
//! A `StepTelemetry` accumulates one `Segment` per processed module and is
//! exported exactly once at the end of the run. Values are filtered when they
//! enter a segment, so nothing unfiltered is ever held for export:
//! - builder and buildpack identifiers outside the public allow-list become `<redacted>`
//! - key values are only kept for allow-listed, non-sensitive keys

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::error::Result;

/// Telemetry data format version
pub const TELEMETRY_VERSION: u32 = 3;

/// Label under which the exported data is stored
pub const CUSTOM_DATA_LABEL: &str = "cnbBuildStepData";

/// Replacement for identifiers that must not leave the process
pub const REDACTED: &str = "<redacted>";

static PUBLIC_BUILDPACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?:index\.)?docker\.io/|gcr\.io/)?(?:paketo-buildpacks|paketobuildpacks|heroku|buildpacks)/[a-z0-9._-]+(?:[:@][A-Za-z0-9._:-]+)?$",
    )
    .expect("static regex is valid")
});

static PUBLIC_BUILDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?:index\.)?docker\.io/|gcr\.io/)?(?:paketobuildpacks|heroku|buildpacks)/builder(?:-[a-z0-9.-]+)?(?:[:@][A-Za-z0-9._:-]+)?$",
    )
    .expect("static regex is valid")
});

/// Keys whose values may be reported verbatim
const ALLOWED_ENV_KEYS: &[&str] = &[
    "BP_JVM_VERSION",
    "BP_JVM_TYPE",
    "BP_NODE_VERSION",
    "BP_NODE_RUN_SCRIPTS",
    "BP_MAVEN_BUILD_ARGUMENTS",
    "BP_GRADLE_BUILD_ARGUMENTS",
    "BP_KEEP_FILES",
    "BP_INCLUDE_FILES",
    "BP_EXCLUDE_FILES",
];

/// Keep a builder identifier only if it is a known public builder
pub fn filter_builder(builder: &str) -> String {
    if PUBLIC_BUILDER.is_match(builder) {
        builder.to_string()
    } else {
        REDACTED.to_string()
    }
}

/// Redact every buildpack identifier that is not a known public buildpack
pub fn filter_buildpacks(buildpacks: &[String]) -> Vec<String> {
    buildpacks
        .iter()
        .map(|bp| {
            if PUBLIC_BUILDPACK.is_match(bp) {
                bp.clone()
            } else {
                REDACTED.to_string()
            }
        })
        .collect()
}

/// Drop every key value that is not allow-listed
pub fn filter_env(env: &BTreeMap<String, JsonValue>) -> BTreeMap<String, JsonValue> {
    env.iter()
        .filter(|(k, _)| ALLOWED_ENV_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// How the deployable sources were provided
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcePath {
    #[default]
    Folder,
    Archive,
}

/// Keys and buildpacks contributed by a project descriptor
#[derive(Debug, Clone, Default)]
pub struct DescriptorUsage {
    pub keys: Vec<String>,
    pub buildpacks: Vec<String>,
    pub include_used: bool,
    pub exclude_used: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildEnv {
    pub keys_from_config: Vec<String>,
    pub keys_from_project_descriptor: Vec<String>,
    pub keys_overall: Vec<String>,
    pub jvm_version: String,
    pub key_values: BTreeMap<String, JsonValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Buildpacks {
    #[serde(rename = "FromConfig")]
    pub from_config: Vec<String>,
    #[serde(rename = "FromProjectDescriptor")]
    pub from_project_descriptor: Vec<String>,
    #[serde(rename = "overall")]
    pub overall: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDescriptorFlags {
    pub used: bool,
    pub include_used: bool,
    pub exclude_used: bool,
}

/// Telemetry recorded for one module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub image_tag: String,
    pub additional_tags: Vec<String>,
    pub binding_keys: Vec<String>,
    pub path: SourcePath,
    pub build_env: BuildEnv,
    pub buildpacks: Buildpacks,
    pub project_descriptor: ProjectDescriptorFlags,
    pub build_tool: String,
    pub builder: String,
}

impl Segment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the names (never the values) of the bindings in use
    pub fn with_bindings<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.binding_keys = names.into_iter().map(str::to_string).collect();
        self
    }

    /// Record the keys supplied through step configuration
    ///
    /// Resets both config and overall keys; descriptor keys added later are
    /// appended to the overall list.
    pub fn with_config_keys<'a>(mut self, keys: impl IntoIterator<Item = &'a str>) -> Self {
        let keys: Vec<String> = keys.into_iter().map(str::to_string).collect();
        self.build_env.keys_overall = keys.clone();
        self.build_env.keys_from_config = keys;
        self
    }

    pub fn with_tags(mut self, tag: impl Into<String>, additional: Vec<String>) -> Self {
        self.image_tag = tag.into();
        self.additional_tags = additional;
        self
    }

    pub fn with_path(mut self, path: SourcePath) -> Self {
        self.path = path;
        self
    }

    pub fn with_build_tool(mut self, build_tool: impl Into<String>) -> Self {
        self.build_tool = build_tool.into();
        self
    }

    pub fn with_builder(mut self, builder: &str) -> Self {
        self.builder = filter_builder(builder);
        self
    }

    pub fn with_buildpacks_from_config(mut self, buildpacks: &[String]) -> Self {
        self.buildpacks.from_config = filter_buildpacks(buildpacks);
        self
    }

    pub fn with_buildpacks_overall(mut self, buildpacks: &[String]) -> Self {
        self.buildpacks.overall = filter_buildpacks(buildpacks);
        self
    }

    /// Record allow-listed key values
    pub fn with_key_values(mut self, env: &BTreeMap<String, JsonValue>) -> Self {
        let filtered = filter_env(env);
        if let Some(JsonValue::String(jvm)) = filtered.get("BP_JVM_VERSION") {
            self.build_env.jvm_version = jvm.clone();
        }
        self.build_env.key_values = filtered;
        self
    }

    /// Record what the project descriptor contributed
    pub fn with_project_descriptor(mut self, descriptor: &DescriptorUsage) -> Self {
        for key in &descriptor.keys {
            self.build_env
                .keys_from_project_descriptor
                .push(key.clone());
            self.build_env.keys_overall.push(key.clone());
        }
        self.buildpacks.from_project_descriptor = filter_buildpacks(&descriptor.buildpacks);
        self.project_descriptor = ProjectDescriptorFlags {
            used: true,
            include_used: descriptor.include_used,
            exclude_used: descriptor.exclude_used,
        };
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct TelemetryData {
    version: u32,
    data: Vec<Segment>,
}

/// Exported telemetry payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomData {
    pub custom1_label: String,
    pub custom1: String,
}

/// Write-many, export-once telemetry accumulator
#[derive(Debug, Clone)]
pub struct StepTelemetry {
    builder: Option<String>,
    data: TelemetryData,
}

impl Default for StepTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl StepTelemetry {
    pub fn new() -> Self {
        Self {
            builder: None,
            data: TelemetryData {
                version: TELEMETRY_VERSION,
                data: Vec::new(),
            },
        }
    }

    /// Set the builder image stamped onto every segment added afterwards
    pub fn with_image(&mut self, image: &str) {
        self.builder = Some(filter_builder(image));
    }

    pub fn add_segment(&mut self, mut segment: Segment) {
        if let Some(builder) = &self.builder {
            segment.builder = builder.clone();
        }
        self.data.data.push(segment);
    }

    pub fn segments(&self) -> &[Segment] {
        &self.data.data
    }

    pub fn version(&self) -> u32 {
        self.data.version
    }

    /// Serialize the accumulated segments; consumes the accumulator
    pub fn export(self) -> Result<CustomData> {
        let custom1 = serde_json::to_string(&self.data)?;
        Ok(CustomData {
            custom1_label: CUSTOM_DATA_LABEL.to_string(),
            custom1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_builder() {
        assert_eq!(
            filter_builder("paketobuildpacks/builder-jammy-base:latest"),
            "paketobuildpacks/builder-jammy-base:latest"
        );
        assert_eq!(
            filter_builder("gcr.io/buildpacks/builder:v1"),
            "gcr.io/buildpacks/builder:v1"
        );
        assert_eq!(filter_builder("my.corp/secret-builder:1"), REDACTED);
    }

    #[test]
    fn test_filter_buildpacks() {
        let filtered = filter_buildpacks(&[
            "paketo-buildpacks/java".to_string(),
            "gcr.io/paketo-buildpacks/nodejs@sha256:abc".to_string(),
            "internal.corp/buildpacks/secret".to_string(),
        ]);
        assert_eq!(
            filtered,
            vec![
                "paketo-buildpacks/java",
                "gcr.io/paketo-buildpacks/nodejs@sha256:abc",
                REDACTED,
            ]
        );
    }

    #[test]
    fn test_filter_env() {
        let mut env = BTreeMap::new();
        env.insert("BP_JVM_VERSION".to_string(), JsonValue::from("17"));
        env.insert("DB_PASSWORD".to_string(), JsonValue::from("hunter2"));

        let filtered = filter_env(&env);
        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains_key("BP_JVM_VERSION"));
    }

    #[test]
    fn test_segment_keys_overall() {
        let segment = Segment::new()
            .with_config_keys(["chartPath", "helmCommand"])
            .with_project_descriptor(&DescriptorUsage {
                keys: vec!["name".into(), "version".into()],
                buildpacks: vec!["my/private".into()],
                include_used: true,
                exclude_used: false,
            });

        assert_eq!(
            segment.build_env.keys_from_config,
            vec!["chartPath", "helmCommand"]
        );
        assert_eq!(
            segment.build_env.keys_from_project_descriptor,
            vec!["name", "version"]
        );
        assert_eq!(
            segment.build_env.keys_overall,
            vec!["chartPath", "helmCommand", "name", "version"]
        );
        assert_eq!(segment.buildpacks.from_project_descriptor, vec![REDACTED]);
        assert!(segment.project_descriptor.used);
        assert!(segment.project_descriptor.include_used);
    }

    #[test]
    fn test_key_values_sets_jvm_version() {
        let mut env = BTreeMap::new();
        env.insert("BP_JVM_VERSION".to_string(), JsonValue::from("21"));
        let segment = Segment::new().with_key_values(&env);
        assert_eq!(segment.build_env.jvm_version, "21");
    }

    #[test]
    fn test_builder_stamped_on_segments() {
        let mut telemetry = StepTelemetry::new();
        telemetry.with_image("private.registry/builder:1");
        telemetry.add_segment(Segment::new().with_build_tool("helm"));
        telemetry.add_segment(Segment::new().with_build_tool("helm"));

        assert_eq!(telemetry.segments().len(), 2);
        assert!(telemetry.segments().iter().all(|s| s.builder == REDACTED));
    }

    #[test]
    fn test_export() {
        let mut telemetry = StepTelemetry::new();
        telemetry.add_segment(
            Segment::new()
                .with_build_tool("helm")
                .with_tags("1.0.0", vec!["latest".into()]),
        );
        assert_eq!(telemetry.version(), 3);

        let exported = telemetry.export().unwrap();
        assert_eq!(exported.custom1_label, "cnbBuildStepData");

        let json: JsonValue = serde_json::from_str(&exported.custom1).unwrap();
        assert_eq!(json["version"], 3);
        assert_eq!(json["data"][0]["buildTool"], "helm");
        assert_eq!(json["data"][0]["imageTag"], "1.0.0");
        assert_eq!(json["data"][0]["path"], "folder");
        assert!(json["data"][0]["buildpacks"]["FromConfig"].is_array());
    }
}
