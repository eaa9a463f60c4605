//! Run command - the full step: render values files, then dispatch helm operations

use chartstep_core::{
    ChartDescriptor, ChartDescriptorOracle, DescriptorUsage, Segment, SourcePath, StepTelemetry,
};
use chartstep_deploy::{DispatchOutcome, Dispatcher};
use console::style;
use std::path::Path;

use crate::commands::render::render_values;
use crate::config::{StepArgs, StepConfig};
use crate::error::Result;
use crate::helm::HelmCli;

pub async fn run(args: &StepArgs, dry_run: bool, telemetry_out: Option<&Path>) -> Result<()> {
    let config = StepConfig::resolve(args)?;

    // Reject a bad selection before touching any file
    let request = config.operation_request()?;
    let chart_path = config.chart_path()?;

    let pass = render_values(&config)?;

    let executor = HelmCli::new(&config.helm_binary).dry_run(dry_run);
    let oracle = ChartDescriptorOracle::new(chart_path);
    let base = config.base_invocation(pass.files)?;
    let dispatcher = Dispatcher::new(&executor, &oracle, base);

    let result = dispatcher.run(&request).await;

    if let Some(path) = telemetry_out {
        let published = result
            .as_ref()
            .ok()
            .and_then(|outcome| outcome.publish_version.as_deref());
        write_telemetry(&config, chart_path, published, path)?;
    }

    let outcome = result?;
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &DispatchOutcome) {
    let executed: Vec<&str> = outcome.executed.iter().map(|op| op.as_str()).collect();
    println!(
        "{} {} completed ({})",
        style("✓").green().bold(),
        outcome.plan,
        executed.join(", ")
    );
    if let Some(name) = &outcome.release_name {
        println!("  release: {}", style(name).cyan());
    }
    if let Some(version) = &outcome.publish_version {
        println!("  published version: {}", style(version).yellow());
    }
}

/// Build the step's telemetry segment
///
/// A published chart version is recorded as the segment's tag.
pub fn collect_telemetry(
    config: &StepConfig,
    chart_path: &Path,
    published: Option<&str>,
) -> Result<StepTelemetry> {
    let keys = config.configured_keys()?;

    let mut segment = Segment::new()
        .with_config_keys(keys.iter().map(String::as_str))
        .with_path(SourcePath::Folder)
        .with_build_tool("helm");
    if let Some(version) = published {
        segment = segment.with_tags(version, Vec::new());
    }

    match ChartDescriptor::load(chart_path) {
        Ok(descriptor) => {
            segment = segment.with_project_descriptor(&DescriptorUsage {
                keys: descriptor.keys,
                ..Default::default()
            });
        }
        Err(e) => tracing::debug!("chart descriptor not recorded: {}", e),
    }

    let mut telemetry = StepTelemetry::new();
    if let Some(image) = &config.image {
        telemetry.with_image(image);
    }
    telemetry.add_segment(segment);
    Ok(telemetry)
}

fn write_telemetry(
    config: &StepConfig,
    chart_path: &Path,
    published: Option<&str>,
    out: &Path,
) -> Result<()> {
    let data = collect_telemetry(config, chart_path, published)?.export()?;
    let json = serde_json::to_string_pretty(&data)?;
    std::fs::write(out, json)?;
    tracing::debug!("telemetry written to {}", out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_telemetry() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("Chart.yaml"),
            "apiVersion: v2\nname: orders\nversion: 1.0.0\n",
        )
        .unwrap();

        let mut config = StepConfig::from_yaml("namespace: shop\n").unwrap();
        config.chart_path = Some(dir.path().to_path_buf());
        config.image = Some("registry.internal/team/helm:3".to_string());

        let telemetry = collect_telemetry(&config, dir.path(), None).unwrap();
        let segment = &telemetry.segments()[0];

        assert!(segment.build_env.keys_from_config.contains(&"namespace".to_string()));
        assert_eq!(
            segment.build_env.keys_from_project_descriptor,
            vec!["apiVersion", "name", "version"]
        );
        assert!(segment.project_descriptor.used);
        assert_eq!(segment.image_tag, "");
        assert_eq!(segment.builder, "<redacted>");

        let data = telemetry.export().unwrap();
        assert_eq!(data.custom1_label, "cnbBuildStepData");
        assert!(data.custom1.contains("\"version\":3"));
    }

    #[test]
    fn test_collect_telemetry_records_published_version() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("Chart.yaml"),
            "apiVersion: v2\nname: orders\nversion: 1.0.0\n",
        )
        .unwrap();
        let config = StepConfig::from_yaml("publish: true\n").unwrap();

        let telemetry = collect_telemetry(&config, dir.path(), Some("1.0.0")).unwrap();
        let segment = &telemetry.segments()[0];

        assert_eq!(segment.image_tag, "1.0.0");
        assert!(segment.additional_tags.is_empty());
    }
}
