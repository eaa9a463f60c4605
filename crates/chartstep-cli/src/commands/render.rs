//! Render command - render values files without running helm

use chartstep_core::{CpeStore, resolve_values_files};
use chartstep_engine::{RenderReport, ValuesRenderer};
use console::style;
use std::path::PathBuf;

use crate::config::{StepArgs, StepConfig};
use crate::display::{display_render_report, first_suggestion};
use crate::error::{CliError, Result};

/// Values files of a render pass and its report
pub struct RenderPass {
    pub files: Vec<PathBuf>,
    pub report: RenderReport,
}

/// Load the pipeline environment for this configuration
pub fn load_store(config: &StepConfig) -> Result<CpeStore> {
    let root = config.cpe_root();
    let store = CpeStore::load(&root)?;
    tracing::info!("loaded {} pipeline environment keys from {}", store.len(), root.display());
    Ok(store)
}

/// Resolve, load and render every values file
///
/// Template failures are reported and left in the report, unless
/// `strictRender` is set, in which case they fail the pass.
pub fn render_values(config: &StepConfig) -> Result<RenderPass> {
    let chart_path = config.chart_path()?;
    let files = resolve_values_files(chart_path, &config.helm_values)?;
    let store = load_store(config)?;

    println!(
        "{} Rendering {} values file(s) for {}",
        style("→").blue().bold(),
        files.len(),
        style(chart_path.display()).cyan()
    );

    let report = ValuesRenderer::default().render_files(&files, &store)?;
    display_render_report(&report);

    if report.has_errors() && config.strict_render {
        return Err(CliError::Template {
            message: report.summary(),
            help: first_suggestion(&report),
        });
    }

    if report.has_errors() {
        println!(
            "{} Continuing with {} left unrendered",
            style("⚠").yellow(),
            crate::display::pluralize(report.files_with_errors(), "file", "files")
        );
    }

    Ok(RenderPass { files, report })
}

pub fn run(args: &StepArgs) -> Result<()> {
    let config = StepConfig::resolve(args)?;
    let pass = render_values(&config)?;

    if pass.report.has_errors() {
        return Err(CliError::Template {
            message: pass.report.summary(),
            help: first_suggestion(&pass.report),
        });
    }

    println!(
        "{} Rendered {} values file(s)",
        style("✓").green().bold(),
        pass.report.rendered_files.len()
    );
    Ok(())
}
