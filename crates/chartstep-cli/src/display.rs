//! Display formatting for CLI output

use chartstep_engine::{EngineError, RenderReport};
use console::style;

/// Print the outcome of a values-file render pass
pub fn display_render_report(report: &RenderReport) {
    for path in &report.rendered_files {
        println!("  {} {}", style("✓").green(), path.display());
    }

    if !report.has_errors() {
        return;
    }

    println!();
    println!(
        "  {} Values rendering failed: {}",
        style("✗").red(),
        style(report.summary()).bold()
    );

    for (path, errors) in &report.errors_by_file {
        println!(
            "  {} {} ({})",
            style("→").blue(),
            style(path.display()).yellow(),
            pluralize(errors.len(), "error", "errors")
        );

        for error in errors {
            println!("    {} {}", style("✗").red(), error);
            if let Some(line) = error.template_error().and_then(|te| te.line) {
                println!("      {} line {}", style("at").dim(), line);
            }
            if let Some(suggestion) = error.template_error().and_then(|te| te.suggestion.as_ref()) {
                println!("      {} {}", style("hint:").blue(), suggestion);
            }
        }
    }
    println!();
}

/// First suggestion attached to any error in the report
pub fn first_suggestion(report: &RenderReport) -> Option<String> {
    report
        .errors_by_file
        .values()
        .flatten()
        .filter_map(EngineError::template_error)
        .find_map(|te| te.suggestion.clone())
}

/// Format count with proper pluralization
pub fn pluralize(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}
