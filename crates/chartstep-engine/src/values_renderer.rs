//! In-place rendering of chart values files
//!
//! Each file goes through one read, render and overwrite cycle before the
//! next one is touched. Template errors are collected per file and leave that
//! file as it was; I/O errors abort the pass.

use std::path::PathBuf;

use chartstep_core::{CpeStore, ValuesFile};

use crate::engine::Engine;
use crate::error::{RenderReport, Result};

/// Renders a list of values files against one CPE store
#[derive(Debug, Clone, Default)]
pub struct ValuesRenderer {
    engine: Engine,
}

impl ValuesRenderer {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Render every file in order, overwriting those that render cleanly
    ///
    /// Returns `Err` only when a file cannot be read or written. Template
    /// failures are in the returned report.
    pub fn render_files(&self, files: &[PathBuf], store: &CpeStore) -> Result<RenderReport> {
        let mut report = RenderReport::new();

        for path in files {
            let file = ValuesFile::read(path)?;
            let name = file.path.display().to_string();

            match self.engine.render_string(&file.content, store, &name) {
                Ok(rendered) => {
                    if rendered != file.content {
                        file.write(&rendered)?;
                        tracing::debug!("rendered {}", name);
                    } else {
                        tracing::trace!("{} has no template content", name);
                    }
                    report.add_success(file.path);
                }
                Err(e) => {
                    tracing::warn!("failed to render {}: {}", name, e);
                    report.add_error(file.path, e);
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineError, RenderPhase};
    use chartstep_core::{CoreError, CpeValue};
    use std::fs;
    use tempfile::TempDir;

    fn store() -> CpeStore {
        CpeStore::from_entries([
            ("artifactVersion", CpeValue::Scalar("1.4.2".into())),
            (
                "container/registryUrl",
                CpeValue::Scalar("registry.example.com".into()),
            ),
        ])
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_render_files_rewrites_in_place() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "values.yaml",
            "image:\n  repository: {{ cpe[\"container/registryUrl\"] }}/app\n  tag: {{ cpe.artifactVersion }}\n",
        );

        let report = ValuesRenderer::default()
            .render_files(&[path.clone()], &store())
            .unwrap();

        assert!(!report.has_errors());
        assert_eq!(report.rendered_files, vec![path.clone()]);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "image:\n  repository: registry.example.com/app\n  tag: 1.4.2\n"
        );
    }

    #[test]
    fn test_failing_file_left_untouched() {
        let dir = TempDir::new().unwrap();
        let broken_content = "tag: {{ cpe.artifactVersion \n";
        let first = write(&dir, "values.yaml", "tag: {{ cpe.artifactVersion }}\n");
        let broken = write(&dir, "broken.yaml", broken_content);
        let last = write(&dir, "prod.yaml", "registry: {{ cpe[\"container/registryUrl\"] }}\n");

        let report = ValuesRenderer::default()
            .render_files(&[first.clone(), broken.clone(), last.clone()], &store())
            .unwrap();

        insta::assert_snapshot!(report.summary(), @"1 error in 1 file");
        assert_eq!(report.rendered_files, vec![first.clone(), last.clone()]);
        assert_eq!(report.errors_in_phase(RenderPhase::Parse).count(), 1);

        assert_eq!(fs::read_to_string(&broken).unwrap(), broken_content);
        assert_eq!(fs::read_to_string(&first).unwrap(), "tag: 1.4.2\n");
        assert_eq!(
            fs::read_to_string(&last).unwrap(),
            "registry: registry.example.com\n"
        );
    }

    #[test]
    fn test_execution_error_recorded() {
        let dir = TempDir::new().unwrap();
        let content = "commit: {{ cpe[\"git/commitId\"] | required(\"no commit\") }}\n";
        let path = write(&dir, "values.yaml", content);

        let report = ValuesRenderer::default()
            .render_files(&[path.clone()], &store())
            .unwrap();

        let errors = &report.errors_by_file[&path];
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], EngineError::Execution(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.yaml");

        let err = ValuesRenderer::default()
            .render_files(&[missing], &store())
            .unwrap_err();

        assert!(matches!(err, EngineError::Core(_)));
        assert!(err.to_string().contains("missing.yaml"));
    }

    #[test]
    fn test_unreadable_file_stops_pass() {
        let dir = TempDir::new().unwrap();
        let first = write(&dir, "values.yaml", "tag: {{ cpe.artifactVersion }}\n");
        let missing = dir.path().join("staging.yaml");
        let last_content = "registry: {{ cpe[\"container/registryUrl\"] }}\n";
        let last = write(&dir, "prod.yaml", last_content);

        let err = ValuesRenderer::default()
            .render_files(&[first.clone(), missing.clone(), last.clone()], &store())
            .unwrap_err();

        match err {
            EngineError::Core(CoreError::ReadFile { path, .. }) => assert_eq!(path, missing),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(fs::read_to_string(&first).unwrap(), "tag: 1.4.2\n");
        assert_eq!(fs::read_to_string(&last).unwrap(), last_content);
    }

    #[test]
    fn test_literal_file_unchanged() {
        let dir = TempDir::new().unwrap();
        let content = "replicaCount: 2\n# plain values\nservice:\n  port: 8080\n";
        let path = write(&dir, "values.yaml", content);

        let report = ValuesRenderer::default()
            .render_files(&[path.clone()], &CpeStore::new())
            .unwrap();

        assert!(!report.has_errors());
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
    }
}
