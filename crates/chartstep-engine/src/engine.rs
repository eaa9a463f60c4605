//! Template engine based on MiniJinja

use chartstep_core::CpeStore;
use minijinja::{AutoEscape, Environment, UndefinedBehavior};

use crate::error::{EngineError, Result, TemplateError};
use crate::filters;

/// Name of the root variable exposing the pipeline environment
pub const CPE_ROOT: &str = "cpe";

/// Renders values-file templates against the pipeline environment
///
/// Templates see the whole environment under `cpe`. Keys containing `/`
/// are read with subscripts:
///
/// ```jinja2
/// image: {{ cpe["container/registryUrl"] }}/app:{{ cpe.artifactVersion }}
/// sidecars: {{ cpe["container/imageNames"] | tojson }}
/// ```
///
/// Lookups of keys an earlier step never wrote render as empty, including
/// nested lookups, so templates can reference optional keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct Engine;

impl Engine {
    pub fn new() -> Self {
        Self
    }

    fn create_environment(&self) -> Environment<'static> {
        let mut env = Environment::new();

        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.set_keep_trailing_newline(true);
        // Values files are YAML, never HTML
        env.set_auto_escape_callback(|_| AutoEscape::None);

        env.add_filter("toyaml", filters::toyaml);
        env.add_filter("tojson", filters::tojson);
        env.add_filter("b64encode", filters::b64encode);
        env.add_filter("quote", filters::quote);
        env.add_filter("squote", filters::squote);
        env.add_filter("indent", filters::indent);
        env.add_filter("nindent", filters::nindent);
        env.add_filter("required", filters::required);
        // Absent keys are empty sequences here too
        env.add_filter("first", filters::first);
        env.add_filter("last", filters::last);
        env.add_filter("length", filters::length);
        env.add_filter("count", filters::length);

        env
    }

    /// Render one template against the store
    ///
    /// Syntax errors come back as `EngineError::Parse`; anything failing while
    /// the compiled template runs comes back as `EngineError::Execution`.
    pub fn render_string(
        &self,
        template: &str,
        store: &CpeStore,
        template_name: &str,
    ) -> Result<String> {
        let parse_error =
            |e| EngineError::Parse(TemplateError::from_minijinja(e, template_name, template));

        let mut env = self.create_environment();
        env.add_template_owned(template_name.to_string(), template.to_string())
            .map_err(parse_error)?;
        let tmpl = env.get_template(template_name).map_err(parse_error)?;

        let ctx = minijinja::context! {
            cpe => store.as_mapping(),
        };

        tmpl.render(ctx).map_err(|e| {
            EngineError::Execution(TemplateError::from_minijinja(e, template_name, template))
        })
    }
}
