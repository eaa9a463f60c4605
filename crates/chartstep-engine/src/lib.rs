//! chartstep Engine - Jinja2 rendering of values files
//!
//! This crate renders chart values files against the Common Pipeline
//! Environment with:
//! - a MiniJinja environment exposing the store as `cpe`
//! - chart-oriented filters (toyaml, nindent, required, ...)
//! - parse and execution errors kept apart, with suggestions
//! - per-file error collection for a whole render pass

pub mod engine;
pub mod error;
pub mod filters;
pub mod suggestions;
pub mod values_renderer;

pub use engine::{CPE_ROOT, Engine};
pub use error::{EngineError, RenderPhase, RenderReport, TemplateError, TemplateErrorKind};
pub use suggestions::{AVAILABLE_FILTERS, AVAILABLE_FUNCTIONS};
pub use values_renderer::ValuesRenderer;
