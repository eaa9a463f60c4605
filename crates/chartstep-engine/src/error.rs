//! Engine error types with source-mapped diagnostics

use chartstep_core::CoreError;
use indexmap::IndexMap;
use miette::{Diagnostic, NamedSource, SourceSpan};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::suggestions::{suggest_list_usage, suggest_unknown_filter, suggest_unknown_function};

/// Main engine error type
#[derive(Error, Debug)]
pub enum EngineError {
    /// The template could not be compiled
    #[error("template parse error: {0}")]
    Parse(TemplateError),

    /// The template compiled but failed while rendering
    #[error("template execution error: {0}")]
    Execution(TemplateError),

    /// Reading or writing a values file failed
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl EngineError {
    /// The underlying template error, if this is one
    pub fn template_error(&self) -> Option<&TemplateError> {
        match self {
            EngineError::Parse(te) | EngineError::Execution(te) => Some(te),
            EngineError::Core(_) => None,
        }
    }

    pub fn phase(&self) -> Option<RenderPhase> {
        match self {
            EngineError::Parse(_) => Some(RenderPhase::Parse),
            EngineError::Execution(_) => Some(RenderPhase::Execution),
            EngineError::Core(_) => None,
        }
    }
}

/// Where in the render cycle a template error happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Parse,
    Execution,
}

impl std::fmt::Display for RenderPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderPhase::Parse => f.write_str("parse"),
            RenderPhase::Execution => f.write_str("execution"),
        }
    }
}

/// Error kind for categorizing template errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    SyntaxError,
    UnknownFilter,
    UnknownFunction,
    TypeError,
    InvalidOperation,
    Other,
}

impl TemplateErrorKind {
    /// Convert to a code string for diagnostics
    pub fn to_code_string(&self) -> &'static str {
        match self {
            Self::SyntaxError => "syntax",
            Self::UnknownFilter => "unknown_filter",
            Self::UnknownFunction => "unknown_function",
            Self::TypeError => "type",
            Self::InvalidOperation => "invalid_operation",
            Self::Other => "render",
        }
    }
}

/// Template-specific error with source information
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(chartstep::template::render))]
pub struct TemplateError {
    /// Error message
    pub message: String,

    /// Error kind for categorization
    pub kind: TemplateErrorKind,

    /// Template source code
    #[source_code]
    pub src: NamedSource<String>,

    /// Error location in source
    #[label("error occurred here")]
    pub span: Option<SourceSpan>,

    /// Suggestion for fixing the error
    #[help]
    pub suggestion: Option<String>,

    /// 1-based line of the error, if known
    pub line: Option<usize>,
}

impl TemplateError {
    /// Create a new template error from a MiniJinja error
    pub fn from_minijinja(err: minijinja::Error, template_name: &str, template_source: &str) -> Self {
        let (kind, message) = categorize_minijinja_error(&err);
        let line = err.line();
        let span = line.and_then(|line_num| calculate_span(template_source, line_num));
        let suggestion = generate_suggestion(&err, kind);

        Self {
            message,
            kind,
            src: NamedSource::new(template_name, template_source.to_string()),
            span,
            suggestion,
            line,
        }
    }

    /// Create a simple error without source mapping
    pub fn simple(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: TemplateErrorKind::Other,
            src: NamedSource::new("<unknown>", String::new()),
            span: None,
            suggestion: None,
            line: None,
        }
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }
}

fn categorize_minijinja_error(err: &minijinja::Error) -> (TemplateErrorKind, String) {
    let msg = err.to_string();

    let kind = match err.kind() {
        minijinja::ErrorKind::SyntaxError => TemplateErrorKind::SyntaxError,
        minijinja::ErrorKind::UnknownFilter => TemplateErrorKind::UnknownFilter,
        minijinja::ErrorKind::UnknownFunction => TemplateErrorKind::UnknownFunction,
        minijinja::ErrorKind::InvalidOperation => TemplateErrorKind::InvalidOperation,
        minijinja::ErrorKind::NonPrimitive | minijinja::ErrorKind::NonKey => {
            TemplateErrorKind::TypeError
        }
        _ => {
            let lower = msg.to_lowercase();
            if lower.contains("not iterable") || lower.contains("unsupported types") {
                TemplateErrorKind::TypeError
            } else {
                TemplateErrorKind::Other
            }
        }
    };

    let message = msg
        .replace("invalid operation: ", "")
        .replace("syntax error: ", "");

    (kind, message)
}

/// Extract the filter name from MiniJinja's detailed display
///
/// MiniJinja shows the failing line as `   3 >   image: {{ cpe.x | toyml }}`,
/// so the name is taken from the expression on that line.
fn extract_filter_from_display(display: &str) -> Option<String> {
    for line in display.lines() {
        let trimmed = line.trim_start();
        if !(trimmed.contains(" > ") || trimmed.starts_with("> ")) {
            continue;
        }
        let start = line.find("{{")?;
        let end = line[start..].find("}}")?;
        let expr = &line[start + 2..start + end];
        let pipe = expr.rfind('|')?;
        let name = expr[pipe + 1..]
            .split(|c: char| c.is_whitespace() || c == '(')
            .find(|s| !s.is_empty())?;
        return Some(name.to_string());
    }
    None
}

/// Calculate the source span covering a whole line
fn calculate_span(source: &str, line_num: usize) -> Option<SourceSpan> {
    let mut offset = 0;

    for (idx, line) in source.lines().enumerate() {
        if idx + 1 == line_num {
            return Some(SourceSpan::new(offset.into(), line.len()));
        }
        offset += line.len() + 1;
    }

    None
}

fn generate_suggestion(err: &minijinja::Error, kind: TemplateErrorKind) -> Option<String> {
    let msg = err.to_string();

    match kind {
        TemplateErrorKind::SyntaxError => {
            if msg.contains('}') || msg.contains('%') {
                Some(
                    "Check bracket matching: `{{ }}` for expressions, `{% %}` for statements, `{# #}` for comments".to_string(),
                )
            } else {
                Some("Check for missing closing tags or mismatched brackets.".to_string())
            }
        }
        TemplateErrorKind::UnknownFilter => {
            let detailed = format!("{:#}", err);
            extract_filter_from_display(&detailed).and_then(|name| suggest_unknown_filter(&name))
        }
        TemplateErrorKind::UnknownFunction => Some(suggest_unknown_function()),
        TemplateErrorKind::TypeError | TemplateErrorKind::InvalidOperation => {
            let lower = msg.to_lowercase();
            if lower.contains("sequence") || lower.contains("not iterable") {
                Some(suggest_list_usage())
            } else {
                None
            }
        }
        TemplateErrorKind::Other => None,
    }
}

/// Outcome of rendering a set of values files
#[derive(Debug, Default)]
pub struct RenderReport {
    /// Errors grouped by file (IndexMap preserves processing order)
    pub errors_by_file: IndexMap<PathBuf, Vec<EngineError>>,

    /// Files rendered and rewritten, in processing order
    pub rendered_files: Vec<PathBuf>,

    /// Total error count
    pub total_errors: usize,
}

impl RenderReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a template error for a file
    pub fn add_error(&mut self, path: PathBuf, error: EngineError) {
        self.errors_by_file.entry(path).or_default().push(error);
        self.total_errors += 1;
    }

    /// Mark a file as successfully rendered and rewritten
    pub fn add_success(&mut self, path: PathBuf) {
        self.rendered_files.push(path);
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    pub fn files_with_errors(&self) -> usize {
        self.errors_by_file.len()
    }

    /// Errors of the given phase, with their file
    pub fn errors_in_phase(&self, phase: RenderPhase) -> impl Iterator<Item = (&Path, &EngineError)> {
        self.errors_by_file.iter().flat_map(move |(path, errors)| {
            errors
                .iter()
                .filter(move |e| e.phase() == Some(phase))
                .map(move |e| (path.as_path(), e))
        })
    }

    /// Generate summary message: "3 errors in 2 files"
    pub fn summary(&self) -> String {
        let file_word = if self.files_with_errors() == 1 {
            "file"
        } else {
            "files"
        };
        let error_word = if self.total_errors == 1 {
            "error"
        } else {
            "errors"
        };
        format!(
            "{} {} in {} {}",
            self.total_errors,
            error_word,
            self.files_with_errors(),
            file_word
        )
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
