//! Core error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("pipeline environment root {path} is not a directory")]
    NotADirectory { path: PathBuf },

    #[error("failed to walk pipeline environment at {path}: {message}")]
    Walk { path: PathBuf, message: String },

    #[error("no values file found: {chart_path}/values.yaml does not exist and no values files were provided")]
    NoValuesFile { chart_path: PathBuf },

    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid chart descriptor {path}: {message}")]
    InvalidDescriptor { path: PathBuf, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
