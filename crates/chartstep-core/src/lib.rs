//! chartstep Core - foundational types for the chart deployment step
//!
//! This crate provides the types shared by the rest of chartstep:
//! - `CpeStore`: the Common Pipeline Environment written by earlier steps
//! - `CpeValue`: the tagged value stored under each CPE key
//! - `resolve_values_files`: which values files take part in rendering
//! - `ArtifactCoordinates` / `CoordinateOracle`: identity of the chart being deployed
//! - `StepTelemetry`: privacy-filtered usage data collected during a run

pub mod artifact;
pub mod cpe;
pub mod error;
pub mod telemetry;
pub mod values;

pub use artifact::{
    ArtifactCoordinates, ChartDescriptor, ChartDescriptorOracle, CoordinateOracle, StaticOracle,
};
pub use cpe::{CpeStore, CpeValue, DEFAULT_CPE_DIR};
pub use error::{CoreError, Result};
pub use telemetry::{CustomData, DescriptorUsage, Segment, SourcePath, StepTelemetry};
pub use values::{DEFAULT_VALUES_FILE, ValuesFile, resolve_values_files};
