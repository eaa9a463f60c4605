//! CLI commands

pub mod cpe;
pub mod render;
pub mod run;
