//! CLI commands

pub mod functions;
pub mod render;
