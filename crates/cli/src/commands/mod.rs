//! CLI commands

pub mod waste;
