//! CLI command implementations.

pub mod build;
pub mod graph;
pub mod init;
pub mod list;
pub mod relocate;
pub mod validate;
