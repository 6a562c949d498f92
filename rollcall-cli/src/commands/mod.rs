//! Subcommand implementations.

pub mod issue;
pub mod logout;
pub mod scan;
pub mod status;
pub mod submit;
