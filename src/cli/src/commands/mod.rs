//! Subcommand implementations. Each module owns one top-level subcommand's
//! argument enum and its `execute` entry point, in the shape the teacher's
//! own CLI commands use.

pub mod cache;
pub mod embedded;
pub mod evaluate;
