//! Shared types, error model, and configuration for procbook.
//!
//! This crate is the foundation depended on by the other procbook crates.
//! It provides:
//! - [`ProcbookError`], the unified error type
//! - Domain types ([`Contribution`], [`SectionPlacement`], [`AssemblyReport`])
//! - Configuration ([`AppConfig`], [`AssemblyConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AssemblyConfig, DefaultsConfig, MergeConfig, PandocConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_config,
};
pub use error::{ProcbookError, Result};
pub use types::{
    AssemblyReport, Contribution, ContributionEntry, MergeOutcome, SectionPlacement,
};
