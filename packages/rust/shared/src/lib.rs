//! Shared types, error model, and configuration for kindle-voz.
//!
//! This crate is the foundation depended on by all other kindle-voz crates.
//! It provides:
//! - [`VozError`]: the unified error type
//! - Domain types ([`RunId`], [`RunState`], [`Chapter`], [`PackagedOutput`])
//! - Configuration ([`AppConfig`], [`MailSettings`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ConvertConfig, DefaultsConfig, FetchConfig, MailConfig, MailSecurity,
    MailSettings, config_dir, config_file_path, ensure_config_dir, init_config, load_config,
    load_config_from, validate_mail,
};
pub use error::{Result, VozError};
pub use types::{Chapter, PackagedOutput, RunId, RunState};
