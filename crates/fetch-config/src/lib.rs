//! Configuration for the fetch middleware
//!
//! This crate provides:
//! - The credential inclusion policy shared by descriptors and defaults
//! - Configuration file lookup (TOML)
//! - Process-wide defaults (`FetchDefaults`) with environment overrides

pub mod config_file;
pub mod credentials;
pub mod defaults;

pub use config_file::{config_dir_path, load_config_file};
pub use credentials::Credentials;
pub use defaults::FetchDefaults;
