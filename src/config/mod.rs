//! Configuration system for edged.
//!
//! This module provides the configuration structures and CLI definitions for
//! the edged application. Configuration loading and precedence merging is
//! handled by the `ortho_config` crate. Intended precedence: CLI flags
//! override environment variables, which override configuration files, which
//! override defaults.
//!
//! The configuration file is expected at `~/.config/edged/config.toml` by
//! default.
//!
//! # Example Configuration
//!
//! ```toml
//! engine_socket = "unix:///run/containerd/containerd.sock"
//! namespace = "edge"
//! timeout_secs = 30
//! ```

mod cli;
mod loader;
mod types;

#[cfg(test)]
mod tests;

pub use cli::{Cli, Commands, RunArgs, StatusArgs, StopArgs};
pub use loader::{env_var_names, load_config};
pub use types::AppConfig;
