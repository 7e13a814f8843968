//! Configuration data types for edged.

use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};

use crate::model::DEFAULT_NAMESPACE;

/// Root application configuration.
///
/// This structure is loaded from configuration files, environment variables,
/// and command-line arguments with layered precedence. The precedence order
/// (lowest to highest) is: defaults, configuration file, environment
/// variables, command-line arguments.
///
/// Configuration files are discovered in this order:
/// 1. Path specified via `EDGED_CONFIG_PATH` environment variable
/// 2. `.edged.toml` in the current working directory
/// 3. `.edged.toml` in the home directory
/// 4. `~/.config/edged/config.toml` (XDG default)
#[derive(Debug, Clone, Default, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "EDGED",
    post_merge_hook,
    discovery(
        app_name = "edged",
        env_var = "EDGED_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".edged.toml",
        config_cli_long = "config",
        config_cli_visible = true,
    )
)]
pub struct AppConfig {
    /// The container engine socket path or URL.
    pub engine_socket: Option<String>,

    /// The engine namespace operations are scoped to.
    pub namespace: Option<String>,

    /// Per-operation deadline in seconds. Zero or absent means unbounded.
    pub timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Returns the configured namespace, falling back to `"default"`.
    #[must_use]
    pub fn namespace_or_default(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    /// Returns the per-operation deadline, if one is configured.
    ///
    /// A configured value of zero is read as "no deadline" and yields `None`.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }
}

impl PostMergeHook for AppConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        // Empty strings from the environment read as "unset" so the default
        // namespace applies.
        if self.namespace.as_deref() == Some("") {
            self.namespace = None;
        }
        if self.engine_socket.as_deref() == Some("") {
            self.engine_socket = None;
        }
        Ok(())
    }
}
