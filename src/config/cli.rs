//! Command-line argument definitions for edged.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Command-line interface for edged.
#[derive(Debug, Parser)]
#[command(name = "edged")]
#[command(
    author,
    version,
    about = "Container lifecycle client for edge-device workloads"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file.
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Container engine socket path or URL.
    #[arg(long, global = true)]
    pub engine_socket: Option<String>,

    /// Engine namespace to operate in.
    #[arg(long, global = true)]
    pub namespace: Option<String>,

    /// Per-operation deadline in seconds (0 disables the deadline).
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List engine namespaces other than the default one.
    Namespaces,

    /// List containers in the active namespace.
    Ps,

    /// Pull an image and create and start a container from it.
    Run(RunArgs),

    /// Stop and remove a container.
    Stop(StopArgs),

    /// Report a container's task status.
    Status(StatusArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Pod the container belongs to.
    #[arg(long, required = true)]
    pub pod: String,

    /// Container name within the pod.
    #[arg(long, required = true)]
    pub name: String,

    /// Image reference backing the container.
    #[arg(required = true)]
    pub image: String,
}

/// Arguments for the `stop` subcommand.
#[derive(Debug, Parser)]
pub struct StopArgs {
    /// Container ID to stop.
    #[arg(required = true)]
    pub container: String,
}

/// Arguments for the `status` subcommand.
#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Container ID to query.
    #[arg(required = true)]
    pub container: String,
}
