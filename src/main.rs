//! `edged` application entry point.
//!
//! This binary drives the container runtime engine for edge-device
//! workloads. It uses `eyre` for opaque error handling at the application
//! boundary, converting domain-specific errors into human-readable reports.
//!
//! Configuration is loaded with layered precedence via `OrthoConfig`:
//! 1. Application defaults
//! 2. Configuration file (`~/.config/edged/config.toml` or path from `EDGED_CONFIG_PATH`)
//! 3. Environment variables (`EDGED_*`)
//! 4. Command-line arguments

use clap::Parser;
use eyre::{Report, Result as EyreResult};
use mockable::DefaultEnv;
use tracing_subscriber::EnvFilter;

use edged::config::{AppConfig, Cli, Commands, RunArgs, StatusArgs, StopArgs, load_config};
use edged::engine::{DockerConnector, RuntimeClient, SocketResolver};
use edged::error::Result as EdgedResult;
use edged::model::{CONTAINER_NAME_LABEL, ContainerDescriptor, POD_NAME_LABEL, PodDescriptor};

/// Application entry point.
///
/// Loads configuration with layered precedence via `OrthoConfig`, then
/// dispatches to the appropriate subcommand handler.
///
/// Uses `eyre::Result` as the return type to provide human-readable error
/// reports with backtraces when available.
#[tokio::main]
async fn main() -> EyreResult<()> {
    // Diagnostics go to stderr so stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI first (for subcommand dispatch and global options).
    let cli = Cli::parse();

    // Load configuration with layered precedence: defaults < file < env < CLI.
    let config = load_config(&cli).map_err(Report::from)?;

    run(&cli, &config).await.map_err(Report::from)
}

/// Builds the lifecycle client from the resolved configuration.
fn build_client(config: &AppConfig) -> RuntimeClient<DockerConnector> {
    let env = DefaultEnv::new();
    let resolver = SocketResolver::new(&env);
    let socket = resolver.resolve(config.engine_socket.as_deref());
    RuntimeClient::new(DockerConnector::new(socket), config.timeout())
}

/// Execute the CLI command, returning domain-specific errors.
///
/// Keeps semantic errors inside the run loop so the CLI boundary owns
/// conversion to `eyre::Report`.
async fn run(cli: &Cli, config: &AppConfig) -> EdgedResult<()> {
    let client = build_client(config);
    match &cli.command {
        Commands::Namespaces => list_namespaces(&client).await,
        Commands::Ps => list_containers(&client, config).await,
        Commands::Run(args) => run_container(&client, config, args).await,
        Commands::Stop(args) => stop_container(&client, config, args).await,
        Commands::Status(args) => report_status(&client, args).await,
    }
}

/// List engine namespaces other than the default one.
#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
async fn list_namespaces(client: &RuntimeClient<DockerConnector>) -> EdgedResult<()> {
    for namespace in client.list_namespaces().await? {
        println!("{namespace}");
    }
    Ok(())
}

/// List containers in the active namespace.
#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
async fn list_containers(
    client: &RuntimeClient<DockerConnector>,
    config: &AppConfig,
) -> EdgedResult<()> {
    let containers = client.list_containers(config.namespace_or_default()).await?;
    for container in containers {
        let labels = container.labels();
        let pod = labels.get(POD_NAME_LABEL).map_or("-", String::as_str);
        let name = labels.get(CONTAINER_NAME_LABEL).map_or("-", String::as_str);
        println!("{}\t{pod}\t{name}", container.id());
    }
    Ok(())
}

/// Pull an image and create and start a container from it.
#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
async fn run_container(
    client: &RuntimeClient<DockerConnector>,
    config: &AppConfig,
    args: &RunArgs,
) -> EdgedResult<()> {
    let pod = PodDescriptor::new(args.pod.as_str(), config.namespace_or_default());
    let container =
        ContainerDescriptor::new(format!("{}-{}", args.pod, args.name), args.image.as_str());

    let created = client.create_container(&pod, &container).await?;
    client.start_container(created.as_ref()).await?;
    println!("{}", created.id());
    Ok(())
}

/// Stop and remove a container.
async fn stop_container(
    client: &RuntimeClient<DockerConnector>,
    config: &AppConfig,
    args: &StopArgs,
) -> EdgedResult<()> {
    let container = client
        .load_container(config.namespace_or_default(), &args.container)
        .await?;
    client.stop_container(container.as_ref()).await?;
    Ok(())
}

/// Report a container's task status.
#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
async fn report_status(
    client: &RuntimeClient<DockerConnector>,
    args: &StatusArgs,
) -> EdgedResult<()> {
    println!("{}", client.container_task_status(&args.container).await);
    Ok(())
}
