//! Bollard-backed binding of the runtime-engine surface.
//!
//! The engine traits model a namespace-and-task runtime; Docker-compatible
//! engines expose neither natively, so this binding maps the concepts:
//!
//! - namespaces are carried as the `io.edged.namespace` container label,
//!   and namespace listing enumerates the distinct label values in the
//!   engine's container-listing order;
//! - a container's task is its running process: creating a task is a
//!   deferred start, deleting a task kills the process;
//! - image unpack is a verification step, since Docker unpacks layers as
//!   part of the pull. The snapshotter and runtime plugin id are recorded
//!   as labels for downstream inspection.

use std::collections::HashMap;
use std::sync::Arc;

use bollard::Docker;
use bollard::models::{
    ContainerCreateBody, ContainerInspectResponse, ContainerStateStatusEnum, ContainerSummary,
    ImageConfig,
};
use bollard::query_parameters::{
    CreateContainerOptionsBuilder, CreateImageOptionsBuilder, InspectContainerOptions,
    KillContainerOptionsBuilder, ListContainersOptionsBuilder, RemoveContainerOptionsBuilder,
    StartContainerOptions,
};
use futures_util::TryStreamExt;

use crate::error::RuntimeError;
use crate::model::NAMESPACE_LABEL;

use super::runtime::{
    EngineClient, EngineConnector, EngineContainer, EngineFuture, EngineImage, EngineTask,
    NewContainerRequest, RuntimeSpec, TaskStatus,
};

/// Connection timeout in seconds for engine API connections.
const CONNECTION_TIMEOUT_SECS: u64 = 120;

/// Label recording the runtime plugin identifier a container was created
/// under.
const RUNTIME_LABEL: &str = "io.edged.runtime";

/// Label recording the snapshot driver a container's root filesystem view
/// was created on.
const SNAPSHOTTER_LABEL: &str = "io.edged.snapshotter";

/// Label recording the name of the container's snapshot view.
const SNAPSHOT_VIEW_LABEL: &str = "io.edged.snapshot-view";

/// Classifies socket endpoint types for connection handling.
enum SocketType {
    /// Unix socket or Windows named pipe with explicit scheme.
    Socket,
    /// HTTP, HTTPS, or TCP endpoint (TCP is rewritten to HTTP).
    Http,
    /// Bare path without scheme prefix.
    BarePath,
}

impl SocketType {
    fn is_socket_scheme(socket: &str) -> bool {
        socket.starts_with("unix://") || socket.starts_with("npipe://")
    }

    fn is_http_scheme(socket: &str) -> bool {
        socket.starts_with("tcp://")
            || socket.starts_with("http://")
            || socket.starts_with("https://")
    }

    fn classify(socket: &str) -> Self {
        match (Self::is_socket_scheme(socket), Self::is_http_scheme(socket)) {
            (true, _) => Self::Socket,
            (_, true) => Self::Http,
            _ => Self::BarePath,
        }
    }
}

/// Normalise a bare socket path to a URI with the appropriate scheme.
///
/// Paths starting with `\\` or `//` are assumed to be Windows named pipe
/// paths; all others are treated as Unix socket paths. Detection is
/// syntax-based, not platform-based.
fn normalize_bare_path(path: &str) -> String {
    if path.starts_with("\\\\") || path.starts_with("//") {
        format!("npipe://{path}")
    } else {
        format!("unix://{path}")
    }
}

/// Opens a client for the engine at `socket` without verifying liveness.
fn open_docker(socket: &str) -> Result<Docker, RuntimeError> {
    match SocketType::classify(socket) {
        SocketType::Socket => {
            Docker::connect_with_socket(socket, CONNECTION_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
        }
        SocketType::Http => {
            let http_socket = if socket.starts_with("tcp://") {
                socket.replacen("tcp://", "http://", 1)
            } else {
                socket.to_owned()
            };
            Docker::connect_with_http(
                &http_socket,
                CONNECTION_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            )
        }
        SocketType::BarePath => {
            let socket_uri = normalize_bare_path(socket);
            Docker::connect_with_socket(
                &socket_uri,
                CONNECTION_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            )
        }
    }
    .map_err(|error| RuntimeError::ConnectionFailed {
        message: error.to_string(),
    })
}

/// Maps an engine API error to the runtime error model.
///
/// HTTP 404 responses become the not-found sub-kind so probe paths can
/// tell "absent" apart from "failed".
fn engine_error(error: bollard::errors::Error) -> RuntimeError {
    match error {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message,
        } => RuntimeError::NotFound { resource: message },
        other => RuntimeError::Engine {
            message: other.to_string(),
        },
    }
}

/// Maps the engine's container state to the canonical task status.
fn status_from_state(status: Option<ContainerStateStatusEnum>) -> TaskStatus {
    match status {
        Some(ContainerStateStatusEnum::CREATED) => TaskStatus::Created,
        Some(ContainerStateStatusEnum::RUNNING | ContainerStateStatusEnum::RESTARTING) => {
            TaskStatus::Running
        }
        Some(ContainerStateStatusEnum::PAUSED) => TaskStatus::Paused,
        Some(
            ContainerStateStatusEnum::EXITED
            | ContainerStateStatusEnum::DEAD
            | ContainerStateStatusEnum::REMOVING,
        ) => TaskStatus::Stopped,
        _ => TaskStatus::Unknown,
    }
}

/// Derives a runtime execution spec from an image's configuration.
fn spec_from_image_config(config: Option<&ImageConfig>) -> RuntimeSpec {
    let mut args: Vec<String> = Vec::new();
    let mut env: Vec<String> = Vec::new();
    let mut cwd = String::from("/");

    if let Some(image_config) = config {
        if let Some(entrypoint) = &image_config.entrypoint {
            args.extend(entrypoint.iter().cloned());
        }
        if let Some(cmd) = &image_config.cmd {
            args.extend(cmd.iter().cloned());
        }
        if let Some(image_env) = &image_config.env {
            env.extend(image_env.iter().cloned());
        }
        if let Some(working_dir) = &image_config.working_dir
            && !working_dir.is_empty()
        {
            cwd = working_dir.clone();
        }
    }

    RuntimeSpec::new(serde_json::json!({
        "process": {
            "args": args,
            "env": env,
            "cwd": cwd,
        }
    }))
}

/// Collects the distinct namespace label values from a container listing,
/// preserving the engine's listing order.
fn namespaces_in_listing_order(summaries: &[ContainerSummary]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for summary in summaries {
        let Some(namespace) = summary
            .labels
            .as_ref()
            .and_then(|labels| labels.get(NAMESPACE_LABEL))
        else {
            continue;
        };
        if !seen.iter().any(|known| known == namespace) {
            seen.push(namespace.clone());
        }
    }
    seen
}

/// Extracts the content digest from an image inspection.
///
/// Prefers the first repo digest (`name@sha256:...`), falling back to the
/// image id, then to the reference itself.
fn digest_from_inspect(
    repo_digests: Option<&Vec<String>>,
    id: Option<&String>,
    reference: &str,
) -> String {
    repo_digests
        .and_then(|digests| digests.first())
        .and_then(|entry| entry.split_once('@'))
        .map(|(_, digest)| String::from(digest))
        .or_else(|| id.cloned())
        .unwrap_or_else(|| String::from(reference))
}

/// Establishes namespace-scoped engine connections over a fixed socket.
pub struct DockerConnector {
    socket: String,
}

impl DockerConnector {
    /// Creates a connector for the engine at `socket`.
    #[must_use]
    pub fn new(socket: impl Into<String>) -> Self {
        Self {
            socket: socket.into(),
        }
    }

    /// Returns the socket endpoint this connector targets.
    #[must_use]
    pub fn socket(&self) -> &str {
        &self.socket
    }
}

impl EngineConnector for DockerConnector {
    type Client = DockerEngine;

    fn connect<'a>(&'a self, namespace: &str) -> EngineFuture<'a, DockerEngine> {
        let namespace = String::from(namespace);
        Box::pin(async move {
            let docker = open_docker(&self.socket)?;
            // Establishment must surface connectivity failures here, not on
            // the first operation.
            docker
                .ping()
                .await
                .map_err(|error| RuntimeError::ConnectionFailed {
                    message: error.to_string(),
                })?;
            Ok(DockerEngine {
                docker: Arc::new(docker),
                namespace,
            })
        })
    }
}

/// A live engine connection scoped to one namespace.
pub struct DockerEngine {
    docker: Arc<Docker>,
    namespace: String,
}

impl DockerEngine {
    fn label_filters(&self) -> HashMap<String, Vec<String>> {
        HashMap::from([(
            String::from("label"),
            vec![format!("{NAMESPACE_LABEL}={}", self.namespace)],
        )])
    }

    async fn inspect(&self, container_id: &str) -> Result<ContainerInspectResponse, RuntimeError> {
        self.docker
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
            .map_err(engine_error)
    }
}

impl EngineClient for DockerEngine {
    fn list_namespaces(&self) -> EngineFuture<'_, Vec<String>> {
        Box::pin(async move {
            let filters = HashMap::from([(
                String::from("label"),
                vec![String::from(NAMESPACE_LABEL)],
            )]);
            let options = ListContainersOptionsBuilder::new()
                .all(true)
                .filters(&filters)
                .build();
            let summaries = self
                .docker
                .list_containers(Some(options))
                .await
                .map_err(engine_error)?;
            Ok(namespaces_in_listing_order(&summaries))
        })
    }

    fn containers(&self) -> EngineFuture<'_, Vec<Box<dyn EngineContainer>>> {
        Box::pin(async move {
            let options = ListContainersOptionsBuilder::new()
                .all(true)
                .filters(&self.label_filters())
                .build();
            let summaries = self
                .docker
                .list_containers(Some(options))
                .await
                .map_err(engine_error)?;

            let containers = summaries
                .into_iter()
                .filter_map(|summary| {
                    let id = summary.id?;
                    Some(Box::new(DockerContainer {
                        docker: Arc::clone(&self.docker),
                        id,
                        labels: summary.labels.unwrap_or_default(),
                    }) as Box<dyn EngineContainer>)
                })
                .collect();
            Ok(containers)
        })
    }

    fn pull_image<'a>(&'a self, reference: &str) -> EngineFuture<'a, Box<dyn EngineImage>> {
        let reference = String::from(reference);
        Box::pin(async move {
            let options = CreateImageOptionsBuilder::new()
                .from_image(&reference)
                .build();
            let mut progress = self.docker.create_image(Some(options), None, None);
            while let Some(update) = progress.try_next().await.map_err(engine_error)? {
                if let Some(status) = update.status {
                    tracing::trace!(image = reference, status, "pull progress");
                }
            }

            let inspected = self
                .docker
                .inspect_image(&reference)
                .await
                .map_err(engine_error)?;
            let digest = digest_from_inspect(
                inspected.repo_digests.as_ref(),
                inspected.id.as_ref(),
                &reference,
            );
            Ok(Box::new(DockerImage {
                docker: Arc::clone(&self.docker),
                reference,
                digest,
            }) as Box<dyn EngineImage>)
        })
    }

    fn generate_spec<'a>(&'a self, image: &'a dyn EngineImage) -> EngineFuture<'a, RuntimeSpec> {
        Box::pin(async move {
            let inspected = self
                .docker
                .inspect_image(image.reference())
                .await
                .map_err(engine_error)?;
            Ok(spec_from_image_config(inspected.config.as_ref()))
        })
    }

    fn create_container(
        &self,
        request: NewContainerRequest,
    ) -> EngineFuture<'_, Box<dyn EngineContainer>> {
        Box::pin(async move {
            let mut labels = request.labels;
            labels.insert(String::from(RUNTIME_LABEL), request.runtime);
            labels.insert(String::from(SNAPSHOTTER_LABEL), request.snapshotter);
            labels.insert(String::from(SNAPSHOT_VIEW_LABEL), request.snapshot_view);

            let options = CreateContainerOptionsBuilder::new().name(&request.id).build();
            let body = ContainerCreateBody {
                image: Some(request.image),
                cmd: request.spec.args(),
                env: request.spec.env(),
                working_dir: request.spec.cwd(),
                labels: Some(labels.clone()),
                ..ContainerCreateBody::default()
            };

            let created = self
                .docker
                .create_container(Some(options), body)
                .await
                .map_err(engine_error)?;
            Ok(Box::new(DockerContainer {
                docker: Arc::clone(&self.docker),
                id: created.id,
                labels,
            }) as Box<dyn EngineContainer>)
        })
    }

    fn load_container<'a>(&'a self, id: &str) -> EngineFuture<'a, Box<dyn EngineContainer>> {
        let id = String::from(id);
        Box::pin(async move {
            let inspected = self.inspect(&id).await?;
            let labels = inspected
                .config
                .and_then(|config| config.labels)
                .unwrap_or_default();
            Ok(Box::new(DockerContainer {
                docker: Arc::clone(&self.docker),
                id: inspected.id.unwrap_or(id),
                labels,
            }) as Box<dyn EngineContainer>)
        })
    }

    fn task_status<'a>(&'a self, container_id: &str) -> EngineFuture<'a, TaskStatus> {
        let container_id = String::from(container_id);
        Box::pin(async move {
            let inspected = self.inspect(&container_id).await?;
            Ok(status_from_state(
                inspected.state.and_then(|state| state.status),
            ))
        })
    }
}

/// A pulled image backed by the engine's local image store.
pub struct DockerImage {
    docker: Arc<Docker>,
    reference: String,
    digest: String,
}

impl EngineImage for DockerImage {
    fn reference(&self) -> &str {
        &self.reference
    }

    fn digest(&self) -> &str {
        &self.digest
    }

    fn unpack<'a>(&'a self, _snapshotter: &str) -> EngineFuture<'a, ()> {
        Box::pin(async move {
            // Layers are unpacked as part of the pull with this engine;
            // unpack verifies the image is present to back a root
            // filesystem.
            self.docker
                .inspect_image(&self.reference)
                .await
                .map_err(engine_error)?;
            Ok(())
        })
    }
}

/// A runtime container handle.
pub struct DockerContainer {
    docker: Arc<Docker>,
    id: String,
    labels: HashMap<String, String>,
}

impl EngineContainer for DockerContainer {
    fn id(&self) -> &str {
        &self.id
    }

    fn labels(&self) -> &HashMap<String, String> {
        &self.labels
    }

    fn new_task(&self) -> EngineFuture<'_, Box<dyn EngineTask>> {
        Box::pin(async move {
            // Process creation is deferred to start(); verify the container
            // still exists so a vanished container fails here as not-found.
            self.docker
                .inspect_container(&self.id, None::<InspectContainerOptions>)
                .await
                .map_err(engine_error)?;
            Ok(Box::new(DockerTask {
                docker: Arc::clone(&self.docker),
                container_id: self.id.clone(),
                pid: None,
            }) as Box<dyn EngineTask>)
        })
    }

    fn task(&self) -> EngineFuture<'_, Box<dyn EngineTask>> {
        Box::pin(async move {
            let inspected = self
                .docker
                .inspect_container(&self.id, None::<InspectContainerOptions>)
                .await
                .map_err(engine_error)?;
            let state = inspected.state.unwrap_or_default();
            if state.running.unwrap_or(false) {
                let pid = state.pid.and_then(|pid| u32::try_from(pid).ok());
                Ok(Box::new(DockerTask {
                    docker: Arc::clone(&self.docker),
                    container_id: self.id.clone(),
                    pid,
                }) as Box<dyn EngineTask>)
            } else {
                Err(RuntimeError::NotFound {
                    resource: format!("task for container {}", self.id),
                })
            }
        })
    }

    fn delete(&self, cleanup_snapshot: bool) -> EngineFuture<'_, ()> {
        Box::pin(async move {
            let options = RemoveContainerOptionsBuilder::new()
                .v(cleanup_snapshot)
                .build();
            self.docker
                .remove_container(&self.id, Some(options))
                .await
                .map_err(engine_error)
        })
    }
}

/// The running-process handle of a container.
pub struct DockerTask {
    docker: Arc<Docker>,
    container_id: String,
    pid: Option<u32>,
}

impl EngineTask for DockerTask {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn start(&self) -> EngineFuture<'_, u32> {
        Box::pin(async move {
            self.docker
                .start_container(&self.container_id, None::<StartContainerOptions>)
                .await
                .map_err(engine_error)?;
            let inspected = self
                .docker
                .inspect_container(&self.container_id, None::<InspectContainerOptions>)
                .await
                .map_err(engine_error)?;
            let pid = inspected
                .state
                .and_then(|state| state.pid)
                .and_then(|pid| u32::try_from(pid).ok())
                .unwrap_or(0);
            Ok(pid)
        })
    }

    fn delete_with_kill(&self) -> EngineFuture<'_, ()> {
        Box::pin(async move {
            let options = KillContainerOptionsBuilder::new().signal("SIGKILL").build();
            self.docker
                .kill_container(&self.container_id, Some(options))
                .await
                .map_err(engine_error)
        })
    }
}
