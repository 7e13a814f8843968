//! The container lifecycle client.
//!
//! [`RuntimeClient`] mediates between the daemon and the runtime engine,
//! exposing namespace listing, image acquisition, container create/start/
//! stop and status resolution as single operations with built-in
//! connection-failure recovery. Every operation runs under a fresh
//! execution context and follows the reconnect-on-next-use policy: a
//! failed engine call invalidates the cached connection and the next
//! operation establishes a new one. Nothing here retries within a call;
//! retry policy belongs to the calling controller.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::RuntimeError;
use crate::model::{ContainerDescriptor, DEFAULT_NAMESPACE, PodDescriptor, container_labels};

use super::connection::ConnectionManager;
use super::runtime::{
    EngineClient, EngineConnector, EngineContainer, EngineImage, NewContainerRequest, SNAPSHOTTER,
    TaskStatus, runtime_plugin_id,
};

/// Outcome of a best-effort task status query.
///
/// The resolver never fails outward, but the original cause is preserved
/// here so callers can decide whether to log it.
#[derive(Debug)]
pub enum StatusOutcome {
    /// The engine reported a status.
    Resolved(TaskStatus),

    /// The status could not be determined; carries the reason.
    Unresolved(RuntimeError),
}

impl StatusOutcome {
    /// Renders the outcome as a canonical status name.
    ///
    /// Unresolved outcomes render as the `"UNKNOWN"` sentinel so pollers
    /// are never blocked by a transient engine outage.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Resolved(status) => status.as_str(),
            Self::Unresolved(_) => TaskStatus::Unknown.as_str(),
        }
    }

    /// Returns whether the engine actually reported a status.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Client for the container runtime engine.
///
/// Intended to be driven by a small number of concurrent callers (API
/// handlers and the lifecycle controller). All work within one operation
/// executes in the calling task; no operation spawns background work.
pub struct RuntimeClient<C: EngineConnector> {
    connections: ConnectionManager<C>,
}

impl<C: EngineConnector> RuntimeClient<C> {
    /// Creates a client over `connector` with an optional per-operation
    /// timeout.
    #[must_use]
    pub fn new(connector: C, timeout: Option<Duration>) -> Self {
        Self {
            connections: ConnectionManager::new(connector, timeout),
        }
    }

    /// Lists the runtime namespaces, excluding the reserved `default`
    /// namespace, in the engine's native listing order.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ConnectionFailed`] when no connection can be
    /// established and [`RuntimeError::ListFailed`] when the listing call
    /// fails (the connection is invalidated in that case).
    pub async fn list_namespaces(&self) -> Result<Vec<String>, RuntimeError> {
        self.run_op(async {
            let client = self.connections.connect(DEFAULT_NAMESPACE).await?;
            let namespaces = client.list_namespaces().await.map_err(|error| {
                self.connections.invalidate();
                RuntimeError::ListFailed {
                    subject: String::from("namespaces"),
                    message: error.to_string(),
                }
            })?;
            Ok(namespaces
                .into_iter()
                .filter(|namespace| namespace != DEFAULT_NAMESPACE)
                .collect())
        })
        .await
    }

    /// Lists the containers in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ConnectionFailed`] when no connection can be
    /// established and [`RuntimeError::ListFailed`] when the listing call
    /// fails (the connection is invalidated in that case).
    pub async fn list_containers(
        &self,
        namespace: &str,
    ) -> Result<Vec<Box<dyn EngineContainer>>, RuntimeError> {
        self.run_op(async {
            let client = self.connections.connect(namespace).await?;
            client.containers().await.map_err(|error| {
                self.connections.invalidate();
                RuntimeError::ListFailed {
                    subject: String::from("containers"),
                    message: error.to_string(),
                }
            })
        })
        .await
    }

    /// Fetches an existing container by id from `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::NotFound`] when no such container exists;
    /// any other engine failure invalidates the connection and propagates.
    pub async fn load_container(
        &self,
        namespace: &str,
        id: &str,
    ) -> Result<Box<dyn EngineContainer>, RuntimeError> {
        self.run_op(async {
            let client = self.connections.connect(namespace).await?;
            client.load_container(id).await.map_err(|error| {
                if !error.is_not_found() {
                    self.connections.invalidate();
                }
                error
            })
        })
        .await
    }

    /// Pulls `reference` into `namespace` and unpacks it onto the snapshot
    /// driver, making it usable as a container root filesystem.
    ///
    /// Unpacked layers persist on local storage after success; they are a
    /// cache keyed by image digest and are not rolled back if a later
    /// lifecycle step fails.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::PullFailed`] or
    /// [`RuntimeError::UnpackFailed`] naming the image; both invalidate the
    /// connection. Connection establishment failures propagate without
    /// invalidation, as the connection was never used.
    pub async fn ensure_image_pulled(
        &self,
        namespace: &str,
        reference: &str,
    ) -> Result<Box<dyn EngineImage>, RuntimeError> {
        self.run_op(async {
            let client = self.connections.connect(namespace).await?;

            let image = client.pull_image(reference).await.map_err(|error| {
                self.connections.invalidate();
                RuntimeError::PullFailed {
                    reference: String::from(reference),
                    message: error.to_string(),
                }
            })?;

            debug!(digest = image.digest(), "unpacking container image");
            image.unpack(SNAPSHOTTER).await.map_err(|error| {
                self.connections.invalidate();
                RuntimeError::UnpackFailed {
                    digest: String::from(image.digest()),
                    message: error.to_string(),
                }
            })?;

            Ok(image)
        })
        .await
    }

    /// Creates a runtime container from the pod and container descriptors.
    ///
    /// Ensures the image is pulled and unpacked, generates an execution
    /// spec from the image configuration, and creates the container with
    /// derived labels, an `overlayfs` snapshot view named after the
    /// container id, and the fixed runtime plugin identifier.
    ///
    /// # Errors
    ///
    /// Pull and unpack failures keep their own error kinds; any later
    /// failure invalidates the connection and returns
    /// [`RuntimeError::CreateFailed`] naming the image.
    pub async fn create_container(
        &self,
        pod: &PodDescriptor,
        container: &ContainerDescriptor,
    ) -> Result<Box<dyn EngineContainer>, RuntimeError> {
        self.run_op(async {
            let client = self.connections.connect(&pod.namespace).await?;

            let image = self
                .ensure_image_pulled(&pod.namespace, &container.image)
                .await?;

            let spec = client.generate_spec(image.as_ref()).await.map_err(|error| {
                self.connections.invalidate();
                RuntimeError::CreateFailed {
                    image: container.image.clone(),
                    message: error.to_string(),
                }
            })?;

            debug!(image = container.image, "create new container from image");
            let request = NewContainerRequest {
                id: container.id.clone(),
                image: container.image.clone(),
                labels: container_labels(pod, container),
                spec,
                snapshotter: String::from(SNAPSHOTTER),
                snapshot_view: container.id.clone(),
                runtime: runtime_plugin_id(),
            };
            client.create_container(request).await.map_err(|error| {
                self.connections.invalidate();
                RuntimeError::CreateFailed {
                    image: container.image.clone(),
                    message: error.to_string(),
                }
            })
        })
        .await
    }

    /// Starts a container by creating a task with no attached I/O streams
    /// and starting it.
    ///
    /// The resulting process id is logged, not returned.
    ///
    /// # Errors
    ///
    /// Either step failing invalidates the connection and returns
    /// [`RuntimeError::StartFailed`] naming the container.
    pub async fn start_container(
        &self,
        container: &dyn EngineContainer,
    ) -> Result<(), RuntimeError> {
        self.run_op(async {
            debug!(container = container.id(), "create task in container");
            let task = container.new_task().await.map_err(|error| {
                self.connections.invalidate();
                RuntimeError::StartFailed {
                    container_id: String::from(container.id()),
                    message: error.to_string(),
                }
            })?;

            debug!("starting task");
            let pid = task.start().await.map_err(|error| {
                self.connections.invalidate();
                RuntimeError::StartFailed {
                    container_id: String::from(container.id()),
                    message: error.to_string(),
                }
            })?;
            debug!(pid, "task started");
            Ok(())
        })
        .await
    }

    /// Stops a container: best-effort task teardown, then container
    /// deletion with snapshot cleanup.
    ///
    /// A missing task means "already stopped" and is silently skipped;
    /// task delete failures are likewise tolerated. Failing to delete the
    /// container leaves a dangling resource, so only that failure is
    /// surfaced.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::DeleteFailed`] naming the container when the
    /// container itself cannot be deleted (the connection is invalidated).
    pub async fn stop_container(
        &self,
        container: &dyn EngineContainer,
    ) -> Result<(), RuntimeError> {
        self.run_op(async {
            match container.task().await {
                Ok(task) => {
                    if let Err(error) = task.delete_with_kill().await {
                        debug!(container = container.id(), %error, "task delete failed during stop");
                    }
                }
                Err(error) => {
                    debug!(container = container.id(), %error, "no task to delete before removal");
                }
            }

            container.delete(true).await.map_err(|error| {
                self.connections.invalidate();
                RuntimeError::DeleteFailed {
                    container_id: String::from(container.id()),
                    message: error.to_string(),
                }
            })
        })
        .await
    }

    /// Reports whether a container has a task.
    ///
    /// A not-found task lookup maps to `Ok(false)`; any other failure
    /// propagates as-is so the caller can tell "definitely not running"
    /// apart from "unknown due to infrastructure failure". Connection
    /// state is left untouched on this path.
    ///
    /// # Errors
    ///
    /// Returns the underlying lookup error when it is anything other than
    /// not-found.
    pub async fn is_container_running(
        &self,
        container: &dyn EngineContainer,
    ) -> Result<bool, RuntimeError> {
        self.run_op(async {
            match container.task().await {
                Ok(_) => Ok(true),
                Err(error) if error.is_not_found() => Ok(false),
                Err(error) => Err(error),
            }
        })
        .await
    }

    /// Resolves a container's task status, preserving the failure cause.
    ///
    /// Failures are logged at warn level and reported as
    /// [`StatusOutcome::Unresolved`]; the caller decides what else to do
    /// with the reason.
    pub async fn resolve_task_status(&self, container_id: &str) -> StatusOutcome {
        match self.try_task_status(container_id).await {
            Ok(status) => StatusOutcome::Resolved(status),
            Err(error) => {
                warn!(container_id, %error, "unable to resolve container task status");
                StatusOutcome::Unresolved(error)
            }
        }
    }

    /// Returns a container's task status as its canonical name, or the
    /// `"UNKNOWN"` sentinel when it cannot be determined.
    ///
    /// This operation never fails: callers polling status must not be
    /// blocked or crashed by a transient engine outage.
    pub async fn container_task_status(&self, container_id: &str) -> &'static str {
        self.resolve_task_status(container_id).await.name()
    }

    async fn try_task_status(&self, container_id: &str) -> Result<TaskStatus, RuntimeError> {
        self.run_op(async {
            let client = self.connections.connect(DEFAULT_NAMESPACE).await?;
            client.task_status(container_id).await.map_err(|error| {
                if !error.is_not_found() {
                    self.connections.invalidate();
                }
                error
            })
        })
        .await
    }

    /// Runs one operation under a fresh execution context.
    ///
    /// An elapsed deadline cancels the in-flight engine call before any
    /// per-step error handling could run, so the invalidation happens here.
    async fn run_op<T, F>(&self, operation: F) -> Result<T, RuntimeError>
    where
        F: Future<Output = Result<T, RuntimeError>> + Send,
    {
        let context = self.connections.execution_context();
        match context.run(operation).await {
            Err(error @ RuntimeError::DeadlineExceeded { .. }) => {
                self.connections.invalidate();
                Err(error)
            }
            other => other,
        }
    }
}
