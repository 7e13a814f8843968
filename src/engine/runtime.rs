//! Abstract surface of the container runtime engine.
//!
//! The lifecycle client is written against these traits rather than a
//! concrete engine API. Methods return boxed futures so the traits stay
//! object-safe and test doubles can script behaviour without a running
//! engine; the production binding lives in [`crate::engine::docker`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

/// The snapshot filesystem driver images are unpacked onto.
pub const SNAPSHOTTER: &str = "overlayfs";

/// The runtime plugin family containers are created under.
pub const RUNTIME_PLUGIN_NAME: &str = "io.containerd.runtime.v1";

/// The platform suffix of the runtime plugin identifier.
///
/// Fixed to the host OS family; currently only one value is supported.
pub const RUNTIME_PLATFORM: &str = "linux";

/// Composes the full runtime plugin identifier, `<plugin-name>.<platform>`.
#[must_use]
pub fn runtime_plugin_id() -> String {
    format!("{RUNTIME_PLUGIN_NAME}.{RUNTIME_PLATFORM}")
}

/// Boxed future type returned by all engine-surface trait methods.
pub type EngineFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, RuntimeError>> + Send + 'a>>;

/// Canonical process status of a container task, as defined by the runtime
/// engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    /// The task exists but has not been started.
    Created,
    /// The task's process is running.
    Running,
    /// The task's process has exited.
    Stopped,
    /// The task's process is paused.
    Paused,
    /// The task's process is transitioning to paused.
    Pausing,
    /// The engine could not determine the status.
    Unknown,
}

impl TaskStatus {
    /// Returns the canonical uppercase name of this status.
    ///
    /// [`TaskStatus::Unknown`] renders exactly `"UNKNOWN"`, which doubles as
    /// the sentinel the status resolver substitutes on failure.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
            Self::Paused => "PAUSED",
            Self::Pausing => "PAUSING",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An opaque runtime execution spec derived from an image's configuration.
///
/// The client never interprets the spec beyond handing it back to the
/// engine at container-creation time; accessors exist so bindings can
/// translate it into their native create payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSpec(serde_json::Value);

impl RuntimeSpec {
    /// Wraps a raw spec document.
    #[must_use]
    pub const fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Returns the underlying spec document.
    #[must_use]
    pub const fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Returns the process argument vector, if the spec carries one.
    #[must_use]
    pub fn args(&self) -> Option<Vec<String>> {
        self.string_array("args")
    }

    /// Returns the process environment in `KEY=value` form, if present.
    #[must_use]
    pub fn env(&self) -> Option<Vec<String>> {
        self.string_array("env")
    }

    /// Returns the process working directory, if present.
    #[must_use]
    pub fn cwd(&self) -> Option<String> {
        self.0
            .get("process")
            .and_then(|process| process.get("cwd"))
            .and_then(serde_json::Value::as_str)
            .map(String::from)
    }

    fn string_array(&self, field: &str) -> Option<Vec<String>> {
        self.0
            .get("process")
            .and_then(|process| process.get(field))
            .and_then(serde_json::Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(serde_json::Value::as_str)
                    .map(String::from)
                    .collect()
            })
    }
}

/// Parameters for creating a runtime container.
#[derive(Debug, Clone)]
pub struct NewContainerRequest {
    /// The container identity.
    pub id: String,

    /// The image reference backing the container's root filesystem.
    pub image: String,

    /// Labels attached to the container, derived from pod and container
    /// descriptors.
    pub labels: HashMap<String, String>,

    /// The runtime execution spec.
    pub spec: RuntimeSpec,

    /// The snapshot filesystem driver name.
    pub snapshotter: String,

    /// The name of the snapshot view created over the unpacked image.
    pub snapshot_view: String,

    /// The runtime plugin identifier, `<plugin-name>.<platform>`.
    pub runtime: String,
}

/// Establishes namespace-scoped connections to the runtime engine.
///
/// A connection handle is scoped to exactly one namespace; connecting is
/// expected to verify the engine is reachable so that establishment
/// failures surface here rather than on the first operation.
pub trait EngineConnector: Send + Sync {
    /// The connection handle type produced by this connector.
    type Client: EngineClient + Send + Sync + 'static;

    /// Establishes a fresh connection scoped to `namespace`.
    fn connect<'a>(&'a self, namespace: &str) -> EngineFuture<'a, Self::Client>;
}

/// A live, namespace-scoped connection to the runtime engine.
pub trait EngineClient: Send + Sync {
    /// Lists all namespaces known to the engine, in its native order.
    fn list_namespaces(&self) -> EngineFuture<'_, Vec<String>>;

    /// Lists the containers in this connection's namespace.
    fn containers(&self) -> EngineFuture<'_, Vec<Box<dyn EngineContainer>>>;

    /// Pulls `reference` into this connection's namespace.
    fn pull_image<'a>(&'a self, reference: &str) -> EngineFuture<'a, Box<dyn EngineImage>>;

    /// Generates a runtime execution spec from the image's configuration.
    fn generate_spec<'a>(&'a self, image: &'a dyn EngineImage) -> EngineFuture<'a, RuntimeSpec>;

    /// Creates a runtime container.
    fn create_container(
        &self,
        request: NewContainerRequest,
    ) -> EngineFuture<'_, Box<dyn EngineContainer>>;

    /// Fetches an existing container by id.
    ///
    /// Fails with a not-found error when no such container exists.
    fn load_container<'a>(&'a self, id: &str) -> EngineFuture<'a, Box<dyn EngineContainer>>;

    /// Queries the process status of a container's task.
    fn task_status<'a>(&'a self, container_id: &str) -> EngineFuture<'a, TaskStatus>;
}

/// A pulled image, addressable by reference and content digest.
pub trait EngineImage: Send + Sync {
    /// The reference the image was pulled by.
    fn reference(&self) -> &str;

    /// The image's content digest.
    fn digest(&self) -> &str;

    /// Unpacks the image's layers onto the named snapshot driver.
    ///
    /// Unpacking is required before the image can back a container's root
    /// filesystem.
    fn unpack<'a>(&'a self, snapshotter: &str) -> EngineFuture<'a, ()>;
}

/// A runtime container. Owns zero or one task at a time.
pub trait EngineContainer: Send + Sync {
    /// The container identity.
    fn id(&self) -> &str;

    /// The labels attached at creation time.
    fn labels(&self) -> &HashMap<String, String>;

    /// Creates a task for this container with no attached I/O streams.
    fn new_task(&self) -> EngineFuture<'_, Box<dyn EngineTask>>;

    /// Fetches the container's current task.
    ///
    /// Fails with a not-found error when the container has no task, which
    /// callers read as "not running".
    fn task(&self) -> EngineFuture<'_, Box<dyn EngineTask>>;

    /// Deletes the container, optionally cleaning up its snapshot view.
    fn delete(&self, cleanup_snapshot: bool) -> EngineFuture<'_, ()>;
}

/// The running-process handle of a container.
///
/// Tasks are created, started and deleted independently of the container
/// object; deleting a task does not delete its container.
pub trait EngineTask: Send + Sync {
    /// The OS process id, once the task has been started.
    fn pid(&self) -> Option<u32>;

    /// Starts the task's process, returning its pid.
    fn start(&self) -> EngineFuture<'_, u32>;

    /// Deletes the task, killing its process if still running.
    fn delete_with_kill(&self) -> EngineFuture<'_, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TaskStatus::Created, "CREATED")]
    #[case(TaskStatus::Running, "RUNNING")]
    #[case(TaskStatus::Stopped, "STOPPED")]
    #[case(TaskStatus::Paused, "PAUSED")]
    #[case(TaskStatus::Pausing, "PAUSING")]
    #[case(TaskStatus::Unknown, "UNKNOWN")]
    fn task_status_renders_canonical_name(#[case] status: TaskStatus, #[case] expected: &str) {
        assert_eq!(status.as_str(), expected);
        assert_eq!(status.to_string(), expected);
    }

    #[rstest]
    fn runtime_plugin_id_composes_name_and_platform() {
        assert_eq!(runtime_plugin_id(), "io.containerd.runtime.v1.linux");
    }

    #[rstest]
    fn spec_accessors_read_process_section() {
        let spec = RuntimeSpec::new(serde_json::json!({
            "process": {
                "args": ["/bin/app", "--serve"],
                "env": ["PATH=/usr/bin"],
                "cwd": "/srv",
            }
        }));
        assert_eq!(
            spec.args(),
            Some(vec![String::from("/bin/app"), String::from("--serve")])
        );
        assert_eq!(spec.env(), Some(vec![String::from("PATH=/usr/bin")]));
        assert_eq!(spec.cwd(), Some(String::from("/srv")));
    }

    #[rstest]
    fn spec_accessors_tolerate_missing_sections() {
        let spec = RuntimeSpec::new(serde_json::json!({}));
        assert_eq!(spec.args(), None);
        assert_eq!(spec.env(), None);
        assert_eq!(spec.cwd(), None);
    }
}
