//! Container engine connection and lifecycle management.
//!
//! This module provides the client through which the daemon drives the
//! container runtime engine: namespace listing, image pull and unpack,
//! container create/start/stop, and defensive status resolution. The engine
//! surface is expressed as traits in [`runtime`], with the production
//! binding in [`docker`].
//!
//! The socket endpoint is resolved through a priority-based fallback chain:
//!
//! 1. CLI argument (`--engine-socket`)
//! 2. Config file (`engine_socket` in TOML)
//! 3. `EDGED_ENGINE_SOCKET` environment variable
//! 4. `DOCKER_HOST` environment variable
//! 5. `CONTAINER_HOST` environment variable
//! 6. `PODMAN_HOST` environment variable
//! 7. Platform default (`/var/run/docker.sock` on Unix)
//!
//! Connections are namespace-scoped and cached between operations; any
//! operation failure invalidates the cached connection so the next call
//! establishes a fresh one.

mod connection;
mod docker;
mod lifecycle;
mod runtime;

pub use connection::{ConnectionManager, ExecutionContext, SocketResolver};
pub use docker::{DockerConnector, DockerEngine};
pub use lifecycle::{RuntimeClient, StatusOutcome};
pub use runtime::{
    EngineClient, EngineConnector, EngineContainer, EngineFuture, EngineImage, EngineTask,
    NewContainerRequest, RUNTIME_PLATFORM, RUNTIME_PLUGIN_NAME, RuntimeSpec, SNAPSHOTTER,
    TaskStatus, runtime_plugin_id,
};
