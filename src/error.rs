//! Semantic error types for the edged daemon.
//!
//! This module defines the error hierarchy for edged, following the principle
//! of using semantic error enums (via `thiserror`) for conditions the caller
//! might inspect or map to an API status, while reserving opaque errors
//! (`eyre::Report`) for the application boundary.
//!
//! Runtime-engine failures fall into three kinds with distinct handling:
//!
//! - **connection failures** always invalidate the cached engine connection
//!   so the next operation starts fresh;
//! - **not-found** distinguishes "resource absent" from "operation failed"
//!   and is tolerated on specific paths (running probes, pre-stop task
//!   lookup);
//! - **operation failures** carry the subject they concern (image reference,
//!   digest, container id) and also invalidate the connection.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read or parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A required configuration value is missing.
    #[error("missing required configuration: {field}")]
    MissingRequired {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// The `OrthoConfig` library returned an error during layer merging.
    #[error("configuration loading failed: {0}")]
    OrthoConfig(std::sync::Arc<ortho_config::OrthoError>),
}

/// Errors that can occur while driving the container runtime engine.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Failed to establish or use the engine connection.
    #[error("unable to connect to the runtime engine: {message}")]
    ConnectionFailed {
        /// A description of the connection failure.
        message: String,
    },

    /// The requested resource does not exist on the engine.
    ///
    /// Callers use [`RuntimeError::is_not_found`] to tell "absent" apart
    /// from "failed": a missing task means a container is simply not
    /// running, which is not an error on probe paths.
    #[error("not found: {resource}")]
    NotFound {
        /// A description of the missing resource.
        resource: String,
    },

    /// The operation deadline elapsed before the engine call completed.
    #[error("operation timed out after {timeout:?}")]
    DeadlineExceeded {
        /// The configured per-operation timeout.
        timeout: Duration,
    },

    /// Failed to pull an image.
    #[error("error pulling image '{reference}': {message}")]
    PullFailed {
        /// The image reference that could not be pulled.
        reference: String,
        /// A description of the pull failure.
        message: String,
    },

    /// Failed to unpack a pulled image onto the snapshot filesystem.
    #[error("error unpacking image '{digest}': {message}")]
    UnpackFailed {
        /// The content digest of the image that could not be unpacked.
        digest: String,
        /// A description of the unpack failure.
        message: String,
    },

    /// Failed to create a container.
    #[error("failed to create container from image '{image}': {message}")]
    CreateFailed {
        /// The image reference the container was created from.
        image: String,
        /// A description of the creation failure.
        message: String,
    },

    /// Failed to create or start the container's task.
    #[error("failed to start container '{container_id}': {message}")]
    StartFailed {
        /// The id of the container that failed to start.
        container_id: String,
        /// A description of the start failure.
        message: String,
    },

    /// Failed to delete a container.
    #[error("failed to delete container '{container_id}': {message}")]
    DeleteFailed {
        /// The id of the container that could not be deleted.
        container_id: String,
        /// A description of the delete failure.
        message: String,
    },

    /// Failed to list namespaces or containers.
    #[error("failed to list {subject}: {message}")]
    ListFailed {
        /// What was being listed (namespaces, containers).
        subject: String,
        /// A description of the listing failure.
        message: String,
    },

    /// A raw engine failure before the lifecycle layer adds context.
    #[error("runtime engine error: {message}")]
    Engine {
        /// A description of the engine failure.
        message: String,
    },
}

impl RuntimeError {
    /// Returns whether this error reports an absent resource rather than a
    /// failed operation.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Top-level error type for the edged daemon.
///
/// Aggregates all domain-specific errors into a single type. At the binary
/// boundary (main.rs) these are converted to `eyre::Report` for
/// human-readable reporting.
#[derive(Debug, Error)]
pub enum EdgedError {
    /// An error occurred during configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred while driving the runtime engine.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// A specialised `Result` type for edged operations.
pub type Result<T> = std::result::Result<T, EdgedError>;
