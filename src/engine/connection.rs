//! Connection management for the runtime engine.
//!
//! The [`ConnectionManager`] owns the lazy, namespace-scoped connection to
//! the engine. Policy is reconnect-on-next-use, not retry-with-backoff: a
//! failed operation invalidates the cached handle and the cost of
//! reconnection is deferred to the next caller. The manager never retries
//! within a single call.
//!
//! Each operation also derives an [`ExecutionContext`]: deadline-bound when
//! a positive timeout is configured, otherwise unbounded. The context is
//! scoped to exactly one operation.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use mockable::Env;

use crate::error::RuntimeError;

use super::runtime::EngineConnector;

/// Environment variable names checked in fallback order after configuration
/// sources.
const FALLBACK_ENV_VARS: &[&str] = &["DOCKER_HOST", "CONTAINER_HOST", "PODMAN_HOST"];

/// Default socket path for Unix platforms.
#[cfg(unix)]
const DEFAULT_SOCKET: &str = "unix:///var/run/docker.sock";

/// Default socket path for Windows platforms.
#[cfg(windows)]
const DEFAULT_SOCKET: &str = "npipe:////./pipe/docker_engine";

/// Resolves the engine socket endpoint from environment variables.
///
/// The resolver checks a prioritised list of environment variables when no
/// explicit configuration is provided. `E` is an environment provider
/// implementing `mockable::Env`, keeping resolution testable.
pub struct SocketResolver<'a, E: Env> {
    env: &'a E,
}

impl<'a, E: Env> SocketResolver<'a, E> {
    /// Creates a new socket resolver with the given environment provider.
    #[must_use]
    pub const fn new(env: &'a E) -> Self {
        Self { env }
    }

    /// Resolves the socket endpoint from fallback environment variables.
    ///
    /// Checks `DOCKER_HOST`, `CONTAINER_HOST` and `PODMAN_HOST` in order.
    /// Returns `None` if no fallback variable is set or all are empty.
    #[must_use]
    pub fn resolve_from_env(&self) -> Option<String> {
        FALLBACK_ENV_VARS
            .iter()
            .filter_map(|var_name| self.env.string(var_name))
            .find(|value| !value.is_empty())
    }

    /// Returns the platform default socket path.
    #[must_use]
    pub const fn default_socket() -> &'static str {
        DEFAULT_SOCKET
    }

    /// Resolves the socket endpoint without establishing a connection.
    ///
    /// Resolution order: explicit configuration, fallback environment
    /// variables, platform default.
    #[must_use]
    pub fn resolve(&self, config_socket: Option<&str>) -> String {
        config_socket
            .filter(|socket| !socket.is_empty())
            .map(String::from)
            .or_else(|| self.resolve_from_env())
            .unwrap_or_else(|| Self::default_socket().to_owned())
    }
}

/// A deadline-bound (or unbounded) execution scope for one operation.
///
/// Created fresh for every operation and released when the operation
/// returns; an elapsed deadline surfaces as
/// [`RuntimeError::DeadlineExceeded`], which callers treat like any other
/// operation failure.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext {
    timeout: Option<Duration>,
}

impl ExecutionContext {
    /// Creates a context with the given per-operation timeout.
    ///
    /// `None` (or a zero duration) yields an unbounded context.
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout: timeout.filter(|limit| !limit.is_zero()),
        }
    }

    /// Runs `operation` under this context's deadline.
    ///
    /// # Errors
    ///
    /// Returns the operation's own error, or
    /// [`RuntimeError::DeadlineExceeded`] if the deadline elapses first.
    pub async fn run<T, F>(&self, operation: F) -> Result<T, RuntimeError>
    where
        F: Future<Output = Result<T, RuntimeError>> + Send,
    {
        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, operation).await {
                Ok(result) => result,
                Err(_) => Err(RuntimeError::DeadlineExceeded { timeout: limit }),
            },
            None => operation.await,
        }
    }
}

/// Cached connection state: a small state machine instead of a hidden
/// mutable client field.
enum ConnectionState<T> {
    Disconnected,
    Connected {
        namespace: String,
        client: Arc<T>,
    },
}

/// Owns the lazy, namespace-scoped connection to the runtime engine.
///
/// At most one connection handle is cached per manager. A cached handle is
/// reused only for the namespace it was established for; requesting a
/// different namespace establishes a fresh scoped connection. Any operation
/// failure is expected to be followed by [`ConnectionManager::invalidate`]
/// so the next call starts fresh.
///
/// Concurrent callers that both observe an invalidated connection may race
/// to reconnect; each simply obtains its own fresh handle, so no
/// cross-operation coordination is needed. The internal mutex is held only
/// to read or swap the cached state, never across an engine call.
pub struct ConnectionManager<C: EngineConnector> {
    connector: C,
    timeout: Option<Duration>,
    state: Mutex<ConnectionState<C::Client>>,
}

impl<C: EngineConnector> ConnectionManager<C> {
    /// Creates a manager over `connector` with an optional per-operation
    /// timeout.
    #[must_use]
    pub fn new(connector: C, timeout: Option<Duration>) -> Self {
        Self {
            connector,
            timeout,
            state: Mutex::new(ConnectionState::Disconnected),
        }
    }

    /// Derives a fresh execution context for one operation.
    #[must_use]
    pub fn execution_context(&self) -> ExecutionContext {
        ExecutionContext::new(self.timeout)
    }

    /// Returns a connection scoped to `namespace`, establishing one if no
    /// matching connection is cached.
    ///
    /// Establishment failure leaves the cache empty; there is no in-call
    /// retry.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ConnectionFailed`] when the connection
    /// cannot be established.
    pub async fn connect(&self, namespace: &str) -> Result<Arc<C::Client>, RuntimeError> {
        if let Some(cached) = self.cached_for(namespace) {
            return Ok(cached);
        }

        let client = self
            .connector
            .connect(namespace)
            .await
            .map_err(|error| match error {
                RuntimeError::ConnectionFailed { .. } => error,
                other => RuntimeError::ConnectionFailed {
                    message: other.to_string(),
                },
            })?;
        let client = Arc::new(client);

        let mut state = self.lock_state();
        *state = ConnectionState::Connected {
            namespace: String::from(namespace),
            client: Arc::clone(&client),
        };
        Ok(client)
    }

    /// Clears the cached connection unconditionally.
    ///
    /// Called after any operation on the connection fails, regardless of
    /// error kind, so the next operation re-establishes a fresh handle.
    pub fn invalidate(&self) {
        let mut state = self.lock_state();
        *state = ConnectionState::Disconnected;
    }

    fn cached_for(&self, namespace: &str) -> Option<Arc<C::Client>> {
        let state = self.lock_state();
        match &*state {
            ConnectionState::Connected {
                namespace: cached_namespace,
                client,
            } if cached_namespace == namespace => Some(Arc::clone(client)),
            _ => None,
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ConnectionState<C::Client>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
