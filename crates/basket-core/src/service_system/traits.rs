use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;

/// Unique identifier of a service within a controller's graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceKey(String);

impl ServiceKey {
    /// Create a key from anything string-like
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for ServiceKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&ServiceKey> for ServiceKey {
    fn from(key: &ServiceKey) -> Self {
        key.clone()
    }
}

impl Borrow<str> for ServiceKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ServiceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Error a service reports alongside a failed load
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ServiceLoadError {
    message: String,
}

impl ServiceLoadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// What a service reported through its [`LoadCallback`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Whether the service finished loading
    pub loaded: bool,
    /// Optional error describing a failed load
    pub error: Option<ServiceLoadError>,
}

impl LoadOutcome {
    pub fn success() -> Self {
        Self {
            loaded: true,
            error: None,
        }
    }

    pub fn failure(error: ServiceLoadError) -> Self {
        Self {
            loaded: false,
            error: Some(error),
        }
    }
}

/// One-shot completion handle handed to [`Service::load_service`].
///
/// Consuming `self` on every completion method means a service can report at
/// most once. Dropping the callback without reporting counts as a failed load.
#[derive(Debug)]
pub struct LoadCallback {
    key: ServiceKey,
    sender: oneshot::Sender<LoadOutcome>,
}

impl LoadCallback {
    /// Create a callback for `key` together with the receiving end the
    /// scheduler waits on.
    pub fn channel(key: ServiceKey) -> (Self, oneshot::Receiver<LoadOutcome>) {
        let (sender, receiver) = oneshot::channel();
        (Self { key, sender }, receiver)
    }

    /// Key of the service this callback belongs to
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    /// Report the load result
    pub fn complete(self, loaded: bool, error: Option<ServiceLoadError>) {
        if let Err(outcome) = self.sender.send(LoadOutcome { loaded, error }) {
            // Receiver gone: the controller that started this load no longer exists
            log::debug!(
                "Dropping load result for service {} (loaded={}): nobody is waiting",
                self.key,
                outcome.loaded
            );
        }
    }

    /// Report a successful load
    pub fn succeed(self) {
        self.complete(true, None);
    }

    /// Report a failed load
    pub fn fail(self, error: ServiceLoadError) {
        self.complete(false, Some(error));
    }
}

/// A unit of initialization logic.
///
/// `load_service` begins the load and must eventually fire `callback`
/// exactly once, from any thread. Both the staged and the immediate strategy
/// invoke it on tokio's blocking pool, so implementations may block briefly
/// or spawn onto the runtime with `tokio::spawn`.
pub trait Service: Send + Sync {
    /// Begin loading the service
    fn load_service(&self, callback: LoadCallback);

    /// Human-readable name used when describing graph nodes
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
