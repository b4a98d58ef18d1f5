use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::service_system::traits::{LoadCallback, Service, ServiceLoadError};

/// A service whose load is naturally written as an async function
#[async_trait]
pub trait AsyncService: Send + Sync + 'static {
    /// Load the service, resolving once it is usable
    async fn load(&self) -> Result<(), ServiceLoadError>;

    /// Human-readable name used when describing graph nodes
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Bridges an [`AsyncService`] to the callback-based [`Service`] contract by
/// spawning the load future onto the current tokio runtime.
pub struct AsyncServiceAdapter<S: AsyncService> {
    inner: Arc<S>,
}

impl<S: AsyncService> AsyncServiceAdapter<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn from_arc(inner: Arc<S>) -> Self {
        Self { inner }
    }

    /// Access the wrapped service
    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }
}

impl<S: AsyncService> Service for AsyncServiceAdapter<S> {
    fn load_service(&self, callback: LoadCallback) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                callback.fail(ServiceLoadError::new(format!("no tokio runtime available: {}", e)));
                return;
            }
        };

        let inner = Arc::clone(&self.inner);
        handle.spawn(async move {
            match inner.load().await {
                Ok(()) => callback.succeed(),
                Err(e) => callback.fail(e),
            }
        });
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

impl<S: AsyncService> fmt::Debug for AsyncServiceAdapter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncServiceAdapter")
            .field("inner", &self.inner.name())
            .finish()
    }
}
