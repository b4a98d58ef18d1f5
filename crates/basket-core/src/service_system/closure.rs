use std::fmt;
use std::sync::Mutex;

use crate::service_system::traits::{LoadCallback, Service, ServiceLoadError};

/// Wraps a zero-argument closure as a service that always succeeds.
///
/// The closure runs synchronously inside `load_service`, then the callback
/// reports success.
pub struct ClosureService {
    closure: Mutex<Box<dyn FnMut() + Send>>,
}

impl ClosureService {
    pub fn new<F>(closure: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self {
            closure: Mutex::new(Box::new(closure)),
        }
    }
}

impl Service for ClosureService {
    fn load_service(&self, callback: LoadCallback) {
        match self.closure.lock() {
            Ok(mut closure) => {
                (**closure)();
                callback.succeed();
            }
            Err(_) => {
                // A previous invocation panicked while holding the lock
                callback.fail(ServiceLoadError::new("closure service lock poisoned"));
            }
        }
    }

    fn name(&self) -> &str {
        "ClosureService"
    }
}

impl fmt::Debug for ClosureService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClosureService")
    }
}
