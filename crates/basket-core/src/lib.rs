// Core library for the Basket service bootstrapper
pub mod kernel;
pub mod service_system;

// Re-export the types application wiring code touches directly
pub use kernel::error::Error as KernelError;
pub use kernel::error::Result;
pub use service_system::{
    AsyncService, BootstrapReport, ClosureService, ControllerConfig, LoadCallback, LoadOutcome,
    Service, ServiceController, ServiceKey, ServiceLoadError, ServiceRegistrar,
    SharedServiceController,
};
