//! # Basket Service System
//!
//! Dependency-ordered bootstrapping of services.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`traits`]**: the [`Service`] contract, its one-shot [`LoadCallback`]
//!   and the [`ServiceKey`] identifier.
//! - **[`node`]**: [`ServiceNode`], one service's identity, dependency edges
//!   and running flag.
//! - **[`graph`]**: [`ServiceGraph`], the committed key → node map, with the
//!   merge-time cycle check.
//! - **[`registrar`]**: [`ServiceRegistrar`], which validates one batch of
//!   registrations and resolves dependency keys to nodes.
//! - **[`controller`]**: [`ServiceController`], which merges batches and
//!   drives the graph to readiness, either immediately or in rounds.
//! - **[`closure`]** / **[`adapter`]**: ready-made services wrapping a plain
//!   closure or an async-trait implementation.
//! - **[`config`]**: [`ControllerConfig`], the wait and cycle policy.
//! - **[`error`]**: [`ServiceSystemError`].
pub mod adapter;
pub mod closure;
pub mod config;
pub mod controller;
pub mod error;
pub mod graph;
pub mod node;
pub mod registrar;
pub mod traits;

// Re-export important types
pub use adapter::{AsyncService, AsyncServiceAdapter};
pub use closure::ClosureService;
pub use config::{ConfigFormat, ControllerConfig};
pub use controller::{BootstrapReport, ServiceController, SharedServiceController};
pub use error::ServiceSystemError;
pub use graph::ServiceGraph;
pub use node::ServiceNode;
pub use registrar::ServiceRegistrar;
pub use traits::{LoadCallback, LoadOutcome, Service, ServiceKey, ServiceLoadError};
