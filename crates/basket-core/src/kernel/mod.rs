//! # Basket Core Kernel
//!
//! Crate-wide plumbing shared by the service system: the top-level
//! [`Error`](error::Error) type with its `Result` alias, and the constants
//! that seed the scheduler's defaults.
pub mod constants;
pub mod error;

pub use error::{Error, Result};
