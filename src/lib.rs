//! Collection engine: a durable job queue, rate-limited upstream fetcher,
//! and task state machine for ingesting posts and comments from a
//! VK-like social network API.

pub mod config;
pub mod domain;
pub mod error;
pub mod upstream;

#[cfg(feature = "database")]
pub mod queue;
#[cfg(feature = "database")]
pub mod service;
#[cfg(feature = "database")]
pub mod store;
#[cfg(feature = "database")]
pub mod worker;

#[cfg(feature = "server")]
pub mod api;

pub use error::{EngineError, EngineResult};
