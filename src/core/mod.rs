//! # Core Module
//!
//! Shared primitives used by every other part of the engine: the thread-safe
//! resource container that wraps chunks and the chunk map, the error types
//! returned by fallible operations, and the engine configuration.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource with read-write locking
//! - `error`: `thiserror`-derived error enums, one per subsystem
//! - `config`: `EngineConfig` and its sections, loadable from JSON

pub mod config;
pub mod error;
pub mod mt_resource;

pub use mt_resource::MtResource;
