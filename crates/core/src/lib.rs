//! # migratory-core
//!
//! Foundation crate for the migratory schema migration engine.
//!
//! Holds the pieces the engine consumes but does not own: the project and
//! environment descriptors, the environment resolution trait, and the
//! `${name}` template renderer used on SQL script bodies. Connection
//! string syntax and credential handling stay opaque here; descriptors
//! carry DSNs as plain strings for the engine's session layer to open.

pub mod error;
pub mod project;
pub mod template;

pub use error::{CoreError, CoreResult};
pub use project::{Environment, EnvironmentResolver, Project, StaticResolver};
pub use template::render;
