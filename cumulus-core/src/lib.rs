//! Cumulus Core
//!
//! Typed declarations of infrastructure resources, the references between
//! them, and the named outputs handed to a provisioning engine.

pub mod access;
pub mod config;
pub mod declaration;
pub mod diagnostics;
pub mod graph;
pub mod outputs;
pub mod providers;
pub mod resource;
pub mod schema;
pub mod stack;

pub use declaration::{DeclarationError, DeclarationSet, DeclarationSetBuilder, Handle};
pub use resource::{Reference, Resource, ResourceId, Value};
