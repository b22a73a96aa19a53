//! # container_component
//!
//! What a container worker hosts: application sessions and the descriptors
//! that name them.
//!
//! This crate provides:
//!
//! - [`Session`] trait: the contract every hosted component satisfies.
//! - [`SessionFactory`]: a fresh session per connection attempt.
//! - [`ComponentSpec`]: packaged entry point or qualified class descriptors.
//! - [`ComponentRegistry`]: the plugin registration table and resolver.
//! - [`error`]: resolution and configuration errors with stable reason codes.

pub mod error;
pub mod registry;
pub mod session;
pub mod spec;

pub use error::{ConfigurationError, ResolutionError, SessionClosed};
pub use registry::ComponentRegistry;
pub use session::{
    CloseReason, ComponentConfig, Outbox, Session, SessionConstructor, SessionDetails,
    SessionFactory,
};
pub use spec::ComponentSpec;
