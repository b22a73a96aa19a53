//! # container_runtime
//!
//! Activation and connection supervision for the container worker.
//!
//! For each `(component, router)` request the runtime:
//!
//! 1. Resolves the component into a session factory.
//! 2. Binds it to a WebSocket or RawSocket transport factory.
//! 3. Builds a connector for the router endpoint.
//! 4. Spawns a supervisor that connects and reconnects per [`RetryPolicy`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use container_component::ComponentRegistry;
//! use container_net::NetworkConnectorFactory;
//! use container_runtime::{ComponentActivationService, ContainerWorker};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let registry = Arc::new(ComponentRegistry::new());
//!     let service = ComponentActivationService::new(
//!         registry,
//!         Arc::new(NetworkConnectorFactory::new(".")),
//!     );
//!     let container = ContainerWorker::new(service);
//!     // container.start_component(&component_json, &router_json)?;
//!     container.stop_all().await;
//! }
//! ```

pub mod activation;
pub mod container;
pub mod policy;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use activation::{ActivationError, ComponentActivationService};
pub use container::{ComponentId, ComponentSummary, ContainerError, ContainerWorker};
pub use policy::RetryPolicy;
pub use supervisor::{ConnectionSupervisor, SupervisorHandle, SupervisorState};
