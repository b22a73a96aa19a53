//! # container_net
//!
//! Transport layer of the container worker.
//!
//! This crate provides:
//!
//! - [`transport`]: router, transport and serializer descriptors.
//! - [`endpoint`]: TCP and Unix endpoint descriptors.
//! - [`factory`]: [`build_transport_factory`] and the client factories.
//! - [`rawsocket`] / [`websocket`]: framing and session drivers.
//! - [`connector`]: the [`EndpointConnector`] seam and its network implementation.
//! - [`codec`]: JSON and MessagePack serializers.
//! - [`error`]: network-layer error types.

pub mod codec;
pub mod connector;
pub mod endpoint;
pub mod error;
pub mod factory;
pub mod rawsocket;
pub mod transport;
pub mod websocket;

pub use codec::{Serializer, decode, encode};
pub use connector::{
    ConnectResult, ConnectedSession, ConnectorFactory, EndpointConnector, NetworkConnector,
    NetworkConnectorFactory,
};
pub use endpoint::EndpointSpec;
pub use error::{ConnectError, NetError};
pub use factory::{
    RawSocketClientFactory, TransportClientFactory, WebSocketClientFactory,
    build_transport_factory,
};
pub use transport::{RawSocketSpec, RouterTarget, TransportSpec, WebSocketSpec};
