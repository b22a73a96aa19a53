//! Error types for component descriptors and resolution.

/// Stable reason code for an unknown component kind.
pub const REASON_UNKNOWN_COMPONENT_KIND: &str = "unknown-component-kind";
/// Stable reason code for a packaged entry point that could not be loaded.
pub const REASON_ENTRYPOINT_LOAD_FAILED: &str = "entrypoint-load-failed";
/// Stable reason code for a qualified class that could not be loaded.
pub const REASON_CLASS_LOAD_FAILED: &str = "class-load-failed";
/// Stable reason code for a malformed descriptor.
pub const REASON_INVALID_CONFIGURATION: &str = "invalid-configuration";
/// Stable reason code for an unknown transport kind.
pub const REASON_UNKNOWN_TRANSPORT_KIND: &str = "unknown-transport-kind";

/// Errors raised while turning a component descriptor into a session factory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// The descriptor names a component kind this worker does not host.
    ///
    /// A configuration error: see [`ResolutionError::is_configuration`].
    /// Its reason code stays `unknown-component-kind` so callers can tell it
    /// apart from a malformed descriptor of a known kind.
    #[error("unknown component type '{0}'")]
    UnknownKind(String),

    /// The descriptor has a known kind but its fields do not parse.
    #[error("invalid component configuration: {detail}")]
    Malformed {
        /// What was wrong with the descriptor.
        detail: String,
    },

    /// The packaged entry point is not registered.
    #[error("failed to load entry point: {detail}")]
    EntryPointLoadFailed {
        /// Which lookup failed.
        detail: String,
    },

    /// The qualified class could not be located.
    #[error("failed to load class: {detail}")]
    ClassLoadFailed {
        /// Which lookup failed.
        detail: String,
    },
}

impl ResolutionError {
    /// The stable, machine-readable reason code.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::UnknownKind(_) => REASON_UNKNOWN_COMPONENT_KIND,
            Self::Malformed { .. } => REASON_INVALID_CONFIGURATION,
            Self::EntryPointLoadFailed { .. } => REASON_ENTRYPOINT_LOAD_FAILED,
            Self::ClassLoadFailed { .. } => REASON_CLASS_LOAD_FAILED,
        }
    }

    /// Returns `true` if the descriptor itself is at fault, as opposed to a
    /// well-formed descriptor naming something that is not registered.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::UnknownKind(_) | Self::Malformed { .. })
    }
}

/// Errors in transport or endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// The transport descriptor names a kind this worker cannot build.
    #[error("unknown transport type '{0}'")]
    UnknownTransportKind(String),

    /// The descriptor is structurally or semantically invalid.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigurationError {
    /// The stable, machine-readable reason code.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::UnknownTransportKind(_) => REASON_UNKNOWN_TRANSPORT_KIND,
            Self::Invalid(_) => REASON_INVALID_CONFIGURATION,
        }
    }
}

/// The transport behind an [`Outbox`](crate::Outbox) has shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("session transport is closed")]
pub struct SessionClosed;
