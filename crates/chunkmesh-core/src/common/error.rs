//! Error types for the server coordinator.
//!
//! This module defines the central `Error` enum, which captures the
//! recoverable and reportable error cases within the coordinator. Most errors
//! here are logged and handled locally (see the propagation policy in the
//! coordinator's dispatch/supervision modules); only setup failures during
//! startup are fatal.

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the server coordinator.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Internal channel send/receive failure (e.g. closed or full channel).
    #[error("channel error: {context}")]
    ChannelError { context: String },

    /// Registering with the cluster registry failed. Fatal to startup.
    #[error("cluster registration failed: {0}")]
    RegistrationFailed(String),

    /// Enumerating the cluster's clients failed. Not fatal: the coordinator
    /// proceeds with an empty client set and relies on late discovery.
    #[error("client enumeration failed: {0}")]
    EnumerationFailed(String),

    /// Querying the local CPU count failed. Fatal to startup.
    #[error("CPU discovery failed: {0}")]
    CpuDiscoveryFailed(String),
}
