//! Error types for the DHCPv6 server
//!
//! This module separates the three failure domains: configuration
//! compilation, per-request dispatch, and transport plumbing.

use std::net::SocketAddr;
use thiserror::Error;

/// Error raised while compiling a configuration tree into a pipeline
///
/// Compilation errors are fatal to startup or reload; they never occur
/// at request time. A failed reload leaves the previous pipeline serving.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Section type name not present in the registry
    #[error("unknown section type `{kind}`")]
    UnknownSection { kind: String },

    /// Handler sections are leaves and cannot nest
    #[error("handler section `{kind}` cannot contain nested sections")]
    HandlerWithChildren { kind: String },

    /// Required parameter absent from the section
    #[error("section `{kind}` is missing required parameter `{param}`")]
    MissingParameter { kind: String, param: &'static str },

    /// Parameter present but unusable
    #[error("section `{kind}` has invalid parameter `{param}`: {reason}")]
    InvalidParameter {
        kind: String,
        param: &'static str,
        reason: String,
    },
}

/// Error raised inside one request's pipeline walk
///
/// Scoped to a single request: the dispatcher logs it and resolves that
/// request to the error disposition without affecting any other request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A filter condition could not be evaluated
    #[error("filter `{kind}` could not be evaluated: {reason}")]
    FilterEvaluation { kind: &'static str, reason: String },

    /// A handler failed while mutating the response or consulting a collaborator
    #[error("handler `{kind}` failed: {source}")]
    HandlerEffect {
        kind: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// The walk task panicked; caught at the dispatch boundary so other
    /// requests keep running
    #[error("pipeline walk panicked: {reason}")]
    Panicked { reason: String },
}

/// Error type for server and listener operations
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind a listener socket
    #[error("failed to bind to {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Inbound datagram was not a decodable DHCPv6 message
    #[error("failed to decode DHCPv6 message from {source_addr}: {reason}")]
    DecodeFailed {
        source_addr: SocketAddr,
        reason: String,
    },

    /// Outgoing reply could not be encoded
    #[error("failed to encode DHCPv6 response: {0}")]
    EncodeFailed(String),

    /// Socket send error
    #[error("failed to send response: {0}")]
    SendFailed(#[from] std::io::Error),

    /// The configured server identifier is not a valid DUID
    #[error("invalid server identifier: {0}")]
    InvalidServerId(String),

    /// Pipeline configuration rejected at compile time
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for server operations
pub type Result<T> = std::result::Result<T, ServerError>;
