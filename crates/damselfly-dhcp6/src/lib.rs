//! Damselfly DHCPv6 message processing
//!
//! This crate is the core of a configuration-driven DHCPv6 server. A
//! configuration tree is compiled once into an immutable pipeline of
//! filters (gating conditions) and handlers (response-building actions);
//! every inbound message then walks that pipeline concurrently and in
//! isolation, accumulating an answer or deliberately withholding one.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    Server                            │
//! │  ┌────────────────────────────────────────────────┐  │
//! │  │  Listener (per endpoint)                       │  │
//! │  │    decode datagram → stamp initial marks       │  │
//! │  └────────────────────────────────────────────────┘  │
//! │                        │                             │
//! │                        ▼                             │
//! │  ┌────────────────────────────────────────────────┐  │
//! │  │  Dispatcher                                    │  │
//! │  │    fresh marks + response per request          │  │
//! │  │    walk compiled pipeline, document order      │  │
//! │  │    Answer | NoAnswer | Error                   │  │
//! │  └────────────────────────────────────────────────┘  │
//! │                        │                             │
//! │                        ▼                             │
//! │  ┌────────────────────────────────────────────────┐  │
//! │  │  ServerEvent Stream                            │  │
//! │  │    Request | Answer | NoAnswer | RequestError  │  │
//! │  └────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! The pipeline tree is the only state shared across requests and is
//! read-only for the lifetime of a configuration generation; reloads swap
//! in a freshly compiled tree atomically while in-flight walks finish on
//! the generation they started with.
//!
//! # Example
//!
//! ```ignore
//! use damselfly_dhcp6::{Server, ServerConfig};
//!
//! let config: ServerConfig = serde_json::from_str(config_json)?;
//! let server = Server::new(config)?;
//!
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! server.run(shutdown_rx).await?;
//! ```

pub mod config;
pub mod dispatcher;
pub mod duid;
pub mod error;
pub mod listener;
pub mod marks;
pub mod message;
pub mod pipeline;
pub mod response;
pub mod server;
pub mod transaction;

pub use config::*;
pub use dispatcher::*;
pub use duid::*;
pub use error::*;
pub use listener::*;
pub use marks::*;
pub use message::*;
pub use response::*;
pub use server::*;
pub use transaction::*;

pub use pipeline::{
    compile_pipeline, compile_with_registry, ControlFlow, Filter, Handler, Node, Pipeline,
};
