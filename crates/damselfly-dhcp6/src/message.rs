//! Inbound DHCPv6 requests
//!
//! This module wraps a decoded DHCPv6 message together with the transport
//! metadata the pipeline needs. A `RequestInfo` is immutable for its whole
//! lifetime: one is created per inbound datagram and owned by that
//! request's dispatch task.

use std::net::SocketAddr;

use dhcproto::v6::{DhcpOption, Message, MessageType, OptionCode};
use dhcproto::Decodable;

use crate::duid::Duid;
use crate::error::ServerError;

/// A decoded inbound request with its transport metadata
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// Decoded message; never mutated after creation
    message: Message,

    /// Source address of the datagram
    source: SocketAddr,

    /// Name of the listener that received it
    listener: String,

    /// Whether the datagram arrived over the DHCPv6 multicast group
    received_over_multicast: bool,
}

impl RequestInfo {
    /// Wrap an already-decoded message
    pub fn new(
        message: Message,
        source: SocketAddr,
        listener: impl Into<String>,
        received_over_multicast: bool,
    ) -> Self {
        Self {
            message,
            source,
            listener: listener.into(),
            received_over_multicast,
        }
    }

    /// Decode a request from raw wire bytes
    pub fn decode(
        data: &[u8],
        source: SocketAddr,
        listener: &str,
        received_over_multicast: bool,
    ) -> Result<Self, ServerError> {
        let message = Message::from_bytes(data).map_err(|e| ServerError::DecodeFailed {
            source_addr: source,
            reason: e.to_string(),
        })?;

        Ok(Self::new(message, source, listener, received_over_multicast))
    }

    /// The decoded message
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// DHCPv6 message type
    pub fn message_type(&self) -> MessageType {
        self.message.msg_type()
    }

    /// Transaction id of the request
    pub fn xid(&self) -> [u8; 3] {
        self.message.xid()
    }

    /// Source address of the datagram
    pub fn source(&self) -> SocketAddr {
        self.source
    }

    /// Name of the listener that received this request
    pub fn listener(&self) -> &str {
        &self.listener
    }

    /// Whether the request arrived over multicast
    pub fn received_over_multicast(&self) -> bool {
        self.received_over_multicast
    }

    /// The client's DUID, if the request carries a Client Identifier option
    pub fn client_duid(&self) -> Option<Duid> {
        match self.message.opts().get(OptionCode::ClientId) {
            Some(DhcpOption::ClientId(raw)) => Some(Duid::new(raw.clone())),
            _ => None,
        }
    }

    /// The raw Client Identifier option, for echoing into a reply
    pub fn client_id_option(&self) -> Option<DhcpOption> {
        match self.message.opts().get(OptionCode::ClientId) {
            Some(opt @ DhcpOption::ClientId(_)) => Some(opt.clone()),
            _ => None,
        }
    }

    /// Whether the request asks for Rapid Commit
    pub fn wants_rapid_commit(&self) -> bool {
        self.message.opts().get(OptionCode::RapidCommit).is_some()
    }
}

/// Resolve a configured message type name to the protocol type
///
/// Only client-originated types are nameable in configuration.
pub fn message_type_from_name(name: &str) -> Option<MessageType> {
    match name {
        "solicit" => Some(MessageType::Solicit),
        "request" => Some(MessageType::Request),
        "confirm" => Some(MessageType::Confirm),
        "renew" => Some(MessageType::Renew),
        "rebind" => Some(MessageType::Rebind),
        "release" => Some(MessageType::Release),
        "decline" => Some(MessageType::Decline),
        "information-request" => Some(MessageType::InformationRequest),
        _ => None,
    }
}
