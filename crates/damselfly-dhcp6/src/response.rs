//! DHCPv6 response accumulation
//!
//! Handlers append options to a `ResponseBuilder` as the pipeline walks;
//! the dispatcher finalizes it into a reply message once the walk ends in
//! an answer. The builder is created fresh for every request and discarded
//! with it.

use dhcproto::v6::{DhcpOption, Message, MessageType};
use dhcproto::Encodable;

use crate::duid::Duid;
use crate::error::ServerError;
use crate::message::RequestInfo;

/// Mutable accumulator for one request's reply
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    reply_type: MessageType,
    options: Vec<DhcpOption>,
}

impl ResponseBuilder {
    /// Create an empty builder for the given reply type
    pub fn new(reply_type: MessageType) -> Self {
        Self {
            reply_type,
            options: Vec::new(),
        }
    }

    /// The reply message type
    pub fn reply_type(&self) -> MessageType {
        self.reply_type
    }

    /// Change the reply message type
    pub fn set_reply_type(&mut self, reply_type: MessageType) {
        self.reply_type = reply_type;
    }

    /// Append an option to the reply
    pub fn push_option(&mut self, option: DhcpOption) {
        self.options.push(option);
    }

    /// Options accumulated so far, in insertion order
    pub fn options(&self) -> &[DhcpOption] {
        &self.options
    }

    /// Mutable access to the accumulated options, for handlers that merge
    /// with entries added earlier in the walk
    pub fn options_mut(&mut self) -> &mut Vec<DhcpOption> {
        &mut self.options
    }

    /// True if no options have been accumulated
    ///
    /// An empty reply is a legitimate configuration outcome; finalizing it
    /// still produces a well-formed message with the identifier options.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Build the reply message: echo the request transaction id and client
    /// identifier, stamp the server identifier, then append the
    /// accumulated options in order
    pub fn finalize(&self, request: &RequestInfo, server_id: &Duid) -> Message {
        let mut reply = Message::new_with_id(self.reply_type, request.xid());

        reply
            .opts_mut()
            .insert(DhcpOption::ServerId(server_id.as_bytes().to_vec()));

        if let Some(client_id) = request.client_id_option() {
            reply.opts_mut().insert(client_id);
        }

        for option in &self.options {
            reply.opts_mut().insert(option.clone());
        }

        reply
    }

    /// Finalize and encode the reply to wire bytes
    pub fn finalize_bytes(
        &self,
        request: &RequestInfo,
        server_id: &Duid,
    ) -> Result<Vec<u8>, ServerError> {
        self.finalize(request, server_id)
            .to_vec()
            .map_err(|e| ServerError::EncodeFailed(e.to_string()))
    }
}
