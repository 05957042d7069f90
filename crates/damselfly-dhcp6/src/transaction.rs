//! Per-request processing state
//!
//! A `Transaction` bundles everything a single request's pipeline walk may
//! read or mutate: the immutable request, its mark set, and the response
//! under construction. It is owned by exactly one dispatch task and never
//! shared between requests, which is what makes concurrent dispatch safe
//! against the read-only pipeline tree.

use dhcproto::v6::MessageType;

use crate::marks::MarkSet;
use crate::message::RequestInfo;
use crate::response::ResponseBuilder;

/// State for one in-flight request
#[derive(Debug)]
pub struct Transaction {
    /// The decoded request; read-only
    pub request: RequestInfo,

    /// Marks stamped by the listener and by handlers; grows monotonically
    pub marks: MarkSet,

    /// The reply being accumulated
    pub response: ResponseBuilder,
}

impl Transaction {
    /// Create the state for a fresh request
    pub fn new(
        request: RequestInfo,
        initial_marks: Vec<String>,
        reply_type: MessageType,
    ) -> Self {
        Self {
            request,
            marks: MarkSet::seeded(initial_marks),
            response: ResponseBuilder::new(reply_type),
        }
    }
}
