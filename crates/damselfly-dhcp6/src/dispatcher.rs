//! Per-request dispatch
//!
//! The dispatcher owns the compiled pipeline and runs one walk per inbound
//! request. Every request gets fresh marks and a fresh response builder;
//! the pipeline tree is the only state shared between requests and is
//! never mutated during dispatch. Configuration reloads publish a new tree
//! atomically, so a walk that started before a reload finishes on the tree
//! it started with.

use std::sync::Arc;

use arc_swap::ArcSwap;
use dhcproto::v6::{DhcpOption, MessageType};
use tracing::{debug, error, info, warn};

use crate::config::SectionConfig;
use crate::duid::Duid;
use crate::error::{ConfigError, DispatchError};
use crate::message::RequestInfo;
use crate::pipeline::{compile_pipeline, ControlFlow, Pipeline};
use crate::response::ResponseBuilder;
use crate::transaction::Transaction;

/// Terminal outcome of processing one request
///
/// Exactly one disposition is produced per dispatched request.
#[derive(Debug)]
pub enum Disposition {
    /// Transmit the accumulated response
    Answer(ResponseBuilder),

    /// Deliberately transmit nothing
    NoAnswer,

    /// The walk failed; nothing is transmitted
    Error(DispatchError),
}

/// Walks the compiled pipeline for each inbound request
pub struct Dispatcher {
    pipeline: ArcSwap<Pipeline>,
    server_id: Duid,
    allow_rapid_commit: bool,
}

impl Dispatcher {
    /// Create a dispatcher serving the given pipeline
    pub fn new(pipeline: Pipeline, server_id: Duid) -> Self {
        Self {
            pipeline: ArcSwap::from_pointee(pipeline),
            server_id,
            allow_rapid_commit: false,
        }
    }

    /// Answer Solicit messages carrying Rapid Commit with an immediate
    /// Reply instead of an Advertise
    pub fn with_rapid_commit(mut self, allow: bool) -> Self {
        self.allow_rapid_commit = allow;
        self
    }

    /// The server identifier stamped on every reply
    pub fn server_id(&self) -> &Duid {
        &self.server_id
    }

    /// The pipeline generation new requests will walk
    pub fn current_pipeline(&self) -> Arc<Pipeline> {
        self.pipeline.load_full()
    }

    /// Compile a new configuration and swap it in atomically
    ///
    /// In-flight walks keep the generation they started with. A compile
    /// failure leaves the current pipeline serving untouched.
    pub fn reload(&self, sections: &[SectionConfig]) -> Result<(), ConfigError> {
        match compile_pipeline(sections) {
            Ok(pipeline) => {
                self.pipeline.store(Arc::new(pipeline));
                info!("pipeline configuration reloaded");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "pipeline reload rejected, previous configuration kept");
                Err(e)
            }
        }
    }

    /// Process one request to its terminal disposition
    ///
    /// `initial_marks` are the marks the listener stamps on the request
    /// before the walk starts.
    pub async fn dispatch(&self, request: RequestInfo, initial_marks: Vec<String>) -> Disposition {
        let Some(reply_type) = self.reply_type_for(&request) else {
            warn!(
                msg_type = ?request.message_type(),
                source = %request.source(),
                "message type is not answerable by a server, dropping"
            );
            return Disposition::NoAnswer;
        };

        // Pin the current generation for the whole walk.
        let pipeline = self.pipeline.load_full();

        let mut txn = Transaction::new(request, initial_marks, reply_type);
        if reply_type == MessageType::Reply && txn.request.wants_rapid_commit() {
            txn.response.push_option(DhcpOption::RapidCommit);
        }

        let disposition = match pipeline.run(&mut txn).await {
            Ok(ControlFlow::Abort) => Disposition::NoAnswer,
            Ok(_) => Disposition::Answer(txn.response),
            Err(e) => Disposition::Error(e),
        };

        match &disposition {
            Disposition::Answer(response) => {
                debug!(
                    source = %txn.request.source(),
                    listener = txn.request.listener(),
                    reply_type = ?response.reply_type(),
                    options = response.options().len(),
                    marks = ?txn.marks,
                    "request answered"
                );
            }
            Disposition::NoAnswer => {
                debug!(
                    source = %txn.request.source(),
                    listener = txn.request.listener(),
                    marks = ?txn.marks,
                    "request deliberately not answered"
                );
            }
            Disposition::Error(e) => {
                error!(
                    source = %txn.request.source(),
                    listener = txn.request.listener(),
                    marks = ?txn.marks,
                    error = %e,
                    "request processing failed"
                );
            }
        }

        disposition
    }

    /// Pick the reply message type for a request, or `None` for messages a
    /// server must not answer
    fn reply_type_for(&self, request: &RequestInfo) -> Option<MessageType> {
        match request.message_type() {
            MessageType::Solicit => {
                if self.allow_rapid_commit && request.wants_rapid_commit() {
                    Some(MessageType::Reply)
                } else {
                    Some(MessageType::Advertise)
                }
            }
            MessageType::Request
            | MessageType::Confirm
            | MessageType::Renew
            | MessageType::Rebind
            | MessageType::Release
            | MessageType::Decline
            | MessageType::InformationRequest => Some(MessageType::Reply),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("server_id", &self.server_id)
            .field("allow_rapid_commit", &self.allow_rapid_commit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhcproto::v6::Message;
    use std::net::{IpAddr, Ipv6Addr, SocketAddr};

    fn request_for(message: Message) -> RequestInfo {
        RequestInfo::new(
            message,
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 546),
            "eth0",
            true,
        )
    }

    fn solicit() -> Message {
        Message::new_with_id(MessageType::Solicit, [1, 2, 3])
    }

    fn dispatcher_for(sections: &[SectionConfig]) -> Dispatcher {
        let pipeline = compile_pipeline(sections).unwrap();
        Dispatcher::new(pipeline, Duid::new(vec![0x00, 0x01]))
    }

    #[tokio::test]
    async fn test_empty_pipeline_answers_empty() {
        let dispatcher = dispatcher_for(&[]);
        let disposition = dispatcher.dispatch(request_for(solicit()), vec![]).await;

        match disposition {
            Disposition::Answer(response) => {
                assert_eq!(response.reply_type(), MessageType::Advertise);
                assert!(response.is_empty());
            }
            other => panic!("expected an answer, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ignore_request_yields_no_answer() {
        let sections = vec![SectionConfig::new("marked-with")
            .with_param("mark", "eth0")
            .with_child(SectionConfig::new("ignore-request"))];
        let dispatcher = dispatcher_for(&sections);

        let disposition = dispatcher
            .dispatch(request_for(solicit()), vec!["eth0".to_string()])
            .await;
        assert!(matches!(disposition, Disposition::NoAnswer));
    }

    #[tokio::test]
    async fn test_unmatched_filter_yields_empty_answer() {
        let sections = vec![SectionConfig::new("marked-with")
            .with_param("mark", "eth0")
            .with_child(SectionConfig::new("ignore-request"))];
        let dispatcher = dispatcher_for(&sections);

        let disposition = dispatcher
            .dispatch(request_for(solicit()), vec!["eth1".to_string()])
            .await;
        match disposition {
            Disposition::Answer(response) => assert!(response.is_empty()),
            other => panic!("expected an answer, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_to_client_message_is_dropped_before_walk() {
        // Even a pipeline that would answer everything never sees it.
        let sections = vec![SectionConfig::new("preference").with_int_param("value", 1)];
        let dispatcher = dispatcher_for(&sections);

        let advertise = Message::new_with_id(MessageType::Advertise, [1, 2, 3]);
        let disposition = dispatcher.dispatch(request_for(advertise), vec![]).await;
        assert!(matches!(disposition, Disposition::NoAnswer));
    }

    #[tokio::test]
    async fn test_reply_type_selection() {
        let dispatcher = dispatcher_for(&[]);

        let renew = Message::new_with_id(MessageType::Renew, [1, 2, 3]);
        match dispatcher.dispatch(request_for(renew), vec![]).await {
            Disposition::Answer(response) => {
                assert_eq!(response.reply_type(), MessageType::Reply)
            }
            other => panic!("expected an answer, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rapid_commit_upgrades_solicit() {
        let dispatcher = dispatcher_for(&[]).with_rapid_commit(true);

        let mut message = solicit();
        message.opts_mut().insert(DhcpOption::RapidCommit);

        match dispatcher.dispatch(request_for(message), vec![]).await {
            Disposition::Answer(response) => {
                assert_eq!(response.reply_type(), MessageType::Reply);
                assert!(response
                    .options()
                    .iter()
                    .any(|opt| matches!(opt, DhcpOption::RapidCommit)));
            }
            other => panic!("expected an answer, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rapid_commit_ignored_when_disallowed() {
        let dispatcher = dispatcher_for(&[]);

        let mut message = solicit();
        message.opts_mut().insert(DhcpOption::RapidCommit);

        match dispatcher.dispatch(request_for(message), vec![]).await {
            Disposition::Answer(response) => {
                assert_eq!(response.reply_type(), MessageType::Advertise)
            }
            other => panic!("expected an answer, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reload_swaps_pipeline() {
        let dispatcher = dispatcher_for(&[]);

        let sections = vec![SectionConfig::new("ignore-request")];
        dispatcher.reload(&sections).unwrap();

        let disposition = dispatcher.dispatch(request_for(solicit()), vec![]).await;
        assert!(matches!(disposition, Disposition::NoAnswer));
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_pipeline() {
        let sections = vec![SectionConfig::new("ignore-request")];
        let dispatcher = dispatcher_for(&sections);

        let err = dispatcher
            .reload(&[SectionConfig::new("bogus-filter")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSection { kind } if kind == "bogus-filter"));

        // Still serving the original configuration.
        let disposition = dispatcher.dispatch(request_for(solicit()), vec![]).await;
        assert!(matches!(disposition, Disposition::NoAnswer));
    }
}
