//! Built-in filter kinds
//!
//! Each filter has a plain constructor for programmatic use and a
//! `from_section` constructor the registry points at. Conditions are pure
//! predicates; none of these mutate request state.

use dhcproto::v6::MessageType;

use crate::config::SectionConfig;
use crate::duid::Duid;
use crate::error::{ConfigError, DispatchError};
use crate::message::message_type_from_name;
use crate::transaction::Transaction;

use super::Filter;

/// Matches requests carrying a given mark at evaluation time
///
/// Evaluated lazily: marks set by handlers earlier in document order are
/// visible, marks set later are not.
#[derive(Debug, Clone)]
pub struct MarkedWithFilter {
    mark: String,
}

impl MarkedWithFilter {
    pub fn new(mark: impl Into<String>) -> Self {
        Self { mark: mark.into() }
    }

    pub(crate) fn from_section(section: &SectionConfig) -> Result<Box<dyn Filter>, ConfigError> {
        Ok(Box::new(Self::new(section.require_str("mark")?)))
    }
}

impl Filter for MarkedWithFilter {
    fn kind(&self) -> &'static str {
        "marked-with"
    }

    fn matches(&self, txn: &Transaction) -> Result<bool, DispatchError> {
        Ok(txn.marks.contains(&self.mark))
    }
}

/// Matches requests of a single DHCPv6 message type
#[derive(Debug, Clone)]
pub struct MessageTypeFilter {
    message_type: MessageType,
}

impl MessageTypeFilter {
    pub fn new(message_type: MessageType) -> Self {
        Self { message_type }
    }

    pub(crate) fn from_section(section: &SectionConfig) -> Result<Box<dyn Filter>, ConfigError> {
        let name = section.require_str("type")?;
        let message_type =
            message_type_from_name(name).ok_or_else(|| ConfigError::InvalidParameter {
                kind: section.kind.clone(),
                param: "type",
                reason: format!("unknown message type `{name}`"),
            })?;
        Ok(Box::new(Self::new(message_type)))
    }
}

impl Filter for MessageTypeFilter {
    fn kind(&self) -> &'static str {
        "message-type"
    }

    fn matches(&self, txn: &Transaction) -> Result<bool, DispatchError> {
        Ok(txn.request.message_type() == self.message_type)
    }
}

/// Matches requests whose client identifier equals a configured DUID
///
/// A request without a Client Identifier option simply does not match.
#[derive(Debug, Clone)]
pub struct ClientIdFilter {
    duid: Duid,
}

impl ClientIdFilter {
    pub fn new(duid: Duid) -> Self {
        Self { duid }
    }

    pub(crate) fn from_section(section: &SectionConfig) -> Result<Box<dyn Filter>, ConfigError> {
        let text = section.require_str("duid")?;
        let duid = text
            .parse::<Duid>()
            .map_err(|e| ConfigError::InvalidParameter {
                kind: section.kind.clone(),
                param: "duid",
                reason: e.to_string(),
            })?;
        Ok(Box::new(Self::new(duid)))
    }
}

impl Filter for ClientIdFilter {
    fn kind(&self) -> &'static str {
        "client-id"
    }

    fn matches(&self, txn: &Transaction) -> Result<bool, DispatchError> {
        Ok(txn.request.client_duid().as_ref() == Some(&self.duid))
    }
}
