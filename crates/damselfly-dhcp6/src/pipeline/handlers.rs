//! Built-in handler kinds
//!
//! Handlers are the leaves of the pipeline: they mutate the response under
//! construction, stamp marks, or redirect control flow. Like the filters,
//! each has a plain constructor for programmatic use and a `from_section`
//! constructor the registry points at.

use std::net::Ipv6Addr;

use async_trait::async_trait;
use dhcproto::v6::DhcpOption;

use crate::config::SectionConfig;
use crate::error::{ConfigError, DispatchError};
use crate::transaction::Transaction;

use super::{ControlFlow, Handler};

/// Terminates processing with no answer
///
/// Any response content accumulated by earlier handlers is discarded; the
/// server transmits nothing for this request.
#[derive(Debug, Clone, Copy)]
pub struct IgnoreRequestHandler;

impl IgnoreRequestHandler {
    pub(crate) fn from_section(_section: &SectionConfig) -> Result<Box<dyn Handler>, ConfigError> {
        Ok(Box::new(Self))
    }
}

#[async_trait]
impl Handler for IgnoreRequestHandler {
    fn kind(&self) -> &'static str {
        "ignore-request"
    }

    async fn apply(&self, _txn: &mut Transaction) -> Result<ControlFlow, DispatchError> {
        Ok(ControlFlow::Abort)
    }
}

/// Adds a mark to the request
///
/// The mark becomes visible to `marked-with` filters later in document
/// order.
#[derive(Debug, Clone)]
pub struct SetMarkHandler {
    mark: String,
}

impl SetMarkHandler {
    pub fn new(mark: impl Into<String>) -> Self {
        Self { mark: mark.into() }
    }

    pub(crate) fn from_section(section: &SectionConfig) -> Result<Box<dyn Handler>, ConfigError> {
        Ok(Box::new(Self::new(section.require_str("mark")?)))
    }
}

#[async_trait]
impl Handler for SetMarkHandler {
    fn kind(&self) -> &'static str {
        "set-mark"
    }

    async fn apply(&self, txn: &mut Transaction) -> Result<ControlFlow, DispatchError> {
        txn.marks.add(self.mark.clone());
        Ok(ControlFlow::Continue)
    }
}

/// Appends a Preference option to the reply
#[derive(Debug, Clone, Copy)]
pub struct PreferenceHandler {
    value: u8,
}

impl PreferenceHandler {
    pub fn new(value: u8) -> Self {
        Self { value }
    }

    pub(crate) fn from_section(section: &SectionConfig) -> Result<Box<dyn Handler>, ConfigError> {
        let value = section.require_i64("value")?;
        let value = u8::try_from(value).map_err(|_| ConfigError::InvalidParameter {
            kind: section.kind.clone(),
            param: "value",
            reason: format!("expected a value between 0 and 255, got {value}"),
        })?;
        Ok(Box::new(Self::new(value)))
    }
}

#[async_trait]
impl Handler for PreferenceHandler {
    fn kind(&self) -> &'static str {
        "preference"
    }

    async fn apply(&self, txn: &mut Transaction) -> Result<ControlFlow, DispatchError> {
        txn.response.push_option(DhcpOption::Preference(self.value));
        Ok(ControlFlow::Continue)
    }
}

/// Appends recursive DNS name servers to the reply
///
/// If an earlier handler already added a name-server option, the lists are
/// merged: earlier entries keep their position and duplicates are dropped,
/// so the first handler to name a server wins its place in the reply.
#[derive(Debug, Clone)]
pub struct RecursiveNameServersHandler {
    addresses: Vec<Ipv6Addr>,
}

impl RecursiveNameServersHandler {
    pub fn new(addresses: Vec<Ipv6Addr>) -> Self {
        Self { addresses }
    }

    pub(crate) fn from_section(section: &SectionConfig) -> Result<Box<dyn Handler>, ConfigError> {
        let addresses = section
            .require_str_list("addresses")?
            .into_iter()
            .map(|text| {
                text.parse::<Ipv6Addr>()
                    .map_err(|e| ConfigError::InvalidParameter {
                        kind: section.kind.clone(),
                        param: "addresses",
                        reason: format!("`{text}` is not an IPv6 address: {e}"),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Box::new(Self::new(addresses)))
    }
}

#[async_trait]
impl Handler for RecursiveNameServersHandler {
    fn kind(&self) -> &'static str {
        "recursive-name-servers"
    }

    async fn apply(&self, txn: &mut Transaction) -> Result<ControlFlow, DispatchError> {
        let options = txn.response.options_mut();
        let existing = options.iter_mut().find_map(|opt| match opt {
            DhcpOption::DomainNameServers(addrs) => Some(addrs),
            _ => None,
        });

        match existing {
            Some(addrs) => {
                for addr in &self.addresses {
                    if !addrs.contains(addr) {
                        addrs.push(*addr);
                    }
                }
            }
            None => options.push(DhcpOption::DomainNameServers(self.addresses.clone())),
        }

        Ok(ControlFlow::Continue)
    }
}

/// Declares the accumulated response complete
///
/// Every remaining node at this and all enclosing levels is skipped and
/// the walk finalizes the current response as the answer.
#[derive(Debug, Clone, Copy)]
pub struct FinalAnswerHandler;

impl FinalAnswerHandler {
    pub(crate) fn from_section(_section: &SectionConfig) -> Result<Box<dyn Handler>, ConfigError> {
        Ok(Box::new(Self))
    }
}

#[async_trait]
impl Handler for FinalAnswerHandler {
    fn kind(&self) -> &'static str {
        "final-answer"
    }

    async fn apply(&self, _txn: &mut Transaction) -> Result<ControlFlow, DispatchError> {
        Ok(ControlFlow::StopChain)
    }
}
