//! The message-processing pipeline
//!
//! A pipeline is an immutable tree of nodes compiled once from
//! configuration and shared read-only across all concurrent requests.
//! Filter nodes gate their children on a condition over the request state;
//! handler nodes are leaves that mutate the response or redirect control
//! flow. Within one request, nodes run strictly in configured document
//! order, depth-first.
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 Pipeline                        │
//! │  marked-with "eth0"          ── filter          │
//! │  ├── preference              ── handler         │
//! │  └── marked-with "untrusted" ── nested filter   │
//! │      └── ignore-request      ── handler         │
//! │  recursive-name-servers      ── handler         │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod compiler;
pub mod filters;
pub mod handlers;
pub mod registry;

pub use compiler::{compile_pipeline, compile_with_registry};
pub use registry::{FilterCtor, HandlerCtor, SectionCtor, SectionRegistry};

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use crate::error::DispatchError;
use crate::transaction::Transaction;

/// Signal a handler returns to steer the rest of the walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    /// Proceed with the next sibling or ancestor node
    Continue,

    /// Skip every remaining node at this and all enclosing levels and
    /// answer with the response accumulated so far
    StopChain,

    /// Terminate the walk with no answer, discarding any accumulated
    /// response content
    Abort,
}

/// A gating condition over one request's state
///
/// Filter conditions are pure predicates: they may read the request, the
/// mark set, and the response accumulated so far, but must not have
/// externally visible side effects. Side effects belong to handlers.
pub trait Filter: fmt::Debug + Send + Sync {
    /// Section type name this filter was built from
    fn kind(&self) -> &'static str;

    /// Evaluate the condition against the current request state
    fn matches(&self, txn: &Transaction) -> Result<bool, DispatchError>;
}

/// A response-building or control-flow action
///
/// Handlers may mutate the response, add marks visible to later filters,
/// and consult external collaborators (awaiting I/O as needed). Each
/// handler runs at most once per request per tree position.
#[async_trait]
pub trait Handler: fmt::Debug + Send + Sync {
    /// Section type name this handler was built from
    fn kind(&self) -> &'static str;

    /// Apply the handler's effect to the request state
    async fn apply(&self, txn: &mut Transaction) -> Result<ControlFlow, DispatchError>;
}

/// One node of the compiled pipeline tree
pub enum Node {
    /// A condition guarding an ordered list of child nodes
    Filter {
        filter: Box<dyn Filter>,
        children: Vec<Node>,
    },

    /// A leaf action
    Handler(Box<dyn Handler>),
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Filter { filter, children } => f
                .debug_struct("Filter")
                .field("filter", filter)
                .field("children", children)
                .finish(),
            Node::Handler(handler) => f.debug_tuple("Handler").field(handler).finish(),
        }
    }
}

/// An immutable, compiled pipeline ready for concurrent execution
#[derive(Debug, Default)]
pub struct Pipeline {
    nodes: Vec<Node>,
}

impl Pipeline {
    /// Create a pipeline from its root nodes
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// The root nodes, in document order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Walk the tree for one request
    ///
    /// Returns the signal that ended the walk: `Continue` if every node
    /// ran (or was skipped by its filter) to the end, `StopChain` or
    /// `Abort` if a handler short-circuited. The caller interprets the
    /// signal into a disposition.
    pub async fn run(&self, txn: &mut Transaction) -> Result<ControlFlow, DispatchError> {
        walk(&self.nodes, txn).await
    }
}

/// Depth-first, document-order walk over a node list
///
/// A filter whose condition is false skips its whole subtree with no side
/// effects. `StopChain` and `Abort` both unwind through every enclosing
/// level; they differ only in how the dispatcher interprets them.
fn walk<'a>(
    nodes: &'a [Node],
    txn: &'a mut Transaction,
) -> Pin<Box<dyn Future<Output = Result<ControlFlow, DispatchError>> + Send + 'a>> {
    Box::pin(async move {
        for node in nodes {
            match node {
                Node::Handler(handler) => match handler.apply(txn).await? {
                    ControlFlow::Continue => {}
                    signal => return Ok(signal),
                },
                Node::Filter { filter, children } => {
                    if filter.matches(txn)? {
                        match walk(children, txn).await? {
                            ControlFlow::Continue => {}
                            signal => return Ok(signal),
                        }
                    }
                }
            }
        }
        Ok(ControlFlow::Continue)
    })
}
