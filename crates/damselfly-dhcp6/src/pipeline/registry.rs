//! Section type registry
//!
//! Configuration sections are dispatched by type name through a closed
//! registry: every recognized name maps to either a filter constructor or
//! a handler constructor. Adding a new kind is a registry entry; the
//! compiler and dispatcher never change. Unknown names are a hard
//! configuration error at compile time, never at request time.

use std::collections::BTreeMap;
use std::fmt;

use crate::config::SectionConfig;
use crate::error::ConfigError;

use super::filters::{ClientIdFilter, MarkedWithFilter, MessageTypeFilter};
use super::handlers::{
    FinalAnswerHandler, IgnoreRequestHandler, PreferenceHandler, RecursiveNameServersHandler,
    SetMarkHandler,
};
use super::{Filter, Handler};

/// Constructor for a filter section
pub type FilterCtor = fn(&SectionConfig) -> Result<Box<dyn Filter>, ConfigError>;

/// Constructor for a handler section
pub type HandlerCtor = fn(&SectionConfig) -> Result<Box<dyn Handler>, ConfigError>;

/// The constructor registered for one section type name
#[derive(Clone, Copy)]
pub enum SectionCtor {
    /// Builds a filter node; the section's children become its subtree
    Filter(FilterCtor),

    /// Builds a handler node; the section must be a leaf
    Handler(HandlerCtor),
}

/// Closed mapping from section type names to node constructors
#[derive(Clone)]
pub struct SectionRegistry {
    sections: BTreeMap<&'static str, SectionCtor>,
}

impl SectionRegistry {
    /// A registry with no section types
    pub fn empty() -> Self {
        Self {
            sections: BTreeMap::new(),
        }
    }

    /// The registry of built-in filter and handler kinds
    pub fn builtin() -> Self {
        let mut registry = Self::empty();

        registry.register("marked-with", SectionCtor::Filter(MarkedWithFilter::from_section));
        registry.register("message-type", SectionCtor::Filter(MessageTypeFilter::from_section));
        registry.register("client-id", SectionCtor::Filter(ClientIdFilter::from_section));

        registry.register(
            "ignore-request",
            SectionCtor::Handler(IgnoreRequestHandler::from_section),
        );
        registry.register("set-mark", SectionCtor::Handler(SetMarkHandler::from_section));
        registry.register("preference", SectionCtor::Handler(PreferenceHandler::from_section));
        registry.register(
            "recursive-name-servers",
            SectionCtor::Handler(RecursiveNameServersHandler::from_section),
        );
        registry.register(
            "final-answer",
            SectionCtor::Handler(FinalAnswerHandler::from_section),
        );

        registry
    }

    /// Register a constructor for a section type name
    ///
    /// A later registration for the same name replaces the earlier one.
    pub fn register(&mut self, kind: &'static str, ctor: SectionCtor) {
        self.sections.insert(kind, ctor);
    }

    /// Look up the constructor for a section type name
    pub fn get(&self, kind: &str) -> Option<SectionCtor> {
        self.sections.get(kind).copied()
    }

    /// All registered section type names, in sorted order
    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sections.keys().copied()
    }
}

impl Default for SectionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for SectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectionRegistry")
            .field("kinds", &self.kinds().collect::<Vec<_>>())
            .finish()
    }
}
