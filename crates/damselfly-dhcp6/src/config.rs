//! Server and pipeline configuration
//!
//! The pipeline compiler does not read configuration files itself; it
//! consumes a generic section tree, where every node carries a type name,
//! a map of typed parameters, and an ordered list of child sections. The
//! binary deserializes that tree (plus listener settings) from JSON with
//! serde.
//!
//! A pipeline configuration looks like:
//!
//! ```json
//! {
//!   "server_id": "00:01:00:01:1c:38:a5:e8:00:13:72:65:74:a2",
//!   "listeners": [
//!     { "name": "eth0", "address": "2001:db8::1", "multicast": true }
//!   ],
//!   "pipeline": [
//!     { "kind": "marked-with",
//!       "params": { "mark": "eth0" },
//!       "children": [ { "kind": "ignore-request" } ] }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::net::Ipv6Addr;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::listener::SERVER_PORT;

/// One node of the configuration section tree
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SectionConfig {
    /// Section type name, resolved against the section registry
    pub kind: String,

    /// Parameters for this section
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,

    /// Nested sections, in document order
    #[serde(default)]
    pub children: Vec<SectionConfig>,
}

/// A typed section parameter value
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Integer(i64),
    String(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Get the value as a string, if it is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an integer, if it is one
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the value as a bool, if it is one
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the value as a list, if it is one
    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl SectionConfig {
    /// Create a section with no parameters or children
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Add a string parameter
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params
            .insert(name.into(), ParamValue::String(value.into()));
        self
    }

    /// Add an integer parameter
    pub fn with_int_param(mut self, name: impl Into<String>, value: i64) -> Self {
        self.params.insert(name.into(), ParamValue::Integer(value));
        self
    }

    /// Add a list-of-strings parameter
    pub fn with_list_param<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = values
            .into_iter()
            .map(|v| ParamValue::String(v.into()))
            .collect();
        self.params.insert(name.into(), ParamValue::List(items));
        self
    }

    /// Append a child section
    pub fn with_child(mut self, child: SectionConfig) -> Self {
        self.children.push(child);
        self
    }

    /// Look up a parameter by name
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    /// Get a required parameter, failing with section context
    pub fn require(&self, param: &'static str) -> Result<&ParamValue, ConfigError> {
        self.params
            .get(param)
            .ok_or_else(|| ConfigError::MissingParameter {
                kind: self.kind.clone(),
                param,
            })
    }

    /// Get a required string parameter
    pub fn require_str(&self, param: &'static str) -> Result<&str, ConfigError> {
        self.require(param)?
            .as_str()
            .ok_or_else(|| ConfigError::InvalidParameter {
                kind: self.kind.clone(),
                param,
                reason: "expected a string".to_string(),
            })
    }

    /// Get a required integer parameter
    pub fn require_i64(&self, param: &'static str) -> Result<i64, ConfigError> {
        self.require(param)?
            .as_i64()
            .ok_or_else(|| ConfigError::InvalidParameter {
                kind: self.kind.clone(),
                param,
                reason: "expected an integer".to_string(),
            })
    }

    /// Get a required list-of-strings parameter
    pub fn require_str_list(&self, param: &'static str) -> Result<Vec<&str>, ConfigError> {
        let items = self
            .require(param)?
            .as_list()
            .ok_or_else(|| ConfigError::InvalidParameter {
                kind: self.kind.clone(),
                param,
                reason: "expected a list".to_string(),
            })?;

        items
            .iter()
            .map(|item| {
                item.as_str().ok_or_else(|| ConfigError::InvalidParameter {
                    kind: self.kind.clone(),
                    param,
                    reason: "expected a list of strings".to_string(),
                })
            })
            .collect()
    }
}

/// Configuration for one listener binding
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListenerConfig {
    /// Listener name, stamped as a mark on every request it produces
    pub name: String,

    /// IPv6 address to bind
    pub address: Ipv6Addr,

    /// UDP port to bind (defaults to the DHCPv6 server port)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Whether this listener joins the All_DHCP_Relay_Agents_and_Servers
    /// group; requests from it are classified as received over multicast
    #[serde(default)]
    pub multicast: bool,

    /// Additional marks stamped on every request from this listener
    #[serde(default)]
    pub marks: Vec<String>,
}

impl ListenerConfig {
    /// The full set of marks this listener stamps on a request: its own
    /// name first, then any configured extras
    pub fn initial_marks(&self) -> Vec<String> {
        let mut marks = Vec::with_capacity(1 + self.marks.len());
        marks.push(self.name.clone());
        marks.extend(self.marks.iter().cloned());
        marks
    }
}

fn default_port() -> u16 {
    SERVER_PORT
}

/// Top-level server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server DUID, as hex text
    pub server_id: String,

    /// Answer Solicit messages carrying Rapid Commit with an immediate Reply
    #[serde(default)]
    pub allow_rapid_commit: bool,

    /// Listener bindings
    pub listeners: Vec<ListenerConfig>,

    /// Root sections of the processing pipeline, in document order
    #[serde(default)]
    pub pipeline: Vec<SectionConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_section_tree() {
        let json = r#"
        {
            "kind": "marked-with",
            "params": { "mark": "eth0" },
            "children": [
                { "kind": "ignore-request" }
            ]
        }"#;

        let section: SectionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(section.kind, "marked-with");
        assert_eq!(section.param("mark").and_then(ParamValue::as_str), Some("eth0"));
        assert_eq!(section.children.len(), 1);
        assert_eq!(section.children[0].kind, "ignore-request");
        assert!(section.children[0].params.is_empty());
    }

    #[test]
    fn test_deserialize_param_types() {
        let json = r#"
        {
            "kind": "example",
            "params": {
                "flag": true,
                "count": 7,
                "label": "x",
                "items": ["a", "b"]
            }
        }"#;

        let section: SectionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(section.param("flag").and_then(ParamValue::as_bool), Some(true));
        assert_eq!(section.param("count").and_then(ParamValue::as_i64), Some(7));
        assert_eq!(section.param("label").and_then(ParamValue::as_str), Some("x"));
        assert_eq!(section.require_str_list("items").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_require_missing_parameter() {
        let section = SectionConfig::new("marked-with");
        let err = section.require_str("mark").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingParameter { param: "mark", .. }
        ));
    }

    #[test]
    fn test_require_wrong_type() {
        let section = SectionConfig::new("preference").with_param("value", "high");
        let err = section.require_i64("value").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidParameter { param: "value", .. }
        ));
    }

    #[test]
    fn test_listener_config_defaults() {
        let json = r#"{ "name": "eth0", "address": "2001:db8::1" }"#;
        let config: ListenerConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.port, SERVER_PORT);
        assert!(!config.multicast);
        assert!(config.marks.is_empty());
    }

    #[test]
    fn test_listener_initial_marks() {
        let config = ListenerConfig {
            name: "eth0".to_string(),
            address: Ipv6Addr::LOCALHOST,
            port: SERVER_PORT,
            multicast: true,
            marks: vec!["untrusted".to_string()],
        };

        assert_eq!(config.initial_marks(), vec!["eth0", "untrusted"]);
    }

    #[test]
    fn test_deserialize_server_config() {
        let json = r#"
        {
            "server_id": "0001000100000001000000000001",
            "listeners": [
                { "name": "eth0", "address": "::1", "port": 1547 }
            ],
            "pipeline": [
                { "kind": "preference", "params": { "value": 255 } }
            ]
        }"#;

        let config: ServerConfig = serde_json::from_str(json).unwrap();
        assert!(!config.allow_rapid_commit);
        assert_eq!(config.listeners.len(), 1);
        assert_eq!(config.listeners[0].port, 1547);
        assert_eq!(config.pipeline.len(), 1);
    }
}
