//! Runtime key/value map propagated to dynamic leaves between mutations
//! (spec §6, glossary "Session data").

use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionValue {
    Bytes(Vec<u8>),
    Text(String),
    Int(i64),
}

/// Order-preserving, like [`crate::container::ContainerNode::by_name`];
/// session data is small and insertion order is a useful diagnostic
/// property.
pub type SessionData = IndexMap<String, SessionValue>;
