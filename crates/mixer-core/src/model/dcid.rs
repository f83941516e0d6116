//! Opaque node identifiers and typed values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A stable, opaque identifier for a node in the knowledge graph.
///
/// `Dcid`s carry no structure the core is allowed to interpret; two `Dcid`s
/// are equal iff their underlying strings are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dcid(String);

impl Dcid {
    /// Creates a new identifier from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Dcid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Dcid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Dcid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A value reached by a property edge: either another node, or a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypedValue {
    /// A reference to another entity.
    Node(Dcid),
    /// A typed literal (string, number, date) with no further structure.
    Literal(String),
}

impl TypedValue {
    /// The de-dup key for this value per §4.3: the `Dcid` if present, else the literal.
    pub fn dedup_key(&self) -> &str {
        match self {
            TypedValue::Node(d) => d.as_str(),
            TypedValue::Literal(s) => s,
        }
    }
}

/// Direction of a property edge relative to the subject node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Edge leaves the subject (`subject -> object`).
    Out,
    /// Edge enters the subject (`object -> subject`).
    In,
}

/// An entity: a node identified by a `Dcid`, carrying a set of `typeOf` tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// The entity's identifier.
    pub dcid: Dcid,
    /// The entity's `typeOf` tags.
    pub types: Vec<String>,
}

impl Entity {
    /// Creates a new entity with the given identifier and types.
    pub fn new(dcid: impl Into<Dcid>, types: Vec<String>) -> Self {
        Self {
            dcid: dcid.into(),
            types,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_prefers_node_id() {
        let v = TypedValue::Node(Dcid::new("country/USA"));
        assert_eq!(v.dedup_key(), "country/USA");
    }

    #[test]
    fn dedup_key_falls_back_to_literal() {
        let v = TypedValue::Literal("hello".to_string());
        assert_eq!(v.dedup_key(), "hello");
    }
}
