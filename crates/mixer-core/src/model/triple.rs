//! Triples: the primitive unit of graph traversal.

use serde::{Deserialize, Serialize};

use super::dcid::{Dcid, Direction, TypedValue};
use super::facet::FacetId;

/// A single `(subject, property, object, direction, provenance)` fact.
///
/// Invariant: for every triple stored `out` from A to B with property P,
/// a symmetric `in` record exists on B — possibly in a different backend,
/// which is why the merger (C3) exists at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    /// The subject of the triple.
    pub subject: Dcid,
    /// The property label naming the edge type.
    pub property: String,
    /// The object: another node or a typed literal.
    pub object: TypedValue,
    /// Direction of the edge relative to `subject`.
    pub direction: Direction,
    /// Provenance of this triple.
    pub provenance: Option<FacetId>,
}
