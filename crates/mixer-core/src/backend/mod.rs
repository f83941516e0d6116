//! Backend Driver Interface (C1).
//!
//! Every backend — wide-column KV, relational SQL, graph database, or a
//! remote HTTP/RPC peer — implements [`BackendDriver`]. The concrete wire
//! implementations of those backends are external collaborators (§1, §6);
//! this module defines only the uniform contract and carries one in-memory
//! reference driver (see [`crate::refdriver`]) used by the core's own tests.

pub mod context;

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::BackendError;
use crate::model::{Dcid, DateSelector, Direction, FacetFilter, ObservationBundle, TypedValue};

pub use context::RequestContext;

/// A raw row key against which `read_rows` is addressed.
///
/// Opaque to the core; each backend assigns its own meaning to the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey(pub Vec<u8>);

impl RowKey {
    /// Builds a row key from a string, for backends that key on text.
    pub fn from_str(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

/// A single hit from `Search`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// The matched node.
    pub dcid: Dcid,
    /// The backend-assigned relevance score (higher is better).
    pub score: f64,
}

/// The uniform read contract every backend implements (C1).
///
/// Backends must be safe for concurrent calls and must either return within
/// their deadline or honor the [`RequestContext`]'s cancellation signal; a
/// blocked backend must not wedge the fan-out executor (§4.1).
#[async_trait]
pub trait BackendDriver: Send + Sync + Debug {
    /// A human-readable, stable name for this backend.
    fn name(&self) -> &str;

    /// This backend's immutable priority rank (lower = preferred).
    fn priority(&self) -> u32;

    /// Bulk-reads rows by key. Missing keys are simply absent from the
    /// result map; this method fails only if the whole backend is down.
    async fn read_rows(
        &self,
        keys: &[RowKey],
        ctx: &RequestContext,
    ) -> Result<HashMap<RowKey, Vec<u8>>, BackendError>;

    /// Fetches observations for the cross product of `variables` and
    /// `entities`, applying only the date selector (not the facet filter,
    /// which is applied downstream per §4.5).
    async fn fetch_observations(
        &self,
        variables: &[Dcid],
        entities: &[Dcid],
        selector: &DateSelector,
        filter: &FacetFilter,
        ctx: &RequestContext,
    ) -> Result<ObservationBundle, BackendError>;

    /// Fetches property values reached from `nodes` along `property` in the
    /// given `direction`, capped at `limit` values per node.
    async fn fetch_property_values(
        &self,
        nodes: &[Dcid],
        property: &str,
        direction: Direction,
        limit: usize,
        ctx: &RequestContext,
    ) -> Result<HashMap<Dcid, Vec<TypedValue>>, BackendError>;

    /// Resolves external identifiers to internal `Dcid`s via a named
    /// `(in_prop, out_prop)` mapping, e.g. `wikidataId -> dcid`.
    async fn resolve(
        &self,
        inputs: &[String],
        in_prop: &str,
        out_prop: &str,
        ctx: &RequestContext,
    ) -> Result<HashMap<String, Vec<Dcid>>, BackendError>;

    /// Free-text search, optionally restricted to `types`. Backends lacking
    /// search return `Unimplemented`, which the fan-out executor skips.
    async fn search(
        &self,
        _query: &str,
        _types: &[String],
        _limit: usize,
        _ctx: &RequestContext,
    ) -> Result<Vec<SearchHit>, BackendError> {
        Err(BackendError::Unimplemented {
            backend: self.name().to_string(),
        })
    }
}
