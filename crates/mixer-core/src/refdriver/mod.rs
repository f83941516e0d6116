//! An in-memory reference [`BackendDriver`] implementation.
//!
//! Not a production backend — the core has no wire drivers of its own
//! (§1, §6) — but a fixture the core's own integration tests and the
//! dispatcher's doctests build against, so C1's contract is exercised by a
//! real (if trivial) implementation rather than only mocks.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::backend::{BackendDriver, RequestContext, RowKey, SearchHit};
use crate::error::BackendError;
use crate::model::{Dcid, DateSelector, Direction, FacetFilter, ObservationBundle, Triple, TypedValue};

/// An in-memory backend holding rows, observations, and triples inserted
/// directly by test setup code.
#[derive(Debug)]
pub struct InMemoryDriver {
    name: String,
    priority: u32,
    rows: RwLock<HashMap<RowKey, Vec<u8>>>,
    observations: RwLock<Vec<crate::model::Observation>>,
    triples: RwLock<Vec<Triple>>,
    resolve_table: RwLock<HashMap<(String, String), HashMap<String, Vec<Dcid>>>>,
    search_hits: RwLock<Vec<SearchHit>>,
}

impl InMemoryDriver {
    /// Creates an empty reference driver with the given name and priority.
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            priority,
            rows: RwLock::new(HashMap::new()),
            observations: RwLock::new(Vec::new()),
            triples: RwLock::new(Vec::new()),
            resolve_table: RwLock::new(HashMap::new()),
            search_hits: RwLock::new(Vec::new()),
        }
    }

    /// Inserts a row.
    pub fn insert_row(&self, key: RowKey, value: Vec<u8>) {
        self.rows.write().insert(key, value);
    }

    /// Inserts an observation.
    pub fn insert_observation(&self, observation: crate::model::Observation) {
        self.observations.write().push(observation);
    }

    /// Inserts a triple.
    pub fn insert_triple(&self, triple: Triple) {
        self.triples.write().push(triple);
    }

    /// Registers a resolution mapping for a given `(in_prop, out_prop)` pair.
    pub fn insert_resolution(&self, in_prop: &str, out_prop: &str, input: &str, outputs: Vec<Dcid>) {
        self.resolve_table
            .write()
            .entry((in_prop.to_string(), out_prop.to_string()))
            .or_default()
            .insert(input.to_string(), outputs);
    }

    /// Registers a search hit returned by every `search` call regardless of
    /// query text (sufficient for fixture purposes).
    pub fn insert_search_hit(&self, hit: SearchHit) {
        self.search_hits.write().push(hit);
    }
}

#[async_trait]
impl BackendDriver for InMemoryDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn read_rows(
        &self,
        keys: &[RowKey],
        _ctx: &RequestContext,
    ) -> Result<HashMap<RowKey, Vec<u8>>, BackendError> {
        let rows = self.rows.read();
        Ok(keys
            .iter()
            .filter_map(|k| rows.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }

    async fn fetch_observations(
        &self,
        variables: &[Dcid],
        entities: &[Dcid],
        _selector: &DateSelector,
        _filter: &FacetFilter,
        _ctx: &RequestContext,
    ) -> Result<ObservationBundle, BackendError> {
        let observations = self.observations.read();
        let filtered = observations
            .iter()
            .filter(|obs| variables.contains(&obs.variable) && entities.contains(&obs.entity))
            .cloned()
            .collect();
        Ok(ObservationBundle {
            observations: filtered,
        })
    }

    async fn fetch_property_values(
        &self,
        nodes: &[Dcid],
        property: &str,
        direction: Direction,
        limit: usize,
        _ctx: &RequestContext,
    ) -> Result<HashMap<Dcid, Vec<TypedValue>>, BackendError> {
        let triples = self.triples.read();
        let mut out: HashMap<Dcid, Vec<TypedValue>> = HashMap::new();
        for node in nodes {
            let values: Vec<TypedValue> = triples
                .iter()
                .filter(|t| &t.subject == node && t.property == property && t.direction == direction)
                .take(limit)
                .map(|t| t.object.clone())
                .collect();
            if !values.is_empty() {
                out.insert(node.clone(), values);
            }
        }
        Ok(out)
    }

    async fn resolve(
        &self,
        inputs: &[String],
        in_prop: &str,
        out_prop: &str,
        _ctx: &RequestContext,
    ) -> Result<HashMap<String, Vec<Dcid>>, BackendError> {
        let table = self.resolve_table.read();
        let mapping = table.get(&(in_prop.to_string(), out_prop.to_string()));
        Ok(match mapping {
            Some(mapping) => inputs
                .iter()
                .filter_map(|i| mapping.get(i).map(|v| (i.clone(), v.clone())))
                .collect(),
            None => HashMap::new(),
        })
    }

    async fn search(
        &self,
        _query: &str,
        _types: &[String],
        limit: usize,
        _ctx: &RequestContext,
    ) -> Result<Vec<SearchHit>, BackendError> {
        let hits = self.search_hits.read();
        Ok(hits.iter().take(limit).cloned().collect())
    }
}
