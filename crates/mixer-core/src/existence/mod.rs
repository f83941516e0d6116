//! Existence Index (C9).
//!
//! Answers "does this variable (or variable group) have any data for this
//! entity" without paying for a full observation fetch, and lets the
//! dispatcher short-circuit expensive work once an answer is known
//! negative (§4.9).

use std::collections::{HashMap, HashSet};

use crate::model::{Dcid, VariableGroupGraph};

/// A sparse existence table: which `(variable, entity)` pairs are known to
/// have at least one observation.
///
/// Built once per import-group reload and consulted read-only afterward;
/// it is deliberately a plain in-memory index rather than something that
/// itself fans out to backends — existence is cheap to precompute and
/// expensive to ask about per-request (§4.9).
#[derive(Debug, Clone, Default)]
pub struct ExistenceIndex {
    present: HashMap<Dcid, HashSet<Dcid>>,
}

impl ExistenceIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `variable` has data for `entity`.
    pub fn record(&mut self, variable: Dcid, entity: Dcid) {
        self.present.entry(variable).or_default().insert(entity);
    }

    /// Returns `variable_or_group`'s descendant stat-var count for `entity`:
    /// for a raw variable, 0 or 1; for a variable group, the number of its
    /// transitive leaf variables that have at least one observation for
    /// `entity` (§4.9).
    pub fn exists(&self, entity: &Dcid, variable_or_group: &Dcid, groups: &VariableGroupGraph) -> u64 {
        groups
            .leaf_variables(variable_or_group)
            .into_iter()
            .filter(|leaf| self.leaf_present(leaf, entity))
            .count() as u64
    }

    fn leaf_present(&self, variable: &Dcid, entity: &Dcid) -> bool {
        self.present
            .get(variable)
            .map(|entities| entities.contains(entity))
            .unwrap_or(false)
    }

    /// Filters `variables` down to those with a nonzero existence count for
    /// `entity`, preserving input order — the short-circuit the dispatcher
    /// uses before committing to a full fan-out (§4.9, §5).
    pub fn short_circuit(
        &self,
        entity: &Dcid,
        variables: &[Dcid],
        groups: &VariableGroupGraph,
    ) -> Vec<Dcid> {
        variables
            .iter()
            .filter(|v| self.exists(entity, v, groups) > 0)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_queries_existence() {
        let mut index = ExistenceIndex::new();
        index.record(Dcid::new("Count_Person"), Dcid::new("country/USA"));
        let groups = VariableGroupGraph::default();
        assert_eq!(
            index.exists(&Dcid::new("country/USA"), &Dcid::new("Count_Person"), &groups),
            1
        );
        assert_eq!(
            index.exists(&Dcid::new("country/FRA"), &Dcid::new("Count_Person"), &groups),
            0
        );
    }

    #[test]
    fn short_circuit_filters_to_existing_variables_in_order() {
        let mut index = ExistenceIndex::new();
        index.record(Dcid::new("v1"), Dcid::new("e1"));
        index.record(Dcid::new("v3"), Dcid::new("e1"));
        let groups = VariableGroupGraph::default();
        let result = index.short_circuit(
            &Dcid::new("e1"),
            &[Dcid::new("v1"), Dcid::new("v2"), Dcid::new("v3")],
            &groups,
        );
        assert_eq!(result, vec![Dcid::new("v1"), Dcid::new("v3")]);
    }

    #[test]
    fn group_existence_counts_every_leaf_with_data() {
        let mut groups = VariableGroupGraph::default();
        groups.add_edge(Dcid::new("dc/g/Demographics"), Dcid::new("Count_Person"));
        groups.add_edge(Dcid::new("dc/g/Demographics"), Dcid::new("Median_Age"));

        let mut index = ExistenceIndex::new();
        index.record(Dcid::new("Median_Age"), Dcid::new("country/USA"));
        index.record(Dcid::new("Count_Person"), Dcid::new("country/USA"));

        assert_eq!(
            index.exists(
                &Dcid::new("country/USA"),
                &Dcid::new("dc/g/Demographics"),
                &groups
            ),
            2
        );
        assert_eq!(
            index.exists(
                &Dcid::new("country/FRA"),
                &Dcid::new("dc/g/Demographics"),
                &groups
            ),
            0
        );
    }
}
