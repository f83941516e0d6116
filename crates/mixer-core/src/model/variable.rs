//! Statistical variables and variable groups.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::dcid::Dcid;

/// A distinguished entity representing a statistical variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// The variable's identifier.
    pub dcid: Dcid,
    /// The group this variable belongs to directly, if any.
    pub member_of_group: Option<Dcid>,
}

/// The variable-group DAG, rooted at a single "Root" group.
///
/// Stored as an adjacency map from group to its direct children (which may
/// be raw variables or further groups); callers distinguish the two by
/// checking membership in `groups`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableGroupGraph {
    /// Direct children of each group, in registration order.
    pub children: BTreeMap<Dcid, Vec<Dcid>>,
    /// The set of DCIDs that are groups rather than raw variables.
    pub groups: std::collections::BTreeSet<Dcid>,
}

impl VariableGroupGraph {
    /// The identifier of the DAG's root group.
    pub fn root() -> Dcid {
        Dcid::new("Root")
    }

    /// Registers `child` as a direct descendant of `group`.
    pub fn add_edge(&mut self, group: Dcid, child: Dcid) {
        self.groups.insert(group.clone());
        self.children.entry(group).or_default().push(child);
    }

    /// Returns every transitive descendant of `node` (groups and leaves),
    /// in breadth-first discovery order, guarding against cycles.
    pub fn descendants(&self, node: &Dcid) -> Vec<Dcid> {
        let mut seen = std::collections::BTreeSet::new();
        let mut queue = std::collections::VecDeque::new();
        let mut out = Vec::new();
        queue.push_back(node.clone());
        seen.insert(node.clone());
        while let Some(current) = queue.pop_front() {
            if let Some(kids) = self.children.get(&current) {
                for kid in kids {
                    if seen.insert(kid.clone()) {
                        out.push(kid.clone());
                        queue.push_back(kid.clone());
                    }
                }
            }
        }
        out
    }

    /// Returns the raw variables (non-group leaves) under `node`, including
    /// `node` itself if it is not a group.
    pub fn leaf_variables(&self, node: &Dcid) -> Vec<Dcid> {
        if !self.groups.contains(node) {
            return vec![node.clone()];
        }
        self.descendants(node)
            .into_iter()
            .filter(|d| !self.groups.contains(d))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descendants_are_transitive() {
        let mut graph = VariableGroupGraph::default();
        graph.add_edge(Dcid::new("Root"), Dcid::new("Demographics"));
        graph.add_edge(Dcid::new("Demographics"), Dcid::new("Count_Person"));
        graph.add_edge(Dcid::new("Demographics"), Dcid::new("Count_Person_Female"));

        let descendants = graph.descendants(&Dcid::new("Root"));
        assert!(descendants.contains(&Dcid::new("Count_Person")));
        assert!(descendants.contains(&Dcid::new("Count_Person_Female")));
    }

    #[test]
    fn leaf_variables_excludes_groups() {
        let mut graph = VariableGroupGraph::default();
        graph.add_edge(Dcid::new("Root"), Dcid::new("Demographics"));
        graph.add_edge(Dcid::new("Demographics"), Dcid::new("Count_Person"));

        let leaves = graph.leaf_variables(&Dcid::new("Root"));
        assert_eq!(leaves, vec![Dcid::new("Count_Person")]);
    }

    #[test]
    fn leaf_variable_of_raw_variable_is_itself() {
        let graph = VariableGroupGraph::default();
        let leaves = graph.leaf_variables(&Dcid::new("Count_Person"));
        assert_eq!(leaves, vec![Dcid::new("Count_Person")]);
    }
}
