//! Import groups: the priority-ordered backend roster.

use serde::{Deserialize, Serialize};

/// A named, ordered collection of backends that together form one logical
/// view of the graph.
///
/// Ordering is priority: lower `priority` means higher preference when
/// merging (§3). The process-wide list of import groups is loaded once at
/// startup (see [`crate::config`]) and is immutable thereafter; a reload
/// swaps the whole roster atomically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportGroup {
    /// The import group's name.
    pub name: String,
    /// Backend entries, in priority order (index 0 = highest priority).
    pub backends: Vec<BackendEntry>,
}

impl ImportGroup {
    /// Creates a new, empty import group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backends: Vec::new(),
        }
    }

    /// Appends a backend entry, assigning it the next priority rank.
    pub fn with_backend(mut self, name: impl Into<String>) -> Self {
        let priority = self.backends.len() as u32;
        self.backends.push(BackendEntry {
            name: name.into(),
            priority,
        });
        self
    }

    /// Returns backend entries ordered by `(priority asc, name asc)` — the
    /// tie-break spec.md §9 resolves for equal-priority backends.
    pub fn ordered_backends(&self) -> Vec<&BackendEntry> {
        let mut entries: Vec<&BackendEntry> = self.backends.iter().collect();
        entries.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        entries
    }
}

/// One backend's identity within an [`ImportGroup`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendEntry {
    /// The backend's name, unique within its import group.
    pub name: String,
    /// The backend's priority rank; lower is preferred.
    pub priority: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_backends_tie_breaks_by_name() {
        let group = ImportGroup {
            name: "base".to_string(),
            backends: vec![
                BackendEntry {
                    name: "zeta".to_string(),
                    priority: 0,
                },
                BackendEntry {
                    name: "alpha".to_string(),
                    priority: 0,
                },
            ],
        };
        let ordered = group.ordered_backends();
        assert_eq!(ordered[0].name, "alpha");
        assert_eq!(ordered[1].name, "zeta");
    }

    #[test]
    fn with_backend_assigns_increasing_priority() {
        let group = ImportGroup::new("base")
            .with_backend("b1")
            .with_backend("b2");
        assert_eq!(group.backends[0].priority, 0);
        assert_eq!(group.backends[1].priority, 1);
    }
}
