//! Ordered Merger (C3).
//!
//! Combines per-backend results — already in priority order thanks to C2 —
//! into one deduplicated, deterministically ordered result, according to
//! one of three merge shapes.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Facet, FacetId, IsoDate, Observation, Triple, TypedValue};

/// Which merge semantics to apply to a set of per-backend result lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeShape {
    /// Keep the first backend's value for a given key; later backends only
    /// fill holes the earlier ones left (node/property requests, §5.1).
    FirstWins,
    /// Keep every distinct value across all backends, deduplicated by key,
    /// first-seen order wins ties (property-value lists, §5.2).
    UnionDedup,
    /// Keep every value from every backend, but deduplicate within each
    /// distinct facet rather than across facets (observations, §5.3).
    PerFacetUnion,
}

/// Something that can be deduplicated by an explicit key, independent of
/// structural equality — e.g. an `Observation`'s `(facet, date)` pair
/// ignores its `value` for dedup purposes.
pub trait DedupKey {
    /// The key type used to detect duplicates.
    type Key: Ord + Clone;

    /// Returns this item's dedup key.
    fn dedup_key(&self) -> Self::Key;
}

/// Merges per-backend lists with first-wins semantics: the first list
/// (highest priority) that has a value for a given key wins; subsequent
/// lists only contribute keys not yet seen.
///
/// `backend_lists` must already be ordered by backend priority (C2's output
/// order); this function does not re-sort backends.
pub fn merge_first_wins<T: DedupKey>(backend_lists: Vec<Vec<T>>) -> Vec<T> {
    let mut seen: BTreeSet<T::Key> = BTreeSet::new();
    let mut out = Vec::new();
    for list in backend_lists {
        for item in list {
            let key = item.dedup_key();
            if seen.insert(key) {
                out.push(item);
            }
        }
    }
    out
}

/// Merges per-backend lists with union-dedup semantics: every distinct key
/// across all backends is kept exactly once, first-seen (by backend
/// priority, then by position within a backend's list) wins.
///
/// This differs from [`merge_first_wins`] only in name at the call site —
/// the dedup mechanics are identical — but the two are kept as distinct
/// entry points because §5 defines them as semantically different merge
/// shapes applied to different request kinds (node/property vs. generic
/// deduplicated lists).
pub fn merge_union_dedup<T: DedupKey>(backend_lists: Vec<Vec<T>>) -> Vec<T> {
    merge_first_wins(backend_lists)
}

/// Merges per-backend observation lists with per-facet-union semantics:
/// every `(variable, entity, facet)` group is claimed whole by the first
/// backend that supplies any point for it. A lower-priority backend's
/// points for an already-claimed facet are discarded entirely, even for
/// dates the claiming backend never reported — distinct facets are kept
/// side by side, but one facet is never assembled out of more than one
/// backend's points (§4.3).
///
/// Unlike the other merge shapes this needs the facet's own identity, not
/// just a generic dedup key, so it operates on `Observation` directly
/// rather than any `DedupKey` type.
pub fn merge_per_facet(backend_lists: Vec<Vec<Observation>>) -> Vec<Observation> {
    let mut claimed: BTreeSet<(String, String, FacetId)> = BTreeSet::new();
    let mut out = Vec::new();
    for list in backend_lists {
        let mut by_facet: BTreeMap<(String, String, FacetId), Vec<Observation>> = BTreeMap::new();
        for obs in list {
            let key = (
                obs.variable.as_str().to_string(),
                obs.entity.as_str().to_string(),
                obs.facet.id(),
            );
            by_facet.entry(key).or_default().push(obs);
        }
        for (key, group) in by_facet {
            if claimed.insert(key) {
                out.extend(group);
            }
        }
    }
    out
}

/// Merges according to an explicit [`MergeShape`], already-yielded keys from
/// a prior page excluded up front so pagination never re-emits a key across
/// page boundaries (§5.4/§6.2).
///
/// `PerFacetUnion` has no generic implementation: claiming a facet whole
/// needs the facet's own identity, which the generic [`DedupKey`] erases.
/// Observation requests use [`merge_per_facet`] directly instead of going
/// through this dispatcher; callers that do reach this function with
/// `PerFacetUnion` get `FirstWins` semantics as a conservative fallback.
pub fn merge_with_shape<T: DedupKey>(
    shape: MergeShape,
    backend_lists: Vec<Vec<T>>,
    already_yielded: &BTreeSet<T::Key>,
) -> Vec<T> {
    let merged = match shape {
        MergeShape::FirstWins => merge_first_wins(backend_lists),
        MergeShape::UnionDedup => merge_union_dedup(backend_lists),
        MergeShape::PerFacetUnion => merge_first_wins(backend_lists),
    };
    merged
        .into_iter()
        .filter(|item| !already_yielded.contains(&item.dedup_key()))
        .collect()
}

impl DedupKey for Observation {
    /// `(variable, entity, facet, date)` — values themselves never
    /// participate in dedup, so two backends reporting different values for
    /// the same fact still collapse to one (first-priority wins).
    type Key = (String, String, FacetId, IsoDate);

    fn dedup_key(&self) -> Self::Key {
        (
            self.variable.as_str().to_string(),
            self.entity.as_str().to_string(),
            self.facet.id(),
            self.date.clone(),
        )
    }
}

impl DedupKey for Triple {
    /// `(property, direction, object)` — `subject` is implicit in the list
    /// this triple lives in, so it is deliberately excluded from the key.
    type Key = (String, bool, String);

    fn dedup_key(&self) -> Self::Key {
        (
            self.property.clone(),
            matches!(self.direction, crate::model::Direction::Out),
            self.object.dedup_key().to_string(),
        )
    }
}

impl DedupKey for TypedValue {
    /// Delegates to §4.3's value-level dedup key: `Dcid` if present, else
    /// the literal text.
    type Key = String;

    fn dedup_key(&self) -> Self::Key {
        TypedValue::dedup_key(self).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Dcid;

    fn facet(provenance_url: &str) -> Facet {
        Facet {
            measurement_method: Some("census".into()),
            observation_period: Some("P1Y".into()),
            unit: None,
            scaling_factor: None,
            import_name: Some("census_import".into()),
            provenance_url: Some(provenance_url.into()),
        }
    }

    fn obs(entity: &str, date: &str, value: f64, facet: Facet) -> Observation {
        Observation {
            variable: Dcid::new("Count_Person"),
            entity: Dcid::new(entity),
            date: IsoDate::new(date),
            value,
            facet,
        }
    }

    #[test]
    fn per_facet_merge_claims_a_facet_whole_from_the_first_backend_that_has_it() {
        let f = facet("https://census.gov");
        let b1 = vec![obs("country/USA", "2020", 1.0, f.clone())];
        let b2 = vec![
            obs("country/USA", "2020", 99.0, f.clone()),
            obs("country/USA", "2021", 2.0, f.clone()),
        ];
        let merged = merge_per_facet(vec![b1, b2]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].date, IsoDate::new("2020"));
        assert_eq!(merged[0].value, 1.0);
    }

    #[test]
    fn per_facet_merge_keeps_distinct_facets_side_by_side() {
        let census = facet("https://census.gov");
        let un = facet("https://un.org");
        let b1 = vec![obs("country/USA", "2020", 1.0, census.clone())];
        let b2 = vec![obs("country/USA", "2022", 2.0, un.clone())];
        let merged = merge_per_facet(vec![b1, b2]);
        assert_eq!(merged.len(), 2);
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        key: &'static str,
        source: &'static str,
    }

    impl DedupKey for Item {
        type Key = &'static str;
        fn dedup_key(&self) -> Self::Key {
            self.key
        }
    }

    #[test]
    fn first_wins_keeps_highest_priority_backend_value() {
        let a = vec![Item {
            key: "x",
            source: "primary",
        }];
        let b = vec![Item {
            key: "x",
            source: "secondary",
        }];
        let merged = merge_first_wins(vec![a, b]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source, "primary");
    }

    #[test]
    fn first_wins_fills_holes_from_lower_priority_backends() {
        let a = vec![Item {
            key: "x",
            source: "primary",
        }];
        let b = vec![Item {
            key: "y",
            source: "secondary",
        }];
        let merged = merge_first_wins(vec![a, b]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].key, "x");
        assert_eq!(merged[1].key, "y");
    }

    #[test]
    fn shape_dispatch_excludes_already_yielded_keys() {
        let a = vec![
            Item {
                key: "x",
                source: "primary",
            },
            Item {
                key: "y",
                source: "primary",
            },
        ];
        let mut yielded = BTreeSet::new();
        yielded.insert("x");
        let merged = merge_with_shape(MergeShape::FirstWins, vec![a], &yielded);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].key, "y");
    }
}
