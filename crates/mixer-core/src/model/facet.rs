//! Facets: content-addressed provenance tuples.

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

/// The provenance tuple identifying the source of a set of observations.
///
/// Facets are content-addressed: two facets with identical tuples are one
/// facet (§3). Field order and lowercasing below are fixed so the same
/// facet always canonicalizes to the same bytes, and therefore the same
/// [`FacetId`], across processes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Facet {
    /// The measurement method, e.g. `"CensusACS5yrSurvey"`.
    pub measurement_method: Option<String>,
    /// The observation period, e.g. `"P1Y"`.
    pub observation_period: Option<String>,
    /// The unit of measurement.
    pub unit: Option<String>,
    /// A scaling factor applied to raw values.
    pub scaling_factor: Option<String>,
    /// The name of the import that produced this facet.
    pub import_name: Option<String>,
    /// A URL identifying the provenance of this facet.
    pub provenance_url: Option<String>,
}

/// A 64-bit stable hash of a canonicalized [`Facet`] tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FacetId(pub u64);

impl Facet {
    /// Computes this facet's stable, content-addressed [`FacetId`].
    ///
    /// Fields are serialized in fixed order; empty strings are omitted and
    /// case-insensitive fields are lowercased before hashing, so two facets
    /// that differ only in casing or in which fields are explicitly empty
    /// hash identically.
    pub fn id(&self) -> FacetId {
        let mut canonical = String::new();
        for field in [
            &self.measurement_method,
            &self.observation_period,
            &self.unit,
            &self.scaling_factor,
            &self.import_name,
            &self.provenance_url,
        ] {
            match field.as_deref().map(str::to_lowercase) {
                Some(ref s) if !s.is_empty() => {
                    canonical.push_str(s);
                    canonical.push('\u{1}');
                }
                _ => canonical.push('\u{1}'),
            }
        }
        FacetId(xxh3_64(canonical.as_bytes()))
    }
}

/// A non-empty list-of-lists facet filter: a facet passes iff it matches at
/// least one entry in each non-empty list (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacetFilter {
    /// Accepted provenance domains (matched against `provenance_url`'s host).
    pub domains: Vec<String>,
    /// Accepted explicit facet IDs.
    pub facet_ids: Vec<FacetId>,
}

impl FacetFilter {
    /// Returns true if this filter has no constraints (passes everything).
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty() && self.facet_ids.is_empty()
    }

    /// Applies this filter to a facet. Idempotent: applying twice is
    /// equivalent to applying once, since the check is a pure predicate.
    pub fn matches(&self, facet: &Facet) -> bool {
        let domain_ok = self.domains.is_empty()
            || facet
                .provenance_url
                .as_deref()
                .map(|url| self.domains.iter().any(|d| url.contains(d.as_str())))
                .unwrap_or(false);

        let id_ok = self.facet_ids.is_empty() || self.facet_ids.contains(&facet.id());

        domain_ok && id_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facet(url: &str) -> Facet {
        Facet {
            measurement_method: Some("CensusACS5yrSurvey".to_string()),
            observation_period: Some("P1Y".to_string()),
            unit: None,
            scaling_factor: None,
            import_name: Some("census".to_string()),
            provenance_url: Some(url.to_string()),
        }
    }

    #[test]
    fn identical_tuples_hash_identically() {
        let a = facet("https://census.gov/data");
        let b = facet("https://census.gov/data");
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn casing_does_not_change_id() {
        let a = Facet {
            import_name: Some("Census".to_string()),
            ..facet("https://census.gov/data")
        };
        let b = Facet {
            import_name: Some("census".to_string()),
            ..facet("https://census.gov/data")
        };
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn different_tuples_hash_differently() {
        let a = facet("https://census.gov/data");
        let b = facet("https://un.org/data");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = FacetFilter::default();
        assert!(filter.matches(&facet("https://census.gov/data")));
    }

    #[test]
    fn domain_filter_rejects_non_matching_facet() {
        let filter = FacetFilter {
            domains: vec!["census.gov".to_string()],
            facet_ids: vec![],
        };
        assert!(filter.matches(&facet("https://census.gov/data")));
        assert!(!filter.matches(&facet("https://un.org/data")));
    }

    #[test]
    fn filter_is_idempotent() {
        let filter = FacetFilter {
            domains: vec!["census.gov".to_string()],
            facet_ids: vec![],
        };
        let f = facet("https://un.org/data");
        assert_eq!(filter.matches(&f), filter.matches(&f));
    }
}
