//! Resolver (C8).
//!
//! Resolves external references to internal `Dcid`s three ways: by a named
//! property mapping (e.g. `wikidataId -> dcid`), by geographic coordinate,
//! or by free-text description. Each mode has its own merge/ranking policy
//! (§4.8).

use std::collections::HashMap;
use std::sync::Arc as StdArc;

use crate::backend::{BackendDriver, RequestContext};
use crate::error::MixerResult;
use crate::fanout::{FanOutExecutor, FanOutJob, JobOutcome};
use crate::model::Dcid;

/// A candidate match produced by coordinate or description resolution,
/// carrying enough to rank and dedup across backends.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionCandidate {
    /// The resolved entity.
    pub dcid: Dcid,
    /// A backend-assigned confidence/relevance score (higher is better).
    pub score: f64,
}

/// A point on the Earth's surface, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// A pluggable index over entities with known coordinates, queried by the
/// coordinate resolution mode. Kept as a trait rather than a concrete
/// backend method because coordinate resolution is commonly served by a
/// specialized spatial index rather than the general `BackendDriver`s.
#[async_trait::async_trait]
pub trait CoordinateIndex: Send + Sync + std::fmt::Debug {
    /// Returns entities near `point`, within `radius_km`, best match first.
    async fn nearest(
        &self,
        point: Coordinate,
        radius_km: f64,
        limit: usize,
        ctx: &RequestContext,
    ) -> MixerResult<Vec<ResolutionCandidate>>;
}

/// Resolves a batch of external identifiers via a named `(in_prop, out_prop)`
/// mapping across every backend, first-wins on a per-input basis: once one
/// backend has resolved a given input to at least one `Dcid`, lower-priority
/// backends' answers for that same input are discarded (§4.8.1).
pub async fn resolve_by_property(
    inputs: &[String],
    in_prop: &str,
    out_prop: &str,
    backends: &[StdArc<dyn BackendDriver>],
    ctx: &RequestContext,
) -> MixerResult<HashMap<String, Vec<Dcid>>> {
    let mut ordered: Vec<StdArc<dyn BackendDriver>> = backends.to_vec();
    ordered.sort_by_key(|b| b.priority());

    let jobs: Vec<FanOutJob<HashMap<String, Vec<Dcid>>>> = ordered
        .iter()
        .map(|backend| {
            let backend = StdArc::clone(backend);
            let inputs = inputs.to_vec();
            let in_prop = in_prop.to_string();
            let out_prop = out_prop.to_string();
            let ctx = ctx.clone();
            FanOutJob::new(backend.name().to_string(), async move {
                backend.resolve(&inputs, &in_prop, &out_prop, &ctx).await
            })
        })
        .collect();

    let result = FanOutExecutor::new().run(jobs, ctx).await?;

    let mut resolved: HashMap<String, Vec<Dcid>> = HashMap::new();
    for outcome in result.outcomes {
        if let JobOutcome::Ok(mapping) = outcome {
            for (input, dcids) in mapping {
                resolved.entry(input).or_insert(dcids);
            }
        }
    }
    Ok(resolved)
}

/// Resolves a coordinate to candidate entities via a pluggable spatial
/// index, ranking candidates by descending score and breaking ties by
/// `Dcid` ascending for determinism (§9's tie-break convention, carried
/// here for consistency even though coordinate scores rarely collide).
pub async fn resolve_by_coordinate(
    point: Coordinate,
    radius_km: f64,
    limit: usize,
    index: &dyn CoordinateIndex,
    ctx: &RequestContext,
) -> MixerResult<Vec<ResolutionCandidate>> {
    let mut candidates = index.nearest(point, radius_km, limit, ctx).await?;
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.dcid.as_str().cmp(b.dcid.as_str()))
    });
    candidates.truncate(limit);
    Ok(candidates)
}

/// Resolves a free-text description via every backend's `search`, merging
/// hits across backends by taking, for each distinct `Dcid`, its best score
/// across all backends (§4.8.3) — unlike `resolve_by_property`'s
/// first-wins, a weak match from the primary backend should not shadow a
/// strong match from a secondary one.
pub async fn resolve_by_description(
    query: &str,
    types: &[String],
    limit: usize,
    backends: &[StdArc<dyn BackendDriver>],
    ctx: &RequestContext,
) -> MixerResult<Vec<ResolutionCandidate>> {
    let jobs: Vec<FanOutJob<Vec<crate::backend::SearchHit>>> = backends
        .iter()
        .map(|backend| {
            let backend = StdArc::clone(backend);
            let query = query.to_string();
            let types = types.to_vec();
            let ctx = ctx.clone();
            FanOutJob::new(backend.name().to_string(), async move {
                backend.search(&query, &types, limit, &ctx).await
            })
        })
        .collect();

    let result = FanOutExecutor::new().run(jobs, ctx).await?;

    let mut best: HashMap<Dcid, f64> = HashMap::new();
    for outcome in result.outcomes {
        if let JobOutcome::Ok(hits) = outcome {
            for hit in hits {
                best.entry(hit.dcid)
                    .and_modify(|score| {
                        if hit.score > *score {
                            *score = hit.score;
                        }
                    })
                    .or_insert(hit.score);
            }
        }
    }

    let mut candidates: Vec<ResolutionCandidate> = best
        .into_iter()
        .map(|(dcid, score)| ResolutionCandidate { dcid, score })
        .collect();
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.dcid.as_str().cmp(b.dcid.as_str()))
    });
    candidates.truncate(limit);
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{RowKey, SearchHit};
    use crate::error::BackendError;
    use crate::model::{DateSelector, Direction, FacetFilter, ObservationBundle, TypedValue};
    use async_trait::async_trait;
    use std::time::{Duration, Instant};

    #[derive(Debug)]
    struct StubBackend {
        name: &'static str,
        priority: u32,
        resolve_map: HashMap<String, Vec<Dcid>>,
        hits: Vec<SearchHit>,
    }

    #[async_trait]
    impl BackendDriver for StubBackend {
        fn name(&self) -> &str {
            self.name
        }
        fn priority(&self) -> u32 {
            self.priority
        }
        async fn read_rows(
            &self,
            _keys: &[RowKey],
            _ctx: &RequestContext,
        ) -> Result<HashMap<RowKey, Vec<u8>>, BackendError> {
            Ok(HashMap::new())
        }
        async fn fetch_observations(
            &self,
            _v: &[Dcid],
            _e: &[Dcid],
            _s: &DateSelector,
            _f: &FacetFilter,
            _ctx: &RequestContext,
        ) -> Result<ObservationBundle, BackendError> {
            Ok(ObservationBundle::default())
        }
        async fn fetch_property_values(
            &self,
            _nodes: &[Dcid],
            _property: &str,
            _direction: Direction,
            _limit: usize,
            _ctx: &RequestContext,
        ) -> Result<HashMap<Dcid, Vec<TypedValue>>, BackendError> {
            Ok(HashMap::new())
        }
        async fn resolve(
            &self,
            inputs: &[String],
            _in_prop: &str,
            _out_prop: &str,
            _ctx: &RequestContext,
        ) -> Result<HashMap<String, Vec<Dcid>>, BackendError> {
            Ok(inputs
                .iter()
                .filter_map(|i| self.resolve_map.get(i).map(|v| (i.clone(), v.clone())))
                .collect())
        }
        async fn search(
            &self,
            _query: &str,
            _types: &[String],
            _limit: usize,
            _ctx: &RequestContext,
        ) -> Result<Vec<SearchHit>, BackendError> {
            Ok(self.hits.clone())
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new("r1", Instant::now() + Duration::from_secs(5))
    }

    #[tokio::test]
    async fn property_resolution_prefers_higher_priority_backend() {
        let mut primary_map = HashMap::new();
        primary_map.insert("Q30".to_string(), vec![Dcid::new("country/USA")]);
        let primary: StdArc<dyn BackendDriver> = StdArc::new(StubBackend {
            name: "primary",
            priority: 0,
            resolve_map: primary_map,
            hits: vec![],
        });

        let mut secondary_map = HashMap::new();
        secondary_map.insert("Q30".to_string(), vec![Dcid::new("wrong/Answer")]);
        let secondary: StdArc<dyn BackendDriver> = StdArc::new(StubBackend {
            name: "secondary",
            priority: 1,
            resolve_map: secondary_map,
            hits: vec![],
        });

        let result = resolve_by_property(
            &["Q30".to_string()],
            "wikidataId",
            "dcid",
            &[primary, secondary],
            &ctx(),
        )
        .await
        .unwrap();

        assert_eq!(result["Q30"], vec![Dcid::new("country/USA")]);
    }

    #[tokio::test]
    async fn description_resolution_keeps_best_score_per_dcid() {
        let b1: StdArc<dyn BackendDriver> = StdArc::new(StubBackend {
            name: "b1",
            priority: 0,
            resolve_map: HashMap::new(),
            hits: vec![SearchHit {
                dcid: Dcid::new("country/USA"),
                score: 0.5,
            }],
        });
        let b2: StdArc<dyn BackendDriver> = StdArc::new(StubBackend {
            name: "b2",
            priority: 1,
            resolve_map: HashMap::new(),
            hits: vec![SearchHit {
                dcid: Dcid::new("country/USA"),
                score: 0.9,
            }],
        });

        let result = resolve_by_description("United States", &[], 10, &[b1, b2], &ctx())
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].score, 0.9);
    }
}
