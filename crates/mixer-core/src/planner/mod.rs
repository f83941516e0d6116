//! Observation Query Planner (C5).
//!
//! Fans a `(variables x entities)` observation request out to every backend
//! in priority order, merges the results per-facet, then applies the date
//! selector and facet filter the backends themselves are not trusted to
//! apply consistently (§4.5).

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::backend::{BackendDriver, RequestContext};
use crate::error::MixerResult;
use crate::fanout::{FanOutExecutor, FanOutJob, JobOutcome};
use crate::merge::merge_per_facet;
use crate::model::{
    Dcid, DateSelector, Facet, FacetFilter, FacetId, IsoDate, Observation, ObservationBundle,
    ObservationSeries,
};

/// Which entities an observation query covers.
#[derive(Debug, Clone)]
pub enum EntitySelector {
    /// An explicit, caller-supplied list of entities.
    Explicit(Vec<Dcid>),
}

impl EntitySelector {
    /// Resolves this selector to a concrete entity list.
    pub fn resolve(&self) -> &[Dcid] {
        match self {
            EntitySelector::Explicit(entities) => entities,
        }
    }
}

/// A fully specified observation request (§4.5).
#[derive(Debug, Clone)]
pub struct ObservationQuery {
    /// The statistical variables requested.
    pub variables: Vec<Dcid>,
    /// The entities requested.
    pub entities: EntitySelector,
    /// Which date(s) to keep per `(variable, entity, facet)`.
    pub date: DateSelector,
    /// Restricts which facets are kept, applied after merging.
    pub facet_filter: FacetFilter,
}

/// Runs the full observation pipeline: fan-out, per-facet merge, date
/// selection, facet filtering.
///
/// Backends are called with [`DateSelector::All`] and an empty facet filter
/// regardless of `query`'s own selector/filter — date selection and facet
/// filtering are applied uniformly here, after merging, so that backends
/// disagreeing about "latest" (e.g. due to clock skew) can never produce an
/// inconsistent final answer (§4.5).
pub async fn plan_and_fetch(
    query: &ObservationQuery,
    backends: &[Arc<dyn BackendDriver>],
    ctx: &RequestContext,
) -> MixerResult<ObservationBundle> {
    let entities = query.entities.resolve().to_vec();
    let mut ordered_backends: Vec<Arc<dyn BackendDriver>> = backends.to_vec();
    ordered_backends.sort_by_key(|b| b.priority());

    let jobs = build_jobs(&ordered_backends, &query.variables, &entities, ctx);

    let result = FanOutExecutor::new().run(jobs, ctx).await?;

    let mut per_backend_lists: Vec<Vec<Observation>> = Vec::new();
    for outcome in result.outcomes {
        match outcome {
            JobOutcome::Ok(bundle) => per_backend_lists.push(bundle.observations),
            JobOutcome::Skipped => per_backend_lists.push(Vec::new()),
            JobOutcome::Failed(_) => per_backend_lists.push(Vec::new()),
        }
    }

    let merged = merge_per_facet(per_backend_lists);
    let selected = apply_date_selector(merged, &query.date)?;
    let filtered: Vec<Observation> = selected
        .into_iter()
        .filter(|obs| query.facet_filter.matches(&obs.facet))
        .collect();

    Ok(ObservationBundle {
        observations: filtered,
    })
}

/// Builds one fan-out job per backend, each borrowing `ctx` for its call.
fn build_jobs(
    backends: &[Arc<dyn BackendDriver>],
    variables: &[Dcid],
    entities: &[Dcid],
    ctx: &RequestContext,
) -> Vec<FanOutJob<ObservationBundle>> {
    backends
        .iter()
        .map(|backend| {
            let backend = Arc::clone(backend);
            let variables = variables.to_vec();
            let entities = entities.to_vec();
            let ctx = ctx.clone();
            FanOutJob::new(backend.name().to_string(), async move {
                backend
                    .fetch_observations(
                        &variables,
                        &entities,
                        &DateSelector::All,
                        &FacetFilter::default(),
                        &ctx,
                    )
                    .await
            })
        })
        .collect()
}

/// Groups merged observations by `(variable, entity, facet)` and applies the
/// requested date selector within each group.
///
/// `pub(crate)` so the dispatcher can reuse it when selecting dates out of a
/// formula's derived series, which never goes through [`plan_and_fetch`]
/// itself (§4.6).
pub(crate) fn apply_date_selector(
    observations: Vec<Observation>,
    selector: &DateSelector,
) -> MixerResult<Vec<Observation>> {
    let mut groups: BTreeMap<(String, String, FacetId), (Facet, Vec<(IsoDate, f64)>)> =
        BTreeMap::new();

    for obs in observations {
        let key = (
            obs.variable.as_str().to_string(),
            obs.entity.as_str().to_string(),
            obs.facet.id(),
        );
        groups
            .entry(key)
            .or_insert_with(|| (obs.facet.clone(), Vec::new()))
            .1
            .push((obs.date.clone(), obs.value));
    }

    let mut out = Vec::new();
    for ((variable, entity, _facet_id), (facet, points)) in groups {
        let series = ObservationSeries::from_points(points)?;
        let kept: Vec<(IsoDate, f64)> = match selector {
            DateSelector::All => series.points,
            DateSelector::Latest => series.latest().cloned().into_iter().collect(),
            DateSelector::Exact(date) => series
                .at(date)
                .map(|value| (date.clone(), value))
                .into_iter()
                .collect(),
        };
        for (date, value) in kept {
            out.push(Observation {
                variable: Dcid::new(variable.clone()),
                entity: Dcid::new(entity.clone()),
                date,
                value,
                facet: facet.clone(),
            });
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RowKey;
    use crate::error::BackendError;
    use crate::model::{Direction, TypedValue};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    #[derive(Debug)]
    struct StubBackend {
        name: &'static str,
        priority: u32,
        observations: Vec<Observation>,
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
            _variables: &[Dcid],
            _entities: &[Dcid],
            _selector: &DateSelector,
            _filter: &FacetFilter,
            _ctx: &RequestContext,
        ) -> Result<ObservationBundle, BackendError> {
            Ok(ObservationBundle {
                observations: self.observations.clone(),
            })
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
            _inputs: &[String],
            _in_prop: &str,
            _out_prop: &str,
            _ctx: &RequestContext,
        ) -> Result<HashMap<String, Vec<Dcid>>, BackendError> {
            Ok(HashMap::new())
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new("t1", Instant::now() + Duration::from_secs(5))
    }

    fn facet() -> Facet {
        Facet {
            measurement_method: Some("census".into()),
            observation_period: Some("P1Y".into()),
            unit: None,
            scaling_factor: None,
            import_name: Some("census_import".into()),
            provenance_url: Some("https://census.gov".into()),
        }
    }

    #[tokio::test]
    async fn latest_selector_keeps_only_max_date() {
        let backend: Arc<dyn BackendDriver> = Arc::new(StubBackend {
            name: "b1",
            priority: 0,
            observations: vec![
                Observation {
                    variable: Dcid::new("Count_Person"),
                    entity: Dcid::new("country/USA"),
                    date: IsoDate::new("2019"),
                    value: 1.0,
                    facet: facet(),
                },
                Observation {
                    variable: Dcid::new("Count_Person"),
                    entity: Dcid::new("country/USA"),
                    date: IsoDate::new("2020"),
                    value: 2.0,
                    facet: facet(),
                },
            ],
        });
        let query = ObservationQuery {
            variables: vec![Dcid::new("Count_Person")],
            entities: EntitySelector::Explicit(vec![Dcid::new("country/USA")]),
            date: DateSelector::Latest,
            facet_filter: FacetFilter::default(),
        };
        let bundle = plan_and_fetch(&query, &[backend], &ctx()).await.unwrap();
        assert_eq!(bundle.observations.len(), 1);
        assert_eq!(bundle.observations[0].date, IsoDate::new("2020"));
    }

    #[tokio::test]
    async fn facet_filter_drops_non_matching_facets() {
        let mut other = facet();
        other.provenance_url = Some("https://un.org".into());
        let backend: Arc<dyn BackendDriver> = Arc::new(StubBackend {
            name: "b1",
            priority: 0,
            observations: vec![
                Observation {
                    variable: Dcid::new("Count_Person"),
                    entity: Dcid::new("country/USA"),
                    date: IsoDate::new("2020"),
                    value: 1.0,
                    facet: facet(),
                },
                Observation {
                    variable: Dcid::new("Count_Person"),
                    entity: Dcid::new("country/USA"),
                    date: IsoDate::new("2020"),
                    value: 2.0,
                    facet: other,
                },
            ],
        });
        let query = ObservationQuery {
            variables: vec![Dcid::new("Count_Person")],
            entities: EntitySelector::Explicit(vec![Dcid::new("country/USA")]),
            date: DateSelector::All,
            facet_filter: FacetFilter {
                domains: vec!["census.gov".to_string()],
                facet_ids: vec![],
            },
        };
        let bundle = plan_and_fetch(&query, &[backend], &ctx()).await.unwrap();
        assert_eq!(bundle.observations.len(), 1);
        assert_eq!(
            bundle.observations[0].facet.provenance_url.as_deref(),
            Some("https://census.gov")
        );
    }
}
