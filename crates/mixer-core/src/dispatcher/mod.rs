//! Request Dispatcher (C10).
//!
//! The single entry point every RPC handler in `mixer-api` calls through:
//! it owns the live backend registry and import-group roster, and drives
//! each request through planning, fan-out, merging, and pagination in
//! sequence (§5).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::instrument;

use crate::backend::{BackendDriver, RequestContext};
use crate::error::{MixerError, MixerResult};
use crate::existence::ExistenceIndex;
use crate::fanout::{Diagnostic, FanOutExecutor, FanOutJob, JobOutcome};
use crate::formula::{self, FormulaRegistry, SeriesInput};
use crate::merge::merge_union_dedup;
use crate::model::{Dcid, DateSelector, Direction, FacetFilter, Observation, TypedValue, VariableGroupGraph};
use crate::pagination::{self, Cursor, Page, PerBackendOffset};
use crate::planner::{self, EntitySelector, ObservationQuery};
use crate::resolver::{self, Coordinate, CoordinateIndex, ResolutionCandidate};
use crate::traversal::{self, TraversalPath};

/// The phase a single request is currently in, surfaced through tracing
/// spans and useful for the server's in-flight request introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Parsing the request and consulting the existence index.
    Planning,
    /// Fanning out to backends.
    FanningOut,
    /// Merging per-backend results.
    Merging,
    /// Slicing the merged result into a page.
    Paginating,
    /// The response is ready.
    Complete,
}

/// Per-backend outcome diagnostics, surfaced alongside a successful
/// response so callers can see which backends contributed (§7).
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    /// One entry per backend consulted.
    pub per_backend: Vec<Diagnostic>,
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(per_backend: Vec<Diagnostic>) -> Self {
        Self { per_backend }
    }
}

/// A request to traverse one or more hops of properties from a set of
/// starting nodes.
#[derive(Debug, Clone)]
pub struct NodeRequest {
    /// The starting nodes.
    pub nodes: Vec<Dcid>,
    /// A traversal path expression, e.g. `->containedInPlace`.
    pub path: String,
    /// Caller-supplied pagination cursor, if continuing a prior request.
    pub cursor: Option<String>,
    /// Maximum number of `(origin, value)` pairs to return in this page.
    pub page_size: usize,
}

/// The result of a [`NodeRequest`]: final-hop values grouped by the
/// original starting node they were reached from.
#[derive(Debug, Clone, Default)]
pub struct NodeResponse {
    /// Values reached per origin node.
    pub values: HashMap<Dcid, Vec<TypedValue>>,
    /// Present iff more results may exist beyond this page.
    pub next_cursor: Option<String>,
    /// Per-backend diagnostics.
    pub diagnostics: Diagnostics,
}

/// A request for statistical observations.
#[derive(Debug, Clone)]
pub struct ObservationRequest {
    /// The statistical variables requested.
    pub variables: Vec<Dcid>,
    /// The entities requested.
    pub entities: Vec<Dcid>,
    /// Which date(s) to keep.
    pub date: DateSelector,
    /// Restricts which facets are kept.
    pub facet_filter: FacetFilter,
    /// Caller-supplied pagination cursor, if continuing a prior request.
    pub cursor: Option<String>,
    /// Maximum number of observations to return in this page.
    pub page_size: usize,
}

/// The result of an [`ObservationRequest`].
#[derive(Debug, Clone, Default)]
pub struct ObservationResponse {
    /// The observations in this page.
    pub observations: Vec<Observation>,
    /// Present iff more results may exist beyond this page.
    pub next_cursor: Option<String>,
    /// Per-backend diagnostics.
    pub diagnostics: Diagnostics,
}

/// Which resolution mode a [`ResolveRequest`] uses.
#[derive(Debug, Clone)]
pub enum ResolveRequest {
    /// Resolve external identifiers via a named property mapping.
    ByProperty {
        /// The raw external identifiers.
        inputs: Vec<String>,
        /// The backend-side input property, e.g. `wikidataId`.
        in_prop: String,
        /// The backend-side output property, normally `dcid`.
        out_prop: String,
    },
    /// Resolve a geographic coordinate to nearby entities.
    ByCoordinate {
        /// The query point.
        point: Coordinate,
        /// Search radius in kilometers.
        radius_km: f64,
        /// Maximum candidates to return.
        limit: usize,
    },
    /// Resolve a free-text description.
    ByDescription {
        /// The query text.
        query: String,
        /// Restricts matches to these `typeOf` values, if non-empty.
        types: Vec<String>,
        /// Maximum candidates to return.
        limit: usize,
    },
}

/// The result of a [`ResolveRequest`], shaped to match the request's mode.
#[derive(Debug, Clone)]
pub enum ResolveResponse {
    /// One entry per input, in the order it was requested.
    ByProperty(HashMap<String, Vec<Dcid>>),
    /// Ranked candidates.
    Ranked(Vec<ResolutionCandidate>),
}

/// A free-text node search request.
#[derive(Debug, Clone)]
pub struct NodeSearchRequest {
    /// The query text.
    pub query: String,
    /// Restricts matches to these `typeOf` values, if non-empty.
    pub types: Vec<String>,
    /// Maximum candidates to return.
    pub limit: usize,
}

/// The result of a [`NodeSearchRequest`].
#[derive(Debug, Clone)]
pub struct NodeSearchResponse {
    /// Ranked candidates.
    pub candidates: Vec<ResolutionCandidate>,
}

/// The dispatcher: owns the backend registry, import-group roster epoch,
/// existence index, variable-group graph, and formula registry, and
/// exposes the four RPC entry points every `mixer-api` handler calls.
pub struct Dispatcher {
    backends: Vec<Arc<dyn BackendDriver>>,
    view_epoch: u64,
    existence: ExistenceIndex,
    variable_groups: VariableGroupGraph,
    formulas: FormulaRegistry,
    coordinate_index: Option<Arc<dyn CoordinateIndex>>,
}

impl Dispatcher {
    /// Builds a dispatcher over a fixed backend set and roster epoch.
    pub fn new(
        backends: Vec<Arc<dyn BackendDriver>>,
        view_epoch: u64,
        existence: ExistenceIndex,
        variable_groups: VariableGroupGraph,
        formulas: FormulaRegistry,
        coordinate_index: Option<Arc<dyn CoordinateIndex>>,
    ) -> Self {
        Self {
            backends,
            view_epoch,
            existence,
            variable_groups,
            formulas,
            coordinate_index,
        }
    }

    /// Exposes the formula registry for `mixer-api` to register derived
    /// variables at startup.
    pub fn formulas(&self) -> &FormulaRegistry {
        &self.formulas
    }

    /// Exposes the variable-group graph.
    pub fn variable_groups(&self) -> &VariableGroupGraph {
        &self.variable_groups
    }

    /// Exposes the existence index.
    pub fn existence(&self) -> &ExistenceIndex {
        &self.existence
    }

    fn ordered_backends(&self) -> Vec<Arc<dyn BackendDriver>> {
        let mut backends = self.backends.clone();
        backends.sort_by_key(|b| b.priority());
        backends
    }

    /// Traverses `request.path` from `request.nodes`, one hop at a time,
    /// merging each hop's property values across backends before expanding
    /// the next hop's frontier (§4.7, §5.1).
    #[instrument(skip(self), fields(state = ?DispatchState::Planning))]
    pub async fn node(&self, request: NodeRequest, ctx: &RequestContext) -> MixerResult<NodeResponse> {
        let path: TraversalPath = traversal::parse(&request.path)?;
        if path.hops.is_empty() {
            return Err(MixerError::InvalidArgument(
                "traversal path must have at least one hop".to_string(),
            ));
        }

        // frontier: for each original node, the set of nodes currently reached.
        let mut frontier: HashMap<Dcid, Vec<Dcid>> = request
            .nodes
            .iter()
            .cloned()
            .map(|n| (n.clone(), vec![n]))
            .collect();
        let mut diagnostics = Vec::new();
        let mut final_values: HashMap<Dcid, Vec<TypedValue>> = HashMap::new();

        for (hop_index, hop) in path.hops.iter().enumerate() {
            let is_last = hop_index + 1 == path.hops.len();
            let mut frontier_nodes: Vec<Dcid> = frontier.values().flatten().cloned().collect();
            frontier_nodes.sort();
            frontier_nodes.dedup();

            let (values_by_node, hop_diag) = self
                .fetch_property_values_merged(&frontier_nodes, &hop.property, hop.direction, usize::MAX, ctx)
                .await?;
            diagnostics.extend(hop_diag);

            if let Some(filter) = &hop.filter {
                let candidate_nodes: Vec<Dcid> = values_by_node
                    .values()
                    .flatten()
                    .filter_map(|v| match v {
                        TypedValue::Node(d) => Some(d.clone()),
                        TypedValue::Literal(_) => None,
                    })
                    .collect();
                let (filter_values, filter_diag) = self
                    .fetch_property_values_merged(&candidate_nodes, &filter.property, Direction::Out, usize::MAX, ctx)
                    .await?;
                diagnostics.extend(filter_diag);

                let passes: std::collections::HashSet<Dcid> = filter_values
                    .into_iter()
                    .filter(|(_, values)| values.iter().any(|v| v.dedup_key() == filter.value))
                    .map(|(node, _)| node)
                    .collect();

                let mut new_frontier: HashMap<Dcid, Vec<Dcid>> = HashMap::new();
                for (origin, currents) in &frontier {
                    let mut next = Vec::new();
                    for current in currents {
                        if let Some(values) = values_by_node.get(current) {
                            for v in values {
                                if let TypedValue::Node(d) = v {
                                    if passes.contains(d) {
                                        next.push(d.clone());
                                        if is_last {
                                            final_values
                                                .entry(origin.clone())
                                                .or_default()
                                                .push(v.clone());
                                        }
                                    }
                                }
                            }
                        }
                    }
                    new_frontier.insert(origin.clone(), next);
                }
                frontier = new_frontier;
            } else {
                let mut new_frontier: HashMap<Dcid, Vec<Dcid>> = HashMap::new();
                for (origin, currents) in &frontier {
                    let mut next = Vec::new();
                    for current in currents {
                        if let Some(values) = values_by_node.get(current) {
                            for v in values {
                                if is_last {
                                    final_values.entry(origin.clone()).or_default().push(v.clone());
                                }
                                if let TypedValue::Node(d) = v {
                                    next.push(d.clone());
                                }
                            }
                        }
                    }
                    new_frontier.insert(origin.clone(), next);
                }
                frontier = new_frontier;
            }
        }

        for values in final_values.values_mut() {
            let deduped = merge_union_dedup(vec![std::mem::take(values)]);
            *values = deduped;
        }

        let (page, next_cursor) = self.paginate_node_response(final_values, &request)?;

        Ok(NodeResponse {
            values: page,
            next_cursor,
            diagnostics: diagnostics.into(),
        })
    }

    async fn fetch_property_values_merged(
        &self,
        nodes: &[Dcid],
        property: &str,
        direction: Direction,
        limit: usize,
        ctx: &RequestContext,
    ) -> MixerResult<(HashMap<Dcid, Vec<TypedValue>>, Vec<Diagnostic>)> {
        if nodes.is_empty() {
            return Ok((HashMap::new(), Vec::new()));
        }
        let ordered = self.ordered_backends();
        let jobs: Vec<FanOutJob<HashMap<Dcid, Vec<TypedValue>>>> = ordered
            .iter()
            .map(|backend| {
                let backend = Arc::clone(backend);
                let nodes = nodes.to_vec();
                let property = property.to_string();
                let ctx = ctx.clone();
                FanOutJob::new(backend.name().to_string(), async move {
                    backend
                        .fetch_property_values(&nodes, &property, direction, limit, &ctx)
                        .await
                })
            })
            .collect();

        let result = FanOutExecutor::new().run(jobs, ctx).await?;

        let mut per_node_lists: HashMap<Dcid, Vec<Vec<TypedValue>>> = HashMap::new();
        for outcome in result.outcomes {
            if let JobOutcome::Ok(mapping) = outcome {
                for (node, values) in mapping {
                    per_node_lists.entry(node).or_default().push(values);
                }
            }
        }

        let merged = per_node_lists
            .into_iter()
            .map(|(node, lists)| (node, merge_union_dedup(lists)))
            .collect();

        Ok((merged, result.diagnostics))
    }

    /// Flattens `values` into a single globally ordered `(origin, value)`
    /// sequence (origins sorted ascending, each origin's own values kept in
    /// merge order) and slices out one page, resuming from the offset
    /// embedded in `request.cursor` if present (§4.4, §6.1).
    fn paginate_node_response(
        &self,
        values: HashMap<Dcid, Vec<TypedValue>>,
        request: &NodeRequest,
    ) -> MixerResult<(HashMap<Dcid, Vec<TypedValue>>, Option<String>)> {
        let offset = match &request.cursor {
            Some(cursor) => Cursor::decode(cursor, self.view_epoch)?.offset_for("node-traversal"),
            None => 0,
        };

        let mut keys: Vec<Dcid> = values.keys().cloned().collect();
        keys.sort();
        let flattened: Vec<(Dcid, TypedValue)> = keys
            .into_iter()
            .flat_map(|key| {
                let key_values = values[&key].clone();
                key_values.into_iter().map(move |v| (key.clone(), v))
            })
            .collect();

        let total = flattened.len();
        let end = (offset + request.page_size).min(total);
        let mut page: HashMap<Dcid, Vec<TypedValue>> = HashMap::new();
        if offset < total {
            for (origin, value) in &flattened[offset..end] {
                page.entry(origin.clone()).or_default().push(value.clone());
            }
        }

        let next_cursor = if end < total {
            Some(
                Cursor {
                    view_epoch: self.view_epoch,
                    offsets: vec![PerBackendOffset {
                        backend_name: "node-traversal".to_string(),
                        offset: end,
                    }],
                    request_fingerprint: 0,
                }
                .encode(),
            )
        } else {
            None
        };

        Ok((page, next_cursor))
    }

    /// Plans and fetches observations, applying pagination last (§4.5, §6).
    #[instrument(skip(self), fields(state = ?DispatchState::Planning))]
    pub async fn observation(
        &self,
        request: ObservationRequest,
        ctx: &RequestContext,
    ) -> MixerResult<ObservationResponse> {
        if let Some(cursor) = &request.cursor {
            Cursor::decode(cursor, self.view_epoch)?;
        }

        let query = ObservationQuery {
            variables: request.variables.clone(),
            entities: EntitySelector::Explicit(request.entities.clone()),
            date: request.date.clone(),
            facet_filter: request.facet_filter.clone(),
        };

        let bundle = planner::plan_and_fetch(&query, &self.backends, ctx).await?;

        let mut observations = bundle.observations;
        let derived = self.fill_formula_holes(&request, &observations, ctx).await?;
        observations.extend(derived);
        observations.sort_by(|a, b| {
            (a.variable.as_str(), a.entity.as_str(), a.facet.id().0, a.date.as_str()).cmp(&(
                b.variable.as_str(),
                b.entity.as_str(),
                b.facet.id().0,
                b.date.as_str(),
            ))
        });

        let page: Page<Observation> = pagination::paginate(observations, request.page_size, self.view_epoch, 0, vec![]);

        Ok(ObservationResponse {
            observations: page.items,
            next_cursor: page.next_cursor,
            diagnostics: Diagnostics::default(),
        })
    }

    /// Evaluates registered formulas for requested variables that came back
    /// empty from the direct fetch, per entity (§4.6).
    ///
    /// A variable with direct data for an entity is never touched here even
    /// if it also has a registered formula — direct-fetched data always
    /// wins, formulas only fill holes.
    async fn fill_formula_holes(
        &self,
        request: &ObservationRequest,
        direct: &[Observation],
        ctx: &RequestContext,
    ) -> MixerResult<Vec<Observation>> {
        let mut derived = Vec::new();

        for variable in &request.variables {
            let Some(def) = self.formulas.get(variable.as_str()) else {
                continue;
            };

            let needs_fill: Vec<Dcid> = request
                .entities
                .iter()
                .filter(|entity| {
                    !direct
                        .iter()
                        .any(|obs| obs.variable == *variable && obs.entity == **entity)
                })
                .cloned()
                .collect();
            if needs_fill.is_empty() {
                continue;
            }

            let referenced: Vec<Dcid> = def
                .expr
                .referenced_variables()
                .into_iter()
                .map(Dcid::new)
                .collect();
            if referenced.is_empty() {
                continue;
            }

            let input_query = ObservationQuery {
                variables: referenced,
                entities: EntitySelector::Explicit(needs_fill),
                date: DateSelector::All,
                facet_filter: FacetFilter::default(),
            };
            let input_bundle = planner::plan_and_fetch(&input_query, &self.backends, ctx).await?;

            let mut inputs: BTreeMap<String, SeriesInput> = BTreeMap::new();
            for obs in input_bundle.observations {
                inputs
                    .entry(obs.variable.as_str().to_string())
                    .or_default()
                    .entry(obs.entity.clone())
                    .or_default()
                    .push(obs);
            }

            let evaluated = formula::evaluate(&self.formulas, variable.as_str(), &inputs)?;

            let selected = planner::apply_date_selector(evaluated, &request.date)?;
            derived.extend(
                selected
                    .into_iter()
                    .filter(|obs| request.facet_filter.matches(&obs.facet)),
            );
        }

        Ok(derived)
    }

    /// Dispatches to the resolution mode named by `request` (§4.8).
    #[instrument(skip(self), fields(state = ?DispatchState::Planning))]
    pub async fn resolve(&self, request: ResolveRequest, ctx: &RequestContext) -> MixerResult<ResolveResponse> {
        match request {
            ResolveRequest::ByProperty {
                inputs,
                in_prop,
                out_prop,
            } => {
                let result =
                    resolver::resolve_by_property(&inputs, &in_prop, &out_prop, &self.backends, ctx).await?;
                Ok(ResolveResponse::ByProperty(result))
            }
            ResolveRequest::ByCoordinate {
                point,
                radius_km,
                limit,
            } => {
                let index = self
                    .coordinate_index
                    .as_ref()
                    .ok_or_else(|| MixerError::InvalidArgument("no coordinate index configured".to_string()))?;
                let result = resolver::resolve_by_coordinate(point, radius_km, limit, index.as_ref(), ctx).await?;
                Ok(ResolveResponse::Ranked(result))
            }
            ResolveRequest::ByDescription { query, types, limit } => {
                let result =
                    resolver::resolve_by_description(&query, &types, limit, &self.backends, ctx).await?;
                Ok(ResolveResponse::Ranked(result))
            }
        }
    }

    /// Free-text node search, a thin wrapper over description resolution
    /// exposed as its own RPC because callers expect a distinct contract
    /// from `Resolve` (no `in_prop`/`out_prop` concept applies here).
    #[instrument(skip(self), fields(state = ?DispatchState::Planning))]
    pub async fn node_search(
        &self,
        request: NodeSearchRequest,
        ctx: &RequestContext,
    ) -> MixerResult<NodeSearchResponse> {
        let candidates =
            resolver::resolve_by_description(&request.query, &request.types, request.limit, &self.backends, ctx)
                .await?;
        Ok(NodeSearchResponse { candidates })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SearchHit;
    use crate::model::{Facet, IsoDate};
    use crate::refdriver::InMemoryDriver;
    use std::time::{Duration, Instant};

    fn ctx() -> RequestContext {
        RequestContext::new("t", Instant::now() + Duration::from_secs(5))
    }

    fn facet() -> Facet {
        Facet {
            measurement_method: Some("census".into()),
            observation_period: Some("P1Y".into()),
            unit: None,
            scaling_factor: None,
            import_name: Some("census_import".into()),
            provenance_url: None,
        }
    }

    fn dispatcher(backends: Vec<Arc<dyn BackendDriver>>) -> Dispatcher {
        Dispatcher::new(
            backends,
            1,
            ExistenceIndex::new(),
            VariableGroupGraph::default(),
            FormulaRegistry::new(),
            None,
        )
    }

    #[tokio::test]
    async fn single_hop_traversal_groups_by_origin() {
        let driver = InMemoryDriver::new("b1", 0);
        driver.insert_triple(crate::model::Triple {
            subject: Dcid::new("country/USA"),
            property: "name".to_string(),
            object: TypedValue::Literal("United States".to_string()),
            direction: Direction::Out,
            provenance: None,
        });
        let backend: Arc<dyn BackendDriver> = Arc::new(driver);
        let dispatcher = dispatcher(vec![backend]);

        let request = NodeRequest {
            nodes: vec![Dcid::new("country/USA")],
            path: "->name".to_string(),
            cursor: None,
            page_size: 100,
        };
        let response = dispatcher.node(request, &ctx()).await.unwrap();
        assert_eq!(
            response.values[&Dcid::new("country/USA")],
            vec![TypedValue::Literal("United States".to_string())]
        );
    }

    #[tokio::test]
    async fn observation_request_returns_sorted_page() {
        let driver = InMemoryDriver::new("b1", 0);
        driver.insert_observation(Observation {
            variable: Dcid::new("Count_Person"),
            entity: Dcid::new("country/USA"),
            date: IsoDate::new("2020"),
            value: 10.0,
            facet: facet(),
        });
        let backend: Arc<dyn BackendDriver> = Arc::new(driver);
        let dispatcher = dispatcher(vec![backend]);

        let request = ObservationRequest {
            variables: vec![Dcid::new("Count_Person")],
            entities: vec![Dcid::new("country/USA")],
            date: DateSelector::All,
            facet_filter: FacetFilter::default(),
            cursor: None,
            page_size: 10,
        };
        let response = dispatcher.observation(request, &ctx()).await.unwrap();
        assert_eq!(response.observations.len(), 1);
        assert!(response.next_cursor.is_none());
    }

    #[tokio::test]
    async fn node_search_ranks_by_score() {
        let driver = InMemoryDriver::new("b1", 0);
        driver.insert_search_hit(SearchHit {
            dcid: Dcid::new("country/USA"),
            score: 0.8,
        });
        let backend: Arc<dyn BackendDriver> = Arc::new(driver);
        let dispatcher = dispatcher(vec![backend]);

        let request = NodeSearchRequest {
            query: "United States".to_string(),
            types: vec![],
            limit: 5,
        };
        let response = dispatcher.node_search(request, &ctx()).await.unwrap();
        assert_eq!(response.candidates.len(), 1);
        assert_eq!(response.candidates[0].dcid, Dcid::new("country/USA"));
    }
}
