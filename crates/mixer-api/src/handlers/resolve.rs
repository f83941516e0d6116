//! Entity resolution handler.
//!
//! `POST /v1/resolve` — resolves external identifiers, coordinates, or
//! free-text descriptions to internal `Dcid`s (§4.8).

use std::collections::HashMap;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mixer_core::dispatcher::{ResolveRequest, ResolveResponse};
use mixer_core::model::Dcid;
use mixer_core::resolver::Coordinate;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// The JSON request body for a resolution request, one variant per mode.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ResolveRequestBody {
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
        /// Latitude in degrees.
        latitude: f64,
        /// Longitude in degrees.
        longitude: f64,
        /// Search radius in kilometers.
        radius_km: f64,
        /// Maximum candidates to return.
        #[serde(default)]
        limit: usize,
    },
    /// Resolve a free-text description.
    ByDescription {
        /// The query text.
        query: String,
        /// Restricts matches to these `typeOf` values, if non-empty.
        #[serde(default)]
        types: Vec<String>,
        /// Maximum candidates to return.
        #[serde(default)]
        limit: usize,
    },
}

const DEFAULT_RESOLVE_LIMIT: usize = 20;

impl From<ResolveRequestBody> for ResolveRequest {
    fn from(body: ResolveRequestBody) -> Self {
        match body {
            ResolveRequestBody::ByProperty {
                inputs,
                in_prop,
                out_prop,
            } => ResolveRequest::ByProperty {
                inputs,
                in_prop,
                out_prop,
            },
            ResolveRequestBody::ByCoordinate {
                latitude,
                longitude,
                radius_km,
                limit,
            } => ResolveRequest::ByCoordinate {
                point: Coordinate { latitude, longitude },
                radius_km,
                limit: if limit == 0 { DEFAULT_RESOLVE_LIMIT } else { limit },
            },
            ResolveRequestBody::ByDescription { query, types, limit } => ResolveRequest::ByDescription {
                query,
                types,
                limit: if limit == 0 { DEFAULT_RESOLVE_LIMIT } else { limit },
            },
        }
    }
}

/// A single ranked candidate, as returned to the HTTP caller.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionCandidateBody {
    /// The resolved entity.
    pub dcid: Dcid,
    /// A backend-assigned confidence/relevance score (higher is better).
    pub score: f64,
}

/// The JSON response body for a resolution request, shaped to match the
/// request's mode.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResolveResponseBody {
    /// One entry per input, in the order it was requested.
    ByProperty {
        /// Resolved `Dcid`s keyed by their input identifier.
        resolutions: HashMap<String, Vec<Dcid>>,
    },
    /// Ranked candidates.
    Ranked {
        /// Candidates in descending score order.
        candidates: Vec<ResolutionCandidateBody>,
    },
}

impl From<ResolveResponse> for ResolveResponseBody {
    fn from(response: ResolveResponse) -> Self {
        match response {
            ResolveResponse::ByProperty(resolutions) => ResolveResponseBody::ByProperty { resolutions },
            ResolveResponse::Ranked(candidates) => ResolveResponseBody::Ranked {
                candidates: candidates
                    .into_iter()
                    .map(|c| ResolutionCandidateBody {
                        dcid: c.dcid,
                        score: c.score,
                    })
                    .collect(),
            },
        }
    }
}

/// Handler for `POST /v1/resolve`.
pub async fn resolve_handler(
    State(state): State<AppState>,
    Json(body): Json<ResolveRequestBody>,
) -> ApiResult<Json<ResolveResponseBody>> {
    let ctx = state.new_request_context(Uuid::new_v4().to_string());
    let request: ResolveRequest = body.into();
    let response = state
        .dispatcher()
        .resolve(request, &ctx)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(response.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_property_body_parses() {
        let body: ResolveRequestBody = serde_json::from_str(
            r#"{"mode": "by_property", "inputs": ["Q30"], "in_prop": "wikidataId", "out_prop": "dcid"}"#,
        )
        .unwrap();
        assert!(matches!(body, ResolveRequestBody::ByProperty { .. }));
    }

    #[test]
    fn by_coordinate_defaults_limit() {
        let body: ResolveRequestBody = serde_json::from_str(
            r#"{"mode": "by_coordinate", "latitude": 1.0, "longitude": 2.0, "radius_km": 5.0}"#,
        )
        .unwrap();
        let request: ResolveRequest = body.into();
        match request {
            ResolveRequest::ByCoordinate { limit, .. } => assert_eq!(limit, DEFAULT_RESOLVE_LIMIT),
            _ => panic!("expected ByCoordinate"),
        }
    }
}
