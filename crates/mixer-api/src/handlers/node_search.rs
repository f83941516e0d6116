//! Free-text node search handler.
//!
//! `POST /v1/node-search` — a thin wrapper over description resolution,
//! exposed as its own RPC since callers expect a contract with no
//! `in_prop`/`out_prop` concept (§4.8.3).

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mixer_core::dispatcher::NodeSearchRequest;
use mixer_core::model::Dcid;

use crate::error::ApiResult;
use crate::state::AppState;

const DEFAULT_SEARCH_LIMIT: usize = 20;

/// The JSON request body for a node search.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeSearchRequestBody {
    /// The query text.
    pub query: String,
    /// Restricts matches to these `typeOf` values, if non-empty.
    #[serde(default)]
    pub types: Vec<String>,
    /// Maximum candidates to return. Zero or absent uses the server default.
    #[serde(default)]
    pub limit: usize,
}

/// A single ranked search hit.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateBody {
    /// The matched entity.
    pub dcid: Dcid,
    /// A backend-assigned confidence/relevance score (higher is better).
    pub score: f64,
}

/// The JSON response body for a node search.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSearchResponseBody {
    /// Ranked candidates.
    pub candidates: Vec<CandidateBody>,
}

/// Handler for `POST /v1/node-search`.
pub async fn node_search_handler(
    State(state): State<AppState>,
    Json(body): Json<NodeSearchRequestBody>,
) -> ApiResult<Json<NodeSearchResponseBody>> {
    let ctx = state.new_request_context(Uuid::new_v4().to_string());
    let limit = if body.limit == 0 { DEFAULT_SEARCH_LIMIT } else { body.limit };

    let request = NodeSearchRequest {
        query: body.query,
        types: body.types,
        limit,
    };

    let response = state.dispatcher().node_search(request, &ctx).await?;

    Ok(Json(NodeSearchResponseBody {
        candidates: response
            .candidates
            .into_iter()
            .map(|c| CandidateBody {
                dcid: c.dcid,
                score: c.score,
            })
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_limit_parses_to_zero_before_defaulting() {
        let body: NodeSearchRequestBody =
            serde_json::from_str(r#"{"query": "United States"}"#).unwrap();
        assert_eq!(body.limit, 0);
    }
}
