//! Node traversal handler.
//!
//! `POST /v1/node` — traverses a path expression from a set of starting
//! nodes (§4.7).

use std::collections::HashMap;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mixer_core::dispatcher::NodeRequest;
use mixer_core::model::{Dcid, TypedValue};

use crate::error::ApiResult;
use crate::handlers::diagnostics::DiagnosticsBody;
use crate::state::AppState;

/// The JSON request body for a node traversal.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeRequestBody {
    /// The starting nodes.
    pub nodes: Vec<Dcid>,
    /// A traversal path expression, e.g. `->containedInPlace`.
    pub path: String,
    /// Caller-supplied pagination cursor, if continuing a prior request.
    #[serde(default)]
    pub cursor: Option<String>,
    /// Maximum number of `(origin, value)` pairs to return. Zero or absent
    /// falls back to the server's default page size.
    #[serde(default)]
    pub page_size: usize,
}

/// The JSON response body for a node traversal.
#[derive(Debug, Clone, Serialize)]
pub struct NodeResponseBody {
    /// Values reached per origin node.
    pub values: HashMap<Dcid, Vec<TypedValue>>,
    /// Present iff more results may exist beyond this page.
    pub next_cursor: Option<String>,
    /// Per-backend diagnostics.
    pub diagnostics: DiagnosticsBody,
}

/// Handler for `POST /v1/node`.
pub async fn node_handler(
    State(state): State<AppState>,
    Json(body): Json<NodeRequestBody>,
) -> ApiResult<Json<NodeResponseBody>> {
    let page_size = state.clamp_page_size(body.page_size);
    let ctx = state.new_request_context(Uuid::new_v4().to_string());

    let request = NodeRequest {
        nodes: body.nodes,
        path: body.path,
        cursor: body.cursor,
        page_size,
    };

    let response = state.dispatcher().node(request, &ctx).await?;

    Ok(Json(NodeResponseBody {
        values: response.values,
        next_cursor: response.next_cursor,
        diagnostics: response.diagnostics.into(),
    }))
}
