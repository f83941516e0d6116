//! Observation query handler.
//!
//! `POST /v1/observation` — plans and fetches statistical observations
//! across backends, applying date selection and facet filtering (§4.5).

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mixer_core::dispatcher::ObservationRequest;
use mixer_core::model::{Dcid, DateSelector, FacetFilter, Observation, IsoDate};

use crate::error::ApiResult;
use crate::handlers::diagnostics::DiagnosticsBody;
use crate::state::AppState;

/// The date selection mode requested, mirroring [`DateSelector`] in a
/// JSON-friendly shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSelectorBody {
    /// Keep the full series.
    All,
    /// Keep only the observation with the maximum date.
    Latest,
    /// Keep only the observation at this exact date.
    Exact {
        /// The requested date.
        date: String,
    },
}

impl From<DateSelectorBody> for DateSelector {
    fn from(body: DateSelectorBody) -> Self {
        match body {
            DateSelectorBody::All => DateSelector::All,
            DateSelectorBody::Latest => DateSelector::Latest,
            DateSelectorBody::Exact { date } => DateSelector::Exact(IsoDate::new(date)),
        }
    }
}

/// The JSON request body for an observation query.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservationRequestBody {
    /// The statistical variables requested.
    pub variables: Vec<Dcid>,
    /// The entities requested.
    pub entities: Vec<Dcid>,
    /// Which date(s) to keep.
    #[serde(default = "default_date_selector")]
    pub date: DateSelectorBody,
    /// Restricts which facets are kept.
    #[serde(default)]
    pub facet_filter: FacetFilter,
    /// Caller-supplied pagination cursor, if continuing a prior request.
    #[serde(default)]
    pub cursor: Option<String>,
    /// Maximum number of observations to return. Zero or absent falls back
    /// to the server's default page size.
    #[serde(default)]
    pub page_size: usize,
}

fn default_date_selector() -> DateSelectorBody {
    DateSelectorBody::All
}

/// The JSON response body for an observation query.
#[derive(Debug, Clone, Serialize)]
pub struct ObservationResponseBody {
    /// The observations in this page.
    pub observations: Vec<Observation>,
    /// Present iff more results may exist beyond this page.
    pub next_cursor: Option<String>,
    /// Per-backend diagnostics.
    pub diagnostics: DiagnosticsBody,
}

/// Handler for `POST /v1/observation`.
pub async fn observation_handler(
    State(state): State<AppState>,
    Json(body): Json<ObservationRequestBody>,
) -> ApiResult<Json<ObservationResponseBody>> {
    let page_size = state.clamp_page_size(body.page_size);
    let ctx = state.new_request_context(Uuid::new_v4().to_string());

    let request = ObservationRequest {
        variables: body.variables,
        entities: body.entities,
        date: body.date.into(),
        facet_filter: body.facet_filter,
        cursor: body.cursor,
        page_size,
    };

    let response = state.dispatcher().observation(request, &ctx).await?;

    Ok(Json(ObservationResponseBody {
        observations: response.observations,
        next_cursor: response.next_cursor,
        diagnostics: response.diagnostics.into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_date_defaults_to_all() {
        let body: ObservationRequestBody = serde_json::from_str(
            r#"{"variables": ["Count_Person"], "entities": ["country/USA"]}"#,
        )
        .unwrap();
        assert!(matches!(body.date, DateSelectorBody::All));
    }

    #[test]
    fn exact_date_selector_parses() {
        let body: ObservationRequestBody = serde_json::from_str(
            r#"{"variables": ["Count_Person"], "entities": ["country/USA"], "date": {"exact": {"date": "2020"}}}"#,
        )
        .unwrap();
        assert!(matches!(body.date, DateSelectorBody::Exact { .. }));
    }
}
