//! End-to-end tests driving the Mixer HTTP facade over an in-memory backend.

use std::sync::Arc;

use axum_test::TestServer;
use serde_json::json;

use mixer_api::create_app;
use mixer_core::backend::{BackendDriver, SearchHit};
use mixer_core::dispatcher::Dispatcher;
use mixer_core::existence::ExistenceIndex;
use mixer_core::formula::FormulaRegistry;
use mixer_core::model::{Dcid, Direction, Facet, IsoDate, Observation, Triple, TypedValue, VariableGroupGraph};
use mixer_core::refdriver::InMemoryDriver;

fn facet() -> Facet {
    Facet {
        measurement_method: Some("CensusACS5yrSurvey".to_string()),
        observation_period: Some("P1Y".to_string()),
        unit: None,
        scaling_factor: None,
        import_name: Some("census".to_string()),
        provenance_url: None,
    }
}

fn server() -> TestServer {
    let driver = InMemoryDriver::new("primary", 0);
    driver.insert_triple(Triple {
        subject: Dcid::new("country/USA"),
        property: "name".to_string(),
        object: TypedValue::Literal("United States".to_string()),
        direction: Direction::Out,
        provenance: None,
    });
    driver.insert_observation(Observation {
        variable: Dcid::new("Count_Person"),
        entity: Dcid::new("country/USA"),
        date: IsoDate::new("2020"),
        value: 331_000_000.0,
        facet: facet(),
    });
    driver.insert_search_hit(SearchHit {
        dcid: Dcid::new("country/USA"),
        score: 0.95,
    });

    let backend: Arc<dyn BackendDriver> = Arc::new(driver);
    let dispatcher = Arc::new(Dispatcher::new(
        vec![backend],
        0,
        ExistenceIndex::new(),
        VariableGroupGraph::default(),
        FormulaRegistry::new(),
        None,
    ));

    TestServer::new(create_app(dispatcher)).unwrap()
}

#[tokio::test]
async fn health_endpoint_reports_healthy() {
    let server = server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<serde_json::Value>()["status"], "healthy");
}

#[tokio::test]
async fn node_traversal_returns_name() {
    let server = server();
    let response = server
        .post("/v1/node")
        .json(&json!({ "nodes": ["country/USA"], "path": "->name" }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["values"]["country/USA"][0], "United States");
}

#[tokio::test]
async fn observation_query_returns_the_one_fact() {
    let server = server();
    let response = server
        .post("/v1/observation")
        .json(&json!({
            "variables": ["Count_Person"],
            "entities": ["country/USA"],
        }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["observations"].as_array().unwrap().len(), 1);
    assert_eq!(body["observations"][0]["value"], 331_000_000.0);
}

#[tokio::test]
async fn node_search_ranks_the_inserted_hit() {
    let server = server();
    let response = server
        .post("/v1/node-search")
        .json(&json!({ "query": "United States" }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["candidates"][0]["dcid"], "country/USA");
}

#[tokio::test]
async fn malformed_traversal_path_is_a_bad_request() {
    let server = server();
    let response = server
        .post("/v1/node")
        .json(&json!({ "nodes": ["country/USA"], "path": "not-a-hop" }))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn resolve_by_coordinate_without_index_is_a_bad_request() {
    let server = server();
    let response = server
        .post("/v1/resolve")
        .json(&json!({
            "mode": "by_coordinate",
            "latitude": 37.0,
            "longitude": -122.0,
            "radius_km": 10.0,
        }))
        .await;
    response.assert_status_bad_request();
}
