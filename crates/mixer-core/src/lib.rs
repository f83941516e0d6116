//! Federation and merge core for a knowledge-graph query gateway.
//!
//! This crate fans a single logical request out across a priority-ordered
//! set of backend data sources, merges their answers deterministically, and
//! paginates the result — without ever speaking a backend's wire protocol
//! itself (that's `BackendDriver`'s job, implemented outside this crate).
//!
//! # Architecture
//!
//! - [`model`] — the shared data model: nodes, triples, facets, observations,
//!   variables, and the import-group roster.
//! - [`backend`] — the [`backend::BackendDriver`] trait every data source
//!   implements, plus the per-request [`backend::RequestContext`].
//! - [`fanout`] — bounded-concurrency parallel execution across backends.
//! - [`merge`] — deterministic, priority-aware result merging.
//! - [`pagination`] — opaque, roster-epoch-aware cursor encoding.
//! - [`planner`] — the observation query pipeline (fan-out, merge, date
//!   selection, facet filtering).
//! - [`formula`] — the derived-variable arithmetic grammar and evaluator.
//! - [`traversal`] — the path-expression grammar for node traversal.
//! - [`resolver`] — entity resolution by property, coordinate, or description.
//! - [`existence`] — a precomputed index answering "does this data exist"
//!   without a full fetch.
//! - [`dispatcher`] — the single entry point tying every module together.
//! - [`config`] — the live, reloadable import-group roster.
//! - [`refdriver`] — an in-memory reference `BackendDriver` for tests.
//!
//! # Quick Start
//!
//! ```
//! use mixer_core::dispatcher::{Dispatcher, NodeSearchRequest};
//! use mixer_core::backend::{BackendDriver, RequestContext, SearchHit};
//! use mixer_core::existence::ExistenceIndex;
//! use mixer_core::formula::FormulaRegistry;
//! use mixer_core::model::{Dcid, VariableGroupGraph};
//! use mixer_core::refdriver::InMemoryDriver;
//! use std::sync::Arc;
//! use std::time::{Duration, Instant};
//!
//! # tokio_test::block_on(async {
//! let driver = InMemoryDriver::new("ref", 0);
//! driver.insert_search_hit(SearchHit { dcid: Dcid::new("country/USA"), score: 1.0 });
//! let backend: Arc<dyn BackendDriver> = Arc::new(driver);
//!
//! let dispatcher = Dispatcher::new(
//!     vec![backend],
//!     0,
//!     ExistenceIndex::new(),
//!     VariableGroupGraph::default(),
//!     FormulaRegistry::new(),
//!     None,
//! );
//!
//! let ctx = RequestContext::new("req-1", Instant::now() + Duration::from_secs(5));
//! let response = dispatcher
//!     .node_search(
//!         NodeSearchRequest { query: "United States".to_string(), types: vec![], limit: 5 },
//!         &ctx,
//!     )
//!     .await
//!     .unwrap();
//! assert_eq!(response.candidates.len(), 1);
//! # });
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backend;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod existence;
pub mod fanout;
pub mod formula;
pub mod merge;
pub mod model;
pub mod pagination;
pub mod planner;
pub mod refdriver;
pub mod resolver;
pub mod traversal;

pub use error::{MixerError, MixerResult};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
