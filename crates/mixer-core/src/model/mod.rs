//! The Mixer data model (§3): entities, triples, facets, observations,
//! variables, and the import-group roster.

pub mod dcid;
pub mod facet;
pub mod import_group;
pub mod observation;
pub mod triple;
pub mod variable;

pub use dcid::{Dcid, Direction, Entity, TypedValue};
pub use facet::{Facet, FacetFilter, FacetId};
pub use import_group::{BackendEntry, ImportGroup};
pub use observation::{DateSelector, DuplicateDateError, IsoDate, Observation, ObservationBundle, ObservationSeries};
pub use triple::Triple;
pub use variable::{Variable, VariableGroupGraph};
