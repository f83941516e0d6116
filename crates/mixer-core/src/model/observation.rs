//! Observations and observation series.

use serde::{Deserialize, Serialize};

use super::dcid::Dcid;
use super::facet::{Facet, FacetId};

/// An ISO date, which may be a year, year-month, or year-month-day.
///
/// Lexicographic string comparison is authoritative for ordering (§6):
/// `"2020" < "2020-01" < "2020-01-02" < "2021"` holds under plain string
/// comparison because ISO dates are left-padded and share a common prefix
/// structure.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IsoDate(pub String);

impl IsoDate {
    /// Wraps a raw date string without validating its shape.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the date as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Selects which observations to keep for a `(variable, entity)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateSelector {
    /// Keep the full series.
    All,
    /// Keep only the observation with the maximum date, after filtering.
    Latest,
    /// Keep only the observation at this exact date.
    Exact(IsoDate),
}

/// One `(variable, entity, date, value, facet)` fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// The statistical variable this observation measures.
    pub variable: Dcid,
    /// The entity this observation is about.
    pub entity: Dcid,
    /// The date of this observation.
    pub date: IsoDate,
    /// The observed value.
    pub value: f64,
    /// The facet identifying this observation's provenance.
    pub facet: Facet,
}

/// The ordered sequence of observations for one `(variable, entity, facet)`.
///
/// Invariant: `dates` strictly increase; callers that build a series from
/// backend data must enforce this (a duplicate date within one backend's
/// series is an `Internal` error per §7).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservationSeries {
    /// Points in strictly increasing date order.
    pub points: Vec<(IsoDate, f64)>,
}

impl ObservationSeries {
    /// Builds a series from unordered points, sorting by date.
    ///
    /// Returns an error if two points share the same date, which would
    /// violate the invariant that within one `(variable, entity, facet)`
    /// each date appears at most once (§3).
    pub fn from_points(mut points: Vec<(IsoDate, f64)>) -> Result<Self, DuplicateDateError> {
        points.sort_by(|a, b| a.0.cmp(&b.0));
        for pair in points.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(DuplicateDateError {
                    date: pair[0].0.clone(),
                });
            }
        }
        Ok(Self { points })
    }

    /// Returns the point with the maximum (lexicographically last) date.
    pub fn latest(&self) -> Option<&(IsoDate, f64)> {
        self.points.last()
    }

    /// Returns the value at an exact date, if present.
    pub fn at(&self, date: &IsoDate) -> Option<f64> {
        self.points
            .iter()
            .find(|(d, _)| d == date)
            .map(|(_, v)| *v)
    }

    /// Returns true if this series has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A single backend's (variable, entity) duplicated the same date.
#[derive(Debug, Clone, thiserror::Error)]
#[error("duplicate date {date:?} within one backend's observation series")]
pub struct DuplicateDateError {
    /// The date that appeared twice.
    pub date: IsoDate,
}

/// The raw result of `BackendDriver::fetch_observations`: every observation
/// the backend has for the requested variables/entities, unfiltered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservationBundle {
    /// Flat list of observations; grouping/filtering happens downstream.
    pub observations: Vec<Observation>,
}
