//! The formula expression tree.

use std::collections::BTreeMap;

use crate::model::{Dcid, FacetId, IsoDate, Observation};

use super::SeriesInput;

/// One facet chosen per referenced variable name for a single evaluation
/// pass, so an expression whose operands come from differently-sourced
/// facets (e.g. a numerator from `census.gov`, a denominator from `un.org`)
/// is evaluated once per compatible pairing rather than picking an
/// arbitrary facet for each operand (§4.6).
pub type FacetCombo = BTreeMap<String, FacetId>;

/// Which facet field a `var{qualifier: value}` pair constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualifierKey {
    /// Constrains `Facet::measurement_method`.
    Mm,
    /// Constrains `Facet::observation_period`.
    Op,
    /// Constrains `Facet::unit`.
    Unit,
    /// Constrains `Facet::scaling_factor`.
    Sf,
}

impl QualifierKey {
    /// Parses a qualifier keyword; returns `None` for anything else.
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "mm" => Some(Self::Mm),
            "op" => Some(Self::Op),
            "unit" => Some(Self::Unit),
            "sf" => Some(Self::Sf),
            _ => None,
        }
    }

    fn matches(&self, facet: &crate::model::Facet, expected: &str) -> bool {
        let actual = match self {
            QualifierKey::Mm => &facet.measurement_method,
            QualifierKey::Op => &facet.observation_period,
            QualifierKey::Unit => &facet.unit,
            QualifierKey::Sf => &facet.scaling_factor,
        };
        actual
            .as_deref()
            .map(|v| v.eq_ignore_ascii_case(expected))
            .unwrap_or(false)
    }
}

/// A binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division; division by zero is handled by the evaluator, not here.
    Div,
}

/// A parsed formula expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal constant.
    Num(f64),
    /// A reference to another variable, optionally qualified by facet
    /// fields, e.g. `Count_Person{mm: CensusACS5yrSurvey}`.
    Var {
        /// The referenced variable's name.
        name: String,
        /// Facet-field constraints, all of which must match.
        qualifiers: Vec<(QualifierKey, String)>,
    },
    /// A binary operation over two subexpressions.
    BinOp(BinOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Returns every distinct variable name this expression references,
    /// in first-occurrence order.
    pub fn referenced_variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut Vec<String>) {
        match self {
            Expr::Num(_) => {}
            Expr::Var { name, .. } => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Expr::BinOp(_, lhs, rhs) => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
        }
    }

    /// Returns the qualifiers attached to the first `Var` node referencing
    /// `target`, if any. A variable is assumed to carry one qualifier set
    /// per formula — formulas referencing the same variable twice with
    /// different qualifiers are not supported.
    pub(super) fn qualifiers_for(&self, target: &str) -> Option<&[(QualifierKey, String)]> {
        match self {
            Expr::Num(_) => None,
            Expr::Var { name, qualifiers } => (name == target).then(|| qualifiers.as_slice()),
            Expr::BinOp(_, lhs, rhs) => lhs
                .qualifiers_for(target)
                .or_else(|| rhs.qualifiers_for(target)),
        }
    }

    /// Evaluates this expression for one `(entity, date)` pair and facet
    /// combination, given already-fetched series for every referenced
    /// variable.
    ///
    /// Returns `None` if any operand lacks a value at its chosen facet for
    /// this `(entity, date)`, or if a division's divisor is exactly zero —
    /// either case drops the date from the derived series rather than
    /// propagating an error.
    pub fn evaluate_at(
        &self,
        inputs: &BTreeMap<String, SeriesInput>,
        entity: &Dcid,
        date: &IsoDate,
        combo: &FacetCombo,
    ) -> Option<f64> {
        match self {
            Expr::Num(n) => Some(*n),
            Expr::Var { name, qualifiers } => {
                let series = inputs.get(name)?;
                let observations: &Vec<Observation> = series.get(entity)?;
                let wanted_facet = combo.get(name)?;
                observations
                    .iter()
                    .find(|obs| {
                        &obs.date == date
                            && obs.facet.id() == *wanted_facet
                            && qualifiers
                                .iter()
                                .all(|(key, expected)| key.matches(&obs.facet, expected))
                    })
                    .map(|obs| obs.value)
            }
            Expr::BinOp(op, lhs, rhs) => {
                let lv = lhs.evaluate_at(inputs, entity, date, combo)?;
                let rv = rhs.evaluate_at(inputs, entity, date, combo)?;
                match op {
                    BinOp::Add => Some(lv + rv),
                    BinOp::Sub => Some(lv - rv),
                    BinOp::Mul => Some(lv * rv),
                    BinOp::Div => {
                        if rv == 0.0 {
                            None
                        } else {
                            Some(lv / rv)
                        }
                    }
                }
            }
        }
    }
}
