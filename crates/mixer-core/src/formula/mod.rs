//! Formula Evaluator (C6).
//!
//! Derived statistical variables are defined by a small arithmetic grammar
//! over other variables, e.g. `Count_Person_Female / Count_Person` or
//! `(A + B) * 100`. This module parses that grammar, registers formulas by
//! name, detects cycles, and evaluates a formula date-by-date against a set
//! of already-fetched observation series.

mod ast;
mod lexer;
mod parser;

pub use ast::{Expr, FacetCombo, QualifierKey};
pub use parser::parse;

use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

use crate::model::{Dcid, Facet, FacetId, IsoDate, Observation};

fn facets_compatible(a: &Facet, b: &Facet) -> bool {
    fn field_ok(a: &Option<String>, b: &Option<String>) -> bool {
        match (a, b) {
            (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
            _ => true,
        }
    }
    field_ok(&a.measurement_method, &b.measurement_method)
        && field_ok(&a.observation_period, &b.observation_period)
        && field_ok(&a.unit, &b.unit)
        && field_ok(&a.scaling_factor, &b.scaling_factor)
}

/// The maximum allowed depth of formula-references-formula nesting (§4.6).
pub const MAX_FORMULA_DEPTH: usize = 4;

/// Errors raised while parsing or evaluating a formula.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormulaError {
    /// The formula text is not valid grammar.
    #[error("malformed formula at column {column}: {message}")]
    Syntax {
        /// Column (1-based) where parsing failed.
        column: usize,
        /// Human-readable description.
        message: String,
    },
    /// A formula's name was registered twice.
    #[error("formula '{0}' is already registered")]
    DuplicateName(String),
    /// A formula references itself, directly or transitively.
    #[error("formula '{0}' participates in a reference cycle")]
    Cycle(String),
    /// Formula nesting exceeded [`MAX_FORMULA_DEPTH`].
    #[error("formula '{0}' exceeds the maximum nesting depth")]
    TooDeep(String),
    /// A formula referenced a variable with no registered data or definition.
    #[error("unknown variable '{0}' referenced in formula")]
    UnknownVariable(String),
}

/// A named, registered formula.
#[derive(Debug, Clone)]
pub struct FormulaDef {
    /// The derived variable's name.
    pub name: String,
    /// The parsed expression tree.
    pub expr: Expr,
}

/// The registry of all known formulas, in registration order.
///
/// Registration order is preserved (a `Vec`, not a map) because it is the
/// tie-break the evaluator uses when two formulas could each resolve an
/// ambiguous reference — first registered wins, matching the import-group
/// priority convention used elsewhere in the core (§9).
#[derive(Debug, Clone, Default)]
pub struct FormulaRegistry {
    formulas: Vec<FormulaDef>,
}

impl FormulaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new formula, rejecting a duplicate name or an immediate
    /// cycle introduced by this registration.
    pub fn register(&mut self, name: impl Into<String>, expr: Expr) -> Result<(), FormulaError> {
        let name = name.into();
        if self.formulas.iter().any(|f| f.name == name) {
            return Err(FormulaError::DuplicateName(name));
        }
        self.formulas.push(FormulaDef {
            name: name.clone(),
            expr,
        });
        if let Some(cycle_name) = self.find_cycle() {
            self.formulas.pop();
            return Err(FormulaError::Cycle(cycle_name));
        }
        Ok(())
    }

    /// Looks up a formula by name.
    pub fn get(&self, name: &str) -> Option<&FormulaDef> {
        self.formulas.iter().find(|f| f.name == name)
    }

    /// Returns the nesting depth of `name`'s definition, following variable
    /// references into other registered formulas (depth 0 for a formula
    /// that references only raw variables).
    pub fn depth_of(&self, name: &str) -> Result<usize, FormulaError> {
        self.depth_of_inner(name, &mut HashSet::new())
    }

    fn depth_of_inner(&self, name: &str, visiting: &mut HashSet<String>) -> Result<usize, FormulaError> {
        if !visiting.insert(name.to_string()) {
            return Err(FormulaError::Cycle(name.to_string()));
        }
        let def = match self.get(name) {
            Some(def) => def,
            None => {
                visiting.remove(name);
                return Ok(0);
            }
        };
        let mut max_child_depth = 0usize;
        for referenced in def.expr.referenced_variables() {
            if self.get(&referenced).is_some() {
                let child_depth = self.depth_of_inner(&referenced, visiting)?;
                max_child_depth = max_child_depth.max(child_depth + 1);
            }
        }
        visiting.remove(name);
        if max_child_depth > MAX_FORMULA_DEPTH {
            return Err(FormulaError::TooDeep(name.to_string()));
        }
        Ok(max_child_depth)
    }

    /// Performs a DFS over every registered formula's variable references,
    /// returning the name of a formula found on a cycle, if any.
    fn find_cycle(&self) -> Option<String> {
        for def in &self.formulas {
            let mut visiting = HashSet::new();
            if self.depth_of_inner(&def.name, &mut visiting).is_err() {
                return Some(def.name.clone());
            }
        }
        None
    }
}

/// A date-aligned series of already-merged observations for one referenced
/// variable, keyed by entity and qualified by facet selection.
pub type SeriesInput = BTreeMap<Dcid, Vec<Observation>>;

/// Evaluates `formula` for every entity present in `inputs`, producing one
/// derived [`Observation`] per `(entity, date, facet combination)` where
/// every operand has a value (§4.6).
///
/// Operands are grouped into facet combinations first: every referenced
/// variable's distinct facets (after its own qualifier constraints) are
/// combined pairwise, a combination surviving only if the chosen facets
/// agree on every field both set. This is what lets `A / B` produce two
/// independent derived series when `A` and `B` are each multi-sourced —
/// one series per facet combination, never one arbitrarily chosen facet
/// per operand.
///
/// Division by zero for a given `(entity, date)` silently drops that date
/// from the output rather than producing `Err` or `NaN`/`Infinity` — a
/// derived variable with a hole is preferable to a poisoned series (§4.6).
pub fn evaluate(
    registry: &FormulaRegistry,
    formula_name: &str,
    inputs: &BTreeMap<String, SeriesInput>,
) -> Result<Vec<Observation>, FormulaError> {
    let def = registry
        .get(formula_name)
        .ok_or_else(|| FormulaError::UnknownVariable(formula_name.to_string()))?;
    let referenced = def.expr.referenced_variables();

    let mut entities: Vec<Dcid> = Vec::new();
    for var_name in &referenced {
        if let Some(series) = inputs.get(var_name) {
            for entity in series.keys() {
                if !entities.contains(entity) {
                    entities.push(entity.clone());
                }
            }
        }
    }
    entities.sort();

    let mut out = Vec::new();
    for entity in &entities {
        for combo in facet_combos(&def.expr, &referenced, inputs, entity) {
            let dates = dates_for_combo(&referenced, inputs, entity, &combo);
            for date in dates {
                if let Some(value) = def.expr.evaluate_at(inputs, entity, &date, &combo) {
                    out.push(Observation {
                        variable: Dcid::new(formula_name.to_string()),
                        entity: entity.clone(),
                        date,
                        value,
                        facet: derived_facet(formula_name, &combo),
                    });
                }
            }
        }
    }
    Ok(out)
}

/// Enumerates every compatible facet combination across `referenced`'s
/// variables for `entity`: one facet per variable, chosen from that
/// variable's own qualifier-filtered, deduplicated facets, kept only if it
/// agrees with every other chosen facet on every field both have set.
fn facet_combos(
    expr: &Expr,
    referenced: &[String],
    inputs: &BTreeMap<String, SeriesInput>,
    entity: &Dcid,
) -> Vec<FacetCombo> {
    let mut combos: Vec<Vec<(String, Facet)>> = vec![Vec::new()];

    for name in referenced {
        let qualifiers = expr.qualifiers_for(name).unwrap_or(&[]);
        let mut candidates: Vec<Facet> = Vec::new();
        if let Some(observations) = inputs.get(name).and_then(|series| series.get(entity)) {
            for obs in observations {
                let satisfies = qualifiers
                    .iter()
                    .all(|(key, expected)| key.matches(&obs.facet, expected));
                if satisfies && !candidates.iter().any(|f| f.id() == obs.facet.id()) {
                    candidates.push(obs.facet.clone());
                }
            }
        }
        if candidates.is_empty() {
            return Vec::new();
        }

        let mut extended = Vec::new();
        for partial in &combos {
            for facet in &candidates {
                if partial
                    .iter()
                    .all(|(_, chosen)| facets_compatible(chosen, facet))
                {
                    let mut next = partial.clone();
                    next.push((name.clone(), facet.clone()));
                    extended.push(next);
                }
            }
        }
        combos = extended;
    }

    combos
        .into_iter()
        .map(|pairs| {
            pairs
                .into_iter()
                .map(|(name, facet)| (name, facet.id()))
                .collect()
        })
        .collect()
}

fn dates_for_combo(
    referenced: &[String],
    inputs: &BTreeMap<String, SeriesInput>,
    entity: &Dcid,
    combo: &FacetCombo,
) -> Vec<IsoDate> {
    let mut dates: Vec<IsoDate> = Vec::new();
    for name in referenced {
        let Some(facet_id) = combo.get(name) else {
            continue;
        };
        if let Some(observations) = inputs.get(name).and_then(|series| series.get(entity)) {
            for obs in observations {
                if obs.facet.id() == *facet_id && !dates.contains(&obs.date) {
                    dates.push(obs.date.clone());
                }
            }
        }
    }
    dates.sort();
    dates
}

/// Builds the output facet for one derived series. The combo's chosen
/// facet ids are embedded in `import_name`, in variable-name order, so two
/// distinct facet combinations for the same formula always hash to two
/// distinct [`FacetId`]s.
fn derived_facet(formula_name: &str, combo: &FacetCombo) -> Facet {
    let combo_tag = combo
        .iter()
        .map(|(var, facet_id)| format!("{var}={:x}", facet_id.0))
        .collect::<Vec<_>>()
        .join(",");
    Facet {
        measurement_method: Some("DerivedByFormula".to_string()),
        observation_period: None,
        unit: None,
        scaling_factor: None,
        import_name: Some(format!("formula:{formula_name}[{combo_tag}]")),
        provenance_url: None,
    }
}

/// Re-exported for callers that want to hash a derived facet explicitly,
/// given the same facet combination [`evaluate`] would have produced.
pub fn derived_facet_id(formula_name: &str, combo: &FacetCombo) -> FacetId {
    derived_facet(formula_name, combo).id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IsoDate;

    fn series(points: &[(&str, &str, f64)]) -> SeriesInput {
        let mut map: SeriesInput = BTreeMap::new();
        for (entity, date, value) in points {
            map.entry(Dcid::new(*entity))
                .or_default()
                .push(Observation {
                    variable: Dcid::new("v"),
                    entity: Dcid::new(*entity),
                    date: IsoDate::new(*date),
                    value: *value,
                    facet: Facet {
                        measurement_method: None,
                        observation_period: None,
                        unit: None,
                        scaling_factor: None,
                        import_name: Some("src".into()),
                        provenance_url: None,
                    },
                });
        }
        map
    }

    #[test]
    fn division_formula_computes_ratio() {
        let mut registry = FormulaRegistry::new();
        let expr = parse("Count_Person_Female / Count_Person").unwrap();
        registry.register("Ratio_Female", expr).unwrap();

        let mut inputs = BTreeMap::new();
        inputs.insert(
            "Count_Person_Female".to_string(),
            series(&[("e1", "2020", 50.0)]),
        );
        inputs.insert("Count_Person".to_string(), series(&[("e1", "2020", 100.0)]));

        let result = evaluate(&registry, "Ratio_Female", &inputs).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].value, 0.5);
    }

    #[test]
    fn division_by_zero_drops_the_date() {
        let mut registry = FormulaRegistry::new();
        let expr = parse("A / B").unwrap();
        registry.register("Ratio", expr).unwrap();

        let mut inputs = BTreeMap::new();
        inputs.insert("A".to_string(), series(&[("e1", "2020", 10.0)]));
        inputs.insert("B".to_string(), series(&[("e1", "2020", 0.0)]));

        let result = evaluate(&registry, "Ratio", &inputs).unwrap();
        assert!(result.is_empty());
    }

    fn obs_with_facet(entity: &str, date: &str, value: f64, import_name: &str) -> Observation {
        Observation {
            variable: Dcid::new("v"),
            entity: Dcid::new(entity),
            date: IsoDate::new(date),
            value,
            facet: Facet {
                measurement_method: None,
                observation_period: None,
                unit: None,
                scaling_factor: None,
                import_name: Some(import_name.into()),
                provenance_url: None,
            },
        }
    }

    #[test]
    fn multi_sourced_operands_produce_one_series_per_facet_combination() {
        let mut registry = FormulaRegistry::new();
        registry.register("Ratio", parse("A / B").unwrap()).unwrap();

        let mut a: SeriesInput = BTreeMap::new();
        a.insert(
            Dcid::new("e1"),
            vec![
                obs_with_facet("e1", "2020", 10.0, "census"),
                obs_with_facet("e1", "2021", 20.0, "un"),
            ],
        );
        let mut b: SeriesInput = BTreeMap::new();
        b.insert(
            Dcid::new("e1"),
            vec![
                obs_with_facet("e1", "2020", 5.0, "census"),
                obs_with_facet("e1", "2021", 4.0, "un"),
            ],
        );

        let mut inputs = BTreeMap::new();
        inputs.insert("A".to_string(), a);
        inputs.insert("B".to_string(), b);

        let mut result = evaluate(&registry, "Ratio", &inputs).unwrap();
        result.sort_by(|x, y| x.date.cmp(&y.date));
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].value, 2.0);
        assert_eq!(result[1].value, 5.0);
        assert_ne!(result[0].facet.id(), result[1].facet.id());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = FormulaRegistry::new();
        registry
            .register("A", parse("X + Y").unwrap())
            .unwrap();
        let result = registry.register("A", parse("X - Y").unwrap());
        assert!(matches!(result, Err(FormulaError::DuplicateName(_))));
    }

    #[test]
    fn direct_self_reference_is_a_cycle() {
        let mut registry = FormulaRegistry::new();
        let result = registry.register("A", parse("A + 1").unwrap());
        assert!(matches!(result, Err(FormulaError::Cycle(_))));
    }

    #[test]
    fn mutual_reference_is_a_cycle() {
        let mut registry = FormulaRegistry::new();
        registry.register("A", parse("B + 1").unwrap()).unwrap();
        let result = registry.register("B", parse("A + 1").unwrap());
        assert!(matches!(result, Err(FormulaError::Cycle(_))));
    }
}
