//! Loads the import-group roster from a minimal TOML config file.
//!
//! The core ships no wire backend drivers (they're an external concern);
//! this file format exists only to let the reference binary boot against
//! the in-memory reference driver with operator-supplied fixture data,
//! exercising the same [`RosterConfig`] a real deployment would reload at
//! runtime.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use mixer_core::backend::BackendDriver;
use mixer_core::model::{Dcid, Direction, Facet, ImportGroup, IsoDate, Observation, Triple, TypedValue};
use mixer_core::refdriver::InMemoryDriver;

/// One `[[backend]]` table in the roster TOML file.
#[derive(Debug, Deserialize)]
struct BackendEntry {
    name: String,
    priority: u32,
    /// Import group this backend belongs to; backends sharing a group name
    /// are tried in priority order for the same data (§3).
    #[serde(default = "default_group")]
    group: String,
    /// Path to a JSON seed file loaded into the in-memory reference driver,
    /// relative to the config file's own directory.
    #[serde(default)]
    seed: Option<String>,
}

fn default_group() -> String {
    "default".to_string()
}

/// The `[[backend]]` list at the top of the roster file.
#[derive(Debug, Deserialize)]
struct RosterFile {
    #[serde(rename = "backend", default)]
    backends: Vec<BackendEntry>,
}

/// The shape of a `seed` JSON file: fixture data loaded straight into an
/// [`InMemoryDriver`] at startup.
#[derive(Debug, Deserialize, Default)]
struct SeedFile {
    #[serde(default)]
    triples: Vec<SeedTriple>,
    #[serde(default)]
    observations: Vec<SeedObservation>,
}

#[derive(Debug, Deserialize)]
struct SeedTriple {
    subject: String,
    property: String,
    object: String,
    #[serde(default)]
    is_node: bool,
    #[serde(default)]
    direction_in: bool,
}

#[derive(Debug, Deserialize)]
struct SeedObservation {
    variable: String,
    entity: String,
    date: String,
    value: f64,
    #[serde(default)]
    import_name: Option<String>,
}

/// Result of loading a roster file: the constructed backends, grouped into
/// [`ImportGroup`]s in the order encountered, ready to hand to the
/// dispatcher.
pub struct LoadedRoster {
    /// Every backend driver constructed, in file order.
    pub backends: Vec<Arc<dyn BackendDriver>>,
    /// Import groups naming which backends serve which data, in priority
    /// order within each group.
    pub groups: Vec<ImportGroup>,
}

/// Loads a roster from a TOML file at `path`. Seed file paths are resolved
/// relative to `path`'s parent directory.
pub fn load_roster(path: &Path) -> Result<LoadedRoster> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading roster config {}", path.display()))?;
    let parsed: RosterFile = toml::from_str(&raw).with_context(|| format!("parsing roster config {}", path.display()))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut backends: Vec<Arc<dyn BackendDriver>> = Vec::with_capacity(parsed.backends.len());
    let mut by_group: HashMap<String, ImportGroup> = HashMap::new();

    for entry in parsed.backends {
        let driver = InMemoryDriver::new(entry.name.clone(), entry.priority);
        if let Some(seed) = &entry.seed {
            let seed_path = base_dir.join(seed);
            seed_driver(&driver, &seed_path)
                .with_context(|| format!("loading seed file {}", seed_path.display()))?;
        }

        by_group
            .entry(entry.group.clone())
            .or_insert_with(|| ImportGroup::new(entry.group.clone()))
            .backends
            .push(mixer_core::model::BackendEntry {
                name: entry.name.clone(),
                priority: entry.priority,
            });

        backends.push(Arc::new(driver));
    }

    let mut groups: Vec<ImportGroup> = by_group.into_values().collect();
    groups.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(LoadedRoster { backends, groups })
}

fn seed_driver(driver: &InMemoryDriver, seed_path: &Path) -> Result<()> {
    let raw = fs::read_to_string(seed_path)?;
    let seed: SeedFile = serde_json::from_str(&raw)?;

    for triple in seed.triples {
        let object = if triple.is_node {
            TypedValue::Node(Dcid::new(triple.object))
        } else {
            TypedValue::Literal(triple.object)
        };
        let direction = if triple.direction_in { Direction::In } else { Direction::Out };
        driver.insert_triple(Triple {
            subject: Dcid::new(triple.subject),
            property: triple.property,
            object,
            direction,
            provenance: None,
        });
    }

    for obs in seed.observations {
        driver.insert_observation(Observation {
            variable: Dcid::new(obs.variable),
            entity: Dcid::new(obs.entity),
            date: IsoDate::new(obs.date),
            value: obs.value,
            facet: Facet {
                measurement_method: None,
                observation_period: None,
                unit: None,
                scaling_factor: None,
                import_name: obs.import_name,
                provenance_url: None,
            },
        });
    }

    Ok(())
}
