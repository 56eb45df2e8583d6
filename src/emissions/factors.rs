//! Emission factor table.
//!
//! Every lookup map carries an explicit fallback: either another key of the
//! same map (fuel maps fall back to diesel) or a literal multiplier (method,
//! mode, and equipment maps fall back to 1). Fallback keys are checked when a
//! table is built, so a custom table can never silently resolve a miss to
//! nothing.
//!
//! The standard table is compiled in; a TOML file passed via `--factors`
//! replaces individual maps. Tables are immutable once loaded and shared
//! across requests behind an `Arc`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Key of the coal factor used for excavated coal mass.
pub const COAL_KEY: &str = "coal";
/// Key every fuel map falls back to on an unknown fuel type.
pub const DIESEL_KEY: &str = "diesel";
/// Default global warming potential of methane (100-year horizon).
pub const DEFAULT_METHANE_GWP: f64 = 25.0;

#[derive(Debug, Error, PartialEq)]
pub enum FactorTableError {
    #[error("{table}: fallback key '{key}' is not present in the table")]
    MissingFallbackKey { table: &'static str, key: String },
    #[error("{table}: required key '{key}' is missing")]
    MissingKey { table: &'static str, key: &'static str },
    #[error("{table}: fuel key '{key}' must be lowercase")]
    NonLowercaseKey { table: &'static str, key: String },
    #[error("{table}: factor for '{key}' must be finite and non-negative, got {value}")]
    InvalidFactor {
        table: &'static str,
        key: String,
        value: f64,
    },
}

/// What a [`FactorMap`] resolves to when a key is absent or unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// Use the factor stored under another key of the same map.
    Key(String),
    /// Use a literal factor.
    Value(f64),
}

/// A keyed factor lookup with an explicit fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorMap {
    pub values: BTreeMap<String, f64>,
    pub fallback: Fallback,
}

impl FactorMap {
    /// Build a map that falls back to the factor stored under `key`.
    pub fn with_fallback_key(values: &[(&str, f64)], key: &str) -> Self {
        FactorMap {
            values: collect_values(values),
            fallback: Fallback::Key(key.to_string()),
        }
    }

    /// Build a map that falls back to a literal multiplier.
    pub fn with_fallback_value(values: &[(&str, f64)], value: f64) -> Self {
        FactorMap {
            values: collect_values(values),
            fallback: Fallback::Value(value),
        }
    }

    /// Exact-match lookup. `None` and unknown keys resolve to the fallback.
    pub fn lookup(&self, key: Option<&str>) -> f64 {
        key.and_then(|k| self.values.get(k))
            .copied()
            .unwrap_or_else(|| self.fallback_factor())
    }

    /// Case-insensitive lookup used for fuel types. Keys are stored lowercase.
    pub fn lookup_lowercase(&self, key: Option<&str>) -> f64 {
        let normalized = key.map(str::to_lowercase);
        self.lookup(normalized.as_deref())
    }

    /// The factor returned on a miss.
    pub fn fallback_factor(&self) -> f64 {
        match &self.fallback {
            Fallback::Value(v) => *v,
            // Validated at load; the literal 1 only covers hand-built maps.
            Fallback::Key(k) => self.values.get(k).copied().unwrap_or(1.0),
        }
    }

    fn validate(&self, table: &'static str) -> Result<(), FactorTableError> {
        for (key, value) in &self.values {
            if !value.is_finite() || *value < 0.0 {
                return Err(FactorTableError::InvalidFactor {
                    table,
                    key: key.clone(),
                    value: *value,
                });
            }
        }
        match &self.fallback {
            Fallback::Key(k) if !self.values.contains_key(k) => {
                Err(FactorTableError::MissingFallbackKey {
                    table,
                    key: k.clone(),
                })
            }
            Fallback::Value(v) if !v.is_finite() || *v < 0.0 => {
                Err(FactorTableError::InvalidFactor {
                    table,
                    key: "<fallback>".to_string(),
                    value: *v,
                })
            }
            _ => Ok(()),
        }
    }

    /// Fuel maps are looked up with a lowercased key, so mixed-case entries
    /// would never match.
    fn validate_fuel(&self, table: &'static str) -> Result<(), FactorTableError> {
        self.validate(table)?;
        let keys = self.values.keys().chain(match &self.fallback {
            Fallback::Key(k) => Some(k),
            Fallback::Value(_) => None,
        });
        for key in keys {
            if key.to_lowercase() != *key {
                return Err(FactorTableError::NonLowercaseKey {
                    table,
                    key: key.clone(),
                });
            }
        }
        Ok(())
    }
}

fn collect_values(values: &[(&str, f64)]) -> BTreeMap<String, f64> {
    values.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// Reference data for every emission category.
///
/// Maps omitted from a TOML file keep their standard values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorTable {
    pub excavation_fuel: FactorMap,
    pub excavation_method: FactorMap,
    pub transportation_fuel: FactorMap,
    pub transportation_mode: FactorMap,
    pub equipment_fuel: FactorMap,
    pub equipment_type: FactorMap,
    pub methane_gwp: f64,
    pub utilization_efficiency: FactorMap,
}

impl Default for FactorTable {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_fuels() -> FactorMap {
    FactorMap::with_fallback_key(
        &[
            (COAL_KEY, 2.42),
            (DIESEL_KEY, 2.68),
            ("petrol", 2.31),
            ("natural-gas", 2.02),
        ],
        DIESEL_KEY,
    )
}

impl FactorTable {
    /// The compiled-in factor table (kg CO2e per unit, unitless multipliers).
    pub fn standard() -> Self {
        FactorTable {
            excavation_fuel: standard_fuels(),
            excavation_method: FactorMap::with_fallback_value(
                &[("Surface Mining", 1.2), ("Underground Mining", 1.5)],
                1.0,
            ),
            transportation_fuel: standard_fuels(),
            transportation_mode: FactorMap::with_fallback_value(
                &[("Truck", 1.0), ("Rail", 0.4), ("Conveyor", 0.2)],
                1.0,
            ),
            equipment_fuel: standard_fuels(),
            equipment_type: FactorMap::with_fallback_value(
                &[
                    ("Excavator", 1.2),
                    ("Loader", 1.1),
                    ("Drill", 1.3),
                    ("Dump Truck", 1.4),
                ],
                1.0,
            ),
            methane_gwp: DEFAULT_METHANE_GWP,
            utilization_efficiency: FactorMap::with_fallback_value(
                &[
                    ("Power Generation", 0.7),
                    ("Ventilation Air Methane", 0.5),
                    ("Flaring", 0.9),
                ],
                1.0,
            ),
        }
    }

    /// Check fallbacks resolve, factors are sane, fuel keys are lowercase,
    /// and the coal factor exists.
    pub fn validate(&self) -> Result<(), FactorTableError> {
        self.excavation_fuel.validate_fuel("excavation_fuel")?;
        self.excavation_method.validate("excavation_method")?;
        self.transportation_fuel.validate_fuel("transportation_fuel")?;
        self.transportation_mode.validate("transportation_mode")?;
        self.equipment_fuel.validate_fuel("equipment_fuel")?;
        self.equipment_type.validate("equipment_type")?;
        self.utilization_efficiency
            .validate("utilization_efficiency")?;
        if !self.excavation_fuel.values.contains_key(COAL_KEY) {
            return Err(FactorTableError::MissingKey {
                table: "excavation_fuel",
                key: COAL_KEY,
            });
        }
        if !self.methane_gwp.is_finite() || self.methane_gwp < 0.0 {
            return Err(FactorTableError::InvalidFactor {
                table: "methane_gwp",
                key: "methane_gwp".to_string(),
                value: self.methane_gwp,
            });
        }
        Ok(())
    }

    /// Factor applied to excavated coal mass.
    pub fn coal_factor(&self) -> f64 {
        self.excavation_fuel.lookup(Some(COAL_KEY))
    }

    /// Parse and validate a factor table from TOML.
    pub fn from_toml(content: &str) -> Result<Self> {
        let table: FactorTable = toml::from_str(content).context("invalid factor table TOML")?;
        table.validate()?;
        Ok(table)
    }

    /// Read, parse, and validate a factor table file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read factor table {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_is_valid() {
        assert_eq!(FactorTable::standard().validate(), Ok(()));
    }

    #[test]
    fn fuel_lookup_is_case_insensitive() {
        let t = FactorTable::standard();
        assert_eq!(t.excavation_fuel.lookup_lowercase(Some("DIESEL")), 2.68);
        assert_eq!(t.excavation_fuel.lookup_lowercase(Some("Petrol")), 2.31);
    }

    #[test]
    fn unknown_fuel_falls_back_to_diesel() {
        let t = FactorTable::standard();
        assert_eq!(t.equipment_fuel.lookup_lowercase(Some("hydrogen")), 2.68);
        assert_eq!(t.equipment_fuel.lookup_lowercase(None), 2.68);
    }

    #[test]
    fn modifier_lookup_is_case_sensitive() {
        let t = FactorTable::standard();
        assert_eq!(t.excavation_method.lookup(Some("Surface Mining")), 1.2);
        assert_eq!(t.excavation_method.lookup(Some("surface mining")), 1.0);
        assert_eq!(t.transportation_mode.lookup(None), 1.0);
    }

    #[test]
    fn dangling_fallback_key_is_rejected() {
        let mut t = FactorTable::standard();
        t.transportation_fuel.values.remove(DIESEL_KEY);
        assert_eq!(
            t.validate(),
            Err(FactorTableError::MissingFallbackKey {
                table: "transportation_fuel",
                key: DIESEL_KEY.to_string(),
            })
        );
    }

    #[test]
    fn negative_factor_is_rejected() {
        let mut t = FactorTable::standard();
        t.equipment_type.values.insert("Drill".into(), -1.0);
        assert!(matches!(
            t.validate(),
            Err(FactorTableError::InvalidFactor { table: "equipment_type", .. })
        ));
    }

    #[test]
    fn missing_coal_factor_is_rejected() {
        let mut t = FactorTable::standard();
        t.excavation_fuel.values.remove(COAL_KEY);
        assert!(matches!(
            t.validate(),
            Err(FactorTableError::MissingKey { key: COAL_KEY, .. })
        ));
    }

    #[test]
    fn toml_round_trip_preserves_table() {
        let t = FactorTable::standard();
        let text = t.to_toml().unwrap();
        assert_eq!(FactorTable::from_toml(&text).unwrap(), t);
    }

    #[test]
    fn partial_toml_keeps_standard_maps() {
        let text = r#"
            methane_gwp = 28.0

            [transportation_mode]
            fallback = { value = 1.0 }

            [transportation_mode.values]
            Truck = 1.1
            Barge = 0.3
        "#;
        let t = FactorTable::from_toml(text).unwrap();
        assert_eq!(t.methane_gwp, 28.0);
        assert_eq!(t.transportation_mode.lookup(Some("Barge")), 0.3);
        assert_eq!(t.transportation_mode.lookup(Some("Rail")), 1.0);
        assert_eq!(t.excavation_method, FactorTable::standard().excavation_method);
    }

    #[test]
    fn toml_with_dangling_fallback_fails_to_load() {
        let text = r#"
            [equipment_fuel]
            fallback = { key = "kerosene" }

            [equipment_fuel.values]
            diesel = 2.68
        "#;
        assert!(FactorTable::from_toml(text).is_err());
    }

    #[test]
    fn mixed_case_fuel_key_is_rejected() {
        let text = r#"
            [transportation_fuel]
            fallback = { key = "diesel" }

            [transportation_fuel.values]
            diesel = 2.68
            Diesel = 2.7
        "#;
        let err = FactorTable::from_toml(text).unwrap_err();
        assert_eq!(
            err.downcast_ref::<FactorTableError>(),
            Some(&FactorTableError::NonLowercaseKey {
                table: "transportation_fuel",
                key: "Diesel".to_string(),
            })
        );
    }

    #[test]
    fn mixed_case_fuel_fallback_is_rejected() {
        let mut t = FactorTable::standard();
        t.equipment_fuel.values.insert("LPG".into(), 1.5);
        t.equipment_fuel.fallback = Fallback::Key("LPG".into());
        assert!(matches!(
            t.validate(),
            Err(FactorTableError::NonLowercaseKey { table: "equipment_fuel", .. })
        ));
    }

    #[test]
    fn modifier_maps_keep_mixed_case_keys() {
        let mut t = FactorTable::standard();
        t.excavation_method.values.insert("Open Pit".into(), 1.1);
        assert_eq!(t.validate(), Ok(()));
    }
}
