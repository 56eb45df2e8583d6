//! Write-time validation of activity and carbon-sink submissions.
//!
//! A present sub-section must carry every required key (a `null` value still
//! counts as supplied, the calculator zeroes it later). A `null` or omitted
//! sub-section is absent on create; on update an omitted sub-section is kept
//! and a `null` one clears the stored value. Sink submissions must name a known type,
//! carry its payload, and carry no payload belonging to another type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

use super::records::{lenient, ActivityRecord, CarbonSinkRecord, SinkType};

pub const EXCAVATION_FIELDS: &[&str] =
    &["coalAmount", "method", "fuelType", "distance", "equipmentUsed"];
pub const TRANSPORTATION_FIELDS: &[&str] = &[
    "coalTransported",
    "mode",
    "fuelType",
    "distancePerTrip",
    "vehicleCapacity",
    "tripsPerDay",
];
pub const EQUIPMENT_FIELDS: &[&str] =
    &["type", "fuelType", "operatingHours", "fuelConsumptionPerHour"];
pub const METHANE_FIELDS: &[&str] = &[
    "captureRate",
    "utilizationMethod",
    "dischargeAmount",
    "conversionEfficiency",
];
pub const AFFORESTATION_FIELDS: &[&str] = &["area", "treePlantingRate", "treeType"];
pub const BIODIVERSITY_FIELDS: &[&str] = &["area", "habitatType", "carbonSequestration"];
pub const GREEN_TECHNOLOGY_FIELDS: &[&str] =
    &["technologyType", "emissionReduction", "energySource"];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field in {section}: {field}")]
    MissingField {
        section: &'static str,
        field: &'static str,
    },
    #[error("{section} must be a JSON object")]
    NotAnObject { section: &'static str },
    #[error("Invalid carbon sink type: {0}")]
    UnknownSinkType(String),
    #[error("Carbon sink type is required")]
    MissingSinkType,
    #[error("{} data required for type {}", payload_name(.0), .0.label())]
    MissingPayload(SinkType),
    #[error("{field} data is not allowed for type {}", .sink_type.label())]
    UnexpectedPayload {
        sink_type: SinkType,
        field: &'static str,
    },
    #[error("Carbon sink location is required")]
    MissingLocation,
}

fn payload_name(t: &SinkType) -> &'static str {
    match t {
        SinkType::BiodiversityConservation => "Biodiversity",
        other => other.label(),
    }
}

/// Check a sub-section value. `None` and `null` mean absent.
fn check_section(
    section: &'static str,
    value: Option<&Value>,
    required: &[&'static str],
) -> Result<(), ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(()),
        Some(Value::Object(map)) => {
            for field in required {
                if !map.contains_key(*field) {
                    return Err(ValidationError::MissingField { section, field });
                }
            }
            Ok(())
        }
        Some(_) => Err(ValidationError::NotAnObject { section }),
    }
}

/// Keeps an explicit `null` as `Some(Value::Null)` so it can be told apart
/// from an omitted key.
fn explicit<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(d).map(Some)
}

fn present(value: &Option<Value>) -> bool {
    !matches!(value, None | Some(Value::Null))
}

// ── Activity records ────────────────────────────────────────────

/// An activity record as submitted by a client, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDraft {
    #[serde(default, deserialize_with = "explicit")]
    pub excavation: Option<Value>,
    #[serde(default, deserialize_with = "explicit")]
    pub transportation: Option<Value>,
    #[serde(default, deserialize_with = "explicit")]
    pub equipment_usage: Option<Value>,
    #[serde(default, deserialize_with = "explicit")]
    pub methane_entrapment: Option<Value>,
    #[serde(default, alias = "createdAt")]
    pub date: Option<DateTime<Utc>>,
}

impl ActivityDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_section("excavation", self.excavation.as_ref(), EXCAVATION_FIELDS)?;
        check_section(
            "transportation",
            self.transportation.as_ref(),
            TRANSPORTATION_FIELDS,
        )?;
        check_section(
            "equipmentUsage",
            self.equipment_usage.as_ref(),
            EQUIPMENT_FIELDS,
        )?;
        check_section(
            "methaneEntrapment",
            self.methane_entrapment.as_ref(),
            METHANE_FIELDS,
        )?;
        Ok(())
    }

    /// Sub-sections present in this draft, in storage form.
    pub fn sections(&self) -> ActivitySections {
        ActivitySections {
            excavation: self.excavation.clone().filter(|v| !v.is_null()),
            transportation: self.transportation.clone().filter(|v| !v.is_null()),
            equipment_usage: self.equipment_usage.clone().filter(|v| !v.is_null()),
            methane_entrapment: self.methane_entrapment.clone().filter(|v| !v.is_null()),
        }
    }

    /// Sub-sections as an update overlay: `None` keeps the stored value,
    /// `Some(Value::Null)` clears it.
    pub fn section_updates(&self) -> ActivitySections {
        ActivitySections {
            excavation: self.excavation.clone(),
            transportation: self.transportation.clone(),
            equipment_usage: self.equipment_usage.clone(),
            methane_entrapment: self.methane_entrapment.clone(),
        }
    }

    /// Build the record this draft describes once the store has assigned an id.
    pub fn into_record(self, id: i64, user_id: i64) -> ActivityRecord {
        let sections = self.sections();
        ActivityRecord::from_stored(
            id,
            user_id,
            sections.excavation,
            sections.transportation,
            sections.equipment_usage,
            sections.methane_entrapment,
            self.date.unwrap_or_else(Utc::now),
        )
    }
}

/// Raw JSON sub-sections of an activity record, as persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivitySections {
    pub excavation: Option<Value>,
    pub transportation: Option<Value>,
    pub equipment_usage: Option<Value>,
    pub methane_entrapment: Option<Value>,
}

fn overlay<T: serde::de::DeserializeOwned>(slot: &mut Option<T>, update: Option<Value>) {
    match update {
        None => {}
        Some(Value::Null) => *slot = None,
        value => *slot = lenient::section_from_value(value),
    }
}

impl ActivitySections {
    /// Overlay these sections onto a stored record. Omitted sections are
    /// kept; `null` ones are cleared.
    pub fn apply_to(self, record: &mut ActivityRecord) {
        overlay(&mut record.excavation, self.excavation);
        overlay(&mut record.transportation, self.transportation);
        overlay(&mut record.equipment_usage, self.equipment_usage);
        overlay(&mut record.methane_entrapment, self.methane_entrapment);
    }
}

// ── Carbon sinks ────────────────────────────────────────────────

/// A carbon sink as submitted by a client, before validation.
///
/// Also used for partial updates: fields left `None` keep the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkDraft {
    #[serde(rename = "type", default)]
    pub sink_type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub afforestation: Option<Value>,
    #[serde(default)]
    pub biodiversity_conservation: Option<Value>,
    #[serde(default)]
    pub green_technology: Option<Value>,
}

impl SinkDraft {
    /// Validate a complete submission and return its parsed type.
    pub fn validate(&self) -> Result<SinkType, ValidationError> {
        let label = self
            .sink_type
            .as_deref()
            .ok_or(ValidationError::MissingSinkType)?;
        let sink_type = SinkType::from_label(label)
            .ok_or_else(|| ValidationError::UnknownSinkType(label.to_string()))?;

        if self.location.as_deref().map_or(true, |l| l.trim().is_empty()) {
            return Err(ValidationError::MissingLocation);
        }

        for (t, payload) in [
            (SinkType::Afforestation, &self.afforestation),
            (SinkType::BiodiversityConservation, &self.biodiversity_conservation),
            (SinkType::GreenTechnology, &self.green_technology),
        ] {
            if t == sink_type {
                if !present(payload) {
                    return Err(ValidationError::MissingPayload(t));
                }
                check_section(section_name(t), payload.as_ref(), required_fields(t))?;
            } else if present(payload) {
                return Err(ValidationError::UnexpectedPayload {
                    sink_type,
                    field: t.payload_field(),
                });
            }
        }
        Ok(sink_type)
    }

    /// Merge this partial update onto a stored record, producing a complete
    /// draft ready for [`SinkDraft::validate`]. When the type changes, the
    /// stored payloads that no longer match are dropped.
    pub fn merged_onto(self, existing: &CarbonSinkRecord) -> SinkDraft {
        let type_changed = self
            .sink_type
            .as_deref()
            .is_some_and(|t| t != existing.sink_type.label());

        let keep = |update: Option<Value>, stored: Option<Value>| match update {
            Some(v) => Some(v),
            None if type_changed => None,
            None => stored,
        };

        SinkDraft {
            sink_type: self
                .sink_type
                .or_else(|| Some(existing.sink_type.label().to_string())),
            location: self.location.or_else(|| Some(existing.location.clone())),
            creation_date: self.creation_date.or(Some(existing.creation_date)),
            afforestation: keep(
                self.afforestation,
                to_value(existing.afforestation.as_ref()),
            ),
            biodiversity_conservation: keep(
                self.biodiversity_conservation,
                to_value(existing.biodiversity_conservation.as_ref()),
            ),
            green_technology: keep(
                self.green_technology,
                to_value(existing.green_technology.as_ref()),
            ),
        }
    }

    /// Build the record this draft describes. Call after `validate`.
    pub fn into_record(self, id: i64, user_id: i64) -> CarbonSinkRecord {
        CarbonSinkRecord::from_stored(
            id,
            user_id,
            self.sink_type.as_deref().unwrap_or_default(),
            self.location.unwrap_or_default(),
            self.creation_date.unwrap_or_else(Utc::now),
            self.afforestation.filter(|v| !v.is_null()),
            self.biodiversity_conservation.filter(|v| !v.is_null()),
            self.green_technology.filter(|v| !v.is_null()),
        )
    }
}

fn to_value<T: serde::Serialize>(payload: Option<&T>) -> Option<Value> {
    payload.and_then(|p| serde_json::to_value(p).ok())
}

fn section_name(t: SinkType) -> &'static str {
    match t {
        SinkType::Afforestation => "afforestation",
        SinkType::BiodiversityConservation => "biodiversity",
        SinkType::GreenTechnology => "green technology",
        SinkType::Unknown => "unknown",
    }
}

fn required_fields(t: SinkType) -> &'static [&'static str] {
    match t {
        SinkType::Afforestation => AFFORESTATION_FIELDS,
        SinkType::BiodiversityConservation => BIODIVERSITY_FIELDS,
        SinkType::GreenTechnology => GREEN_TECHNOLOGY_FIELDS,
        SinkType::Unknown => &[],
    }
}
