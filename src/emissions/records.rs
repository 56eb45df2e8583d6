//! Typed activity and carbon-sink records.
//!
//! Records are read back from JSON columns that were validated on write, but
//! the calculator cannot assume that validation ran. Every field therefore
//! parses fail-soft: numbers accept JSON numbers or numeric strings and
//! degrade to 0 otherwise, text fields degrade to `None`, and a sub-section
//! that is not a JSON object is treated as absent.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

pub(crate) mod lenient {
    use super::*;

    pub(crate) fn number_from_value(value: &Value) -> f64 {
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
    }

    pub(crate) fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(number_from_value(&value))
    }

    pub(crate) fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        match Value::deserialize(d)? {
            Value::String(s) => Ok(Some(s)),
            _ => Ok(None),
        }
    }

    pub(crate) fn section_from_value<T: DeserializeOwned>(value: Option<Value>) -> Option<T> {
        match value {
            Some(v @ Value::Object(_)) => serde_json::from_value(v).ok(),
            _ => None,
        }
    }

    pub(crate) fn section<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Option::<Value>::deserialize(d)?;
        Ok(section_from_value(value))
    }
}

// ── Activity sub-sections ───────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Excavation {
    #[serde(deserialize_with = "lenient::number")]
    pub coal_amount: f64,
    #[serde(deserialize_with = "lenient::text")]
    pub fuel_type: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub distance: f64,
    #[serde(deserialize_with = "lenient::text")]
    pub method: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub equipment_used: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transportation {
    #[serde(deserialize_with = "lenient::number")]
    pub coal_transported: f64,
    #[serde(deserialize_with = "lenient::text")]
    pub fuel_type: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub distance_per_trip: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub trips_per_day: f64,
    #[serde(deserialize_with = "lenient::text")]
    pub mode: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub vehicle_capacity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EquipmentUsage {
    #[serde(deserialize_with = "lenient::number")]
    pub operating_hours: f64,
    #[serde(deserialize_with = "lenient::text")]
    pub fuel_type: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub fuel_consumption_per_hour: f64,
    #[serde(rename = "type", deserialize_with = "lenient::text")]
    pub equipment_type: Option<String>,
}

/// `capture_rate` and `conversion_efficiency` are percentages (0–100).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MethaneEntrapment {
    #[serde(deserialize_with = "lenient::number")]
    pub discharge_amount: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub capture_rate: f64,
    #[serde(deserialize_with = "lenient::text")]
    pub utilization_method: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub conversion_efficiency: f64,
}

/// One emission-generating activity record owned by a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default, deserialize_with = "lenient::section")]
    pub excavation: Option<Excavation>,
    #[serde(default, deserialize_with = "lenient::section")]
    pub transportation: Option<Transportation>,
    #[serde(default, deserialize_with = "lenient::section")]
    pub equipment_usage: Option<EquipmentUsage>,
    #[serde(default, deserialize_with = "lenient::section")]
    pub methane_entrapment: Option<MethaneEntrapment>,
    #[serde(alias = "date", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ActivityRecord {
    /// A record with no sub-sections, created now.
    pub fn empty(id: i64, user_id: i64) -> Self {
        ActivityRecord {
            id,
            user_id,
            excavation: None,
            transportation: None,
            equipment_usage: None,
            methane_entrapment: None,
            created_at: Utc::now(),
        }
    }

    /// Build a record from raw JSON sub-sections as stored in the database.
    pub fn from_stored(
        id: i64,
        user_id: i64,
        excavation: Option<Value>,
        transportation: Option<Value>,
        equipment_usage: Option<Value>,
        methane_entrapment: Option<Value>,
        created_at: DateTime<Utc>,
    ) -> Self {
        ActivityRecord {
            id,
            user_id,
            excavation: lenient::section_from_value(excavation),
            transportation: lenient::section_from_value(transportation),
            equipment_usage: lenient::section_from_value(equipment_usage),
            methane_entrapment: lenient::section_from_value(methane_entrapment),
            created_at,
        }
    }
}

// ── Carbon sinks ────────────────────────────────────────────────

/// The closed set of carbon-sink types. Anything else parses as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SinkType {
    Afforestation,
    BiodiversityConservation,
    GreenTechnology,
    #[default]
    Unknown,
}

impl SinkType {
    pub const ALL: [SinkType; 3] = [
        SinkType::Afforestation,
        SinkType::BiodiversityConservation,
        SinkType::GreenTechnology,
    ];

    /// Parse the exact label used on the wire and in storage.
    pub fn from_label(label: &str) -> Option<SinkType> {
        match label {
            "Afforestation" => Some(SinkType::Afforestation),
            "Biodiversity Conservation" => Some(SinkType::BiodiversityConservation),
            "Green Technology" => Some(SinkType::GreenTechnology),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SinkType::Afforestation => "Afforestation",
            SinkType::BiodiversityConservation => "Biodiversity Conservation",
            SinkType::GreenTechnology => "Green Technology",
            SinkType::Unknown => "Unknown",
        }
    }

    /// The camelCase field carrying this type's payload.
    pub fn payload_field(&self) -> &'static str {
        match self {
            SinkType::Afforestation => "afforestation",
            SinkType::BiodiversityConservation => "biodiversityConservation",
            SinkType::GreenTechnology => "greenTechnology",
            SinkType::Unknown => "",
        }
    }
}

impl std::fmt::Display for SinkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Serialize for SinkType {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for SinkType {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(value
            .as_str()
            .and_then(SinkType::from_label)
            .unwrap_or(SinkType::Unknown))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Afforestation {
    #[serde(deserialize_with = "lenient::number")]
    pub area: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub tree_planting_rate: f64,
    #[serde(deserialize_with = "lenient::text")]
    pub tree_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BiodiversityConservation {
    #[serde(deserialize_with = "lenient::number")]
    pub area: f64,
    #[serde(deserialize_with = "lenient::text")]
    pub habitat_type: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub carbon_sequestration: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GreenTechnology {
    #[serde(deserialize_with = "lenient::text")]
    pub technology_type: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub emission_reduction: f64,
    #[serde(deserialize_with = "lenient::text")]
    pub energy_source: Option<String>,
}

/// A carbon-offsetting record owned by a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarbonSinkRecord {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub user_id: i64,
    #[serde(rename = "type", default)]
    pub sink_type: SinkType,
    #[serde(default)]
    pub location: String,
    #[serde(default = "Utc::now")]
    pub creation_date: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient::section")]
    pub afforestation: Option<Afforestation>,
    #[serde(default, deserialize_with = "lenient::section")]
    pub biodiversity_conservation: Option<BiodiversityConservation>,
    #[serde(default, deserialize_with = "lenient::section")]
    pub green_technology: Option<GreenTechnology>,
}

impl CarbonSinkRecord {
    /// Build a record from the stored type label and raw JSON payloads.
    #[allow(clippy::too_many_arguments)]
    pub fn from_stored(
        id: i64,
        user_id: i64,
        sink_type: &str,
        location: String,
        creation_date: DateTime<Utc>,
        afforestation: Option<Value>,
        biodiversity_conservation: Option<Value>,
        green_technology: Option<Value>,
    ) -> Self {
        CarbonSinkRecord {
            id,
            user_id,
            sink_type: SinkType::from_label(sink_type).unwrap_or(SinkType::Unknown),
            location,
            creation_date,
            afforestation: lenient::section_from_value(afforestation),
            biodiversity_conservation: lenient::section_from_value(biodiversity_conservation),
            green_technology: lenient::section_from_value(green_technology),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_strings_are_parsed() {
        let e: Excavation =
            serde_json::from_value(json!({"coalAmount": "12.5", "distance": " 3 "})).unwrap();
        assert_eq!(e.coal_amount, 12.5);
        assert_eq!(e.distance, 3.0);
    }

    #[test]
    fn malformed_numbers_become_zero() {
        let t: Transportation = serde_json::from_value(json!({
            "coalTransported": "lots",
            "distancePerTrip": null,
            "tripsPerDay": [1, 2],
            "vehicleCapacity": {"t": 40},
            "mode": "Truck"
        }))
        .unwrap();
        assert_eq!(t.coal_transported, 0.0);
        assert_eq!(t.distance_per_trip, 0.0);
        assert_eq!(t.trips_per_day, 0.0);
        assert_eq!(t.vehicle_capacity, 0.0);
        assert_eq!(t.mode.as_deref(), Some("Truck"));
    }

    #[test]
    fn non_string_text_fields_become_none() {
        let u: EquipmentUsage =
            serde_json::from_value(json!({"fuelType": 42, "type": true})).unwrap();
        assert_eq!(u.fuel_type, None);
        assert_eq!(u.equipment_type, None);
    }

    #[test]
    fn non_object_section_is_treated_as_absent() {
        let r: ActivityRecord = serde_json::from_value(json!({
            "id": 7,
            "excavation": "broken",
            "methaneEntrapment": {"dischargeAmount": 10},
            "createdAt": "2024-03-01T00:00:00Z"
        }))
        .unwrap();
        assert!(r.excavation.is_none());
        assert_eq!(r.methane_entrapment.unwrap().discharge_amount, 10.0);
    }

    #[test]
    fn date_alias_is_accepted_for_created_at() {
        let r: ActivityRecord =
            serde_json::from_value(json!({"date": "2023-06-15T12:00:00Z"})).unwrap();
        assert_eq!(r.created_at.to_rfc3339(), "2023-06-15T12:00:00+00:00");
    }

    #[test]
    fn sink_type_labels_round_trip() {
        for t in SinkType::ALL {
            assert_eq!(SinkType::from_label(t.label()), Some(t));
        }
        assert_eq!(SinkType::from_label("afforestation"), None);
    }

    #[test]
    fn unknown_sink_type_deserializes_as_unknown() {
        let s: CarbonSinkRecord =
            serde_json::from_value(json!({"type": "Ocean Fertilization"})).unwrap();
        assert_eq!(s.sink_type, SinkType::Unknown);
        let s: CarbonSinkRecord = serde_json::from_value(json!({})).unwrap();
        assert_eq!(s.sink_type, SinkType::Unknown);
    }

    #[test]
    fn from_stored_parses_payloads_leniently() {
        let s = CarbonSinkRecord::from_stored(
            1,
            2,
            "Afforestation",
            "Jharia".into(),
            Utc::now(),
            Some(json!({"area": "40", "treePlantingRate": 3, "treeType": "Teak"})),
            None,
            Some(json!(12)),
        );
        assert_eq!(s.sink_type, SinkType::Afforestation);
        assert_eq!(s.afforestation.unwrap().area, 40.0);
        assert!(s.green_technology.is_none());
    }
}
