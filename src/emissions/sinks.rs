//! Carbon-sink reductions.

use super::aggregate::saturating_sum;
use super::records::{CarbonSinkRecord, SinkType};

/// kg CO2e sequestered per unit of afforested area.
pub const AFFORESTATION_SEQUESTRATION_RATE: f64 = 0.5;

/// Reduction credited to a single sink. Unknown types and missing payloads
/// credit nothing; declared values are passed through unclamped.
pub fn sink_reduction(sink: &CarbonSinkRecord) -> f64 {
    match sink.sink_type {
        SinkType::Afforestation => sink
            .afforestation
            .as_ref()
            .map_or(0.0, |a| a.area * AFFORESTATION_SEQUESTRATION_RATE),
        SinkType::BiodiversityConservation => sink
            .biodiversity_conservation
            .as_ref()
            .map_or(0.0, |b| b.carbon_sequestration),
        SinkType::GreenTechnology => sink
            .green_technology
            .as_ref()
            .map_or(0.0, |g| g.emission_reduction),
        SinkType::Unknown => 0.0,
    }
}

/// Order-independent total, clamped into the finite range.
pub fn total_reduction(sinks: &[CarbonSinkRecord]) -> f64 {
    saturating_sum(sinks.iter().map(sink_reduction))
}
