//! Per-record emission calculator.
//!
//! Pure functions turning one activity record into four category quantities
//! (kg CO2e). Absent sub-sections contribute 0. Every category result is
//! clamped to a finite, non-negative value: NaN and negatives become 0 and
//! overflow saturates at `f64::MAX`.

use serde::Serialize;

use super::aggregate::saturating_sum;
use super::factors::FactorTable;
use super::records::{ActivityRecord, EquipmentUsage, Excavation, MethaneEntrapment, Transportation};

/// Flat per-unit term applied to transported coal mass.
pub const TRANSPORTED_COAL_COEFFICIENT: f64 = 0.1;

/// Emissions of one record (or an aggregate) split by source category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EmissionBreakdown {
    pub excavation: f64,
    pub transportation: f64,
    pub equipment: f64,
    pub methane: f64,
}

impl EmissionBreakdown {
    /// Sum of the four categories, saturating at `f64::MAX`.
    pub fn total(&self) -> f64 {
        saturating_sum([self.excavation, self.transportation, self.equipment, self.methane])
    }
}

/// Map NaN, negatives and -0.0 to +0.0; saturate +inf at `f64::MAX`.
pub fn non_negative(value: f64) -> f64 {
    if value > 0.0 {
        value.min(f64::MAX)
    } else {
        0.0
    }
}

pub fn excavation_emissions(e: &Excavation, factors: &FactorTable) -> f64 {
    let method = factors.excavation_method.lookup(e.method.as_deref());
    let fuel = factors
        .excavation_fuel
        .lookup_lowercase(e.fuel_type.as_deref());
    non_negative(e.coal_amount * factors.coal_factor() * method + e.distance * fuel)
}

pub fn transportation_emissions(t: &Transportation, factors: &FactorTable) -> f64 {
    let fuel = factors
        .transportation_fuel
        .lookup_lowercase(t.fuel_type.as_deref());
    let mode = factors.transportation_mode.lookup(t.mode.as_deref());
    non_negative(
        t.distance_per_trip * t.trips_per_day * fuel * mode
            + t.coal_transported * TRANSPORTED_COAL_COEFFICIENT,
    )
}

pub fn equipment_emissions(u: &EquipmentUsage, factors: &FactorTable) -> f64 {
    let fuel = factors.equipment_fuel.lookup_lowercase(u.fuel_type.as_deref());
    let kind = factors.equipment_type.lookup(u.equipment_type.as_deref());
    non_negative(u.operating_hours * u.fuel_consumption_per_hour * fuel * kind)
}

pub fn methane_emissions(m: &MethaneEntrapment, factors: &FactorTable) -> f64 {
    let efficiency = factors
        .utilization_efficiency
        .lookup(m.utilization_method.as_deref());
    let released = m.discharge_amount * (1.0 - m.capture_rate / 100.0);
    let unconverted = 1.0 - m.conversion_efficiency / 100.0 * efficiency;
    non_negative(released * factors.methane_gwp * unconverted)
}

/// Compute the four category emissions of one record.
pub fn record_emissions(record: &ActivityRecord, factors: &FactorTable) -> EmissionBreakdown {
    EmissionBreakdown {
        excavation: record
            .excavation
            .as_ref()
            .map_or(0.0, |e| excavation_emissions(e, factors)),
        transportation: record
            .transportation
            .as_ref()
            .map_or(0.0, |t| transportation_emissions(t, factors)),
        equipment: record
            .equipment_usage
            .as_ref()
            .map_or(0.0, |u| equipment_emissions(u, factors)),
        methane: record
            .methane_entrapment
            .as_ref()
            .map_or(0.0, |m| methane_emissions(m, factors)),
    }
}
