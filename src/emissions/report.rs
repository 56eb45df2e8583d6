//! Net emissions and response payloads.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Reverse;

use super::aggregate::{aggregate, saturate};
use super::calculator::{record_emissions, EmissionBreakdown};
use super::factors::FactorTable;
use super::records::{ActivityRecord, CarbonSinkRecord};
use super::sinks::total_reduction;

pub const UNIT: &str = "kg CO2e";

/// Gross minus reductions, floored at zero and saturating at `f64::MAX`.
pub fn net_emissions(gross: f64, reductions: f64) -> f64 {
    saturate(gross - reductions).max(0.0) + 0.0
}

/// Fixed two-decimal rendering. Negative zero prints as "0.00".
pub fn format_quantity(value: f64) -> String {
    let s = format!("{:.2}", value);
    if s == "-0.00" {
        "0.00".to_string()
    } else {
        s
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFigures {
    pub excavation: String,
    pub transportation: String,
    pub equipment: String,
    pub methane: String,
}

impl From<&EmissionBreakdown> for SourceFigures {
    fn from(b: &EmissionBreakdown) -> Self {
        SourceFigures {
            excavation: format_quantity(b.excavation),
            transportation: format_quantity(b.transportation),
            equipment: format_quantity(b.equipment),
            methane: format_quantity(b.methane),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryFigures {
    pub gross_emissions: String,
    pub sink_reductions: String,
    pub net_emissions: String,
}

/// Payload of the aggregate calculation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    pub emissions_by_source: SourceFigures,
    pub summary: SummaryFigures,
    pub unit: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFigures {
    #[serde(flatten)]
    pub by_source: SourceFigures,
    pub total: String,
}

/// One per-record entry of the history payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub emissions: RecordFigures,
    pub unit: &'static str,
}

/// Unformatted result of an aggregate calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calculation {
    pub totals: EmissionBreakdown,
    pub gross: f64,
    pub reductions: f64,
    pub net: f64,
}

impl Calculation {
    pub fn report(&self) -> AggregateReport {
        AggregateReport {
            emissions_by_source: SourceFigures::from(&self.totals),
            summary: SummaryFigures {
                gross_emissions: format_quantity(self.gross),
                sink_reductions: format_quantity(self.reductions),
                net_emissions: format_quantity(self.net),
            },
            unit: UNIT,
        }
    }
}

/// Aggregate all records and net them against all sinks.
///
/// Per-record work runs on the rayon pool; aggregation is order-independent,
/// so the result matches a sequential run bit for bit.
pub fn calculate(
    records: &[ActivityRecord],
    sinks: &[CarbonSinkRecord],
    factors: &FactorTable,
) -> Calculation {
    let breakdowns: Vec<EmissionBreakdown> = records
        .par_iter()
        .map(|r| record_emissions(r, factors))
        .collect();
    let totals = aggregate(&breakdowns);
    let gross = totals.total();
    let reductions = total_reduction(sinks);
    Calculation {
        totals,
        gross,
        reductions,
        net: net_emissions(gross, reductions),
    }
}

/// Per-record breakdowns, newest first (ties broken by id, descending).
pub fn history(records: &[ActivityRecord], factors: &FactorTable) -> Vec<HistoryEntry> {
    let mut ordered: Vec<&ActivityRecord> = records.iter().collect();
    ordered.sort_by_key(|r| (Reverse(r.created_at), Reverse(r.id)));
    ordered
        .par_iter()
        .map(|r| {
            let b = record_emissions(r, factors);
            HistoryEntry {
                id: r.id,
                date: r.created_at,
                emissions: RecordFigures {
                    by_source: SourceFigures::from(&b),
                    total: format_quantity(b.total()),
                },
                unit: UNIT,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_is_floored_at_zero() {
        assert_eq!(net_emissions(10.0, 25.0), 0.0);
        assert_eq!(net_emissions(25.0, 10.0), 15.0);
        assert_eq!(net_emissions(f64::INFINITY, f64::INFINITY), 0.0);
    }

    #[test]
    fn overflowing_net_saturates_instead_of_vanishing() {
        assert_eq!(net_emissions(f64::INFINITY, 0.0), f64::MAX);
        assert_eq!(net_emissions(f64::MAX, -f64::MAX), f64::MAX);
        assert_eq!(net_emissions(f64::MAX, 0.0), f64::MAX);
        assert_eq!(net_emissions(0.0, f64::INFINITY), 0.0);
    }

    #[test]
    fn negative_reductions_increase_net() {
        assert_eq!(net_emissions(10.0, -5.0), 15.0);
    }

    #[test]
    fn formatting_uses_two_decimals() {
        assert_eq!(format_quantity(42.44), "42.44");
        assert_eq!(format_quantity(1075.0), "1075.00");
        assert_eq!(format_quantity(0.0), "0.00");
        assert_eq!(format_quantity(-0.0), "0.00");
        assert_eq!(format_quantity(-0.001), "0.00");
    }

    #[test]
    fn empty_input_reports_zeros() {
        let report = calculate(&[], &[], &FactorTable::standard()).report();
        assert_eq!(report.emissions_by_source.excavation, "0.00");
        assert_eq!(report.emissions_by_source.methane, "0.00");
        assert_eq!(report.summary.net_emissions, "0.00");
        assert_eq!(report.unit, "kg CO2e");
    }

    #[test]
    fn history_entry_serializes_flat_emissions() {
        let entries = history(&[ActivityRecord::empty(3, 1)], &FactorTable::standard());
        let v = serde_json::to_value(&entries[0]).unwrap();
        assert_eq!(v["id"], 3);
        assert_eq!(v["emissions"]["total"], "0.00");
        assert_eq!(v["emissions"]["equipment"], "0.00");
        assert_eq!(v["unit"], "kg CO2e");
    }
}
