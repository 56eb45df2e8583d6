//! # Emissions: Activity Records, Carbon Sinks, and Net Emission Calculation
//!
//! Converts a user's stored activity records into greenhouse-gas emissions
//! using a fixed emission factor table, nets them against carbon-sink
//! reductions, and shapes the aggregate and history payloads returned by
//! the API.
//!
//! ## Pipeline
//!
//! ```text
//! RecordStore (activity records + sinks for one user)
//!     ↓ per record (rayon, pure)
//! calculator: excavation / transportation / equipment / methane
//!     ↓ order-independent sums
//! aggregate: category totals, gross
//!     ↓ combined with sinks::total_reduction
//! report: net = max(0, gross − reductions), 2-decimal payloads
//! ```
//!
//! ## Module Structure
//!
//! - [`factors`]: Emission factor table with explicit per-map fallbacks
//! - [`records`]: Typed activity/sink records with fail-soft field parsing
//! - [`validation`]: Write-time required-field checks for incoming drafts
//! - [`calculator`]: Per-record category emissions
//! - [`aggregate`]: Order-independent summation across records
//! - [`sinks`]: Carbon-sink reduction model
//! - [`report`]: Net resolver and response payloads
//! - [`service`]: Store-backed aggregate and history operations

mod aggregate;
mod calculator;
mod factors;
mod records;
mod report;
mod service;
mod sinks;
mod validation;

pub use aggregate::*;
pub use calculator::*;
pub use factors::*;
pub use records::*;
pub use report::*;
pub use service::*;
pub use sinks::*;
pub use validation::*;
