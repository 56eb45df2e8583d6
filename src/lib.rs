//! carbonledger: activity records, carbon sinks, and net emission
//! calculations for mining operations.
//!
//! - [`emissions`]: factor table, typed records, calculation pipeline
//! - [`store`]: storage trait and in-memory implementation
//! - [`db`]: PostgreSQL implementation of the store
//! - [`api`]: Axum HTTP server
//! - [`prom_metrics`]: Prometheus registry

pub mod api;
pub mod db;
pub mod emissions;
pub mod prom_metrics;
pub mod store;
