//! Dashboard service for Roundtable: start research runs, watch progress,
//! browse history, aggregate analytics, download exports.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;
