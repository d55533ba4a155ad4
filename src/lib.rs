//! Inline traffic-defense layer: attack classification, graduated
//! countermeasures and capacity-aware load distribution.

pub mod api;
pub mod config;
pub mod core;
pub mod models;
