//! panel-sync - Control-panel synchronization for a hosting-reseller back office
//!
//! This crate provisions and reconciles locally-managed hosting records
//! against an external hosting control panel, with a durable retry queue
//! for recovering from transient failures.

pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod providers;
pub mod server;
pub mod sync;
