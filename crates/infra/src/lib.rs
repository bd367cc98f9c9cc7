//! Infrastructure layer: configuration, catalog lookups, weight-range stores.

pub mod catalog;
pub mod config;
pub mod weight_ranges;


pub use config::{ConfigError, StorageConfig};
