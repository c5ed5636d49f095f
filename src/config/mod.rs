//! Configuration system for odoo-mcp
//!
//! Connection settings come from two layers:
//! 1. Command line flags / environment (highest priority)
//! 2. A TOML config file

mod loader;
mod settings;

pub use loader::ConfigLoader;
pub use settings::{OdooSettings, PartialSettings};
