//! odoo-mcp - Model Context Protocol server for Odoo
//!
//! Exposes read-only Odoo queries (customers, products, sale orders, users)
//! as MCP tools. A single [`OdooConnector`] authenticates once over XML-RPC
//! and the MCP layer renders its records as text for the agent host.

pub mod config;
pub mod mcp;
pub mod odoo;
pub mod types;

pub use config::{ConfigLoader, OdooSettings};
pub use mcp::McpServer;
pub use odoo::{OdooConnector, RecordSource};
pub use types::OdooError;
