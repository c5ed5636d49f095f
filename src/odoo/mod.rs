//! Odoo connector and XML-RPC plumbing

pub mod client;
pub mod domain;
pub mod xmlrpc;

pub use client::OdooConnector;
pub use domain::{Condition, Domain, Operator};

use crate::types::OdooError;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A record as returned by the server: field name to value, no local schema
pub type Record = Map<String, Value>;

/// Something that can answer `search_read` queries
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn search_read(
        &self,
        model: &str,
        domain: &Domain,
        fields: &[&str],
        limit: Option<u32>,
    ) -> Result<Vec<Record>, OdooError>;
}
