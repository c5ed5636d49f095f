//! Odoo connector
//!
//! Authenticates once against `/xmlrpc/2/common` and issues `search_read`
//! calls through `/xmlrpc/2/object`, resending the credentials on every call
//! as the XML-RPC API requires.

use crate::config::OdooSettings;
use crate::odoo::xmlrpc::XmlRpcClient;
use crate::odoo::{Domain, Record, RecordSource};
use crate::types::OdooError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const COMMON_PATH: &str = "/xmlrpc/2/common";
const OBJECT_PATH: &str = "/xmlrpc/2/object";

/// One session against an Odoo server
pub struct OdooConnector {
    settings: OdooSettings,

    /// Authentication endpoint
    common: XmlRpcClient,

    /// Model endpoint, present once authenticated
    models: Option<XmlRpcClient>,

    /// Authenticated user id
    uid: Option<i64>,
}

impl OdooConnector {
    pub fn new(settings: OdooSettings) -> Result<Self, OdooError> {
        let mut builder = Client::builder()
            .user_agent(format!("odoo-mcp/{}", env!("CARGO_PKG_VERSION")))
            .use_rustls_tls();

        if let Some(secs) = settings.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let http = builder
            .build()
            .map_err(|e| OdooError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let common = XmlRpcClient::new(http, endpoint(&settings.url, COMMON_PATH)?);

        Ok(Self {
            settings,
            common,
            models: None,
            uid: None,
        })
    }

    pub fn uid(&self) -> Option<i64> {
        self.uid
    }

    pub fn is_authenticated(&self) -> bool {
        self.uid.is_some() && self.models.is_some()
    }

    /// Two-step handshake: resolve the user id, then open the model endpoint.
    ///
    /// Any failure here is an [`OdooError::Authentication`] or
    /// [`OdooError::AuthenticationTransport`].
    pub async fn authenticate(&mut self) -> Result<i64, OdooError> {
        info!(
            "Authenticating as {} on database {} at {}",
            self.settings.username, self.settings.db, self.settings.url
        );

        let response = self
            .common
            .call(
                "authenticate",
                &[
                    json!(self.settings.db),
                    json!(self.settings.username),
                    json!(self.settings.password),
                    Value::Object(Map::new()),
                ],
            )
            .await
            .map_err(|e| OdooError::AuthenticationTransport(Box::new(e)))?;

        let uid = response.as_i64().filter(|uid| *uid > 0).ok_or_else(|| {
            OdooError::Authentication(format!(
                "server rejected credentials for '{}' on database '{}'",
                self.settings.username, self.settings.db
            ))
        })?;

        let object_url = endpoint(&self.settings.url, OBJECT_PATH)
            .map_err(|e| OdooError::AuthenticationTransport(Box::new(e)))?;
        // Both endpoints share one HTTP client
        self.models = Some(XmlRpcClient::new(self.common.http().clone(), object_url));
        self.uid = Some(uid);

        info!("Connected to Odoo as user ID: {}", uid);
        Ok(uid)
    }
}

fn endpoint(base: &Url, path: &str) -> Result<Url, OdooError> {
    base.join(path)
        .map_err(|e| OdooError::Config(format!("invalid endpoint {}{}: {}", base, path, e)))
}

#[async_trait]
impl RecordSource for OdooConnector {
    async fn search_read(
        &self,
        model: &str,
        domain: &Domain,
        fields: &[&str],
        limit: Option<u32>,
    ) -> Result<Vec<Record>, OdooError> {
        let (models, uid) = match (&self.models, self.uid) {
            (Some(models), Some(uid)) => (models, uid),
            _ => return Err(OdooError::NotConnected),
        };

        let mut kwargs = Map::new();
        if !fields.is_empty() {
            kwargs.insert("fields".to_string(), json!(fields));
        }
        if let Some(limit) = limit.filter(|l| *l > 0) {
            kwargs.insert("limit".to_string(), json!(limit));
        }

        debug!("search_read {} domain={:?} limit={:?}", model, domain.to_value(), limit);

        let response = models
            .call(
                "execute_kw",
                &[
                    json!(self.settings.db),
                    json!(uid),
                    json!(self.settings.password),
                    json!(model),
                    json!("search_read"),
                    Value::Array(vec![domain.to_value()]),
                    Value::Object(kwargs),
                ],
            )
            .await?;

        match response {
            Value::Array(rows) => rows
                .into_iter()
                .map(|row| match row {
                    Value::Object(record) => Ok(record),
                    other => Err(OdooError::InvalidResponse(format!(
                        "expected record struct, found {}",
                        other
                    ))),
                })
                .collect(),
            other => Err(OdooError::InvalidResponse(format!(
                "search_read on {} returned {}",
                model, other
            ))),
        }
    }
}
