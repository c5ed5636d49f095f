//! Connection settings

use crate::types::OdooError;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// One configuration layer; every key is optional so layers can be merged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialSettings {
    pub url: Option<String>,
    pub db: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl PartialSettings {
    /// Fill keys missing from `self` with those of `lower`
    pub fn merge(self, lower: PartialSettings) -> PartialSettings {
        PartialSettings {
            url: self.url.or(lower.url),
            db: self.db.or(lower.db),
            username: self.username.or(lower.username),
            password: self.password.or(lower.password),
            timeout_secs: self.timeout_secs.or(lower.timeout_secs),
        }
    }
}

/// Validated settings for one Odoo session
#[derive(Clone)]
pub struct OdooSettings {
    pub url: Url,
    pub db: String,
    pub username: String,
    pub password: String,
    pub timeout_secs: Option<u64>,
}

impl fmt::Debug for OdooSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OdooSettings")
            .field("url", &self.url.as_str())
            .field("db", &self.db)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn required(value: Option<String>, key: &str, env: &str) -> Result<String, OdooError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(OdooError::Config(format!(
            "missing '{}' (set {} or add it to the config file)",
            key, env
        ))),
    }
}

impl TryFrom<PartialSettings> for OdooSettings {
    type Error = OdooError;

    fn try_from(partial: PartialSettings) -> Result<Self, Self::Error> {
        let raw_url = required(partial.url, "url", "ODOO_URL")?;
        let db = required(partial.db, "db", "ODOO_DB")?;
        let username = required(partial.username, "username", "ODOO_USER")?;
        let password = required(partial.password, "password", "ODOO_PASSWORD")?;

        let url = Url::parse(raw_url.trim())
            .map_err(|e| OdooError::Config(format!("invalid url '{}': {}", raw_url, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(OdooError::Config(format!(
                "unsupported url scheme '{}' (expected http or https)",
                url.scheme()
            )));
        }

        if url.host_str().is_none() {
            return Err(OdooError::Config(format!("url '{}' has no host", raw_url)));
        }

        Ok(Self {
            url,
            db,
            username,
            password,
            timeout_secs: partial.timeout_secs.filter(|t| *t > 0),
        })
    }
}
