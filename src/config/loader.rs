//! Configuration loader with layered precedence
//!
//! Priority order (highest to lowest):
//! 1. Command line flags and environment (ODOO_URL, ODOO_DB, ODOO_USER, ODOO_PASSWORD)
//! 2. Config file (--config, ./.odoo-mcp.toml, $ODOO_MCP_CONFIG or ~/.config/odoo-mcp/config.toml)

use crate::config::{OdooSettings, PartialSettings};
use crate::types::OdooError;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct ConfigLoader {
    file: Option<PartialSettings>,
    source: Option<PathBuf>,
}

impl ConfigLoader {
    /// Load the config file, if any.
    ///
    /// An explicit path must exist; otherwise the standard locations are searched.
    pub fn new(explicit: Option<PathBuf>) -> Result<Self, OdooError> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(OdooError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                let file = Self::load_file(&path)?;
                Ok(Self {
                    file: Some(file),
                    source: Some(path),
                })
            }
            None => Self::from_candidates(&Self::candidates()),
        }
    }

    /// Load the first existing file among `candidates`
    pub fn from_candidates(candidates: &[PathBuf]) -> Result<Self, OdooError> {
        for path in candidates {
            if path.exists() {
                let file = Self::load_file(path)?;
                return Ok(Self {
                    file: Some(file),
                    source: Some(path.clone()),
                });
            }
        }

        debug!("No config file found");
        Ok(Self {
            file: None,
            source: None,
        })
    }

    fn candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join(".odoo-mcp.toml"));
        }

        if let Ok(config_path) = std::env::var("ODOO_MCP_CONFIG") {
            candidates.push(PathBuf::from(config_path));
        }

        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("odoo-mcp").join("config.toml"));
        }

        candidates
    }

    fn load_file(path: &Path) -> Result<PartialSettings, OdooError> {
        debug!("Loading config from: {}", path.display());
        let content = std::fs::read_to_string(path)
            .map_err(|e| OdooError::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| OdooError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Path of the loaded config file
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Merge `overrides` over the file layer and validate
    pub fn resolve(&self, overrides: PartialSettings) -> Result<OdooSettings, OdooError> {
        let merged = match &self.file {
            Some(file) => overrides.merge(file.clone()),
            None => overrides,
        };
        OdooSettings::try_from(merged)
    }
}
