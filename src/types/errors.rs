use thiserror::Error;

#[derive(Error, Debug)]
pub enum OdooError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authentication failed: {0}")]
    AuthenticationTransport(#[source] Box<OdooError>),

    #[error("Not connected to Odoo")]
    NotConnected,

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("XML-RPC fault {code}: {message}")]
    Fault { code: i64, message: String },

    #[error("Invalid XML-RPC response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl OdooError {
    /// Whether this error means the session never authenticated
    pub fn is_not_connected(&self) -> bool {
        matches!(self, OdooError::NotConnected)
    }
}
