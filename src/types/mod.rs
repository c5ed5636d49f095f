//! Shared types

pub mod errors;

pub use errors::OdooError;
