//! # Mean Well CAN Error Handling
//!
//! This module defines the MwCanError enum, which represents the different error
//! types that can occur in the mwcan-rs crate.
//!
//! Timeouts and replies from a foreign address are deliberately absent: they are
//! reported as "no reply" by the transport and codec and resolved to sentinel values
//! by the session.

use crate::can::address::DeviceVariant;
use thiserror::Error;

/// Represents the different error types that can occur in the mwcan crate.
#[derive(Debug, Error)]
pub enum MwCanError {
    /// Unknown or missing device profile, node id out of range, unusable limits file.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A variant-specific operation was issued against the other device variant.
    #[error("Operation {operation} is not supported by {variant}")]
    UnsupportedCommand {
        operation: &'static str,
        variant: DeviceVariant,
    },

    /// Reply length or marker not recognized, or a reply of the wrong shape.
    #[error("Error decoding reply: {0}")]
    ProtocolDecode(String),

    /// Bus unavailable, socket failure or link setup failure.
    #[error("CAN transport error: {0}")]
    Transport(String),

    /// Indicates a file access error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for MwCanError {
    fn from(err: serde_json::Error) -> Self {
        MwCanError::Configuration(format!("invalid limits file: {err}"))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MwCanError>;
