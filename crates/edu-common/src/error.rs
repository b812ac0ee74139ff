//! Error types shared across the workspace

use thiserror::Error;

/// Errors raised while interpreting shared identity data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Role string does not name any known role
    #[error("unrecognized role: {0}")]
    UnrecognizedRole(String),
}
