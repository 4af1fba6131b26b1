//! Policy error types.

use thiserror::Error;

/// Errors raised while building the policy.
///
/// Per-request operations never fail: a missing identity resolves to the
/// default identity, an unknown resource resolves to deny or pass-through.
/// The only error is a rule set that cannot be trusted, which is fatal at
/// process start.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// Static rule set is missing or contradictory.
    #[error("invalid policy configuration: {0}")]
    Configuration(String),
}

/// Result type for policy construction.
pub type Result<T> = std::result::Result<T, PolicyError>;

pub(crate) fn configuration(message: impl Into<String>) -> PolicyError {
    PolicyError::Configuration(message.into())
}
