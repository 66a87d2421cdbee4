//! Error types for the storage, cache and service layers.

use bid_policy_types::{DocumentError, MARKETPLACES, POLICY_TYPES, RuleError};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Email,
    Uuid,
    Password,
}

impl FormatKind {
    fn requirement(&self) -> &'static str {
        match self {
            FormatKind::Email => "must be valid email address(es)",
            FormatKind::Uuid => "must be valid UUID(s)",
            FormatKind::Password => "must be at least 8 characters",
        }
    }
}

/// Comma separated field list as it appears in rejection messages.
pub struct FieldList<'a>(pub &'a [String]);

impl fmt::Display for FieldList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

/// Request payload rejections. Each variant except `Rules` names every
/// offending field of the stage that failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("{} required", FieldList(.0))]
    MissingRequiredField(Vec<String>),
    #[error("{} {}", FieldList(.fields), .kind.requirement())]
    InvalidFormat { kind: FormatKind, fields: Vec<String> },
    #[error("{} must be one of: {}", FieldList(.0), MARKETPLACES.join(", "))]
    InvalidMarketplace(Vec<String>),
    #[error("{} must be one of: {}", FieldList(.0), POLICY_TYPES.join(", "))]
    InvalidRuleSetType(Vec<String>),
    #[error(transparent)]
    Rules(#[from] RuleError),
}

impl FieldError {
    pub fn fields(&self) -> &[String] {
        match self {
            FieldError::MissingRequiredField(fields)
            | FieldError::InvalidFormat { fields, .. }
            | FieldError::InvalidMarketplace(fields)
            | FieldError::InvalidRuleSetType(fields) => fields,
            FieldError::Rules(_) => &[],
        }
    }
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("document store error: {0}")]
    Backend(String),
    #[error("policy {id}: decode rules: {source}")]
    CorruptDocument { id: String, source: DocumentError },
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(e: rusqlite::Error) -> Self {
        RepositoryError::Backend(e.to_string())
    }
}

impl From<r2d2::Error> for RepositoryError {
    fn from(e: r2d2::Error) -> Self {
        RepositoryError::Backend(format!("connection pool: {}", e))
    }
}

/// Cache failures never reach callers of the service; they are logged and
/// the request falls back to the repository.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("operation cancelled: deadline exceeded")]
    Cancelled,
}
