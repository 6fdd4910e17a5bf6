use thiserror::Error;

use innkeep_core::DomainError;

/// Persistence failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// An optimistic version check failed; reload and retry.
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvoicingError {
    #[error("invoicing collaborator rejected the submission: {0}")]
    Rejected(String),

    #[error("invoicing collaborator unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Invoicing(#[from] InvoicingError),
}

impl EngineError {
    /// Only store-level version conflicts are worth retrying against fresh state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Store(StoreError::Conflict(_)))
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        EngineError::Domain(DomainError::not_found(what))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_store_conflicts_are_retryable() {
        assert!(EngineError::from(StoreError::Conflict("v".into())).is_retryable());
        assert!(!EngineError::from(DomainError::conflict("occupied")).is_retryable());
        assert!(!EngineError::from(StoreError::Unavailable("down".into())).is_retryable());
    }
}
