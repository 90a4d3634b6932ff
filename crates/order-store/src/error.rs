use common::{OrderId, Version};
use domain::DomainError;
use thiserror::Error;

/// Errors that can occur when reading or writing orders and customers.
#[derive(Debug, Error)]
pub enum OrderStoreError {
    /// The stored version did not match the version the caller read.
    #[error(
        "Concurrency conflict for order {order_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        order_id: OrderId,
        expected: Version,
        actual: Version,
    },

    /// A stored row violates a domain invariant.
    #[error("Corrupt record: {0}")]
    Domain(#[from] DomainError),

    /// A column value is outside the range its type can hold.
    #[error("Corrupt column {column}: {value}")]
    CorruptColumn { column: &'static str, value: i64 },

    /// The store refused the operation (used by the in-memory store's fault injection).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl OrderStoreError {
    /// Returns true if retrying the read-modify-write cycle may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, OrderStoreError::ConcurrencyConflict { .. })
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, OrderStoreError>;
