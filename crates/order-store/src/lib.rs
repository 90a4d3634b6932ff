//! Persistence collaborators for the order saga.
//!
//! The saga only needs find/save-by-id semantics; this crate provides the
//! repository traits plus an in-memory implementation for tests and a
//! PostgreSQL implementation built on `sqlx`.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use error::{OrderStoreError, Result};
pub use memory::{InMemoryCustomerRepository, InMemoryOrderRepository};
pub use postgres::{PostgresCustomerRepository, PostgresOrderRepository};
pub use repository::{CustomerRepository, OrderRepository, PageRequest};
