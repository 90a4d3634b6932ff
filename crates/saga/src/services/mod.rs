//! In-memory stand-ins for the external validation and allocation services.
//!
//! Both react to the order's customer reference so tests and demos can
//! steer a saga down any path.

pub mod allocation;
pub mod validation;

pub use allocation::InMemoryAllocationService;
pub use validation::InMemoryValidationService;

/// Validation answers "invalid".
pub const FAIL_VALIDATION: &str = "fail-validation";
/// Validation never answers.
pub const DONT_VALIDATE: &str = "dont-validate";
/// Allocation answers "pending inventory" with one unit short per line.
pub const PARTIAL_ALLOCATION: &str = "partial-allocation";
/// Allocation answers with an error.
pub const FAIL_ALLOCATION: &str = "fail-allocation";
/// Allocation never answers.
pub const DONT_ALLOCATE: &str = "dont-allocate";
