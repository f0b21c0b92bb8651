// ============================================================================
// Order Domain
// ============================================================================
//
// - Value objects: field rules for product name and price
// - Errors: OrderError, the user-visible taxonomy
// - Orchestrator: validate -> check user -> persist -> notify
//
// ============================================================================

pub mod errors;
pub mod orchestrator;
pub mod value_objects;

// Re-export for convenience
pub use errors::*;
pub use orchestrator::*;
pub use value_objects::*;
