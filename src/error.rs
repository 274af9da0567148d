// ============================================================================
// error.rs - physarum
// Simulation error taxonomy.
// ============================================================================

use thiserror::Error;

/// Errors the simulation core can report to its host.
///
/// None of these are retried internally. `InvalidConfiguration` and
/// `ResourceAllocationFailure` leave the instance uninitialized;
/// `TickExecutionFailure` is fatal to the running instance and every further
/// `tick`/`render` call fails until the host reinitializes.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("GPU resource allocation failed: {0}")]
    ResourceAllocationFailure(String),

    #[error("tick execution failed: {0}")]
    TickExecutionFailure(String),
}
