//! Error types for the transient driver.

use thiserror::Error;

/// Errors surfaced by the solver. Step-level variants carry the simulation
/// time, step size and Newton iteration count at the point of failure.
#[derive(Debug, Error)]
pub enum SolverError {
    /// LU factorization hit a pivot below threshold.
    #[error("singular matrix at t={t:.6e} s (dt={dt:.3e} s, newton iteration {iteration})")]
    SingularMatrix { t: f64, dt: f64, iteration: usize },

    /// The solution vector contains NaN or infinite entries.
    #[error("non-finite solution at t={t:.6e} s (dt={dt:.3e} s, newton iteration {iteration})")]
    NonFiniteSolution { t: f64, dt: f64, iteration: usize },

    /// The Newton loop exhausted its iteration budget.
    #[error(
        "newton iteration did not converge at t={t:.6e} s (dt={dt:.3e} s, \
         {iterations} iterations, residual {residual:.3e})"
    )]
    NewtonDiverged {
        t: f64,
        dt: f64,
        iterations: usize,
        residual: f64,
    },

    /// A single device exhausted its sub-iteration budget.
    #[error(
        "element `{element}` (index {index}) did not converge at t={t:.6e} s \
         (dt={dt:.3e} s, {iterations} sub-iterations)"
    )]
    ElementDiverged {
        element: String,
        index: usize,
        t: f64,
        dt: f64,
        iterations: usize,
    },

    /// Step halving bottomed out at the configured minimum.
    #[error("required step size below minimum {dt_min:.3e} s at t={t:.6e} s")]
    StepSizeFloor { t: f64, dt_min: f64 },

    /// The safety ceiling on total step count was reached.
    #[error("step-count ceiling ({max_steps}) reached at t={t:.6e} s")]
    StepCountCeiling { t: f64, max_steps: usize },

    /// Parameter access failed on a device.
    #[error(transparent)]
    Device(#[from] voltaic_devices::DeviceError),

    /// An element index past the end of the element list.
    #[error("no element with index {index}")]
    UnknownElement { index: usize },
}

impl SolverError {
    /// True for failures the driver may retry at a smaller step size.
    pub fn is_step_failure(&self) -> bool {
        matches!(
            self,
            SolverError::SingularMatrix { .. }
                | SolverError::NonFiniteSolution { .. }
                | SolverError::NewtonDiverged { .. }
                | SolverError::ElementDiverged { .. }
        )
    }
}

/// Result type for solver operations.
pub type Result<T> = std::result::Result<T, SolverError>;
