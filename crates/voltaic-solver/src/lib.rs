//! Transient driver and solvers for Voltaic.
//!
//! This crate owns the outer time loop, the damped Newton iteration with
//! per-device convergence tracking and element sub-iteration recovery, the
//! residual-driven step-size policy, and the dense/sparse linear solve
//! behind each Newton iteration.

pub mod error;
pub mod linear;
pub mod transient;

pub use error::{Result, SolverError};
pub use transient::driver::Simulator;
pub use transient::result::{TimePoint, TransientResult};
pub use transient::time::{SolverConfig, TimeState};

pub use voltaic_devices::IntegrationMethod;
