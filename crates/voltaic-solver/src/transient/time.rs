//! Time, iteration and convergence bookkeeping.

use voltaic_devices::IntegrationMethod;

/// Solver policy knobs, gathered in one place.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Smallest step size the halving retry may reach (s).
    pub dt_min: f64,
    /// Largest step size growth may reach (s).
    pub dt_max: f64,
    /// Newton iteration budget per step.
    pub max_newton_iter: usize,
    /// Sub-iteration budget for one diverging element.
    pub max_elem_iter: usize,
    /// Safety ceiling on total accepted steps per run.
    pub max_steps: usize,
    /// Absolute residual tolerance.
    pub tol_abs: f64,
    /// Relative residual tolerance (scaled by the solution norm).
    pub tol_rel: f64,
    /// Depth of the residual history window driving step adaptation.
    pub history_depth: usize,
    /// Integration rule applied to every reactive companion model.
    pub method: IntegrationMethod,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            dt_min: 1e-12,
            dt_max: 1.0,
            max_newton_iter: 50,
            max_elem_iter: 100,
            max_steps: 10_000_000,
            tol_abs: 1e-9,
            tol_rel: 1e-6,
            history_depth: 4,
            method: IntegrationMethod::Trapezoidal,
        }
    }
}

impl SolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: IntegrationMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_step_bounds(mut self, dt_min: f64, dt_max: f64) -> Self {
        self.dt_min = dt_min;
        self.dt_max = dt_max;
        self
    }

    pub fn with_tolerances(mut self, tol_abs: f64, tol_rel: f64) -> Self {
        self.tol_abs = tol_abs;
        self.tol_rel = tol_rel;
        self
    }

    pub fn with_max_newton_iter(mut self, max: usize) -> Self {
        self.max_newton_iter = max;
        self
    }

    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = max;
        self
    }
}

/// Mutable per-run state of the time loop.
#[derive(Debug, Clone)]
pub struct TimeState {
    /// Current simulation time (start of the step being computed).
    pub t: f64,
    /// Current step size.
    pub dt: f64,
    /// Consecutive accepted steps since the last rejection.
    pub good_iters: usize,
    /// Newton iterations spent on the current step.
    pub newton_iter: usize,
    /// Residual norm of the last solve.
    pub residual_norm: f64,
    /// Accepted steps so far.
    pub step_count: usize,
    /// The linear snapshot must be rebuilt before the next step.
    pub need_linear_stamp: bool,
    /// Recent accepted-step residual norms, oldest first.
    residual_history: Vec<f64>,
    history_depth: usize,
}

impl TimeState {
    pub fn new(config: &SolverConfig, dt_initial: f64) -> Self {
        Self {
            t: 0.0,
            dt: dt_initial.clamp(config.dt_min, config.dt_max),
            good_iters: 0,
            newton_iter: 0,
            residual_norm: 0.0,
            step_count: 0,
            need_linear_stamp: true,
            residual_history: Vec::with_capacity(config.history_depth),
            history_depth: config.history_depth,
        }
    }

    /// Append an accepted-step residual, keeping the window bounded.
    pub fn record_residual(&mut self, norm: f64) {
        if self.residual_history.len() == self.history_depth {
            self.residual_history.remove(0);
        }
        self.residual_history.push(norm);
    }

    /// Drop the history, e.g. after a step-size change.
    pub fn clear_history(&mut self) {
        self.residual_history.clear();
    }

    /// True when the window is full and strictly monotonically growing.
    pub fn residuals_growing(&self) -> bool {
        self.residual_history.len() == self.history_depth
            && self
                .residual_history
                .windows(2)
                .all(|w| w[1] > w[0])
    }

    /// True when the window is full, non-increasing, and every entry sits
    /// well below `tol`.
    pub fn residuals_quiet(&self, tol: f64) -> bool {
        self.residual_history.len() == self.history_depth
            && self.residual_history.iter().all(|&r| r < 0.1 * tol)
            && self.residual_history.windows(2).all(|w| w[1] <= w[0])
    }
}
