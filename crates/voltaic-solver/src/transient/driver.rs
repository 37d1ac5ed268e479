//! The transient driver: outer time loop, Newton iteration with per-device
//! convergence tracking, element sub-iteration recovery and residual-driven
//! step-size adaptation.
//!
//! One accepted step runs:
//!
//! 1. Roll the system back to the linear snapshot (or rebuild it when the
//!    step size or a parameter changed).
//! 2. `start_iteration` on every device, turning the previous converged
//!    solution into companion history.
//! 3. Newton loop: rollback, `do_step` on every device, LU solve, residual
//!    check. Devices that keep moving get a bounded sub-iteration pass
//!    before the step is declared diverged.
//! 4. On convergence: `calculate_current`, `step_finished`, checkpoint all
//!    scratch, deliver node voltages to the observer.
//! 5. Rejected steps restore scratch and solution, halve `dt` and retry
//!    down to the configured floor.

use voltaic_core::{MnaSystem, NodeId, Value, VoltageSourceId};
use voltaic_devices::{Device, Element, ParamChange, StepStatus};

use crate::error::{Result, SolverError};
use crate::linear::{self, LinearError};

use super::result::{TimePoint, TransientResult};
use super::time::{SolverConfig, TimeState};

/// A transient circuit simulator: the MNA system plus the device list,
/// driven through the lifecycle hooks.
#[derive(Debug)]
pub struct Simulator {
    mna: MnaSystem,
    elements: Vec<Element>,
    config: SolverConfig,
    time: TimeState,
}

impl Simulator {
    /// Build a simulator over a fully-resolved element list.
    ///
    /// `num_nodes` counts external plus internal nodes; `num_vsources`
    /// counts every auxiliary branch any device requested.
    pub fn new(
        num_nodes: usize,
        num_vsources: usize,
        mut elements: Vec<Element>,
        config: SolverConfig,
    ) -> Self {
        for e in &mut elements {
            e.set_integration_method(config.method);
            e.reset();
            e.save_state();
        }
        let time = TimeState::new(&config, config.dt_min);
        Self {
            mna: MnaSystem::new(num_nodes, num_vsources),
            elements,
            config,
            time,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.mna.num_nodes()
    }

    pub fn num_vsources(&self) -> usize {
        self.mna.num_vsources()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Time-loop state of the last (or current) run.
    pub fn time(&self) -> &TimeState {
        &self.time
    }

    /// Voltage at a node in the latest solution (0.0 for ground).
    pub fn node_voltage(&self, node: NodeId) -> f64 {
        self.mna.node_voltage(node)
    }

    /// Branch current of a voltage source in the latest solution.
    pub fn voltage_source_current(&self, vs: VoltageSourceId) -> f64 {
        self.mna.vsource_current(vs)
    }

    /// Observe a device scratch slot (cached currents, internal state).
    pub fn element_scratch(&self, element: usize, slot: usize) -> Option<Value> {
        self.elements.get(element).and_then(|e| e.scratch(slot))
    }

    /// Update a device parameter between runs. Devices advertising
    /// [`ParamChange::NeedsRestamp`] invalidate the linear snapshot.
    pub fn set_element_param(&mut self, element: usize, key: &str, value: &Value) -> Result<()> {
        let e = self
            .elements
            .get_mut(element)
            .ok_or(SolverError::UnknownElement { index: element })?;
        if e.set_param(key, value)? == ParamChange::NeedsRestamp {
            self.time.need_linear_stamp = true;
        }
        Ok(())
    }

    /// Run a transient simulation from `t = 0` to `t_end`, delivering the
    /// non-ground node voltages to `on_step` after every accepted step.
    pub fn run_transient(
        &mut self,
        dt_initial: f64,
        t_end: f64,
        mut on_step: impl FnMut(f64, &[f64]),
    ) -> Result<()> {
        self.time = TimeState::new(&self.config, dt_initial);
        for e in &mut self.elements {
            e.reset();
            e.save_state();
        }
        self.mna.clear();
        self.mna.set_solution(nalgebra::DVector::zeros(self.mna.size()));
        self.mna.snapshot_solution();

        while t_end - self.time.t > 1e-9 * self.time.dt {
            // Land exactly on t_end; the shortened step changes the
            // companion conductances, so the snapshot is rebuilt.
            let remaining = t_end - self.time.t;
            if remaining < self.time.dt {
                self.time.dt = remaining;
                self.time.need_linear_stamp = true;
            }
            self.advance_step()?;

            let num_nodes = self.mna.num_nodes();
            on_step(self.time.t, &self.mna.solution().as_slice()[..num_nodes]);
        }
        Ok(())
    }

    /// Run a transient simulation, collecting the node voltages of every
    /// accepted step.
    pub fn run_collect(&mut self, dt_initial: f64, t_end: f64) -> Result<TransientResult> {
        let num_nodes = self.mna.num_nodes();
        let mut points = vec![TimePoint {
            time: 0.0,
            solution: nalgebra::DVector::zeros(num_nodes),
        }];
        self.run_transient(dt_initial, t_end, |t, voltages| {
            points.push(TimePoint {
                time: t,
                solution: nalgebra::DVector::from_row_slice(voltages),
            });
        })?;
        Ok(TransientResult { points, num_nodes })
    }

    /// One accepted step, retrying at halved step sizes on failure.
    fn advance_step(&mut self) -> Result<()> {
        loop {
            match self.attempt_step() {
                Ok(()) => return Ok(()),
                Err(e) if e.is_step_failure() => {
                    log::warn!(
                        "step rejected at t={:.6e} s: {}; halving dt from {:.3e} s",
                        self.time.t,
                        e,
                        self.time.dt
                    );
                    let new_dt = self.time.dt * 0.5;
                    if new_dt < self.config.dt_min {
                        return Err(SolverError::StepSizeFloor {
                            t: self.time.t,
                            dt_min: self.config.dt_min,
                        });
                    }
                    self.time.dt = new_dt;
                    self.time.need_linear_stamp = true;
                    self.time.good_iters = 0;
                    self.time.clear_history();
                    for e in &mut self.elements {
                        e.restore_state();
                    }
                    self.mna.restore_solution();
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One attempt at the current step size: the full hook sequence plus
    /// the Newton loop. Leaves the simulator advanced on success.
    fn attempt_step(&mut self) -> Result<()> {
        if self.time.step_count >= self.config.max_steps {
            return Err(SolverError::StepCountCeiling {
                t: self.time.t,
                max_steps: self.config.max_steps,
            });
        }

        let dt = self.time.dt;
        let t_next = self.time.t + dt;
        self.time.newton_iter = 0;

        self.mna.rollback();
        if self.time.need_linear_stamp {
            for e in &mut self.elements {
                e.restore_state();
            }
            self.mna.clear();
            for e in &mut self.elements {
                e.start_iteration(&self.mna, t_next, dt);
            }
            for e in &mut self.elements {
                e.stamp(&mut self.mna, t_next, dt);
            }
            self.mna.commit();
            self.time.need_linear_stamp = false;
        } else {
            for e in &mut self.elements {
                e.start_iteration(&self.mna, t_next, dt);
            }
        }

        let mut status = StepStatus::new();
        let mut unconverged: Vec<usize> = Vec::new();
        loop {
            if self.time.newton_iter >= self.config.max_newton_iter {
                return Err(SolverError::NewtonDiverged {
                    t: t_next,
                    dt,
                    iterations: self.time.newton_iter,
                    residual: self.time.residual_norm,
                });
            }
            self.time.newton_iter += 1;

            self.mna.rollback();
            status.reset();
            unconverged.clear();
            for (i, e) in self.elements.iter_mut().enumerate() {
                let before = status.marks();
                e.do_step(&mut self.mna, t_next, dt, &mut status);
                if status.marks() > before {
                    unconverged.push(i);
                }
            }

            let residual = self.solve_system(t_next, dt)?;
            self.time.residual_norm = residual;

            let x_norm = self.mna.solution().amax();
            if status.converged()
                && residual <= self.config.tol_abs + self.config.tol_rel * x_norm
            {
                break;
            }

            // Give each still-moving device a bounded chance to settle
            // before burning the whole Newton budget.
            for &i in &unconverged {
                self.element_subiterate(i, t_next, dt)?;
            }
        }

        for e in &mut self.elements {
            e.calculate_current(&self.mna);
        }
        for e in &mut self.elements {
            e.step_finished(&self.mna, t_next, dt);
        }
        for e in &mut self.elements {
            e.save_state();
        }
        self.mna.snapshot_solution();

        self.time.t = t_next;
        self.time.step_count += 1;
        self.time.good_iters += 1;
        self.adapt_step_size();
        Ok(())
    }

    /// Factor and solve the effective system, returning the residual
    /// infinity norm.
    fn solve_system(&mut self, t: f64, dt: f64) -> Result<f64> {
        let a = self.mna.effective_matrix();
        let z = self.mna.effective_rhs();
        let x = linear::solve(&a, &z).map_err(|err| match err {
            LinearError::Singular => SolverError::SingularMatrix {
                t,
                dt,
                iteration: self.time.newton_iter,
            },
            LinearError::NonFinite => SolverError::NonFiniteSolution {
                t,
                dt,
                iteration: self.time.newton_iter,
            },
        })?;
        let residual = (&a * &x - &z).amax();
        self.mna.set_solution(x);
        Ok(residual)
    }

    /// Bounded sub-iteration for one diverging element: roll its scratch
    /// back to the last commit and iterate until it alone settles.
    fn element_subiterate(&mut self, index: usize, t_next: f64, dt: f64) -> Result<()> {
        self.elements[index].restore_state();
        let mut iterations = 0;
        loop {
            if iterations >= self.config.max_elem_iter {
                return Err(SolverError::ElementDiverged {
                    element: self.elements[index].label().to_string(),
                    index,
                    t: t_next,
                    dt,
                    iterations,
                });
            }
            iterations += 1;

            self.mna.rollback();
            let mut status = StepStatus::new();
            let mut device_moved = false;
            for (j, e) in self.elements.iter_mut().enumerate() {
                let before = status.marks();
                e.do_step(&mut self.mna, t_next, dt, &mut status);
                if j == index && status.marks() > before {
                    device_moved = true;
                }
            }

            let residual = self.solve_system(t_next, dt)?;
            self.time.residual_norm = residual;

            if !device_moved {
                log::debug!(
                    "element `{}` settled after {} sub-iterations",
                    self.elements[index].label(),
                    iterations
                );
                return Ok(());
            }
        }
    }

    /// Residual-history policy: shrink on monotonic growth, grow when the
    /// window sits well below tolerance. Either change invalidates the
    /// linear snapshot (companion conductances depend on dt).
    fn adapt_step_size(&mut self) {
        self.time.record_residual(self.time.residual_norm);
        if self.time.residuals_growing() {
            let new_dt = (self.time.dt * 0.5).max(self.config.dt_min);
            if new_dt < self.time.dt {
                log::debug!(
                    "residuals growing; shrinking dt {:.3e} -> {:.3e}",
                    self.time.dt,
                    new_dt
                );
                self.time.dt = new_dt;
                self.time.need_linear_stamp = true;
                self.time.clear_history();
            }
        } else if self.time.residuals_quiet(self.config.tol_abs) && self.time.dt < self.config.dt_max
        {
            let new_dt = (self.time.dt * 1.25).min(self.config.dt_max);
            self.time.dt = new_dt;
            self.time.need_linear_stamp = true;
            self.time.clear_history();
        }
    }
}
