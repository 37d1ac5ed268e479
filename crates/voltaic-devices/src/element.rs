//! Device lifecycle contract and the closed element set.
//!
//! Every device implements [`Device`]; the simulator stores the closed
//! [`Element`] enum and dispatches with a `match`, so adding a device kind
//! means adding a variant. There is no registry and no trait objects.

use voltaic_core::{MnaSystem, NodeId, Value, VoltageSourceId};

use crate::bjt::Bjt;
use crate::controlled::{Cccs, Ccvs, Vccs, Vcvs};
use crate::diode::Diode;
use crate::error::{DeviceError, Result};
use crate::logic::LogicGate;
use crate::motor::DcMotor;
use crate::opamp::OpAmp;
use crate::passive::{Capacitor, Inductor, Resistor, Switch};
use crate::sources::{CurrentSource, VoltageSource};
use crate::transformer::Transformer;

/// Integration rule applied to every reactive companion model.
///
/// Chosen once at the simulator level; all reactive devices (capacitor,
/// inductor, transformer, motor armature) discretize with the same rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrationMethod {
    /// Backward Euler (first order, A-stable, heavily damped).
    BackwardEuler,
    /// Trapezoidal (second order, A-stable).
    #[default]
    Trapezoidal,
}

/// Effect of a parameter update on the cached linear stamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamChange {
    /// Only right-hand-side or per-iteration state changed.
    Clean,
    /// The linear snapshot is stale and must be restamped.
    NeedsRestamp,
}

/// Per-step convergence record threaded through every `do_step` call.
///
/// A device that is still moving (its linearization point shifted by more
/// than its tolerance, or a step limiter engaged) calls
/// [`mark_not_converged`](StepStatus::mark_not_converged). The driver
/// observes the mark count around each device call to build the
/// per-device unconverged set, so no global flag exists.
#[derive(Debug, Clone, Default)]
pub struct StepStatus {
    marks: u32,
}

impl StepStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all marks at the start of a Newton iteration.
    pub fn reset(&mut self) {
        self.marks = 0;
    }

    /// Signal that the calling device has not yet converged.
    pub fn mark_not_converged(&mut self) {
        self.marks += 1;
    }

    /// Number of not-converged signals recorded this iteration.
    pub fn marks(&self) -> u32 {
        self.marks
    }

    /// True when no device signaled divergence this iteration.
    pub fn converged(&self) -> bool {
        self.marks == 0
    }
}

/// The lifecycle contract every device implements.
///
/// Hooks are invoked by the transient driver in registration order, per
/// time step:
///
/// 1. `start_iteration`: once per step; reactive devices turn the previous
///    converged solution into this step's companion history.
/// 2. `stamp`: only when the linear snapshot is rebuilt; contributions
///    that are constant within the step.
/// 3. `do_step`: once per Newton iteration, after the system was rolled
///    back to the linear snapshot. Nonlinear devices stamp their
///    linearized model at the current iterate; history currents land here
///    too.
/// 4. `calculate_current`: after Newton converged; derive and cache
///    branch currents from the converged voltages.
/// 5. `step_finished`: commit scratch, advance device state machines.
///
/// `save_state`/`restore_state` checkpoint the scratch that participates in
/// step retry: the driver saves after every accepted step and restores
/// before re-attempting a rejected one.
///
/// The time argument `t` is the *target* time of the step being computed
/// (the end of the interval), matching the implicit integration rules.
pub trait Device {
    /// Instance label, unique within a simulation.
    fn label(&self) -> &str;

    /// External pins, in declaration order.
    fn nodes(&self) -> Vec<NodeId>;

    /// Number of internal nodes this device needs from the shared pool.
    fn num_internal_nodes(&self) -> usize {
        0
    }

    /// Receive the internal node allocation (called once, before `reset`).
    fn assign_internal_nodes(&mut self, _nodes: &[NodeId]) {}

    /// Number of auxiliary branch-current unknowns this device introduces.
    fn num_current_vars(&self) -> usize {
        0
    }

    /// Receive the auxiliary branch allocation (called once, before `reset`).
    fn assign_current_vars(&mut self, _vars: &[VoltageSourceId]) {}

    /// True for devices that restamp a changing model in `do_step`.
    fn is_nonlinear(&self) -> bool {
        false
    }

    /// Record the simulator-level integration rule.
    fn set_integration_method(&mut self, _method: IntegrationMethod) {}

    /// Recompute derived constants from parameters and zero scratch.
    fn reset(&mut self) {}

    /// Once per step, before stamping: prepare companion history from the
    /// previous converged solution.
    fn start_iteration(&mut self, _mna: &MnaSystem, _t: f64, _dt: f64) {}

    /// Contributions that are constant within this step (linear snapshot).
    fn stamp(&mut self, _mna: &mut MnaSystem, _t: f64, _dt: f64) {}

    /// Per-Newton-iteration contributions at the current iterate.
    fn do_step(&mut self, _mna: &mut MnaSystem, _t: f64, _dt: f64, _status: &mut StepStatus) {}

    /// Derive and cache terminal currents from the converged solution.
    fn calculate_current(&mut self, _mna: &MnaSystem) {}

    /// Commit scratch and advance internal state machines.
    fn step_finished(&mut self, _mna: &MnaSystem, _t: f64, _dt: f64) {}

    /// Checkpoint scratch for step retry.
    fn save_state(&mut self) {}

    /// Roll scratch back to the last checkpoint.
    fn restore_state(&mut self) {}

    /// Observe a scratch slot (cached currents, internal state).
    fn scratch(&self, _index: usize) -> Option<Value> {
        None
    }

    /// Update a parameter between steps. The returned [`ParamChange`]
    /// advertises whether the linear snapshot was invalidated.
    fn set_param(&mut self, key: &str, _value: &Value) -> Result<ParamChange> {
        Err(DeviceError::UnknownParam {
            device: self.label().to_string(),
            key: key.to_string(),
        })
    }
}

/// Forward a method call to the inner device struct.
macro_rules! dispatch {
    ($self:expr, $method:ident($($args:expr),*)) => {
        match $self {
            Element::Resistor(e) => e.$method($($args),*),
            Element::Capacitor(e) => e.$method($($args),*),
            Element::Inductor(e) => e.$method($($args),*),
            Element::Switch(e) => e.$method($($args),*),
            Element::VoltageSource(e) => e.$method($($args),*),
            Element::CurrentSource(e) => e.$method($($args),*),
            Element::Vcvs(e) => e.$method($($args),*),
            Element::Vccs(e) => e.$method($($args),*),
            Element::Cccs(e) => e.$method($($args),*),
            Element::Ccvs(e) => e.$method($($args),*),
            Element::Diode(e) => e.$method($($args),*),
            Element::Bjt(e) => e.$method($($args),*),
            Element::OpAmp(e) => e.$method($($args),*),
            Element::Transformer(e) => e.$method($($args),*),
            Element::Motor(e) => e.$method($($args),*),
            Element::Gate(e) => e.$method($($args),*),
        }
    };
}

/// The closed set of device kinds.
#[derive(Debug, Clone)]
pub enum Element {
    Resistor(Resistor),
    Capacitor(Capacitor),
    Inductor(Inductor),
    Switch(Switch),
    VoltageSource(VoltageSource),
    CurrentSource(CurrentSource),
    Vcvs(Vcvs),
    Vccs(Vccs),
    Cccs(Cccs),
    Ccvs(Ccvs),
    Diode(Diode),
    Bjt(Bjt),
    OpAmp(OpAmp),
    Transformer(Transformer),
    Motor(DcMotor),
    Gate(LogicGate),
}

impl Device for Element {
    fn label(&self) -> &str {
        dispatch!(self, label())
    }

    fn nodes(&self) -> Vec<NodeId> {
        dispatch!(self, nodes())
    }

    fn num_internal_nodes(&self) -> usize {
        dispatch!(self, num_internal_nodes())
    }

    fn assign_internal_nodes(&mut self, nodes: &[NodeId]) {
        dispatch!(self, assign_internal_nodes(nodes))
    }

    fn num_current_vars(&self) -> usize {
        dispatch!(self, num_current_vars())
    }

    fn assign_current_vars(&mut self, vars: &[VoltageSourceId]) {
        dispatch!(self, assign_current_vars(vars))
    }

    fn is_nonlinear(&self) -> bool {
        dispatch!(self, is_nonlinear())
    }

    fn set_integration_method(&mut self, method: IntegrationMethod) {
        dispatch!(self, set_integration_method(method))
    }

    fn reset(&mut self) {
        dispatch!(self, reset())
    }

    fn start_iteration(&mut self, mna: &MnaSystem, t: f64, dt: f64) {
        dispatch!(self, start_iteration(mna, t, dt))
    }

    fn stamp(&mut self, mna: &mut MnaSystem, t: f64, dt: f64) {
        dispatch!(self, stamp(mna, t, dt))
    }

    fn do_step(&mut self, mna: &mut MnaSystem, t: f64, dt: f64, status: &mut StepStatus) {
        dispatch!(self, do_step(mna, t, dt, status))
    }

    fn calculate_current(&mut self, mna: &MnaSystem) {
        dispatch!(self, calculate_current(mna))
    }

    fn step_finished(&mut self, mna: &MnaSystem, t: f64, dt: f64) {
        dispatch!(self, step_finished(mna, t, dt))
    }

    fn save_state(&mut self) {
        dispatch!(self, save_state())
    }

    fn restore_state(&mut self) {
        dispatch!(self, restore_state())
    }

    fn scratch(&self, index: usize) -> Option<Value> {
        dispatch!(self, scratch(index))
    }

    fn set_param(&mut self, key: &str, value: &Value) -> Result<ParamChange> {
        dispatch!(self, set_param(key, value))
    }
}
