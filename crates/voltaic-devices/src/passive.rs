//! Passive elements: resistor, capacitor, inductor, ideal switch.
//!
//! Reactive elements are replaced per step by their companion model: a
//! conductance in parallel with a history current source derived from the
//! configured integration rule.
//!
//! Backward Euler:  C → `G_eq = C/h`,  `I_hist = G_eq·V_prev`
//!                  L → `G_eq = h/L`,  `I_hist = I_prev`
//! Trapezoidal:     C → `G_eq = 2C/h`, `I_hist = G_eq·V_prev + I_prev`
//!                  L → `G_eq = h/2L`, `I_hist = G_eq·V_prev + I_prev`

use voltaic_core::{MnaSystem, NodeId, Value};

use crate::element::{Device, IntegrationMethod, ParamChange, StepStatus};
use crate::error::{DeviceError, Result};

// ────────────────────── Resistor ──────────────────────

/// A linear resistor.
#[derive(Debug, Clone)]
pub struct Resistor {
    label: String,
    n1: NodeId,
    n2: NodeId,
    resistance: f64,
    current: f64,
}

impl Resistor {
    pub fn new(label: impl Into<String>, n1: NodeId, n2: NodeId, resistance: f64) -> Self {
        Self {
            label: label.into(),
            n1,
            n2,
            resistance,
            current: 0.0,
        }
    }

    pub fn resistance(&self) -> f64 {
        self.resistance
    }
}

impl Device for Resistor {
    fn label(&self) -> &str {
        &self.label
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.n1, self.n2]
    }

    fn stamp(&mut self, mna: &mut MnaSystem, _t: f64, _dt: f64) {
        mna.stamp_resistor(self.n1, self.n2, self.resistance);
    }

    fn calculate_current(&mut self, mna: &MnaSystem) {
        let v = mna.node_voltage(self.n1) - mna.node_voltage(self.n2);
        self.current = if self.resistance > 0.0 && self.resistance.is_finite() {
            v / self.resistance
        } else {
            0.0
        };
    }

    fn scratch(&self, index: usize) -> Option<Value> {
        match index {
            0 => Some(Value::Float(self.current)),
            _ => None,
        }
    }

    fn set_param(&mut self, key: &str, value: &Value) -> Result<ParamChange> {
        match key {
            "resistance" => {
                self.resistance = value.as_f64().ok_or_else(|| DeviceError::ParamType {
                    device: self.label.clone(),
                    key: key.to_string(),
                    expected: "float",
                })?;
                Ok(ParamChange::NeedsRestamp)
            }
            _ => Err(DeviceError::UnknownParam {
                device: self.label.clone(),
                key: key.to_string(),
            }),
        }
    }
}

// ────────────────────── Capacitor ──────────────────────

/// A capacitor, integrated through its companion model.
#[derive(Debug, Clone)]
pub struct Capacitor {
    label: String,
    n1: NodeId,
    n2: NodeId,
    capacitance: f64,
    method: IntegrationMethod,
    /// Companion conductance for the current step.
    geq: f64,
    /// History current for the current step.
    i_hist: f64,
    /// Committed voltage across the element.
    v_prev: f64,
    /// Committed terminal current.
    i_prev: f64,
    v_ckpt: f64,
    i_ckpt: f64,
    current: f64,
}

impl Capacitor {
    pub fn new(label: impl Into<String>, n1: NodeId, n2: NodeId, capacitance: f64) -> Self {
        Self {
            label: label.into(),
            n1,
            n2,
            capacitance,
            method: IntegrationMethod::default(),
            geq: 0.0,
            i_hist: 0.0,
            v_prev: 0.0,
            i_prev: 0.0,
            v_ckpt: 0.0,
            i_ckpt: 0.0,
            current: 0.0,
        }
    }

    fn conductance(&self, dt: f64) -> f64 {
        match self.method {
            IntegrationMethod::BackwardEuler => self.capacitance / dt,
            IntegrationMethod::Trapezoidal => 2.0 * self.capacitance / dt,
        }
    }
}

impl Device for Capacitor {
    fn label(&self) -> &str {
        &self.label
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.n1, self.n2]
    }

    fn set_integration_method(&mut self, method: IntegrationMethod) {
        self.method = method;
    }

    fn reset(&mut self) {
        self.geq = 0.0;
        self.i_hist = 0.0;
        self.v_prev = 0.0;
        self.i_prev = 0.0;
        self.current = 0.0;
    }

    fn start_iteration(&mut self, _mna: &MnaSystem, _t: f64, dt: f64) {
        self.geq = self.conductance(dt);
        self.i_hist = match self.method {
            IntegrationMethod::BackwardEuler => self.geq * self.v_prev,
            IntegrationMethod::Trapezoidal => self.geq * self.v_prev + self.i_prev,
        };
    }

    fn stamp(&mut self, mna: &mut MnaSystem, _t: f64, _dt: f64) {
        mna.stamp_conductance(self.n1, self.n2, self.geq);
    }

    fn do_step(&mut self, mna: &mut MnaSystem, _t: f64, _dt: f64, _status: &mut StepStatus) {
        // History current charges n1, so the Norton pair (G_eq, I_hist)
        // reproduces I = G_eq·V - I_hist.
        mna.stamp_current_source(self.n2, self.n1, self.i_hist);
    }

    fn calculate_current(&mut self, mna: &MnaSystem) {
        let v = mna.node_voltage(self.n1) - mna.node_voltage(self.n2);
        self.current = self.geq * v - self.i_hist;
    }

    fn step_finished(&mut self, mna: &MnaSystem, _t: f64, _dt: f64) {
        self.v_prev = mna.node_voltage(self.n1) - mna.node_voltage(self.n2);
        self.i_prev = self.current;
    }

    fn save_state(&mut self) {
        self.v_ckpt = self.v_prev;
        self.i_ckpt = self.i_prev;
    }

    fn restore_state(&mut self) {
        self.v_prev = self.v_ckpt;
        self.i_prev = self.i_ckpt;
    }

    fn scratch(&self, index: usize) -> Option<Value> {
        match index {
            0 => Some(Value::Float(self.current)),
            1 => Some(Value::Float(self.v_prev)),
            _ => None,
        }
    }

    fn set_param(&mut self, key: &str, value: &Value) -> Result<ParamChange> {
        match key {
            "capacitance" => {
                self.capacitance = value.as_f64().ok_or_else(|| DeviceError::ParamType {
                    device: self.label.clone(),
                    key: key.to_string(),
                    expected: "float",
                })?;
                Ok(ParamChange::NeedsRestamp)
            }
            _ => Err(DeviceError::UnknownParam {
                device: self.label.clone(),
                key: key.to_string(),
            }),
        }
    }
}

// ────────────────────── Inductor ──────────────────────

/// An inductor, integrated through its companion model. The sign convention
/// is current flowing from `n1` to `n2` through the element.
#[derive(Debug, Clone)]
pub struct Inductor {
    label: String,
    n1: NodeId,
    n2: NodeId,
    inductance: f64,
    initial_current: f64,
    method: IntegrationMethod,
    geq: f64,
    i_hist: f64,
    v_prev: f64,
    i_prev: f64,
    v_ckpt: f64,
    i_ckpt: f64,
    current: f64,
}

impl Inductor {
    pub fn new(label: impl Into<String>, n1: NodeId, n2: NodeId, inductance: f64) -> Self {
        Self::with_initial_current(label, n1, n2, inductance, 0.0)
    }

    pub fn with_initial_current(
        label: impl Into<String>,
        n1: NodeId,
        n2: NodeId,
        inductance: f64,
        initial_current: f64,
    ) -> Self {
        Self {
            label: label.into(),
            n1,
            n2,
            inductance,
            initial_current,
            method: IntegrationMethod::default(),
            geq: 0.0,
            i_hist: 0.0,
            v_prev: 0.0,
            i_prev: initial_current,
            v_ckpt: 0.0,
            i_ckpt: initial_current,
            current: 0.0,
        }
    }

    fn conductance(&self, dt: f64) -> f64 {
        match self.method {
            IntegrationMethod::BackwardEuler => dt / self.inductance,
            IntegrationMethod::Trapezoidal => dt / (2.0 * self.inductance),
        }
    }
}

impl Device for Inductor {
    fn label(&self) -> &str {
        &self.label
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.n1, self.n2]
    }

    fn set_integration_method(&mut self, method: IntegrationMethod) {
        self.method = method;
    }

    fn reset(&mut self) {
        self.geq = 0.0;
        self.i_hist = 0.0;
        self.v_prev = 0.0;
        self.i_prev = self.initial_current;
        self.current = 0.0;
    }

    fn start_iteration(&mut self, _mna: &MnaSystem, _t: f64, dt: f64) {
        self.geq = self.conductance(dt);
        self.i_hist = match self.method {
            IntegrationMethod::BackwardEuler => self.i_prev,
            IntegrationMethod::Trapezoidal => self.geq * self.v_prev + self.i_prev,
        };
    }

    fn stamp(&mut self, mna: &mut MnaSystem, _t: f64, _dt: f64) {
        mna.stamp_conductance(self.n1, self.n2, self.geq);
    }

    fn do_step(&mut self, mna: &mut MnaSystem, _t: f64, _dt: f64, _status: &mut StepStatus) {
        // History current flows n1 → n2, the same direction as I_prev.
        mna.stamp_current_source(self.n1, self.n2, self.i_hist);
    }

    fn calculate_current(&mut self, mna: &MnaSystem) {
        let v = mna.node_voltage(self.n1) - mna.node_voltage(self.n2);
        self.current = self.geq * v + self.i_hist;
    }

    fn step_finished(&mut self, mna: &MnaSystem, _t: f64, _dt: f64) {
        self.v_prev = mna.node_voltage(self.n1) - mna.node_voltage(self.n2);
        self.i_prev = self.current;
    }

    fn save_state(&mut self) {
        self.v_ckpt = self.v_prev;
        self.i_ckpt = self.i_prev;
    }

    fn restore_state(&mut self) {
        self.v_prev = self.v_ckpt;
        self.i_prev = self.i_ckpt;
    }

    fn scratch(&self, index: usize) -> Option<Value> {
        match index {
            0 => Some(Value::Float(self.current)),
            1 => Some(Value::Float(self.v_prev)),
            _ => None,
        }
    }
}

// ────────────────────── Ideal switch ──────────────────────

/// An ideal switch: `R_on` when closed, `R_off` when open. The state is
/// changed between steps through `set_param("closed", …)`.
#[derive(Debug, Clone)]
pub struct Switch {
    label: String,
    n1: NodeId,
    n2: NodeId,
    closed: bool,
    r_on: f64,
    r_off: f64,
    current: f64,
}

impl Switch {
    pub fn new(
        label: impl Into<String>,
        n1: NodeId,
        n2: NodeId,
        closed: bool,
        r_on: f64,
        r_off: f64,
    ) -> Self {
        Self {
            label: label.into(),
            n1,
            n2,
            closed,
            r_on,
            r_off,
            current: 0.0,
        }
    }

    fn effective_resistance(&self) -> f64 {
        if self.closed {
            self.r_on
        } else {
            self.r_off
        }
    }
}

impl Device for Switch {
    fn label(&self) -> &str {
        &self.label
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.n1, self.n2]
    }

    fn stamp(&mut self, mna: &mut MnaSystem, _t: f64, _dt: f64) {
        mna.stamp_resistor(self.n1, self.n2, self.effective_resistance());
    }

    fn calculate_current(&mut self, mna: &MnaSystem) {
        let v = mna.node_voltage(self.n1) - mna.node_voltage(self.n2);
        self.current = v / self.effective_resistance();
    }

    fn scratch(&self, index: usize) -> Option<Value> {
        match index {
            0 => Some(Value::Float(self.current)),
            1 => Some(Value::Bool(self.closed)),
            _ => None,
        }
    }

    fn set_param(&mut self, key: &str, value: &Value) -> Result<ParamChange> {
        match key {
            "closed" => {
                self.closed = value.as_bool().ok_or_else(|| DeviceError::ParamType {
                    device: self.label.clone(),
                    key: key.to_string(),
                    expected: "bool",
                })?;
                Ok(ParamChange::NeedsRestamp)
            }
            _ => Err(DeviceError::UnknownParam {
                device: self.label.clone(),
                key: key.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(id: u32) -> NodeId {
        NodeId::new(id)
    }

    #[test]
    fn test_capacitor_companion_trapezoidal() {
        let mut c = Capacitor::new("C1", n(1), NodeId::GROUND, 1e-6);
        c.set_integration_method(IntegrationMethod::Trapezoidal);
        c.reset();
        c.v_prev = 2.0;
        c.i_prev = 1e-3;

        let mna = MnaSystem::new(1, 0);
        c.start_iteration(&mna, 0.0, 1e-3);

        // G_eq = 2C/h = 2e-3, I_hist = G_eq·V_prev + I_prev.
        assert!((c.geq - 2e-3).abs() < 1e-15);
        assert!((c.i_hist - (2e-3 * 2.0 + 1e-3)).abs() < 1e-15);
    }

    #[test]
    fn test_capacitor_companion_backward_euler() {
        let mut c = Capacitor::new("C1", n(1), NodeId::GROUND, 1e-6);
        c.set_integration_method(IntegrationMethod::BackwardEuler);
        c.reset();
        c.v_prev = 2.0;
        c.i_prev = 1e-3;

        let mna = MnaSystem::new(1, 0);
        c.start_iteration(&mna, 0.0, 1e-3);

        assert!((c.geq - 1e-3).abs() < 1e-15);
        assert!((c.i_hist - 2e-3).abs() < 1e-15);
    }

    #[test]
    fn test_inductor_companion_trapezoidal() {
        let mut l = Inductor::new("L1", n(1), NodeId::GROUND, 1e-3);
        l.set_integration_method(IntegrationMethod::Trapezoidal);
        l.reset();
        l.v_prev = 0.5;
        l.i_prev = 0.1;

        let mna = MnaSystem::new(1, 0);
        l.start_iteration(&mna, 0.0, 1e-6);

        // G_eq = h/2L = 5e-4.
        assert!((l.geq - 5e-4).abs() < 1e-18);
        assert!((l.i_hist - (5e-4 * 0.5 + 0.1)).abs() < 1e-15);
    }

    #[test]
    fn test_inductor_initial_current_survives_reset() {
        let mut l = Inductor::with_initial_current("L1", n(1), n(2), 1e-3, 0.25);
        l.reset();
        assert_eq!(l.i_prev, 0.25);
    }

    #[test]
    fn test_switch_resistance_follows_state() {
        let mut s = Switch::new("S1", n(1), n(2), false, 1.0, 1e9);
        assert_eq!(s.effective_resistance(), 1e9);
        s.set_param("closed", &Value::Bool(true)).unwrap();
        assert_eq!(s.effective_resistance(), 1.0);
        assert!(matches!(
            s.set_param("closed", &Value::Float(1.0)),
            Err(DeviceError::ParamType { .. })
        ));
    }

    #[test]
    fn test_resistor_restamp_on_param_change() {
        let mut r = Resistor::new("R1", n(1), n(2), 100.0);
        let change = r.set_param("resistance", &Value::Float(200.0)).unwrap();
        assert_eq!(change, ParamChange::NeedsRestamp);
        assert_eq!(r.resistance(), 200.0);
    }
}
