//! Controlled source device models: VCVS, VCCS, CCCS, CCVS.
//!
//! All four are linear and contribute fully to the linear snapshot; the
//! current-controlled kinds read the branch current of an existing voltage
//! source resolved by the bridge.

use voltaic_core::{MnaSystem, NodeId, Value, VoltageSourceId};

use crate::element::Device;

// ────────────────────── VCVS ──────────────────────

/// Voltage-controlled voltage source:
/// `V(out+, out-) = gain * V(ctrl+, ctrl-)`.
///
/// Requires one auxiliary branch current, like a voltage source.
#[derive(Debug, Clone)]
pub struct Vcvs {
    label: String,
    out_p: NodeId,
    out_n: NodeId,
    ctrl_p: NodeId,
    ctrl_n: NodeId,
    gain: f64,
    vs: VoltageSourceId,
    current: f64,
}

impl Vcvs {
    pub fn new(
        label: impl Into<String>,
        out_p: NodeId,
        out_n: NodeId,
        ctrl_p: NodeId,
        ctrl_n: NodeId,
        gain: f64,
    ) -> Self {
        Self {
            label: label.into(),
            out_p,
            out_n,
            ctrl_p,
            ctrl_n,
            gain,
            vs: VoltageSourceId::new(0),
            current: 0.0,
        }
    }
}

impl Device for Vcvs {
    fn label(&self) -> &str {
        &self.label
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.out_p, self.out_n, self.ctrl_p, self.ctrl_n]
    }

    fn num_current_vars(&self) -> usize {
        1
    }

    fn assign_current_vars(&mut self, vars: &[VoltageSourceId]) {
        self.vs = vars[0];
    }

    fn stamp(&mut self, mna: &mut MnaSystem, _t: f64, _dt: f64) {
        mna.stamp_vcvs(self.out_p, self.out_n, self.ctrl_p, self.ctrl_n, self.vs, self.gain);
    }

    fn calculate_current(&mut self, mna: &MnaSystem) {
        self.current = mna.vsource_current(self.vs);
    }

    fn scratch(&self, index: usize) -> Option<Value> {
        match index {
            0 => Some(Value::Float(self.current)),
            _ => None,
        }
    }
}

// ────────────────────── VCCS ──────────────────────

/// Voltage-controlled current source:
/// `I(out+ → out-) = gm * V(ctrl+, ctrl-)`.
///
/// No auxiliary branch needed.
#[derive(Debug, Clone)]
pub struct Vccs {
    label: String,
    out_p: NodeId,
    out_n: NodeId,
    ctrl_p: NodeId,
    ctrl_n: NodeId,
    gm: f64,
    current: f64,
}

impl Vccs {
    pub fn new(
        label: impl Into<String>,
        out_p: NodeId,
        out_n: NodeId,
        ctrl_p: NodeId,
        ctrl_n: NodeId,
        gm: f64,
    ) -> Self {
        Self {
            label: label.into(),
            out_p,
            out_n,
            ctrl_p,
            ctrl_n,
            gm,
            current: 0.0,
        }
    }
}

impl Device for Vccs {
    fn label(&self) -> &str {
        &self.label
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.out_p, self.out_n, self.ctrl_p, self.ctrl_n]
    }

    fn stamp(&mut self, mna: &mut MnaSystem, _t: f64, _dt: f64) {
        mna.stamp_vccs(self.out_p, self.out_n, self.ctrl_p, self.ctrl_n, self.gm);
    }

    fn calculate_current(&mut self, mna: &MnaSystem) {
        let vc = mna.node_voltage(self.ctrl_p) - mna.node_voltage(self.ctrl_n);
        self.current = self.gm * vc;
    }

    fn scratch(&self, index: usize) -> Option<Value> {
        match index {
            0 => Some(Value::Float(self.current)),
            _ => None,
        }
    }
}

// ────────────────────── CCCS ──────────────────────

/// Current-controlled current source:
/// `I(out+ → out-) = gain * I(ctrl)`.
#[derive(Debug, Clone)]
pub struct Cccs {
    label: String,
    out_p: NodeId,
    out_n: NodeId,
    ctrl: VoltageSourceId,
    gain: f64,
    current: f64,
}

impl Cccs {
    pub fn new(label: impl Into<String>, out_p: NodeId, out_n: NodeId, gain: f64) -> Self {
        Self {
            label: label.into(),
            out_p,
            out_n,
            ctrl: VoltageSourceId::new(0),
            gain,
            current: 0.0,
        }
    }

    /// Resolve the controlling branch (done by the bridge once ids exist).
    pub fn set_control(&mut self, ctrl: VoltageSourceId) {
        self.ctrl = ctrl;
    }
}

impl Device for Cccs {
    fn label(&self) -> &str {
        &self.label
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.out_p, self.out_n]
    }

    fn stamp(&mut self, mna: &mut MnaSystem, _t: f64, _dt: f64) {
        mna.stamp_cccs(self.out_p, self.out_n, self.ctrl, self.gain);
    }

    fn calculate_current(&mut self, mna: &MnaSystem) {
        self.current = self.gain * mna.vsource_current(self.ctrl);
    }

    fn scratch(&self, index: usize) -> Option<Value> {
        match index {
            0 => Some(Value::Float(self.current)),
            _ => None,
        }
    }
}

// ────────────────────── CCVS ──────────────────────

/// Current-controlled voltage source:
/// `V(out+, out-) = gain * I(ctrl)`.
///
/// Requires one auxiliary branch current of its own.
#[derive(Debug, Clone)]
pub struct Ccvs {
    label: String,
    out_p: NodeId,
    out_n: NodeId,
    ctrl: VoltageSourceId,
    gain: f64,
    vs: VoltageSourceId,
    current: f64,
}

impl Ccvs {
    pub fn new(label: impl Into<String>, out_p: NodeId, out_n: NodeId, gain: f64) -> Self {
        Self {
            label: label.into(),
            out_p,
            out_n,
            ctrl: VoltageSourceId::new(0),
            gain,
            vs: VoltageSourceId::new(0),
            current: 0.0,
        }
    }

    /// Resolve the controlling branch (done by the bridge once ids exist).
    pub fn set_control(&mut self, ctrl: VoltageSourceId) {
        self.ctrl = ctrl;
    }
}

impl Device for Ccvs {
    fn label(&self) -> &str {
        &self.label
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.out_p, self.out_n]
    }

    fn num_current_vars(&self) -> usize {
        1
    }

    fn assign_current_vars(&mut self, vars: &[VoltageSourceId]) {
        self.vs = vars[0];
    }

    fn stamp(&mut self, mna: &mut MnaSystem, _t: f64, _dt: f64) {
        mna.stamp_ccvs(self.out_p, self.out_n, self.ctrl, self.vs, self.gain);
    }

    fn calculate_current(&mut self, mna: &MnaSystem) {
        self.current = mna.vsource_current(self.vs);
    }

    fn scratch(&self, index: usize) -> Option<Value> {
        match index {
            0 => Some(Value::Float(self.current)),
            _ => None,
        }
    }
}
