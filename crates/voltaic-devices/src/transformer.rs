//! Transformer: two coupled inductors discretized as one state space.
//!
//! With `L2 = L1·n²` and mutual inductance `M = k·√(L1·L2)`, inverting the
//! inductance matrix gives the admittance coefficients
//!
//! ```text
//! a11 =  L2·factor    a12 = -M·factor
//! a21 = -M·factor     a22 =  L1·factor
//! ```
//!
//! where `factor = dt/(2·det)` under the trapezoidal rule (`dt/det` under
//! backward Euler) and `det = L1·L2 - M²`. The matrix part stamps as two
//! self admittances plus a symmetric VCCS pair; the two winding history
//! currents restamp every iteration.

use voltaic_core::{MnaSystem, NodeId, Value};

use crate::element::{Device, IntegrationMethod, StepStatus};

/// A two-winding transformer (p1, p2, s1, s2).
#[derive(Debug, Clone)]
pub struct Transformer {
    label: String,
    p1: NodeId,
    p2: NodeId,
    s1: NodeId,
    s2: NodeId,
    l1: f64,
    turns_ratio: f64,
    coupling: f64,
    method: IntegrationMethod,
    // Derived at reset:
    l2: f64,
    mutual: f64,
    det: f64,
    // Derived per step (dt-dependent):
    a11: f64,
    a12: f64,
    a21: f64,
    a22: f64,
    // Scratch:
    i_hist1: f64,
    i_hist2: f64,
    i1_prev: f64,
    i2_prev: f64,
    i1_ckpt: f64,
    i2_ckpt: f64,
    i1: f64,
    i2: f64,
}

impl Transformer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        label: impl Into<String>,
        p1: NodeId,
        p2: NodeId,
        s1: NodeId,
        s2: NodeId,
        l1: f64,
        turns_ratio: f64,
        coupling: f64,
    ) -> Self {
        Self {
            label: label.into(),
            p1,
            p2,
            s1,
            s2,
            l1,
            turns_ratio,
            coupling,
            method: IntegrationMethod::default(),
            l2: 0.0,
            mutual: 0.0,
            det: 0.0,
            a11: 0.0,
            a12: 0.0,
            a21: 0.0,
            a22: 0.0,
            i_hist1: 0.0,
            i_hist2: 0.0,
            i1_prev: 0.0,
            i2_prev: 0.0,
            i1_ckpt: 0.0,
            i2_ckpt: 0.0,
            i1: 0.0,
            i2: 0.0,
        }
    }

    fn update_coefficients(&mut self, dt: f64) {
        let factor = match self.method {
            IntegrationMethod::BackwardEuler => dt / self.det,
            IntegrationMethod::Trapezoidal => dt / (2.0 * self.det),
        };
        self.a11 = self.l2 * factor;
        self.a12 = -self.mutual * factor;
        self.a21 = -self.mutual * factor;
        self.a22 = self.l1 * factor;
    }
}

impl Device for Transformer {
    fn label(&self) -> &str {
        &self.label
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.p1, self.p2, self.s1, self.s2]
    }

    fn set_integration_method(&mut self, method: IntegrationMethod) {
        self.method = method;
    }

    fn reset(&mut self) {
        self.l2 = self.l1 * self.turns_ratio * self.turns_ratio;
        self.mutual = self.coupling * (self.l1 * self.l2).sqrt();
        self.det = self.l1 * self.l2 - self.mutual * self.mutual;
        self.i_hist1 = 0.0;
        self.i_hist2 = 0.0;
        self.i1_prev = 0.0;
        self.i2_prev = 0.0;
        self.i1 = 0.0;
        self.i2 = 0.0;
    }

    fn start_iteration(&mut self, mna: &MnaSystem, _t: f64, dt: f64) {
        self.update_coefficients(dt);
        let v1 = mna.node_voltage(self.p1) - mna.node_voltage(self.p2);
        let v2 = mna.node_voltage(self.s1) - mna.node_voltage(self.s2);
        match self.method {
            IntegrationMethod::BackwardEuler => {
                self.i_hist1 = self.i1_prev;
                self.i_hist2 = self.i2_prev;
            }
            IntegrationMethod::Trapezoidal => {
                self.i_hist1 = self.i1_prev + self.a11 * v1 + self.a12 * v2;
                self.i_hist2 = self.i2_prev + self.a21 * v1 + self.a22 * v2;
            }
        }
    }

    fn stamp(&mut self, mna: &mut MnaSystem, _t: f64, _dt: f64) {
        mna.stamp_conductance(self.p1, self.p2, self.a11);
        mna.stamp_conductance(self.s1, self.s2, self.a22);
        mna.stamp_vccs(self.p1, self.p2, self.s1, self.s2, self.a12);
        mna.stamp_vccs(self.s1, self.s2, self.p1, self.p2, self.a21);
    }

    fn do_step(&mut self, mna: &mut MnaSystem, _t: f64, _dt: f64, _status: &mut StepStatus) {
        mna.stamp_current_source(self.p1, self.p2, self.i_hist1);
        mna.stamp_current_source(self.s1, self.s2, self.i_hist2);
    }

    fn calculate_current(&mut self, mna: &MnaSystem) {
        let v1 = mna.node_voltage(self.p1) - mna.node_voltage(self.p2);
        let v2 = mna.node_voltage(self.s1) - mna.node_voltage(self.s2);
        self.i1 = self.a11 * v1 + self.a12 * v2 + self.i_hist1;
        self.i2 = self.a21 * v1 + self.a22 * v2 + self.i_hist2;
    }

    fn step_finished(&mut self, _mna: &MnaSystem, _t: f64, _dt: f64) {
        self.i1_prev = self.i1;
        self.i2_prev = self.i2;
    }

    fn save_state(&mut self) {
        self.i1_ckpt = self.i1_prev;
        self.i2_ckpt = self.i2_prev;
    }

    fn restore_state(&mut self) {
        self.i1_prev = self.i1_ckpt;
        self.i2_prev = self.i2_ckpt;
    }

    fn scratch(&self, index: usize) -> Option<Value> {
        match index {
            0 => Some(Value::Float(self.i1)),
            1 => Some(Value::Float(self.i2)),
            _ => None,
        }
    }
}
