//! Operational amplifier.
//!
//! Saturating model: an auxiliary voltage source forces
//! `Vout = f(V+ - V-)` where `f` has slope `gain` around zero and rolls
//! smoothly into the supply rails through an arctangent. The constraint row
//! is re-linearized at every Newton iteration; the input pins see a
//! 1e16-ohm tie to ground so they can never float.

use std::f64::consts::PI;

use voltaic_core::{MnaSystem, NodeId, Value, VoltageSourceId};

use crate::element::{Device, StepStatus};

/// Conductance tying each input to ground.
const INPUT_LEAK: f64 = 1e-16;

/// An op-amp (non-inverting input, inverting input, output).
#[derive(Debug, Clone)]
pub struct OpAmp {
    label: String,
    input_p: NodeId,
    input_n: NodeId,
    output: NodeId,
    v_max: f64,
    v_min: f64,
    gain: f64,
    vs: VoltageSourceId,
    vd_prev: f64,
    vd_ckpt: f64,
    current: f64,
}

impl OpAmp {
    pub fn new(
        label: impl Into<String>,
        input_p: NodeId,
        input_n: NodeId,
        output: NodeId,
        v_max: f64,
        v_min: f64,
        gain: f64,
    ) -> Self {
        Self {
            label: label.into(),
            input_p,
            input_n,
            output,
            v_max,
            v_min,
            gain,
            vs: VoltageSourceId::new(0),
            vd_prev: 0.0,
            vd_ckpt: 0.0,
            current: 0.0,
        }
    }

    /// Saturating transfer function and its derivative at `vd`.
    fn transfer(&self, vd: f64) -> (f64, f64) {
        let span = self.v_max - self.v_min;
        let mid = 0.5 * (self.v_max + self.v_min);
        let scaled = PI * self.gain * vd / span;
        let f = mid + span / PI * scaled.atan();
        let df = self.gain / (1.0 + scaled * scaled);
        (f, df)
    }
}

impl Device for OpAmp {
    fn label(&self) -> &str {
        &self.label
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.input_p, self.input_n, self.output]
    }

    fn num_current_vars(&self) -> usize {
        1
    }

    fn assign_current_vars(&mut self, vars: &[VoltageSourceId]) {
        self.vs = vars[0];
    }

    fn is_nonlinear(&self) -> bool {
        true
    }

    fn reset(&mut self) {
        self.vd_prev = 0.0;
        self.current = 0.0;
    }

    fn stamp(&mut self, mna: &mut MnaSystem, _t: f64, _dt: f64) {
        mna.stamp_conductance(self.input_p, NodeId::GROUND, INPUT_LEAK);
        mna.stamp_conductance(self.input_n, NodeId::GROUND, INPUT_LEAK);
        // Output branch current couples into the output KCL row; the
        // constraint row itself is rebuilt every iteration.
        if let Some(out) = self.output.index() {
            let row = mna.vs_row(self.vs);
            mna.stamp_matrix(out, row, 1.0);
        }
    }

    fn do_step(&mut self, mna: &mut MnaSystem, _t: f64, _dt: f64, status: &mut StepStatus) {
        let vd = mna.node_voltage(self.input_p) - mna.node_voltage(self.input_n);
        if (vd - self.vd_prev).abs() > 1e-6 * (1.0 + vd.abs()) {
            status.mark_not_converged();
        }
        self.vd_prev = vd;

        let (f, df) = self.transfer(vd);
        let row = mna.vs_row(self.vs);
        // Constraint: Vout - df·(V+ - V-) = f(vd0) - df·vd0.
        if let Some(out) = self.output.index() {
            mna.stamp_matrix(row, out, 1.0);
        }
        if let Some(p) = self.input_p.index() {
            mna.stamp_matrix(row, p, -df);
        }
        if let Some(n) = self.input_n.index() {
            mna.stamp_matrix(row, n, df);
        }
        mna.set_rhs(row, f - df * vd);
    }

    fn calculate_current(&mut self, mna: &MnaSystem) {
        self.current = mna.vsource_current(self.vs);
    }

    fn save_state(&mut self) {
        self.vd_ckpt = self.vd_prev;
    }

    fn restore_state(&mut self) {
        self.vd_prev = self.vd_ckpt;
    }

    fn scratch(&self, index: usize) -> Option<Value> {
        match index {
            0 => Some(Value::Float(self.current)),
            1 => Some(Value::Float(self.vd_prev)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opamp() -> OpAmp {
        OpAmp::new(
            "U1",
            NodeId::new(1),
            NodeId::new(2),
            NodeId::new(3),
            15.0,
            -15.0,
            1e5,
        )
    }

    #[test]
    fn test_transfer_linear_around_zero() {
        let op = opamp();
        let (f, df) = op.transfer(0.0);
        assert!(f.abs() < 1e-12);
        assert!((df - 1e5).abs() / 1e5 < 1e-12);

        // Small-signal: output tracks gain * vd.
        let (f, _) = op.transfer(1e-5);
        assert!((f - 1.0).abs() < 0.1, "f(1e-5) = {}", f);
    }

    #[test]
    fn test_transfer_clamps_to_rails() {
        let op = opamp();
        let (f_hi, df_hi) = op.transfer(1.0);
        let (f_lo, _) = op.transfer(-1.0);
        assert!(f_hi < 15.0 && f_hi > 14.0, "high rail {}", f_hi);
        assert!(f_lo > -15.0 && f_lo < -14.0, "low rail {}", f_lo);
        // Slope collapses deep in saturation.
        assert!(df_hi < 1.0);
    }

    #[test]
    fn test_constraint_row_stamp() {
        let mut op = opamp();
        op.assign_current_vars(&[VoltageSourceId::new(0)]);
        let mut mna = MnaSystem::new(3, 1);
        let mut status = StepStatus::new();
        op.do_step(&mut mna, 0.0, 0.1, &mut status);

        // Row 3 is the constraint: +1 on the output column, -gain'/+gain'
        // on the inputs.
        assert_eq!(mna.matrix_entry(3, 2), 1.0);
        assert!(mna.matrix_entry(3, 0) < 0.0);
        assert!(mna.matrix_entry(3, 1) > 0.0);
    }
}
