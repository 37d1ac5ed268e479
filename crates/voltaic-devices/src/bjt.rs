//! Bipolar junction transistor (NPN/PNP).
//!
//! Static Ebers-Moll transport model with a fixed reverse gain of 1. Each
//! Newton iteration polarity-adjusts the junction voltages, step-limits
//! them independently, evaluates the terminal currents, and stamps the full
//! 3x3 Jacobian plus Norton equivalent currents on base, collector and
//! emitter.

use voltaic_core::{MnaSystem, NodeId, Value};

use crate::element::{Device, StepStatus};

/// Thermal voltage at room temperature (V).
const VT: f64 = 0.025865;

/// Junction saturation current (A).
const LEAKAGE: f64 = 1e-13;

/// Reverse current gain.
const BETA_R: f64 = 1.0;

/// Floor conductance across each junction, preventing a singular matrix
/// when all terminals float.
const GMIN: f64 = 1e-12;

const MAX_EXP_ARG: f64 = 50.0;

/// A bipolar junction transistor (base, collector, emitter).
#[derive(Debug, Clone)]
pub struct Bjt {
    label: String,
    base: NodeId,
    collector: NodeId,
    emitter: NodeId,
    pnp: bool,
    beta: f64,
    v_crit: f64,
    // Scratch:
    vbe_prev: f64,
    vbc_prev: f64,
    vbe_ckpt: f64,
    vbc_ckpt: f64,
    ib: f64,
    ic: f64,
    ie: f64,
}

impl Bjt {
    pub fn new(
        label: impl Into<String>,
        base: NodeId,
        collector: NodeId,
        emitter: NodeId,
        pnp: bool,
        beta: f64,
    ) -> Self {
        Self {
            label: label.into(),
            base,
            collector,
            emitter,
            pnp,
            beta,
            v_crit: VT * (VT / (std::f64::consts::SQRT_2 * LEAKAGE)).ln(),
            vbe_prev: 0.0,
            vbc_prev: 0.0,
            vbe_ckpt: 0.0,
            vbc_ckpt: 0.0,
            ib: 0.0,
            ic: 0.0,
            ie: 0.0,
        }
    }

    fn polarity(&self) -> f64 {
        if self.pnp {
            -1.0
        } else {
            1.0
        }
    }

    /// Critical-voltage limiter shared by both junctions.
    fn limit_step(&self, vnew: f64, vold: f64) -> (f64, bool) {
        if vnew > self.v_crit && (vnew - vold).abs() > 2.0 * VT {
            let limited = if vold > 0.0 {
                let arg = 1.0 + (vnew - vold) / VT;
                if arg > 0.0 {
                    vold + VT * arg.ln()
                } else {
                    self.v_crit
                }
            } else {
                VT * (vnew / VT).ln()
            };
            (limited, true)
        } else {
            (vnew, false)
        }
    }

    fn exp(arg: f64) -> f64 {
        arg.min(MAX_EXP_ARG).exp()
    }

    /// Terminal currents `(ib, ic, ie)` flowing into the device at each
    /// terminal, in the NPN frame.
    fn currents(&self, vbe: f64, vbc: f64) -> (f64, f64, f64) {
        let expbe = Self::exp(vbe / VT);
        let expbc = Self::exp(vbc / VT);
        let transport = LEAKAGE * (expbe - expbc);
        let ibc = LEAKAGE * (expbc - 1.0) / BETA_R;
        let ibe = LEAKAGE * (expbe - 1.0) / self.beta;
        let ic = transport - ibc;
        let ib = ibe + ibc;
        (ib, ic, -(ib + ic))
    }
}

impl Device for Bjt {
    fn label(&self) -> &str {
        &self.label
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.base, self.collector, self.emitter]
    }

    fn is_nonlinear(&self) -> bool {
        true
    }

    fn reset(&mut self) {
        self.vbe_prev = 0.0;
        self.vbc_prev = 0.0;
        self.ib = 0.0;
        self.ic = 0.0;
        self.ie = 0.0;
    }

    fn stamp(&mut self, mna: &mut MnaSystem, _t: f64, _dt: f64) {
        mna.stamp_conductance(self.base, self.emitter, GMIN);
        mna.stamp_conductance(self.base, self.collector, GMIN);
    }

    fn do_step(&mut self, mna: &mut MnaSystem, _t: f64, _dt: f64, status: &mut StepStatus) {
        let pol = self.polarity();
        let vb = mna.node_voltage(self.base);
        let vc = mna.node_voltage(self.collector);
        let ve = mna.node_voltage(self.emitter);

        let (vbe, lim_be) = self.limit_step(pol * (vb - ve), self.vbe_prev);
        let (vbc, lim_bc) = self.limit_step(pol * (vb - vc), self.vbc_prev);
        if lim_be
            || lim_bc
            || (vbe - self.vbe_prev).abs() > 0.01
            || (vbc - self.vbc_prev).abs() > 0.01
        {
            status.mark_not_converged();
        }
        self.vbe_prev = vbe;
        self.vbc_prev = vbc;

        let expbe = Self::exp(vbe / VT);
        let expbc = Self::exp(vbc / VT);
        let g_be = LEAKAGE * expbe / VT;
        let g_bc = LEAKAGE * expbc / VT;

        // Small-signal conductances at the iterate.
        let gpi = g_be / self.beta;
        let gmu = g_bc / BETA_R;
        let gmf = g_be;
        let gmr = g_bc * (1.0 + 1.0 / BETA_R);

        let (ib, ic, ie) = self.currents(vbe, vbc);
        self.ib = pol * ib;
        self.ic = pol * ic;
        self.ie = pol * ie;

        // 3x3 Jacobian over (base, collector, emitter). Rows and columns
        // each sum to zero; polarity cancels in the matrix entries.
        let b = self.base;
        let c = self.collector;
        let e = self.emitter;
        mna.stamp_node_matrix(b, b, gpi + gmu);
        mna.stamp_node_matrix(b, c, -gmu);
        mna.stamp_node_matrix(b, e, -gpi);
        mna.stamp_node_matrix(c, b, gmf - gmr);
        mna.stamp_node_matrix(c, c, gmr);
        mna.stamp_node_matrix(c, e, -gmf);
        mna.stamp_node_matrix(e, b, -(gpi + gmu + gmf - gmr));
        mna.stamp_node_matrix(e, c, gmu - gmr);
        mna.stamp_node_matrix(e, e, gpi + gmf);

        // Norton equivalent currents completing the linearization around
        // (vbe, vbc).
        let rhs_b = pol * (ib - gpi * vbe - gmu * vbc);
        let rhs_c = pol * (ic - gmf * vbe + gmr * vbc);
        let rhs_e = pol * (ie + (gpi + gmf) * vbe + (gmu - gmr) * vbc);
        mna.stamp_node_rhs(b, -rhs_b);
        mna.stamp_node_rhs(c, -rhs_c);
        mna.stamp_node_rhs(e, -rhs_e);
    }

    fn calculate_current(&mut self, mna: &MnaSystem) {
        let pol = self.polarity();
        let vb = mna.node_voltage(self.base);
        let vc = mna.node_voltage(self.collector);
        let ve = mna.node_voltage(self.emitter);
        let (ib, ic, ie) = self.currents(pol * (vb - ve), pol * (vb - vc));
        self.ib = pol * ib;
        self.ic = pol * ic;
        self.ie = pol * ie;
    }

    fn save_state(&mut self) {
        self.vbe_ckpt = self.vbe_prev;
        self.vbc_ckpt = self.vbc_prev;
    }

    fn restore_state(&mut self) {
        self.vbe_prev = self.vbe_ckpt;
        self.vbc_prev = self.vbc_ckpt;
    }

    fn scratch(&self, index: usize) -> Option<Value> {
        match index {
            0 => Some(Value::Float(self.ic)),
            1 => Some(Value::Float(self.ib)),
            2 => Some(Value::Float(self.ie)),
            _ => None,
        }
    }
}
