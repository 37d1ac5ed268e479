//! Brushed DC motor.
//!
//! Electrically: series armature resistance, armature inductance (companion
//! model) and a back-EMF voltage source of magnitude `Kt·ω` between the two
//! terminals, using two internal nodes. Mechanically: a first-order rotor
//! ODE integrated explicitly at the end of each accepted step:
//!
//! ```text
//! Te = Kt·I_arm
//! dω/dt = (Te - B·ω) / J
//! ```
//!
//! ω is saturated at 1.5 times the rated speed.

use voltaic_core::{MnaSystem, NodeId, Value, VoltageSourceId};

use crate::element::{Device, IntegrationMethod, StepStatus};

/// A DC motor (two electrical terminals).
#[derive(Debug, Clone)]
pub struct DcMotor {
    label: String,
    term_a: NodeId,
    term_b: NodeId,
    /// Rated voltage (V); retained for observers.
    v_rated: f64,
    /// Rated speed (rpm); bounds ω.
    omega_rated: f64,
    /// Armature resistance (ohms).
    ra: f64,
    /// Armature inductance (H).
    la: f64,
    /// Torque/back-EMF constant (N·m/A, V·s/rad).
    kt: f64,
    /// Rotor inertia (kg·m²).
    inertia: f64,
    /// Viscous friction (N·m·s/rad).
    friction: f64,
    method: IntegrationMethod,
    /// term_a ── Ra ── mid ── La ── emf ── term_b
    mid: NodeId,
    emf_node: NodeId,
    vs: VoltageSourceId,
    // Armature inductor companion scratch:
    geq: f64,
    i_hist: f64,
    v_prev: f64,
    i_prev: f64,
    // Mechanical state:
    omega: f64,
    torque: f64,
    i_arm: f64,
    // Checkpoints:
    v_ckpt: f64,
    i_ckpt: f64,
    omega_ckpt: f64,
}

impl DcMotor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        label: impl Into<String>,
        term_a: NodeId,
        term_b: NodeId,
        v_rated: f64,
        omega_rated: f64,
        ra: f64,
        la: f64,
        kt: f64,
        inertia: f64,
        friction: f64,
    ) -> Self {
        Self {
            label: label.into(),
            term_a,
            term_b,
            v_rated,
            omega_rated,
            ra,
            la,
            kt,
            inertia,
            friction,
            method: IntegrationMethod::default(),
            mid: term_a,
            emf_node: term_b,
            vs: VoltageSourceId::new(0),
            geq: 0.0,
            i_hist: 0.0,
            v_prev: 0.0,
            i_prev: 0.0,
            omega: 0.0,
            torque: 0.0,
            i_arm: 0.0,
            v_ckpt: 0.0,
            i_ckpt: 0.0,
            omega_ckpt: 0.0,
        }
    }

    /// Rotor speed ceiling (rad/s): 1.5x rated rpm.
    fn omega_max(&self) -> f64 {
        1.5 * self.omega_rated * 2.0 * std::f64::consts::PI / 60.0
    }

    fn inductor_conductance(&self, dt: f64) -> f64 {
        match self.method {
            IntegrationMethod::BackwardEuler => dt / self.la,
            IntegrationMethod::Trapezoidal => dt / (2.0 * self.la),
        }
    }

    pub fn rated_voltage(&self) -> f64 {
        self.v_rated
    }
}

impl Device for DcMotor {
    fn label(&self) -> &str {
        &self.label
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.term_a, self.term_b]
    }

    fn num_internal_nodes(&self) -> usize {
        2
    }

    fn assign_internal_nodes(&mut self, nodes: &[NodeId]) {
        self.mid = nodes[0];
        self.emf_node = nodes[1];
    }

    fn num_current_vars(&self) -> usize {
        1
    }

    fn assign_current_vars(&mut self, vars: &[VoltageSourceId]) {
        self.vs = vars[0];
    }

    fn set_integration_method(&mut self, method: IntegrationMethod) {
        self.method = method;
    }

    fn reset(&mut self) {
        self.geq = 0.0;
        self.i_hist = 0.0;
        self.v_prev = 0.0;
        self.i_prev = 0.0;
        self.omega = 0.0;
        self.torque = 0.0;
        self.i_arm = 0.0;
    }

    fn start_iteration(&mut self, _mna: &MnaSystem, _t: f64, dt: f64) {
        self.geq = self.inductor_conductance(dt);
        self.i_hist = match self.method {
            IntegrationMethod::BackwardEuler => self.i_prev,
            IntegrationMethod::Trapezoidal => self.geq * self.v_prev + self.i_prev,
        };
    }

    fn stamp(&mut self, mna: &mut MnaSystem, _t: f64, _dt: f64) {
        mna.stamp_resistor(self.term_a, self.mid, self.ra);
        mna.stamp_conductance(self.mid, self.emf_node, self.geq);
        mna.stamp_voltage_source(self.emf_node, self.term_b, self.vs, 0.0);
    }

    fn do_step(&mut self, mna: &mut MnaSystem, _t: f64, _dt: f64, _status: &mut StepStatus) {
        mna.stamp_current_source(self.mid, self.emf_node, self.i_hist);
        mna.update_voltage_source(self.vs, self.kt * self.omega);
    }

    fn calculate_current(&mut self, mna: &MnaSystem) {
        let v = mna.node_voltage(self.mid) - mna.node_voltage(self.emf_node);
        self.i_arm = self.geq * v + self.i_hist;
    }

    fn step_finished(&mut self, mna: &MnaSystem, _t: f64, dt: f64) {
        self.v_prev = mna.node_voltage(self.mid) - mna.node_voltage(self.emf_node);
        self.i_prev = self.i_arm;

        self.torque = self.kt * self.i_arm;
        let domega = (self.torque - self.friction * self.omega) / self.inertia;
        self.omega += dt * domega;
        let cap = self.omega_max();
        self.omega = self.omega.clamp(-cap, cap);
    }

    fn save_state(&mut self) {
        self.v_ckpt = self.v_prev;
        self.i_ckpt = self.i_prev;
        self.omega_ckpt = self.omega;
    }

    fn restore_state(&mut self) {
        self.v_prev = self.v_ckpt;
        self.i_prev = self.i_ckpt;
        self.omega = self.omega_ckpt;
    }

    fn scratch(&self, index: usize) -> Option<Value> {
        match index {
            0 => Some(Value::Float(self.omega)),
            1 => Some(Value::Float(self.i_arm)),
            2 => Some(Value::Float(self.torque)),
            _ => None,
        }
    }
}
