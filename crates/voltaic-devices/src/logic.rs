//! Logic gates driven through an auxiliary voltage source.
//!
//! Inputs threshold at `V_high / 2`; the output node is forced to `V_high`
//! or 0 by an ideal voltage source whose value refreshes each Newton
//! iteration. An output flip marks the iteration unconverged so downstream
//! devices settle against the new level.

use voltaic_core::{MnaSystem, NodeId, Value, VoltageSourceId};

use crate::element::{Device, StepStatus};

/// Boolean function of a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    Inverter,
    And,
    Nand,
    Or,
    Nor,
    Xor,
    Xnor,
}

impl GateKind {
    /// Evaluate the gate over its input bits.
    pub fn evaluate(self, inputs: &[bool]) -> bool {
        match self {
            GateKind::Inverter => !inputs.first().copied().unwrap_or(false),
            GateKind::And => inputs.iter().all(|&b| b),
            GateKind::Nand => !inputs.iter().all(|&b| b),
            GateKind::Or => inputs.iter().any(|&b| b),
            GateKind::Nor => !inputs.iter().any(|&b| b),
            GateKind::Xor => inputs.iter().filter(|&&b| b).count() % 2 == 1,
            GateKind::Xnor => inputs.iter().filter(|&&b| b).count() % 2 == 0,
        }
    }
}

/// A logic gate with variadic inputs and one driven output.
#[derive(Debug, Clone)]
pub struct LogicGate {
    label: String,
    kind: GateKind,
    inputs: Vec<NodeId>,
    output: NodeId,
    v_high: f64,
    vs: VoltageSourceId,
    level: f64,
    level_ckpt: f64,
    current: f64,
}

impl LogicGate {
    pub fn new(
        label: impl Into<String>,
        kind: GateKind,
        inputs: Vec<NodeId>,
        output: NodeId,
        v_high: f64,
    ) -> Self {
        Self {
            label: label.into(),
            kind,
            inputs,
            output,
            v_high,
            vs: VoltageSourceId::new(0),
            level: 0.0,
            level_ckpt: 0.0,
            current: 0.0,
        }
    }
}

impl Device for LogicGate {
    fn label(&self) -> &str {
        &self.label
    }

    fn nodes(&self) -> Vec<NodeId> {
        let mut nodes = self.inputs.clone();
        nodes.push(self.output);
        nodes
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
        self.level = 0.0;
        self.current = 0.0;
    }

    fn stamp(&mut self, mna: &mut MnaSystem, _t: f64, _dt: f64) {
        mna.stamp_voltage_source(self.output, NodeId::GROUND, self.vs, 0.0);
    }

    fn do_step(&mut self, mna: &mut MnaSystem, _t: f64, _dt: f64, status: &mut StepStatus) {
        let threshold = self.v_high * 0.5;
        let bits: Vec<bool> = self
            .inputs
            .iter()
            .map(|&n| mna.node_voltage(n) > threshold)
            .collect();
        let level = if self.kind.evaluate(&bits) {
            self.v_high
        } else {
            0.0
        };
        if level != self.level {
            status.mark_not_converged();
        }
        self.level = level;
        mna.update_voltage_source(self.vs, level);
    }

    fn calculate_current(&mut self, mna: &MnaSystem) {
        self.current = mna.vsource_current(self.vs);
    }

    fn save_state(&mut self) {
        self.level_ckpt = self.level;
    }

    fn restore_state(&mut self) {
        self.level = self.level_ckpt;
    }

    fn scratch(&self, index: usize) -> Option<Value> {
        match index {
            0 => Some(Value::Float(self.level)),
            1 => Some(Value::Float(self.current)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_truth_tables() {
        use GateKind::*;
        assert!(Inverter.evaluate(&[false]));
        assert!(!Inverter.evaluate(&[true]));
        assert!(And.evaluate(&[true, true]));
        assert!(!And.evaluate(&[true, false]));
        assert!(Nand.evaluate(&[true, false]));
        assert!(Or.evaluate(&[false, true]));
        assert!(!Nor.evaluate(&[false, true]));
        assert!(Nor.evaluate(&[false, false]));
        assert!(Xor.evaluate(&[true, false]));
        assert!(!Xor.evaluate(&[true, true]));
        assert!(Xnor.evaluate(&[true, true]));
    }

    #[test]
    fn test_output_flip_marks_unconverged() {
        let mut g = LogicGate::new(
            "U1",
            GateKind::Inverter,
            vec![NodeId::new(1)],
            NodeId::new(2),
            5.0,
        );
        g.assign_current_vars(&[VoltageSourceId::new(0)]);
        g.reset();

        // Input low: inverter drives high; first evaluation flips 0 → 5.
        let mut mna = MnaSystem::new(2, 1);
        let mut status = StepStatus::new();
        g.do_step(&mut mna, 0.0, 0.1, &mut status);
        assert!(!status.converged());
        assert_eq!(mna.rhs_entry(2), 5.0);

        // Stable second iteration.
        status.reset();
        g.do_step(&mut mna, 0.0, 0.1, &mut status);
        assert!(status.converged());
    }
}
