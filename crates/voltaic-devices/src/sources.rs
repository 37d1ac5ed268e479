//! Independent voltage and current sources.

use voltaic_core::{MnaSystem, NodeId, Value, VoltageSourceId};

use crate::element::{Device, ParamChange, StepStatus};
use crate::error::{DeviceError, Result};
use crate::waveforms::{GaussianNoise, Waveform};

/// An independent voltage source `V(n1) - V(n2) = v(t)`.
///
/// DC sources stamp their value into the linear snapshot once; time-varying
/// sources stamp a zero-valued row and refresh it every Newton iteration.
/// Noise sources hold their sample constant within a step and resample when
/// the step is accepted.
#[derive(Debug, Clone)]
pub struct VoltageSource {
    label: String,
    n1: NodeId,
    n2: NodeId,
    vs: VoltageSourceId,
    waveform: Waveform,
    noise: Option<GaussianNoise>,
    noise_sample: f64,
    noise_ckpt: f64,
    current: f64,
}

impl VoltageSource {
    pub fn new(label: impl Into<String>, n1: NodeId, n2: NodeId, waveform: Waveform) -> Self {
        let label = label.into();
        let noise = match waveform {
            Waveform::Noise { .. } => {
                // Seed from the label so independent sources decorrelate.
                let seed = label
                    .bytes()
                    .fold(0xcbf29ce484222325u64, |h, b| {
                        (h ^ b as u64).wrapping_mul(0x100000001b3)
                    });
                Some(GaussianNoise::new(seed))
            }
            _ => None,
        };
        Self {
            label,
            n1,
            n2,
            vs: VoltageSourceId::new(0),
            waveform,
            noise,
            noise_sample: 0.0,
            noise_ckpt: 0.0,
            current: 0.0,
        }
    }

    pub fn dc(label: impl Into<String>, n1: NodeId, n2: NodeId, level: f64) -> Self {
        Self::new(label, n1, n2, Waveform::dc(level))
    }

    /// Source level at time `t`, including the held noise sample.
    pub fn level(&self, t: f64) -> f64 {
        let base = self.waveform.value(t);
        match self.waveform {
            Waveform::Noise { amplitude, .. } => base + amplitude * self.noise_sample,
            _ => base,
        }
    }

    pub fn branch(&self) -> VoltageSourceId {
        self.vs
    }
}

impl Device for VoltageSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.n1, self.n2]
    }

    fn num_current_vars(&self) -> usize {
        1
    }

    fn assign_current_vars(&mut self, vars: &[VoltageSourceId]) {
        self.vs = vars[0];
    }

    fn reset(&mut self) {
        self.noise_sample = 0.0;
        self.current = 0.0;
    }

    fn stamp(&mut self, mna: &mut MnaSystem, t: f64, _dt: f64) {
        if self.waveform.is_dc() {
            mna.stamp_voltage_source(self.n1, self.n2, self.vs, self.level(t));
        } else {
            mna.stamp_voltage_source(self.n1, self.n2, self.vs, 0.0);
        }
    }

    fn do_step(&mut self, mna: &mut MnaSystem, t: f64, _dt: f64, _status: &mut StepStatus) {
        if !self.waveform.is_dc() {
            mna.update_voltage_source(self.vs, self.level(t));
        }
    }

    fn calculate_current(&mut self, mna: &MnaSystem) {
        self.current = mna.vsource_current(self.vs);
    }

    fn step_finished(&mut self, _mna: &MnaSystem, _t: f64, _dt: f64) {
        if let Some(noise) = self.noise.as_mut() {
            self.noise_sample = noise.next();
        }
    }

    fn save_state(&mut self) {
        self.noise_ckpt = self.noise_sample;
    }

    fn restore_state(&mut self) {
        self.noise_sample = self.noise_ckpt;
    }

    fn scratch(&self, index: usize) -> Option<Value> {
        match index {
            0 => Some(Value::Float(self.current)),
            _ => None,
        }
    }

    fn set_param(&mut self, key: &str, value: &Value) -> Result<ParamChange> {
        match key {
            "level" => {
                let level = value.as_f64().ok_or_else(|| DeviceError::ParamType {
                    device: self.label.clone(),
                    key: key.to_string(),
                    expected: "float",
                })?;
                self.waveform = Waveform::dc(level);
                self.noise = None;
                // The level lives in the linear snapshot for DC sources.
                Ok(ParamChange::NeedsRestamp)
            }
            _ => Err(DeviceError::UnknownParam {
                device: self.label.clone(),
                key: key.to_string(),
            }),
        }
    }
}

/// An independent current source driving `i(t)` amps out of `n1` into `n2`.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    label: String,
    n1: NodeId,
    n2: NodeId,
    waveform: Waveform,
    current: f64,
}

impl CurrentSource {
    pub fn new(label: impl Into<String>, n1: NodeId, n2: NodeId, waveform: Waveform) -> Self {
        Self {
            label: label.into(),
            n1,
            n2,
            waveform,
            current: 0.0,
        }
    }

    pub fn dc(label: impl Into<String>, n1: NodeId, n2: NodeId, level: f64) -> Self {
        Self::new(label, n1, n2, Waveform::dc(level))
    }
}

impl Device for CurrentSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.n1, self.n2]
    }

    fn stamp(&mut self, mna: &mut MnaSystem, t: f64, _dt: f64) {
        if self.waveform.is_dc() {
            mna.stamp_current_source(self.n1, self.n2, self.waveform.value(t));
        }
    }

    fn do_step(&mut self, mna: &mut MnaSystem, t: f64, _dt: f64, _status: &mut StepStatus) {
        if !self.waveform.is_dc() {
            mna.stamp_current_source(self.n1, self.n2, self.waveform.value(t));
        }
    }

    fn calculate_current(&mut self, _mna: &MnaSystem) {
        // The branch current is the programmed value by construction.
    }

    fn step_finished(&mut self, _mna: &MnaSystem, t: f64, _dt: f64) {
        self.current = self.waveform.value(t);
    }

    fn scratch(&self, index: usize) -> Option<Value> {
        match index {
            0 => Some(Value::Float(self.current)),
            _ => None,
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
    fn test_dc_source_stamps_level_once() {
        let mut v = VoltageSource::dc("V1", n(1), NodeId::GROUND, 5.0);
        v.assign_current_vars(&[VoltageSourceId::new(0)]);
        let mut mna = MnaSystem::new(1, 1);
        v.stamp(&mut mna, 0.0, 0.1);
        assert_eq!(mna.rhs_entry(1), 5.0);
    }

    #[test]
    fn test_sine_source_refreshes_per_iteration() {
        let mut v = VoltageSource::new(
            "V1",
            n(1),
            NodeId::GROUND,
            Waveform::sine(0.0, 1.0, 1.0, 0.0),
        );
        v.assign_current_vars(&[VoltageSourceId::new(0)]);
        let mut mna = MnaSystem::new(1, 1);
        let mut status = StepStatus::new();

        v.stamp(&mut mna, 0.25, 0.1);
        assert_eq!(mna.rhs_entry(1), 0.0);

        v.do_step(&mut mna, 0.25, 0.1, &mut status);
        assert!((mna.rhs_entry(1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_noise_sample_held_within_step() {
        let mut v = VoltageSource::new(
            "V1",
            n(1),
            NodeId::GROUND,
            Waveform::Noise {
                bias: 0.0,
                amplitude: 0.1,
            },
        );
        let mna = MnaSystem::new(1, 1);
        let before = v.level(0.0);
        assert_eq!(before, v.level(1.0));

        v.step_finished(&mna, 0.1, 0.1);
        let after = v.level(0.0);
        assert_ne!(before, after, "step_finished should resample");
    }
}
