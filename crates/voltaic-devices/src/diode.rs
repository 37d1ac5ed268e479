//! Diode model: Shockley equation with critical-voltage step limiting,
//! optional zener breakdown and series resistance.
//!
//! The Newton linearization stamps a conductance `g_eq = dI/dV` in parallel
//! with `i_eq = I(V) - g_eq·V` between the junction nodes. Large voltage
//! jumps are clamped with the classic critical-voltage limiter; a clamp or a
//! junction move above tolerance marks the iteration unconverged.

use voltaic_core::{MnaSystem, NodeId, Value};

use crate::element::{Device, StepStatus};

/// Boltzmann constant over elementary charge (V/K).
const K_OVER_Q: f64 = 8.617333262e-5;

/// Exponent cap keeping the Shockley evaluation finite while the limiter
/// pulls the iterate back.
const MAX_EXP_ARG: f64 = 50.0;

/// Diode construction parameters.
#[derive(Debug, Clone)]
pub struct DiodeParams {
    /// Saturation current (A).
    pub saturation_current: f64,
    /// Zener breakdown voltage (V); 0 disables the zener branch.
    pub zener_voltage: f64,
    /// Emission coefficient (ideality factor).
    pub emission_coefficient: f64,
    /// Series resistance (ohms); > 0 allocates an internal junction node.
    pub series_resistance: f64,
    /// Junction temperature (K).
    pub temperature: f64,
    /// Half-width of the breakdown smoothing window (V). Policy, not physics.
    pub smoothing_half_width: f64,
}

impl Default for DiodeParams {
    fn default() -> Self {
        Self {
            saturation_current: 1e-14,
            zener_voltage: 0.0,
            emission_coefficient: 1.0,
            series_resistance: 0.0,
            temperature: 300.15,
            smoothing_half_width: 0.1,
        }
    }
}

/// A semiconductor diode (anode, cathode).
#[derive(Debug, Clone)]
pub struct Diode {
    label: String,
    anode: NodeId,
    cathode: NodeId,
    params: DiodeParams,
    /// Internal node between the series resistance and the junction.
    junction: NodeId,
    // Derived at reset:
    vt: f64,
    vscale: f64,
    vd_coef: f64,
    v_crit: f64,
    z_crit: f64,
    z_offset: f64,
    gmin: f64,
    // Scratch:
    v_prev: f64,
    v_ckpt: f64,
    current: f64,
}

impl Diode {
    pub fn new(label: impl Into<String>, anode: NodeId, cathode: NodeId, params: DiodeParams) -> Self {
        let mut d = Self {
            label: label.into(),
            anode,
            cathode,
            params,
            junction: anode,
            vt: 0.0,
            vscale: 0.0,
            vd_coef: 0.0,
            v_crit: 0.0,
            z_crit: 0.0,
            z_offset: 0.0,
            gmin: 0.0,
            v_prev: 0.0,
            v_ckpt: 0.0,
            current: 0.0,
        };
        d.recompute();
        d
    }

    fn recompute(&mut self) {
        let p = &self.params;
        self.vt = K_OVER_Q * p.temperature;
        self.vscale = p.emission_coefficient * self.vt;
        self.vd_coef = 1.0 / self.vscale;
        self.v_crit = self.vscale * (self.vscale / (std::f64::consts::SQRT_2 * p.saturation_current)).ln();
        self.gmin = (p.saturation_current * 0.01).max(1e-12);
        if p.zener_voltage > 0.0 {
            self.z_crit = self.vt * (self.vt / (std::f64::consts::SQRT_2 * p.saturation_current)).ln();
            // Place the breakdown knee so that I(-Vz) = -5 mA.
            let i_knee = -5e-3;
            self.z_offset =
                p.zener_voltage - self.vt * (-(1.0 + i_knee / p.saturation_current)).ln();
        } else {
            self.z_crit = 0.0;
            self.z_offset = 0.0;
        }
    }

    fn junction_node(&self) -> NodeId {
        if self.params.series_resistance > 0.0 {
            self.junction
        } else {
            self.anode
        }
    }

    fn exp(&self, arg: f64) -> f64 {
        arg.min(MAX_EXP_ARG).exp()
    }

    /// Junction current at voltage `vd` (anode-side junction to cathode).
    pub fn diode_current(&self, vd: f64) -> f64 {
        self.eval(vd).1
    }

    /// Linearized model `(g_eq, I)` at `vd`.
    fn eval(&self, vd: f64) -> (f64, f64) {
        let p = &self.params;
        let is = p.saturation_current;
        if vd >= 0.0 || p.zener_voltage <= 0.0 {
            let e = self.exp(vd * self.vd_coef);
            let g = is * self.vd_coef * e + self.gmin;
            let i = is * (e - 1.0) + self.gmin * vd;
            return (g, i);
        }

        // Reverse region with a zener branch. Below the breakdown window
        // the junction is a large leak resistance; above it the translated
        // Shockley takes over; inside, the two blend linearly.
        let vr = -vd;
        let w = p.smoothing_half_width;
        let leak_g = 1e-8;
        let (g_leak, i_leak) = (leak_g, vd * leak_g);

        let ef = self.exp(vd * self.vd_coef);
        let ez = self.exp((vr - self.z_offset) / self.vt);
        let g_zener = is * (self.vd_coef * ef + ez / self.vt) + self.gmin;
        let i_zener = is * (ef - ez - 1.0) + self.gmin * vd;

        if vr <= p.zener_voltage - w {
            (g_leak, i_leak)
        } else if vr >= p.zener_voltage + w {
            (g_zener, i_zener)
        } else {
            let alpha = (vr - (p.zener_voltage - w)) / (2.0 * w);
            (
                (1.0 - alpha) * g_leak + alpha * g_zener,
                (1.0 - alpha) * i_leak + alpha * i_zener,
            )
        }
    }

    /// Critical-voltage step limiter. Returns the clamped voltage and
    /// whether a clamp was applied.
    fn limit_step(&self, vnew: f64, vold: f64) -> (f64, bool) {
        let mut vnew = vnew;
        let mut limited = false;
        if vnew > self.v_crit && (vnew - vold).abs() > 2.0 * self.vscale {
            if vold > 0.0 {
                let arg = 1.0 + (vnew - vold) / self.vscale;
                vnew = if arg > 0.0 {
                    vold + self.vscale * arg.ln()
                } else {
                    self.v_crit
                };
            } else {
                vnew = self.vscale * (vnew * self.vd_coef).ln();
            }
            limited = true;
        } else if vnew < 0.0 && self.z_offset != 0.0 {
            // Same rule in the translated frame of the breakdown knee.
            let mut vtn = -vnew - self.z_offset;
            let vto = -vold - self.z_offset;
            if vtn > self.z_crit && (vtn - vto).abs() > 2.0 * self.vt {
                if vto > 0.0 {
                    let arg = 1.0 + (vtn - vto) / self.vt;
                    vtn = if arg > 0.0 {
                        vto + self.vt * arg.ln()
                    } else {
                        self.z_crit
                    };
                } else {
                    vtn = self.vt * (vtn / self.vt).ln();
                }
                vnew = -(vtn + self.z_offset);
                limited = true;
            }
        }
        (vnew, limited)
    }
}

impl Device for Diode {
    fn label(&self) -> &str {
        &self.label
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.anode, self.cathode]
    }

    fn num_internal_nodes(&self) -> usize {
        usize::from(self.params.series_resistance > 0.0)
    }

    fn assign_internal_nodes(&mut self, nodes: &[NodeId]) {
        if let Some(&junction) = nodes.first() {
            self.junction = junction;
        }
    }

    fn is_nonlinear(&self) -> bool {
        true
    }

    fn reset(&mut self) {
        self.recompute();
        self.v_prev = 0.0;
        self.current = 0.0;
    }

    fn stamp(&mut self, mna: &mut MnaSystem, _t: f64, _dt: f64) {
        if self.params.series_resistance > 0.0 {
            mna.stamp_resistor(self.anode, self.junction, self.params.series_resistance);
        }
    }

    fn do_step(&mut self, mna: &mut MnaSystem, _t: f64, _dt: f64, status: &mut StepStatus) {
        let junction = self.junction_node();
        let vd_raw = mna.node_voltage(junction) - mna.node_voltage(self.cathode);
        let (vd, limited) = self.limit_step(vd_raw, self.v_prev);
        if limited || (vd - self.v_prev).abs() > 0.01 {
            status.mark_not_converged();
        }

        let (geq, i) = self.eval(vd);
        let ieq = i - geq * vd;
        mna.stamp_conductance(junction, self.cathode, geq);
        mna.stamp_current_source(junction, self.cathode, ieq);

        self.v_prev = vd;
    }

    fn calculate_current(&mut self, mna: &MnaSystem) {
        let junction = self.junction_node();
        let vd = mna.node_voltage(junction) - mna.node_voltage(self.cathode);
        self.current = self.diode_current(vd);
    }

    fn save_state(&mut self) {
        self.v_ckpt = self.v_prev;
    }

    fn restore_state(&mut self) {
        self.v_prev = self.v_ckpt;
    }

    fn scratch(&self, index: usize) -> Option<Value> {
        match index {
            0 => Some(Value::Float(self.current)),
            1 => Some(Value::Float(self.v_prev)),
            _ => None,
        }
    }
}
