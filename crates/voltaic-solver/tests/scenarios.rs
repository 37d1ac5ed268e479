//! Driver-level scenarios: small circuits solved end to end through the
//! transient driver, checked against hand-computed values.

use voltaic_core::{NodeId, Value, VoltageSourceId};
use voltaic_devices::{
    Bjt, Capacitor, CurrentSource, DcMotor, Device, Diode, DiodeParams, Element, GateKind,
    Inductor, IntegrationMethod, LogicGate, OpAmp, Resistor, Switch, Transformer, VoltageSource,
    Waveform,
};
use voltaic_solver::{Simulator, SolverConfig, SolverError};

fn n(id: u32) -> NodeId {
    NodeId::new(id)
}

const GND: NodeId = NodeId::GROUND;

/// Allocate internal nodes and auxiliary branches the way the bridge does:
/// internal nodes after the `external` labels, branch ids in element order.
fn wire(mut elements: Vec<Element>, external: usize) -> (usize, usize, Vec<Element>) {
    let mut next_node = external as u32;
    for e in &mut elements {
        let wanted = e.num_internal_nodes();
        if wanted > 0 {
            let ids: Vec<NodeId> = (0..wanted as u32).map(|i| n(next_node + 1 + i)).collect();
            next_node += wanted as u32;
            e.assign_internal_nodes(&ids);
        }
    }
    let mut next_vs = 0;
    for e in &mut elements {
        let wanted = e.num_current_vars();
        if wanted > 0 {
            let ids: Vec<VoltageSourceId> =
                (0..wanted).map(|i| VoltageSourceId::new(next_vs + i)).collect();
            next_vs += wanted;
            e.assign_current_vars(&ids);
        }
    }
    (next_node as usize, next_vs, elements)
}

fn simulator(elements: Vec<Element>, external: usize, config: SolverConfig) -> Simulator {
    let (num_nodes, num_vs, elements) = wire(elements, external);
    Simulator::new(num_nodes, num_vs, elements, config)
}

#[test]
fn test_resistive_divider_dc() {
    // V1 = 5 V onto a single 100 ohm load.
    let elements = vec![
        Element::VoltageSource(VoltageSource::dc("V1", n(1), GND, 5.0)),
        Element::Resistor(Resistor::new("R1", n(1), GND, 100.0)),
    ];
    let mut sim = simulator(elements, 1, SolverConfig::default());
    sim.run_transient(0.1, 0.1, |_, _| {}).unwrap();

    let v = sim.node_voltage(n(1));
    assert!((v - 5.0).abs() < 1e-6, "V(1) = {}", v);
    let i = sim.voltage_source_current(VoltageSourceId::new(0));
    assert!((i + 0.050).abs() < 1e-6, "I(V1) = {}", i);
}

#[test]
fn test_rc_charges_to_source() {
    // V1 - R1 - C1; dt is three orders above RC, so the damped rule is the
    // appropriate discretization.
    let elements = vec![
        Element::VoltageSource(VoltageSource::dc("V1", n(1), GND, 5.0)),
        Element::Resistor(Resistor::new("R1", n(1), n(2), 100.0)),
        Element::Capacitor(Capacitor::new("C1", n(2), GND, 1e-6)),
    ];
    let config = SolverConfig::default().with_method(IntegrationMethod::BackwardEuler);
    let mut sim = simulator(elements, 2, config);
    sim.run_transient(0.1, 10.0, |_, _| {}).unwrap();

    let v1 = sim.node_voltage(n(1));
    let v2 = sim.node_voltage(n(2));
    let i = sim.voltage_source_current(VoltageSourceId::new(0));
    assert!((v1 - 5.0).abs() < 0.1, "V(1) = {}", v1);
    assert!((v2 - 5.0).abs() < 0.1, "V(2) = {}", v2);
    assert!(i.abs() < 0.1, "I(V1) = {}", i);
}

#[test]
fn test_rl_first_step_matches_companion_divider() {
    // V1 - R1 - L1 at dt = 1 us. After the first converged step the
    // inductor presents its trapezoidal companion resistance 2L/dt = 2 kohm.
    let elements = vec![
        Element::VoltageSource(VoltageSource::dc("V1", n(1), GND, 5.0)),
        Element::Resistor(Resistor::new("R1", n(1), n(2), 100.0)),
        Element::Inductor(Inductor::new("L1", n(2), GND, 1e-3)),
    ];
    let mut sim = simulator(elements, 2, SolverConfig::default());
    sim.run_transient(1e-6, 1e-6, |_, _| {}).unwrap();

    let v1 = sim.node_voltage(n(1));
    let v2 = sim.node_voltage(n(2));
    let i = sim.voltage_source_current(VoltageSourceId::new(0));
    assert!((v1 - 5.0).abs() < 1e-6, "V(1) = {}", v1);
    assert!((v2 - 5.0 * 2000.0 / 2100.0).abs() < 1e-4, "V(2) = {}", v2);
    assert!((i + 5.0 / 2100.0).abs() < 1e-6, "I(V1) = {}", i);
}

#[test]
fn test_current_source_drops_node_voltage() {
    // 20 mA pulled from the far end of a 100 ohm feed.
    let elements = vec![
        Element::VoltageSource(VoltageSource::dc("V1", n(1), GND, 5.0)),
        Element::Resistor(Resistor::new("R1", n(1), n(2), 100.0)),
        Element::CurrentSource(CurrentSource::dc("I1", n(2), GND, 0.02)),
    ];
    let mut sim = simulator(elements, 2, SolverConfig::default());
    sim.run_transient(0.1, 0.1, |_, _| {}).unwrap();

    let v2 = sim.node_voltage(n(2));
    assert!((v2 - 3.0).abs() < 0.1, "V(2) = {}", v2);
    let i = sim.voltage_source_current(VoltageSourceId::new(0));
    assert!((i + 0.02).abs() < 0.1, "I(V1) = {}", i);
}

#[test]
fn test_diode_forward_drop() {
    let params = DiodeParams {
        saturation_current: 1e-14,
        emission_coefficient: 1.0,
        series_resistance: 0.1,
        temperature: 300.15,
        ..DiodeParams::default()
    };
    let elements = vec![
        Element::VoltageSource(VoltageSource::dc("V1", n(1), GND, 5.0)),
        Element::Resistor(Resistor::new("R1", n(1), n(2), 100.0)),
        Element::Diode(Diode::new("D1", n(2), GND, params)),
    ];
    let mut sim = simulator(elements, 2, SolverConfig::default());
    sim.run_transient(0.1, 0.1, |_, _| {}).unwrap();

    let v1 = sim.node_voltage(n(1));
    let v2 = sim.node_voltage(n(2));
    assert!((v1 - 5.0).abs() < 0.1, "V(1) = {}", v1);
    // Junction settles near a silicon forward drop.
    assert!(v2 > 0.3 && v2 < 1.0, "diode node sits at {}", v2);
    let drop = v1 - v2;
    assert!(drop > 0.3 && drop < 5.1, "resistor drop {}", drop);
}

#[test]
fn test_npn_saturation_switch() {
    // Vcc = 5 V, Vin = 5 V, Rb = 10k into the base, Rc = 1k into the
    // collector: the transistor is driven hard into saturation.
    let elements = vec![
        Element::VoltageSource(VoltageSource::dc("VCC", n(1), GND, 5.0)),
        Element::VoltageSource(VoltageSource::dc("VIN", n(2), GND, 5.0)),
        Element::Resistor(Resistor::new("RB", n(2), n(3), 10e3)),
        Element::Resistor(Resistor::new("RC", n(1), n(4), 1e3)),
        Element::Bjt(Bjt::new("Q1", n(3), n(4), GND, false, 100.0)),
    ];
    let mut sim = simulator(elements, 4, SolverConfig::default());
    sim.run_transient(0.1, 0.1, |_, _| {}).unwrap();

    let v_base = sim.node_voltage(n(3));
    let v_coll = sim.node_voltage(n(4));
    assert!((v_base - 0.7).abs() < 0.2, "V(base) = {}", v_base);
    assert!((v_coll - 0.2).abs() < 0.2, "V(collector) = {}", v_coll);

    let ib = match sim.element_scratch(4, 1) {
        Some(Value::Float(i)) => i,
        other => panic!("unexpected scratch {:?}", other),
    };
    let ic = match sim.element_scratch(4, 0) {
        Some(Value::Float(i)) => i,
        other => panic!("unexpected scratch {:?}", other),
    };
    let ib_expected = (5.0 - v_base) / 10e3;
    let ic_expected = (5.0 - v_coll) / 1e3;
    assert!(
        (ib - ib_expected).abs() / ib_expected < 0.1,
        "Ib = {} vs {}",
        ib,
        ib_expected
    );
    assert!(
        (ic - ic_expected).abs() / ic_expected < 0.1,
        "Ic = {} vs {}",
        ic,
        ic_expected
    );
}

#[test]
fn test_opamp_non_inverting_gain() {
    // Non-inverting amplifier: gain = 1 + R2/R1 = 3.
    let elements = vec![
        Element::VoltageSource(VoltageSource::dc("V1", n(1), GND, 1.0)),
        Element::OpAmp(OpAmp::new("U1", n(1), n(2), n(3), 15.0, -15.0, 1e5)),
        Element::Resistor(Resistor::new("R1", n(2), GND, 1e3)),
        Element::Resistor(Resistor::new("R2", n(2), n(3), 2e3)),
    ];
    let mut sim = simulator(elements, 3, SolverConfig::default());
    sim.run_transient(1e-3, 1e-3, |_, _| {}).unwrap();

    let v_out = sim.node_voltage(n(3));
    assert!((v_out - 3.0).abs() < 0.5, "V(out) = {}", v_out);
    let virtual_short = (sim.node_voltage(n(1)) - sim.node_voltage(n(2))).abs();
    assert!(virtual_short <= 0.1, "input differential {}", virtual_short);
}

#[test]
fn test_kirchhoff_at_convergence() {
    // At the capacitor node the resistor and capacitor currents must
    // cancel to within the solver tolerance.
    let elements = vec![
        Element::VoltageSource(VoltageSource::dc("V1", n(1), GND, 5.0)),
        Element::Resistor(Resistor::new("R1", n(1), n(2), 100.0)),
        Element::Capacitor(Capacitor::new("C1", n(2), GND, 1e-6)),
    ];
    let mut sim = simulator(elements, 2, SolverConfig::default());
    sim.run_transient(1e-5, 1e-3, |_, _| {}).unwrap();

    let i_r = match sim.element_scratch(1, 0) {
        Some(Value::Float(i)) => i,
        other => panic!("unexpected scratch {:?}", other),
    };
    let i_c = match sim.element_scratch(2, 0) {
        Some(Value::Float(i)) => i,
        other => panic!("unexpected scratch {:?}", other),
    };
    // R1 current flows node1 -> node2, C1 current flows node2 -> ground.
    assert!((i_r - i_c).abs() < 1e-6, "KCL gap {} vs {}", i_r, i_c);
}

#[test]
fn test_switch_toggled_between_runs() {
    let elements = vec![
        Element::VoltageSource(VoltageSource::dc("V1", n(1), GND, 5.0)),
        Element::Switch(Switch::new("S1", n(1), n(2), false, 1e-3, 1e9)),
        Element::Resistor(Resistor::new("R1", n(2), GND, 1e3)),
    ];
    let mut sim = simulator(elements, 2, SolverConfig::default());

    sim.run_transient(0.1, 0.1, |_, _| {}).unwrap();
    assert!(sim.node_voltage(n(2)).abs() < 1e-3, "open switch leaks");

    sim.set_element_param(1, "closed", &Value::Bool(true)).unwrap();
    sim.run_transient(0.1, 0.1, |_, _| {}).unwrap();
    let v = sim.node_voltage(n(2));
    assert!((v - 5.0).abs() < 1e-3, "closed switch V(2) = {}", v);
}

#[test]
fn test_inverter_drives_output() {
    let elements = vec![
        Element::VoltageSource(VoltageSource::dc("VIN", n(1), GND, 5.0)),
        Element::Gate(LogicGate::new(
            "U1",
            GateKind::Inverter,
            vec![n(1)],
            n(2),
            5.0,
        )),
        Element::Resistor(Resistor::new("RL", n(2), GND, 1e3)),
    ];
    let mut sim = simulator(elements, 2, SolverConfig::default());
    sim.run_transient(0.1, 0.1, |_, _| {}).unwrap();
    assert!(sim.node_voltage(n(2)).abs() < 1e-9, "high input -> low output");

    // Low input drives the output to V_high.
    let elements = vec![
        Element::VoltageSource(VoltageSource::dc("VIN", n(1), GND, 0.0)),
        Element::Gate(LogicGate::new(
            "U1",
            GateKind::Inverter,
            vec![n(1)],
            n(2),
            5.0,
        )),
        Element::Resistor(Resistor::new("RL", n(2), GND, 1e3)),
    ];
    let mut sim = simulator(elements, 2, SolverConfig::default());
    sim.run_transient(0.1, 0.1, |_, _| {}).unwrap();
    let v = sim.node_voltage(n(2));
    assert!((v - 5.0).abs() < 1e-9, "low input -> V(2) = {}", v);
}

#[test]
fn test_motor_spins_up_under_voltage() {
    let elements = vec![
        Element::VoltageSource(VoltageSource::dc("V1", n(1), GND, 12.0)),
        Element::Motor(DcMotor::new(
            "M1", n(1), GND, 12.0, 3000.0, 1.0, 1e-3, 0.05, 1e-4, 1e-5,
        )),
    ];
    let mut sim = simulator(elements, 1, SolverConfig::default());
    sim.run_transient(1e-3, 0.05, |_, _| {}).unwrap();

    let omega = match sim.element_scratch(1, 0) {
        Some(Value::Float(w)) => w,
        other => panic!("unexpected scratch {:?}", other),
    };
    assert!(omega > 1.0, "rotor should accelerate, omega = {}", omega);
    let cap = 1.5 * 3000.0 * 2.0 * std::f64::consts::PI / 60.0;
    assert!(omega <= cap + 1e-9, "omega {} exceeds ceiling", omega);
}

#[test]
fn test_transformer_steps_voltage_by_turns_ratio() {
    // 1:2 transformer, lightly loaded secondary, magnetizing impedance
    // far above the source impedance at the driving frequency.
    let elements = vec![
        Element::VoltageSource(VoltageSource::new(
            "V1",
            n(1),
            GND,
            Waveform::sine(0.0, 1.0, 1e3, 0.0),
        )),
        Element::Resistor(Resistor::new("RP", n(1), n(2), 10.0)),
        Element::Transformer(Transformer::new(
            "T1",
            n(2),
            GND,
            n(3),
            GND,
            1.0,
            2.0,
            0.999,
        )),
        Element::Resistor(Resistor::new("RS", n(3), GND, 10e3)),
    ];
    let mut sim = simulator(elements, 3, SolverConfig::default());
    let result = sim.run_collect(1e-5, 1e-3).unwrap();

    // Compare winding amplitudes over a full period; the exact step times
    // do not matter.
    let peak = |idx: usize| {
        result
            .voltage_waveform(idx)
            .iter()
            .map(|(_, v)| v.abs())
            .fold(0.0_f64, f64::max)
    };
    let primary = peak(1);
    let secondary = peak(2);
    assert!(primary > 0.5, "primary amplitude {}", primary);
    assert!(
        (secondary / primary - 2.0).abs() < 0.2,
        "voltage ratio {}",
        secondary / primary
    );
}

#[test]
fn test_zener_clamps_reverse_voltage() {
    // 12 V through 1k into a 5.6 V zener (cathode at the top): the node
    // clamps near the breakdown voltage.
    let params = DiodeParams {
        saturation_current: 1e-14,
        zener_voltage: 5.6,
        ..DiodeParams::default()
    };
    let elements = vec![
        Element::VoltageSource(VoltageSource::dc("V1", n(1), GND, 12.0)),
        Element::Resistor(Resistor::new("R1", n(1), n(2), 1e3)),
        // Reverse-biased: anode at ground, cathode at the divider node.
        Element::Diode(Diode::new("D1", GND, n(2), params)),
    ];
    let mut sim = simulator(elements, 2, SolverConfig::default());
    sim.run_transient(0.1, 0.1, |_, _| {}).unwrap();

    let v2 = sim.node_voltage(n(2));
    assert!(
        v2 > 5.0 && v2 < 6.5,
        "zener should clamp near 5.6 V, got {}",
        v2
    );
}

#[test]
fn test_step_count_ceiling_is_enforced() {
    let elements = vec![
        Element::VoltageSource(VoltageSource::dc("V1", n(1), GND, 5.0)),
        Element::Resistor(Resistor::new("R1", n(1), GND, 100.0)),
    ];
    let config = SolverConfig::default().with_max_steps(5);
    let mut sim = simulator(elements, 1, config);
    let err = sim.run_transient(0.1, 10.0, |_, _| {}).unwrap_err();
    assert!(
        matches!(err, SolverError::StepCountCeiling { max_steps: 5, .. }),
        "unexpected error {:?}",
        err
    );
}

#[test]
fn test_floating_circuit_fails_with_step_floor() {
    // Two nodes with no ground reference: the MNA matrix is singular at
    // any step size, so halving bottoms out at the floor.
    let elements = vec![Element::Resistor(Resistor::new("R1", n(1), n(2), 100.0))];
    let mut sim = simulator(elements, 2, SolverConfig::default());
    let err = sim.run_transient(0.1, 1.0, |_, _| {}).unwrap_err();
    assert!(
        matches!(err, SolverError::StepSizeFloor { .. }),
        "unexpected error {:?}",
        err
    );
}

#[test]
fn test_collected_rc_waveform_is_monotone() {
    let elements = vec![
        Element::VoltageSource(VoltageSource::dc("V1", n(1), GND, 5.0)),
        Element::Resistor(Resistor::new("R1", n(1), n(2), 100.0)),
        Element::Capacitor(Capacitor::new("C1", n(2), GND, 1e-6)),
    ];
    let config = SolverConfig::default().with_method(IntegrationMethod::BackwardEuler);
    let mut sim = simulator(elements, 2, config);
    // dt = RC/10: resolve the exponential.
    let result = sim.run_collect(1e-5, 1e-3).unwrap();

    let wave = result.voltage_waveform(1);
    assert!(wave.len() > 10);
    for pair in wave.windows(2) {
        assert!(
            pair[1].1 >= pair[0].1 - 1e-9,
            "charging waveform should not dip: {:?}",
            pair
        );
    }
    let (_, v_final) = wave.last().unwrap();
    // After 10 time constants the capacitor is charged.
    assert!((v_final - 5.0).abs() < 0.05, "final V = {}", v_final);
}

#[test]
fn test_energy_balance_in_linear_circuit() {
    use voltaic_core::MnaSystem;
    use voltaic_solver::linear;

    // Voltage divider assembled directly: at the converged solution,
    // x' A x equals x' z.
    let mut mna = MnaSystem::new(2, 1);
    mna.stamp_voltage_source(n(1), GND, VoltageSourceId::new(0), 10.0);
    mna.stamp_resistor(n(1), n(2), 1e3);
    mna.stamp_resistor(n(2), GND, 1e3);
    mna.commit();

    let a = mna.effective_matrix();
    let z = mna.effective_rhs();
    let x = linear::solve(&a, &z).unwrap();

    let xtax = (x.transpose() * &a * &x)[(0, 0)];
    let xtz = (x.transpose() * &z)[(0, 0)];
    assert!((xtax - xtz).abs() < 1e-9, "x'Ax = {}, x'z = {}", xtax, xtz);
}
