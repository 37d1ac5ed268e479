//! End-to-end: parse tree in, waveforms out.

use voltaic_core::{NodeId, Value, VoltageSourceId};
use voltaic_netlist::{build_simulator, build_simulator_with_config, ElementEntry, ParsedNetlist};
use voltaic_solver::{IntegrationMethod, SolverConfig};

fn f(v: f64) -> Value {
    Value::Float(v)
}

#[test]
fn test_divider_from_netlist() {
    let netlist = ParsedNetlist::new(vec![
        ElementEntry::new("V", "V1", &[1, -1], vec![f(10.0)]),
        ElementEntry::new("R", "R1", &[1, 2], vec![f(1e3)]),
        ElementEntry::new("R", "R2", &[2, -1], vec![f(1e3)]),
    ]);
    let mut sim = build_simulator(&netlist).unwrap();
    sim.run_transient(0.1, 0.1, |_, _| {}).unwrap();

    // Labels 1 and 2 become nodes 1 and 2 in appearance order.
    let v1 = sim.node_voltage(NodeId::new(1));
    let v2 = sim.node_voltage(NodeId::new(2));
    assert!((v1 - 10.0).abs() < 1e-6, "V(1) = {}", v1);
    assert!((v2 - 5.0).abs() < 1e-6, "V(2) = {}", v2);
    let i = sim.voltage_source_current(VoltageSourceId::new(0));
    assert!((i + 5e-3).abs() < 1e-9, "I(V1) = {}", i);
}

#[test]
fn test_rc_from_netlist_with_config() {
    let netlist = ParsedNetlist::new(vec![
        ElementEntry::new("V", "V1", &[1, -1], vec![f(5.0)]),
        ElementEntry::new("R", "R1", &[1, 2], vec![f(100.0)]),
        ElementEntry::new("C", "C1", &[2, -1], vec![f(1e-6)]),
    ]);
    let config = SolverConfig::default().with_method(IntegrationMethod::BackwardEuler);
    let mut sim = build_simulator_with_config(&netlist, config).unwrap();

    let mut last = 0.0;
    sim.run_transient(1e-5, 1e-3, |_, voltages| last = voltages[1])
        .unwrap();
    assert!((last - 5.0).abs() < 0.05, "capacitor charged to {}", last);
}

#[test]
fn test_observation_api_round_trip() {
    let netlist = ParsedNetlist::new(vec![
        ElementEntry::new("V", "V1", &[1, -1], vec![f(5.0)]),
        ElementEntry::new("R", "R1", &[1, -1], vec![f(100.0)]),
    ]);
    let mut sim = build_simulator(&netlist).unwrap();
    sim.run_transient(0.1, 0.1, |_, _| {}).unwrap();

    // R1 caches its terminal current in scratch slot 0.
    match sim.element_scratch(1, 0) {
        Some(Value::Float(i)) => assert!((i - 0.05).abs() < 1e-9, "I(R1) = {}", i),
        other => panic!("unexpected scratch {:?}", other),
    }

    // Doubling the resistance halves the current on the next run.
    sim.set_element_param(1, "resistance", &f(200.0)).unwrap();
    sim.run_transient(0.1, 0.1, |_, _| {}).unwrap();
    match sim.element_scratch(1, 0) {
        Some(Value::Float(i)) => assert!((i - 0.025).abs() < 1e-9, "I(R1) = {}", i),
        other => panic!("unexpected scratch {:?}", other),
    }
}

#[test]
fn test_sine_source_from_netlist() {
    let netlist = ParsedNetlist::new(vec![
        ElementEntry::new(
            "V",
            "V1",
            &[1, -1],
            vec![Value::Str("sine".into()), f(0.0), f(2.0), f(50.0)],
        ),
        ElementEntry::new("R", "R1", &[1, -1], vec![f(1e3)]),
    ]);
    let mut sim = build_simulator(&netlist).unwrap();

    let mut peak = 0.0_f64;
    sim.run_transient(1e-4, 0.02, |_, voltages| peak = peak.max(voltages[0]))
        .unwrap();
    assert!((peak - 2.0).abs() < 0.05, "sine peak {}", peak);
}

#[test]
fn test_controlled_source_chain() {
    // A CCCS mirroring the current of V1 into a grounded resistor:
    // I(V1) = -1 mA, F1 drives gain * 1 mA through R2.
    let netlist = ParsedNetlist::new(vec![
        ElementEntry::new("V", "V1", &[1, -1], vec![f(1.0)]),
        ElementEntry::new("R", "R1", &[1, -1], vec![f(1e3)]),
        ElementEntry::new(
            "F",
            "F1",
            &[2, -1],
            vec![Value::Str("V1".into()), f(2.0)],
        ),
        ElementEntry::new("R", "R2", &[2, -1], vec![f(1e3)]),
    ]);
    let mut sim = build_simulator(&netlist).unwrap();
    sim.run_transient(0.1, 0.1, |_, _| {}).unwrap();

    // I(V1) = -1 mA; the mirror pulls 2 * (-1 mA) out of node 2.
    let v2 = sim.node_voltage(NodeId::new(2));
    assert!((v2 - 2.0).abs() < 1e-6, "V(2) = {}", v2);
}
