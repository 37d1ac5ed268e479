//! Translation of a resolved parse tree into a ready simulator.
//!
//! Index assignment happens in three stable passes:
//! 1. one MNA node per distinct non-ground pin label, in first-appearance
//!    order across the element list;
//! 2. one node per internal pin each device requests, in element order;
//! 3. one auxiliary branch current per voltage source a device introduces,
//!    in element order.
//!
//! Current-controlled sources name their controlling voltage source by
//! instance id and are resolved after pass 3.

use indexmap::IndexMap;
use voltaic_core::{NodeId, Value, VoltageSourceId};
use voltaic_devices::{
    Bjt, Capacitor, Cccs, Ccvs, CurrentSource, DcMotor, Device, Diode, DiodeParams, Element,
    GateKind, Inductor, LogicGate, OpAmp, Resistor, Switch, Transformer, Vccs, Vcvs,
    VoltageSource, Waveform,
};
use voltaic_solver::{Simulator, SolverConfig};

use crate::error::{NetlistError, Result};
use crate::types::{ElementEntry, ParsedNetlist};

/// Build a simulator with default solver policy.
pub fn build_simulator(netlist: &ParsedNetlist) -> Result<Simulator> {
    build_simulator_with_config(netlist, SolverConfig::default())
}

/// Build a simulator with explicit solver policy.
pub fn build_simulator_with_config(
    netlist: &ParsedNetlist,
    config: SolverConfig,
) -> Result<Simulator> {
    let mut nodes = NodeTable::default();
    let mut elements = Vec::with_capacity(netlist.elements.len());
    // (element index, controlling source instance id)
    let mut control_refs: Vec<(usize, String)> = Vec::new();

    for entry in &netlist.elements {
        let args = Args { netlist, entry };
        let element = translate(entry, &args, &mut nodes, &mut control_refs, elements.len())?;
        elements.push(element);
    }

    // Internal nodes extend the pool past the external labels.
    for element in &mut elements {
        let wanted = element.num_internal_nodes();
        if wanted > 0 {
            let allocated: Vec<NodeId> = (0..wanted).map(|_| nodes.fresh()).collect();
            element.assign_internal_nodes(&allocated);
        }
    }

    // Auxiliary branch currents, then cross-element resolution.
    let mut next_vs = 0usize;
    let mut vs_by_label: IndexMap<String, VoltageSourceId> = IndexMap::new();
    for element in &mut elements {
        let wanted = element.num_current_vars();
        if wanted > 0 {
            let allocated: Vec<VoltageSourceId> =
                (0..wanted).map(|i| VoltageSourceId::new(next_vs + i)).collect();
            next_vs += wanted;
            vs_by_label.insert(element.label().to_string(), allocated[0]);
            element.assign_current_vars(&allocated);
        }
    }

    for (index, source_name) in control_refs {
        let vs = *vs_by_label
            .get(&source_name)
            .ok_or_else(|| NetlistError::DanglingSourceRef {
                instance: elements[index].label().to_string(),
                source_name: source_name.clone(),
            })?;
        match &mut elements[index] {
            Element::Cccs(e) => e.set_control(vs),
            Element::Ccvs(e) => e.set_control(vs),
            _ => {}
        }
    }

    Ok(Simulator::new(nodes.count(), next_vs, elements, config))
}

/// External-label to node-id assignment, first appearance wins.
#[derive(Default)]
struct NodeTable {
    by_label: IndexMap<i64, NodeId>,
    next: u32,
}

impl NodeTable {
    fn resolve(&mut self, label: i64) -> NodeId {
        if label < 0 {
            return NodeId::GROUND;
        }
        if let Some(&id) = self.by_label.get(&label) {
            return id;
        }
        self.next += 1;
        let id = NodeId::new(self.next);
        self.by_label.insert(label, id);
        id
    }

    fn fresh(&mut self) -> NodeId {
        self.next += 1;
        NodeId::new(self.next)
    }

    fn count(&self) -> usize {
        self.next as usize
    }
}

/// Positional value access with substitution and typed errors.
struct Args<'a> {
    netlist: &'a ParsedNetlist,
    entry: &'a ElementEntry,
}

impl Args<'_> {
    fn get(&self, index: usize) -> Option<&Value> {
        self.entry
            .values
            .get(index)
            .map(|v| self.netlist.resolve(v))
    }

    fn type_error(&self, index: usize, expected: &'static str) -> NetlistError {
        let found = self
            .get(index)
            .map(|v| v.type_name())
            .unwrap_or("nothing");
        NetlistError::ValueType {
            instance: self.entry.instance_id.clone(),
            index,
            expected,
            found,
        }
    }

    fn float(&self, index: usize) -> Result<f64> {
        self.get(index)
            .and_then(Value::as_f64)
            .ok_or_else(|| self.type_error(index, "float"))
    }

    fn float_or(&self, index: usize, default: f64) -> Result<f64> {
        match self.get(index) {
            None => Ok(default),
            Some(v) => v.as_f64().ok_or_else(|| self.type_error(index, "float")),
        }
    }

    fn bool_or(&self, index: usize, default: bool) -> Result<bool> {
        match self.get(index) {
            None => Ok(default),
            Some(v) => v.as_bool().ok_or_else(|| self.type_error(index, "bool")),
        }
    }

    fn str_at(&self, index: usize) -> Result<&str> {
        // Read the raw value: a string here is a reference, not a
        // substitution target.
        self.entry
            .values
            .get(index)
            .and_then(Value::as_str)
            .ok_or_else(|| self.type_error(index, "string"))
    }
}

fn pins(entry: &ElementEntry, nodes: &mut NodeTable, expected: usize) -> Result<Vec<NodeId>> {
    if entry.pin_refs.len() != expected {
        return Err(NetlistError::PinCount {
            kind: entry.kind_name.clone(),
            instance: entry.instance_id.clone(),
            expected,
            found: entry.pin_refs.len(),
        });
    }
    parse_pins(entry, nodes)
}

fn parse_pins(entry: &ElementEntry, nodes: &mut NodeTable) -> Result<Vec<NodeId>> {
    entry
        .pin_refs
        .iter()
        .map(|label| {
            label
                .trim()
                .parse::<i64>()
                .map(|l| nodes.resolve(l))
                .map_err(|_| NetlistError::BadPinLabel {
                    instance: entry.instance_id.clone(),
                    label: label.clone(),
                })
        })
        .collect()
}

fn parse_waveform(args: &Args<'_>) -> Result<Waveform> {
    let Some(first) = args.get(0) else {
        return Ok(Waveform::dc(0.0));
    };
    if let Some(level) = first.as_f64() {
        return Ok(Waveform::dc(level));
    }
    let kind = args.str_at(0)?.to_ascii_lowercase();
    match kind.as_str() {
        "dc" => Ok(Waveform::dc(args.float_or(1, 0.0)?)),
        "sine" | "sin" => Ok(Waveform::Sine {
            bias: args.float_or(1, 0.0)?,
            amplitude: args.float_or(2, 1.0)?,
            frequency: args.float_or(3, 1.0)?,
            phase: args.float_or(4, 0.0)?,
        }),
        "square" => Ok(Waveform::Square {
            bias: args.float_or(1, 0.0)?,
            amplitude: args.float_or(2, 1.0)?,
            frequency: args.float_or(3, 1.0)?,
            duty: args.float_or(4, 0.5)?,
        }),
        "triangle" => Ok(Waveform::Triangle {
            bias: args.float_or(1, 0.0)?,
            amplitude: args.float_or(2, 1.0)?,
            frequency: args.float_or(3, 1.0)?,
        }),
        "sawtooth" => Ok(Waveform::Sawtooth {
            bias: args.float_or(1, 0.0)?,
            amplitude: args.float_or(2, 1.0)?,
            frequency: args.float_or(3, 1.0)?,
        }),
        "pulse" => Ok(Waveform::Pulse {
            bias: args.float_or(1, 0.0)?,
            amplitude: args.float_or(2, 1.0)?,
            frequency: args.float_or(3, 1.0)?,
            duty: args.float_or(4, 0.5)?,
            t_delay: args.float_or(5, 0.0)?,
        }),
        "noise" => Ok(Waveform::Noise {
            bias: args.float_or(1, 0.0)?,
            amplitude: args.float_or(2, 1.0)?,
        }),
        _ => Err(args.type_error(0, "waveform kind")),
    }
}

fn parse_gate_kind(args: &Args<'_>) -> Result<GateKind> {
    let name = args.str_at(0)?.to_ascii_lowercase();
    match name.as_str() {
        "inv" | "not" | "inverter" => Ok(GateKind::Inverter),
        "and" => Ok(GateKind::And),
        "nand" => Ok(GateKind::Nand),
        "or" => Ok(GateKind::Or),
        "nor" => Ok(GateKind::Nor),
        "xor" => Ok(GateKind::Xor),
        "xnor" => Ok(GateKind::Xnor),
        _ => Err(args.type_error(0, "gate kind")),
    }
}

fn translate(
    entry: &ElementEntry,
    args: &Args<'_>,
    nodes: &mut NodeTable,
    control_refs: &mut Vec<(usize, String)>,
    index: usize,
) -> Result<Element> {
    let id = entry.instance_id.clone();
    match entry.kind_name.to_ascii_lowercase().as_str() {
        "r" | "res" | "resistor" => {
            let p = pins(entry, nodes, 2)?;
            Ok(Element::Resistor(Resistor::new(id, p[0], p[1], args.float(0)?)))
        }
        "c" | "cap" | "capacitor" => {
            let p = pins(entry, nodes, 2)?;
            Ok(Element::Capacitor(Capacitor::new(id, p[0], p[1], args.float(0)?)))
        }
        "l" | "ind" | "inductor" => {
            let p = pins(entry, nodes, 2)?;
            Ok(Element::Inductor(Inductor::with_initial_current(
                id,
                p[0],
                p[1],
                args.float(0)?,
                args.float_or(1, 0.0)?,
            )))
        }
        "sw" | "switch" => {
            let p = pins(entry, nodes, 2)?;
            Ok(Element::Switch(Switch::new(
                id,
                p[0],
                p[1],
                args.bool_or(0, false)?,
                args.float_or(1, 1e-3)?,
                args.float_or(2, 1e9)?,
            )))
        }
        "v" | "vsource" | "voltage_source" => {
            let p = pins(entry, nodes, 2)?;
            Ok(Element::VoltageSource(VoltageSource::new(
                id,
                p[0],
                p[1],
                parse_waveform(args)?,
            )))
        }
        "i" | "isource" | "current_source" => {
            let p = pins(entry, nodes, 2)?;
            Ok(Element::CurrentSource(CurrentSource::new(
                id,
                p[0],
                p[1],
                parse_waveform(args)?,
            )))
        }
        "e" | "vcvs" => {
            let p = pins(entry, nodes, 4)?;
            Ok(Element::Vcvs(Vcvs::new(id, p[0], p[1], p[2], p[3], args.float(0)?)))
        }
        "g" | "vccs" => {
            let p = pins(entry, nodes, 4)?;
            Ok(Element::Vccs(Vccs::new(id, p[0], p[1], p[2], p[3], args.float(0)?)))
        }
        "f" | "cccs" => {
            let p = pins(entry, nodes, 2)?;
            control_refs.push((index, args.str_at(0)?.to_string()));
            Ok(Element::Cccs(Cccs::new(id, p[0], p[1], args.float_or(1, 1.0)?)))
        }
        "h" | "ccvs" => {
            let p = pins(entry, nodes, 2)?;
            control_refs.push((index, args.str_at(0)?.to_string()));
            Ok(Element::Ccvs(Ccvs::new(id, p[0], p[1], args.float_or(1, 1.0)?)))
        }
        "d" | "diode" => {
            let p = pins(entry, nodes, 2)?;
            let params = DiodeParams {
                saturation_current: args.float_or(0, 1e-14)?,
                zener_voltage: args.float_or(1, 0.0)?,
                emission_coefficient: args.float_or(2, 1.0)?,
                series_resistance: args.float_or(3, 0.0)?,
                temperature: args.float_or(4, 300.15)?,
                ..DiodeParams::default()
            };
            Ok(Element::Diode(Diode::new(id, p[0], p[1], params)))
        }
        "q" | "bjt" | "transistor" => {
            let p = pins(entry, nodes, 3)?;
            // Pins are (base, collector, emitter).
            Ok(Element::Bjt(Bjt::new(
                id,
                p[0],
                p[1],
                p[2],
                args.bool_or(0, false)?,
                args.float_or(1, 100.0)?,
            )))
        }
        "op" | "opamp" | "op_amp" => {
            let p = pins(entry, nodes, 3)?;
            Ok(Element::OpAmp(OpAmp::new(
                id,
                p[0],
                p[1],
                p[2],
                args.float_or(0, 15.0)?,
                args.float_or(1, -15.0)?,
                args.float_or(2, 1e5)?,
            )))
        }
        "t" | "xfmr" | "transformer" => {
            let p = pins(entry, nodes, 4)?;
            Ok(Element::Transformer(Transformer::new(
                id,
                p[0],
                p[1],
                p[2],
                p[3],
                args.float(0)?,
                args.float_or(1, 1.0)?,
                args.float_or(2, 0.999)?,
            )))
        }
        "m" | "motor" | "dc_motor" => {
            let p = pins(entry, nodes, 2)?;
            Ok(Element::Motor(DcMotor::new(
                id,
                p[0],
                p[1],
                args.float_or(0, 12.0)?,
                args.float_or(1, 3000.0)?,
                args.float_or(2, 1.0)?,
                args.float_or(3, 1e-3)?,
                args.float_or(4, 0.05)?,
                args.float_or(5, 1e-4)?,
                args.float_or(6, 1e-5)?,
            )))
        }
        "gate" | "logic" | "logic_gate" => {
            if entry.pin_refs.len() < 2 {
                return Err(NetlistError::PinCount {
                    kind: entry.kind_name.clone(),
                    instance: entry.instance_id.clone(),
                    expected: 2,
                    found: entry.pin_refs.len(),
                });
            }
            let mut p = parse_pins(entry, nodes)?;
            let output = p.pop().expect("pin count checked above");
            Ok(Element::Gate(LogicGate::new(
                id,
                parse_gate_kind(args)?,
                p,
                output,
                args.float_or(1, 5.0)?,
            )))
        }
        _ => Err(NetlistError::UnknownKind {
            kind: entry.kind_name.clone(),
            instance: entry.instance_id.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: &str, id: &str, pins: &[i64], values: Vec<Value>) -> ElementEntry {
        ElementEntry::new(kind, id, pins, values)
    }

    #[test]
    fn test_nodes_assigned_in_first_appearance_order() {
        let netlist = ParsedNetlist::new(vec![
            entry("V", "V1", &[7, -1], vec![Value::Float(5.0)]),
            entry("R", "R1", &[7, 3], vec![Value::Float(100.0)]),
            entry("R", "R2", &[3, -1], vec![Value::Float(100.0)]),
        ]);
        let sim = build_simulator(&netlist).unwrap();
        // Label 7 saw the netlist first, so it becomes node 1.
        assert_eq!(sim.num_nodes(), 2);
        assert_eq!(sim.num_vsources(), 1);
    }

    #[test]
    fn test_kind_names_are_case_insensitive() {
        let netlist = ParsedNetlist::new(vec![
            entry("Resistor", "R1", &[1, -1], vec![Value::Float(1.0)]),
            entry("RESISTOR", "R2", &[1, -1], vec![Value::Float(1.0)]),
        ]);
        assert!(build_simulator(&netlist).is_ok());
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let netlist = ParsedNetlist::new(vec![entry("flux_capacitor", "X1", &[1, -1], vec![])]);
        assert!(matches!(
            build_simulator(&netlist),
            Err(NetlistError::UnknownKind { .. })
        ));
    }

    #[test]
    fn test_pin_count_is_checked() {
        let netlist = ParsedNetlist::new(vec![entry("R", "R1", &[1], vec![Value::Float(1.0)])]);
        assert!(matches!(
            build_simulator(&netlist),
            Err(NetlistError::PinCount {
                expected: 2,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_value_type_is_checked() {
        let netlist = ParsedNetlist::new(vec![entry("R", "R1", &[1, -1], vec![Value::Bool(true)])]);
        assert!(matches!(
            build_simulator(&netlist),
            Err(NetlistError::ValueType { .. })
        ));
    }

    #[test]
    fn test_missing_required_value_is_rejected() {
        let netlist = ParsedNetlist::new(vec![entry("R", "R1", &[1, -1], vec![])]);
        assert!(matches!(
            build_simulator(&netlist),
            Err(NetlistError::ValueType { .. })
        ));
    }

    #[test]
    fn test_substituted_parameter_value() {
        let mut netlist = ParsedNetlist::new(vec![entry(
            "R",
            "R1",
            &[1, -1],
            vec![Value::Str("rload".to_string())],
        )]);
        netlist
            .substitutions
            .insert("rload".to_string(), Value::Float(470.0));
        assert!(build_simulator(&netlist).is_ok());
    }

    #[test]
    fn test_dangling_control_reference() {
        let netlist = ParsedNetlist::new(vec![entry(
            "F",
            "F1",
            &[1, -1],
            vec![Value::Str("V9".to_string()), Value::Float(2.0)],
        )]);
        assert!(matches!(
            build_simulator(&netlist),
            Err(NetlistError::DanglingSourceRef { .. })
        ));
    }

    #[test]
    fn test_control_reference_resolves() {
        let netlist = ParsedNetlist::new(vec![
            entry("V", "V1", &[1, -1], vec![Value::Float(5.0)]),
            entry("R", "R1", &[1, 2], vec![Value::Float(100.0)]),
            entry(
                "F",
                "F1",
                &[2, -1],
                vec![Value::Str("V1".to_string()), Value::Float(2.0)],
            ),
        ]);
        assert!(build_simulator(&netlist).is_ok());
    }

    #[test]
    fn test_internal_nodes_extend_the_pool() {
        // A diode with series resistance requests one internal node.
        let netlist = ParsedNetlist::new(vec![
            entry("V", "V1", &[1, -1], vec![Value::Float(5.0)]),
            entry(
                "D",
                "D1",
                &[1, -1],
                vec![
                    Value::Float(1e-14),
                    Value::Float(0.0),
                    Value::Float(1.0),
                    Value::Float(0.1),
                ],
            ),
        ]);
        let sim = build_simulator(&netlist).unwrap();
        assert_eq!(sim.num_nodes(), 2);
    }

    #[test]
    fn test_bad_pin_label() {
        let netlist = ParsedNetlist::new(vec![entry_with_pins("R", "R1", vec!["a".into(), "-1".into()])]);
        assert!(matches!(
            build_simulator(&netlist),
            Err(NetlistError::BadPinLabel { .. })
        ));
    }

    fn entry_with_pins(kind: &str, id: &str, pin_refs: Vec<String>) -> ElementEntry {
        ElementEntry {
            kind_name: kind.to_string(),
            instance_id: id.to_string(),
            pin_refs,
            values: vec![Value::Float(1.0)],
        }
    }
}
