//! Voltaic: an analog/mixed-signal transient circuit simulator.
//!
//! Given a resolved netlist of two- and multi-terminal devices, Voltaic
//! computes node voltages and branch currents over time using Modified
//! Nodal Analysis, companion-model integration of reactive elements and
//! damped Newton iteration for nonlinear devices.
//!
//! ```
//! use voltaic::{build_simulator, ElementEntry, ParsedNetlist, Value};
//!
//! // 5 V source into a 100 ohm load.
//! let netlist = ParsedNetlist::new(vec![
//!     ElementEntry::new("V", "V1", &[0, -1], vec![Value::Float(5.0)]),
//!     ElementEntry::new("R", "R1", &[0, -1], vec![Value::Float(100.0)]),
//! ]);
//!
//! let mut sim = build_simulator(&netlist).unwrap();
//! sim.run_transient(0.1, 0.5, |_t, voltages| {
//!     assert!((voltages[0] - 5.0).abs() < 1e-6);
//! })
//! .unwrap();
//! ```

pub use voltaic_core::{MnaSystem, NodeId, Value, VoltageSourceId};
pub use voltaic_devices::{
    Bjt, Capacitor, Cccs, Ccvs, CurrentSource, DcMotor, Device, Diode, DiodeParams, Element,
    GateKind, Inductor, IntegrationMethod, LogicGate, OpAmp, ParamChange, Resistor, StepStatus,
    Switch, Transformer, Vccs, Vcvs, VoltageSource, Waveform,
};
pub use voltaic_netlist::{build_simulator, build_simulator_with_config, ElementEntry,
    NetlistError, ParsedNetlist};
pub use voltaic_solver::{
    Result, Simulator, SolverConfig, SolverError, TimePoint, TimeState, TransientResult,
};
