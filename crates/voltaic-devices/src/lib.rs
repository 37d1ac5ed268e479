//! Device models and MNA stamps for Voltaic.
//!
//! This crate provides:
//! - The device lifecycle contract every model implements ([`Device`]) and
//!   the closed set of element kinds ([`Element`])
//! - Passive elements: R, C, L, ideal switch
//! - Independent sources with time-varying waveforms
//! - Controlled sources: VCVS, VCCS, CCCS, CCVS
//! - Nonlinear devices: diode (with zener breakdown), BJT, op-amp
//! - Coupled devices: transformer, DC motor
//! - Logic gates driven through auxiliary voltage sources

pub mod bjt;
pub mod controlled;
pub mod diode;
pub mod element;
pub mod error;
pub mod logic;
pub mod motor;
pub mod opamp;
pub mod passive;
pub mod sources;
pub mod transformer;
pub mod waveforms;

pub use bjt::Bjt;
pub use controlled::{Cccs, Ccvs, Vccs, Vcvs};
pub use diode::{Diode, DiodeParams};
pub use element::{Device, Element, IntegrationMethod, ParamChange, StepStatus};
pub use error::{DeviceError, Result};
pub use logic::{GateKind, LogicGate};
pub use motor::DcMotor;
pub use opamp::OpAmp;
pub use passive::{Capacitor, Inductor, Resistor, Switch};
pub use sources::{CurrentSource, VoltageSource};
pub use transformer::Transformer;
pub use waveforms::Waveform;
