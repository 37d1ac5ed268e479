//! Core circuit representation for the Voltaic transient simulator.
//!
//! This crate provides:
//! - Node and auxiliary-branch identifiers ([`NodeId`], [`VoltageSourceId`])
//! - The staged-update overlay used to restore the linear portion of the
//!   system cheaply between Newton iterations ([`overlay::Overlay`])
//! - The MNA system with its stamping vocabulary ([`mna::MnaSystem`])
//! - Loosely-typed parameter values crossing the netlist boundary ([`Value`])

pub mod mna;
pub mod node;
pub mod overlay;
pub mod value;

pub use mna::MnaSystem;
pub use node::{NodeId, VoltageSourceId};
pub use value::Value;
