//! Bridge from a resolved netlist parse tree to a Voltaic simulator.
//!
//! The textual netlist format and its parser live outside this workspace;
//! what arrives here is a list of element entries with case-insensitive
//! kind names, integer pin labels (`-1` is ground) and positional typed
//! values. The bridge assigns MNA node indices in first-appearance order,
//! allocates internal nodes and auxiliary branch currents, resolves
//! cross-element references and hands back a ready [`Simulator`].

pub mod build;
pub mod error;
pub mod types;

pub use build::{build_simulator, build_simulator_with_config};
pub use error::{NetlistError, Result};
pub use types::{ElementEntry, ParsedNetlist};
