//! Parse-tree input types delivered by the external netlist parser.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use voltaic_core::Value;

/// One netlist element entry, fully resolved except for typing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementEntry {
    /// Case-insensitive device kind name (e.g. `"resistor"`, `"R"`).
    pub kind_name: String,
    /// Instance label, unique within the netlist.
    pub instance_id: String,
    /// Integer node labels as strings; `-1` denotes ground.
    pub pin_refs: Vec<String>,
    /// Positional parameter values.
    #[serde(default)]
    pub values: Vec<Value>,
}

impl ElementEntry {
    pub fn new(
        kind_name: impl Into<String>,
        instance_id: impl Into<String>,
        pin_refs: &[i64],
        values: Vec<Value>,
    ) -> Self {
        Self {
            kind_name: kind_name.into(),
            instance_id: instance_id.into(),
            pin_refs: pin_refs.iter().map(|p| p.to_string()).collect(),
            values,
        }
    }
}

/// A resolved netlist: element entries plus named value substitutions.
///
/// A `Value::Str` parameter naming a substitution is replaced by the
/// substituted value before positional coercion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedNetlist {
    pub elements: Vec<ElementEntry>,
    #[serde(default)]
    pub substitutions: HashMap<String, Value>,
}

impl ParsedNetlist {
    pub fn new(elements: Vec<ElementEntry>) -> Self {
        Self {
            elements,
            substitutions: HashMap::new(),
        }
    }

    /// Resolve one value through the substitution table.
    pub fn resolve<'a>(&'a self, value: &'a Value) -> &'a Value {
        if let Value::Str(name) = value {
            if let Some(substituted) = self.substitutions.get(name) {
                return substituted;
            }
        }
        value
    }
}
