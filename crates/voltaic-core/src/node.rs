//! Node and auxiliary-branch identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a circuit node.
///
/// Node 0 is ground: the electrical reference, always 0 V, never a matrix
/// variable. Nodes `1..=N` map to MNA matrix rows/columns `0..N-1`.
///
/// Netlists use `-1` for ground; the bridge maps that label onto
/// [`NodeId::GROUND`] so the sentinel never leaks past the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    /// The ground (reference) node.
    pub const GROUND: NodeId = NodeId(0);

    /// Create a node identifier. `0` is ground.
    pub const fn new(id: u32) -> Self {
        NodeId(id)
    }

    /// Returns true if this is the ground node.
    pub const fn is_ground(self) -> bool {
        self.0 == 0
    }

    /// Raw node number (0 for ground).
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// MNA matrix index for this node, or `None` for ground.
    pub const fn index(self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some((self.0 - 1) as usize)
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ground() {
            write!(f, "gnd")
        } else {
            write!(f, "n{}", self.0)
        }
    }
}

/// Index of an auxiliary branch-current unknown.
///
/// Every voltage source (independent, controlled, or internal to a device)
/// owns one auxiliary row/column pair; id `k` lives at matrix index `N + k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoltageSourceId(usize);

impl VoltageSourceId {
    pub const fn new(id: usize) -> Self {
        VoltageSourceId(id)
    }

    /// Position among the auxiliary unknowns (matrix row is `N + index`).
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for VoltageSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vs{}", self.0)
    }
}
