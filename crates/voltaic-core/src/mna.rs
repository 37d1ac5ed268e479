//! Modified Nodal Analysis system and stamping primitives.
//!
//! The system solves `A·x = z` where `x` holds the `N` non-ground node
//! voltages followed by `M` auxiliary branch currents (one per voltage
//! source). Devices contribute through the additive stamping vocabulary
//! below; every primitive silently drops any reference to ground.
//!
//! `A` and `z` are split into a backing store (the linear snapshot, written
//! once per time step) and a staged overlay (per-Newton-iteration nonlinear
//! contributions). See [`crate::overlay`].

use nalgebra::{DMatrix, DVector};

use crate::node::{NodeId, VoltageSourceId};
use crate::overlay::Overlay;

/// The MNA matrix system for one simulator instance.
#[derive(Debug, Clone)]
pub struct MnaSystem {
    num_nodes: usize,
    num_vsources: usize,
    /// Backing matrix; after `commit` this is the linear snapshot.
    a: DMatrix<f64>,
    /// Backing right-hand side.
    z: DVector<f64>,
    a_overlay: Overlay,
    z_overlay: Overlay,
    /// Current solution (node voltages, then branch currents).
    x: DVector<f64>,
    /// Solution at the last committed time step.
    x_prev: DVector<f64>,
}

impl MnaSystem {
    /// Create a zeroed system for `num_nodes` non-ground nodes and
    /// `num_vsources` auxiliary branch currents.
    pub fn new(num_nodes: usize, num_vsources: usize) -> Self {
        let size = num_nodes + num_vsources;
        Self {
            num_nodes,
            num_vsources,
            a: DMatrix::zeros(size, size),
            z: DVector::zeros(size),
            a_overlay: Overlay::new(size * size),
            z_overlay: Overlay::new(size),
            x: DVector::zeros(size),
            x_prev: DVector::zeros(size),
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_vsources(&self) -> usize {
        self.num_vsources
    }

    /// Total number of unknowns (`N + M`).
    pub fn size(&self) -> usize {
        self.num_nodes + self.num_vsources
    }

    /// Matrix row/column of a voltage source's branch-current unknown.
    pub fn vs_row(&self, vs: VoltageSourceId) -> usize {
        self.num_nodes + vs.index()
    }

    // ── staged-update layer ──────────────────────────────────────────

    /// Zero the backing store and discard all pending deltas.
    ///
    /// Used when the linear portion must be rebuilt (first step, or a step
    /// size / parameter change invalidated the companion conductances).
    pub fn clear(&mut self) {
        self.a.fill(0.0);
        self.z.fill(0.0);
        self.a_overlay.rollback();
        self.z_overlay.rollback();
    }

    /// Fold pending stamps into the backing store.
    ///
    /// Called once after linear stamping; the backing store then *is* the
    /// linear snapshot that `rollback` restores.
    pub fn commit(&mut self) {
        let size = self.size();
        let a = &mut self.a;
        self.a_overlay.commit(|i, d| a[(i / size, i % size)] += d);
        let z = &mut self.z;
        self.z_overlay.commit(|i, d| z[i] += d);
    }

    /// Discard pending stamps, restoring the linear snapshot.
    pub fn rollback(&mut self) {
        self.a_overlay.rollback();
        self.z_overlay.rollback();
    }

    /// Effective matrix entry (backing plus pending delta).
    pub fn matrix_entry(&self, row: usize, col: usize) -> f64 {
        self.a[(row, col)] + self.a_overlay.delta(row * self.size() + col)
    }

    /// Effective right-hand-side entry.
    pub fn rhs_entry(&self, row: usize) -> f64 {
        self.z[row] + self.z_overlay.delta(row)
    }

    /// Materialize the effective matrix for factorization.
    pub fn effective_matrix(&self) -> DMatrix<f64> {
        let size = self.size();
        let mut a = self.a.clone();
        for &i in self.a_overlay.touched() {
            a[(i / size, i % size)] += self.a_overlay.delta(i);
        }
        a
    }

    /// Materialize the effective right-hand side.
    pub fn effective_rhs(&self) -> DVector<f64> {
        let mut z = self.z.clone();
        for &i in self.z_overlay.touched() {
            z[i] += self.z_overlay.delta(i);
        }
        z
    }

    // ── stamping vocabulary ──────────────────────────────────────────

    /// `A[row, col] += v` at raw matrix indices.
    pub fn stamp_matrix(&mut self, row: usize, col: usize, v: f64) {
        let size = self.size();
        self.a_overlay.add(row * size + col, v);
    }

    /// `z[row] += v` at a raw index.
    pub fn stamp_rhs(&mut self, row: usize, v: f64) {
        self.z_overlay.add(row, v);
    }

    /// `z[row] = v` (set, not add).
    pub fn set_rhs(&mut self, row: usize, v: f64) {
        self.z_overlay.set_delta(row, v - self.z[row]);
    }

    /// `A[i, j] += v` between two nodes; dropped if either is ground.
    pub fn stamp_node_matrix(&mut self, i: NodeId, j: NodeId, v: f64) {
        if let (Some(r), Some(c)) = (i.index(), j.index()) {
            self.stamp_matrix(r, c, v);
        }
    }

    /// `z[n] += v`; dropped for ground.
    pub fn stamp_node_rhs(&mut self, n: NodeId, v: f64) {
        if let Some(r) = n.index() {
            self.stamp_rhs(r, v);
        }
    }

    /// Stamp a conductance `g` between `n1` and `n2`.
    pub fn stamp_conductance(&mut self, n1: NodeId, n2: NodeId, g: f64) {
        if let Some(i) = n1.index() {
            self.stamp_matrix(i, i, g);
        }
        if let Some(j) = n2.index() {
            self.stamp_matrix(j, j, g);
        }
        if let (Some(i), Some(j)) = (n1.index(), n2.index()) {
            self.stamp_matrix(i, j, -g);
            self.stamp_matrix(j, i, -g);
        }
    }

    /// Stamp a resistor of `r` ohms between `n1` and `n2`.
    ///
    /// Non-positive or non-finite resistance is a no-op.
    pub fn stamp_resistor(&mut self, n1: NodeId, n2: NodeId, r: f64) {
        if r > 0.0 && r.is_finite() {
            self.stamp_conductance(n1, n2, 1.0 / r);
        }
    }

    /// Stamp a current source driving `i` amps out of `n1`, into `n2`.
    pub fn stamp_current_source(&mut self, n1: NodeId, n2: NodeId, i: f64) {
        if let Some(r) = n1.index() {
            self.stamp_rhs(r, -i);
        }
        if let Some(r) = n2.index() {
            self.stamp_rhs(r, i);
        }
    }

    /// Stamp an ideal voltage source `V(n1) - V(n2) = v` on auxiliary
    /// branch `vs`. The right-hand-side entry is set, not accumulated.
    pub fn stamp_voltage_source(&mut self, n1: NodeId, n2: NodeId, vs: VoltageSourceId, v: f64) {
        let row = self.vs_row(vs);
        if let Some(i) = n1.index() {
            self.stamp_matrix(row, i, 1.0);
            self.stamp_matrix(i, row, 1.0);
        }
        if let Some(j) = n2.index() {
            self.stamp_matrix(row, j, -1.0);
            self.stamp_matrix(j, row, -1.0);
        }
        self.set_rhs(row, v);
    }

    /// Refresh the value of an already-stamped voltage source.
    pub fn update_voltage_source(&mut self, vs: VoltageSourceId, v: f64) {
        let row = self.vs_row(vs);
        self.set_rhs(row, v);
    }

    /// Stamp a voltage-controlled voltage source:
    /// `V(out_p) - V(out_n) = gain * (V(ctrl_p) - V(ctrl_n))`.
    pub fn stamp_vcvs(
        &mut self,
        out_p: NodeId,
        out_n: NodeId,
        ctrl_p: NodeId,
        ctrl_n: NodeId,
        vs: VoltageSourceId,
        gain: f64,
    ) {
        self.stamp_voltage_source(out_p, out_n, vs, 0.0);
        let row = self.vs_row(vs);
        if let Some(i) = ctrl_p.index() {
            self.stamp_matrix(row, i, -gain);
        }
        if let Some(j) = ctrl_n.index() {
            self.stamp_matrix(row, j, gain);
        }
    }

    /// Stamp a voltage-controlled current source:
    /// `gm * (V(ctrl_p) - V(ctrl_n))` amps out of `out_p`, into `out_n`.
    pub fn stamp_vccs(
        &mut self,
        out_p: NodeId,
        out_n: NodeId,
        ctrl_p: NodeId,
        ctrl_n: NodeId,
        gm: f64,
    ) {
        if let (Some(i), Some(k)) = (out_p.index(), ctrl_p.index()) {
            self.stamp_matrix(i, k, gm);
        }
        if let (Some(i), Some(l)) = (out_p.index(), ctrl_n.index()) {
            self.stamp_matrix(i, l, -gm);
        }
        if let (Some(j), Some(k)) = (out_n.index(), ctrl_p.index()) {
            self.stamp_matrix(j, k, -gm);
        }
        if let (Some(j), Some(l)) = (out_n.index(), ctrl_n.index()) {
            self.stamp_matrix(j, l, gm);
        }
    }

    /// Stamp a current-controlled current source:
    /// `gain * I(ctrl)` amps out of `n1`, into `n2`, where `ctrl` is the
    /// branch current of an existing voltage source.
    pub fn stamp_cccs(&mut self, n1: NodeId, n2: NodeId, ctrl: VoltageSourceId, gain: f64) {
        let col = self.vs_row(ctrl);
        if let Some(i) = n1.index() {
            self.stamp_matrix(i, col, gain);
        }
        if let Some(j) = n2.index() {
            self.stamp_matrix(j, col, -gain);
        }
    }

    /// Stamp a current-controlled voltage source:
    /// `V(out_p) - V(out_n) = gain * I(ctrl)` on auxiliary branch `vs`.
    pub fn stamp_ccvs(
        &mut self,
        out_p: NodeId,
        out_n: NodeId,
        ctrl: VoltageSourceId,
        vs: VoltageSourceId,
        gain: f64,
    ) {
        self.stamp_voltage_source(out_p, out_n, vs, 0.0);
        let row = self.vs_row(vs);
        let col = self.vs_row(ctrl);
        self.stamp_matrix(row, col, -gain);
    }

    // ── solution access ──────────────────────────────────────────────

    /// Voltage at a node in the current solution (0.0 for ground).
    pub fn node_voltage(&self, n: NodeId) -> f64 {
        match n.index() {
            Some(i) => self.x[i],
            None => 0.0,
        }
    }

    /// Branch current of a voltage source in the current solution.
    pub fn vsource_current(&self, vs: VoltageSourceId) -> f64 {
        self.x[self.num_nodes + vs.index()]
    }

    /// The full solution vector.
    pub fn solution(&self) -> &DVector<f64> {
        &self.x
    }

    /// Replace the solution vector after a solve.
    pub fn set_solution(&mut self, x: DVector<f64>) {
        debug_assert_eq!(x.len(), self.size());
        self.x = x;
    }

    /// Solution at the last committed time step.
    pub fn prev_solution(&self) -> &DVector<f64> {
        &self.x_prev
    }

    /// Record the current solution as the committed state.
    pub fn snapshot_solution(&mut self) {
        self.x_prev.copy_from(&self.x);
    }

    /// Discard the current solution, restoring the committed state.
    pub fn restore_solution(&mut self) {
        self.x.copy_from(&self.x_prev);
    }
}
