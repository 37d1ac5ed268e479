//! Result types for transient analysis.

use nalgebra::DVector;

/// A single timepoint in a transient simulation result.
#[derive(Debug, Clone)]
pub struct TimePoint {
    /// Time value (s).
    pub time: f64,
    /// Solution vector at this time (node voltages, then branch currents).
    pub solution: DVector<f64>,
}

/// Collected result of a transient simulation.
#[derive(Debug, Clone)]
pub struct TransientResult {
    /// All accepted timepoints.
    pub points: Vec<TimePoint>,
    /// Number of nodes (excluding ground).
    pub num_nodes: usize,
}

impl TransientResult {
    /// Get the voltage at a node across all timepoints.
    pub fn voltage_waveform(&self, node_idx: usize) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .map(|tp| (tp.time, tp.solution[node_idx]))
            .collect()
    }

    /// Get all time values.
    pub fn times(&self) -> Vec<f64> {
        self.points.iter().map(|tp| tp.time).collect()
    }

    /// Interpolate the solution at a specific time.
    ///
    /// Linear interpolation between the two nearest timepoints; clamps to
    /// the first/last point outside the simulated range. Returns `None`
    /// only for an empty result.
    pub fn interpolate_at(&self, time: f64) -> Option<DVector<f64>> {
        if self.points.is_empty() {
            return None;
        }

        if time <= self.points[0].time {
            return Some(self.points[0].solution.clone());
        }
        if time >= self.points.last()?.time {
            return Some(self.points.last()?.solution.clone());
        }

        for i in 0..self.points.len() - 1 {
            let t0 = self.points[i].time;
            let t1 = self.points[i + 1].time;

            if time >= t0 && time <= t1 {
                let alpha = (time - t0) / (t1 - t0);
                let v0 = &self.points[i].solution;
                let v1 = &self.points[i + 1].solution;
                return Some(v0 * (1.0 - alpha) + v1 * alpha);
            }
        }

        None
    }

    /// Sample the result at evenly-spaced times.
    ///
    /// Useful for producing uniform output after the driver adapted its
    /// step size mid-run.
    pub fn sample_at_times(
        &self,
        tstep: f64,
        tstart: Option<f64>,
        tstop: Option<f64>,
    ) -> TransientResult {
        let tstart = tstart.unwrap_or(0.0);
        let tstop = tstop.unwrap_or_else(|| self.points.last().map(|p| p.time).unwrap_or(0.0));

        let mut sampled = Vec::new();
        let mut t = tstart;

        while t <= tstop + tstep * 0.001 {
            if let Some(solution) = self.interpolate_at(t) {
                sampled.push(TimePoint { time: t, solution });
            }
            t += tstep;
        }

        TransientResult {
            points: sampled,
            num_nodes: self.num_nodes,
        }
    }

    /// Voltage at a node at a specific time (interpolated).
    pub fn voltage_at(&self, node_idx: usize, time: f64) -> Option<f64> {
        self.interpolate_at(time).map(|sol| sol[node_idx])
    }
}
