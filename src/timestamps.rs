//! Per-step history of a run.
//!
//! One [`TimestampRecord`] is appended per step and never edited again, with
//! one exception: the rotation-averaged conservation ratio of a row is only
//! known once a full rotation of later rows exists, and is filled in then.

use nalgebra::Vector3;
use serde::Serialize;


/// One row of the run history. Vectors are in the orbital frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimestampRecord {
    /// Elapsed time since the start epoch [s].
    pub time: f64,
    /// Orbital angle of the body around the sun [rad].
    pub orbital_angle: f64,
    /// Rotation angle about the spin axis [rad].
    pub spin_phase: f64,
    /// Net photon-pressure force [N].
    pub force: Vector3<f64>,
    /// Net photon-pressure torque [N m].
    pub torque: Vector3<f64>,
    pub e_in: f64,
    pub e_out: f64,
    /// `None` when no power was absorbed this step.
    pub e_cons: Option<f64>,
    /// Mean of `e_cons` over the rotation starting at this row.
    pub e_cons_avg: Option<f64>,
}

impl Default for TimestampRecord {
    fn default() -> Self {
        Self {
            time: 0.0,
            orbital_angle: 0.0,
            spin_phase: 0.0,
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
            e_in: 0.0,
            e_out: 0.0,
            e_cons: None,
            e_cons_avg: None,
        }
    }
}

/// Append-only table of [`TimestampRecord`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct Timestamps {
    records: Vec<TimestampRecord>,
    steps_per_rotation: usize,
    averaged: usize,
}

impl Timestamps {
    pub fn new(steps_per_rotation: usize) -> Self {
        Self {
            records: Vec::new(),
            steps_per_rotation: steps_per_rotation.max(1),
            averaged: 0,
        }
    }

    pub fn records(&self) -> &[TimestampRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&TimestampRecord> {
        self.records.last()
    }

    pub fn steps_per_rotation(&self) -> usize {
        self.steps_per_rotation
    }

    /// Rows whose rotation average is known.
    pub fn num_averaged(&self) -> usize {
        self.averaged
    }

    /// Appends a row and fills in every rotation average that became known.
    pub fn push(&mut self, record: TimestampRecord) {
        self.records.push(record);

        let window = self.steps_per_rotation;
        while self.averaged + window <= self.records.len() {
            let start = self.averaged;
            self.records[start].e_cons_avg = mean_ratio(&self.records[start..start + window]);
            self.averaged += 1;
        }
    }

    /// Mean conservation ratio over the most recent rotation, if one has
    /// been completed.
    pub fn trailing_average(&self) -> Option<f64> {
        let window = self.steps_per_rotation;
        if self.records.len() < window {
            return None;
        }
        mean_ratio(&self.records[self.records.len() - window..])
    }

    /// Mean of all known rotation averages.
    pub fn mean_rotation_average(&self) -> Option<f64> {
        mean(self.records.iter().filter_map(|r| r.e_cons_avg))
    }
}

fn mean_ratio(rows: &[TimestampRecord]) -> Option<f64> {
    mean(rows.iter().filter_map(|r| r.e_cons))
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}
