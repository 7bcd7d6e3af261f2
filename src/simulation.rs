//! Time stepping of one body, or of the two bodies of a binary.
//!
//! Every step runs the same fixed sequence of phases:
//! illumination, eclipses (binaries only), scattering and re-radiation,
//! forces and energy, and finally conduction. Each phase reads only what
//! the previous phases have settled, so the facets inside a phase can be
//! processed in parallel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

use crate::conduction;
use crate::eclipse;
use crate::energy::{self, EnergyBalance};
use crate::error::{Phase, TpmError};
use crate::flux;
use crate::force;
use crate::geom::{Facet, ShapeMesh};
use crate::kinematics::{BinaryKinematics, Epoch, Kinematics};
use crate::params::ThermoParams;
use crate::timestamps::{TimestampRecord, Timestamps};


/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Initializing,
    Stepping,
    Finished,
}

/// How [`Simulation::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Aborted,
}

/// Optional physics. Turning a switch off skips its phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Switches {
    /// Shadows cast by a body onto itself.
    pub self_shadowing: bool,
    /// Single scattering and single re-absorption between visible facets.
    pub self_heating: bool,
    /// Eclipses between the members of a binary.
    pub mutual_shadowing: bool,
}

impl Default for Switches {
    fn default() -> Self {
        Self {
            self_shadowing: true,
            self_heating: true,
            mutual_shadowing: true,
        }
    }
}

/// Time grid of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clock {
    /// Timestep [s].
    pub dt: f64,
    pub start_time: f64,
    pub end_time: f64,
    /// Rotation period of the primary [s].
    pub rotation_period: f64,
    pub steps_per_rotation: usize,
    /// Steps between two checkpoint callbacks.
    pub checkpoint_interval: Option<usize>,
}

impl Clock {
    /// A clock ticking `timestep_fraction` of a rotation per step from
    /// `start` to `end` rotations.
    pub fn from_rotations(
        rotation_period: f64,
        timestep_fraction: f64,
        start: f64,
        end: f64,
    ) -> Result<Self, TpmError> {
        if !(rotation_period > 0.0) || !(timestep_fraction > 0.0 && timestep_fraction <= 1.0) {
            return Err(TpmError::InvalidParameters(format!(
                "need a positive rotation period and a timestep fraction in (0, 1], got {} s and {}",
                rotation_period, timestep_fraction
            )));
        }
        if !(end >= start) {
            return Err(TpmError::InvalidParameters(format!(
                "end time ({} rotations) is before start time ({} rotations)",
                end, start
            )));
        }
        Ok(Self {
            dt: timestep_fraction * rotation_period,
            start_time: start * rotation_period,
            end_time: end * rotation_period,
            rotation_period,
            steps_per_rotation: ((1.0 / timestep_fraction).round() as usize).max(1),
            checkpoint_interval: None,
        })
    }

    pub fn num_steps(&self) -> usize {
        let span = (self.end_time - self.start_time) / self.dt;
        (span - 1e-9).ceil().max(0.0) as usize
    }

    pub fn time_at(&self, step: usize) -> f64 {
        self.start_time + step as f64 * self.dt
    }
}

/// A shape together with its material and history.
#[derive(Debug, Clone)]
pub struct Body {
    pub name: String,
    pub mesh: ShapeMesh,
    pub params: ThermoParams,
    pub timestamps: Timestamps,
}

impl Body {
    pub fn new(name: impl Into<String>, mesh: ShapeMesh, params: ThermoParams) -> Self {
        Self {
            name: name.into(),
            mesh,
            params,
            timestamps: Timestamps::new(1),
        }
    }
}

enum Driver {
    Single(Box<dyn Kinematics>),
    Binary(Box<dyn BinaryKinematics>),
}

/// Steps one or two bodies through time.
pub struct Simulation {
    /// The primary, then the secondary of a binary.
    pub bodies: Vec<Body>,
    pub switches: Switches,
    pub clock: Clock,
    driver: Driver,
    stage: Stage,
    phase: Option<Phase>,
    steps_taken: usize,
    show_progress: bool,
}

impl Simulation {
    /// A single body driven by `kinematics`.
    pub fn new<K>(body: Body, kinematics: K, switches: Switches, clock: Clock) -> Result<Self, TpmError>
    where
        K: Kinematics + 'static,
    {
        Self::build(vec![body], Driver::Single(Box::new(kinematics)), switches, clock)
    }

    /// A primary and its secondary, placed relative to each other by `kinematics`.
    pub fn new_binary<K>(
        primary: Body,
        secondary: Body,
        kinematics: K,
        switches: Switches,
        clock: Clock,
    ) -> Result<Self, TpmError>
    where
        K: BinaryKinematics + 'static,
    {
        Self::build(
            vec![primary, secondary],
            Driver::Binary(Box::new(kinematics)),
            switches,
            clock,
        )
    }

    fn build(
        mut bodies: Vec<Body>,
        driver: Driver,
        switches: Switches,
        clock: Clock,
    ) -> Result<Self, TpmError> {
        for body in bodies.iter_mut() {
            body.params
                .validate(body.mesh.num_facets(), clock.dt)
                .map_err(|e| match e {
                    TpmError::InvalidParameters(reason) => {
                        TpmError::InvalidParameters(format!("{}: {}", body.name, reason))
                    }
                    other => other,
                })?;
            body.timestamps = Timestamps::new(clock.steps_per_rotation);
        }

        Ok(Self {
            bodies,
            switches,
            clock,
            driver,
            stage: Stage::Initializing,
            phase: None,
            steps_taken: 0,
            show_progress: false,
        })
    }

    /// Shows a progress bar while [`run`](Self::run) is going.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The phase most recently entered.
    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    pub fn steps_taken(&self) -> usize {
        self.steps_taken
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.driver, Driver::Binary(_))
    }

    /// Time at the start of the next step [s].
    pub fn time(&self) -> f64 {
        self.clock.time_at(self.steps_taken)
    }

    fn initialize(&mut self) {
        let period = self.clock.rotation_period;
        for body in self.bodies.iter_mut() {
            body.mesh.init_temperatures(&body.params);
            let n = body.mesh.num_facets();
            info!(
                "{}: {} facets, thermal inertia {:.1} J m^-2 K^-1 s^-1/2, skin depth {:.4} m, lambda {:.4}",
                body.name,
                n,
                body.params.thermal_inertia(0),
                body.params.skin_depth(0, period),
                body.params.max_stability_number(n, self.clock.dt)
            );
        }
        info!(
            "{} steps of {:.2} s, {} per rotation",
            self.clock.num_steps(),
            self.clock.dt,
            self.clock.steps_per_rotation
        );
        self.stage = Stage::Stepping;
    }

    fn enter(&mut self, phase: Phase) {
        trace!("step {}: {}", self.steps_taken, phase);
        self.phase = Some(phase);
    }

    /// Advances every body by one timestep and returns the stage reached.
    pub fn step(&mut self) -> Result<Stage, TpmError> {
        if self.stage == Stage::Initializing {
            self.initialize();
        }
        if self.stage == Stage::Finished {
            return Ok(Stage::Finished);
        }
        if self.steps_taken >= self.clock.num_steps() {
            self.stage = Stage::Finished;
            return Ok(Stage::Finished);
        }

        let step = self.steps_taken;
        let time = self.time();
        let switches = self.switches;

        let (epochs, pose) = match &self.driver {
            Driver::Single(kinematics) => (vec![kinematics.epoch(time)], None),
            Driver::Binary(kinematics) => {
                let pose = kinematics.binary_epoch(time);
                (vec![pose.primary, pose.secondary], Some(pose))
            }
        };

        self.enter(Phase::UpdateIllumination);
        self.illuminate_all(&epochs, step)?;

        if let Some(pose) = pose {
            self.enter(Phase::UpdateEclipse);
            if switches.mutual_shadowing {
                if let [primary, secondary] = self.bodies.as_mut_slice() {
                    let outcome = eclipse::resolve_eclipse(
                        &mut primary.mesh,
                        &mut secondary.mesh,
                        &pose.primary.sun_direction,
                        &pose.sec_from_primary,
                        &pose.rotation_sec_to_pri,
                    );
                    if !outcome.is_empty() {
                        debug!(
                            "step {}: eclipse darkens {} + {} facets",
                            step,
                            outcome.primary.len(),
                            outcome.secondary.len()
                        );
                    }
                }
            }
        }

        self.enter(Phase::UpdateScatterRadiation);
        for body in self.bodies.iter_mut() {
            if switches.self_heating {
                flux::scatter_single(&mut body.mesh, &body.params.bond_albedo);
                flux::reradiate_single(&mut body.mesh, &body.params.emissivity);
            }
            ensure_finite(&body.mesh, step, Phase::UpdateScatterRadiation, |f| {
                [f.flux.scat, f.flux.rad].into_iter().find(|v| !v.is_finite())
            })?;
        }

        self.enter(Phase::UpdateForcesEnergy);
        let mut records = Vec::with_capacity(self.bodies.len());
        for (body, epoch) in self.bodies.iter_mut().zip(&epochs) {
            force::accumulate_force_torque(&mut body.mesh, &body.params);
            let balance = energy::energy_io(&body.mesh, &body.params);
            records.push(record(&body.name, step, time, epoch, &body.mesh, balance)?);
        }

        self.enter(Phase::UpdateTemperatures);
        let dt = self.clock.dt;
        for body in self.bodies.iter_mut() {
            conduction::advance_temperatures(&mut body.mesh, &body.params, dt).map_err(
                |err| match err {
                    TpmError::SurfaceNotConverged { facet, temperature } => {
                        TpmError::NumericalDivergence {
                            step,
                            facet,
                            phase: Phase::UpdateTemperatures,
                            value: temperature,
                        }
                    }
                    other => other,
                },
            )?;
            ensure_finite(&body.mesh, step, Phase::UpdateTemperatures, |f| {
                f.temperature.iter().copied().find(|t| !t.is_finite())
            })?;
        }

        for (body, record) in self.bodies.iter_mut().zip(records) {
            body.timestamps.push(record);
        }

        self.steps_taken += 1;
        if self.steps_taken % self.clock.steps_per_rotation.max(1) == 0 {
            self.log_rotation();
        }
        if self.steps_taken >= self.clock.num_steps() {
            self.finish();
        }
        Ok(self.stage)
    }

    fn illuminate_all(&mut self, epochs: &[Epoch], step: usize) -> Result<(), TpmError> {
        let self_shadowing = self.switches.self_shadowing;
        for (body, epoch) in self.bodies.iter_mut().zip(epochs) {
            flux::illuminate(
                &mut body.mesh,
                epoch.solar_flux,
                &epoch.sun_direction,
                self_shadowing,
            );
            ensure_finite(&body.mesh, step, Phase::UpdateIllumination, |f| {
                Some(f.flux.sun).filter(|v| !v.is_finite())
            })?;
        }
        Ok(())
    }

    /// Reports the conservation ratio over the rotation just completed.
    fn log_rotation(&self) {
        let rotation = self.steps_taken / self.clock.steps_per_rotation.max(1);
        for body in &self.bodies {
            match body.timestamps.trailing_average() {
                Some(ratio) => info!("{}: rotation {}: E_out/E_in = {:.6}", body.name, rotation, ratio),
                None => debug!("{}: rotation {}: E_out/E_in undefined", body.name, rotation),
            }
        }
    }

    fn finish(&mut self) {
        self.stage = Stage::Finished;
        for body in &self.bodies {
            match body.timestamps.mean_rotation_average() {
                Some(ratio) => info!("{}: mean rotation-averaged E_out/E_in = {:.6}", body.name, ratio),
                None => info!("{}: no complete rotation to average E_out/E_in over", body.name),
            }
            if let Some(last) = body.timestamps.last() {
                let balance = EnergyBalance {
                    e_in: last.e_in,
                    e_out: last.e_out,
                };
                debug!("{}: last step\n{}", body.name, balance);
            }
        }
    }

    /// Steps until the end time or until `abort` is raised.
    ///
    /// `checkpoint` is called every `clock.checkpoint_interval` steps, between
    /// two steps, never inside one.
    pub fn run<F>(&mut self, abort: &AtomicBool, mut checkpoint: F) -> Result<RunStatus, TpmError>
    where
        F: FnMut(&Simulation),
    {
        let start = Instant::now();
        let total = self.clock.num_steps();

        let pb = if self.show_progress {
            ProgressBar::new(total as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>7}/{len:7} {msg} ETA: {eta_precise}",
        ) {
            pb.set_style(style.progress_chars("█▇▆▅▄▃▂▁"));
        }
        pb.set_message("steps");
        pb.set_position(self.steps_taken as u64);

        let mut status = RunStatus::Completed;
        while self.stage != Stage::Finished {
            if abort.load(Ordering::Relaxed) {
                warn!("run aborted after {} of {} steps", self.steps_taken, total);
                status = RunStatus::Aborted;
                break;
            }
            if let Err(err) = self.step() {
                pb.abandon_with_message("diverged");
                return Err(err);
            }
            pb.inc(1);

            if let Some(interval) = self.clock.checkpoint_interval {
                if interval > 0 && self.steps_taken % interval == 0 && self.steps_taken > 0 {
                    checkpoint(self);
                }
            }
        }
        pb.finish_and_clear();

        let duration = start.elapsed();
        info!(
            "ran {} steps in {:.2?} ({:.2?} per step)",
            self.steps_taken,
            duration,
            duration / self.steps_taken.max(1) as u32
        );
        Ok(status)
    }
}

/// Checks one field of every facet, reporting the first bad value.
fn ensure_finite<F>(mesh: &ShapeMesh, step: usize, phase: Phase, bad_value: F) -> Result<(), TpmError>
where
    F: Fn(&Facet) -> Option<f64>,
{
    match mesh
        .facets
        .iter()
        .enumerate()
        .find_map(|(i, f)| bad_value(f).map(|v| (i, v)))
    {
        Some((facet, value)) => Err(TpmError::NumericalDivergence {
            step,
            facet,
            phase,
            value,
        }),
        None => Ok(()),
    }
}

fn record(
    name: &str,
    step: usize,
    time: f64,
    epoch: &Epoch,
    mesh: &ShapeMesh,
    balance: EnergyBalance,
) -> Result<TimestampRecord, TpmError> {
    if !balance.e_in.is_finite() || !balance.e_out.is_finite() {
        let facet = mesh
            .facets
            .iter()
            .position(|f| !f.force.iter().all(|x| x.is_finite()))
            .unwrap_or(0);
        return Err(TpmError::NumericalDivergence {
            step,
            facet,
            phase: Phase::UpdateForcesEnergy,
            value: if balance.e_in.is_finite() { balance.e_out } else { balance.e_in },
        });
    }

    let e_cons = match balance.conservation_ratio() {
        Ok(ratio) => Some(ratio),
        Err(err) if !err.is_fatal() => {
            warn!("{} step {}: {}", name, step, err);
            None
        }
        Err(err) => return Err(err),
    };

    Ok(TimestampRecord {
        time,
        orbital_angle: epoch.orbital_angle,
        spin_phase: epoch.spin_phase,
        force: epoch.body_to_orbit * mesh.force,
        torque: epoch.body_to_orbit * mesh.torque,
        e_in: balance.e_in,
        e_out: balance.e_out,
        e_cons,
        e_cons_avg: None,
    })
}
