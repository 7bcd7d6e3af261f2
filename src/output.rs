use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use itertools::{Itertools, MinMaxResult};
use log::info;
use serde::Serialize;

use crate::geom::ShapeMesh;
use crate::settings::Settings;
use crate::simulation::{Body, RunStatus, Simulation};
use crate::timestamps::Timestamps;


/// Final state of one body, as written to `summary.json`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BodySummary {
    pub name: String,
    pub num_facets: usize,
    pub total_area: f64,
    pub steps: usize,
    pub min_surface_temperature: Option<f64>,
    pub max_surface_temperature: Option<f64>,
    pub last_e_cons: Option<f64>,
    pub mean_rotation_averaged_e_cons: Option<f64>,
    /// Net force in the orbital frame at the last step [N].
    pub last_force: Option<[f64; 3]>,
    /// Net torque in the orbital frame at the last step [N m].
    pub last_torque: Option<[f64; 3]>,
}

impl BodySummary {
    pub fn new(body: &Body) -> Self {
        let (min, max) = match body
            .mesh
            .surface_temperatures()
            .into_iter()
            .minmax_by(|a, b| a.total_cmp(b))
        {
            MinMaxResult::NoElements => (None, None),
            MinMaxResult::OneElement(t) => (Some(t), Some(t)),
            MinMaxResult::MinMax(lo, hi) => (Some(lo), Some(hi)),
        };
        let last = body.timestamps.last();

        Self {
            name: body.name.clone(),
            num_facets: body.mesh.num_facets(),
            total_area: body.mesh.total_area(),
            steps: body.timestamps.len(),
            min_surface_temperature: min,
            max_surface_temperature: max,
            last_e_cons: last.and_then(|r| r.e_cons),
            mean_rotation_averaged_e_cons: body.timestamps.mean_rotation_average(),
            last_force: last.map(|r| r.force.into()),
            last_torque: last.map(|r| r.torque.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct RunSummary {
    status: &'static str,
    steps: usize,
    end_time: f64,
    bodies: Vec<BodySummary>,
}

/// Creates a fresh, time-stamped directory under `base` for one run.
pub fn create_run_dir<P: AsRef<Path>>(base: P) -> Result<PathBuf> {
    let dir = base
        .as_ref()
        .join(format!("run_{}", Local::now().format("%Y%m%d_%H%M%S")));
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    Ok(dir)
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_timestamps_to<W: Write>(writer: &mut W, stamps: &Timestamps) -> std::io::Result<()> {
    writeln!(
        writer,
        "time,orbital_angle,spin_phase,fx,fy,fz,tx,ty,tz,e_in,e_out,e_cons,e_cons_avg"
    )?;
    for r in stamps.records() {
        writeln!(
            writer,
            "{},{},{},{},{},{},{}",
            r.time,
            r.orbital_angle,
            r.spin_phase,
            r.force.iter().join(","),
            r.torque.iter().join(","),
            [r.e_in, r.e_out].iter().join(","),
            [optional(r.e_cons), optional(r.e_cons_avg)].iter().join(",")
        )?;
    }
    Ok(())
}

fn write_temperatures_to<W: Write>(writer: &mut W, mesh: &ShapeMesh) -> std::io::Result<()> {
    let n_depth = mesh.facets.first().map_or(0, |f| f.temperature.len());
    writeln!(
        writer,
        "facet,cx,cy,cz,nx,ny,nz,area,{}",
        (0..n_depth).map(|k| format!("t_{}", k)).join(",")
    )?;
    for (i, facet) in mesh.facets.iter().enumerate() {
        writeln!(
            writer,
            "{},{},{},{},{}",
            i,
            facet.centroid.iter().join(","),
            facet.normal.iter().join(","),
            facet.area,
            facet.temperature.iter().join(",")
        )?;
    }
    Ok(())
}

/// Writes the timestamp table of a body as CSV.
pub fn write_timestamps(path: &Path, stamps: &Timestamps) -> Result<()> {
    let mut writer = create(path)?;
    write_timestamps_to(&mut writer, stamps)
        .with_context(|| format!("failed to write {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

/// Writes the geometry and depth profile of every facet as CSV.
pub fn write_temperatures(path: &Path, mesh: &ShapeMesh) -> Result<()> {
    let mut writer = create(path)?;
    write_temperatures_to(&mut writer, mesh)
        .with_context(|| format!("failed to write {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

/// Writes the effective settings so the run can be repeated.
pub fn write_settings(path: &Path, settings: &Settings) -> Result<()> {
    let text = toml::to_string_pretty(settings).context("failed to serialise settings")?;
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Dumps the temperature state of every body mid-run.
pub fn write_checkpoint(dir: &Path, sim: &Simulation) -> Result<()> {
    for body in sim.bodies() {
        let path = dir.join(format!(
            "checkpoint_{:08}_{}.csv",
            sim.steps_taken(),
            body.name
        ));
        write_temperatures(&path, &body.mesh)?;
    }
    info!("checkpoint written at step {}", sim.steps_taken());
    Ok(())
}

/// Writes everything a finished (or aborted) run produced into `dir`.
pub fn write_results(
    dir: &Path,
    sim: &Simulation,
    settings: &Settings,
    status: RunStatus,
) -> Result<()> {
    for body in sim.bodies() {
        write_timestamps(&dir.join(format!("timestamps_{}.csv", body.name)), &body.timestamps)?;
        write_temperatures(&dir.join(format!("temperatures_{}.csv", body.name)), &body.mesh)?;
    }

    let summary = RunSummary {
        status: match status {
            RunStatus::Completed => "completed",
            RunStatus::Aborted => "aborted",
        },
        steps: sim.steps_taken(),
        end_time: sim.time(),
        bodies: sim.bodies().iter().map(BodySummary::new).collect(),
    };
    let path = dir.join("summary.json");
    let mut writer = create(&path)?;
    serde_json::to_writer_pretty(&mut writer, &summary)
        .with_context(|| format!("failed to write {}", path.display()))?;
    writer.flush()?;

    write_settings(&dir.join("settings.toml"), settings)?;

    info!("results written to {}", dir.display());
    Ok(())
}
