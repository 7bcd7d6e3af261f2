use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use config::{Config, Environment, File};
use log::info;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;

use crate::error::TpmError;
use crate::kinematics::{CircularOrbit, MutualOrbit};
use crate::params::ThermoParams;
use crate::simulation::{Clock, Switches};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_runnable() {
        let settings = load_default_config().unwrap();
        let clock = settings.clock().unwrap();
        let orbit = settings.orbit().unwrap();
        assert_eq!(clock.rotation_period, orbit.spin_period);
        assert!(clock.num_steps() > 0);
        assert!(settings.thermo.max_stability_number(1, clock.dt) <= 0.5);
    }

    #[test]
    fn binary_needs_a_secondary_shape() {
        let mut settings = load_default_config().unwrap();
        settings.secondary_shape = None;
        settings.binary = Some(BinarySettings {
            separation: 1000.0,
            mutual_period: 50_000.0,
            initial_phase_deg: 0.0,
        });
        assert!(validate_config(&settings).is_err());
    }

    #[test]
    fn cli_overrides() {
        let mut settings = load_default_config().unwrap();
        let args = CliArgs::parse_from([
            "asteroid-tpm",
            "--shape",
            "other.obj",
            "--end",
            "12.5",
            "--no-self-heating",
        ]);
        apply_overrides(&mut settings, args);
        assert_eq!(settings.shape, "other.obj");
        assert_eq!(settings.time.end_rotation, 12.5);
        assert!(!settings.switches().self_heating);
        assert!(settings.switches().self_shadowing);
    }

    #[test]
    fn secondary_material_defaults_to_the_primary() {
        let mut settings = load_default_config().unwrap();
        assert_eq!(settings.secondary_thermo(), &settings.thermo);

        let mut rock = settings.thermo.clone();
        rock.emissivity = vec![0.9, 0.8, 0.7].into();
        settings.secondary_thermo = Some(rock.clone());
        assert_eq!(settings.secondary_thermo(), &rock);

        let text = toml::to_string_pretty(&settings).unwrap();
        let back: Settings = toml::from_str(&text).unwrap();
        assert_eq!(back.secondary_thermo, Some(rock));
    }

    #[test]
    fn settings_survive_toml() {
        let settings = load_default_config().unwrap();
        let text = toml::to_string_pretty(&settings).unwrap();
        let back: Settings = toml::from_str(&text).unwrap();
        assert_eq!(back, settings);
    }
}

/// Heliocentric orbit and spin state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrbitSettings {
    /// Heliocentric distance [au].
    pub distance_au: f64,
    /// Orbital period [s]; 0 keeps the orbital position fixed.
    #[serde(default)]
    pub orbital_period: f64,
    /// Rotation period [s].
    pub spin_period: f64,
    #[serde(default)]
    pub obliquity_deg: f64,
    #[serde(default)]
    pub initial_spin_phase_deg: f64,
}

/// Mutual orbit of a binary's secondary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BinarySettings {
    /// Distance between the centres [m].
    pub separation: f64,
    /// Mutual orbital period [s].
    pub mutual_period: f64,
    #[serde(default)]
    pub initial_phase_deg: f64,
}

/// Time grid, in units of the rotation period.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeSettings {
    pub timestep_fraction: f64,
    #[serde(default)]
    pub start_rotation: f64,
    pub end_rotation: f64,
    /// Steps between checkpoints. No checkpoints when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_interval: Option<usize>,
}

/// Runtime configuration for the application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Wavefront OBJ file of the primary.
    pub shape: String,
    /// OBJ file of the secondary of a binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_shape: Option<String>,
    /// Factor taking OBJ units to metres.
    #[serde(default = "default_scale_factor")]
    pub shape_scale: f64,
    /// Scale of the secondary; the primary's when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_scale: Option<f64>,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "enabled")]
    pub self_shadowing: bool,
    #[serde(default = "enabled")]
    pub self_heating: bool,
    #[serde(default = "enabled")]
    pub mutual_shadowing: bool,
    pub thermo: ThermoParams,
    /// Material of the secondary; the primary's when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_thermo: Option<ThermoParams>,
    pub orbit: OrbitSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<BinarySettings>,
    pub time: TimeSettings,
}

fn default_scale_factor() -> f64 {
    1.0
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn enabled() -> bool {
    true
}

impl Settings {
    /// Scale of the secondary shape, if there is one.
    pub fn secondary_scale(&self) -> Option<f64> {
        self.secondary_shape
            .as_ref()
            .map(|_| self.secondary_scale.unwrap_or(self.shape_scale))
    }

    /// Material of the secondary. Per-facet values must match its own mesh.
    pub fn secondary_thermo(&self) -> &ThermoParams {
        self.secondary_thermo.as_ref().unwrap_or(&self.thermo)
    }

    pub fn switches(&self) -> Switches {
        Switches {
            self_shadowing: self.self_shadowing,
            self_heating: self.self_heating,
            mutual_shadowing: self.mutual_shadowing,
        }
    }

    pub fn clock(&self) -> Result<Clock, TpmError> {
        let mut clock = Clock::from_rotations(
            self.orbit.spin_period,
            self.time.timestep_fraction,
            self.time.start_rotation,
            self.time.end_rotation,
        )?;
        clock.checkpoint_interval = self.time.checkpoint_interval;
        Ok(clock)
    }

    pub fn orbit(&self) -> Result<CircularOrbit, TpmError> {
        CircularOrbit::new(
            self.orbit.distance_au,
            self.orbit.orbital_period,
            self.orbit.spin_period,
            self.orbit.obliquity_deg.to_radians(),
            self.orbit.initial_spin_phase_deg.to_radians(),
        )
    }

    /// The mutual orbit, for binary runs.
    pub fn mutual_orbit(&self) -> Result<Option<MutualOrbit>, TpmError> {
        match &self.binary {
            Some(binary) => Ok(Some(MutualOrbit::new(
                self.orbit()?,
                binary.separation,
                binary.mutual_period,
                binary.initial_phase_deg.to_radians(),
            )?)),
            None => Ok(None),
        }
    }
}

pub fn load_default_config() -> Result<Settings> {
    let root = retrieve_project_root()?;
    let default_config_file = root.join("config/default.toml");

    let settings: Config = Config::builder()
        .add_source(File::from(default_config_file).required(true))
        .build()
        .context("error loading configuration")?;

    let config: Settings = settings
        .try_deserialize()
        .context("error deserializing configuration")?;

    validate_config(&config)?;

    Ok(config)
}

pub fn load_config() -> Result<Settings> {
    let root = retrieve_project_root()?;

    let default_config_file = root.join("config/default.toml");
    let local_config = root.join("config/local.toml");

    // a local config replaces the default one entirely
    let config_file = if local_config.exists() {
        info!("using local configuration: {:?}", local_config);
        local_config
    } else {
        info!("using default configuration: {:?}", default_config_file);
        default_config_file
    };

    let settings: Config = Config::builder()
        .add_source(File::from(config_file).required(true))
        .add_source(
            Environment::with_prefix("tpm")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .context("error loading configuration")?;

    let mut config: Settings = settings
        .try_deserialize()
        .context("error deserializing configuration")?;

    apply_overrides(&mut config, CliArgs::parse());

    validate_config(&config)?;

    Ok(config)
}

/// Command-line values take precedence over the files and the environment.
fn apply_overrides(config: &mut Settings, args: CliArgs) {
    if let Some(shape) = args.shape {
        config.shape = shape;
    }
    if let Some(secondary) = args.secondary {
        config.secondary_shape = Some(secondary);
    }
    if let Some(scale) = args.scale {
        config.shape_scale = scale;
    }
    if let Some(out) = args.out {
        config.output_dir = out;
    }
    if let Some(distance) = args.distance {
        config.orbit.distance_au = distance;
    }
    if let Some(dt) = args.dt {
        config.time.timestep_fraction = dt;
    }
    if let Some(end) = args.end {
        config.time.end_rotation = end;
    }
    if let Some(interval) = args.checkpoint {
        config.time.checkpoint_interval = Some(interval);
    }
    if args.no_self_shadowing {
        config.self_shadowing = false;
    }
    if args.no_self_heating {
        config.self_heating = false;
    }
    if args.no_mutual_shadowing {
        config.mutual_shadowing = false;
    }
}

/// Retrieve the project root directory.
/// This function tries to find the project root directory in different ways:
/// 1. If the CARGO_MANIFEST_DIR environment variable is set, use it.
/// 2. If the TPM_ROOT_DIR environment variable is set, use it.
/// 3. If the "config" subdirectory is found in the executable directory or any of its parents, use it.
fn retrieve_project_root() -> Result<PathBuf> {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        return Ok(PathBuf::from(manifest_dir));
    }
    if let Ok(path) = env::var("TPM_ROOT_DIR") {
        return Ok(PathBuf::from(path));
    }

    let exe_path = env::current_exe().context("failed to get current executable path")?;
    exe_path
        .ancestors()
        .skip(1)
        .find(|dir| dir.join("config").is_dir())
        .map(|dir| dir.to_path_buf())
        .ok_or_else(|| anyhow!("could not find project root directory (set TPM_ROOT_DIR)"))
}

fn validate_config(config: &Settings) -> Result<()> {
    if !(config.shape_scale > 0.0) || !(config.secondary_scale().unwrap_or(1.0) > 0.0) {
        bail!("shape scales must be positive");
    }
    if config.binary.is_some() != config.secondary_shape.is_some() {
        bail!("a binary run needs both a [binary] section and a secondary_shape");
    }
    config.clock()?;
    config.orbit()?;
    config.mutual_orbit()?;
    Ok(())
}

#[derive(Parser, Debug)]
#[command(version, about = "Thermophysical model of asteroids and binary asteroids")]
pub struct CliArgs {
    /// File path to the shape model of the primary (Wavefront .obj).
    #[arg(short, long)]
    shape: Option<String>,

    /// File path to the shape model of the secondary. Requires a [binary] section.
    #[arg(long)]
    secondary: Option<String>,

    /// Factor converting shape units to metres.
    #[arg(long)]
    scale: Option<f64>,

    /// Directory that receives the run directories.
    #[arg(short, long)]
    out: Option<String>,

    /// Heliocentric distance in au.
    #[arg(long)]
    distance: Option<f64>,

    /// Timestep as a fraction of the rotation period.
    #[arg(long)]
    dt: Option<f64>,

    /// End time in rotations.
    #[arg(short, long)]
    end: Option<f64>,

    /// Write a checkpoint every this many steps.
    #[arg(long)]
    checkpoint: Option<usize>,

    /// Ignore shadows a body casts onto itself.
    #[arg(long)]
    no_self_shadowing: bool,

    /// Ignore scattered sunlight and re-absorbed thermal emission.
    #[arg(long)]
    no_self_heating: bool,

    /// Ignore eclipses between the members of a binary.
    #[arg(long)]
    no_mutual_shadowing: bool,
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings:
  - Shape: {} (x{})
  - Secondary: {}
  - Distance: {} au
  - Spin Period: {} s
  - Obliquity: {} deg
  - Timestep: {} rotation
  - Rotations: {} to {}
  - Depth: {} m in {} nodes
  - Self-Shadowing: {}, Self-Heating: {}, Mutual Shadowing: {}
  ",
            self.shape,
            self.shape_scale,
            self.secondary_shape.as_deref().unwrap_or("none"),
            self.orbit.distance_au,
            self.orbit.spin_period,
            self.orbit.obliquity_deg,
            self.time.timestep_fraction,
            self.time.start_rotation,
            self.time.end_rotation,
            self.thermo.depth,
            self.thermo.n_depth,
            self.self_shadowing,
            self.self_heating,
            self.mutual_shadowing,
        )
    }
}
