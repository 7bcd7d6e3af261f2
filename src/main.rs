use std::sync::atomic::AtomicBool;

use anyhow::{anyhow, Result};
use asteroid_tpm::geom::ShapeMesh;
use asteroid_tpm::output;
use asteroid_tpm::settings;
use asteroid_tpm::simulation::{Body, Simulation};
use log::{info, warn};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = settings::load_config()?;
    info!("{}", settings);

    let clock = settings.clock()?;
    let primary = Body::new(
        "primary",
        ShapeMesh::from_obj(&settings.shape, settings.shape_scale)?,
        settings.thermo.clone(),
    );

    let simulation = match settings.mutual_orbit()? {
        Some(mutual) => {
            let path = settings
                .secondary_shape
                .as_ref()
                .ok_or_else(|| anyhow!("binary run without a secondary shape"))?;
            let secondary = Body::new(
                "secondary",
                ShapeMesh::from_obj(path, settings.secondary_scale().unwrap_or(settings.shape_scale))?,
                settings.secondary_thermo().clone(),
            );
            Simulation::new_binary(primary, secondary, mutual, settings.switches(), clock)?
        }
        None => Simulation::new(primary, settings.orbit()?, settings.switches(), clock)?,
    };
    let mut simulation = simulation.with_progress(true);

    let run_dir = output::create_run_dir(&settings.output_dir)?;
    let abort = AtomicBool::new(false);
    let status = simulation.run(&abort, |sim| {
        if let Err(err) = output::write_checkpoint(&run_dir, sim) {
            warn!("checkpoint failed: {:#}", err);
        }
    })?;

    output::write_results(&run_dir, &simulation, &settings, status)?;
    Ok(())
}
