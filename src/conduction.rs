//! One-dimensional heat conduction below each facet.
//!
//! Explicit finite differences on a uniform depth grid. The surface node
//! balances absorbed flux, conduction into the ground and thermal emission;
//! the bottom node is insulated. The caller picks a stable timestep
//! (`ThermoParams::validate` checks it), the integrator never adapts it.

use rayon::prelude::*;

use crate::config::{NEWTON_MAX_ITER, NEWTON_TOLERANCE, STEFAN_BOLTZMANN};
use crate::error::TpmError;
use crate::geom::{Facet, ShapeMesh};
use crate::params::{PerFacet, ThermoParams};

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Point3;

    fn column(params: &ThermoParams) -> ShapeMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mut mesh = ShapeMesh::new(&vertices, &[[0, 1, 2]]).unwrap();
        mesh.init_temperatures(params);
        mesh
    }

    #[test]
    fn isolated_uniform_column_stays_put() {
        // no flux in, no emission out, insulated bottom
        let mut params = ThermoParams::uniform(0.0, 0.0, 0.0, 1.0, 1000.0, 1000.0, 0.05, 6);
        params.initial_temperature = 250.0;
        let mut mesh = column(&params);
        for _ in 0..100 {
            advance_temperatures(&mut mesh, &params, 40.0).unwrap();
        }
        for t in &mesh.facets[0].temperature {
            assert_abs_diff_eq!(*t, 250.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn heating_warms_from_the_top() {
        let mut params = ThermoParams::uniform(0.0, 0.0, 1.0, 1.0, 1000.0, 1000.0, 0.05, 6);
        params.initial_temperature = 100.0;
        let mut mesh = column(&params);
        mesh.facets[0].flux.sun = 1000.0;
        advance_temperatures(&mut mesh, &params, 40.0).unwrap();
        advance_temperatures(&mut mesh, &params, 40.0).unwrap();

        let t = &mesh.facets[0].temperature;
        assert!(t[0] > t[1] && t[1] > 100.0);
        assert_abs_diff_eq!(t[5], t[4], epsilon = 1e-12);
    }

    #[test]
    fn surface_balance_holds_after_step() {
        let mut params = ThermoParams::uniform(0.1, 0.2, 0.9, 0.5, 1500.0, 600.0, 0.1, 11);
        params.initial_temperature = 200.0;
        let mut mesh = column(&params);
        mesh.facets[0].flux.sun = 800.0;
        mesh.facets[0].flux.scat = 20.0;
        mesh.facets[0].flux.rad = 10.0;
        advance_temperatures(&mut mesh, &params, 100.0).unwrap();

        let facet = &mesh.facets[0];
        let absorbed = absorbed_flux(facet, &params, 0);
        let (t0, t1) = (facet.temperature[0], facet.temperature[1]);
        let residual = absorbed + 0.5 * (t1 - t0) / params.dz() - 0.9 * STEFAN_BOLTZMANN * t0.powi(4);
        assert_abs_diff_eq!(residual, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(absorbed, 0.9 * 820.0 + 0.8 * 10.0, epsilon = 1e-12);
    }

    #[test]
    fn cold_start_from_zero_kelvin() {
        let params = ThermoParams::uniform(0.0, 0.0, 1.0, 0.0, 1000.0, 1000.0, 0.05, 6);
        let mut mesh = column(&params);
        mesh.facets[0].flux.sun = 1000.0;
        advance_temperatures(&mut mesh, &params, 40.0).unwrap();
        // without conduction the surface is in instant radiative equilibrium
        let expected = (1000.0 / STEFAN_BOLTZMANN).powf(0.25);
        assert_abs_diff_eq!(mesh.facets[0].temperature[0], expected, epsilon = 1e-6);
    }

    #[test]
    fn poorly_conducting_cold_start_balances_the_surface() {
        // g = k / dz = 1e-4 W m^-2 K^-1: conduction barely matters
        let params = ThermoParams::uniform(0.0, 0.0, 1.0, 1e-6, 1000.0, 1000.0, 0.05, 6);
        let mut mesh = column(&params);
        mesh.facets[0].flux.sun = 1000.0;
        advance_temperatures(&mut mesh, &params, 40.0).unwrap();

        let (t0, t1) = (mesh.facets[0].temperature[0], mesh.facets[0].temperature[1]);
        let residual = 1000.0 + 1e-6 / params.dz() * (t1 - t0) - STEFAN_BOLTZMANN * t0.powi(4);
        assert_abs_diff_eq!(residual, 0.0, epsilon = 1e-6);
        let radiative = (1000.0 / STEFAN_BOLTZMANN).powf(0.25);
        assert!(t0 < radiative && radiative - t0 < 0.1);
    }

    #[test]
    fn non_finite_flux_is_reported() {
        let params = ThermoParams::uniform(0.0, 0.0, 1.0, 1.0, 1000.0, 1000.0, 0.05, 6);
        let mut mesh = column(&params);
        mesh.facets[0].flux.sun = f64::NAN;
        assert!(matches!(
            advance_temperatures(&mut mesh, &params, 40.0),
            Err(TpmError::SurfaceNotConverged { facet: 0, .. })
        ));
    }

    #[test]
    fn too_few_depth_nodes_are_rejected() {
        for n_depth in [1, 2] {
            let params = ThermoParams::uniform(0.0, 0.0, 1.0, 1.0, 1000.0, 1000.0, 0.05, n_depth);
            let mut mesh = column(&params);
            assert!(matches!(
                advance_temperatures(&mut mesh, &params, 40.0),
                Err(TpmError::InvalidParameters(_))
            ));
        }
    }

    #[test]
    fn profile_length_mismatch_is_reported() {
        let params = ThermoParams::uniform(0.0, 0.0, 1.0, 1.0, 1000.0, 1000.0, 0.05, 6);
        let mut mesh = column(&params);
        mesh.facets[0].temperature.pop();
        assert!(advance_temperatures(&mut mesh, &params, 40.0).is_err());
    }
}

/// Flux absorbed at the surface of facet `i` [W m^-2].
pub fn absorbed_flux(facet: &Facet, params: &ThermoParams, i: usize) -> f64 {
    let bond = params.bond_albedo.at(i);
    let thermal = params.thermal_albedo.at(i);
    (1.0 - bond) * (facet.flux.sun + facet.flux.scat) + (1.0 - thermal) * facet.flux.rad
}

/// Advances every facet's temperature profile by `dt` seconds.
pub fn advance_temperatures(
    mesh: &mut ShapeMesh,
    params: &ThermoParams,
    dt: f64,
) -> Result<(), TpmError> {
    let n = params.n_depth;
    if n < 3 {
        return Err(TpmError::InvalidParameters(format!(
            "n_depth must be at least 3, got {}",
            n
        )));
    }
    if let Some((i, facet)) = mesh
        .facets
        .iter()
        .enumerate()
        .find(|(_, f)| f.temperature.len() != n || f.temperature_next.len() != n)
    {
        return Err(TpmError::InvalidParameters(format!(
            "facet {} has a profile of {} nodes, expected {}",
            i,
            facet.temperature.len(),
            n
        )));
    }

    let dz = params.dz();
    mesh.facets
        .par_iter_mut()
        .enumerate()
        .try_for_each(|(i, facet)| step_column(facet, params, i, dt, dz))
}

fn step_column(
    facet: &mut Facet,
    params: &ThermoParams,
    i: usize,
    dt: f64,
    dz: f64,
) -> Result<(), TpmError> {
    let lambda = params.diffusivity(i) * dt / (dz * dz);
    let n = facet.temperature.len();

    {
        let t = &facet.temperature;
        let next = &mut facet.temperature_next;
        for k in 1..n - 1 {
            next[k] = t[k] + lambda * (t[k + 1] - 2.0 * t[k] + t[k - 1]);
        }
    }

    let surface = solve_surface(
        facet.temperature[0],
        facet.temperature_next[1],
        absorbed_flux(facet, params, i),
        params.conductivity.at(i) / dz,
        params.emissivity.at(i) * STEFAN_BOLTZMANN,
    )
    .map_err(|temperature| TpmError::SurfaceNotConverged {
        facet: i,
        temperature,
    })?;
    facet.temperature_next[0] = surface;
    facet.temperature_next[n - 1] = facet.temperature_next[n - 2];

    std::mem::swap(&mut facet.temperature, &mut facet.temperature_next);
    Ok(())
}

/// Solves `absorbed + g (t1 - T) - e T^4 = 0` for the surface temperature T
/// with Newton's method.
///
/// `g` is the conductance k / dz and `e` is emissivity times sigma. The
/// residual is concave and decreasing in T and the root lies in
/// `[0, (source / e)^(1/4)]`. Iterates are kept inside that bracket, so from
/// the first step on they approach the root from above. Returns the last
/// iterate as the error when the iteration limit is reached.
fn solve_surface(previous: f64, t1: f64, absorbed: f64, g: f64, e: f64) -> Result<f64, f64> {
    let source = absorbed + g * t1;
    if !source.is_finite() {
        return Err(source);
    }
    let upper = if e > 0.0 {
        (source.max(0.0) / e).powf(0.25)
    } else {
        f64::INFINITY
    };
    let mut t = previous.max(0.0).min(upper);

    for _ in 0..NEWTON_MAX_ITER {
        let residual = source - g * t - e * t.powi(4);
        let slope = -g - 4.0 * e * t.powi(3);
        if slope == 0.0 {
            // no conduction and T = 0: the balance is algebraic
            return Ok(if e > 0.0 { upper } else { t });
        }
        let delta = residual / slope;
        t = (t - delta).min(upper);
        if delta.abs() <= NEWTON_TOLERANCE * t.abs().max(1.0) {
            return Ok(t.max(0.0));
        }
    }
    Err(t)
}
