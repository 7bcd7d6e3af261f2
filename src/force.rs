//! Photon recoil from light leaving the surface.
//!
//! Every facet re-emits its scattered sunlight, reflected infrared and own
//! thermal emission as a Lambertian source, which pushes it along `-normal`
//! with a pressure of `2/3 * E / c`. Summed over the body this gives the net
//! force and, with the facet positions, the torque behind the YORP effect.

use nalgebra::Vector3;
use rayon::prelude::*;

use crate::config::{SPEED_OF_LIGHT, STEFAN_BOLTZMANN};
use crate::geom::{Facet, ShapeMesh};
use crate::params::{PerFacet, ThermoParams};

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Point3;

    fn octahedron() -> ShapeMesh {
        let vertices = vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, -1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, -1.0),
        ];
        let faces = vec![
            [0, 2, 4],
            [2, 1, 4],
            [1, 3, 4],
            [3, 0, 4],
            [2, 0, 5],
            [1, 2, 5],
            [3, 1, 5],
            [0, 3, 5],
        ];
        ShapeMesh::new(&vertices, &faces).unwrap()
    }

    #[test]
    fn isothermal_symmetric_body_has_no_net_force_or_torque() {
        let mut params = ThermoParams::uniform(0.0, 0.0, 1.0, 1.0, 1000.0, 1000.0, 0.05, 4);
        params.initial_temperature = 300.0;
        let mut mesh = octahedron();
        mesh.init_temperatures(&params);
        accumulate_force_torque(&mut mesh, &params);
        assert_abs_diff_eq!(mesh.force.norm(), 0.0, epsilon = 1e-20);
        assert_abs_diff_eq!(mesh.torque.norm(), 0.0, epsilon = 1e-20);
    }

    #[test]
    fn hot_facet_is_pushed_inwards() {
        let mut params = ThermoParams::uniform(0.0, 0.0, 1.0, 1.0, 1000.0, 1000.0, 0.05, 4);
        params.initial_temperature = 0.0;
        let mut mesh = octahedron();
        mesh.init_temperatures(&params);
        mesh.facets[0].temperature[0] = 400.0;
        accumulate_force_torque(&mut mesh, &params);

        let facet = &mesh.facets[0];
        let emitted = STEFAN_BOLTZMANN * 400.0_f64.powi(4);
        let expected = -2.0 / 3.0 * emitted * facet.area / SPEED_OF_LIGHT;
        assert_abs_diff_eq!(mesh.force, facet.normal * expected, epsilon = 1e-20);
        // the push goes through the centre, so there is no torque
        assert_abs_diff_eq!(mesh.torque.norm(), 0.0, epsilon = 1e-20);
    }

    #[test]
    fn accumulators_reset_every_call() {
        let mut params = ThermoParams::uniform(0.0, 0.0, 1.0, 1.0, 1000.0, 1000.0, 0.05, 4);
        params.initial_temperature = 0.0;
        let mut mesh = octahedron();
        mesh.init_temperatures(&params);
        mesh.force = Vector3::new(1.0, 2.0, 3.0);
        mesh.torque = Vector3::new(1.0, 2.0, 3.0);
        accumulate_force_torque(&mut mesh, &params);
        assert_eq!(mesh.force, Vector3::zeros());
        assert_eq!(mesh.torque, Vector3::zeros());
    }
}

/// Radiant exitance of facet `i`: reflected sunlight, reflected infrared and
/// thermal emission [W m^-2].
pub fn outgoing_flux(facet: &Facet, params: &ThermoParams, i: usize) -> f64 {
    params.bond_albedo.at(i) * (facet.flux.sun + facet.flux.scat)
        + params.thermal_albedo.at(i) * facet.flux.rad
        + params.emissivity.at(i) * STEFAN_BOLTZMANN * facet.surface_temperature().powi(4)
}

/// Resets the body force and torque and sums every facet's contribution.
pub fn accumulate_force_torque(mesh: &mut ShapeMesh, params: &ThermoParams) {
    mesh.facets.par_iter_mut().enumerate().for_each(|(i, facet)| {
        let pressure = 2.0 / 3.0 * outgoing_flux(facet, params, i) / SPEED_OF_LIGHT;
        facet.force = -pressure * facet.area * facet.normal;
    });

    // sequential so the sum does not depend on the thread schedule
    mesh.force = Vector3::zeros();
    mesh.torque = Vector3::zeros();
    for facet in &mesh.facets {
        mesh.force += facet.force;
        mesh.torque += facet.centroid.coords.cross(&facet.force);
    }
}
