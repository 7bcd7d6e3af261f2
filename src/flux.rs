//! Radiative fluxes received by each facet at one instant.
//!
//! Each step runs [`illuminate`] first (and the eclipse phase for binaries),
//! then [`scatter_single`] and [`reradiate_single`], which both read the
//! settled solar flux and surface temperatures of neighbouring facets.

use nalgebra::Vector3;
use rayon::prelude::*;

use crate::config::STEFAN_BOLTZMANN;
use crate::geom::ShapeMesh;
use crate::params::PerFacet;
use crate::raycast::Ray;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::VisibleFacet;
    use approx::assert_abs_diff_eq;
    use nalgebra::Point3;

    fn flat_facet() -> ShapeMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        ShapeMesh::new(&vertices, &[[0, 1, 2]]).unwrap()
    }

    #[test]
    fn cosine_law_and_night_side() {
        let mut mesh = flat_facet();
        let oblique = Vector3::new(1.0, 0.0, 1.0).normalize();
        illuminate(&mut mesh, 1000.0, &oblique, true);
        assert_abs_diff_eq!(mesh.facets[0].flux.sun, 1000.0 / 2.0_f64.sqrt(), epsilon = 1e-9);

        illuminate(&mut mesh, 1000.0, &-Vector3::z(), true);
        assert_eq!(mesh.facets[0].flux.sun, 0.0);

        // grazing incidence is dark
        illuminate(&mut mesh, 1000.0, &Vector3::x(), true);
        assert_eq!(mesh.facets[0].flux.sun, 0.0);
    }

    #[test]
    fn sun_vector_need_not_be_normalised() {
        let mut mesh = flat_facet();
        illuminate(&mut mesh, 500.0, &Vector3::new(0.0, 0.0, 7.0), false);
        assert_abs_diff_eq!(mesh.facets[0].flux.sun, 500.0, epsilon = 1e-9);
    }

    #[test]
    fn scatter_and_reradiate_sum_neighbours() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
        ];
        let mut mesh = ShapeMesh::new(&vertices, &[[0, 1, 2], [3, 4, 5]]).unwrap();
        mesh.set_visibility(vec![
            vec![VisibleFacet { id: 1, view_factor: 0.25 }],
            vec![VisibleFacet { id: 0, view_factor: 0.5 }],
        ])
        .unwrap();
        mesh.facets[0].flux.sun = 100.0;
        mesh.facets[1].flux.sun = 40.0;
        mesh.facets[0].temperature = vec![200.0, 190.0];
        mesh.facets[1].temperature = vec![300.0, 290.0];

        scatter_single(&mut mesh, &vec![0.1_f64, 0.2]);
        assert_abs_diff_eq!(mesh.facets[0].flux.scat, 0.25 * 0.2 * 40.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mesh.facets[1].flux.scat, 0.5 * 0.1 * 100.0, epsilon = 1e-12);

        reradiate_single(&mut mesh, &0.9_f64);
        let expected = 0.25 * 0.9 * STEFAN_BOLTZMANN * 300.0_f64.powi(4);
        assert_abs_diff_eq!(mesh.facets[0].flux.rad, expected, epsilon = 1e-9);
    }
}

/// Sets the direct solar flux of every facet.
///
/// A facet receives `flux * cos(theta)` when it faces the sun and, with
/// `self_shadowing` on, no other facet of the body crosses the ray from its
/// centroid towards the sun. Otherwise its solar flux is exactly zero.
pub fn illuminate(mesh: &mut ShapeMesh, flux: f64, sun: &Vector3<f64>, self_shadowing: bool) {
    let sun = sun.normalize();
    let facets = &mesh.facets;
    let occluders = &mesh.occluders;

    let sun_flux: Vec<f64> = facets
        .par_iter()
        .enumerate()
        .map(|(i, facet)| {
            let cos = facet.normal.dot(&sun);
            if cos <= 0.0 {
                return 0.0;
            }
            if self_shadowing {
                let ray = Ray::new(facet.centroid, sun);
                let shadowed = occluders.row(i).iter().any(|&k| {
                    let [a, b, c] = &facets[k].vertices;
                    ray.hits(a, b, c)
                });
                if shadowed {
                    return 0.0;
                }
            }
            flux * cos
        })
        .collect();

    for (facet, f) in mesh.facets.iter_mut().zip(sun_flux) {
        facet.flux.sun = f;
    }
}

/// Single scattering of sunlight: `sum_j f_ij * albedo_j * F_sun_j`.
pub fn scatter_single<A>(mesh: &mut ShapeMesh, albedo: &A)
where
    A: PerFacet + Sync + ?Sized,
{
    let facets = &mesh.facets;
    let visibility = &mesh.visibility;

    let scat: Vec<f64> = (0..facets.len())
        .into_par_iter()
        .map(|i| {
            visibility
                .row(i)
                .iter()
                .map(|v| v.view_factor * albedo.at(v.id) * facets[v.id].flux.sun)
                .sum::<f64>()
        })
        .collect();

    for (facet, f) in mesh.facets.iter_mut().zip(scat) {
        facet.flux.scat = f;
    }
}

/// Single re-absorption of thermal emission: `sum_j f_ij * eps_j * sigma * T_j^4`.
pub fn reradiate_single<A>(mesh: &mut ShapeMesh, emissivity: &A)
where
    A: PerFacet + Sync + ?Sized,
{
    let facets = &mesh.facets;
    let visibility = &mesh.visibility;

    let rad: Vec<f64> = (0..facets.len())
        .into_par_iter()
        .map(|i| {
            visibility
                .row(i)
                .iter()
                .map(|v| {
                    let t = facets[v.id].surface_temperature();
                    v.view_factor * emissivity.at(v.id) * STEFAN_BOLTZMANN * t.powi(4)
                })
                .sum::<f64>()
        })
        .collect();

    for (facet, f) in mesh.facets.iter_mut().zip(rad) {
        facet.flux.rad = f;
    }
}
