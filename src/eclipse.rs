//! Mutual shadowing between the two members of a binary.
//!
//! Everything is evaluated in the primary's body frame (A). The secondary (B)
//! is placed there with the rotation B -> A and the offset of its centre from
//! A's centre. The sun is far enough away that both bodies share one sun
//! direction.

use std::f64::consts::PI;

use log::trace;
use nalgebra::{Point3, Rotation3, Vector3};
use rayon::prelude::*;

use crate::geom::ShapeMesh;
use crate::raycast::Ray;


/// Facets newly darkened by one eclipse pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EclipseOutcome {
    pub primary: Vec<usize>,
    pub secondary: Vec<usize>,
}

impl EclipseOutcome {
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.secondary.is_empty()
    }
}

/// Cheap test on bounding spheres. Returns false when neither body can shade
/// the other for this sun direction.
///
/// With `theta` the angle between the sun and the secondary seen from the
/// primary, and `theta_c = asin((R_a + R_b) / |sec_from_a|)`, no eclipse is
/// possible when `theta_c < theta < pi - theta_c`.
pub fn eclipse_possible(
    a: &ShapeMesh,
    b: &ShapeMesh,
    sun_from_a: &Vector3<f64>,
    sec_from_a: &Vector3<f64>,
) -> bool {
    let distance = sec_from_a.norm();
    let radii = a.max_radius + b.max_radius;
    if distance <= radii {
        return true;
    }

    let theta_c = (radii / distance).asin();
    let cos_theta = sun_from_a.dot(sec_from_a) / (sun_from_a.norm() * distance);
    let theta = cos_theta.clamp(-1.0, 1.0).acos();

    !(theta_c < theta && theta < PI - theta_c)
}

/// Whether a ray can come within `radius` of `centre` at all.
#[inline]
fn ray_near_sphere(ray: &Ray, centre: &Point3<f64>, radius: f64) -> bool {
    let oc = centre - ray.origin;
    let along = oc.dot(&ray.direction);
    if along < -radius {
        return false;
    }
    (oc - ray.direction * along).norm_squared() <= radius * radius
}

/// Finds the currently lit facets of each body that the other body shades.
///
/// Only lit facets are tested and only lit facets are used as blockers: for a
/// closed body, a ray towards the sun that passes through it leaves through a
/// lit facet. Nothing is modified.
pub fn find_eclipsed(
    a: &ShapeMesh,
    b: &ShapeMesh,
    sun_from_a: &Vector3<f64>,
    sec_from_a: &Vector3<f64>,
    rotation_b_to_a: &Rotation3<f64>,
) -> EclipseOutcome {
    let sun = sun_from_a.normalize();
    let origin_a = Point3::origin();
    let origin_b = Point3::from(*sec_from_a);

    let lit_a: Vec<usize> = (0..a.num_facets()).filter(|&i| a.facets[i].is_lit()).collect();
    let lit_b: Vec<usize> = (0..b.num_facets()).filter(|&j| b.facets[j].is_lit()).collect();
    if lit_a.is_empty() || lit_b.is_empty() {
        return EclipseOutcome::default();
    }

    let to_a = |p: &Point3<f64>| rotation_b_to_a * p + sec_from_a;
    let tris_b: Vec<[Point3<f64>; 3]> = lit_b
        .iter()
        .map(|&j| b.facets[j].vertices.map(|v| to_a(&v)))
        .collect();

    let primary: Vec<usize> = lit_a
        .par_iter()
        .copied()
        .filter(|&i| {
            let ray = Ray::new(a.facets[i].centroid, sun);
            ray_near_sphere(&ray, &origin_b, b.max_radius)
                && tris_b.iter().any(|[p, q, r]| ray.hits(p, q, r))
        })
        .collect();

    let secondary: Vec<usize> = lit_b
        .par_iter()
        .copied()
        .filter(|&j| {
            let ray = Ray::new(to_a(&b.facets[j].centroid), sun);
            ray_near_sphere(&ray, &origin_a, a.max_radius)
                && lit_a.iter().any(|&i| {
                    let [p, q, r] = &a.facets[i].vertices;
                    ray.hits(p, q, r)
                })
        })
        .collect();

    EclipseOutcome { primary, secondary }
}

/// Zeroes the solar flux of every lit facet that the companion body shades.
///
/// Skips all raycasting when [`eclipse_possible`] rules an eclipse out.
/// Flips are one-way (lit to dark), so a second call in the same step
/// changes nothing.
pub fn resolve_eclipse(
    a: &mut ShapeMesh,
    b: &mut ShapeMesh,
    sun_from_a: &Vector3<f64>,
    sec_from_a: &Vector3<f64>,
    rotation_b_to_a: &Rotation3<f64>,
) -> EclipseOutcome {
    if !eclipse_possible(a, b, sun_from_a, sec_from_a) {
        return EclipseOutcome::default();
    }

    let outcome = find_eclipsed(a, b, sun_from_a, sec_from_a, rotation_b_to_a);
    for &i in &outcome.primary {
        a.facets[i].flux.sun = 0.0;
    }
    for &j in &outcome.secondary {
        b.facets[j].flux.sun = 0.0;
    }

    if !outcome.is_empty() {
        trace!(
            "eclipse: {} primary and {} secondary facets darkened",
            outcome.primary.len(),
            outcome.secondary.len()
        );
    }
    outcome
}
