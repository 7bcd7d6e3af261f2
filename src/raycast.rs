//! Ray-triangle intersection for self-shadowing, visibility and eclipses.

use nalgebra::{Point3, Vector3};

use crate::config::{RAYCAST_MINIMUM_DISTANCE, RAY_PARALLEL_EPSILON};


/// A half-line from `origin` along `direction`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f64>,
    pub direction: Vector3<f64>,
}

impl Ray {
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Self {
        Self { origin, direction }
    }

    /// Moller-Trumbore intersection with the triangle (a, b, c), two-sided.
    ///
    /// Returns the ray parameter of the hit. Hits closer than
    /// [`RAYCAST_MINIMUM_DISTANCE`] are ignored so a ray leaving a facet does
    /// not hit that facet.
    pub fn intersect_triangle(
        &self,
        a: &Point3<f64>,
        b: &Point3<f64>,
        c: &Point3<f64>,
    ) -> Option<f64> {
        let edge1 = b - a;
        let edge2 = c - a;
        let h = self.direction.cross(&edge2);
        let det = edge1.dot(&h);

        if det.abs() < RAY_PARALLEL_EPSILON {
            return None;
        }

        let inv_det = 1.0 / det;
        let s = self.origin - a;
        let u = inv_det * s.dot(&h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = inv_det * self.direction.dot(&q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = inv_det * edge2.dot(&q);
        if t > RAYCAST_MINIMUM_DISTANCE {
            Some(t)
        } else {
            None
        }
    }

    /// Whether the ray hits the triangle at all.
    #[inline]
    pub fn hits(&self, a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> bool {
        self.intersect_triangle(a, b, c).is_some()
    }
}

/// Whether the triangle (a, b, c) crosses the open segment from `from` to `to`.
pub fn segment_blocked(
    from: &Point3<f64>,
    to: &Point3<f64>,
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> bool {
    let ray = Ray::new(*from, to - from);
    // the direction is not normalised, so t is a fraction of the segment
    matches!(ray.intersect_triangle(a, b, c), Some(t) if t < 1.0 - RAYCAST_MINIMUM_DISTANCE)
}
