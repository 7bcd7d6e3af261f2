//! Static visibility between facets of one body.
//!
//! Two facets see each other when each centroid is in front of the other
//! facet and no third facet crosses the segment joining the centroids. The
//! weight stored for the pair is the centroid-to-centroid view factor
//! `cos(theta_i) cos(theta_j) A_j / (pi d^2)`.

use std::f64::consts::PI;

use log::warn;
use rayon::prelude::*;

use crate::geom::{ShapeMesh, VisibleFacet};
use crate::raycast::segment_blocked;


/// Computes the visibility list of every facet.
pub fn build(mesh: &ShapeMesh) -> Vec<Vec<VisibleFacet>> {
    let facets = &mesh.facets;

    let rows: Vec<Vec<VisibleFacet>> = (0..facets.len())
        .into_par_iter()
        .map(|i| {
            let fi = &facets[i];
            let candidates = mesh.occluders.row(i);

            let mut row: Vec<VisibleFacet> = candidates
                .iter()
                .filter_map(|&j| {
                    let fj = &facets[j];
                    let d = fj.centroid - fi.centroid;
                    let dist2 = d.norm_squared();
                    let dist = dist2.sqrt();
                    let cos_i = fi.normal.dot(&d) / dist;
                    let cos_j = -fj.normal.dot(&d) / dist;
                    if cos_i <= 0.0 || cos_j <= 0.0 {
                        return None;
                    }

                    let blocked = candidates.iter().any(|&k| {
                        k != j && {
                            let [a, b, c] = &facets[k].vertices;
                            segment_blocked(&fi.centroid, &fj.centroid, a, b, c)
                        }
                    });
                    if blocked {
                        return None;
                    }

                    Some(VisibleFacet {
                        id: j,
                        view_factor: cos_i * cos_j * fj.area / (PI * dist2),
                    })
                })
                .collect();

            let sum: f64 = row.iter().map(|v| v.view_factor).sum();
            if sum > 1.0 {
                warn!(
                    "view factors of facet {} sum to {:.4}; renormalising to 1",
                    i, sum
                );
                for v in row.iter_mut() {
                    v.view_factor /= sum;
                }
            }
            row
        })
        .collect();

    rows
}
