mod common;

use approx::assert_abs_diff_eq;
use asteroid_tpm::flux::illuminate;
use asteroid_tpm::geom::ShapeMesh;
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn facet_behind_another_is_shadowed() {
    let mut mesh = common::stacked_facets();
    let sun = Vector3::z();

    illuminate(&mut mesh, 1000.0, &sun, true);
    assert_abs_diff_eq!(mesh.facets[0].flux.sun, 1000.0, epsilon = 1e-9);
    assert_eq!(mesh.facets[1].flux.sun, 0.0);

    // without the shadow test both face the sun
    illuminate(&mut mesh, 1000.0, &sun, false);
    assert_abs_diff_eq!(mesh.facets[1].flux.sun, 1000.0, epsilon = 1e-9);

    // a sun from the side lets the lower facet see past the upper one
    let low_sun = Vector3::new(-1.0, -1.0, 0.2);
    illuminate(&mut mesh, 1000.0, &low_sun, true);
    assert!(mesh.facets[1].flux.sun > 0.0);
}

#[test]
fn no_sunlight_on_the_night_side() {
    let mut mesh = ShapeMesh::from_obj(common::shape_path("lumpy.obj"), 500.0).unwrap();
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..50 {
        let sun = Vector3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        );
        if sun.norm() < 1e-3 {
            continue;
        }
        let unit = sun.normalize();
        illuminate(&mut mesh, 600.0, &sun, true);

        for facet in &mesh.facets {
            let cos = facet.normal.dot(&unit);
            if cos <= 0.0 {
                assert_eq!(facet.flux.sun, 0.0);
            } else {
                assert!(facet.flux.sun == 0.0 || (facet.flux.sun - 600.0 * cos).abs() < 1e-9);
            }
        }
    }
}

#[test]
fn loaded_shape_has_consistent_visibility() {
    let mesh = ShapeMesh::from_obj(common::shape_path("lumpy.obj"), 500.0).unwrap();
    assert_eq!(mesh.num_facets(), 80);
    for i in 0..mesh.num_facets() {
        let row = mesh.visibility.row(i);
        assert!(row.iter().all(|v| v.id != i && v.view_factor > 0.0));
        let sum: f64 = row.iter().map(|v| v.view_factor).sum();
        assert!(sum <= 1.0 + 1e-9);
    }
}
