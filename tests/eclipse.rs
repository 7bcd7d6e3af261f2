mod common;

use asteroid_tpm::eclipse::{eclipse_possible, find_eclipsed, resolve_eclipse};
use asteroid_tpm::flux::illuminate;
use asteroid_tpm::geom::ShapeMesh;
use nalgebra::{Rotation3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn sun_fluxes(mesh: &ShapeMesh) -> Vec<f64> {
    mesh.facets.iter().map(|f| f.flux.sun).collect()
}

/// Lights both bodies with the same sun; `rotation` takes B's frame to A's.
fn light_pair(a: &mut ShapeMesh, b: &mut ShapeMesh, sun: &Vector3<f64>, rotation: &Rotation3<f64>) {
    illuminate(a, 1000.0, sun, true);
    illuminate(b, 1000.0, &(rotation.inverse() * sun), true);
}

#[test]
fn companion_outside_the_critical_angle_changes_nothing() {
    let mut a = common::icosahedron(1.0);
    let mut b = common::icosahedron(0.5);
    let sec = Vector3::new(20.0, 0.0, 0.0);
    let sun = Vector3::new(0.0, 1.0, 0.3);
    let rotation = Rotation3::identity();
    light_pair(&mut a, &mut b, &sun, &rotation);

    assert!(!eclipse_possible(&a, &b, &sun, &sec));
    let (before_a, before_b) = (sun_fluxes(&a), sun_fluxes(&b));
    let outcome = resolve_eclipse(&mut a, &mut b, &sun, &sec, &rotation);
    assert!(outcome.is_empty());
    assert_eq!(sun_fluxes(&a), before_a);
    assert_eq!(sun_fluxes(&b), before_b);
}

#[test]
fn secondary_in_front_of_the_sun_darkens_the_primary() {
    let mut a = common::icosahedron(1.0);
    let mut b = common::icosahedron(1.0);
    let sec = Vector3::new(4.0, 0.0, 0.0);
    let sun = Vector3::x();
    let rotation = Rotation3::from_euler_angles(0.3, -0.2, 1.1);
    light_pair(&mut a, &mut b, &sun, &rotation);
    let lit_before = a.num_lit();

    let outcome = resolve_eclipse(&mut a, &mut b, &sun, &sec, &rotation);
    assert!(!outcome.primary.is_empty());
    // B's lit side faces away from A
    assert!(outcome.secondary.is_empty());
    assert_eq!(a.num_lit(), lit_before - outcome.primary.len());
    for &i in &outcome.primary {
        assert_eq!(a.facets[i].flux.sun, 0.0);
    }
}

#[test]
fn eclipse_is_idempotent() {
    let mut a = common::icosahedron(1.0);
    let mut b = common::icosahedron(0.8);
    let sec = Vector3::new(-3.0, 0.5, 0.0);
    // sun behind A as seen from B: A shades B
    let sun = Vector3::new(1.0, -0.1, 0.0);
    let rotation = Rotation3::from_euler_angles(1.0, 0.5, -0.4);
    light_pair(&mut a, &mut b, &sun, &rotation);

    let first = resolve_eclipse(&mut a, &mut b, &sun, &sec, &rotation);
    assert!(!first.secondary.is_empty());
    let (once_a, once_b) = (sun_fluxes(&a), sun_fluxes(&b));

    let second = resolve_eclipse(&mut a, &mut b, &sun, &sec, &rotation);
    assert!(second.is_empty());
    assert_eq!(sun_fluxes(&a), once_a);
    assert_eq!(sun_fluxes(&b), once_b);
}

#[test]
fn pre_filter_never_hides_an_eclipse() {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut a = common::icosahedron(1.0);
    let mut b = common::icosahedron(0.6);
    let mut ruled_out = 0;
    let mut found = 0;

    for _ in 0..300 {
        let sun = random_unit(&mut rng);
        let sec = random_unit(&mut rng) * rng.random_range(1.8..6.0);
        let rotation = Rotation3::from_euler_angles(
            rng.random_range(0.0..6.3),
            rng.random_range(0.0..6.3),
            rng.random_range(0.0..6.3),
        );
        light_pair(&mut a, &mut b, &sun, &rotation);

        let brute = find_eclipsed(&a, &b, &sun, &sec, &rotation);
        if !eclipse_possible(&a, &b, &sun, &sec) {
            ruled_out += 1;
            assert!(brute.is_empty(), "pre-filter missed {:?}", brute);
        }
        if !brute.is_empty() {
            found += 1;
        }
    }
    // the sample covers both outcomes
    assert!(ruled_out > 0);
    assert!(found > 0);
}

fn random_unit(rng: &mut StdRng) -> Vector3<f64> {
    loop {
        let v = Vector3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        );
        let n = v.norm();
        if n > 1e-3 && n <= 1.0 {
            return v / n;
        }
    }
}
