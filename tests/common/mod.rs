#![allow(dead_code)]

use asteroid_tpm::geom::ShapeMesh;
use asteroid_tpm::params::ThermoParams;
use nalgebra::Point3;

pub fn shape_path(name: &str) -> String {
    format!("{}/shapes/{}", env!("CARGO_MANIFEST_DIR"), name)
}

/// Regular icosahedron with the given circumradius.
pub fn icosahedron(radius: f64) -> ShapeMesh {
    ShapeMesh::from_obj(shape_path("icosahedron.obj"), radius).unwrap()
}

/// A single triangle in the z = 0 plane facing +z, area 0.5.
pub fn flat_facet() -> ShapeMesh {
    let vertices = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
    ];
    ShapeMesh::new(&vertices, &[[0, 1, 2]]).unwrap()
}

/// Two facets facing +z: a large one at z = 1 directly above a small one at
/// z = 0.
pub fn stacked_facets() -> ShapeMesh {
    let vertices = vec![
        Point3::new(-1.0, -1.0, 1.0),
        Point3::new(2.0, -1.0, 1.0),
        Point3::new(-1.0, 2.0, 1.0),
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
    ];
    ShapeMesh::new(&vertices, &[[0, 1, 2], [3, 4, 5]]).unwrap()
}

/// Black body, kappa = 1e-6 m^2/s, 5 cm column in 6 nodes.
pub fn black_body_params() -> ThermoParams {
    ThermoParams::uniform(0.0, 0.0, 1.0, 1.0, 1000.0, 1000.0, 0.05, 6)
}
