use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use crate::config::{COPLANAR_TOLERANCE, MIN_FACET_AREA, VIEW_FACTOR_SUM_TOLERANCE};
use crate::error::TpmError;
use crate::params::ThermoParams;
use crate::visibility;


/// Rows of variable length packed into one flat array, indexed by offsets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CsrList<T> {
    offsets: Vec<usize>,
    entries: Vec<T>,
}

impl<T> CsrList<T> {
    pub fn from_rows(rows: Vec<Vec<T>>) -> Self {
        let mut offsets = Vec::with_capacity(rows.len() + 1);
        offsets.push(0);
        let mut entries = Vec::with_capacity(rows.iter().map(Vec::len).sum());
        for row in rows {
            entries.extend(row);
            offsets.push(entries.len());
        }
        Self { offsets, entries }
    }

    /// A list with `n` empty rows.
    pub fn empty(n: usize) -> Self {
        Self {
            offsets: vec![0; n + 1],
            entries: Vec::new(),
        }
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[T] {
        &self.entries[self.offsets[i]..self.offsets[i + 1]]
    }

    pub fn num_rows(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }
}

/// A neighbour in a facet's visibility list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleFacet {
    pub id: usize,
    /// Fraction of the energy leaving facet `id` diffusely that reaches the owning facet.
    pub view_factor: f64,
}

/// Fluxes received by a facet during the current step [W m^-2].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FacetFlux {
    pub sun: f64,
    pub scat: f64,
    pub rad: f64,
}

/// A planar triangular surface element with its own conduction column.
#[derive(Debug, Clone, PartialEq)]
pub struct Facet {
    pub vertices: [Point3<f64>; 3],
    pub centroid: Point3<f64>,
    pub normal: Vector3<f64>,
    pub area: f64,
    /// Temperature profile from the surface (index 0) downwards [K].
    pub temperature: Vec<f64>,
    /// Scratch profile for the explicit update.
    pub temperature_next: Vec<f64>,
    pub flux: FacetFlux,
    /// Photon-pressure force from this facet in the body frame [N].
    pub force: Vector3<f64>,
}

impl Facet {
    pub fn new(a: Point3<f64>, b: Point3<f64>, c: Point3<f64>) -> Result<Self, TpmError> {
        if [a, b, c].iter().any(|p| !p.coords.iter().all(|x| x.is_finite())) {
            return Err(TpmError::InvalidMesh(format!(
                "non-finite vertex in facet {:?}",
                [a, b, c]
            )));
        }

        let cross = (b - a).cross(&(c - a));
        let area = 0.5 * cross.norm();
        if !(area > MIN_FACET_AREA) {
            return Err(TpmError::InvalidMesh(format!(
                "degenerate facet with area {:e}",
                area
            )));
        }

        Ok(Self {
            vertices: [a, b, c],
            centroid: Point3::from((a.coords + b.coords + c.coords) / 3.0),
            normal: cross / (2.0 * area),
            area,
            temperature: Vec::new(),
            temperature_next: Vec::new(),
            flux: FacetFlux::default(),
            force: Vector3::zeros(),
        })
    }

    /// Shallowest node of the depth profile.
    #[inline]
    pub fn surface_temperature(&self) -> f64 {
        self.temperature.first().copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn is_lit(&self) -> bool {
        self.flux.sun > 0.0
    }

    /// Whether any vertex of `other` lies strictly in front of this facet's plane.
    fn sees_part_of(&self, other: &Facet) -> bool {
        other
            .vertices
            .iter()
            .any(|v| (v - self.centroid).dot(&self.normal) > COPLANAR_TOLERANCE)
    }
}

/// A closed (or open) triangulated surface and its whole-body aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeMesh {
    pub facets: Vec<Facet>,
    /// Largest vertex distance from the body origin [m].
    pub max_radius: f64,
    /// Neighbours exchanging scattered and thermal radiation.
    pub visibility: CsrList<VisibleFacet>,
    /// Facets that can block a ray leaving each facet's front hemisphere.
    pub occluders: CsrList<usize>,
    /// Net photon-pressure force in the body frame [N].
    pub force: Vector3<f64>,
    /// Net photon-pressure torque in the body frame [N m].
    pub torque: Vector3<f64>,
}

impl ShapeMesh {
    /// Builds a mesh from a vertex table and triangles, counter-clockwise seen
    /// from outside. Visibility starts empty.
    pub fn new(vertices: &[Point3<f64>], faces: &[[usize; 3]]) -> Result<Self, TpmError> {
        if faces.is_empty() {
            return Err(TpmError::InvalidMesh("mesh has no facets".to_string()));
        }

        let facets = faces
            .iter()
            .enumerate()
            .map(|(i, face)| {
                let get = |k: usize| {
                    vertices.get(face[k]).copied().ok_or_else(|| {
                        TpmError::InvalidMesh(format!(
                            "facet {} references vertex {} of {}",
                            i,
                            face[k],
                            vertices.len()
                        ))
                    })
                };
                Facet::new(get(0)?, get(1)?, get(2)?).map_err(|e| match e {
                    TpmError::InvalidMesh(reason) => {
                        TpmError::InvalidMesh(format!("facet {}: {}", i, reason))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let max_radius = facets
            .iter()
            .flat_map(|f| f.vertices.iter())
            .map(|v| v.coords.norm())
            .fold(0.0, f64::max);

        let occluders = find_occluders(&facets);
        let num_facets = facets.len();

        Ok(Self {
            facets,
            max_radius,
            visibility: CsrList::empty(num_facets),
            occluders,
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
        })
    }

    /// Loads a Wavefront OBJ file, scales it and precomputes visibility.
    pub fn from_obj<P: AsRef<Path>>(path: P, scale: f64) -> Result<Self> {
        let path = path.as_ref();
        let (models, _) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
        )
        .with_context(|| format!("failed to load OBJ file {}", path.display()))?;

        if models.len() != 1 {
            return Err(anyhow!(
                "expected exactly one mesh in {}, found {}",
                path.display(),
                models.len()
            ));
        }

        let mesh = &models[0].mesh;
        let vertices: Vec<Point3<f64>> = mesh
            .positions
            .chunks_exact(3)
            .map(|p| Point3::new(p[0] as f64, p[1] as f64, p[2] as f64) * scale)
            .collect();
        let faces: Vec<[usize; 3]> = mesh
            .indices
            .chunks_exact(3)
            .map(|f| [f[0] as usize, f[1] as usize, f[2] as usize])
            .collect();

        let mut shape = ShapeMesh::new(&vertices, &faces)
            .with_context(|| format!("invalid geometry in {}", path.display()))?;
        shape.build_visibility()?;

        info!(
            "loaded {}: {} facets, {} vertices, max radius {:.3} m, {} visible pairs",
            path.display(),
            shape.num_facets(),
            vertices.len(),
            shape.max_radius,
            shape.visibility.num_entries()
        );
        Ok(shape)
    }

    pub fn num_facets(&self) -> usize {
        self.facets.len()
    }

    /// Computes view factors from the geometry and installs them.
    pub fn build_visibility(&mut self) -> Result<(), TpmError> {
        let rows = visibility::build(self);
        self.set_visibility(rows)
    }

    /// Installs precomputed visibility lists after checking them.
    pub fn set_visibility(&mut self, rows: Vec<Vec<VisibleFacet>>) -> Result<(), TpmError> {
        let n = self.num_facets();
        if rows.len() != n {
            return Err(TpmError::InvalidMesh(format!(
                "visibility has {} rows for {} facets",
                rows.len(),
                n
            )));
        }

        for (i, row) in rows.iter().enumerate() {
            let mut sum = 0.0;
            for entry in row {
                if entry.id == i {
                    return Err(TpmError::InvalidMesh(format!(
                        "facet {} lists itself as visible",
                        i
                    )));
                }
                if entry.id >= n {
                    return Err(TpmError::InvalidMesh(format!(
                        "facet {} lists neighbour {} of {}",
                        i, entry.id, n
                    )));
                }
                if !entry.view_factor.is_finite() || entry.view_factor < 0.0 {
                    return Err(TpmError::InvalidMesh(format!(
                        "facet {} has view factor {} towards {}",
                        i, entry.view_factor, entry.id
                    )));
                }
                sum += entry.view_factor;
            }
            if sum > 1.0 + VIEW_FACTOR_SUM_TOLERANCE {
                return Err(TpmError::InvalidMesh(format!(
                    "view factors of facet {} sum to {}",
                    i, sum
                )));
            }
        }

        self.visibility = CsrList::from_rows(rows);
        Ok(())
    }

    /// Sizes every depth profile and fills it with the initial temperature.
    pub fn init_temperatures(&mut self, params: &ThermoParams) {
        let t0 = params.initial_temperature;
        for facet in self.facets.iter_mut() {
            facet.temperature = vec![t0; params.n_depth];
            facet.temperature_next = vec![t0; params.n_depth];
        }
    }

    pub fn surface_temperatures(&self) -> Vec<f64> {
        self.facets.iter().map(Facet::surface_temperature).collect()
    }

    pub fn total_area(&self) -> f64 {
        self.facets.iter().map(|f| f.area).sum()
    }

    pub fn num_lit(&self) -> usize {
        self.facets.iter().filter(|f| f.is_lit()).count()
    }
}

/// For each facet, the facets with a vertex above its plane. Any triangle that
/// blocks a ray leaving a facet's front side must be in this list.
fn find_occluders(facets: &[Facet]) -> CsrList<usize> {
    let rows: Vec<Vec<usize>> = facets
        .par_iter()
        .enumerate()
        .map(|(i, facet)| {
            facets
                .iter()
                .enumerate()
                .filter(|&(j, other)| j != i && facet.sees_part_of(other))
                .map(|(j, _)| j)
                .collect()
        })
        .collect();

    let list = CsrList::from_rows(rows);
    debug!(
        "occluder candidates: {} entries over {} facets",
        list.num_entries(),
        list.num_rows()
    );
    list
}
