//! Thermophysical parameters.
//!
//! Every material property may be uniform over the body or given per facet.
//! Flux, conduction and energy routines read them through [`PerFacet`], so
//! the same code serves both cases.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::config::MAX_STABILITY_NUMBER;
use crate::error::TpmError;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn uniform_and_per_facet_lookup() {
        let uniform = FacetValue::Uniform(0.1);
        let per_facet = FacetValue::PerFacet(vec![0.1, 0.2, 0.3]);
        assert_eq!(uniform.at(2), 0.1);
        assert_eq!(per_facet.at(2), 0.3);
        assert_eq!(0.5_f64.at(7), 0.5);
        assert_eq!([1.0_f64, 2.0][..].at(1), 2.0);
    }

    #[test]
    fn untagged_deserialize() {
        let scalar: FacetValue = serde_json::from_str("0.9").unwrap();
        let list: FacetValue = serde_json::from_str("[0.9, 0.8]").unwrap();
        assert_eq!(scalar, FacetValue::Uniform(0.9));
        assert_eq!(list, FacetValue::PerFacet(vec![0.9, 0.8]));
    }

    #[test]
    fn derived_quantities() {
        let params = ThermoParams::uniform(0.1, 0.0, 0.9, 0.1, 1500.0, 600.0, 0.5, 51);
        assert_abs_diff_eq!(params.dz(), 0.01, epsilon = 1e-12);
        assert_abs_diff_eq!(params.diffusivity(0), 0.1 / 9.0e5, epsilon = 1e-15);
        assert_abs_diff_eq!(params.thermal_inertia(0), (0.1_f64 * 9.0e5).sqrt(), epsilon = 1e-9);
        let period = 6.0 * 3600.0;
        let skin = (0.1 / 9.0e5 * period / PI).sqrt();
        assert_abs_diff_eq!(params.skin_depth(0, period), skin, epsilon = 1e-12);
    }

    #[test]
    fn rejects_wrong_length_and_unstable_step() {
        let mut params = ThermoParams::uniform(0.1, 0.0, 0.9, 1.0, 1000.0, 1000.0, 0.05, 6);
        assert!(params.validate(4, 40.0).is_ok());
        // lambda = 1e-6 * 60 / 1e-4 = 0.6
        assert!(matches!(
            params.validate(4, 60.0),
            Err(TpmError::InvalidParameters(_))
        ));
        params.emissivity = FacetValue::PerFacet(vec![0.9; 3]);
        assert!(params.validate(4, 40.0).is_err());
    }
}

/// A value that can be looked up by facet index.
pub trait PerFacet {
    fn at(&self, facet: usize) -> f64;
}

impl PerFacet for f64 {
    fn at(&self, _facet: usize) -> f64 {
        *self
    }
}

impl PerFacet for [f64] {
    fn at(&self, facet: usize) -> f64 {
        self[facet]
    }
}

impl PerFacet for Vec<f64> {
    fn at(&self, facet: usize) -> f64 {
        self[facet]
    }
}

/// A scalar property, either shared by the whole body or one value per facet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FacetValue {
    Uniform(f64),
    PerFacet(Vec<f64>),
}

impl PerFacet for FacetValue {
    #[inline]
    fn at(&self, facet: usize) -> f64 {
        match self {
            FacetValue::Uniform(value) => *value,
            FacetValue::PerFacet(values) => values[facet],
        }
    }
}

impl From<f64> for FacetValue {
    fn from(value: f64) -> Self {
        FacetValue::Uniform(value)
    }
}

impl From<Vec<f64>> for FacetValue {
    fn from(values: Vec<f64>) -> Self {
        FacetValue::PerFacet(values)
    }
}

impl FacetValue {
    fn check(&self, name: &str, num_facets: usize, range: (f64, f64)) -> Result<(), TpmError> {
        let values: &[f64] = match self {
            FacetValue::Uniform(value) => std::slice::from_ref(value),
            FacetValue::PerFacet(values) => {
                if values.len() != num_facets {
                    return Err(TpmError::InvalidParameters(format!(
                        "{} has {} values but the mesh has {} facets",
                        name,
                        values.len(),
                        num_facets
                    )));
                }
                values
            }
        };
        if let Some(bad) = values
            .iter()
            .find(|v| !v.is_finite() || **v < range.0 || **v > range.1)
        {
            return Err(TpmError::InvalidParameters(format!(
                "{} value {} outside [{}, {}]",
                name, bad, range.0, range.1
            )));
        }
        Ok(())
    }
}

/// Material properties and depth discretisation of the conduction columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermoParams {
    pub bond_albedo: FacetValue,
    pub thermal_albedo: FacetValue,
    pub emissivity: FacetValue,
    /// Thermal conductivity [W m^-1 K^-1].
    pub conductivity: FacetValue,
    /// Bulk density [kg m^-3].
    pub density: FacetValue,
    /// Specific heat capacity [J kg^-1 K^-1].
    pub heat_capacity: FacetValue,
    /// Depth of the modelled column [m].
    pub depth: f64,
    /// Number of depth nodes, surface included.
    pub n_depth: usize,
    /// Uniform starting temperature of every node [K].
    #[serde(default)]
    pub initial_temperature: f64,
}

impl ThermoParams {
    /// Parameters shared by every facet.
    #[allow(clippy::too_many_arguments)]
    pub fn uniform(
        bond_albedo: f64,
        thermal_albedo: f64,
        emissivity: f64,
        conductivity: f64,
        density: f64,
        heat_capacity: f64,
        depth: f64,
        n_depth: usize,
    ) -> Self {
        Self {
            bond_albedo: bond_albedo.into(),
            thermal_albedo: thermal_albedo.into(),
            emissivity: emissivity.into(),
            conductivity: conductivity.into(),
            density: density.into(),
            heat_capacity: heat_capacity.into(),
            depth,
            n_depth,
            initial_temperature: 0.0,
        }
    }

    /// Node spacing [m].
    pub fn dz(&self) -> f64 {
        self.depth / (self.n_depth - 1) as f64
    }

    /// Thermal diffusivity k / (rho c) [m^2 s^-1].
    pub fn diffusivity(&self, facet: usize) -> f64 {
        self.conductivity.at(facet) / (self.density.at(facet) * self.heat_capacity.at(facet))
    }

    /// Thermal inertia sqrt(k rho c) [J m^-2 K^-1 s^-1/2].
    pub fn thermal_inertia(&self, facet: usize) -> f64 {
        (self.conductivity.at(facet) * self.density.at(facet) * self.heat_capacity.at(facet)).sqrt()
    }

    /// Diurnal thermal skin depth sqrt(kappa P / pi) [m].
    pub fn skin_depth(&self, facet: usize, period: f64) -> f64 {
        (self.diffusivity(facet) * period / PI).sqrt()
    }

    /// Explicit diffusion number kappa dt / dz^2.
    pub fn stability_number(&self, facet: usize, dt: f64) -> f64 {
        self.diffusivity(facet) * dt / self.dz().powi(2)
    }

    /// Largest stability number over all facets.
    pub fn max_stability_number(&self, num_facets: usize, dt: f64) -> f64 {
        (0..num_facets)
            .map(|i| self.stability_number(i, dt))
            .fold(0.0, f64::max)
    }

    /// Checks the parameter set against a mesh size and a timestep.
    pub fn validate(&self, num_facets: usize, dt: f64) -> Result<(), TpmError> {
        self.bond_albedo.check("bond_albedo", num_facets, (0.0, 1.0))?;
        self.thermal_albedo.check("thermal_albedo", num_facets, (0.0, 1.0))?;
        self.emissivity.check("emissivity", num_facets, (0.0, 1.0))?;
        self.conductivity.check("conductivity", num_facets, (0.0, f64::MAX))?;
        self.density.check("density", num_facets, (f64::MIN_POSITIVE, f64::MAX))?;
        self.heat_capacity.check("heat_capacity", num_facets, (f64::MIN_POSITIVE, f64::MAX))?;

        if self.n_depth < 3 {
            return Err(TpmError::InvalidParameters(format!(
                "n_depth must be at least 3, got {}",
                self.n_depth
            )));
        }
        if !(self.depth > 0.0) {
            return Err(TpmError::InvalidParameters(format!(
                "depth must be positive, got {}",
                self.depth
            )));
        }
        if !(self.initial_temperature >= 0.0) {
            return Err(TpmError::InvalidParameters(format!(
                "initial temperature must be non-negative, got {}",
                self.initial_temperature
            )));
        }

        let lambda = self.max_stability_number(num_facets, dt);
        if lambda > MAX_STABILITY_NUMBER {
            return Err(TpmError::InvalidParameters(format!(
                "explicit scheme unstable: lambda = {:.4} > {} (dt = {} s, dz = {} m)",
                lambda,
                MAX_STABILITY_NUMBER,
                dt,
                self.dz()
            )));
        }
        Ok(())
    }
}
