//! Radiative energy bookkeeping for one body.
//!
//! The balance compares the power the surface absorbs from sunlight (direct
//! and scattered) with the net power it radiates away. Their ratio,
//! `E_out / E_in`, settles at 1 once the body is in thermal equilibrium over a
//! rotation and is the main convergence diagnostic of a run.

use std::fmt;
use std::ops::Add;

use crate::config::{E_IN_EPSILON, STEFAN_BOLTZMANN};
use crate::error::TpmError;
use crate::geom::ShapeMesh;
use crate::params::{PerFacet, ThermoParams};


/// Whole-body power balance at one instant [W].
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct EnergyBalance {
    /// Absorbed direct and scattered sunlight.
    pub e_in: f64,
    /// Thermal emission less the re-absorbed infrared.
    pub e_out: f64,
}

impl Add for EnergyBalance {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            e_in: self.e_in + other.e_in,
            e_out: self.e_out + other.e_out,
        }
    }
}

impl EnergyBalance {
    /// `E_out / E_in`, or an error when almost no power comes in.
    pub fn conservation_ratio(&self) -> Result<f64, TpmError> {
        if self.e_in.abs() < E_IN_EPSILON {
            return Err(TpmError::UndefinedConservationRatio { e_in: self.e_in });
        }
        Ok(self.e_out / self.e_in)
    }
}

impl fmt::Display for EnergyBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Energy:")?;
        writeln!(f, "  E_in:   {:.6e} W", self.e_in)?;
        writeln!(f, "  E_out:  {:.6e} W", self.e_out)?;
        match self.conservation_ratio() {
            Ok(ratio) => writeln!(f, "  E_cons: {:.6}", ratio),
            Err(_) => writeln!(f, "  E_cons: undefined"),
        }
    }
}

/// Absorbed and emitted power summed over all facets.
pub fn energy_io(mesh: &ShapeMesh, params: &ThermoParams) -> EnergyBalance {
    mesh.facets
        .iter()
        .enumerate()
        .map(|(i, facet)| {
            let t = facet.surface_temperature();
            EnergyBalance {
                e_in: (1.0 - params.bond_albedo.at(i)) * (facet.flux.sun + facet.flux.scat) * facet.area,
                e_out: (params.emissivity.at(i) * STEFAN_BOLTZMANN * t.powi(4)
                    - (1.0 - params.thermal_albedo.at(i)) * facet.flux.rad)
                    * facet.area,
            }
        })
        .fold(EnergyBalance::default(), Add::add)
}
