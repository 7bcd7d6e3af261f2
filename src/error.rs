//! Error kinds raised by the thermophysical core.
//!
//! Everything here is deterministic: an error means the mesh, the parameter
//! set or the driving geometry is wrong, never that a retry could succeed.

use std::fmt;

use thiserror::Error;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_an_undefined_ratio_lets_the_run_continue() {
        assert!(!TpmError::UndefinedConservationRatio { e_in: 0.0 }.is_fatal());
        assert!(TpmError::SurfaceNotConverged { facet: 3, temperature: f64::NAN }.is_fatal());
        assert!(TpmError::InvalidMesh("empty".into()).is_fatal());
    }
}

/// The step phase in which a failure was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    UpdateIllumination,
    UpdateEclipse,
    UpdateScatterRadiation,
    UpdateForcesEnergy,
    UpdateTemperatures,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::UpdateIllumination => "illumination",
            Phase::UpdateEclipse => "eclipse",
            Phase::UpdateScatterRadiation => "scatter/re-radiation",
            Phase::UpdateForcesEnergy => "forces/energy",
            Phase::UpdateTemperatures => "temperatures",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[non_exhaustive]
pub enum TpmError {
    /// Degenerate geometry or a malformed visibility list. Raised at construction.
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    /// Parameters that do not fit the mesh or the explicit scheme.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// A non-finite temperature or flux. Fatal for the run.
    #[error("numerical divergence at step {step}, facet {facet} during {phase}: value {value}")]
    NumericalDivergence {
        step: usize,
        facet: usize,
        phase: Phase,
        value: f64,
    },

    /// The surface energy balance of a facet did not converge. The driver
    /// reports it as a divergence of the temperature phase.
    #[error("surface energy balance of facet {facet} did not converge (last iterate {temperature} K)")]
    SurfaceNotConverged { facet: usize, temperature: f64 },

    /// Input power is effectively zero, so E_out / E_in has no meaning.
    #[error("conservation ratio undefined: input power {e_in:e} W")]
    UndefinedConservationRatio { e_in: f64 },
}

impl TpmError {
    /// Whether the run has to stop.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TpmError::UndefinedConservationRatio { .. })
    }
}
