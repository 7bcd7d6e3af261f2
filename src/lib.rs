//! Thermophysical model of irregularly shaped asteroids and binary pairs.
//!
//! A body is a triangulated [`geom::ShapeMesh`] whose facets each carry a
//! one-dimensional conduction column. Every timestep [`simulation::Simulation`]
//! illuminates the facets, removes light blocked by the body itself or by a
//! companion, adds single scattering and single re-absorption between visible
//! facets, accumulates the photon-pressure force and torque and the energy
//! balance, and finally advances the temperatures.

pub mod conduction;
pub mod config;
pub mod eclipse;
pub mod energy;
pub mod error;
pub mod flux;
pub mod force;
pub mod geom;
pub mod kinematics;
pub mod output;
pub mod params;
pub mod raycast;
pub mod settings;
pub mod simulation;
pub mod timestamps;
pub mod visibility;
