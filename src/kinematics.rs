//! Where the sun is, seen from the body, at a given time.
//!
//! The step engine only needs a sun direction and flux per body (plus the
//! relative pose of the two bodies of a binary). Anything that can produce
//! those implements [`Kinematics`] or [`BinaryKinematics`]; the circular
//! orbits here are the reference implementations used by the binary.
//!
//! Frames: the orbital frame has the heliocentric orbit in its xy plane with
//! the body on +x at `t = 0`. A body frame is turned into the orbital frame
//! by `R_x(obliquity) * R_z(spin_phase)`.

use std::f64::consts::TAU;

use nalgebra::{Rotation3, Vector3};

use crate::config::{AU, SOLAR_CONSTANT};
use crate::error::TpmError;


/// Sun geometry of one body at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Epoch {
    /// Unit vector towards the sun in the body frame.
    pub sun_direction: Vector3<f64>,
    /// Solar flux at the body [W m^-2].
    pub solar_flux: f64,
    /// Heliocentric distance [m].
    pub sun_distance: f64,
    /// Body frame to orbital frame.
    pub body_to_orbit: Rotation3<f64>,
    /// Heliocentric orbital angle [rad].
    pub orbital_angle: f64,
    /// Rotation angle about the spin axis [rad].
    pub spin_phase: f64,
}

/// Sun geometry of both bodies of a binary plus their relative pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryEpoch {
    pub primary: Epoch,
    pub secondary: Epoch,
    /// Secondary centre relative to the primary, in the primary frame [m].
    pub sec_from_primary: Vector3<f64>,
    /// Secondary body frame to primary body frame.
    pub rotation_sec_to_pri: Rotation3<f64>,
}

pub trait Kinematics {
    /// Sun geometry `time` seconds after the start epoch.
    fn epoch(&self, time: f64) -> Epoch;
}

pub trait BinaryKinematics {
    fn binary_epoch(&self, time: f64) -> BinaryEpoch;
}

/// A body held still under a constant sun.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedSun {
    /// Direction towards the sun in the body frame.
    pub sun_direction: Vector3<f64>,
    /// Solar flux [W m^-2].
    pub solar_flux: f64,
}

impl Kinematics for FixedSun {
    fn epoch(&self, _time: f64) -> Epoch {
        Epoch {
            sun_direction: self.sun_direction.normalize(),
            solar_flux: self.solar_flux,
            sun_distance: AU * (SOLAR_CONSTANT / self.solar_flux).sqrt(),
            body_to_orbit: Rotation3::identity(),
            orbital_angle: 0.0,
            spin_phase: 0.0,
        }
    }
}

/// Circular heliocentric orbit with uniform rotation about a fixed axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularOrbit {
    /// Heliocentric distance [au].
    pub distance_au: f64,
    /// Orbital period [s]. Zero holds the body at its starting point.
    pub orbital_period: f64,
    /// Sidereal rotation period [s].
    pub spin_period: f64,
    /// Angle between spin axis and orbit normal [rad].
    pub obliquity: f64,
    /// Spin phase at `t = 0` [rad].
    pub initial_spin_phase: f64,
}

impl CircularOrbit {
    pub fn new(
        distance_au: f64,
        orbital_period: f64,
        spin_period: f64,
        obliquity: f64,
        initial_spin_phase: f64,
    ) -> Result<Self, TpmError> {
        if !(distance_au > 0.0 && distance_au.is_finite()) {
            return Err(TpmError::InvalidParameters(format!(
                "heliocentric distance must be positive, got {} au",
                distance_au
            )));
        }
        if !(orbital_period >= 0.0 && orbital_period.is_finite()) {
            return Err(TpmError::InvalidParameters(format!(
                "orbital period must be non-negative, got {} s",
                orbital_period
            )));
        }
        if !(spin_period > 0.0 && spin_period.is_finite()) {
            return Err(TpmError::InvalidParameters(format!(
                "spin period must be positive, got {} s",
                spin_period
            )));
        }
        Ok(Self {
            distance_au,
            orbital_period,
            spin_period,
            obliquity,
            initial_spin_phase,
        })
    }

    pub fn orbital_angle(&self, time: f64) -> f64 {
        if self.orbital_period > 0.0 {
            (TAU * time / self.orbital_period).rem_euclid(TAU)
        } else {
            0.0
        }
    }

    pub fn spin_phase(&self, time: f64) -> f64 {
        (self.initial_spin_phase + TAU * time / self.spin_period).rem_euclid(TAU)
    }

    /// Direction from the body to the sun in the orbital frame.
    fn sun_in_orbit_frame(&self, orbital_angle: f64) -> Vector3<f64> {
        -Vector3::new(orbital_angle.cos(), orbital_angle.sin(), 0.0)
    }

    fn solar_flux(&self) -> f64 {
        SOLAR_CONSTANT / self.distance_au.powi(2)
    }

    /// Equatorial frame to orbital frame.
    fn tilt(&self) -> Rotation3<f64> {
        Rotation3::from_axis_angle(&Vector3::x_axis(), self.obliquity)
    }

    fn epoch_with_attitude(&self, time: f64, equatorial: Rotation3<f64>, spin_phase: f64) -> Epoch {
        let orbital_angle = self.orbital_angle(time);
        let body_to_orbit = self.tilt() * equatorial;
        Epoch {
            sun_direction: body_to_orbit.inverse() * self.sun_in_orbit_frame(orbital_angle),
            solar_flux: self.solar_flux(),
            sun_distance: self.distance_au * AU,
            body_to_orbit,
            orbital_angle,
            spin_phase,
        }
    }
}

impl Kinematics for CircularOrbit {
    fn epoch(&self, time: f64) -> Epoch {
        let spin = self.spin_phase(time);
        self.epoch_with_attitude(time, Rotation3::from_axis_angle(&Vector3::z_axis(), spin), spin)
    }
}

/// A tidally locked secondary on a circular orbit in the primary's
/// equatorial plane. The pair's centre follows `heliocentric`, which also
/// sets the primary's spin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MutualOrbit {
    pub heliocentric: CircularOrbit,
    /// Distance between the two centres [m].
    pub separation: f64,
    /// Mutual orbital period [s].
    pub mutual_period: f64,
    /// Mutual orbital phase at `t = 0` [rad].
    pub initial_phase: f64,
}

impl MutualOrbit {
    pub fn new(
        heliocentric: CircularOrbit,
        separation: f64,
        mutual_period: f64,
        initial_phase: f64,
    ) -> Result<Self, TpmError> {
        if !(separation > 0.0 && separation.is_finite()) {
            return Err(TpmError::InvalidParameters(format!(
                "binary separation must be positive, got {} m",
                separation
            )));
        }
        if !(mutual_period > 0.0 && mutual_period.is_finite()) {
            return Err(TpmError::InvalidParameters(format!(
                "mutual period must be positive, got {} s",
                mutual_period
            )));
        }
        Ok(Self {
            heliocentric,
            separation,
            mutual_period,
            initial_phase,
        })
    }

    pub fn mutual_phase(&self, time: f64) -> f64 {
        (self.initial_phase + TAU * time / self.mutual_period).rem_euclid(TAU)
    }
}

impl Kinematics for MutualOrbit {
    /// The primary's view.
    fn epoch(&self, time: f64) -> Epoch {
        self.heliocentric.epoch(time)
    }
}

impl BinaryKinematics for MutualOrbit {
    fn binary_epoch(&self, time: f64) -> BinaryEpoch {
        let primary = self.heliocentric.epoch(time);
        let psi = self.mutual_phase(time);

        let primary_spin = Rotation3::from_axis_angle(&Vector3::z_axis(), primary.spin_phase);
        // locked: the secondary's -x axis always points at the primary
        let secondary_spin = Rotation3::from_axis_angle(&Vector3::z_axis(), psi);
        let secondary = self.heliocentric.epoch_with_attitude(time, secondary_spin, psi);

        let offset = self.separation * Vector3::new(psi.cos(), psi.sin(), 0.0);
        BinaryEpoch {
            primary,
            secondary,
            sec_from_primary: primary_spin.inverse() * offset,
            rotation_sec_to_pri: primary_spin.inverse() * secondary_spin,
        }
    }
}
