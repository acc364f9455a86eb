//! Immutable scalar configuration for one simulation run.

use crate::error::{require_positive, MieError, Result};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Which plane through the scene the field is evaluated on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaneOrientation {
    /// Plane of constant z at `plane_position`, light travels through the screen.
    Horizontal,
    /// Plane of constant x at `plane_position`, light travels along the image rows.
    Vertical,
}

/// Every scalar a driver supplies. Derived quantities are methods.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Vacuum wavelength, in the same length unit as everything else.
    pub wavelength: f64,
    /// Sphere radius `a`.
    pub radius: f64,
    /// Complex refractive index of the sphere; the ambient medium has index 1.
    pub refractive_index: Complex<f64>,
    /// Sphere center `p_s`.
    pub sphere_position: [f64; 3],
    /// Phase reference of the incident beam `p_f`.
    pub focal_point: [f64; 3],
    /// Propagation direction of the incident (center) plane wave.
    pub direction: [f64; 3],
    /// Electric field of the incident plane wave.
    pub polarization: [f64; 3],
    /// Inner numerical aperture of the condenser and objective.
    pub na_in: f64,
    /// Outer numerical aperture of the condenser and objective.
    pub na_out: f64,
    /// Detector resolution in pixels along one axis.
    pub resolution: usize,
    /// Detector field of view.
    pub fov: f64,
    /// Padding factor; the simulated grid is `(2 * padding + 1)` times the detector.
    pub padding: usize,
    /// Coordinate of the evaluation plane along its normal.
    pub plane_position: f64,
    pub orientation: PlaneOrientation,
    /// Number of sampled plane waves for a focused beam.
    pub samples: usize,
    /// Seed of the Monte Carlo sampler.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            wavelength: 1.0,
            radius: 1.0,
            refractive_index: Complex::new(1.25, 0.03),
            sphere_position: [0.0, 0.0, 0.0],
            focal_point: [0.0, 0.0, 0.0],
            direction: [0.0, 0.0, -1.0],
            polarization: [1.0, 0.0, 0.0],
            na_in: 0.0,
            na_out: 0.5,
            resolution: 128,
            fov: 16.0,
            padding: 3,
            plane_position: 0.0,
            orientation: PlaneOrientation::Horizontal,
            samples: 1,
            seed: 0,
        }
    }
}

impl SimulationConfig {
    /// Checks every value the later stages divide by or size arrays with.
    pub fn validate(&self) -> Result<()> {
        positive_config("wavelength", self.wavelength)?;
        positive_config("fov", self.fov)?;
        require_positive("sphere radius", self.radius)?;
        if !(self.refractive_index.re.is_finite() && self.refractive_index.im.is_finite()) {
            return Err(MieError::InvalidConfig(format!(
                "refractive index must be finite, got {}",
                self.refractive_index
            )));
        }
        if self.resolution == 0 {
            return Err(MieError::InvalidConfig(
                "resolution must be at least one pixel".to_string(),
            ));
        }
        if self.samples == 0 {
            return Err(MieError::InvalidConfig(
                "at least one beam sample is required".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.na_in)
            || !(0.0..=1.0).contains(&self.na_out)
            || self.na_in > self.na_out
        {
            return Err(MieError::InvalidAperture {
                na_in: self.na_in,
                na_out: self.na_out,
            });
        }
        require_positive("direction length", norm3(self.direction))?;
        require_positive("polarization length", norm3(self.polarization))?;
        Ok(())
    }

    /// Ambient wavenumber `k = 2π/λ`.
    pub fn wavenumber(&self) -> f64 {
        2.0 * PI / self.wavelength
    }

    /// Simulated grid length, `res * (2 * padding + 1)`.
    pub fn sim_res(&self) -> usize {
        self.resolution * (2 * self.padding + 1)
    }

    /// Simulated field of view, `fov * (2 * padding + 1)`.
    pub fn sim_fov(&self) -> f64 {
        self.fov * (2 * self.padding + 1) as f64
    }

    /// Half the side length of the simulated grid, rounded up.
    pub fn halfgrid(&self) -> f64 {
        (self.sim_fov() / 2.0).ceil()
    }

    /// First row and column of the detector window inside the simulated grid.
    pub fn crop_start(&self) -> usize {
        self.sim_res() / 2 - self.resolution / 2
    }
}

fn positive_config(what: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(MieError::InvalidConfig(format!(
            "{} must be positive and finite, got {}",
            what, value
        )))
    }
}

pub(crate) fn norm3(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}
