//! The physical objects of a run: the sphere, the condenser aperture and the incident plane wave.

use crate::config::SimulationConfig;
use crate::error::{require_positive, MieError, Result};
use crate::grid::PositionGrid;
use nalgebra::Vector3;
use ndarray::{Array2, Array3, Axis, Zip};
use num_complex::Complex;
use std::f64::consts::PI;

// below this a vector is treated as having no length
const ZERO_LENGTH: f64 = 1e-15;

/// A homogeneous sphere in an ambient medium of index 1.
///
/// Absorption enters through `Im(n) > 0`.
#[derive(Clone, Debug, PartialEq)]
pub struct SphereParameters {
    pub radius: f64,
    pub refractive_index: Complex<f64>,
    pub center: Vector3<f64>,
    /// Ambient wavenumber `k = 2π/λ`.
    pub wavenumber: f64,
}

impl SphereParameters {
    pub fn new(
        radius: f64,
        refractive_index: Complex<f64>,
        center: Vector3<f64>,
        wavenumber: f64,
    ) -> Result<Self> {
        require_positive("sphere radius", radius)?;
        require_positive("wavenumber", wavenumber)?;
        Ok(SphereParameters {
            radius,
            refractive_index,
            center,
            wavenumber,
        })
    }

    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        SphereParameters::new(
            config.radius,
            config.refractive_index,
            Vector3::from(config.sphere_position),
            config.wavenumber(),
        )
    }

    /// Size parameter `k·a`.
    pub fn size_parameter(&self) -> f64 {
        self.wavenumber * self.radius
    }
}

/// Annular pass-band of an objective or condenser, `NA_in = 0` being a plain disk.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ApertureSpec {
    pub na_in: f64,
    pub na_out: f64,
}

impl ApertureSpec {
    pub fn new(na_in: f64, na_out: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&na_in) || !(0.0..=1.0).contains(&na_out) || na_in > na_out {
            return Err(MieError::InvalidAperture { na_in, na_out });
        }
        Ok(ApertureSpec { na_in, na_out })
    }

    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        ApertureSpec::new(config.na_in, config.na_out)
    }

    /// Inner half-angle `α1 = asin(NA_in)`.
    pub fn inner_angle(&self) -> f64 {
        self.na_in.asin()
    }

    /// Outer half-angle `α2 = asin(NA_out)`.
    pub fn outer_angle(&self) -> f64 {
        self.na_out.asin()
    }

    /// Solid angle of the annulus, `2π((1 - cos α2) - (1 - cos α1))`.
    pub fn solid_angle(&self) -> f64 {
        2.0 * PI * ((1.0 - self.outer_angle().cos()) - (1.0 - self.inner_angle().cos()))
    }

    /// Whether a spatial frequency of magnitude `freq` lies inside `[NA_in/λ, NA_out/λ]`.
    pub fn passes(&self, freq: f64, wavelength: f64) -> bool {
        freq >= self.na_in / wavelength && freq <= self.na_out / wavelength
    }
}

/// A monochromatic plane wave with `E·k̂ = 0`.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaneWave {
    direction: Vector3<f64>,
    field: Vector3<f64>,
}

impl PlaneWave {
    /// Normalises `k` and forces `E` orthogonal to it.
    ///
    /// A non-orthogonal `E` is projected onto the plane normal to `k̂` and rescaled
    /// to its original magnitude. `E` parallel to `k` has no such projection and is
    /// rejected.
    pub fn new(k: Vector3<f64>, e: Vector3<f64>) -> Result<Self> {
        let k_norm = require_positive("wave direction length", k.norm())?;
        let direction = k / k_norm;

        let magnitude = e.norm();
        if magnitude < ZERO_LENGTH {
            return Ok(PlaneWave {
                direction,
                field: Vector3::zeros(),
            });
        }

        let side = direction.cross(&e);
        let side_norm = side.norm();
        if side_norm < ZERO_LENGTH * magnitude {
            return Err(MieError::geometry(
                "polarization component orthogonal to the direction",
                side_norm,
            ));
        }
        let e_dir = (side / side_norm).cross(&direction);
        Ok(PlaneWave {
            direction,
            field: e_dir.normalize() * magnitude,
        })
    }

    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        PlaneWave::new(
            Vector3::from(config.direction),
            Vector3::from(config.polarization),
        )
    }

    /// Unit propagation direction `k̂`.
    pub fn direction(&self) -> &Vector3<f64> {
        &self.direction
    }

    /// Electric field vector, orthogonal to `k̂`.
    pub fn field(&self) -> &Vector3<f64> {
        &self.field
    }

    /// The same polarisation travelling along another direction, re-orthogonalised.
    pub fn redirected(&self, direction: Vector3<f64>) -> Result<Self> {
        PlaneWave::new(direction, self.field)
    }

    /// Renders `E exp(i k k̂·(r - origin))` on a grid.
    ///
    /// Output shape is `[3, n, n]`, one plane per Cartesian component.
    pub fn evaluate(
        &self,
        grid: &PositionGrid,
        wavenumber: f64,
        origin: &Vector3<f64>,
    ) -> Array3<Complex<f64>> {
        let n = grid.len();
        let mut out = Array3::zeros([3, n, n]);
        let phase = self.phase(grid, wavenumber, origin);
        for (c, mut plane) in out.axis_iter_mut(Axis(0)).enumerate() {
            let amplitude = self.field[c];
            Zip::from(&mut plane)
                .and(&phase)
                .par_for_each(|e, &p| *e = p * amplitude);
        }
        out
    }

    /// The scalar phase factor `exp(i k k̂·(r - origin))` on a grid.
    pub fn phase(
        &self,
        grid: &PositionGrid,
        wavenumber: f64,
        origin: &Vector3<f64>,
    ) -> Array2<Complex<f64>> {
        let k = self.direction * wavenumber;
        let offset = k.dot(origin);
        let mut phase = Array2::zeros([grid.len(), grid.len()]);
        Zip::from(&mut phase)
            .and(grid.positions.lanes(Axis(2)))
            .par_for_each(|e, r| {
                let k_dot_r = k[0] * r[0] + k[1] * r[1] + k[2] * r[2] - offset;
                *e = Complex::new(0.0, k_dot_r).exp();
            });
        phase
    }
}
