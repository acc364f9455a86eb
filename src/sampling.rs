//! Incident directions for a focused beam.
//!
//! A focused beam is approximated as a weighted sum of plane waves whose
//! directions fill the annular cone of the condenser. Directions are first
//! drawn around the default axis `-z`, then rotated so that axis lands on the
//! requested centre direction.

use crate::error::{require_positive, Result};
use crate::scene::ApertureSpec;
use nalgebra::{Unit, UnitQuaternion, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

/// One plane wave of a sampled beam.
#[derive(Clone, Debug, PartialEq)]
pub struct BeamSample {
    /// Unit propagation direction.
    pub direction: Vector3<f64>,
    /// Amplitude factor applied to this wave's contribution.
    pub weight: f64,
}

/// A strategy for covering the condenser aperture with plane waves.
pub trait DirectionSampler {
    /// Directions around `center` with their weights.
    fn sample(&mut self, center: &Vector3<f64>) -> Result<Vec<BeamSample>>;
}

/// The axis every sampler draws around before rotation.
pub fn default_axis() -> Vector3<f64> {
    Vector3::new(0.0, 0.0, -1.0)
}

/// Rotation taking the default axis onto `center`.
///
/// This is the minimal rotation between the two axes. An angle of
/// `arcsin(center_z)` about their cross product only lands on `center` when
/// the beam is untilted, so it is not used here.
///
/// `center` parallel to the default axis gives the identity; antiparallel gives
/// a half turn about `x`.
pub fn beam_rotation(center: &Vector3<f64>) -> Result<UnitQuaternion<f64>> {
    let norm = require_positive("beam direction length", center.norm())?;
    let target = center / norm;
    let axis = default_axis();
    if target == axis {
        return Ok(UnitQuaternion::identity());
    }
    Ok(UnitQuaternion::rotation_between(&axis, &target).unwrap_or_else(|| {
        UnitQuaternion::from_axis_angle(&Unit::new_normalize(Vector3::x()), PI)
    }))
}

/// A plain plane wave: the centre direction alone, with unit weight.
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleDirection;

impl DirectionSampler for SingleDirection {
    fn sample(&mut self, center: &Vector3<f64>) -> Result<Vec<BeamSample>> {
        let norm = require_positive("beam direction length", center.norm())?;
        Ok(vec![BeamSample {
            direction: center / norm,
            weight: 1.0,
        }])
    }
}

/// Uniform random directions over the annulus.
///
/// `cosθ` is drawn uniformly, so samples are uniform in solid angle, and each
/// sample carries `solid_angle / samples`.
#[derive(Clone, Debug)]
pub struct MonteCarlo {
    aperture: ApertureSpec,
    samples: usize,
    rng: StdRng,
}

impl MonteCarlo {
    pub fn new(aperture: ApertureSpec, samples: usize, seed: u64) -> Self {
        MonteCarlo {
            aperture,
            samples,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl DirectionSampler for MonteCarlo {
    fn sample(&mut self, center: &Vector3<f64>) -> Result<Vec<BeamSample>> {
        let rotation = beam_rotation(center)?;
        // along -z, the inner radius of the annulus is the more negative z
        let z_low = -self.aperture.inner_angle().cos();
        let z_high = -self.aperture.outer_angle().cos();
        let weight = self.aperture.solid_angle() / self.samples as f64;

        let mut out = Vec::with_capacity(self.samples);
        for _ in 0..self.samples {
            let azimuth = self.rng.gen::<f64>() * 2.0 * PI;
            let z = z_low + self.rng.gen::<f64>() * (z_high - z_low);
            out.push(BeamSample {
                direction: rotation * on_sphere(z, azimuth),
                weight,
            });
        }
        log::debug!("drew {} Monte Carlo beam directions", out.len());
        Ok(out)
    }
}

/// Midpoint grid in polar and azimuthal angle over the annulus, each sample
/// weighted by its patch of solid angle `sinθ Δθ Δφ`.
#[derive(Clone, Copy, Debug)]
pub struct UniformGrid {
    aperture: ApertureSpec,
    polar_steps: usize,
    azimuth_steps: usize,
}

impl UniformGrid {
    pub fn new(aperture: ApertureSpec, polar_steps: usize, azimuth_steps: usize) -> Self {
        UniformGrid {
            aperture,
            polar_steps,
            azimuth_steps,
        }
    }
}

impl DirectionSampler for UniformGrid {
    fn sample(&mut self, center: &Vector3<f64>) -> Result<Vec<BeamSample>> {
        let rotation = beam_rotation(center)?;
        let inner = self.aperture.inner_angle();
        let d_polar = (self.aperture.outer_angle() - inner) / self.polar_steps as f64;
        let d_azimuth = 2.0 * PI / self.azimuth_steps as f64;

        let mut out = Vec::with_capacity(self.polar_steps * self.azimuth_steps);
        for i in 0..self.polar_steps {
            let polar = inner + (i as f64 + 0.5) * d_polar;
            let weight = polar.sin() * d_polar * d_azimuth;
            for j in 0..self.azimuth_steps {
                let azimuth = (j as f64 + 0.5) * d_azimuth;
                out.push(BeamSample {
                    direction: rotation * on_sphere(-polar.cos(), azimuth),
                    weight,
                });
            }
        }
        Ok(out)
    }
}

fn on_sphere(z: f64, azimuth: f64) -> Vector3<f64> {
    let rho = (1.0 - z * z).max(0.0).sqrt();
    let (sin, cos) = azimuth.sin_cos();
    Vector3::new(rho * cos, rho * sin, z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn annulus() -> ApertureSpec {
        ApertureSpec::new(0.2, 0.6).unwrap()
    }

    #[test]
    fn test_single_direction_normalises() {
        let samples = SingleDirection.sample(&Vector3::new(0.0, 3.0, 4.0)).unwrap();
        assert_eq!(samples.len(), 1);
        assert_relative_eq!(samples[0].direction, Vector3::new(0.0, 0.6, 0.8));
        assert_eq!(samples[0].weight, 1.0);
        assert!(SingleDirection.sample(&Vector3::zeros()).is_err());
    }

    #[test]
    fn test_rotation_maps_default_axis() {
        for center in &[
            Vector3::new(0.0, 0.0, -1.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.3, -0.4, -0.5),
            Vector3::new(0.0, 0.0, 2.0),
        ] {
            let rotated = beam_rotation(center).unwrap() * default_axis();
            assert_relative_eq!(rotated, center.normalize(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_monte_carlo_is_reproducible() {
        let center = Vector3::new(0.0, 0.0, -1.0);
        let a = MonteCarlo::new(annulus(), 50, 7).sample(&center).unwrap();
        let b = MonteCarlo::new(annulus(), 50, 7).sample(&center).unwrap();
        let c = MonteCarlo::new(annulus(), 50, 8).sample(&center).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        let total: f64 = a.iter().map(|s| s.weight).sum();
        assert_relative_eq!(total, annulus().solid_angle(), max_relative = 1e-12);
    }

    #[test]
    fn test_uniform_grid_covers_solid_angle() {
        let samples = UniformGrid::new(annulus(), 200, 8)
            .sample(&default_axis())
            .unwrap();
        assert_eq!(samples.len(), 1600);
        let total: f64 = samples.iter().map(|s| s.weight).sum();
        assert_relative_eq!(total, annulus().solid_angle(), max_relative = 1e-5);
    }

    proptest! {
        #[test]
        fn monte_carlo_stays_in_the_annulus(
            seed in any::<u64>(),
            x in -1.0f64..1.0, y in -1.0f64..1.0, z in -1.0f64..1.0,
        ) {
            let center = Vector3::new(x, y, z);
            prop_assume!(center.norm() > 1e-3);
            let aperture = annulus();
            let samples = MonteCarlo::new(aperture, 20, seed).sample(&center).unwrap();
            let axis = center.normalize();
            for s in &samples {
                prop_assert!((s.direction.norm() - 1.0).abs() < 1e-12);
                let cos = s.direction.dot(&axis);
                prop_assert!(cos <= aperture.inner_angle().cos() + 1e-9);
                prop_assert!(cos >= aperture.outer_angle().cos() - 1e-9);
            }
        }
    }
}
