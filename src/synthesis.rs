//! Incident, scattered and internal fields on the evaluation plane.
//!
//! The recorded scalar is the x component of the electric field. For each
//! sampled beam direction `k̂_j`, with `r` measured from the sphere centre and
//! `cosθ = r̂·k̂_j`,
//!
//! ```text
//! E_s = Σ_l (2l+1) i^l B_l h_l(kr)  P_l(cosθ)    r >= a
//! E_i = Σ_l A_l            j_l(knr) P_l(cosθ)    r <  a
//! ```
//!
//! both carrying the phase `exp(i k k̂_j·(p_s - p_f))` of the sphere centre
//! relative to the focal point. Inside the sphere the total field is set to
//! zero rather than to the internal field.

use crate::coefficients::MieCoefficients;
use crate::config::SimulationConfig;
use crate::error::Result;
use crate::grid::PositionGrid;
use crate::sampling::{BeamSample, DirectionSampler, MonteCarlo, SingleDirection};
use crate::scene::{ApertureSpec, PlaneWave, SphereParameters};
use crate::special::{fill_bessel_j, fill_hankel_h, fill_legendre, imaginary_power};
use crate::Field;
use nalgebra::Vector3;
use ndarray::parallel::prelude::{IntoParallelIterator, ParallelIterator};
use ndarray::{Array2, Axis, Zip};
use num_complex::Complex;
use rustfft::num_traits::Zero;
use std::f64::consts::PI;
use unchecked_index::get_unchecked;

/// Orders summed for the analytic focused field.
pub const FOCUSED_FIELD_ORDERS: usize = 100;

/// Everything derived from a configuration before any field is evaluated.
#[derive(Clone, Debug)]
pub struct SimulationContext {
    pub config: SimulationConfig,
    pub grid: PositionGrid,
    pub sphere: SphereParameters,
    pub aperture: ApertureSpec,
    pub coefficients: MieCoefficients,
    pub wave: PlaneWave,
    pub focal_point: Vector3<f64>,
}

impl SimulationContext {
    /// Validates `config` and builds the grid, sphere and coefficients it describes.
    pub fn new(config: &SimulationConfig) -> Result<Self> {
        config.validate()?;
        let sphere = SphereParameters::from_config(config)?;
        let coefficients = MieCoefficients::for_sphere(&sphere)?;
        let grid = PositionGrid::from_config(config);
        log::debug!(
            "simulation grid {}x{} at pitch {:.4}, {} Mie orders",
            grid.len(),
            grid.len(),
            grid.pitch,
            coefficients.l_max + 1
        );
        Ok(SimulationContext {
            grid,
            aperture: ApertureSpec::from_config(config)?,
            wave: PlaneWave::from_config(config)?,
            focal_point: Vector3::from(config.focal_point),
            coefficients,
            sphere,
            config: config.clone(),
        })
    }

    /// A single plane wave for one sample, Monte Carlo over the aperture otherwise.
    pub fn default_sampler(&self) -> Box<dyn DirectionSampler> {
        if self.config.samples == 1 {
            Box::new(SingleDirection)
        } else {
            Box::new(MonteCarlo::new(
                self.aperture,
                self.config.samples,
                self.config.seed,
            ))
        }
    }

    fn field(&self, values: Array2<Complex<f64>>) -> Field {
        Field::new(values, self.grid.pitch)
    }
}

/// The fields of one run, all on the context's grid.
#[derive(Clone, Debug)]
pub struct SynthesizedFields {
    /// Incident plus scattered outside the sphere, zero inside.
    pub total: Field,
    pub scattered: Field,
    pub internal: Field,
    pub incident: Field,
    /// `true` where the pixel lies strictly inside the sphere.
    pub inside: Array2<bool>,
}

/// Per-beam constants, resolved once before the pixel pass.
struct Beam {
    direction: Vector3<f64>,
    /// Weight, x amplitude and the sphere-centre phase, combined.
    amplitude: Complex<f64>,
    /// Weight and x amplitude of the incident wave.
    incident_amplitude: f64,
}

/// Evaluates every field for the beams drawn by `sampler`.
pub fn synthesize(
    ctx: &SimulationContext,
    sampler: &mut dyn DirectionSampler,
) -> Result<SynthesizedFields> {
    let samples = sampler.sample(ctx.wave.direction())?;
    let k = ctx.sphere.wavenumber;
    let n = ctx.sphere.refractive_index;
    let radius = ctx.sphere.radius;
    let center_offset = ctx.sphere.center - ctx.focal_point;

    let beams = samples
        .iter()
        .map(|BeamSample { direction, weight }| {
            let wave = ctx.wave.redirected(*direction)?;
            let e_x = wave.field()[0] * weight;
            let phase = Complex::new(0.0, k * wave.direction().dot(&center_offset)).exp();
            Ok(Beam {
                direction: *wave.direction(),
                amplitude: phase * e_x,
                incident_amplitude: e_x,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    log::debug!("synthesizing {} beam(s)", beams.len());

    let scattered_weights = ctx.coefficients.scattered_weights();
    let internal_weights = &ctx.coefficients.a;
    let orders = scattered_weights.len();
    let focal = ctx.focal_point;

    let size = ctx.grid.len();
    let mut scattered = Array2::zeros([size, size]);
    let mut internal = Array2::zeros([size, size]);
    let mut incident = Array2::zeros([size, size]);

    Zip::from(&mut scattered)
        .and(&mut internal)
        .and(&mut incident)
        .and(ctx.grid.relative.lanes(Axis(2)))
        .and(ctx.grid.positions.lanes(Axis(2)))
        .and(&ctx.grid.distance)
        .into_par_iter()
        .for_each_init(
            || (vec![Complex::zero(); orders], vec![0.0; orders]),
            |(radial, legendre), (es, ei, einc, rel, pos, &r)| {
                let outside = r >= radius;
                if outside {
                    fill_hankel_h(radial, k * r);
                } else {
                    fill_bessel_j(radial, n * (k * r));
                }
                let weights = if outside {
                    &scattered_weights
                } else {
                    internal_weights
                };
                let rel = Vector3::new(rel[0], rel[1], rel[2]);
                let from_focus = Vector3::new(pos[0], pos[1], pos[2]) - focal;

                let mut sum: Complex<f64> = Complex::zero();
                let mut inc: Complex<f64> = Complex::zero();
                for beam in &beams {
                    // the centre pixel has no direction; only l = 0 survives there
                    let cos_theta = if r > 0.0 {
                        rel.dot(&beam.direction) / r
                    } else {
                        1.0
                    };
                    fill_legendre(legendre, cos_theta);
                    let mut series: Complex<f64> = Complex::zero();
                    for l in 0..orders {
                        unsafe {
                            series = series
                                + *get_unchecked(radial.as_slice(), l)
                                    * *get_unchecked(legendre.as_slice(), l)
                                    * *get_unchecked(weights.as_slice(), l);
                        }
                    }
                    sum = sum + series * beam.amplitude;
                    inc = inc
                        + Complex::new(0.0, k * beam.direction.dot(&from_focus)).exp()
                            * beam.incident_amplitude;
                }
                if outside {
                    *es = sum;
                } else {
                    *ei = sum;
                }
                *einc = inc;
            },
        );

    let inside = ctx.grid.inside(radius);
    let mut total = Array2::zeros([size, size]);
    Zip::from(&mut total)
        .and(&scattered)
        .and(&incident)
        .and(&inside)
        .par_for_each(|t, &es, &inc, &inside| {
            if !inside {
                *t = es + inc;
            }
        });

    log::info!(
        "synthesized {}x{} field from {} beam(s), {} of {} pixels inside the sphere",
        size,
        size,
        beams.len(),
        inside.iter().filter(|&&b| b).count(),
        size * size
    );

    Ok(SynthesizedFields {
        total: ctx.field(total),
        scattered: ctx.field(scattered),
        internal: ctx.field(internal),
        incident: ctx.field(incident),
        inside,
    })
}

/// Convenience wrapper: context from `config`, its default sampler, all fields.
pub fn simulate(config: &SimulationConfig) -> Result<SynthesizedFields> {
    let ctx = SimulationContext::new(config)?;
    let mut sampler = ctx.default_sampler();
    synthesize(&ctx, sampler.as_mut())
}

/// The analytic field of the condenser focused at the focal point,
///
/// `E_f = 2π Σ_l i^l j_l(kr) P_l(cosθ) (P_{l+1}(cosα1) - P_{l+1}(cosα2) - P_{l-1}(cosα1) + P_{l-1}(cosα2))`
///
/// with `P_{-1} = P_0`, `r` measured from the focal point and `θ` from the
/// centre beam direction.
pub fn focused_field(ctx: &SimulationContext) -> Field {
    let orders = FOCUSED_FIELD_ORDERS;
    let k = ctx.sphere.wavenumber;
    let direction = *ctx.wave.direction();
    let amplitude = 2.0 * PI * ctx.wave.field()[0];

    let p1 = crate::special::legendre(orders + 1, ctx.aperture.inner_angle().cos());
    let p2 = crate::special::legendre(orders + 1, ctx.aperture.outer_angle().cos());
    let condenser: Vec<Complex<f64>> = (0..=orders)
        .map(|l| {
            let below = l.saturating_sub(1);
            imaginary_power(l) * (p1[l + 1] - p2[l + 1] - p1[below] + p2[below]) * amplitude
        })
        .collect();

    let size = ctx.grid.len();
    let mut values = Array2::zeros([size, size]);
    Zip::from(&mut values)
        .and(ctx.grid.positions.lanes(Axis(2)))
        .into_par_iter()
        .for_each_init(
            || (vec![Complex::zero(); orders + 1], vec![0.0; orders + 1]),
            |(bessel, legendre), (e, pos)| {
                let r = Vector3::new(pos[0], pos[1], pos[2]) - ctx.focal_point;
                let r_mag = r.norm();
                let cos_theta = if r_mag > 0.0 {
                    r.dot(&direction) / r_mag
                } else {
                    1.0
                };
                fill_bessel_j(bessel, Complex::new(k * r_mag, 0.0));
                fill_legendre(legendre, cos_theta);
                *e = bessel
                    .iter()
                    .zip(legendre.iter())
                    .zip(&condenser)
                    .fold(Complex::<f64>::zero(), |sum, ((&j, &p), &c)| sum + j * p * c);
            },
        );

    log::info!("focused field over {} orders on a {}x{} grid", orders + 1, size, size);
    ctx.field(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaneOrientation;
    use crate::sampling::UniformGrid;

    fn small_config() -> SimulationConfig {
        SimulationConfig {
            resolution: 12,
            fov: 6.0,
            padding: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_matched_sphere_is_invisible() {
        let config = SimulationConfig {
            refractive_index: Complex::new(1.0, 0.0),
            ..small_config()
        };
        let fields = simulate(&config).unwrap();
        for ((s, i), (inc, &inside)) in fields
            .scattered
            .values
            .iter()
            .zip(fields.internal.values.iter())
            .zip(fields.incident.values.iter().zip(fields.inside.iter()))
        {
            assert!(s.norm() < 1e-8);
            if inside {
                // the internal expansion reproduces the incident wave
                assert!((i - inc).norm() < 1e-5, "{} vs {}", i, inc);
            } else {
                assert_eq!(*i, Complex::zero());
            }
        }
    }

    #[test]
    fn test_masks_partition_the_plane() {
        let fields = simulate(&small_config()).unwrap();
        let mut inside_count = 0;
        for ((((&inside, t), s), i), inc) in fields
            .inside
            .iter()
            .zip(fields.total.values.iter())
            .zip(fields.scattered.values.iter())
            .zip(fields.internal.values.iter())
            .zip(fields.incident.values.iter())
        {
            if inside {
                inside_count += 1;
                assert_eq!(*t, Complex::zero());
                assert_eq!(*s, Complex::zero());
            } else {
                assert_eq!(*i, Complex::zero());
                assert!((t - (s + inc)).norm() < 1e-14);
            }
            assert!(t.re.is_finite() && t.im.is_finite());
        }
        assert!(inside_count > 0);
    }

    #[test]
    fn test_incident_plane_wave_along_axis() {
        // k̂ = -z on the z = 0 plane with the focus at the origin: unit phase everywhere
        let fields = simulate(&small_config()).unwrap();
        for v in fields.incident.values.iter() {
            assert!((v - Complex::new(1.0, 0.0)).norm() < 1e-12);
        }
    }

    #[test]
    fn test_vertical_plane_phase_runs_down_rows() {
        let config = SimulationConfig {
            orientation: PlaneOrientation::Vertical,
            refractive_index: Complex::new(1.5, 0.0),
            ..small_config()
        };
        let ctx = SimulationContext::new(&config).unwrap();
        let fields = synthesize(&ctx, &mut SingleDirection).unwrap();
        for i in 0..3 {
            let z = ctx.grid.positions[[i, 5, 2]];
            let expected = Complex::new(0.0, -ctx.sphere.wavenumber * z).exp();
            assert!((fields.incident.values[[i, 5]] - expected).norm() < 1e-12);
        }
        assert!(fields.scattered.values.iter().any(|v| v.norm() > 1e-3));
    }

    #[test]
    fn test_sampled_beam_weights_the_aperture() {
        let config = SimulationConfig {
            na_in: 0.0,
            na_out: 0.3,
            resolution: 11,
            ..small_config()
        };
        let ctx = SimulationContext::new(&config).unwrap();
        let mut sampler = UniformGrid::new(ctx.aperture, 4, 6);
        let fields = synthesize(&ctx, &mut sampler).unwrap();
        // the centre pixel is the focus, where every sampled wave has unit phase;
        // tilted waves lose a little of their x amplitude
        let center = ctx.grid.len() / 2;
        assert_eq!(ctx.grid.distance[[center, center]], 0.0);
        let expected = ctx.aperture.solid_angle();
        let at_focus = fields.incident.values[[center, center]];
        assert!(at_focus.im.abs() < 1e-12);
        assert!(at_focus.re < expected);
        assert!(at_focus.re > 0.97 * expected);
    }

    #[test]
    fn test_focused_field_at_focus() {
        // at r = 0 only l = 0 survives: 2π (P_1(cos α1) - P_1(cos α2)) = solid angle
        let config = SimulationConfig {
            resolution: 5,
            fov: 4.0,
            padding: 0,
            ..Default::default()
        };
        let ctx = SimulationContext::new(&config).unwrap();
        let field = focused_field(&ctx);
        let center = field.values[[2, 2]];
        assert!((center.re - ctx.aperture.solid_angle()).abs() < 1e-10);
        assert!(center.im.abs() < 1e-10);
        assert!(field.values.iter().all(|v| v.re.is_finite() && v.im.is_finite()));
    }

    #[test]
    fn test_invalid_config_is_rejected_up_front() {
        let config = SimulationConfig {
            wavelength: -1.0,
            ..small_config()
        };
        assert!(SimulationContext::new(&config).unwrap_err().is_config_error());
    }
}
