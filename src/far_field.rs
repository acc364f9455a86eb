//! The far-field scattering model and its conversion back to a near field.
//!
//! The scattered wave is summed with the large-argument Hankel form on a plane
//! a long working distance away, with the Legendre factor evaluated on the
//! direction cosines of the frequency grid, so the sum already lives in the
//! Fourier domain. One inverse transform then gives the near-field image. This
//! is only valid while `k·r ≫ l²` over the whole plane.

use crate::coefficients::MieCoefficients;
use crate::config::{PlaneOrientation, SimulationConfig};
use crate::error::{MieError, Result};
use crate::fft2::{fft2_shift_inplace, fftfreq, ifft2, ifft2_shift_inplace};
use crate::grid::PositionGrid;
use crate::imaging::{annular_filter, apply_aperture, DetectorImage};
use crate::scene::{ApertureSpec, PlaneWave, SphereParameters};
use crate::special::{fill_legendre, hankel_asymptotic};
use crate::{Field, Spectrum};
use nalgebra::Vector3;
use ndarray::parallel::prelude::{IntoParallelIterator, ParallelIterator};
use ndarray::{s, Array1, Array2, Zip};
use num_complex::Complex;
use rustfft::num_traits::Zero;
use std::f64::consts::PI;

/// Distance of the far-field plane and the amplitude scale of its spectrum.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FarFieldParameters {
    pub working_distance: f64,
    pub scale_factor: f64,
}

impl FarFieldParameters {
    /// `10000·(2p + 1)` wavelengths of working distance, and the matching
    /// `working_distance · 2π · res / fov` intensity scale.
    pub fn from_config(config: &SimulationConfig) -> Self {
        let working_distance = 10000.0 * (2 * config.padding + 1) as f64;
        FarFieldParameters {
            working_distance,
            scale_factor: working_distance * 2.0 * PI * config.resolution as f64 / config.fov,
        }
    }
}

/// Output of [`far_field_scatter`].
#[derive(Clone, Debug)]
pub struct FarFieldSimulation {
    /// Scattered near field plus the incident wave on the `z = 0` plane.
    pub total: Field,
    /// Scattered near field, centred.
    pub scattered: Field,
    /// The far-field sum, centred, as a spectrum.
    pub spectrum: Spectrum,
}

/// Far-field scattering of the configured sphere, converted to the near field.
pub fn far_field_scatter(
    config: &SimulationConfig,
    params: &FarFieldParameters,
) -> Result<FarFieldSimulation> {
    config.validate()?;
    let sphere = SphereParameters::from_config(config)?;
    let weights = MieCoefficients::for_sphere(&sphere)?.scattered_weights();
    let orders = weights.len();
    let k = sphere.wavenumber;

    let sim_res = config.sim_res();
    let sim_fov = config.sim_fov();
    let far_plane = PositionGrid::new(
        sim_res,
        config.halfgrid(),
        PlaneOrientation::Horizontal,
        params.working_distance,
        &sphere.center,
    );
    // the plane may pass through the sphere centre, so every pixel is checked
    if let Some(&bad) = far_plane
        .distance
        .iter()
        .find(|&&r| !(r.is_finite() && r > 0.0))
    {
        return Err(MieError::geometry("far-field distance", bad));
    }
    log::debug!(
        "far-field plane at z = {} over {} orders, scale {:.4e}",
        params.working_distance,
        orders,
        params.scale_factor
    );

    let freq = fftfreq(sim_res, sim_fov / sim_res as f64);
    let scale = params.scale_factor;
    let mut far_field = Array2::zeros([sim_res, sim_res]);
    Zip::indexed(&mut far_field)
        .and(&far_plane.distance)
        .into_par_iter()
        .for_each_init(
            || vec![0.0; orders],
            |legendre, ((i, j), e, &r)| {
                let sin_sq = freq[i] * freq[i] + freq[j] * freq[j];
                // beyond the unit circle there is no propagating direction
                if sin_sq > 1.0 {
                    return;
                }
                fill_legendre(legendre, (1.0 - sin_sq).sqrt());
                let sum = weights
                    .iter()
                    .zip(legendre.iter())
                    .enumerate()
                    .fold(Complex::<f64>::zero(), |sum, (l, (&w, &p))| {
                        sum + hankel_asymptotic(l, k * r) * p * w
                    });
                *e = sum * scale;
            },
        );

    let scattered = to_near_field(far_field.clone());

    let mut spectrum = far_field;
    fft2_shift_inplace(spectrum.view_mut());

    let focal_plane = PositionGrid::new(
        sim_res,
        config.halfgrid(),
        PlaneOrientation::Horizontal,
        0.0,
        &sphere.center,
    );
    let wave = PlaneWave::from_config(config)?;
    let incident = wave
        .phase(&focal_plane, k, &Vector3::from(config.focal_point))
        .mapv(|p| p * wave.field()[0]);
    let total = &scattered + &incident;

    log::info!(
        "far-field model on a {}x{} grid, working distance {}",
        sim_res,
        sim_res,
        params.working_distance
    );

    let pitch = far_plane.pitch;
    Ok(FarFieldSimulation {
        total: Field::new(total, pitch),
        scattered: Field::new(scattered, pitch),
        spectrum: Spectrum {
            values: spectrum,
            freq_res: (1.0 / sim_fov, 1.0 / sim_fov),
        },
    })
}

/// Inverse transform of an uncentred far-field sum, recentred, with the plain
/// `1/N` inverse normalisation.
fn to_near_field(far_field: Array2<Complex<f64>>) -> Array2<Complex<f64>> {
    let norm = 1.0 / (far_field.len() as f64).sqrt();
    let mut near = ifft2(far_field);
    fft2_shift_inplace(near.view_mut());
    near.mapv_inplace(|v| v * norm);
    near
}

/// Matching radial profiles through the centre, from the centre outward.
#[derive(Clone, Debug)]
pub struct RadialLines {
    pub near: Array1<Complex<f64>>,
    pub far: Array1<Complex<f64>>,
}

/// Recovers the near field from a centred far-field spectrum and extracts the
/// `N/2` samples from the centre pixel along its row.
pub fn near_field_line(spectrum: &Spectrum) -> RadialLines {
    let n = spectrum.values.nrows();
    let center = n / 2;
    let length = n / 2;

    let mut uncentred = spectrum.values.clone();
    ifft2_shift_inplace(uncentred.view_mut());
    let near = to_near_field(uncentred);

    let line = s![center, center..(center + length).min(n)];
    RadialLines {
        near: near.slice(line).to_owned(),
        far: spectrum.values.slice(line).to_owned(),
    }
}

/// The detector image of a simulated total field: annular bandpass, then the
/// centred `resolution`-sized crop.
pub fn image_at_detector(config: &SimulationConfig, total: &Field) -> Result<DetectorImage> {
    let aperture = ApertureSpec::from_config(config)?;
    let mask = annular_filter(
        config.sim_fov(),
        config.sim_res(),
        &aperture,
        config.wavelength,
    );
    apply_aperture(total, &mask, config.crop_start(), config.resolution)
}
