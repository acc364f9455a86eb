//! What a finite-aperture imaging system records of a simulated field.
//!
//! Masks are built in the uncentred FFT layout, the same as a plain
//! [`fft2`](crate::fft2::fft2) output.

use crate::error::{MieError, Result};
use crate::fft2::{fft2_shift_inplace, fft2c, fftfreq, ifft2c};
use crate::scene::ApertureSpec;
use crate::{centered_par_iter, freq_res, Field, Spectrum};
use ndarray::{s, Array2, ArrayView2, Zip};
use num_complex::Complex;
use std::f64::consts::PI;

/// Annular pass-band over the wrap-around frequency indices of an `sim_res` grid.
///
/// Index `i <= N/2` maps to frequency `i·df`, index `i > N/2` to `(i - N + 1)·df`,
/// with `df = 1 / (2·halfgrid)`. Frequencies outside `[NA_in/λ, NA_out/λ]` are zeroed.
pub fn bandpass_filter(
    halfgrid: f64,
    sim_res: usize,
    aperture: &ApertureSpec,
    wavelength: f64,
) -> Array2<f64> {
    let df = 1.0 / (halfgrid * 2.0);
    let wrapped = |i: usize| {
        if i as f64 <= sim_res as f64 / 2.0 {
            i as f64 * df
        } else {
            (i as f64 - sim_res as f64 + 1.0) * df
        }
    };
    Array2::from_shape_fn((sim_res, sim_res), |(i, j)| {
        let (u, v) = (wrapped(i), wrapped(j));
        if aperture.passes((u * u + v * v).sqrt(), wavelength) {
            1.0
        } else {
            0.0
        }
    })
}

/// Annular pass-band on the `fftfreq` grid with sample spacing `sim_fov / sim_res`,
/// inclusive at both radii.
pub fn annular_filter(
    sim_fov: f64,
    sim_res: usize,
    aperture: &ApertureSpec,
    wavelength: f64,
) -> Array2<f64> {
    let f = fftfreq(sim_res, sim_fov / sim_res as f64);
    Array2::from_shape_fn((sim_res, sim_res), |(i, j)| {
        if aperture.passes(f[i].hypot(f[j]), wavelength) {
            1.0
        } else {
            0.0
        }
    })
}

/// A detector image and the filtered spectrum it was formed from.
#[derive(Clone, Debug)]
pub struct DetectorImage {
    pub image: Field,
    pub spectrum: Spectrum,
}

/// Filters a centred spatial field through `mask` and crops the detector window.
///
/// The mask is recentred to line up with the centred spectrum of the field,
/// and the `crop_size` window starting at `crop_start` is cut out of the
/// filtered field.
pub fn apply_aperture(
    field: &Field,
    mask: &Array2<f64>,
    crop_start: usize,
    crop_size: usize,
) -> Result<DetectorImage> {
    check_shape(mask.shape(), field.values.shape())?;

    let mut centred_mask = mask.clone();
    fft2_shift_inplace(centred_mask.view_mut());
    let mut spectrum = fft2c(field.values.clone());
    Zip::from(&mut spectrum)
        .and(&centred_mask)
        .par_for_each(|e, &m| *e = *e * m);

    let filtered = ifft2c(spectrum.clone());
    let image = crop_center(filtered.view(), crop_start, crop_size)?;

    Ok(DetectorImage {
        image: Field {
            values: image,
            pitch: field.pitch,
        },
        spectrum: Spectrum {
            freq_res: freq_res(field.values.shape(), field.pitch),
            values: spectrum,
        },
    })
}

/// Copies the `size × size` window whose top-left corner is `(start, start)`.
pub fn crop_center<A: Clone>(values: ArrayView2<A>, start: usize, size: usize) -> Result<Array2<A>> {
    let (h, w) = values.dim();
    if start + size > h || start + size > w {
        return Err(MieError::InvalidConfig(format!(
            "crop window {}..{} does not fit a {}x{} grid",
            start,
            start + size,
            h,
            w
        )));
    }
    Ok(values
        .slice(s![start..start + size, start..start + size])
        .to_owned())
}

/// Axial wavenumber on the centred frequency grid of a field with `shape` and `pitch`.
///
/// `kz = 2π sqrt(1/λ² - fx² - fy²)` where that is real, and `0` for the
/// evanescent frequencies.
pub fn kz_grid(shape: (usize, usize), pitch: (f64, f64), wavelength: f64) -> Array2<f64> {
    let mut kz = Array2::zeros(shape);
    let inv_lambda_sq = 1.0 / (wavelength * wavelength);
    centered_par_iter(&mut kz, freq_res(&[shape.0, shape.1], pitch), |(fy, fx), e| {
        let kz_sq = inv_lambda_sq - fy * fy - fx * fx;
        *e = if kz_sq > 0.0 {
            2.0 * PI * kz_sq.sqrt()
        } else {
            0.0
        };
    });
    kz
}

/// Angular-spectrum propagation of `field` by `distance` along the optical axis.
///
/// The centred spectrum lines up with `kz` (from [`kz_grid`]) and is
/// multiplied by `exp(i kz d)` before transforming back.
pub fn propagate(field: &Field, kz: &Array2<f64>, distance: f64) -> Result<Field> {
    check_shape(kz.shape(), field.values.shape())?;

    let mut spectrum = fft2c(field.values.clone());
    Zip::from(&mut spectrum).and(kz).par_for_each(|e, &kz| {
        *e = *e * Complex::new(0.0, kz * distance).exp();
    });

    Ok(Field {
        values: ifft2c(spectrum),
        pitch: field.pitch,
    })
}

fn check_shape(found: &[usize], expected: &[usize]) -> Result<()> {
    if found != expected {
        return Err(MieError::ShapeMismatch {
            expected: expected.to_vec(),
            found: found.to_vec(),
        });
    }
    Ok(())
}
