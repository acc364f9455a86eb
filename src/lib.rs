//! Mie scattering from a homogeneous sphere, and the Fourier optics of imaging it.
//!
//! The pipeline runs leaves first:
//!
//! * [`special`]: spherical Bessel and Hankel functions, Legendre polynomials
//! * [`coefficients`]: the Mie series coefficients `A_l`, `B_l`
//! * [`synthesis`]: incident, scattered and internal fields on a plane through the scene
//! * [`imaging`]: bandpass apertures, cropping and angular-spectrum propagation
//! * [`far_field`]: the asymptotic far-field model and its near-field line
//!
//! All entry points take a [`SimulationConfig`] (directly or through a
//! [`SimulationContext`]) and return owned arrays; nothing is cached between runs.

use ndarray::{Array2, Zip};
use num_complex::Complex;

pub mod coefficients;
pub mod config;
pub mod error;
pub mod far_field;
pub mod fft2;
pub mod grid;
pub mod imaging;
pub mod sampling;
pub mod scene;
pub mod special;
pub mod synthesis;

pub use crate::coefficients::{order_limit, MieCoefficients};
pub use crate::config::{PlaneOrientation, SimulationConfig};
pub use crate::error::{MieError, Result};
pub use crate::grid::PositionGrid;
pub use crate::scene::{ApertureSpec, PlaneWave, SphereParameters};
pub use crate::synthesis::{SimulationContext, SynthesizedFields};

/// Represents a field sampled at a given pitch.
///
/// This represents the complex scalar field recorded on a plane, the square of which is the irradiance.
#[derive(Clone, Debug)]
pub struct Field {
    pub values: Array2<Complex<f64>>,
    pub pitch: (f64, f64),
}

impl Field {
    pub fn new(values: Array2<Complex<f64>>, pitch: f64) -> Self {
        Field {
            values,
            pitch: (pitch, pitch),
        }
    }

    /// Calculates the area weighted sum of the squared norm of the field.
    ///
    /// This results in a conserved value, Radiant flux.
    pub fn intensity_integral(&self) -> f64 {
        self.values.iter().fold(0.0, |sum, &v| sum + v.norm_sqr()) * (self.pitch.0 * self.pitch.1)
    }

    pub fn real(&self) -> Array2<f64> {
        self.values.mapv(|v| v.re)
    }

    pub fn imag(&self) -> Array2<f64> {
        self.values.mapv(|v| v.im)
    }

    pub fn magnitude(&self) -> Array2<f64> {
        self.values.mapv(|v| v.norm())
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }
}

/// Represents a spectrum at a given frequency resolution.
///
/// DC value is centered. That is it is at len/2 on each axis.
#[derive(Clone, Debug)]
pub struct Spectrum {
    pub values: Array2<Complex<f64>>,
    pub freq_res: (f64, f64),
}

pub(crate) fn freq_res(array_shape: &[usize], spatial_res: (f64, f64)) -> (f64, f64) {
    (
        1.0 / (spatial_res.0 * array_shape[0] as f64),
        1.0 / (spatial_res.1 * array_shape[1] as f64),
    )
}

/// Visits every element with its centred frequency coordinates `(fy, fx)`.
pub(crate) fn centered_par_iter<A, F>(array: &mut Array2<A>, (dh, dw): (f64, f64), f: F)
where
    A: Send,
    F: Fn((f64, f64), &mut A) + Sync + Send,
{
    let (h, w) = array.dim();
    Zip::indexed(array).par_for_each(|(y, x), e| {
        let y = (y as f64 - (h / 2) as f64) * dh;
        let x = (x as f64 - (w / 2) as f64) * dw;
        f((y, x), e)
    });
}
