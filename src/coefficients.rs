//! Mie scattering coefficients of a homogeneous sphere.
//!
//! `B_l` weights the outgoing Hankel waves outside the sphere, `A_l` the
//! regular Bessel waves inside it. With the incident plane wave expanded as
//! `Σ (2l+1) i^l j_l(kr) P_l(cosθ)` the fields are
//!
//! * scattered: `Σ (2l+1) i^l B_l h_l(kr) P_l(cosθ)`
//! * internal:  `Σ A_l j_l(knr) P_l(cosθ)`, the `(2l+1) i^l` factor already folded into `A_l`.
//!
//! Near a resonance the shared denominator approaches zero. That is not
//! detected; the coefficients simply grow, or become non-finite.

use crate::error::{require_positive, Result};
use crate::scene::SphereParameters;
use crate::special::{
    fill_legendre, imaginary_power, spherical_hn, spherical_hn_derivative, spherical_jn,
    spherical_jn_derivative,
};
use num_complex::Complex;
use num_integer::Integer;
use std::f64::consts::PI;

/// Highest order kept, `ceil(ka + 4 (ka)^(1/3) + 2)`.
///
/// The series is truncated here with no check on the size of the tail.
pub fn order_limit(wavenumber: f64, radius: f64) -> usize {
    let ka = wavenumber * radius;
    (ka + 4.0 * ka.cbrt() + 2.0).ceil() as usize
}

/// Coefficients `A_l`, `B_l` for `l = 0..=l_max`.
#[derive(Clone, Debug)]
pub struct MieCoefficients {
    pub l_max: usize,
    /// Internal field coefficients, including the `(2l+1) i^l` prefactor.
    pub a: Vec<Complex<f64>>,
    /// Scattered field coefficients.
    pub b: Vec<Complex<f64>>,
    wavenumber: f64,
}

impl MieCoefficients {
    /// Evaluates both coefficient series up to `l_max`.
    pub fn new(sphere: &SphereParameters, l_max: usize) -> Result<Self> {
        let k = require_positive("wavenumber", sphere.wavenumber)?;
        let a = require_positive("sphere radius", sphere.radius)?;
        let n = sphere.refractive_index;

        let ka = Complex::new(k * a, 0.0);
        let kna = n * (k * a);

        let j_ka = spherical_jn(l_max, ka);
        let j_ka_p = spherical_jn_derivative(l_max, ka)?;
        let j_kna = spherical_jn(l_max, kna);
        let j_kna_p = spherical_jn_derivative(l_max, kna)?;
        let h_ka = spherical_hn(l_max, k * a)?;
        let h_ka_p = spherical_hn_derivative(l_max, k * a)?;

        let mut coeff_a = Vec::with_capacity(l_max + 1);
        let mut coeff_b = Vec::with_capacity(l_max + 1);
        for l in 0..=l_max {
            let denominator = j_kna[l] * h_ka_p[l] - h_ka[l] * j_kna_p[l] * n;
            coeff_b.push((j_ka[l] * j_kna_p[l] * n - j_kna[l] * j_ka_p[l]) / denominator);
            coeff_a.push(
                (2 * l + 1) as f64 * imaginary_power(l) * (j_ka[l] * h_ka_p[l] - j_ka_p[l] * h_ka[l])
                    / denominator,
            );
        }

        log::debug!(
            "Mie coefficients for ka = {:.4}, n = {}: {} orders",
            k * a,
            n,
            l_max + 1
        );

        Ok(MieCoefficients {
            l_max,
            a: coeff_a,
            b: coeff_b,
            wavenumber: k,
        })
    }

    /// Evaluates both series up to the standard truncation order.
    pub fn for_sphere(sphere: &SphereParameters) -> Result<Self> {
        MieCoefficients::new(sphere, order_limit(sphere.wavenumber, sphere.radius))
    }

    /// `(2l+1) i^l B_l`, the per-order weights of the scattered field.
    pub fn scattered_weights(&self) -> Vec<Complex<f64>> {
        self.b
            .iter()
            .enumerate()
            .map(|(l, &b)| (2 * l + 1) as f64 * imaginary_power(l) * b)
            .collect()
    }

    /// Far-field scattering amplitude `f(θ) = (-i/k) Σ (2l+1) B_l P_l(cosθ)`,
    /// so that the scattered wave tends to `f(θ) e^{ikr} / r`.
    pub fn scattering_amplitude(&self, cos_theta: f64) -> Complex<f64> {
        let mut p = vec![0.0; self.l_max + 1];
        fill_legendre(&mut p, cos_theta);
        let sum: Complex<f64> = self
            .b
            .iter()
            .zip(&p)
            .enumerate()
            .map(|(l, (&b, &p))| (2 * l + 1) as f64 * p * b)
            .sum();
        Complex::new(0.0, -1.0 / self.wavenumber) * sum
    }

    /// Extinction cross-section from the optical theorem.
    pub fn extinction_cross_section(&self) -> f64 {
        let sum: f64 = self
            .b
            .iter()
            .enumerate()
            .map(|(l, b)| (2 * l + 1) as f64 * b.re)
            .sum();
        -4.0 * PI / (self.wavenumber * self.wavenumber) * sum
    }

    /// Total scattering cross-section, summed analytically over orders.
    pub fn scattering_cross_section(&self) -> f64 {
        4.0 * PI / (self.wavenumber * self.wavenumber) * self.weighted_energy().iter().sum::<f64>()
    }

    /// Extinction minus scattering. Zero for a lossless sphere.
    pub fn absorption_cross_section(&self) -> f64 {
        self.extinction_cross_section() - self.scattering_cross_section()
    }

    /// Scattered power per unit incident intensity, integrated numerically over
    /// all directions with Simpson's rule in `cosθ`.
    ///
    /// `intervals` is rounded up to an even number.
    pub fn integrated_scattered_power(&self, intervals: usize) -> f64 {
        let intervals = (intervals.max(2) + 1) / 2 * 2;
        let h = 2.0 / intervals as f64;
        let sum: f64 = (0..=intervals)
            .map(|i| {
                let weight = if i == 0 || i == intervals {
                    1.0
                } else if i.is_odd() {
                    4.0
                } else {
                    2.0
                };
                weight * self.scattering_amplitude(-1.0 + i as f64 * h).norm_sqr()
            })
            .sum();
        2.0 * PI * sum * h / 3.0
    }

    /// Share of the scattered energy carried by the last kept order.
    pub fn tail_fraction(&self) -> f64 {
        let energy = self.weighted_energy();
        let total: f64 = energy.iter().sum();
        match energy.last() {
            Some(&last) if total > 0.0 => last / total,
            _ => 0.0,
        }
    }

    /// Optional residual check of the truncation order; never run implicitly.
    pub fn check_convergence(&self, tolerance: f64) -> bool {
        let tail = self.tail_fraction();
        if tail > tolerance {
            log::warn!(
                "order {} still carries {:.3e} of the scattered energy (tolerance {:.1e})",
                self.l_max,
                tail,
                tolerance
            );
            false
        } else {
            true
        }
    }

    fn weighted_energy(&self) -> Vec<f64> {
        self.b
            .iter()
            .enumerate()
            .map(|(l, b)| (2 * l + 1) as f64 * b.norm_sqr())
            .collect()
    }
}

/// Single-order `B_l` for wavenumber `k`, index `n` and radius `a`.
pub fn coefficient_b(l: usize, k: f64, n: Complex<f64>, a: f64) -> Result<Complex<f64>> {
    let sphere = SphereParameters::new(a, n, Default::default(), k)?;
    Ok(MieCoefficients::new(&sphere, l)?.b[l])
}

/// Single-order `A_l`, prefactor included.
pub fn coefficient_a(l: usize, k: f64, n: Complex<f64>, a: f64) -> Result<Complex<f64>> {
    let sphere = SphereParameters::new(a, n, Default::default(), k)?;
    Ok(MieCoefficients::new(&sphere, l)?.a[l])
}
