//! Spherical Bessel and Hankel functions, their derivatives and Legendre polynomials.
//!
//! Every function returns the whole order series `0..=l_max` at once, since the
//! Mie sums always need all of them. The spherical Bessel functions of the
//! first kind use Miller's downward recurrence normalised against the closed
//! forms of `j_0` and `j_1`, which stays accurate for complex arguments
//! (absorbing spheres) and for orders well above the argument. The second kind
//! uses the upward recurrence, which is stable for it. Both are equivalent to
//! the half-integer identity `j_l(x) = sqrt(π/2x) J_{l+1/2}(x)`.
//!
//! Kernels that divide by the argument (`y_l`, `h_l`, derivatives, the
//! `l - 1` neighbour) require `x > 0` and report `InvalidGeometry` otherwise.

use crate::error::{require_positive, MieError, Result};
use ndarray::{ArrayBase, ArrayD, ArrayViewD, Axis, Data, Dimension, Zip};
use num_complex::Complex;
use rustfft::num_traits::Zero;
use std::f64::consts::FRAC_PI_2;

// below this the argument is treated as exactly zero
const TINY_ARGUMENT: f64 = 1e-300;
// downward recurrence values are rescaled before they can overflow
const RESCALE_LIMIT: f64 = 1e200;

/// Which neighbour of each order a shifted series is evaluated at.
///
/// `Previous` yields orders `-1..l_max`, `Current` yields `0..=l_max` and
/// `Next` yields `1..=l_max + 1`. The neighbours feed the derivative recurrence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderShift {
    Previous,
    Current,
    Next,
}

/// `i^l` without going through `powi` on a complex number.
pub fn imaginary_power(l: usize) -> Complex<f64> {
    match l % 4 {
        0 => Complex::new(1.0, 0.0),
        1 => Complex::new(0.0, 1.0),
        2 => Complex::new(-1.0, 0.0),
        _ => Complex::new(0.0, -1.0),
    }
}

/// Legendre polynomials `P_0(x)..=P_order(x)` by the three-term recurrence.
pub fn legendre(order: usize, x: f64) -> Vec<f64> {
    let mut p = vec![0.0; order + 1];
    fill_legendre(&mut p, x);
    p
}

/// Fills `p` with `P_0(x)..P_{p.len()-1}(x)`.
pub(crate) fn fill_legendre(p: &mut [f64], x: f64) {
    if p.is_empty() {
        return;
    }
    p[0] = 1.0;
    if p.len() > 1 {
        p[1] = x;
    }
    for j in 1..p.len().saturating_sub(1) {
        let jf = j as f64;
        p[j + 1] = ((2.0 * jf + 1.0) * x * p[j] - jf * p[j - 1]) / (jf + 1.0);
    }
}

/// Legendre polynomials broadcast over an array of any dimension.
///
/// The output has the shape of `x` with one trailing axis of length `order + 1`,
/// so a scalar (0-d) input yields a plain order series.
pub fn legendre_array<S, D>(order: usize, x: &ArrayBase<S, D>) -> ArrayD<f64>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    stack_orders(order + 1, x.view().into_dyn(), |x, p| fill_legendre(p, x))
}

/// Spherical Bessel functions of the first kind `j_0(z)..=j_{l_max}(z)`.
///
/// Defined for every argument, including `z = 0` where `j_l(0) = δ_{l0}`.
pub fn spherical_jn(l_max: usize, z: Complex<f64>) -> Vec<Complex<f64>> {
    let mut j = vec![Complex::zero(); l_max + 1];
    fill_bessel_j(&mut j, z);
    j
}

/// `j_l(z)` for the orders selected by `shift`. `Previous` divides by `z`.
pub fn spherical_jn_shifted(
    l_max: usize,
    z: Complex<f64>,
    shift: OrderShift,
) -> Result<Vec<Complex<f64>>> {
    match shift {
        OrderShift::Current => Ok(spherical_jn(l_max, z)),
        OrderShift::Next => Ok(spherical_jn(l_max + 1, z).split_off(1)),
        OrderShift::Previous => {
            require_positive("Bessel argument magnitude", z.norm())?;
            Ok(prepend_minus_one(spherical_jn(l_max, z), z.cos() / z))
        }
    }
}

/// Spherical Bessel functions of the second kind `y_0(x)..=y_{l_max}(x)`, `x > 0`.
pub fn spherical_yn(l_max: usize, x: f64) -> Result<Vec<f64>> {
    require_positive("Neumann argument", x)?;
    let mut y = vec![0.0; l_max + 1];
    fill_neumann_y(&mut y, x);
    Ok(y)
}

/// Spherical Hankel functions of the first kind `h_l(x) = j_l(x) + i y_l(x)`, `x > 0`.
pub fn spherical_hn(l_max: usize, x: f64) -> Result<Vec<Complex<f64>>> {
    require_positive("Hankel argument", x)?;
    let mut h = vec![Complex::zero(); l_max + 1];
    fill_hankel_h(&mut h, x);
    Ok(h)
}

/// `h_l(x)` for the orders selected by `shift`, `x > 0`.
pub fn spherical_hn_shifted(
    l_max: usize,
    x: f64,
    shift: OrderShift,
) -> Result<Vec<Complex<f64>>> {
    match shift {
        OrderShift::Current => spherical_hn(l_max, x),
        OrderShift::Next => Ok(spherical_hn(l_max + 1, x)?.split_off(1)),
        OrderShift::Previous => {
            let h = spherical_hn(l_max, x)?;
            // h_{-1}(x) = (cos x + i sin x) / x
            Ok(prepend_minus_one(h, Complex::new(0.0, x).exp() / x))
        }
    }
}

/// Derivatives `j_l'(z)` for `l = 0..=l_max`, `z ≠ 0`.
pub fn spherical_jn_derivative(l_max: usize, z: Complex<f64>) -> Result<Vec<Complex<f64>>> {
    let previous = spherical_jn_shifted(l_max, z, OrderShift::Previous)?;
    let current = spherical_jn(l_max, z);
    let next = spherical_jn_shifted(l_max, z, OrderShift::Next)?;
    Ok(neighbour_derivative(&previous, &current, &next, z))
}

/// Derivatives `h_l'(x)` for `l = 0..=l_max`, `x > 0`.
pub fn spherical_hn_derivative(l_max: usize, x: f64) -> Result<Vec<Complex<f64>>> {
    let previous = spherical_hn_shifted(l_max, x, OrderShift::Previous)?;
    let current = spherical_hn(l_max, x)?;
    let next = spherical_hn_shifted(l_max, x, OrderShift::Next)?;
    Ok(neighbour_derivative(
        &previous,
        &current,
        &next,
        Complex::new(x, 0.0),
    ))
}

/// Large-argument form `h_l(x) ≈ exp(i(x - lπ/2)) / (i x)`.
///
/// Only meaningful for `x ≫ l²`; callers own that check. `x` must be positive.
pub fn spherical_hn_asymptotic(l: usize, x: f64) -> Result<Complex<f64>> {
    let x = require_positive("Hankel argument", x)?;
    Ok(hankel_asymptotic(l, x))
}

/// Unchecked form of [`spherical_hn_asymptotic`] for kernels that validated `x > 0` up front.
pub(crate) fn hankel_asymptotic(l: usize, x: f64) -> Complex<f64> {
    Complex::new(0.0, x - l as f64 * FRAC_PI_2).exp() / Complex::new(0.0, x)
}

/// `h_l` broadcast over an array of real arguments, trailing order axis appended.
///
/// Every argument is checked before any evaluation starts.
pub fn spherical_hn_array<S, D>(l_max: usize, x: &ArrayBase<S, D>) -> Result<ArrayD<Complex<f64>>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    if let Some(&bad) = x.iter().find(|&&x| !(x.is_finite() && x > 0.0)) {
        return Err(MieError::geometry("Hankel argument", bad));
    }
    Ok(stack_orders(l_max + 1, x.view().into_dyn(), |x, h| {
        fill_hankel_h(h, x)
    }))
}

/// `f_l' = (f_{l-1} - (f_l + z f_{l+1}) / z) / 2`, valid for `j`, `y` and `h` alike.
fn neighbour_derivative(
    previous: &[Complex<f64>],
    current: &[Complex<f64>],
    next: &[Complex<f64>],
    z: Complex<f64>,
) -> Vec<Complex<f64>> {
    previous
        .iter()
        .zip(current)
        .zip(next)
        .map(|((&p, &c), &n)| 0.5 * (p - (c + z * n) / z))
        .collect()
}

fn prepend_minus_one(mut series: Vec<Complex<f64>>, minus_one: Complex<f64>) -> Vec<Complex<f64>> {
    series.pop();
    series.insert(0, minus_one);
    series
}

fn stack_orders<A, B, F>(orders: usize, x: ArrayViewD<A>, fill: F) -> ArrayD<B>
where
    A: Copy + Sync,
    B: Clone + Zero + Send,
    F: Fn(A, &mut [B]) + Sync + Send,
{
    let mut shape = x.shape().to_vec();
    shape.push(orders);
    let mut out = ArrayD::zeros(shape);
    let order_axis = Axis(x.ndim());
    Zip::from(out.lanes_mut(order_axis))
        .and(&x)
        .par_for_each(|mut lane, &x| {
            // freshly allocated, so the trailing axis is contiguous
            fill(x, lane.as_slice_mut().unwrap())
        });
    out
}

/// Miller's algorithm: recur downward from well above both `l_max` and `|z|`,
/// then normalise against whichever of `j_0`, `j_1` is larger.
pub(crate) fn fill_bessel_j(j: &mut [Complex<f64>], z: Complex<f64>) {
    if j.is_empty() {
        return;
    }
    for e in j.iter_mut() {
        *e = Complex::zero();
    }
    if z.norm() < TINY_ARGUMENT {
        j[0] = Complex::new(1.0, 0.0);
        return;
    }

    let j0 = z.sin() / z;
    j[0] = j0;
    if j.len() == 1 {
        return;
    }
    let j1 = (j0 - z.cos()) / z;
    j[1] = j1;
    if j.len() == 2 {
        return;
    }

    let l_max = j.len() - 1;
    if z.im == 0.0 && z.re > l_max as f64 {
        // upward recurrence is stable while the order stays below a real argument
        for k in 1..l_max {
            j[k + 1] = j[k] * ((2 * k + 1) as f64) / z - j[k - 1];
        }
        return;
    }
    let top = l_max.max(z.norm().ceil() as usize);
    let start = top + 16 + (40.0 * top as f64).sqrt() as usize;

    let mut f_above = Complex::zero();
    let mut f = Complex::new(1e-30, 0.0);
    for k in (0..start).rev() {
        let f_k = f * ((2 * k + 3) as f64) / z - f_above;
        f_above = f;
        f = f_k;
        if k <= l_max {
            j[k] = f_k;
        }
        if f_k.norm() > RESCALE_LIMIT {
            f = f / RESCALE_LIMIT;
            f_above = f_above / RESCALE_LIMIT;
            for e in j[k.min(l_max + 1)..].iter_mut() {
                *e = *e / RESCALE_LIMIT;
            }
        }
    }

    let scale = if j0.norm() >= j1.norm() {
        j0 / j[0]
    } else {
        j1 / j[1]
    };
    for e in j.iter_mut() {
        *e = *e * scale;
    }
}

/// Upward recurrence from the closed forms of `y_0` and `y_1`. Requires `x > 0`.
pub(crate) fn fill_neumann_y(y: &mut [f64], x: f64) {
    if y.is_empty() {
        return;
    }
    let (sin, cos) = x.sin_cos();
    y[0] = -cos / x;
    if y.len() == 1 {
        return;
    }
    y[1] = -cos / (x * x) - sin / x;
    for k in 1..y.len() - 1 {
        y[k + 1] = (2 * k + 1) as f64 / x * y[k] - y[k - 1];
    }
}

/// `h_l(x) = j_l(x) + i y_l(x)`. Requires `x > 0`.
pub(crate) fn fill_hankel_h(h: &mut [Complex<f64>], x: f64) {
    fill_bessel_j(h, Complex::new(x, 0.0));
    let mut y = vec![0.0; h.len()];
    fill_neumann_y(&mut y, x);
    for (h, y) in h.iter_mut().zip(y) {
        *h = Complex::new(h.re, y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::{arr0, arr1, Array2};
    use proptest::prelude::*;

    fn c(re: f64) -> Complex<f64> {
        Complex::new(re, 0.0)
    }

    #[test]
    fn test_legendre_low_orders() {
        for &x in &[-1.0, -0.3, 0.0, 0.5, 1.0] {
            let p = legendre(4, x);
            assert_eq!(p[0], 1.0);
            assert_eq!(p[1], x);
            assert_relative_eq!(p[2], 0.5 * (3.0 * x * x - 1.0), epsilon = 1e-14);
            assert_relative_eq!(p[3], 0.5 * (5.0 * x * x * x - 3.0 * x), epsilon = 1e-14);
        }
    }

    #[test]
    fn test_legendre_short_series() {
        assert_eq!(legendre(0, 0.3), vec![1.0]);
        assert_eq!(legendre(1, 0.3), vec![1.0, 0.3]);
    }

    #[test]
    fn test_legendre_array_shapes() {
        let scalar = legendre_array(3, &arr0(0.5));
        assert_eq!(scalar.shape(), &[4]);

        let line = legendre_array(3, &arr1(&[0.1, 0.2]));
        assert_eq!(line.shape(), &[2, 4]);
        assert_relative_eq!(line[[1, 1]], 0.2);

        let grid = Array2::from_elem((3, 5), 1.0);
        let p = legendre_array(6, &grid);
        assert_eq!(p.shape(), &[3, 5, 7]);
        // P_l(1) = 1 for all l
        for &v in p.iter() {
            assert_relative_eq!(v, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_bessel_j_closed_forms() {
        // https://dlmf.nist.gov/10.49.E3
        for &x in &[1.0, 2.5, 12.34, 123.45] {
            let j = spherical_jn(2, c(x));
            let (s, co) = x.sin_cos();
            assert_relative_eq!(j[0].re, s / x, max_relative = 1e-10);
            assert_relative_eq!(j[1].re, s / (x * x) - co / x, max_relative = 1e-10);
            assert_relative_eq!(
                j[2].re,
                (3.0 / (x * x * x) - 1.0 / x) * s - 3.0 / (x * x) * co,
                max_relative = 1e-9
            );
            assert_abs_diff_eq!(j[2].im, 0.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_bessel_j_small_argument_high_order() {
        // j_l(x) ≈ x^l / (2l+1)!! for x → 0
        let x = 1e-3;
        let j = spherical_jn(5, c(x));
        let double_factorial = 1.0 * 3.0 * 5.0 * 7.0 * 9.0 * 11.0;
        assert_relative_eq!(j[5].re, x.powi(5) / double_factorial, max_relative = 1e-6);
    }

    #[test]
    fn test_bessel_j_at_zero() {
        let j = spherical_jn(3, Complex::zero());
        assert_eq!(j[0], c(1.0));
        assert!(j[1..].iter().all(|v| v.is_zero()));
    }

    #[test]
    fn test_bessel_j_complex_closed_form() {
        let z = Complex::new(7.85, 0.19);
        let j = spherical_jn(4, z);
        assert_relative_eq!(j[0].re, (z.sin() / z).re, max_relative = 1e-12);
        let j2 = (3.0 / (z * z * z) - 1.0 / z) * z.sin() - 3.0 / (z * z) * z.cos();
        assert!((j[2] - j2).norm() < 1e-10 * j2.norm());
    }

    #[test]
    fn test_wronskian() {
        // j_l y_{l-1} - j_{l-1} y_l = 1 / x^2
        for &x in &[0.7, 3.0, 25.0, 140.0] {
            let j = spherical_jn(20, c(x));
            let y = spherical_yn(20, x).unwrap();
            for l in 1..=20 {
                let w = j[l].re * y[l - 1] - j[l - 1].re * y[l];
                assert_relative_eq!(w * x * x, 1.0, max_relative = 1e-8);
            }
        }
    }

    /// `h_0..=h_3` written out in closed form.
    fn hankel_closed_form(x: f64) -> [Complex<f64>; 4] {
        let e: Complex<f64> = Complex::new(0.0, x).exp();
        let i: Complex<f64> = Complex::new(0.0, 1.0);
        [
            -i * e / x,
            -e * (x + i) / (x * x),
            i * e * (x * x + 3.0 * i * x - 3.0) / (x * x * x),
            e * (x * x * x + 6.0 * i * x * x - 15.0 * x - 15.0 * i) / (x * x * x * x),
        ]
    }

    #[test]
    fn test_hankel_closed_forms() {
        for &x in &[0.5, 6.283, 40.0] {
            let h = spherical_hn(3, x).unwrap();
            for (l, expected) in hankel_closed_form(x).iter().enumerate() {
                assert!(
                    (h[l] - expected).norm() <= 1e-12 * expected.norm(),
                    "h_{}({})",
                    l,
                    x
                );
            }
        }
    }

    #[test]
    fn test_shifted_series() {
        let x = 2.0;
        let next = spherical_hn_shifted(3, x, OrderShift::Next).unwrap();
        let full = spherical_hn(4, x).unwrap();
        assert_eq!(next.len(), 4);
        assert_eq!(next[0], full[1]);

        let previous = spherical_jn_shifted(3, c(x), OrderShift::Previous).unwrap();
        assert_eq!(previous.len(), 4);
        assert_relative_eq!(previous[0].re, x.cos() / x, max_relative = 1e-14);

        let h_prev = spherical_hn_shifted(2, x, OrderShift::Previous).unwrap();
        assert_relative_eq!(h_prev[0].re, x.cos() / x, max_relative = 1e-14);
        assert_relative_eq!(h_prev[0].im, x.sin() / x, max_relative = 1e-14);
    }

    #[test]
    fn test_derivatives_match_finite_difference() {
        let step = 1e-5;
        for &x in &[0.9, 4.2, 17.0] {
            let dj = spherical_jn_derivative(8, c(x)).unwrap();
            let dh = spherical_hn_derivative(8, x).unwrap();
            let j_hi = spherical_jn(8, c(x + step));
            let j_lo = spherical_jn(8, c(x - step));
            let h_hi = spherical_hn(8, x + step).unwrap();
            let h_lo = spherical_hn(8, x - step).unwrap();
            for l in 0..=8 {
                let fd_j = (j_hi[l] - j_lo[l]) / (2.0 * step);
                let fd_h = (h_hi[l] - h_lo[l]) / (2.0 * step);
                assert!((dj[l] - fd_j).norm() < 1e-6, "j'_{} at {}", l, x);
                assert!((dh[l] - fd_h).norm() < 1e-6 * fd_h.norm().max(1.0), "h'_{} at {}", l, x);
            }
        }
    }

    #[test]
    fn test_j0_derivative_is_minus_j1() {
        let z = Complex::new(3.3, 0.05);
        let dj = spherical_jn_derivative(2, z).unwrap();
        let j = spherical_jn(2, z);
        assert!((dj[0] + j[1]).norm() < 1e-12);
    }

    #[test]
    fn test_zero_argument_rejected() {
        assert!(spherical_yn(3, 0.0).unwrap_err().is_geometry_error());
        assert!(spherical_hn(3, 0.0).is_err());
        assert!(spherical_hn_derivative(3, 0.0).is_err());
        assert!(spherical_jn_derivative(3, Complex::zero()).is_err());
        assert!(spherical_hn_array(2, &arr1(&[1.0, 0.0, 2.0])).is_err());
    }

    #[test]
    fn test_hankel_array_matches_scalar() {
        let x = arr1(&[0.5, 1.5, 9.0]);
        let h = spherical_hn_array(4, &x).unwrap();
        assert_eq!(h.shape(), &[3, 5]);
        let scalar = spherical_hn(4, 9.0).unwrap();
        for l in 0..=4 {
            assert_eq!(h[[2, l]], scalar[l]);
        }
    }

    #[test]
    fn test_asymptotic_hankel_converges() {
        let x = 1e5;
        let exact = spherical_hn(3, x).unwrap();
        for l in 0..=3 {
            let approx = spherical_hn_asymptotic(l, x).unwrap();
            assert!((exact[l] - approx).norm() < 1e-3 * exact[l].norm());
        }
        assert!(spherical_hn_asymptotic(0, 0.0).is_err());
        assert!(spherical_hn_asymptotic(2, -1.0).is_err());
    }

    #[test]
    fn test_imaginary_power() {
        let mut expected = Complex::new(1.0, 0.0);
        for l in 0..9 {
            assert_eq!(imaginary_power(l), expected);
            expected = expected * Complex::new(0.0, 1.0);
        }
    }

    proptest! {
        #[test]
        fn legendre_first_orders_closed_form(x in -1.0f64..=1.0) {
            let p = legendre(5, x);
            prop_assert_eq!(p[0], 1.0);
            prop_assert_eq!(p[1], x);
            prop_assert!(p.iter().all(|v| v.abs() <= 1.0 + 1e-12));
        }

        #[test]
        fn hankel_low_orders_closed_form(x in 0.1f64..200.0) {
            let h = spherical_hn(3, x).unwrap();
            for (l, expected) in hankel_closed_form(x).iter().enumerate() {
                prop_assert!((h[l] - expected).norm() <= 1e-10 * expected.norm());
            }
        }
    }
}
