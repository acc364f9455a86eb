//! Unitary 2-D FFTs over square complex grids, plus the shift helpers.
//!
//! Both directions scale by `1/sqrt(N)`, so a forward and inverse pair
//! reproduces its input. The `c` variants keep the zero-frequency sample at
//! the centre `(N/2, N/2)` on both sides of the transform.

use ndarray::parallel::prelude::{IntoParallelIterator, ParallelIterator};
use ndarray::{Array1, Array2, ArrayViewMut1, ArrayViewMut2, Axis, Zip};
use num_complex::Complex;
use rustfft::num_traits::Zero;
use rustfft::{FftDirection, FftPlanner};
use unchecked_index::get_unchecked_mut;

pub fn fft2(mut input: Array2<Complex<f64>>) -> Array2<Complex<f64>> {
    transform(input.view_mut(), FftDirection::Forward, false);
    input
}

pub fn ifft2(mut input: Array2<Complex<f64>>) -> Array2<Complex<f64>> {
    transform(input.view_mut(), FftDirection::Inverse, false);
    input
}

/// 2-D FFT with the origin at the centre of both input and output.
///
/// Equivalent to `fftshift(fft2(ifftshift(input)))`.
pub fn fft2c(mut input: Array2<Complex<f64>>) -> Array2<Complex<f64>> {
    transform(input.view_mut(), FftDirection::Forward, true);
    input
}

/// Inverse of `fft2c`.
pub fn ifft2c(mut input: Array2<Complex<f64>>) -> Array2<Complex<f64>> {
    transform(input.view_mut(), FftDirection::Inverse, true);
    input
}

/// Row pass then column pass. Each lane is gathered into a contiguous buffer,
/// starting at `N/2` when centred so the gather is the `ifftshift` and the
/// scatter back is the `fftshift`.
fn transform(mut input: ArrayViewMut2<Complex<f64>>, direction: FftDirection, centred: bool) {
    let mut planner = FftPlanner::new();
    let normalisation = 1.0 / ((input.shape()[0] * input.shape()[1]) as f64).sqrt();

    for axis in [Axis(1), Axis(0)].iter().copied() {
        let len = input.len_of(axis);
        if len == 0 {
            return;
        }
        let fft = planner.plan_fft(len, direction);
        let start = if centred { len / 2 } else { 0 };
        // normalise once, on the second pass
        let scale = if axis == Axis(0) { normalisation } else { 1.0 };

        Zip::from(input.lanes_mut(axis)).into_par_iter().for_each_init(
            || {
                (
                    vec![Zero::zero(); len],
                    vec![Zero::zero(); fft.get_inplace_scratch_len()],
                )
            },
            |(buffer, scratch), (mut lane,)| {
                debug_assert_eq!(lane.len(), buffer.len());
                for (k, &e) in lane.iter().enumerate() {
                    unsafe {
                        *get_unchecked_mut(buffer.as_mut_slice(), (k + len - start) % len) = e;
                    }
                }
                fft.process_with_scratch(buffer, scratch);
                for (k, e) in lane.iter_mut().enumerate() {
                    unsafe {
                        *e = *get_unchecked_mut(buffer.as_mut_slice(), (k + len - start) % len)
                            * scale;
                    }
                }
            },
        );
    }
}

/// Moves the origin `(0, 0)` to the centre `(H/2, W/2)`.
pub fn fft2_shift_inplace<A: Copy + Send>(mut input: ArrayViewMut2<A>) {
    for axis in [Axis(1), Axis(0)].iter().copied() {
        Zip::from(input.lanes_mut(axis)).par_for_each(fft_shift_inplace);
    }
}

/// Moves the centre `(H/2, W/2)` back to the origin. Exact inverse of `fft2_shift_inplace`.
pub fn ifft2_shift_inplace<A: Copy + Send>(mut input: ArrayViewMut2<A>) {
    for axis in [Axis(1), Axis(0)].iter().copied() {
        Zip::from(input.lanes_mut(axis)).par_for_each(ifft_shift_inplace);
    }
}

/// Moves the origin `0` to the centre `N/2`.
///
/// For even lengths the two halves swap; for odd lengths the value at the
/// origin lands exactly on the centre sample.
pub fn fft_shift_inplace<A: Copy>(input: ArrayViewMut1<A>) {
    let half = input.len() / 2;
    rotate_right(input, half);
}

/// Moves the centre `N/2` to the origin `0`. Exact inverse of `fft_shift_inplace`.
pub fn ifft_shift_inplace<A: Copy>(input: ArrayViewMut1<A>) {
    let len = input.len();
    rotate_right(input, len - len / 2);
}

/// In-place cyclic rotation by three reversals, which works on strided lanes.
fn rotate_right<A>(mut input: ArrayViewMut1<A>, by: usize) {
    let len = input.len();
    if len == 0 || by % len == 0 {
        return;
    }
    let by = by % len;
    reverse(&mut input, 0, len);
    reverse(&mut input, 0, by);
    reverse(&mut input, by, len);
}

fn reverse<A>(input: &mut ArrayViewMut1<A>, mut lo: usize, mut hi: usize) {
    while lo + 1 < hi {
        hi -= 1;
        input.swap(lo, hi);
        lo += 1;
    }
}

/// Sample frequencies of an `n`-point transform with spacing `d`, in the
/// uncentred order `[0, 1, ..., -2, -1] / (n d)`.
pub fn fftfreq(n: usize, d: f64) -> Array1<f64> {
    let scale = 1.0 / (n as f64 * d);
    let positive = (n + 1) / 2;
    Array1::from_shape_fn(n, |i| {
        if i < positive {
            i as f64 * scale
        } else {
            (i as f64 - n as f64) * scale
        }
    })
}
