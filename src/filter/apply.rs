//! Overlap-add zero-phase FIR convolution.
//!
//! Same arithmetic as MNE's `_overlap_add_filter`: the output is shifted left
//! by `(N-1)/2` samples instead of running the filter twice, and both edges
//! get `N-1` samples of reflect-limited padding.
//!
//! [`OverlapAdd`] plans the FFTs and transforms the kernel once, then filters
//! every row of a `[C, T]` matrix with them.
use std::sync::Arc;

use ndarray::Array2;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// A kernel prepared for signals of one length.
pub struct OverlapAdd {
    n_taps: usize,
    n_fft: usize,
    kernel: Vec<Complex<f64>>,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl OverlapAdd {
    /// Prepare `h` (odd length) for signals of `n_samples` samples.
    pub fn new(h: &[f64], n_samples: usize) -> Self {
        let n_taps = h.len();
        let n_padded = n_samples + 2 * n_taps.saturating_sub(1);
        let n_fft = fft_len(n_taps, n_padded);

        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(n_fft);
        let inverse = planner.plan_fft_inverse(n_fft);

        let mut kernel = to_complex(h, n_fft);
        forward.process(&mut kernel);
        Self { n_taps, n_fft, kernel, forward, inverse }
    }

    /// Filter one signal; the output has the input's length.
    pub fn run(&self, x: &[f64]) -> Vec<f64> {
        if x.is_empty() || self.n_taps == 0 {
            return x.to_vec();
        }
        let edge = self.n_taps - 1;
        let shift = edge / 2;
        let padded = reflect_limited_pad(x, edge);
        let n_padded = padded.len();

        let block = self.n_fft - self.n_taps + 1;
        let scale = 1.0 / self.n_fft as f64;
        let mut acc = vec![0.0_f64; n_padded];
        let mut buf = vec![Complex::default(); self.n_fft];

        for start in (0..n_padded).step_by(block) {
            let stop = (start + block).min(n_padded);
            buf.iter_mut().for_each(|b| *b = Complex::default());
            for (b, &v) in buf.iter_mut().zip(&padded[start..stop]) {
                b.re = v;
            }
            self.forward.process(&mut buf);
            buf.iter_mut().zip(&self.kernel).for_each(|(b, &k)| *b *= k);
            self.inverse.process(&mut buf);

            // Full convolution sample `start + p` lands at `start + p - shift`.
            let skip = shift.saturating_sub(start);
            let first = start.saturating_sub(shift);
            for (o, b) in acc[first..].iter_mut().zip(&buf[skip..]) {
                *o += b.re * scale;
            }
        }

        acc[edge..edge + x.len()].to_vec()
    }
}

/// Apply a zero-phase FIR filter to each row of `data` (`[C, T]`) in place.
///
/// `h` must have odd length (guaranteed by the `design_*` functions).
pub fn apply_fir_zero_phase(data: &mut Array2<f64>, h: &[f64]) {
    let ola = OverlapAdd::new(h, data.ncols());
    for mut row in data.rows_mut() {
        let y = ola.run(&row.to_vec());
        row.iter_mut().zip(y).for_each(|(r, v)| *r = v);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn to_complex(x: &[f64], n: usize) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::default(); n];
    for (o, &v) in out.iter_mut().zip(x) {
        o.re = v;
    }
    out
}

/// Odd reflection about each end point (MNE's `_smart_pad`), `n` samples per
/// side. Whatever the signal is too short to reflect is zero-filled.
fn reflect_limited_pad(x: &[f64], n: usize) -> Vec<f64> {
    let len = x.len();
    let k = n.min(len - 1);
    let (first, last) = (x[0], x[len - 1]);

    let mut out = vec![0.0; n - k];
    out.extend((1..=k).rev().map(|i| 2.0 * first - x[i]));
    out.extend_from_slice(x);
    out.extend((1..=k).map(|i| 2.0 * last - x[len - 1 - i]));
    out.resize(out.len() + n - k, 0.0);
    out
}

/// Power-of-two block length minimising MNE's overlap-add cost
/// `ceil(n_x / (N − n_h + 1)) · N · (log2 N + 1) + 4e-5 · N · n_x`.
fn fft_len(n_h: usize, n_x: usize) -> usize {
    let min_len = (2 * n_h).saturating_sub(1).max(1);
    let lo = min_len.next_power_of_two().trailing_zeros();
    let hi = (n_x.max(1).next_power_of_two().trailing_zeros() + 1).max(lo);

    (lo..=hi)
        .map(|p| {
            let n = 1usize << p;
            let blocks = (n_x as f64 / (n - n_h + 1) as f64).ceil();
            let cost = blocks * n as f64 * (p as f64 + 1.0) + 4e-5 * n as f64 * n_x as f64;
            (n, cost)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map_or(min_len.next_power_of_two(), |(n, _)| n)
}
