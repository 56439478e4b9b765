//! Welch power spectral density and band-power integration.
//!
//! Matches `mne.time_frequency.psd_array_welch` defaults:
//!   • Hamming window, `n_per_seg = n_fft`, no overlap
//!   • constant detrend per segment
//!   • density scaling: `|X|² / (sfreq · Σw²)`, one-sided (doubled except DC
//!     and Nyquist), averaged over segments
//!
//! `n_fft` is clipped to the recording length so short recordings still
//! produce a (coarser) spectrum.
use ndarray::{Array2, ArrayView2};
use rustfft::{num_complex::Complex, FftPlanner};

use crate::filter::hamming;

/// One-sided PSD per channel: `power` is `[C, freqs.len()]`.
#[derive(Debug, Clone)]
pub struct Psd {
    pub freqs: Vec<f64>,
    pub power: Array2<f64>,
}

pub fn welch(data: ArrayView2<'_, f64>, sfreq: f64, n_fft: usize) -> Psd {
    let (n_ch, n_t) = data.dim();
    let n_seg_len = n_fft.min(n_t).max(1);
    let n_freqs = n_seg_len / 2 + 1;
    let n_segments = (n_t / n_seg_len).max(1);

    let window = hamming(n_seg_len);
    let win_ss: f64 = window.iter().map(|w| w * w).sum();
    let scale = 1.0 / (sfreq * win_ss);

    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let fft = planner.plan_fft_forward(n_seg_len);

    let mut power = Array2::<f64>::zeros((n_ch, n_freqs));
    let mut buf = vec![Complex::default(); n_seg_len];

    for (ch, row) in data.rows().into_iter().enumerate() {
        for seg in 0..n_segments {
            let start = seg * n_seg_len;
            let segment = row.slice(ndarray::s![start..start + n_seg_len]);
            let seg_mean = segment.mean().unwrap_or(0.0);

            for ((b, &x), &w) in buf.iter_mut().zip(segment.iter()).zip(&window) {
                *b = Complex { re: (x - seg_mean) * w, im: 0.0 };
            }
            fft.process(&mut buf);

            for k in 0..n_freqs {
                power[[ch, k]] += buf[k].norm_sqr() * scale;
            }
        }
    }

    // One-sided: double everything except DC and (for even lengths) Nyquist.
    let last_doubled = if n_seg_len % 2 == 0 { n_freqs - 1 } else { n_freqs };
    let inv_segments = 1.0 / n_segments as f64;
    for mut row in power.rows_mut() {
        for (k, p) in row.iter_mut().enumerate() {
            let factor = if k > 0 && k < last_doubled { 2.0 } else { 1.0 };
            *p *= factor * inv_segments;
        }
    }

    let df = sfreq / n_seg_len as f64;
    let freqs = (0..n_freqs).map(|k| k as f64 * df).collect();
    Psd { freqs, power }
}

impl Psd {
    /// Frequency resolution in Hz.
    pub fn df(&self) -> f64 {
        if self.freqs.len() > 1 { self.freqs[1] - self.freqs[0] } else { 0.0 }
    }

    /// Indices of bins with `fmin ≤ f ≤ fmax`.
    pub fn band_indices(&self, fmin: f64, fmax: f64) -> Vec<usize> {
        self.freqs
            .iter()
            .enumerate()
            .filter(|&(_, &f)| f >= fmin && f <= fmax)
            .map(|(i, _)| i)
            .collect()
    }

    /// Integrated power in `[fmin, fmax]` for each channel.
    pub fn channel_band_power(&self, fmin: f64, fmax: f64) -> Vec<f64> {
        let idx = self.band_indices(fmin, fmax);
        let df = self.df();
        self.power
            .rows()
            .into_iter()
            .map(|row| idx.iter().map(|&k| row[k]).sum::<f64>() * df)
            .collect()
    }

    /// Integrated power in `[fmin, fmax]`, averaged across channels.
    pub fn band_power(&self, fmin: f64, fmax: f64) -> f64 {
        let per_ch = self.channel_band_power(fmin, fmax);
        if per_ch.is_empty() {
            return 0.0;
        }
        per_ch.iter().sum::<f64>() / per_ch.len() as f64
    }
}
