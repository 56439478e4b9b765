//! FIR filter design and application.
//!
//! - [`design`]: Hamming-windowed sinc highpass / bandpass / notch
//!   design, matching `mne.filter.create_filter(fir_window='hamming')`.
//! - [`apply`]: Overlap-add zero-phase convolution, matching MNE's
//!   `_overlap_add_filter` / `_1d_overlap_filter`.
//!
//! Conditioning and the eigen pipeline reach filtering only through the
//! [`SignalFilter`] trait; [`FirFilter`] is the built-in implementation.

pub mod apply;
pub mod design;

pub use apply::{apply_fir_zero_phase, OverlapAdd};
pub use design::{
    auto_filter_length, auto_trans_bandwidth, auto_trans_bandwidth_high, design_bandpass,
    design_highpass, design_notch, firwin, hamming,
};

use ndarray::Array2;

use crate::config::Band;

/// Bandpass / notch filtering capability.
pub trait SignalFilter: Send + Sync {
    /// Restrict every channel of `data` to `band`. An open upper edge means
    /// highpass only.
    fn band(&self, data: &mut Array2<f64>, sfreq: f64, band: Band);

    /// Remove a narrow band around `freq`.
    fn notch(&self, data: &mut Array2<f64>, sfreq: f64, freq: f64);
}

/// Zero-phase windowed-sinc FIR filtering.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirFilter;

impl SignalFilter for FirFilter {
    fn band(&self, data: &mut Array2<f64>, sfreq: f64, band: Band) {
        let h = match band.high {
            Some(high) => design_bandpass(band.low, high, sfreq),
            None => design_highpass(band.low, sfreq),
        };
        log::debug!("[FILTER] band {:?} Hz: {} taps", band, h.len());
        apply_fir_zero_phase(data, &h);
    }

    fn notch(&self, data: &mut Array2<f64>, sfreq: f64, freq: f64) {
        let h = design_notch(freq, sfreq);
        log::debug!("[FILTER] notch {freq} Hz: {} taps", h.len());
        apply_fir_zero_phase(data, &h);
    }
}
