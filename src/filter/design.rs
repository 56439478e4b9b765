//! FIR filter design matching MNE / `scipy.signal.firwin`.
//!
//! Transition bandwidths follow MNE's `'auto'` rules:
//!   • lower edge `l`:  `min(max(0.25·l, 2), l)`
//!   • upper edge `h`:  `min(max(0.25·h, 2), nyq − h)`
//!   • filter length N = ceil(3.3 / min(trans_bw) · sfreq), rounded to odd
//!
//! Every response is a Hamming-windowed sinc; highpass and bandstop come from
//! spectral inversion of lowpass prototypes.
use std::f64::consts::PI;

/// MNE transition bandwidth for a lower (highpass) edge.
pub fn auto_trans_bandwidth(l_freq: f64) -> f64 {
    (0.25 * l_freq).max(2.0).min(l_freq)
}

/// MNE transition bandwidth for an upper (lowpass) edge.
///
/// Returns `0.0` when `h_freq` sits on or above Nyquist.
pub fn auto_trans_bandwidth_high(h_freq: f64, sfreq: f64) -> f64 {
    (0.25 * h_freq).max(2.0).min(sfreq / 2.0 - h_freq).max(0.0)
}

/// Number of FIR taps for a transition bandwidth, rounded up to odd.
///
/// Formula: `ceil(3.3 / trans_bw * sfreq)`.
pub fn auto_filter_length(trans_bw: f64, sfreq: f64) -> usize {
    let n_raw = (3.3 / trans_bw * sfreq).ceil() as usize;
    if n_raw % 2 == 0 { n_raw + 1 } else { n_raw }
}

/// Zero-phase highpass at `l_freq`.
///
/// Matches `mne.filter.create_filter(l_freq=l_freq, h_freq=None,
///   fir_window='hamming', fir_design='firwin', phase='zero')`.
pub fn design_highpass(l_freq: f64, sfreq: f64) -> Vec<f64> {
    let trans_bw = auto_trans_bandwidth(l_freq);
    let n = auto_filter_length(trans_bw, sfreq);
    // Midpoint of the transition band is the firwin cutoff.
    let cutoff_hz = l_freq - trans_bw / 2.0;
    firwin(n, cutoff_hz, sfreq, false)
}

/// Zero-phase bandpass `[l_freq, h_freq]`.
///
/// Built as the difference of two lowpass prototypes of a common length
/// (set by the narrower transition band). Falls back to a plain highpass
/// when `h_freq` is at Nyquist.
pub fn design_bandpass(l_freq: f64, h_freq: f64, sfreq: f64) -> Vec<f64> {
    let l_tb = auto_trans_bandwidth(l_freq);
    let h_tb = auto_trans_bandwidth_high(h_freq, sfreq);
    if h_tb <= 0.0 {
        return design_highpass(l_freq, sfreq);
    }
    let n = auto_filter_length(l_tb.min(h_tb), sfreq);
    let upper = firwin(n, h_freq + h_tb / 2.0, sfreq, true);
    let lower = firwin(n, l_freq - l_tb / 2.0, sfreq, true);
    upper.iter().zip(&lower).map(|(u, l)| u - l).collect()
}

/// Zero-phase band-stop centred on `freq` (power-line notch).
///
/// Matches `mne.filter.notch_filter(method='fir')` defaults: stop width
/// `freq / 200`, 1 Hz transition bands.
pub fn design_notch(freq: f64, sfreq: f64) -> Vec<f64> {
    const TRANS_BW: f64 = 1.0;
    let half = freq / 400.0 + TRANS_BW / 2.0;
    let n = auto_filter_length(TRANS_BW, sfreq);
    let upper = firwin(n, freq + half, sfreq, true);
    let lower = firwin(n, (freq - half).max(0.0), sfreq, true);
    let mut h: Vec<f64> = upper.iter().zip(&lower).map(|(u, l)| -(u - l)).collect();
    h[n / 2] += 1.0;
    h
}

/// Hamming-windowed sinc of odd length `n`.
///
/// `pass_zero=true` gives a lowpass with unit DC gain, `false` the spectral
/// inversion (highpass). `cutoff_hz` is the -6 dB point; values at or above
/// Nyquist yield an all-pass.
pub fn firwin(n: usize, cutoff_hz: f64, sfreq: f64, pass_zero: bool) -> Vec<f64> {
    assert!(n % 2 == 1, "firwin requires odd N for linear-phase filter");
    let alpha = (n - 1) as f64 / 2.0;
    let nyq = sfreq / 2.0;
    let fc = (cutoff_hz / nyq).clamp(0.0, 1.0);

    let win = hamming(n);

    let mut h: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64 - alpha;
            // f(x) = sin(π·fc·x) / (π·x);  lim_{x→0} f(x) = fc
            let sinc = if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) };
            sinc * win[i]
        })
        .collect();

    // Unit DC gain. A zero cutoff has nothing to normalise.
    let s: f64 = h.iter().sum();
    if s.abs() > f64::EPSILON {
        h.iter_mut().for_each(|v| *v /= s);
    }

    if !pass_zero {
        h.iter_mut().for_each(|v| *v = -*v);
        h[n / 2] += 1.0;
    }

    h
}

/// Hamming window of length `n`.
pub fn hamming(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}
