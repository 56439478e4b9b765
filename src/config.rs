//! Analysis configuration.
//!
//! [`AnalysisConfig`] holds every tunable parameter of a run. It is built once
//! and passed by reference into every stage; nothing reads defaults from
//! process-wide state.
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which denoising pipelines to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Classical,
    Eigen,
    Both,
}

/// Re-referencing applied before filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceMode {
    /// Subtract the mean of all retained channels at each time point.
    Average,
    /// Subtract the named channel from every channel.
    Channel(String),
    /// Leave the data as recorded.
    None,
}

/// How the eigen pipeline splits eigenpairs into signal and noise subspaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdStrategy {
    /// Keep directions whose eigenvalue is strictly greater than 1.
    FixedOne,
    /// Keep directions up to the knee of the sorted eigenvalue curve.
    KneeDetection,
}

/// A frequency band in Hz. `high = None` leaves the upper edge open
/// (highpass only).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub low: f64,
    pub high: Option<f64>,
}

impl Band {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high: Some(high) }
    }

    pub const fn above(low: f64) -> Self {
        Self { low, high: None }
    }

    fn validate(&self, name: &str, nyquist: f64) -> Result<()> {
        if !(self.low.is_finite() && self.low > 0.0) {
            return Err(Error::Configuration(format!(
                "{name}: lower edge must be positive, got {}",
                self.low
            )));
        }
        if self.low >= nyquist {
            return Err(Error::Configuration(format!(
                "{name}: lower edge {} Hz is not below Nyquist ({nyquist} Hz)",
                self.low
            )));
        }
        if let Some(high) = self.high {
            if high <= self.low {
                return Err(Error::Configuration(format!(
                    "{name}: upper edge {high} Hz must exceed lower edge {} Hz",
                    self.low
                )));
            }
            if high > nyquist {
                return Err(Error::Configuration(format!(
                    "{name}: upper edge {high} Hz exceeds Nyquist ({nyquist} Hz)"
                )));
            }
        }
        Ok(())
    }
}

/// Configuration for a full quality-assessment and comparison run.
///
/// Construct with struct-update syntax:
///
/// ```
/// use exgq::{AnalysisConfig, Method};
///
/// let cfg = AnalysisConfig {
///     method: Method::Eigen,
///     notch_freq: Some(50.0),   // European mains
///     ..AnalysisConfig::default()
/// };
/// assert!(cfg.validate(256.0).is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Pipelines to run. Default: [`Method::Both`].
    pub method: Method,

    /// Lower edge of the conditioning bandpass in Hz. Default: `1.0`.
    pub low_freq: f64,

    /// Upper edge of the conditioning bandpass in Hz. Default: `80.0`.
    pub high_freq: f64,

    /// Power-line notch frequency in Hz, `None` to skip. Default: `60.0`.
    pub notch_freq: Option<f64>,

    /// Reference applied before filtering. Default: average.
    pub reference: ReferenceMode,

    /// ASR rejection cutoff in standard deviations. Default: `15.0`.
    pub asr_cutoff: f64,

    /// Length of the leading segment used for ASR calibration, in seconds.
    /// The whole recording is used when it is shorter. Default: `30.0`.
    pub asr_calibration_secs: f64,

    /// Seed for the ICA decomposition. Default: `42`.
    pub ica_seed: u64,

    /// FastICA iteration cap. Default: `500`.
    pub ica_max_iter: usize,

    /// FastICA convergence tolerance. Default: `1e-4`.
    pub ica_tolerance: f64,

    /// A component labelled "brain" with probability at or below this value
    /// is excluded. Default: `0.8`.
    pub exclusion_probability_threshold: f64,

    /// Also exclude every component the classifier labels as an artifact.
    /// Default: `false`.
    pub exclude_artifact_labels: bool,

    /// Band whose covariance defines the signal subspace. Default: 1–40 Hz.
    pub signal_band: Band,

    /// Band whose covariance (plus derivative energy) defines the noise
    /// subspace. Default: above 40 Hz.
    pub noise_band: Band,

    /// Weight of the first-difference covariance added to the noise-band
    /// covariance. Default: `0.5`.
    pub noise_derivative_weight: f64,

    /// Eigenvalue threshold strategy. Default: [`ThresholdStrategy::FixedOne`].
    pub eigenvalue_threshold_strategy: ThresholdStrategy,

    /// Composite-score difference below which the comparison is a tie.
    /// Default: `1.0` point.
    pub tie_epsilon: f64,

    /// Compute the mean pairwise channel correlation (and score it).
    /// Default: `true`.
    pub channel_correlation: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            method: Method::Both,
            low_freq: 1.0,
            high_freq: 80.0,
            notch_freq: Some(60.0),
            reference: ReferenceMode::Average,
            asr_cutoff: 15.0,
            asr_calibration_secs: 30.0,
            ica_seed: 42,
            ica_max_iter: 500,
            ica_tolerance: 1e-4,
            exclusion_probability_threshold: 0.8,
            exclude_artifact_labels: false,
            signal_band: Band::new(1.0, 40.0),
            noise_band: Band::above(40.0),
            noise_derivative_weight: 0.5,
            eigenvalue_threshold_strategy: ThresholdStrategy::FixedOne,
            tie_epsilon: 1.0,
            channel_correlation: true,
        }
    }
}

impl AnalysisConfig {
    /// Check every parameter against the recording's sampling rate.
    pub fn validate(&self, sfreq: f64) -> Result<()> {
        if !(sfreq.is_finite() && sfreq > 0.0) {
            return Err(Error::Configuration(format!("sampling rate must be positive, got {sfreq}")));
        }
        let nyquist = sfreq / 2.0;

        if !(self.low_freq.is_finite() && self.low_freq > 0.0) {
            return Err(Error::Configuration(format!(
                "low_freq must be positive, got {}",
                self.low_freq
            )));
        }
        if self.low_freq >= self.high_freq {
            return Err(Error::Configuration(format!(
                "low_freq ({}) must be below high_freq ({})",
                self.low_freq, self.high_freq
            )));
        }
        if self.high_freq > nyquist {
            return Err(Error::Configuration(format!(
                "high_freq {} Hz exceeds Nyquist ({nyquist} Hz)",
                self.high_freq
            )));
        }
        if let Some(notch) = self.notch_freq {
            if !(notch.is_finite() && notch > 0.0) || notch > nyquist {
                return Err(Error::Configuration(format!(
                    "notch_freq {notch} Hz must lie in (0, {nyquist}] Hz"
                )));
            }
        }
        if !(self.asr_cutoff.is_finite() && self.asr_cutoff > 0.0) {
            return Err(Error::Configuration(format!(
                "asr_cutoff must be positive, got {}",
                self.asr_cutoff
            )));
        }
        if !(self.asr_calibration_secs.is_finite() && self.asr_calibration_secs > 0.0) {
            return Err(Error::Configuration(format!(
                "asr_calibration_secs must be positive, got {}",
                self.asr_calibration_secs
            )));
        }
        if self.ica_max_iter == 0 || !(self.ica_tolerance.is_finite() && self.ica_tolerance > 0.0) {
            return Err(Error::Configuration(
                "ica_max_iter and ica_tolerance must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.exclusion_probability_threshold) {
            return Err(Error::Configuration(format!(
                "exclusion_probability_threshold must lie in [0, 1], got {}",
                self.exclusion_probability_threshold
            )));
        }
        self.signal_band.validate("signal_band", nyquist)?;
        self.noise_band.validate("noise_band", nyquist)?;
        if !(self.noise_derivative_weight.is_finite() && self.noise_derivative_weight >= 0.0) {
            return Err(Error::Configuration(format!(
                "noise_derivative_weight must be non-negative, got {}",
                self.noise_derivative_weight
            )));
        }
        if !(self.tie_epsilon.is_finite() && self.tie_epsilon >= 0.0) {
            return Err(Error::Configuration(format!(
                "tie_epsilon must be non-negative, got {}",
                self.tie_epsilon
            )));
        }
        Ok(())
    }
}
