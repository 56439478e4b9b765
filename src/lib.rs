//! # exgq — EEG quality assessment and denoising comparison
//!
//! `exgq` scores the quality of a multichannel EEG recording and compares two
//! denoising strategies on it: a classical artifact-subspace / ICA pipeline
//! and an eigen-subspace (generalized eigenvalue) pipeline.
//!
//! ## Pipeline overview
//!
//! ```text
//! RecordingMatrix [C, N]
//!   │
//!   ├─ metrics (raw, EEG channels)            SNR, PSD slope, artifacts, …
//!   │
//!   ├─ condition()      pick EEG → reference → bandpass → notch
//!   │     │
//!   │     ├─ Denoiser::Classical   ASR → ICA → classify → exclude → project
//!   │     └─ Denoiser::Eigen       S/R covariances → GEVD → λ threshold
//!   │              │
//!   │              └─ metrics (each cleaned output)
//!   │
//!   └─ compare()        deltas, direction-aware improvement %, winner
//!        │
//!        └─→ AnalysisReport
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use exgq::{Analyzer, AnalysisConfig, Capabilities, RecordingMatrix};
//! use ndarray::Array2;
//!
//! let data: Array2<f64> = Array2::zeros((8, 256 * 60));
//! let names = (1..=8).map(|i| format!("EEG{i}")).collect();
//! let recording = RecordingMatrix::new(data, 256.0, names).unwrap();
//!
//! let analyzer = Analyzer::new(AnalysisConfig::default(), Capabilities::builtin());
//! let report = analyzer.analyze(&recording).unwrap();
//!
//! println!("{}", report.raw_metrics().render_report());
//! println!("{}", report.comparison().render());
//! ```
//!
//! ## Capabilities
//!
//! ASR and ICA component classification are not part of the crate. Plug
//! them in through [`ArtifactSubspace`] and [`ComponentClassifier`]; when
//! absent, the classical pipeline skips the corresponding stages and marks
//! its result [`Completeness::Partial`].

pub mod capability;
pub mod classical;
pub mod compare;
pub mod condition;
pub mod config;
pub mod error;
pub mod filter;
pub mod gevd;
pub mod ica;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod recording;
pub mod reference;
pub mod spectrum;
pub mod stats;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// capability
pub use capability::{
    ArtifactSubspace, Capabilities, CapabilityFlags, ComponentClass, ComponentClassifier,
    ComponentLabel, Completeness, Decomposer, Decomposition, DecompositionParams, StageOutcome,
    SubspaceModel,
};

// config
pub use config::{AnalysisConfig, Band, Method, ReferenceMode, ThresholdStrategy};

// error
pub use error::{Capability, Error, Result, Stage};

// recording
pub use recording::{ChannelKind, RecordingMatrix};

// filter
pub use filter::{FirFilter, SignalFilter};

// conditioning & pipelines
pub use classical::{excluded_components, ClassicalReport};
pub use condition::condition;
pub use gevd::{CovariancePair, EigenReport, EigenSystem};
pub use ica::FastIcaDecomposer;

// metrics & comparison
pub use compare::{compare, ComparisonReport, MethodKind, MetricComparison, Winner};
pub use metrics::{metrics, Grade, Metric, MetricsOptions, PsdQuality, QualityMetricsSet};

// orchestration
pub use pipeline::{
    AnalysisReport, Analyzer, DenoiseOutcome, Denoiser, FileOutcome, MethodDetail, NoopObserver,
    StageObserver,
};

/// Analyze one recording with the built-in capabilities.
///
/// Shorthand for `Analyzer::new(cfg.clone(), Capabilities::builtin()).analyze(recording)`.
///
/// # Errors
///
/// * [`Error::Configuration`] if `cfg` is invalid for the recording's
///   sampling rate.
/// * [`Error::Data`] if the recording has no EEG channels.
///
/// A numerical failure inside one denoising method does not fail the call;
/// it is reported in [`AnalysisReport::failures`].
pub fn analyze(recording: &RecordingMatrix, cfg: &AnalysisConfig) -> Result<AnalysisReport> {
    Analyzer::new(cfg.clone(), Capabilities::builtin()).analyze(recording)
}
