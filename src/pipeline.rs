//! Orchestration: conditioning, denoising strategies, metrics, comparison.
//!
//! ```text
//! recording
//!   ├─ validate config ─ pick EEG ─→ raw metrics
//!   ├─ condition ───────────────────→ conditioned
//!   ├─ Denoiser::Classical ─→ cleaned ─→ metrics ┐
//!   ├─ Denoiser::Eigen     ─→ cleaned ─→ metrics ┤
//!   └─────────────────────────────────────────── compare ─→ AnalysisReport
//! ```
//!
//! A numerical failure in one method is recorded and the other method still
//! runs. Configuration and data errors, and cancellation, abort the file.
//! Progress is reported and cancellation checked only between stages.
use serde::Serialize;

use crate::capability::{Capabilities, CapabilityFlags, Completeness};
use crate::classical::{self, ClassicalReport};
use crate::compare::{compare, ComparisonReport, MethodKind, MethodMetrics};
use crate::condition::condition;
use crate::config::{AnalysisConfig, Method};
use crate::error::{Error, Result, Stage};
use crate::gevd::{self, EigenReport};
use crate::metrics::{MetricsOptions, QualityMetricsSet};
use crate::recording::RecordingMatrix;

// ── Observer ─────────────────────────────────────────────────────────────────

/// Receives stage-boundary progress and may cancel the run.
pub trait StageObserver {
    /// `method` is `None` for stages outside the denoisers.
    fn stage_finished(&mut self, _method: Option<MethodKind>, _stage: Stage) {}

    /// Polled after every stage; `true` aborts with [`Error::Cancelled`].
    fn cancel_requested(&self) -> bool {
        false
    }
}

/// Observer that ignores progress and never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StageObserver for NoopObserver {}

fn checkpoint(
    observer: &mut dyn StageObserver,
    method: Option<MethodKind>,
    stage: Stage,
) -> Result<()> {
    log::debug!("[PIPELINE] {} done", stage);
    observer.stage_finished(method, stage);
    if observer.cancel_requested() {
        log::info!("[PIPELINE] cancelled after {stage}");
        return Err(Error::Cancelled(stage));
    }
    Ok(())
}

// ── Denoising strategies ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodDetail {
    Classical(ClassicalReport),
    Eigen(EigenReport),
}

/// Output of one denoiser.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DenoiseOutcome {
    pub method: MethodKind,
    #[serde(skip)]
    pub cleaned: RecordingMatrix,
    pub completeness: Completeness,
    pub detail: MethodDetail,
}

pub struct ClassicalDenoiser<'a> {
    cfg: &'a AnalysisConfig,
    caps: &'a Capabilities,
}

pub struct EigenDenoiser<'a> {
    cfg: &'a AnalysisConfig,
    caps: &'a Capabilities,
}

/// A denoising strategy, chosen once per run.
pub enum Denoiser<'a> {
    Classical(ClassicalDenoiser<'a>),
    Eigen(EigenDenoiser<'a>),
}

impl<'a> Denoiser<'a> {
    pub fn classical(cfg: &'a AnalysisConfig, caps: &'a Capabilities) -> Self {
        Denoiser::Classical(ClassicalDenoiser { cfg, caps })
    }

    pub fn eigen(cfg: &'a AnalysisConfig, caps: &'a Capabilities) -> Self {
        Denoiser::Eigen(EigenDenoiser { cfg, caps })
    }

    /// Strategies selected by `cfg.method`, classical first.
    pub fn for_method(cfg: &'a AnalysisConfig, caps: &'a Capabilities) -> Vec<Self> {
        match cfg.method {
            Method::Classical => vec![Self::classical(cfg, caps)],
            Method::Eigen => vec![Self::eigen(cfg, caps)],
            Method::Both => vec![Self::classical(cfg, caps), Self::eigen(cfg, caps)],
        }
    }

    pub fn kind(&self) -> MethodKind {
        match self {
            Denoiser::Classical(_) => MethodKind::Classical,
            Denoiser::Eigen(_) => MethodKind::Eigen,
        }
    }

    /// Denoise a conditioned recording.
    pub fn denoise(&self, conditioned: &RecordingMatrix) -> Result<DenoiseOutcome> {
        self.denoise_with(conditioned, &mut |_| Ok(()))
    }

    /// Like [`denoise`](Self::denoise), calling `checkpoint` after each
    /// internal stage.
    pub fn denoise_with(
        &self,
        conditioned: &RecordingMatrix,
        checkpoint: &mut dyn FnMut(Stage) -> Result<()>,
    ) -> Result<DenoiseOutcome> {
        let (cleaned, completeness, detail) = match self {
            Denoiser::Classical(d) => {
                let (data, report) = classical::denoise(conditioned, d.cfg, d.caps, checkpoint)?;
                let completeness = Completeness::from_missing(report.skipped.clone());
                (data, completeness, MethodDetail::Classical(report))
            }
            Denoiser::Eigen(d) => {
                let (data, report) = gevd::denoise(
                    conditioned.view(),
                    conditioned.sfreq(),
                    d.cfg,
                    d.caps.filter.as_ref(),
                    checkpoint,
                )?;
                (data, Completeness::Complete, MethodDetail::Eigen(report))
            }
        };
        Ok(DenoiseOutcome {
            method: self.kind(),
            cleaned: conditioned.with_data(cleaned)?,
            completeness,
            detail,
        })
    }
}

// ── Reports ──────────────────────────────────────────────────────────────────

/// A method that ran to completion, with the metrics of its output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodRun {
    pub outcome: DenoiseOutcome,
    pub metrics: QualityMetricsSet,
}

/// A method that failed while the rest of the analysis continued.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodFailure {
    pub method: MethodKind,
    pub message: String,
    #[serde(skip)]
    pub error: Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    raw_metrics: QualityMetricsSet,
    runs: Vec<MethodRun>,
    failures: Vec<MethodFailure>,
    comparison: ComparisonReport,
}

impl AnalysisReport {
    pub fn raw_metrics(&self) -> &QualityMetricsSet {
        &self.raw_metrics
    }

    pub fn runs(&self) -> &[MethodRun] {
        &self.runs
    }

    pub fn run(&self, method: MethodKind) -> Option<&MethodRun> {
        self.runs.iter().find(|r| r.outcome.method == method)
    }

    pub fn failures(&self) -> &[MethodFailure] {
        &self.failures
    }

    pub fn failure(&self, method: MethodKind) -> Option<&MethodFailure> {
        self.failures.iter().find(|f| f.method == method)
    }

    pub fn comparison(&self) -> &ComparisonReport {
        &self.comparison
    }
}

/// Result for one source of a batch.
#[derive(Debug)]
pub struct FileOutcome<S> {
    pub source: S,
    pub result: Result<AnalysisReport>,
}

// ── Analyzer ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Analyzer {
    config: AnalysisConfig,
    capabilities: Capabilities,
    flags: CapabilityFlags,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig, capabilities: Capabilities) -> Self {
        let flags = capabilities.flags();
        let missing = flags.missing();
        if missing.is_empty() {
            log::info!("[PIPELINE] all capabilities available");
        } else {
            log::info!("[PIPELINE] capabilities unavailable: {missing:?}");
        }
        Self { config, capabilities, flags }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn flags(&self) -> CapabilityFlags {
        self.flags
    }

    fn metrics_options(&self) -> MetricsOptions {
        MetricsOptions { channel_correlation: self.config.channel_correlation }
    }

    pub fn analyze(&self, recording: &RecordingMatrix) -> Result<AnalysisReport> {
        self.analyze_observed(recording, &mut NoopObserver)
    }

    pub fn analyze_observed(
        &self,
        recording: &RecordingMatrix,
        observer: &mut dyn StageObserver,
    ) -> Result<AnalysisReport> {
        let cfg = &self.config;
        cfg.validate(recording.sfreq())?;
        checkpoint(observer, None, Stage::Validation)?;

        let raw = recording.pick_eeg()?;
        let raw_metrics = QualityMetricsSet::compute(&raw, self.metrics_options());
        log::info!(
            "[PIPELINE] raw: score {:.1} ({})",
            raw_metrics.score(),
            raw_metrics.grade()
        );
        drop(raw);
        checkpoint(observer, None, Stage::Metrics)?;

        let conditioned = condition(recording, cfg, self.capabilities.filter.as_ref())?;
        checkpoint(observer, None, Stage::Conditioning)?;

        let mut runs = Vec::new();
        let mut failures = Vec::new();
        for denoiser in Denoiser::for_method(cfg, &self.capabilities) {
            let kind = denoiser.kind();
            log::info!("[PIPELINE] running {kind} denoising");
            let outcome = denoiser
                .denoise_with(&conditioned, &mut |stage| checkpoint(observer, Some(kind), stage));
            match outcome {
                Ok(outcome) => {
                    let metrics = QualityMetricsSet::compute(&outcome.cleaned, self.metrics_options());
                    log::info!(
                        "[PIPELINE] {kind}: score {:.1} ({}), {}",
                        metrics.score(),
                        metrics.grade(),
                        outcome.completeness
                    );
                    checkpoint(observer, Some(kind), Stage::Metrics)?;
                    runs.push(MethodRun { outcome, metrics });
                }
                Err(e) if !e.is_fatal_for_file() => {
                    log::error!("[PIPELINE] {kind} failed: {e}");
                    failures.push(MethodFailure { method: kind, message: e.to_string(), error: e });
                }
                Err(e) => return Err(e),
            }
        }

        let method_metrics = |kind: MethodKind| {
            runs.iter().find(|r| r.outcome.method == kind).map(|r| MethodMetrics {
                metrics: &r.metrics,
                completeness: &r.outcome.completeness,
            })
        };
        let comparison = compare(
            &raw_metrics,
            method_metrics(MethodKind::Classical),
            method_metrics(MethodKind::Eigen),
            cfg.tie_epsilon,
        );
        checkpoint(observer, None, Stage::Comparison)?;

        Ok(AnalysisReport { raw_metrics, runs, failures, comparison })
    }

    /// Analyze each source in turn. A failing source never stops the batch.
    pub fn analyze_batch<S, I, F>(&self, sources: I, mut loader: F) -> Vec<FileOutcome<S>>
    where
        I: IntoIterator<Item = S>,
        F: FnMut(&S) -> Result<RecordingMatrix>,
    {
        sources
            .into_iter()
            .map(|source| {
                let result = loader(&source).and_then(|rec| self.analyze(&rec));
                if let Err(e) = &result {
                    log::warn!("[PIPELINE] source failed: {e}");
                }
                FileOutcome { source, result }
            })
            .collect()
    }
}
