//! Classical denoising: artifact-subspace reconstruction followed by ICA with
//! probability-gated component exclusion.
//!
//! ```text
//! Calibrating ─→ Reconstructing ─→ Decomposing ─→ Classifying
//!      (ASR on first asr_calibration_secs)            │
//!                       Done ←─ ProjectingBack ←─ ExcludingComponents
//! ```
//!
//! ASR, decomposition and classification are external capabilities. A
//! missing one skips its stage (and the stages that need its output), and the
//! skip is recorded in [`ClassicalReport::skipped`].
//!
//! ICA extracts as many components as the data has dimensions
//! ([`numerical_rank`]), which is `C − 1` after average referencing.
use ndarray::{Array2, ArrayView2};
use serde::Serialize;

use crate::capability::{
    Capabilities, ComponentLabel, Decomposer, Decomposition, DecompositionParams, StageOutcome,
};
use crate::config::AnalysisConfig;
use crate::error::{Capability, Error, Result, Stage};
use crate::ica::numerical_rank;
use crate::recording::RecordingMatrix;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassicalReport {
    /// Whether ASR reconstruction ran.
    pub asr_applied: bool,
    /// Length of the ASR calibration window actually used.
    pub calibration_secs: f64,
    /// Components extracted: the numerical rank of the ASR output.
    pub n_components: usize,
    /// Seed of the successful decomposition (`ica_seed`, or `ica_seed + 1`
    /// after a retry).
    pub seed_used: Option<u64>,
    pub labels: Vec<ComponentLabel>,
    /// Sorted indices of excluded components.
    pub excluded: Vec<usize>,
    pub skipped: Vec<Capability>,
}

// ── Exclusion policy ─────────────────────────────────────────────────────────

/// Components to zero before back-projection.
///
/// A component is excluded when it is labelled brain with probability at most
/// `threshold`. With `exclude_artifact_labels`, every component carrying an
/// artifact label is excluded as well.
pub fn excluded_components(
    labels: &[ComponentLabel],
    threshold: f64,
    exclude_artifact_labels: bool,
) -> Vec<usize> {
    let mut out: Vec<usize> = labels
        .iter()
        .filter(|l| {
            let weak_brain = !l.class.is_artifact() && l.probability <= threshold;
            weak_brain || (exclude_artifact_labels && l.class.is_artifact())
        })
        .map(|l| l.index)
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

// ── Stages ───────────────────────────────────────────────────────────────────

fn reconstruct_artifacts(
    conditioned: &RecordingMatrix,
    cfg: &AnalysisConfig,
    caps: &Capabilities,
    checkpoint: &mut dyn FnMut(Stage) -> Result<()>,
) -> Result<StageOutcome<Array2<f64>>> {
    let Some(asr) = caps.asr.as_deref() else {
        log::warn!("[CLASSICAL] ASR unavailable; calibration and reconstruction skipped");
        return Ok(StageOutcome::Degraded {
            value: conditioned.data().clone(),
            missing: vec![Capability::ArtifactSubspace],
        });
    };

    let calibration = conditioned.head_secs(cfg.asr_calibration_secs);
    log::info!(
        "[CLASSICAL] calibrating ASR on {} samples, cutoff {} SD",
        calibration.ncols(),
        cfg.asr_cutoff
    );
    let model = asr.calibrate(calibration, conditioned.sfreq(), cfg.asr_cutoff)?;
    checkpoint(Stage::Calibrating)?;

    let cleaned = model.reconstruct(conditioned.view())?;
    if cleaned.dim() != conditioned.data().dim() {
        return Err(Error::numerical(
            Stage::Reconstructing,
            format!(
                "ASR returned shape {:?}, expected {:?}",
                cleaned.dim(),
                conditioned.data().dim()
            ),
        ));
    }
    if cleaned.iter().any(|v| !v.is_finite()) {
        return Err(Error::numerical(Stage::Reconstructing, "ASR produced non-finite samples"));
    }
    checkpoint(Stage::Reconstructing)?;
    Ok(StageOutcome::Complete(cleaned))
}

/// Decompose with `params.seed`; on a numerical failure retry once with the
/// next seed.
fn decompose_with_retry(
    decomposer: &dyn Decomposer,
    data: ArrayView2<'_, f64>,
    params: DecompositionParams,
) -> Result<(Decomposition, u64)> {
    match decomposer.decompose(data, &params) {
        Ok(d) => Ok((d, params.seed)),
        Err(Error::Numerical { message, .. }) => {
            let seed = params.seed.wrapping_add(1);
            log::warn!("[CLASSICAL] decomposition failed ({message}); retrying with seed {seed}");
            let retry = DecompositionParams { seed, ..params };
            match decomposer.decompose(data, &retry) {
                Ok(d) => Ok((d, seed)),
                Err(Error::Numerical { message, .. }) => Err(Error::numerical(
                    Stage::Decomposing,
                    format!("no convergence after retry: {message}"),
                )),
                Err(e) => Err(e),
            }
        }
        Err(e) => Err(e),
    }
}

fn check_labels(labels: &[ComponentLabel], n_components: usize) -> Result<()> {
    if labels.len() != n_components {
        return Err(Error::numerical(
            Stage::Classifying,
            format!("{} labels for {n_components} components", labels.len()),
        ));
    }
    if let Some(l) = labels
        .iter()
        .find(|l| l.index >= n_components || !(0.0..=1.0).contains(&l.probability))
    {
        return Err(Error::numerical(
            Stage::Classifying,
            format!("invalid label for component {}: p = {}", l.index, l.probability),
        ));
    }
    Ok(())
}

/// Decompose, classify, exclude and back-project. Skipped as a whole when
/// the decomposer or the classifier is missing, since no component can be
/// excluded without both.
fn remove_components(
    asr_output: RecordingMatrix,
    cfg: &AnalysisConfig,
    caps: &Capabilities,
    report: &mut ClassicalReport,
    checkpoint: &mut dyn FnMut(Stage) -> Result<()>,
) -> Result<StageOutcome<Array2<f64>>> {
    let (decomposer, classifier) = match (caps.decomposer.as_deref(), caps.classifier.as_deref()) {
        (Some(d), Some(c)) => (d, c),
        (d, c) => {
            let mut missing = Vec::new();
            if d.is_none() {
                missing.push(Capability::Decomposition);
            }
            if c.is_none() {
                missing.push(Capability::ComponentClassification);
            }
            log::warn!("[CLASSICAL] {missing:?} unavailable; ICA stages skipped");
            return Ok(StageOutcome::Degraded { value: asr_output.into_data(), missing });
        }
    };

    // Average referencing removes one dimension; asking for more components
    // than the data spans breaks `data = mean + A·S`.
    let rank = numerical_rank(asr_output.view());
    if rank < asr_output.n_channels() {
        log::info!(
            "[CLASSICAL] data rank {rank} < {} channels; decomposing {rank} components",
            asr_output.n_channels()
        );
    }
    let params = DecompositionParams {
        n_components: rank,
        seed: cfg.ica_seed,
        max_iter: cfg.ica_max_iter,
        tolerance: cfg.ica_tolerance,
    };
    log::info!("[CLASSICAL] ICA: {} components, seed {}", params.n_components, params.seed);
    let (decomposition, seed) = decompose_with_retry(decomposer, asr_output.view(), params)?;
    report.n_components = decomposition.n_components();
    report.seed_used = Some(seed);
    checkpoint(Stage::Decomposing)?;

    let labels = classifier.classify(&asr_output, &decomposition)?;
    check_labels(&labels, decomposition.n_components())?;
    checkpoint(Stage::Classifying)?;

    let excluded = excluded_components(
        &labels,
        cfg.exclusion_probability_threshold,
        cfg.exclude_artifact_labels,
    );
    log::info!("[CLASSICAL] excluding components {excluded:?}");
    report.labels = labels;
    checkpoint(Stage::ExcludingComponents)?;

    let cleaned = if excluded.is_empty() {
        asr_output.into_data()
    } else {
        decomposition.project_back(&excluded)
    };
    report.excluded = excluded;
    checkpoint(Stage::ProjectingBack)?;

    Ok(StageOutcome::Complete(cleaned))
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

/// Run the classical pipeline on a conditioned recording.
pub fn denoise(
    conditioned: &RecordingMatrix,
    cfg: &AnalysisConfig,
    caps: &Capabilities,
    checkpoint: &mut dyn FnMut(Stage) -> Result<()>,
) -> Result<(Array2<f64>, ClassicalReport)> {
    let mut report = ClassicalReport {
        asr_applied: false,
        calibration_secs: 0.0,
        n_components: 0,
        seed_used: None,
        labels: Vec::new(),
        excluded: Vec::new(),
        skipped: Vec::new(),
    };

    let asr = reconstruct_artifacts(conditioned, cfg, caps, checkpoint)?;
    if asr.is_complete() {
        report.asr_applied = true;
        report.calibration_secs =
            conditioned.head_secs(cfg.asr_calibration_secs).ncols() as f64 / conditioned.sfreq();
    }
    report.skipped.extend_from_slice(asr.missing());
    let asr_output = conditioned.with_data(asr.into_value())?;

    let ica = remove_components(asr_output, cfg, caps, &mut report, checkpoint)?;
    report.skipped.extend_from_slice(ica.missing());

    Ok((ica.into_value(), report))
}
