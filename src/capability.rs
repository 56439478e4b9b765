//! External processing capabilities consumed by the denoising pipelines.
//!
//! Filtering, artifact-subspace reconstruction (ASR), independent-component
//! decomposition and component classification are reached through the
//! traits below rather than implemented inside the pipelines. Which of them
//! are present is decided once, when a [`Capabilities`] bundle is built; the
//! pipelines read the resulting [`CapabilityFlags`] instead of probing.
//!
//! ```text
//! Capabilities
//!   ├─ filter      : Box<dyn SignalFilter>          always present
//!   ├─ asr         : Option<Box<dyn ArtifactSubspace>>
//!   ├─ decomposer  : Option<Box<dyn Decomposer>>     FastICA built in
//!   └─ classifier  : Option<Box<dyn ComponentClassifier>>
//! ```
use std::fmt;

use ndarray::{Array1, Array2, ArrayView2};
use serde::Serialize;

use crate::error::{Capability, Result};
use crate::filter::{FirFilter, SignalFilter};
use crate::ica::FastIcaDecomposer;
use crate::recording::RecordingMatrix;

// ── Artifact subspace reconstruction ─────────────────────────────────────────

/// Calibrates an ASR model on (ideally clean) calibration data.
pub trait ArtifactSubspace: Send + Sync {
    /// `calibration` is `[C, N_cal]`; `cutoff` is the rejection threshold in
    /// standard deviations.
    fn calibrate(
        &self,
        calibration: ArrayView2<'_, f64>,
        sfreq: f64,
        cutoff: f64,
    ) -> Result<Box<dyn SubspaceModel>>;
}

/// A calibrated ASR model.
pub trait SubspaceModel: Send + Sync {
    /// Reconstruct windows whose subspace energy exceeds the calibrated
    /// threshold. Must return the same `[C, N]` shape it was given.
    fn reconstruct(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>>;
}

// ── Decomposition ────────────────────────────────────────────────────────────

/// Parameters for one decomposition run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecompositionParams {
    pub n_components: usize,
    pub seed: u64,
    pub max_iter: usize,
    pub tolerance: f64,
}

/// Sources, mixing matrix and channel means such that
/// `data ≈ mean + mixing · sources`.
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    /// `[k, N]`
    pub sources: Array2<f64>,
    /// `[C, k]`
    pub mixing: Array2<f64>,
    /// `[C]`
    pub mean: Array1<f64>,
}

impl Decomposition {
    pub fn n_components(&self) -> usize {
        self.sources.nrows()
    }

    /// Back-project to channel space with the `excluded` components zeroed.
    pub fn project_back(&self, excluded: &[usize]) -> Array2<f64> {
        let mut sources = self.sources.clone();
        for &k in excluded {
            if k < sources.nrows() {
                sources.row_mut(k).fill(0.0);
            }
        }
        let mut out = self.mixing.dot(&sources);
        for (mut row, &m) in out.rows_mut().into_iter().zip(self.mean.iter()) {
            row += m;
        }
        out
    }
}

/// Independent-component decomposition.
pub trait Decomposer: Send + Sync {
    /// Factor `data` (`[C, N]`) into `params.n_components` components.
    /// Identical data and seed must give identical components in identical
    /// order.
    fn decompose(
        &self,
        data: ArrayView2<'_, f64>,
        params: &DecompositionParams,
    ) -> Result<Decomposition>;
}

// ── Component classification ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentClass {
    Brain,
    Muscle,
    EyeBlink,
    HeartBeat,
    LineNoise,
    ChannelNoise,
    Other,
}

impl ComponentClass {
    pub fn is_artifact(self) -> bool {
        self != ComponentClass::Brain
    }
}

impl fmt::Display for ComponentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ComponentClass::Brain => "brain",
            ComponentClass::Muscle => "muscle artifact",
            ComponentClass::EyeBlink => "eye blink",
            ComponentClass::HeartBeat => "heart beat",
            ComponentClass::LineNoise => "line noise",
            ComponentClass::ChannelNoise => "channel noise",
            ComponentClass::Other => "other",
        })
    }
}

/// Predicted class of one component, with probability in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComponentLabel {
    pub index: usize,
    pub class: ComponentClass,
    pub probability: f64,
}

pub trait ComponentClassifier: Send + Sync {
    /// One label per component of `decomposition`, in component order.
    fn classify(
        &self,
        recording: &RecordingMatrix,
        decomposition: &Decomposition,
    ) -> Result<Vec<ComponentLabel>>;
}

// ── Bundle & flags ───────────────────────────────────────────────────────────

/// Which optional capabilities are present; fixed for the lifetime of an
/// analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityFlags {
    pub artifact_subspace: bool,
    pub decomposition: bool,
    pub component_classification: bool,
}

impl CapabilityFlags {
    pub fn missing(&self) -> Vec<Capability> {
        let mut out = Vec::new();
        if !self.artifact_subspace {
            out.push(Capability::ArtifactSubspace);
        }
        if !self.decomposition {
            out.push(Capability::Decomposition);
        }
        if !self.component_classification {
            out.push(Capability::ComponentClassification);
        }
        out
    }
}

pub struct Capabilities {
    pub filter: Box<dyn SignalFilter>,
    pub asr: Option<Box<dyn ArtifactSubspace>>,
    pub decomposer: Option<Box<dyn Decomposer>>,
    pub classifier: Option<Box<dyn ComponentClassifier>>,
}

impl Capabilities {
    /// FIR filtering and FastICA. No ASR and no classifier ship with the
    /// crate; add them with [`with_asr`](Self::with_asr) and
    /// [`with_classifier`](Self::with_classifier).
    pub fn builtin() -> Self {
        Self {
            filter: Box::new(FirFilter),
            asr: None,
            decomposer: Some(Box::new(FastIcaDecomposer)),
            classifier: None,
        }
    }

    /// Filtering only.
    pub fn minimal() -> Self {
        Self { filter: Box::new(FirFilter), asr: None, decomposer: None, classifier: None }
    }

    pub fn with_filter(mut self, filter: impl SignalFilter + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    pub fn with_asr(mut self, asr: impl ArtifactSubspace + 'static) -> Self {
        self.asr = Some(Box::new(asr));
        self
    }

    pub fn with_decomposer(mut self, decomposer: impl Decomposer + 'static) -> Self {
        self.decomposer = Some(Box::new(decomposer));
        self
    }

    pub fn with_classifier(mut self, classifier: impl ComponentClassifier + 'static) -> Self {
        self.classifier = Some(Box::new(classifier));
        self
    }

    pub fn flags(&self) -> CapabilityFlags {
        CapabilityFlags {
            artifact_subspace: self.asr.is_some(),
            decomposition: self.decomposer.is_some(),
            component_classification: self.classifier.is_some(),
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities").field("flags", &self.flags()).finish()
    }
}

// ── Stage results ────────────────────────────────────────────────────────────

/// Result of a stage that depends on optional capabilities.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Complete(T),
    /// The stage was skipped; `value` is its input passed through.
    Degraded { value: T, missing: Vec<Capability> },
}

impl<T> StageOutcome<T> {
    pub fn into_value(self) -> T {
        match self {
            StageOutcome::Complete(v) | StageOutcome::Degraded { value: v, .. } => v,
        }
    }

    pub fn missing(&self) -> &[Capability] {
        match self {
            StageOutcome::Complete(_) => &[],
            StageOutcome::Degraded { missing, .. } => missing,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, StageOutcome::Complete(_))
    }
}

/// Whether a pipeline ran every stage or skipped some for lack of a
/// capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Completeness {
    Complete,
    Partial { missing: Vec<Capability> },
}

impl Completeness {
    pub fn from_missing(missing: Vec<Capability>) -> Self {
        if missing.is_empty() {
            Completeness::Complete
        } else {
            Completeness::Partial { missing }
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Completeness::Partial { .. })
    }
}

impl fmt::Display for Completeness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completeness::Complete => f.write_str("complete"),
            Completeness::Partial { missing } => {
                let names: Vec<String> = missing.iter().map(|c| c.to_string()).collect();
                write!(f, "partial (skipped: {})", names.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn project_back_without_exclusions_reconstructs() {
        let d = Decomposition {
            sources: array![[1.0, -1.0, 0.5], [0.0, 2.0, 1.0]],
            mixing: array![[1.0, 0.5], [0.0, 1.0]],
            mean: array![10.0, -1.0],
        };
        let x = d.project_back(&[]);
        assert_eq!(x, array![[11.0, 10.0, 11.0], [-1.0, 1.0, 0.0]]);
    }

    #[test]
    fn project_back_zeroes_excluded_component() {
        let d = Decomposition {
            sources: array![[1.0, 2.0], [3.0, 4.0]],
            mixing: array![[1.0, 1.0], [0.0, 1.0]],
            mean: array![0.0, 0.0],
        };
        let x = d.project_back(&[1, 7]);
        assert_eq!(x, array![[1.0, 2.0], [0.0, 0.0]]);
    }

    #[test]
    fn builtin_flags() {
        let flags = Capabilities::builtin().flags();
        assert!(flags.decomposition);
        assert!(!flags.artifact_subspace);
        assert_eq!(
            flags.missing(),
            vec![Capability::ArtifactSubspace, Capability::ComponentClassification]
        );
    }

    #[test]
    fn degraded_outcome_passes_input_through() {
        let out: StageOutcome<u8> =
            StageOutcome::Degraded { value: 3, missing: vec![Capability::ArtifactSubspace] };
        assert!(!out.is_complete());
        assert_eq!(out.missing(), &[Capability::ArtifactSubspace]);
        assert_eq!(out.into_value(), 3);

        let out = StageOutcome::Complete(5u8);
        assert!(out.missing().is_empty());
        assert_eq!(out.into_value(), 5);
    }
}
