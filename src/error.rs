//! Error taxonomy for a single analysis run.
//!
//! Every error names the stage it came from so batch callers can attach it
//! to the file being processed. `Configuration` and `Data` abort the file,
//! `Numerical` fails only the method that raised it. A missing capability is
//! not an error: the stage is skipped and reported through
//! [`StageOutcome::Degraded`](crate::capability::StageOutcome).
use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Discrete processing stages. Progress, cancellation and errors are all
/// reported at this granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validation,
    Conditioning,
    // classical pipeline
    Calibrating,
    Reconstructing,
    Decomposing,
    Classifying,
    ExcludingComponents,
    ProjectingBack,
    // eigen pipeline
    Covariance,
    Eigendecomposition,
    Thresholding,
    SubspaceReconstruction,
    // reporting
    Metrics,
    Comparison,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Validation => "validation",
            Stage::Conditioning => "conditioning",
            Stage::Calibrating => "ASR calibration",
            Stage::Reconstructing => "ASR reconstruction",
            Stage::Decomposing => "ICA decomposition",
            Stage::Classifying => "component classification",
            Stage::ExcludingComponents => "component exclusion",
            Stage::ProjectingBack => "back-projection",
            Stage::Covariance => "covariance estimation",
            Stage::Eigendecomposition => "generalized eigendecomposition",
            Stage::Thresholding => "eigenvalue thresholding",
            Stage::SubspaceReconstruction => "subspace reconstruction",
            Stage::Metrics => "quality metrics",
            Stage::Comparison => "comparison",
        };
        f.write_str(s)
    }
}

/// Optional external capabilities the core calls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ArtifactSubspace,
    Decomposition,
    ComponentClassification,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capability::ArtifactSubspace => "artifact subspace reconstruction",
            Capability::Decomposition => "independent component decomposition",
            Capability::ComponentClassification => "component classification",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("invalid data: {0}")]
    Data(String),

    #[error("numerical failure during {stage}: {message}")]
    Numerical { stage: Stage, message: String },

    #[error("run cancelled after {0}")]
    Cancelled(Stage),
}

impl Error {
    pub(crate) fn numerical(stage: Stage, message: impl Into<String>) -> Self {
        Error::Numerical { stage, message: message.into() }
    }

    /// Whether this error aborts the whole file rather than a single method.
    pub fn is_fatal_for_file(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::Data(_) | Error::Cancelled(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
