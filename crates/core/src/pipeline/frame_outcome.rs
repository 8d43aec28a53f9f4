use std::fmt;

use thiserror::Error;

use crate::recognition::domain::decision_policy::{Decision, DecisionError};
use crate::recognition::domain::face_filter::{AdmittedFace, RejectionReason};
use crate::recognition::domain::face_preprocessor::PreprocessError;

/// Pipeline stage names, as used in timings and failure reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Detect,
    Filter,
    Preprocess,
    Embed,
    Classify,
    Decide,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Detect => "detect",
            Stage::Filter => "filter",
            Stage::Preprocess => "preprocess",
            Stage::Embed => "embed",
            Stage::Classify => "classify",
            Stage::Decide => "decide",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A per-frame failure in one of the inference stages. Never crosses the
/// frame boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageFailure {
    #[error("detection failed: {0}")]
    Detection(String),
    #[error("preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("embedding has {actual} values, earlier faces had {expected}")]
    EmbeddingLengthMismatch { expected: usize, actual: usize },
    #[error("classification failed: {0}")]
    Classification(String),
    #[error("decision failed: {0}")]
    Decision(#[from] DecisionError),
    #[error("{stage} stage panicked: {message}")]
    Panicked { stage: Stage, message: String },
}

impl StageFailure {
    pub fn stage(&self) -> Stage {
        match self {
            StageFailure::Detection(_) => Stage::Detect,
            StageFailure::Preprocess(_) => Stage::Preprocess,
            StageFailure::Embedding(_) | StageFailure::EmbeddingLengthMismatch { .. } => {
                Stage::Embed
            }
            StageFailure::Classification(_) => Stage::Classify,
            StageFailure::Decision(_) => Stage::Decide,
            StageFailure::Panicked { stage, .. } => *stage,
        }
    }

    /// Failures that point at a broken invariant between stages rather than
    /// a collaborator hiccup.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            StageFailure::Preprocess(_)
                | StageFailure::EmbeddingLengthMismatch { .. }
                | StageFailure::Decision(_)
                | StageFailure::Panicked { .. }
        )
    }
}

/// What happened to one frame.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    Rejected(RejectionReason),
    Decided {
        face: AdmittedFace,
        decision: Decision,
    },
    Failed(StageFailure),
}

/// Per-kind outcome counts over a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub no_face: usize,
    pub multiple_faces: usize,
    pub too_small: usize,
    pub recognized: usize,
    pub unknown: usize,
    pub failed: usize,
    pub contract_violations: usize,
}

impl OutcomeCounts {
    pub fn record(&mut self, outcome: &FrameOutcome) {
        match outcome {
            FrameOutcome::Rejected(RejectionReason::NoFace) => self.no_face += 1,
            FrameOutcome::Rejected(RejectionReason::MultipleFaces { .. }) => {
                self.multiple_faces += 1
            }
            FrameOutcome::Rejected(RejectionReason::TooSmall { .. }) => self.too_small += 1,
            FrameOutcome::Decided { decision, .. } if decision.is_confident() => {
                self.recognized += 1
            }
            FrameOutcome::Decided { .. } => self.unknown += 1,
            FrameOutcome::Failed(failure) => {
                self.failed += 1;
                if failure.is_contract_violation() {
                    self.contract_violations += 1;
                }
            }
        }
    }

    pub fn total(&self) -> usize {
        self.no_face
            + self.multiple_faces
            + self.too_small
            + self.recognized
            + self.unknown
            + self.failed
    }
}
