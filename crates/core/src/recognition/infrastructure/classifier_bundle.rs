/// JSON classifier artifact: a label list plus a small probability model
/// over embeddings.
///
/// ```json
/// {"labels": ["Alice", "Bob"],
///  "model": {"kind": "linear", "weights": [[...], [...]], "bias": [0.1, -0.1]}}
/// ```
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recognition::domain::classifier::Classifier;
use crate::recognition::domain::embedding_extractor::Embedding;

const DEFAULT_CENTROID_SCALE: f64 = 10.0;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("failed to read classifier {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse classifier {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("classifier has no labels")]
    NoLabels,
    #[error("duplicate label: {0}")]
    DuplicateLabel(String),
    #[error("model has {rows} classes but {labels} labels")]
    ClassCountMismatch { rows: usize, labels: usize },
    #[error("model rows have inconsistent dimensions")]
    RaggedWeights,
    #[error("embedding has {actual} dimensions, model expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierModel {
    /// `softmax(W·x + b)`, one row of `W` per label.
    Linear { weights: Vec<Vec<f64>>, bias: Vec<f64> },
    /// `softmax(scale · cos(x, c_j))` over per-label centroids.
    Centroid {
        centroids: Vec<Vec<f64>>,
        #[serde(default = "default_centroid_scale")]
        scale: f64,
    },
}

fn default_centroid_scale() -> f64 {
    DEFAULT_CENTROID_SCALE
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifierBundle {
    pub labels: Vec<String>,
    pub model: ClassifierModel,
}

/// A validated [`ClassifierBundle`] ready for inference.
#[derive(Debug)]
pub struct BundleClassifier {
    labels: Vec<String>,
    model: ClassifierModel,
    dim: usize,
}

impl BundleClassifier {
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let text = fs::read_to_string(path).map_err(|source| ClassifierError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let bundle: ClassifierBundle =
            serde_json::from_str(&text).map_err(|source| ClassifierError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let classifier = Self::from_bundle(bundle)?;
        log::info!(
            "Loaded classifier {} ({} identities, {} dims)",
            path.display(),
            classifier.labels.len(),
            classifier.dim
        );
        Ok(classifier)
    }

    pub fn from_bundle(bundle: ClassifierBundle) -> Result<Self, ClassifierError> {
        let ClassifierBundle { labels, model } = bundle;
        if labels.is_empty() {
            return Err(ClassifierError::NoLabels);
        }
        let mut seen = HashSet::new();
        for label in &labels {
            if !seen.insert(label.as_str()) {
                return Err(ClassifierError::DuplicateLabel(label.clone()));
            }
        }

        let (rows, extra_len) = match &model {
            ClassifierModel::Linear { weights, bias } => (weights, Some(bias.len())),
            ClassifierModel::Centroid { centroids, .. } => (centroids, None),
        };
        if rows.len() != labels.len() || extra_len.is_some_and(|n| n != labels.len()) {
            return Err(ClassifierError::ClassCountMismatch {
                rows: rows.len(),
                labels: labels.len(),
            });
        }
        let dim = rows[0].len();
        if dim == 0 || rows.iter().any(|r| r.len() != dim) {
            return Err(ClassifierError::RaggedWeights);
        }

        let model = match model {
            ClassifierModel::Centroid { centroids, scale } => ClassifierModel::Centroid {
                centroids: centroids.into_iter().map(unit).collect(),
                scale,
            },
            linear => linear,
        };

        Ok(Self { labels, model, dim })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    fn logits(&self, x: &[f64]) -> Vec<f64> {
        match &self.model {
            ClassifierModel::Linear { weights, bias } => weights
                .iter()
                .zip(bias)
                .map(|(w, b)| dot(w, x) + b)
                .collect(),
            ClassifierModel::Centroid { centroids, scale } => {
                let x = unit(x.to_vec());
                centroids.iter().map(|c| scale * dot(c, &x)).collect()
            }
        }
    }
}

impl Classifier for BundleClassifier {
    fn predict_proba(&self, batch: &[Embedding]) -> Result<Array2<f64>, Box<dyn std::error::Error>> {
        let classes = self.labels.len();
        let mut out = Array2::<f64>::zeros((batch.len(), classes));
        for (i, embedding) in batch.iter().enumerate() {
            if embedding.len() != self.dim {
                return Err(Box::new(ClassifierError::DimensionMismatch {
                    expected: self.dim,
                    actual: embedding.len(),
                }));
            }
            let x: Vec<f64> = embedding.values().iter().map(|&v| v as f64).collect();
            let probabilities = softmax(&self.logits(&x));
            for (j, p) in probabilities.into_iter().enumerate() {
                out[[i, j]] = p;
            }
        }
        Ok(out)
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn unit(mut v: Vec<f64>) -> Vec<f64> {
    let norm = dot(&v, &v).sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
