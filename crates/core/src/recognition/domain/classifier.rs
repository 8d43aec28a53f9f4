use ndarray::Array2;

use crate::recognition::domain::embedding_extractor::Embedding;

/// Probability model over a fixed set of known identities.
pub trait Classifier: Send {
    /// Returns an `[N, C]` matrix: row `i` is the distribution for
    /// `batch[i]`, column `j` corresponds to `labels()[j]`.
    fn predict_proba(&self, batch: &[Embedding]) -> Result<Array2<f64>, Box<dyn std::error::Error>>;

    fn labels(&self) -> &[String];
}
