use crate::recognition::domain::face_preprocessor::FaceTensor;

/// Fixed-length identity vector for one face.
#[derive(Clone, Debug, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a unit-length copy. A zero vector is returned unchanged.
    pub fn l2_normalized(mut self) -> Self {
        let norm = self.0.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            self.0.iter_mut().for_each(|v| *v /= norm);
        }
        self
    }
}

/// Maps preprocessed faces to embeddings, one per input, in order.
pub trait EmbeddingExtractor: Send {
    fn embed(&mut self, batch: &[FaceTensor]) -> Result<Vec<Embedding>, Box<dyn std::error::Error>>;
}
