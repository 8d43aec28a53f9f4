/// Embedding extractor running an ONNX face model (ArcFace by default).
///
/// Inputs are already-normalized tensors from the preprocessor; outputs are
/// L2-normalized so downstream similarity is a dot product.
use std::path::Path;

use ndarray::{concatenate, Axis};

use crate::detection::infrastructure::execution_provider::{
    intra_op_threads, preferred_execution_providers,
};
use crate::recognition::domain::embedding_extractor::{Embedding, EmbeddingExtractor};
use crate::recognition::domain::face_preprocessor::FaceTensor;

pub struct OnnxEmbeddingExtractor {
    session: ort::session::Session,
}

impl OnnxEmbeddingExtractor {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_inter_threads(1)?
            .with_intra_threads(intra_op_threads())?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;
        log::info!("Loaded embedding model {}", model_path.display());
        Ok(Self { session })
    }
}

impl EmbeddingExtractor for OnnxEmbeddingExtractor {
    fn embed(&mut self, batch: &[FaceTensor]) -> Result<Vec<Embedding>, Box<dyn std::error::Error>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let views: Vec<_> = batch.iter().map(|t| t.view()).collect();
        let input = concatenate(Axis(0), &views)?;

        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("embedding model produced no outputs".into());
        }
        let array = outputs[0].try_extract_array::<f32>()?;
        let shape = array.shape().to_vec();
        let data = array.as_slice().ok_or("Cannot get embedding slice")?;
        split_rows(data, &shape, batch.len())
    }
}

/// Splits a flat `[N, D]` (or `[N, D, 1, 1]`) output into `N` unit vectors.
fn split_rows(
    data: &[f32],
    shape: &[usize],
    expected_rows: usize,
) -> Result<Vec<Embedding>, Box<dyn std::error::Error>> {
    let rows = shape.first().copied().unwrap_or(0);
    if rows != expected_rows || rows == 0 {
        return Err(format!(
            "embedding output shape {shape:?} does not match batch of {expected_rows}"
        )
        .into());
    }
    let dim = data.len() / rows;
    if dim == 0 || dim * rows != data.len() {
        return Err(format!(
            "embedding output of {} values is not divisible into {rows} rows",
            data.len()
        )
        .into());
    }
    Ok(data
        .chunks_exact(dim)
        .map(|row| Embedding::new(row.to_vec()).l2_normalized())
        .collect())
}
