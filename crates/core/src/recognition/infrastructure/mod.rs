pub mod classifier_bundle;
pub mod onnx_embedding_extractor;
