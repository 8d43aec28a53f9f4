pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// ArcFace input geometry and symmetric normalization.
pub const ARCFACE_INPUT_SIZE: u32 = 112;
pub const ARCFACE_MEAN: f32 = 127.5;
pub const ARCFACE_STD: f32 = 127.5;

pub const DEFAULT_CLASSIFIER_PATH: &str = "models/classifier.json";

/// Frames are scaled to this width before detection.
pub const DEFAULT_RESIZE_WIDTH: u32 = 600;

/// Consecutive read errors tolerated before a source counts as exhausted.
pub const DEFAULT_MAX_CONSECUTIVE_READ_ERRORS: usize = 5;

pub const QUIT_COMMAND: &str = "q";
