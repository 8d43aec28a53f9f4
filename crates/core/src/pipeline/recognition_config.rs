use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::annotation::infrastructure::imageproc_annotator::DEFAULT_FONT_SCALE;
use crate::detection::infrastructure::onnx_yolo_detector::DEFAULT_CONFIDENCE;
use crate::recognition::domain::decision_policy::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::recognition::domain::face_filter::DEFAULT_MIN_FACE_RATIO;
use crate::recognition::domain::face_preprocessor::{
    ChannelLayout, Normalization, PreprocessorConfig,
};
use crate::shared::constants::{
    DEFAULT_CLASSIFIER_PATH, DEFAULT_MAX_CONSECUTIVE_READ_ERRORS, DEFAULT_RESIZE_WIDTH,
};
use crate::video::domain::video_source::VideoSource;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{name} must be within [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
    #[error("normalization std must be finite and non-zero, got {0}")]
    InvalidNormalization(f32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Explicit ONNX model; `None` resolves the default from the model cache.
    pub model_path: Option<PathBuf>,
    pub confidence: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model_path: Option<PathBuf>,
    pub input_size: u32,
    pub layout: ChannelLayout,
    pub normalization: Normalization,
}

impl EmbeddingConfig {
    pub fn preprocessor(&self) -> PreprocessorConfig {
        PreprocessorConfig {
            input_size: self.input_size,
            layout: self.layout,
            normalization: self.normalization,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let preprocess = PreprocessorConfig::default();
        Self {
            model_path: None,
            input_size: preprocess.input_size,
            layout: preprocess.layout,
            normalization: preprocess.normalization,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Directory for annotated frames; `None` uses [`default_preview_dir`].
    pub output_dir: Option<PathBuf>,
    /// Discard annotated frames instead of writing them.
    pub headless: bool,
    pub keep_history: bool,
    /// Label font; `None` uses the bundled one.
    pub font_path: Option<PathBuf>,
    pub font_scale: f32,
}

impl DisplayConfig {
    /// Where annotated frames are written, or `None` when headless.
    pub fn resolved_output_dir(&self) -> Option<PathBuf> {
        if self.headless {
            return None;
        }
        Some(self.output_dir.clone().unwrap_or_else(default_preview_dir))
    }
}

/// `<cache>/FaceRec/preview`, next to the model cache; `./facerec-preview`
/// when the platform has no cache directory.
pub fn default_preview_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("FaceRec").join("preview"))
        .unwrap_or_else(|| PathBuf::from("facerec-preview"))
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            headless: false,
            keep_history: false,
            font_path: None,
            font_scale: DEFAULT_FONT_SCALE,
        }
    }
}

/// Everything a recognition run needs, validated before the run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub source: VideoSource,
    pub confidence_threshold: f64,
    pub min_face_ratio: f64,
    pub resize_width: u32,
    /// Mirror frames horizontally, as a webcam preview usually is.
    pub mirror: bool,
    pub max_consecutive_read_errors: usize,
    pub detector: DetectorConfig,
    pub embedding: EmbeddingConfig,
    pub classifier_path: PathBuf,
    pub display: DisplayConfig,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            source: VideoSource::default(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            min_face_ratio: DEFAULT_MIN_FACE_RATIO,
            resize_width: DEFAULT_RESIZE_WIDTH,
            mirror: true,
            max_consecutive_read_errors: DEFAULT_MAX_CONSECUTIVE_READ_ERRORS,
            detector: DetectorConfig::default(),
            embedding: EmbeddingConfig::default(),
            classifier_path: PathBuf::from(DEFAULT_CLASSIFIER_PATH),
            display: DisplayConfig::default(),
        }
    }
}

impl RecognitionConfig {
    /// Loads a JSON config; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_range("confidence_threshold", self.confidence_threshold)?;
        unit_range("min_face_ratio", self.min_face_ratio)?;
        unit_range("detector.confidence", self.detector.confidence)?;
        if self.resize_width == 0 {
            return Err(ConfigError::NotPositive("resize_width"));
        }
        if self.max_consecutive_read_errors == 0 {
            return Err(ConfigError::NotPositive("max_consecutive_read_errors"));
        }
        if self.embedding.input_size == 0 {
            return Err(ConfigError::NotPositive("embedding.input_size"));
        }
        if let Normalization::Fixed { std, .. } = self.embedding.normalization {
            if !std.is_finite() || std == 0.0 {
                return Err(ConfigError::InvalidNormalization(std));
            }
        }
        if self.display.font_scale.is_nan() || self.display.font_scale <= 0.0 {
            return Err(ConfigError::NotPositive("display.font_scale"));
        }
        Ok(())
    }
}

fn unit_range(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfUnitRange { name, value })
    }
}
