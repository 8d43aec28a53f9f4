use std::fmt;

use crate::shared::bounding_box::{BoundingBox, CropBounds};
use crate::shared::frame::Frame;

/// Minimum face height as a fraction of frame height.
pub const DEFAULT_MIN_FACE_RATIO: f64 = 0.25;

/// Why a frame's detections did not proceed to classification.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RejectionReason {
    NoFace,
    MultipleFaces { count: usize },
    TooSmall { ratio: f64 },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::NoFace => write!(f, "no face"),
            RejectionReason::MultipleFaces { count } => write!(f, "{count} faces"),
            RejectionReason::TooSmall { ratio } => write!(f, "face too small ({ratio:.3})"),
        }
    }
}

/// The single face admitted for classification in a frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdmittedFace {
    /// Box as reported by the detector.
    pub bbox: BoundingBox,
    /// `bbox` clamped to frame extents; may be empty.
    pub crop: CropBounds,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Admission {
    Admitted(AdmittedFace),
    Rejected(RejectionReason),
}

/// Geometric admission: exactly one detection whose height exceeds
/// `min_face_ratio` of the frame height.
#[derive(Clone, Copy, Debug)]
pub struct FaceFilter {
    min_face_ratio: f64,
}

impl FaceFilter {
    pub fn new(min_face_ratio: f64) -> Self {
        Self { min_face_ratio }
    }

    pub fn min_face_ratio(&self) -> f64 {
        self.min_face_ratio
    }

    pub fn admit(&self, frame: &Frame, boxes: &[BoundingBox]) -> Admission {
        self.admit_in(frame.width(), frame.height(), boxes)
    }

    /// Same as [`FaceFilter::admit`] given only the frame dimensions.
    pub fn admit_in(&self, frame_width: u32, frame_height: u32, boxes: &[BoundingBox]) -> Admission {
        let bbox = match boxes {
            [] => return Admission::Rejected(RejectionReason::NoFace),
            [only] => *only,
            many => {
                return Admission::Rejected(RejectionReason::MultipleFaces { count: many.len() })
            }
        };

        let ratio = bbox.height_ratio(frame_height);
        if ratio <= self.min_face_ratio {
            return Admission::Rejected(RejectionReason::TooSmall { ratio });
        }

        Admission::Admitted(AdmittedFace {
            bbox,
            crop: bbox.clamp_to(frame_width, frame_height),
        })
    }
}

impl Default for FaceFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_FACE_RATIO)
    }
}
