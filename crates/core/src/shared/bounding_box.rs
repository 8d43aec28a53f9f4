use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid bounding box ({left}, {top}, {right}, {bottom}): right must exceed left and bottom must exceed top")]
pub struct InvalidBoundingBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// Axis-aligned face box in frame pixel space, as reported by a detector.
///
/// Coordinates may extend past the frame edges; use [`BoundingBox::clamp_to`]
/// before reading pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    score: f32,
}

/// Crop rectangle clamped to frame extents. May be empty when the detected
/// box lies entirely outside the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropBounds {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropBounds {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

impl BoundingBox {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Result<Self, InvalidBoundingBox> {
        if right <= left || bottom <= top {
            return Err(InvalidBoundingBox {
                left,
                top,
                right,
                bottom,
            });
        }
        Ok(Self {
            left,
            top,
            right,
            bottom,
            score: 1.0,
        })
    }

    /// Attaches the detector confidence for this box.
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn left(&self) -> i32 {
        self.left
    }

    pub fn top(&self) -> i32 {
        self.top
    }

    pub fn right(&self) -> i32 {
        self.right
    }

    pub fn bottom(&self) -> i32 {
        self.bottom
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    /// Widened to `i64`: extreme detector output can span all of `i32`.
    pub fn width(&self) -> i64 {
        i64::from(self.right) - i64::from(self.left)
    }

    pub fn height(&self) -> i64 {
        i64::from(self.bottom) - i64::from(self.top)
    }

    /// Box height as a fraction of the frame height.
    pub fn height_ratio(&self, frame_height: u32) -> f64 {
        if frame_height == 0 {
            return 0.0;
        }
        self.height() as f64 / frame_height as f64
    }

    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> CropBounds {
        let clamp = |v: i32, max: u32| v.clamp(0, max as i32) as u32;
        CropBounds {
            left: clamp(self.left, frame_width),
            top: clamp(self.top, frame_height),
            right: clamp(self.right, frame_width),
            bottom: clamp(self.bottom, frame_height),
        }
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.left.max(other.left);
        let iy1 = self.top.max(other.top);
        let ix2 = self.right.min(other.right);
        let iy2 = self.bottom.min(other.bottom);

        let inter = (i64::from(ix2) - i64::from(ix1)).max(0) as f64
            * (i64::from(iy2) - i64::from(iy1)).max(0) as f64;
        if inter == 0.0 {
            return 0.0;
        }

        let area_a = self.width() as f64 * self.height() as f64;
        let area_b = other.width() as f64 * other.height() as f64;
        inter / (area_a + area_b - inter)
    }
}
