use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Where frames come from: a capture device index or a video file.
///
/// Parsed from a single argument: all-digit strings are device indices,
/// anything else is a path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VideoSource {
    Device(u32),
    File(PathBuf),
}

impl VideoSource {
    pub fn is_live(&self) -> bool {
        matches!(self, VideoSource::Device(_))
    }
}

impl Default for VideoSource {
    fn default() -> Self {
        VideoSource::Device(0)
    }
}

impl FromStr for VideoSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("video source must not be empty".to_string());
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            return s
                .parse::<u32>()
                .map(VideoSource::Device)
                .map_err(|e| format!("invalid device index {s:?}: {e}"));
        }
        Ok(VideoSource::File(PathBuf::from(s)))
    }
}

impl TryFrom<String> for VideoSource {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VideoSource> for String {
    fn from(source: VideoSource) -> Self {
        source.to_string()
    }
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoSource::Device(index) => write!(f, "{index}"),
            VideoSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}
