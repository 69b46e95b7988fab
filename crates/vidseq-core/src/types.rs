use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which side of the train/test split a clip belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown split {0:?} (expected train|test)")]
pub struct SplitParseError(pub String);

impl FromStr for Split {
    type Err = SplitParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "train" => Ok(Split::Train),
            "test" => Ok(Split::Test),
            other => Err(SplitParseError(other.to_string())),
        }
    }
}

/// One manifest row: a labeled clip and how many frames were extracted for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sample {
    pub split: Split,
    pub class_label: String,
    pub clip_id: String,
    pub frame_count: u64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SampleError {
    #[error("class_label must be non-empty")]
    EmptyClassLabel,
    #[error("clip_id must be non-empty")]
    EmptyClipId,
}

impl Sample {
    pub fn new(
        split: Split,
        class_label: impl Into<String>,
        clip_id: impl Into<String>,
        frame_count: u64,
    ) -> Self {
        Self {
            split,
            class_label: class_label.into(),
            clip_id: clip_id.into(),
            frame_count,
        }
    }

    pub fn validate(&self) -> Result<(), SampleError> {
        if self.class_label.trim().is_empty() {
            return Err(SampleError::EmptyClassLabel);
        }
        if self.clip_id.trim().is_empty() {
            return Err(SampleError::EmptyClipId);
        }
        Ok(())
    }
}
