use std::io;
use std::path::PathBuf;

use vidseq_core::types::Sample;

pub const DEFAULT_FRAME_EXTENSION: &str = "jpg";

/// Resolves a sample to its extracted frame files, in playback order.
pub trait FrameLister: Send + Sync + 'static {
    fn list_frames(&self, sample: &Sample) -> io::Result<Vec<PathBuf>>;
}

/// Frames laid out as `<root>/<split>/<class_label>/<clip_id><suffix>.<ext>`.
#[derive(Debug, Clone)]
pub struct FsFrameLister {
    root: PathBuf,
    extension: String,
}

impl FsFrameLister {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: DEFAULT_FRAME_EXTENSION.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn class_dir(&self, sample: &Sample) -> PathBuf {
        self.root
            .join(sample.split.as_str())
            .join(&sample.class_label)
    }

    fn matches(&self, sample: &Sample, file_name: &str) -> bool {
        let Some(rest) = file_name.strip_prefix(sample.clip_id.as_str()) else {
            return false;
        };
        rest.rsplit_once('.')
            .map(|(_, ext)| ext == self.extension)
            .unwrap_or(false)
    }
}

impl FrameLister for FsFrameLister {
    fn list_frames(&self, sample: &Sample) -> io::Result<Vec<PathBuf>> {
        let dir = self.class_dir(sample);
        let entries = match std::fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut frames = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if self.matches(sample, name) {
                frames.push(entry.path());
            }
        }
        frames.sort();
        Ok(frames)
    }
}
