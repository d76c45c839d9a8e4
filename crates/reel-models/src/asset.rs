//! Access-granted channel inputs.

use serde::{Deserialize, Serialize};

/// Signed input URLs for one render, in the shape the worker consumes.
///
/// Built fresh for every job submission; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBundle {
    /// Frame images in render order
    pub frames: Vec<String>,

    /// Overlay effects (images or clips)
    #[serde(default)]
    pub overlays: Vec<String>,

    /// Narration track
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,

    /// Foreground portrait
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person: Option<String>,

    /// Narration script used for subtitle fallback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl AssetBundle {
    pub fn has_frames(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Compact description for logs (no URLs, they carry signatures).
    pub fn summary(&self) -> String {
        format!(
            "frames={} overlays={} audio={} person={} text={}",
            self.frames.len(),
            self.overlays.len(),
            self.audio.is_some(),
            self.person.is_some(),
            self.text.is_some()
        )
    }
}
