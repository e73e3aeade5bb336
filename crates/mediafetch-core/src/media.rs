//! Ranked "is this playable media" capability check.
//!
//! Sources describe what they are through a mix of signals: a MIME type,
//! explicit video/audio attributes, and a filename. The check consults
//! them in that order and returns the first definite answer together with
//! the signal that produced it.

use std::path::Path;

use serde::{Deserialize, Serialize};

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "flv", "wmv", "webm", "m4v", "3gp", "ts", "m2ts", "mpg", "mpeg",
];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "m4a", "aac", "ogg", "opus", "wma"];

/// What kind of media a source holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Playable video.
    Video,
    /// Playable audio.
    Audio,
    /// Not something a media player should receive.
    NotMedia,
}

/// Which signal decided the outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaEvidence {
    /// The MIME family (`video/*`, `audio/*`).
    Mime,
    /// An explicit video or audio attribute.
    Attribute,
    /// The filename extension.
    Extension,
    /// No signal matched.
    Nothing,
}

/// Result of [`MediaProbe::check`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCheck {
    /// Decided kind.
    pub kind: MediaKind,
    /// Signal that decided it.
    pub evidence: MediaEvidence,
}

impl MediaCheck {
    /// Whether the source is playable media.
    #[must_use]
    pub const fn is_media(&self) -> bool {
        !matches!(self.kind, MediaKind::NotMedia)
    }
}

/// Signals describing a source, as far as they are known.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MediaProbe {
    /// Declared MIME type.
    pub mime: Option<String>,
    /// The source carries an explicit video attribute.
    pub has_video_attribute: bool,
    /// The source carries an explicit audio attribute.
    pub has_audio_attribute: bool,
    /// Filename, used for the extension fallback.
    pub filename: Option<String>,
}

impl MediaProbe {
    /// Probe with only a filename.
    pub fn for_filename(filename: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            ..Self::default()
        }
    }

    /// Set the MIME type.
    #[must_use]
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Run the ranked check: MIME family, then attributes, then extension.
    pub fn check(&self) -> MediaCheck {
        if let Some(kind) = self.mime.as_deref().and_then(kind_from_mime) {
            return MediaCheck {
                kind,
                evidence: MediaEvidence::Mime,
            };
        }

        if self.has_video_attribute || self.has_audio_attribute {
            let kind = if self.has_video_attribute {
                MediaKind::Video
            } else {
                MediaKind::Audio
            };
            return MediaCheck {
                kind,
                evidence: MediaEvidence::Attribute,
            };
        }

        if let Some(kind) = self.filename.as_deref().and_then(kind_from_extension) {
            return MediaCheck {
                kind,
                evidence: MediaEvidence::Extension,
            };
        }

        MediaCheck {
            kind: MediaKind::NotMedia,
            evidence: MediaEvidence::Nothing,
        }
    }
}

fn kind_from_mime(mime: &str) -> Option<MediaKind> {
    let family = mime.split('/').next()?.trim().to_ascii_lowercase();
    match family.as_str() {
        "video" => Some(MediaKind::Video),
        "audio" => Some(MediaKind::Audio),
        _ => None,
    }
}

fn kind_from_extension(filename: &str) -> Option<MediaKind> {
    let ext = Path::new(filename)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Audio)
    } else {
        None
    }
}
