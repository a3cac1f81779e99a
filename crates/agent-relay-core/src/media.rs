//! Binary media attached to a message turn.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Broad media classification, derived from the declared MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
    Video,
    File,
}

impl MediaKind {
    /// Classify a MIME type string.
    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("image/") {
            Self::Image
        } else if mime.starts_with("audio/") {
            Self::Audio
        } else if mime.starts_with("video/") {
            Self::Video
        } else {
            Self::File
        }
    }
}

/// A single materialized media object.
#[derive(Debug, Clone)]
pub struct Media {
    /// Display name of the file.
    pub name: String,
    /// Declared MIME type.
    pub mime_type: String,
    /// Broad classification.
    pub kind: MediaKind,
    /// Raw payload bytes.
    pub content: Bytes,
}

impl Media {
    /// Build a media object, classifying it by MIME type.
    #[must_use]
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, content: Bytes) -> Self {
        let mime_type = mime_type.into();
        let kind = MediaKind::from_mime(&mime_type);
        Self {
            name: name.into(),
            mime_type,
            kind,
            content,
        }
    }
}

/// All media attached to one message turn, bucketed by kind.
///
/// The owning turn must call [`TurnMedia::clear`] on every exit path so
/// large payload buffers do not outlive the call.
#[derive(Debug, Clone, Default)]
pub struct TurnMedia {
    pub images: Vec<Media>,
    pub audio: Vec<Media>,
    pub videos: Vec<Media>,
    pub files: Vec<Media>,
}

impl TurnMedia {
    /// Route a media object into its bucket.
    pub fn push(&mut self, media: Media) {
        match media.kind {
            MediaKind::Image => self.images.push(media),
            MediaKind::Audio => self.audio.push(media),
            MediaKind::Video => self.videos.push(media),
            MediaKind::File => self.files.push(media),
        }
    }

    /// Total number of attached objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len() + self.audio.len() + self.videos.len() + self.files.len()
    }

    /// Whether no media is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all payload buffers held by this turn.
    pub fn clear(&mut self) {
        self.images.clear();
        self.audio.clear();
        self.videos.clear();
        self.files.clear();
    }
}

/// File descriptor as sent by the client with a turn message.
///
/// Either `path` points into the media store, or `content` carries inline
/// text (`is_text` set).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    /// Display name of the file.
    #[serde(default = "FileRef::default_name")]
    pub name: String,
    /// Declared MIME type.
    #[serde(rename = "type", default = "FileRef::default_mime")]
    pub mime_type: String,
    /// Path into the media store, for uploaded binaries.
    #[serde(default)]
    pub path: Option<String>,
    /// Inline text content.
    #[serde(default)]
    pub content: Option<String>,
    /// Whether `content` carries inline text.
    #[serde(default)]
    pub is_text: bool,
}

impl FileRef {
    fn default_name() -> String {
        "untitled".to_string()
    }

    fn default_mime() -> String {
        "application/octet-stream".to_string()
    }
}
