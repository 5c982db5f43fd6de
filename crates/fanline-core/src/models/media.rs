use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TrimError;

/// Role a media file plays in a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    MainVideo,
    SampleVideo,
    Thumbnail,
    Ogp,
    GalleryImage,
}

impl MediaKind {
    /// Fixed transfer order for planned uploads. Thumbnail and OGP may be
    /// derived from a just-generated client-side image, so they upload
    /// before the gallery while their blob source is still valid.
    pub fn upload_order(&self) -> u8 {
        match self {
            MediaKind::MainVideo => 0,
            MediaKind::SampleVideo => 1,
            MediaKind::Thumbnail => 2,
            MediaKind::Ogp => 3,
            MediaKind::GalleryImage => 4,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, MediaKind::MainVideo | MediaKind::SampleVideo)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::MainVideo => "main_video",
            MediaKind::SampleVideo => "sample_video",
            MediaKind::Thumbnail => "thumbnail",
            MediaKind::Ogp => "ogp",
            MediaKind::GalleryImage => "gallery_image",
        }
    }
}

/// Coarse aspect-ratio classification used by the platform to select
/// encoding and display profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
    Square,
}

impl Orientation {
    /// Classify pixel dimensions: ratio > 1.1 is landscape, < 0.9 is
    /// portrait, anything in between (or degenerate) is square.
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            return Orientation::Square;
        }
        let ratio = width as f64 / height as f64;
        if ratio > 1.1 {
            Orientation::Landscape
        } else if ratio < 0.9 {
            Orientation::Portrait
        } else {
            Orientation::Square
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
            Orientation::Square => "square",
        }
    }
}

/// Derive the canonical file extension from a MIME content type.
pub fn extension_from_content_type(content_type: &str) -> String {
    match content_type {
        "image/jpeg" => "jpg".to_string(),
        "image/png" => "png".to_string(),
        "image/webp" => "webp".to_string(),
        "image/gif" => "gif".to_string(),
        "video/mp4" => "mp4".to_string(),
        "video/quicktime" => "mov".to_string(),
        "video/webm" => "webm".to_string(),
        other => {
            // Fall back to the subtype, e.g. "image/x-foo+bar" -> "foo"
            let subtype = other.rsplit('/').next().unwrap_or("bin");
            let subtype = subtype.split('+').next().unwrap_or(subtype);
            subtype.trim_start_matches("x-").to_lowercase()
        }
    }
}

/// Where a local file's bytes live. Never serialized; exists only on the
/// client side for the duration of one submission.
#[derive(Debug, Clone)]
enum FileSource {
    Path(PathBuf),
    Memory(Bytes),
}

/// A local file selected by the creator, with the stat metadata the
/// classifier cache keys on.
#[derive(Debug, Clone)]
pub struct LocalFile {
    name: String,
    size: u64,
    modified_at: Option<DateTime<Utc>>,
    content_type: String,
    source: FileSource,
}

impl LocalFile {
    /// Build from a file on disk, reading size and mtime from its metadata.
    pub async fn from_path(
        path: impl Into<PathBuf>,
        content_type: impl Into<String>,
    ) -> std::io::Result<Self> {
        let path = path.into();
        let meta = tokio::fs::metadata(&path).await?;
        let modified_at = meta.modified().ok().map(DateTime::<Utc>::from);
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        Ok(Self {
            name,
            size: meta.len(),
            modified_at,
            content_type: content_type.into(),
            source: FileSource::Path(path),
        })
    }

    /// Build from in-memory bytes (client-generated images, tests).
    pub fn from_bytes(
        name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            modified_at: None,
            content_type: content_type.into(),
            source: FileSource::Memory(data),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        self.modified_at
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Path on disk, if the file is not an in-memory blob.
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            FileSource::Path(p) => Some(p),
            FileSource::Memory(_) => None,
        }
    }

    /// Read the full contents. In-memory sources are returned without a copy.
    pub async fn read(&self) -> std::io::Result<Bytes> {
        match &self.source {
            FileSource::Path(p) => Ok(Bytes::from(tokio::fs::read(p).await?)),
            FileSource::Memory(b) => Ok(b.clone()),
        }
    }
}

/// Per-file transfer state, mutated only by the uploader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Done,
    Failed,
}

/// A time-limited, header-constrained authorization to upload bytes
/// directly to storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadGrant {
    /// Presigned destination URL.
    pub destination: String,
    /// Headers the destination requires verbatim.
    pub headers: Vec<(String, String)>,
    pub expires_at: DateTime<Utc>,
}

impl UploadGrant {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// One media file the post needs, from selection through upload.
#[derive(Debug, Clone)]
pub struct MediaFileDescriptor {
    pub kind: MediaKind,
    pub content_type: String,
    /// Derived from `content_type`, not from the local filename.
    pub extension: String,
    /// Must be resolved before an upload grant is requested.
    pub orientation: Option<Orientation>,
    pub file: LocalFile,
    pub grant: Option<UploadGrant>,
    pub progress_percent: u8,
    pub status: UploadStatus,
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl MediaFileDescriptor {
    pub fn new(kind: MediaKind, file: LocalFile) -> Self {
        let content_type = file.content_type().to_string();
        let extension = extension_from_content_type(&content_type);
        Self {
            kind,
            content_type,
            extension,
            orientation: None,
            file,
            grant: None,
            progress_percent: 0,
            status: UploadStatus::Pending,
            uploaded_at: None,
        }
    }
}

/// Seconds range of the main video selected as the sample clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimRange {
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl TrimRange {
    pub fn span_seconds(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}

/// A main video already staged in temporary storage, before the post
/// record exists. Consumed by the batch-processing trigger; discarded if
/// the creator removes the video before submitting. The temp object itself
/// expires server-side and is never deleted from here.
#[derive(Debug, Clone)]
pub struct TempVideoSession {
    pub temp_storage_key: String,
    /// Short-lived URL for the preview/trim UI, decoupled from the
    /// permanent CDN path used after publish.
    pub playback_url: String,
    pub duration_seconds: f64,
    pub trim_range: Option<TrimRange>,
}

impl TempVideoSession {
    /// Select the sample clip range. Pure state mutation: the byte range is
    /// communicated as metadata to the batch-processing trigger, nothing is
    /// cut client-side. Rejects without mutating on an invalid range.
    pub fn select_trim_range(
        &mut self,
        start_seconds: f64,
        end_seconds: f64,
        max_sample_duration_secs: f64,
    ) -> Result<(), TrimError> {
        if start_seconds < 0.0 || start_seconds >= end_seconds {
            return Err(TrimError::InvalidRange {
                start: start_seconds,
                end: end_seconds,
            });
        }
        if end_seconds > self.duration_seconds {
            return Err(TrimError::OutOfBounds {
                end: end_seconds,
                duration: self.duration_seconds,
            });
        }
        let span = end_seconds - start_seconds;
        if span > max_sample_duration_secs {
            return Err(TrimError::TooLong {
                span,
                max: max_sample_duration_secs,
            });
        }
        self.trim_range = Some(TrimRange {
            start_seconds,
            end_seconds,
        });
        Ok(())
    }

    pub fn clear_trim_range(&mut self) {
        self.trim_range = None;
    }
}
