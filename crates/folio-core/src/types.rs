// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Folio page pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one editing session (one open tool view).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a file in the upload list. Stable for the whole session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SourceIndex(pub u32);

impl std::fmt::Display for SourceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session-unique page identifier. Never reused, even after removal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PageId(pub u64);

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Identifier of one extraction batch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BatchId(pub u64);

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Monotonic allocator for [`PageId`]s.
///
/// One allocator lives for the whole session and is shared with every
/// extraction batch, so ids stay unique across re-extractions.
#[derive(Debug, Default)]
pub struct PageIdAllocator {
    next: AtomicU64,
}

impl PageIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self) -> PageId {
        PageId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Kind of uploaded source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pdf,
    Image,
}

/// Clockwise page rotation in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

/// Direction of a single quarter-turn rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotateDirection {
    Clockwise,
    CounterClockwise,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Build a rotation from any multiple of 90 (negative values allowed).
    pub fn from_degrees(degrees: i64) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        Some(match degrees.rem_euclid(360) {
            0 => Self::Deg0,
            90 => Self::Deg90,
            180 => Self::Deg180,
            _ => Self::Deg270,
        })
    }

    /// Rotation after one quarter turn in `direction`.
    pub fn rotated(self, direction: RotateDirection) -> Self {
        let delta: i64 = match direction {
            RotateDirection::Clockwise => 90,
            RotateDirection::CounterClockwise => -90,
        };
        // Always a multiple of 90, so the fallback is unreachable.
        Self::from_degrees(i64::from(self.degrees()) + delta).unwrap_or_default()
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 | 90 | 180 | 270 => Self::from_degrees(i64::from(value))
                .ok_or_else(|| format!("invalid rotation {value}")),
            other => Err(format!("rotation must be 0, 90, 180 or 270, got {other}")),
        }
    }
}

/// Extraction status of a page descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Pending,
    Ready,
    Error,
}

/// Width and height in render units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f32,
    pub height: f32,
}

impl Dimensions {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Encoded preview image of a page.
///
/// The encoded bytes are reference counted: cloning a thumbnail (or the
/// descriptor holding it) never copies pixel data. The bytes stay in process
/// and are not part of the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    #[serde(skip)]
    pub bytes: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    /// MIME type of `bytes`.
    pub mime_type: String,
}

/// One extracted page: metadata plus preview, independent of its position in
/// the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDescriptor {
    pub id: PageId,
    pub source_index: SourceIndex,
    /// 0-based page index within the source; always 0 for images.
    pub original_page_index: u32,
    pub thumbnail: Option<Thumbnail>,
    pub dimensions: Dimensions,
    pub rotation: Rotation,
    pub status: PageStatus,
    /// Render failure reason when `status` is `Error`.
    pub error: Option<String>,
}

impl PageDescriptor {
    pub fn is_ready(&self) -> bool {
        self.status == PageStatus::Ready
    }
}

/// A file handed over by the upload boundary.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub byte_size: u64,
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            byte_size: bytes.len() as u64,
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Infer the MIME type from the file extension.
    pub fn mime_from_extension(ext: &str) -> Option<&'static str> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some("application/pdf"),
            "jpg" | "jpeg" => Some("image/jpeg"),
            "png" => Some("image/png"),
            "gif" => Some("image/gif"),
            "bmp" => Some("image/bmp"),
            "webp" => Some("image/webp"),
            "tif" | "tiff" => Some("image/tiff"),
            _ => None,
        }
    }
}
