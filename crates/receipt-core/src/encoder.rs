//! Image encoding for transport to the vision model.
//!
//! Encoding never fails: an empty or unreadable image simply produces an
//! empty payload, which the provider then answers with an empty or error
//! result.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fallback media type when neither the name nor the content identify the image.
pub const UNKNOWN_MIME_TYPE: &str = "application/octet-stream";

/// File extensions accepted as images, mirroring an `image/*` picker filter.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "webp", "gif", "bmp", "tif", "tiff", "heic", "heif",
];

/// An in-memory image: raw bytes plus a media-type label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    name: Option<String>,
    mime_type: String,
    bytes: Vec<u8>,
}

impl ImageFile {
    /// Wrap bytes with an explicit media type.
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            name: None,
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Wrap bytes from a named file, deriving the media type.
    pub fn from_named_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = detect_mime_type(Some(&name), &bytes);
        Self {
            name: Some(name),
            mime_type,
            bytes,
        }
    }

    /// Read an image file into memory.
    #[cfg(feature = "native")]
    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!("Read {} bytes from {}", bytes.len(), path.display());
        Ok(Self::from_named_bytes(name, bytes))
    }

    /// Original file name, if known.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Declared media type.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Raw image bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Transport-ready image: base64 payload and media type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedImage {
    /// Standard base64 (padded), without a data-URI prefix.
    pub data: String,

    /// Media type, e.g. `image/jpeg`.
    pub mime_type: String,
}

impl EncodedImage {
    /// Self-contained `data:` URI for redisplaying the image.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Encode an image for transport.
pub fn encode(image: &ImageFile) -> EncodedImage {
    EncodedImage {
        data: STANDARD.encode(image.bytes()),
        mime_type: image.mime_type().to_string(),
    }
}

/// Whether `path` carries one of the accepted image extensions.
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Determine a media type from a file name, falling back to content sniffing.
pub fn detect_mime_type(name: Option<&str>, bytes: &[u8]) -> String {
    let extension = name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    if let Some(ext) = extension.as_deref() {
        match ext {
            "heic" => return "image/heic".to_string(),
            "heif" => return "image/heif".to_string(),
            _ => {}
        }
        if let Some(format) = ImageFormat::from_extension(ext) {
            return format.to_mime_type().to_string();
        }
    }

    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type().to_string(),
        Err(_) => UNKNOWN_MIME_TYPE.to_string(),
    }
}
