//! Lesson images as uploaded by the student and as sent to the gateway.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::ImageDecodeError;

/// Image formats accepted for lesson material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageMime {
  Jpeg,
  Png,
  Gif,
  Webp,
}

impl ImageMime {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Jpeg => "image/jpeg",
      Self::Png => "image/png",
      Self::Gif => "image/gif",
      Self::Webp => "image/webp",
    }
  }

  /// Identify the format from the leading magic bytes
  pub fn sniff(bytes: &[u8]) -> Option<Self> {
    match bytes {
      [0xFF, 0xD8, 0xFF, ..] => Some(Self::Jpeg),
      [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(Self::Png),
      [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(Self::Gif),
      [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(Self::Webp),
      _ => None,
    }
  }
}

/// A raw file taken from a multipart upload, not yet validated
#[derive(Debug, Clone)]
pub struct RawUpload {
  pub file_name: String,
  pub bytes: Vec<u8>,
}

impl RawUpload {
  pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
    Self {
      file_name: file_name.into(),
      bytes,
    }
  }
}

/// Transportable form of an image: MIME type plus base64 payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
  pub mime: ImageMime,
  pub data: String,
}

impl EncodedImage {
  /// Validate and encode one uploaded file. `index` is its position in the batch.
  pub fn decode(index: usize, upload: &RawUpload) -> Result<Self, ImageDecodeError> {
    let fail = |reason: &str| ImageDecodeError {
      index,
      name: upload.file_name.clone(),
      reason: reason.to_string(),
    };

    if upload.bytes.is_empty() {
      return Err(fail("file is empty"));
    }
    let mime = ImageMime::sniff(&upload.bytes).ok_or_else(|| fail("not a JPEG, PNG, GIF or WebP image"))?;

    Ok(Self {
      mime,
      data: STANDARD.encode(&upload.bytes),
    })
  }

  /// `data:` URL for embedding in an `<img>` tag
  pub fn data_url(&self) -> String {
    format!("data:{};base64,{}", self.mime.as_str(), self.data)
  }
}

/// Decode a whole batch. The first failure aborts the batch.
pub fn decode_batch(uploads: &[RawUpload]) -> Result<Vec<EncodedImage>, ImageDecodeError> {
  uploads
    .iter()
    .enumerate()
    .map(|(index, upload)| EncodedImage::decode(index, upload))
    .collect()
}
