//! Encoded image payloads moving between the uploader, the model and the browser.

use base64::Engine;
use bytes::Bytes;
use thiserror::Error;

pub const DEFAULT_UPLOAD_MIME: &str = "image/jpeg";
pub const DEFAULT_MODEL_MIME: &str = "image/png";

#[derive(Debug, Error, PartialEq)]
pub enum ImageError {
    #[error("image payload is empty")]
    Empty,
    #[error("image payload is not valid base64: {0}")]
    Decode(String),
    #[error("unsupported image format")]
    UnsupportedFormat,
}

/// A decoded image plus its MIME type. Never mutated once built.
#[derive(Clone, PartialEq)]
pub struct ImageRef {
    mime_type: String,
    bytes: Bytes,
}

impl std::fmt::Debug for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRef")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImageRef {
    pub fn new(mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self { mime_type: mime_type.into(), bytes: bytes.into() }
    }

    /// Raw upload body; the MIME type comes from the magic bytes.
    pub fn from_upload(bytes: impl Into<Bytes>) -> Result<Self, ImageError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        let format = image::guess_format(&bytes).map_err(|_| ImageError::UnsupportedFormat)?;
        Ok(Self::new(format.to_mime_type(), bytes))
    }

    /// Upload body as sent by a client: raw image bytes, or text holding a data
    /// URI or bare base64. Text payloads must still decode to a known image format.
    pub fn from_body(body: Bytes) -> Result<Self, ImageError> {
        match Self::from_upload(body.clone()) {
            Err(ImageError::UnsupportedFormat) => {
                let text = std::str::from_utf8(&body).map_err(|_| ImageError::UnsupportedFormat)?;
                let parsed = Self::parse(text)?;
                image::guess_format(&parsed.bytes).map_err(|_| ImageError::UnsupportedFormat)?;
                Ok(parsed)
            }
            other => other,
        }
    }

    /// Accepts a data URI, a loose `<prefix>;base64,<data>` string or bare base64.
    pub fn parse(payload: &str) -> Result<Self, ImageError> {
        let payload = payload.trim();
        let (mime_type, data) = match payload.split_once(";base64,") {
            Some((head, data)) => {
                let mime = head
                    .strip_prefix("data:")
                    .or_else(|| head.split_once(':').map(|(_, m)| m))
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .unwrap_or(DEFAULT_UPLOAD_MIME);
                (mime, data)
            }
            None => (DEFAULT_UPLOAD_MIME, payload),
        };
        Self::decode(mime_type, data)
    }

    /// Inline data returned by the model.
    pub fn from_inline(mime_type: &str, data: &str) -> Result<Self, ImageError> {
        let mime = if mime_type.trim().is_empty() { DEFAULT_MODEL_MIME } else { mime_type.trim() };
        Self::decode(mime, data)
    }

    fn decode(mime_type: &str, data: &str) -> Result<Self, ImageError> {
        let data: String = data.chars().filter(|c| !c.is_whitespace()).collect();
        if data.is_empty() {
            return Err(ImageError::Empty);
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data.as_bytes())
            .map_err(|e| ImageError::Decode(e.to_string()))?;
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        Ok(Self::new(mime_type, bytes))
    }

    pub fn mime_type(&self) -> &str { &self.mime_type }

    pub fn bytes(&self) -> &Bytes { &self.bytes }

    pub fn len(&self) -> usize { self.bytes.len() }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    pub fn file_extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }
}
