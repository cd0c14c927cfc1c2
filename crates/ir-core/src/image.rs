//! Image payloads and generation options.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// MIME type used when a service does not say otherwise.
pub const DEFAULT_MIME_TYPE: &str = "image/png";

/// Opaque image bytes plus their MIME type.
///
/// The orchestrator never inspects the bytes; it only checks that a service
/// returned something and moves ownership to the caller.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    bytes: Vec<u8>,
    mime_type: String,
}

impl ImageData {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// PNG image with the default MIME type.
    pub fn png(bytes: Vec<u8>) -> Self {
        Self::new(bytes, DEFAULT_MIME_TYPE)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the MIME type names an image format.
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Base64 payload without any prefix.
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    /// Render as `data:<mime>;base64,<payload>`.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    /// Parse a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Option<Self> {
        let rest = url.strip_prefix("data:")?;
        let (header, payload) = rest.split_once(',')?;
        let mime_type = header.strip_suffix(";base64")?;
        let bytes = BASE64.decode(payload.trim()).ok()?;
        Some(Self::new(bytes, mime_type))
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Aspect ratios accepted by standalone generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait3x4,
    #[serde(rename = "4:3")]
    Landscape4x3,
    #[serde(rename = "9:16")]
    Portrait9x16,
    #[serde(rename = "16:9")]
    Landscape16x9,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Portrait3x4,
        AspectRatio::Landscape4x3,
        AspectRatio::Portrait9x16,
        AspectRatio::Landscape16x9,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Landscape4x3 => "4:3",
            AspectRatio::Portrait9x16 => "9:16",
            AspectRatio::Landscape16x9 => "16:9",
        }
    }

    /// Width and height terms of the ratio.
    pub fn terms(&self) -> (u32, u32) {
        match self {
            AspectRatio::Square => (1, 1),
            AspectRatio::Portrait3x4 => (3, 4),
            AspectRatio::Landscape4x3 => (4, 3),
            AspectRatio::Portrait9x16 => (9, 16),
            AspectRatio::Landscape16x9 => (16, 9),
        }
    }

    /// Pixel dimensions whose longer side is `long_side`.
    pub fn dimensions(&self, long_side: u32) -> (u32, u32) {
        let (w, h) = self.terms();
        if w >= h {
            (long_side, (long_side * h / w).max(1))
        } else {
            ((long_side * w / h).max(1), long_side)
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported aspect ratio '{0}' (expected one of 1:1, 3:4, 4:3, 9:16, 16:9)")]
pub struct ParseAspectRatioError(String);

impl FromStr for AspectRatio {
    type Err = ParseAspectRatioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        AspectRatio::ALL
            .iter()
            .copied()
            .find(|ratio| ratio.as_str() == s)
            .ok_or_else(|| ParseAspectRatioError(s.to_string()))
    }
}

/// Options for a generation call.
///
/// The refinement loop always passes the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenerateOptions {
    pub aspect_ratio: Option<AspectRatio>,
}

impl GenerateOptions {
    pub fn with_aspect_ratio(aspect_ratio: AspectRatio) -> Self {
        Self {
            aspect_ratio: Some(aspect_ratio),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url() {
        let image = ImageData::png(vec![1, 2, 3, 4]);
        let url = image.to_data_url();
        assert_eq!(url, "data:image/png;base64,AQIDBA==");
        assert_eq!(ImageData::from_data_url(&url), Some(image));
        assert!(ImageData::from_data_url("image/png;base64,AQID").is_none());
        assert!(ImageData::from_data_url("data:image/png,AQID").is_none());
    }

    #[test]
    fn test_is_image() {
        assert!(ImageData::new(vec![0], "image/webp").is_image());
        assert!(!ImageData::new(vec![0], "application/pdf").is_image());
    }

    #[test]
    fn test_debug_hides_bytes() {
        let debug = format!("{:?}", ImageData::png(vec![7; 64]));
        assert!(debug.contains("len: 64"));
        assert!(!debug.contains("7, 7"));
    }

    #[test]
    fn test_aspect_ratio_parse() {
        assert_eq!("16:9".parse::<AspectRatio>(), Ok(AspectRatio::Landscape16x9));
        assert_eq!(" 3:4 ".parse::<AspectRatio>(), Ok(AspectRatio::Portrait3x4));
        assert!("2:1".parse::<AspectRatio>().is_err());
        for ratio in AspectRatio::ALL {
            assert_eq!(ratio.as_str().parse::<AspectRatio>(), Ok(ratio));
        }
    }

    #[test]
    fn test_aspect_ratio_dimensions() {
        assert_eq!(AspectRatio::Square.dimensions(64), (64, 64));
        assert_eq!(AspectRatio::Landscape16x9.dimensions(160), (160, 90));
        assert_eq!(AspectRatio::Portrait3x4.dimensions(120), (90, 120));
    }

    #[test]
    fn test_aspect_ratio_serde() {
        let json = serde_json::to_string(&AspectRatio::Portrait9x16).unwrap();
        assert_eq!(json, "\"9:16\"");
        let parsed: AspectRatio = serde_json::from_str("\"4:3\"").unwrap();
        assert_eq!(parsed, AspectRatio::Landscape4x3);
    }
}
