use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use image::{GrayImage, ImageFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A decoded image in the pipeline's canonical layout: 8-bit luminance,
/// row-major, one byte per pixel.
///
/// Every component downstream of the normalizer reads this layout and never
/// branches on the source container format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    image: GrayImage,
}

impl Raster {
    pub fn from_luma(image: GrayImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Contiguous pixel buffer, `width * height` bytes.
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn as_luma(&self) -> &GrayImage {
        &self.image
    }

    /// Encode the raster into `format` for engines and sinks that consume
    /// container bytes rather than raw pixels.
    pub fn encode(&self, format: ImageFormat) -> Result<Vec<u8>, image::ImageError> {
        let mut output = Vec::new();
        self.image.write_to(&mut Cursor::new(&mut output), format)?;
        Ok(output)
    }
}

/// Fixed rectangle, in source pixels, that text recognition looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RegionRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// `x + width <= image_width` and `y + height <= image_height`, computed
    /// without wrapping.
    pub fn fits_within(&self, image_width: u32, image_height: u32) -> bool {
        let right = self.x.checked_add(self.width);
        let bottom = self.y.checked_add(self.height);
        matches!(
            (right, bottom),
            (Some(r), Some(b)) if r <= image_width && b <= image_height
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Default for RegionRect {
    fn default() -> Self {
        Self::new(20, 20, 360, 80)
    }
}

impl fmt::Display for RegionRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// Parses `x,y,width,height`.
impl FromStr for RegionRect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(format!(
                "expected 4 comma-separated values (x,y,width,height), got {}",
                parts.len()
            ));
        }

        let mut values = [0u32; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|e| format!("invalid region component '{part}': {e}"))?;
        }

        Ok(Self::new(values[0], values[1], values[2], values[3]))
    }
}

/// Which decoder produced a [`DecodedCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeSource {
    Ocr,
    Symbol,
}

impl fmt::Display for CodeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ocr => write!(f, "ocr"),
            Self::Symbol => write!(f, "symbol"),
        }
    }
}

/// Candidate flight-identifying token. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DecodedCode {
    value: String,
    source: CodeSource,
}

impl DecodedCode {
    /// Trims surrounding whitespace (and a leading byte-order mark) and
    /// returns `None` when nothing is left.
    pub fn new(value: impl AsRef<str>, source: CodeSource) -> Option<Self> {
        let value = value
            .as_ref()
            .trim_matches(|c: char| c.is_whitespace() || c == '\u{FEFF}');
        if value.is_empty() {
            return None;
        }
        Some(Self {
            value: value.to_string(),
            source,
        })
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> CodeSource {
        self.source
    }

    pub fn into_value(self) -> String {
        self.value
    }
}

/// Failure kinds produced by the decoding components.
///
/// Serialized as snake_case strings (e.g. `"no_code_found"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeErrorKind {
    /// Bytes are empty, truncated, or not a recognizable image container.
    #[error("upload is not a readable image")]
    UnreadableImage,
    /// The text region does not fit inside the image.
    #[error("text region lies outside the image")]
    RegionOutOfBounds,
    #[error("no text recognized in the text region")]
    NoTextFound,
    #[error("no barcode or QR symbol found")]
    NoSymbolFound,
    /// Neither decoder produced a code from a readable image.
    #[error("no flight code found in the image")]
    NoCodeFound,
}

impl DecodeErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnreadableImage => "unreadable_image",
            Self::RegionOutOfBounds => "region_out_of_bounds",
            Self::NoTextFound => "no_text_found",
            Self::NoSymbolFound => "no_symbol_found",
            Self::NoCodeFound => "no_code_found",
        }
    }
}

/// Result of one pipeline run: exactly one of a code or a failure kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    Success(DecodedCode),
    Failure(DecodeErrorKind),
}

impl DecodeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn code(&self) -> Option<&DecodedCode> {
        match self {
            Self::Success(code) => Some(code),
            Self::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<DecodeErrorKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure(kind) => Some(*kind),
        }
    }

    pub fn into_result(self) -> Result<DecodedCode, DecodeErrorKind> {
        match self {
            Self::Success(code) => Ok(code),
            Self::Failure(kind) => Err(kind),
        }
    }
}
