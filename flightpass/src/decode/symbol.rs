use image::imageops::{self, FilterType};
use rqrr::PreparedImage;
use rxing::BarcodeFormat;
use tracing::debug;

use super::types::{DecodeErrorKind, Raster};

/// Scans a full raster for a machine-readable symbol and returns its payload.
pub trait SymbolDecoder: Send + Sync {
    fn decode(&self, image: &Raster) -> Result<String, DecodeErrorKind>;
}

/// Symbologies tried by [`BarcodeSymbolDecoder::default`], in order.
///
/// PDF417 and Aztec are the symbols printed on IATA BCBP boarding passes.
pub const BOARDING_PASS_FORMATS: [BarcodeFormat; 4] = [
    BarcodeFormat::PDF_417,
    BarcodeFormat::AZTEC,
    BarcodeFormat::DATA_MATRIX,
    BarcodeFormat::CODE_128,
];

/// Runs a list of decoders over one raster and returns the first payload.
///
/// Rasters whose longest edge exceeds `max_dimension` are downsampled once
/// before any decoder sees them (`0` disables downsampling).
pub struct SymbolScanner {
    decoders: Vec<Box<dyn SymbolDecoder>>,
    max_dimension: u32,
}

impl SymbolScanner {
    pub fn new(decoders: Vec<Box<dyn SymbolDecoder>>, max_dimension: u32) -> Self {
        Self {
            decoders,
            max_dimension,
        }
    }

    /// QR first, then the barcode formats in [`BOARDING_PASS_FORMATS`].
    pub fn boarding_pass(max_dimension: u32) -> Self {
        Self::new(
            vec![
                Box::new(QrSymbolDecoder),
                Box::new(BarcodeSymbolDecoder::default()),
            ],
            max_dimension,
        )
    }

    fn downsample(&self, image: &Raster) -> Option<Raster> {
        let (width, height) = (image.width(), image.height());
        let longest = width.max(height);
        if self.max_dimension == 0 || longest <= self.max_dimension {
            return None;
        }

        let factor = longest as f32 / self.max_dimension as f32;
        let new_w = ((width as f32 / factor) as u32).max(1);
        let new_h = ((height as f32 / factor) as u32).max(1);
        debug!(width, height, new_w, new_h, "downsampling before symbol scan");
        Some(Raster::from_luma(imageops::resize(
            image.as_luma(),
            new_w,
            new_h,
            FilterType::Triangle,
        )))
    }
}

impl Default for SymbolScanner {
    fn default() -> Self {
        Self::boarding_pass(2048)
    }
}

impl SymbolDecoder for SymbolScanner {
    fn decode(&self, image: &Raster) -> Result<String, DecodeErrorKind> {
        let resized = self.downsample(image);
        let image = resized.as_ref().unwrap_or(image);

        self.decoders
            .iter()
            .find_map(|decoder| decoder.decode(image).ok())
            .ok_or(DecodeErrorKind::NoSymbolFound)
    }
}

/// QR decoder built on `rqrr`. Takes the first grid with a non-empty payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrSymbolDecoder;

impl SymbolDecoder for QrSymbolDecoder {
    fn decode(&self, image: &Raster) -> Result<String, DecodeErrorKind> {
        let mut prepared = PreparedImage::prepare(image.as_luma().clone());
        let grids = prepared.detect_grids();
        debug!(candidates = grids.len(), "QR grids detected");

        for grid in grids {
            match grid.decode() {
                Ok((_, content)) => {
                    let payload = normalize_payload(&content);
                    if !payload.is_empty() {
                        return Ok(payload.to_string());
                    }
                }
                Err(e) => debug!(error = %e, "QR grid failed to decode"),
            }
        }

        Err(DecodeErrorKind::NoSymbolFound)
    }
}

/// 1D and stacked/matrix barcode decoder built on `rxing`.
#[derive(Debug, Clone)]
pub struct BarcodeSymbolDecoder {
    formats: Vec<BarcodeFormat>,
}

impl BarcodeSymbolDecoder {
    pub fn new(formats: impl IntoIterator<Item = BarcodeFormat>) -> Self {
        Self {
            formats: formats.into_iter().collect(),
        }
    }
}

impl Default for BarcodeSymbolDecoder {
    fn default() -> Self {
        Self::new(BOARDING_PASS_FORMATS)
    }
}

impl SymbolDecoder for BarcodeSymbolDecoder {
    fn decode(&self, image: &Raster) -> Result<String, DecodeErrorKind> {
        for format in &self.formats {
            match rxing::helpers::detect_in_luma(
                image.pixels().to_vec(),
                image.width(),
                image.height(),
                Some(*format),
            ) {
                Ok(result) => {
                    let payload = normalize_payload(result.getText());
                    if !payload.is_empty() {
                        debug!(format = ?format, "barcode decoded");
                        return Ok(payload.to_string());
                    }
                }
                Err(e) => debug!(format = ?format, error = %e, "no barcode of this format"),
            }
        }

        Err(DecodeErrorKind::NoSymbolFound)
    }
}

/// Strip surrounding whitespace, control characters and a byte-order mark.
fn normalize_payload(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || c.is_control() || c == '\u{FEFF}')
}
