use std::io::Cursor;

use image::{ImageReader, Limits};
use tracing::debug;

use super::types::{DecodeErrorKind, Raster};

/// Default ceiling on decoder allocations (256 MiB).
pub const DEFAULT_MAX_DECODE_BYTES: u64 = 256 * 1024 * 1024;

/// Decode uploaded bytes into the canonical grayscale raster.
///
/// The container format is sniffed from the content; filenames and declared
/// content types are never consulted.
pub fn normalize(bytes: &[u8]) -> Result<Raster, DecodeErrorKind> {
    normalize_with_limit(bytes, DEFAULT_MAX_DECODE_BYTES)
}

/// Like [`normalize`], but rejects images whose decoding would allocate more
/// than `max_decode_bytes`.
pub fn normalize_with_limit(
    bytes: &[u8],
    max_decode_bytes: u64,
) -> Result<Raster, DecodeErrorKind> {
    if bytes.is_empty() {
        debug!("empty upload");
        return Err(DecodeErrorKind::UnreadableImage);
    }

    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| {
            debug!(error = %e, "failed to sniff image format");
            DecodeErrorKind::UnreadableImage
        })?;

    if reader.format().is_none() {
        debug!(len = bytes.len(), "upload is not a recognized image container");
        return Err(DecodeErrorKind::UnreadableImage);
    }

    let mut limits = Limits::default();
    limits.max_alloc = Some(max_decode_bytes);
    reader.limits(limits);

    let img = reader.decode().map_err(|e| {
        debug!(error = %e, "failed to decode image");
        DecodeErrorKind::UnreadableImage
    })?;

    let luma = img.into_luma8();
    if luma.width() == 0 || luma.height() == 0 {
        return Err(DecodeErrorKind::UnreadableImage);
    }

    Ok(Raster::from_luma(luma))
}
