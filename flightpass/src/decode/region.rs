use image::imageops;

use super::types::{DecodeErrorKind, Raster, RegionRect};

/// Copy the pixels covered by `rect` into a new raster.
///
/// The source is left untouched. A rectangle that reaches past the image, or
/// covers no pixels at all, is `RegionOutOfBounds`.
pub fn extract(image: &Raster, rect: RegionRect) -> Result<Raster, DecodeErrorKind> {
    if rect.is_empty() || !rect.fits_within(image.width(), image.height()) {
        return Err(DecodeErrorKind::RegionOutOfBounds);
    }

    let region = imageops::crop_imm(image.as_luma(), rect.x, rect.y, rect.width, rect.height);
    Ok(Raster::from_luma(region.to_image()))
}
