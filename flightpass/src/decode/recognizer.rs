use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageFormat, Luma};
use leptess::LepTess;
use tracing::{debug, info, warn};

use crate::config::OcrConfig;

use super::types::{DecodeErrorKind, Raster};

/// Optical character recognition over a region raster.
///
/// Implementations are called from blocking worker threads and must be safe
/// to share between them.
pub trait TextRecognizer: Send + Sync {
    /// Raw text found in `region`, possibly with whitespace and noise.
    fn recognize(&self, region: &Raster) -> Result<String, DecodeErrorKind>;

    fn is_available(&self) -> bool {
        true
    }
}

enum EngineBackend {
    Pool {
        engines: Vec<Mutex<LepTess>>,
        next: AtomicUsize,
    },
    Unavailable {
        reason: String,
    },
}

/// Tesseract-backed recognizer holding a fixed pool of engine instances.
///
/// Each engine is initialised once from [`OcrConfig`] and reused; a call
/// checks out whichever engine is idle, so concurrent recognitions never
/// share engine state.
pub struct TesseractRecognizer {
    backend: EngineBackend,
}

fn create_tesseract(config: &OcrConfig) -> Result<LepTess, String> {
    LepTess::new(config.data_path.as_deref(), &config.languages).map_err(|e| e.to_string())
}

impl TesseractRecognizer {
    pub fn new(config: &OcrConfig) -> Self {
        let size = config.engines.max(1);
        let mut engines = Vec::with_capacity(size);

        for _ in 0..size {
            match create_tesseract(config) {
                Ok(lt) => engines.push(Mutex::new(lt)),
                Err(e) => {
                    let reason = format!("Tesseract not available: {e}");
                    warn!("{}", reason);
                    return Self {
                        backend: EngineBackend::Unavailable { reason },
                    };
                }
            }
        }

        info!(
            languages = %config.languages,
            engines = size,
            "Tesseract OCR initialized"
        );
        Self {
            backend: EngineBackend::Pool {
                engines,
                next: AtomicUsize::new(0),
            },
        }
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.backend {
            EngineBackend::Unavailable { reason } => Some(reason),
            EngineBackend::Pool { .. } => None,
        }
    }
}

fn checkout<'a>(engines: &'a [Mutex<LepTess>], next: &AtomicUsize) -> MutexGuard<'a, LepTess> {
    let start = next.fetch_add(1, Ordering::Relaxed);
    for offset in 0..engines.len() {
        match engines[(start + offset) % engines.len()].try_lock() {
            Ok(guard) => return guard,
            Err(TryLockError::Poisoned(poisoned)) => return poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => continue,
        }
    }
    engines[start % engines.len()]
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, region: &Raster) -> Result<String, DecodeErrorKind> {
        let (engines, next) = match &self.backend {
            EngineBackend::Pool { engines, next } => (engines, next),
            EngineBackend::Unavailable { reason } => {
                debug!(reason = %reason, "skipping OCR, engine unavailable");
                return Err(DecodeErrorKind::NoTextFound);
            }
        };

        let prepared = prepare_for_ocr(region.as_luma());
        let png = Raster::from_luma(prepared)
            .encode(ImageFormat::Png)
            .map_err(|e| {
                warn!(error = %e, "failed to encode OCR region");
                DecodeErrorKind::NoTextFound
            })?;

        let mut lt = checkout(engines, next);
        lt.set_image_from_mem(&png).map_err(|e| {
            warn!(error = %e, "failed to set OCR image");
            DecodeErrorKind::NoTextFound
        })?;
        lt.get_utf8_text().map_err(|e| {
            warn!(error = %e, "failed to extract OCR text");
            DecodeErrorKind::NoTextFound
        })
    }

    fn is_available(&self) -> bool {
        !matches!(self.backend, EngineBackend::Unavailable { .. })
    }
}

/// Stretch contrast, then upscale small regions so glyphs reach a height
/// the engine reads reliably.
fn prepare_for_ocr(region: &GrayImage) -> GrayImage {
    let stretched = enhance_grayscale_contrast(region);
    let factor = upscale_factor(stretched.width().min(stretched.height()));
    if factor == 1 {
        return stretched;
    }
    debug!(factor, "upscaling small OCR region");
    imageops::resize(
        &stretched,
        stretched.width() * factor,
        stretched.height() * factor,
        FilterType::Lanczos3,
    )
}

fn upscale_factor(min_dimension: u32) -> u32 {
    if min_dimension < 100 {
        4
    } else if min_dimension < 200 {
        2
    } else {
        1
    }
}

/// Maps the darkest pixel to 0 and the lightest to 255.
fn enhance_grayscale_contrast(gray: &GrayImage) -> GrayImage {
    let (min_val, max_val) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));

    // Flat image
    if max_val <= min_val {
        return gray.clone();
    }

    let range = f32::from(max_val - min_val);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y)[0];
        let normalized = f32::from(value - min_val) / range;
        Luma([(normalized * 255.0).round() as u8])
    })
}
