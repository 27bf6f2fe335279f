//! Image fixtures shared by the decode unit tests.

use std::io::Cursor;

use image::{imageops, GrayImage, ImageFormat, Luma};
use qrcode::{Color, QrCode};
use rxing::{BarcodeFormat, MultiFormatWriter, Writer};

use super::types::Raster;

/// Render `payload` as a QR symbol with a four-module quiet zone, each module
/// `module_px` pixels square.
pub fn qr_luma(payload: &str, module_px: u32) -> GrayImage {
    const QUIET: u32 = 4;
    let code = QrCode::new(payload.as_bytes()).expect("payload fits in a QR symbol");
    let width = code.width() as u32;
    let side = (width + QUIET * 2) * module_px;

    let mut img = GrayImage::from_pixel(side, side, Luma([255]));
    for (i, color) in code.to_colors().into_iter().enumerate() {
        if color != Color::Dark {
            continue;
        }
        let mx = (i as u32 % width + QUIET) * module_px;
        let my = (i as u32 / width + QUIET) * module_px;
        for dy in 0..module_px {
            for dx in 0..module_px {
                img.put_pixel(mx + dx, my + dy, Luma([0]));
            }
        }
    }
    img
}

/// Render `payload` as a PDF417 symbol, each module 3 pixels wide.
pub fn pdf417_luma(payload: &str) -> GrayImage {
    const SCALE: u32 = 3;
    // A 1x1 target keeps the writer's unscaled matrix, margin included.
    let matrix = MultiFormatWriter::default()
        .encode(payload, &BarcodeFormat::PDF_417, 1, 1)
        .expect("payload fits in a PDF417 symbol");
    GrayImage::from_fn(
        matrix.getWidth() * SCALE,
        matrix.getHeight() * SCALE,
        |x, y| {
            if matrix.get(x / SCALE, y / SCALE) {
                Luma([0])
            } else {
                Luma([255])
            }
        },
    )
}

/// White page, optionally carrying a QR symbol at `(x, y)`.
pub fn white_page(width: u32, height: u32, qr: Option<(&str, u32, u32)>) -> Raster {
    let mut page = GrayImage::from_pixel(width, height, Luma([255]));
    if let Some((payload, x, y)) = qr {
        imageops::overlay(&mut page, &qr_luma(payload, 6), i64::from(x), i64::from(y));
    }
    Raster::from_luma(page)
}

pub fn png_bytes(raster: &Raster) -> Vec<u8> {
    let mut output = Vec::new();
    raster
        .as_luma()
        .write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
        .unwrap();
    output
}
