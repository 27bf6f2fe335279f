// Common test utilities for integration tests
#![allow(dead_code)]

use std::io::Cursor;
use std::sync::{Arc, Once};

use axum::Router;
use image::{imageops, DynamicImage, GrayImage, ImageFormat, Luma};
use qrcode::{Color, QrCode};
use rxing::{BarcodeFormat, MultiFormatWriter, Writer};
use tempfile::TempDir;

use flightpass::api::{create_router, AppState};
use flightpass::config::Config;
use flightpass::decode::{
    BoardingPassPipeline, DecodeErrorKind, PipelineOptions, Raster, SymbolScanner,
    TextRecognizer,
};
use flightpass::flights::{Flight, InMemoryFlightStore};

pub const API_KEY: &str = "test-key";
pub const PUBLIC_URL: &str = "http://passes.test";
pub const BOUNDARY: &str = "flightpass-test-boundary";

static INIT: Once = Once::new();

/// Initialize tracing subscriber once for tests
pub fn init_test_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Recognizer that returns the same text for every region.
pub struct FixedRecognizer(pub Option<String>);

impl TextRecognizer for FixedRecognizer {
    fn recognize(&self, _region: &Raster) -> Result<String, DecodeErrorKind> {
        self.0.clone().ok_or(DecodeErrorKind::NoTextFound)
    }
}

/// White 640x480 page, with a QR symbol carrying `payload` in the lower
/// right when given.
pub fn boarding_pass_page(payload: Option<&str>) -> GrayImage {
    let mut page = GrayImage::from_pixel(640, 480, Luma([255]));
    if let Some(payload) = payload {
        let code = QrCode::new(payload.as_bytes()).unwrap();
        let width = code.width() as u32;
        let module_px = 6;
        let quiet = 4;
        let side = (width + quiet * 2) * module_px;
        let mut symbol = GrayImage::from_pixel(side, side, Luma([255]));
        for (i, color) in code.to_colors().into_iter().enumerate() {
            if color == Color::Dark {
                let x = (i as u32 % width + quiet) * module_px;
                let y = (i as u32 / width + quiet) * module_px;
                for dy in 0..module_px {
                    for dx in 0..module_px {
                        symbol.put_pixel(x + dx, y + dy, Luma([0]));
                    }
                }
            }
        }
        imageops::overlay(&mut page, &symbol, 440, 280);
    }
    page
}

/// White page carrying a PDF417 symbol with `payload`, the way IATA
/// boarding passes print their bar-coded data.
pub fn pdf417_page(payload: &str) -> GrayImage {
    const SCALE: u32 = 3;
    let matrix = MultiFormatWriter::default()
        .encode(payload, &BarcodeFormat::PDF_417, 1, 1)
        .unwrap();
    let symbol = GrayImage::from_fn(
        matrix.getWidth() * SCALE,
        matrix.getHeight() * SCALE,
        |x, y| Luma([if matrix.get(x / SCALE, y / SCALE) { 0 } else { 255 }]),
    );
    let mut page = GrayImage::from_pixel(
        (symbol.width() + 80).max(640),
        symbol.height() + 200,
        Luma([255]),
    );
    imageops::overlay(&mut page, &symbol, 40, 160);
    page
}

pub fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut output = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut output), format)
        .unwrap();
    output
}

pub fn page_png(payload: Option<&str>) -> Vec<u8> {
    encode(
        DynamicImage::ImageLuma8(boarding_pass_page(payload)),
        ImageFormat::Png,
    )
}

/// Multipart body with a single `file` field.
pub fn multipart_body(file_name: Option<&str>, bytes: &[u8]) -> Vec<u8> {
    let disposition = match file_name {
        Some(name) => format!("form-data; name=\"file\"; filename=\"{name}\""),
        None => "form-data; name=\"file\"".to_string(),
    };
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: {disposition}\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryFlightStore>,
    pub dir: TempDir,
}

pub fn test_app(ocr_text: Option<&str>, flights: Vec<Flight>) -> TestApp {
    test_app_with(ocr_text, flights, |_| {})
}

pub fn test_app_with(
    ocr_text: Option<&str>,
    flights: Vec<Flight>,
    customize: impl FnOnce(&mut Config),
) -> TestApp {
    init_test_logger();
    let dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.server.api_keys = vec![API_KEY.to_string()];
    config.server.public_url = PUBLIC_URL.to_string();
    config.storage.pass_directory = dir.path().join("passes").display().to_string();
    customize(&mut config);

    let pipeline = BoardingPassPipeline::new(
        Arc::new(FixedRecognizer(ocr_text.map(String::from))),
        Arc::new(SymbolScanner::default()),
        PipelineOptions::default(),
    );
    let store = Arc::new(InMemoryFlightStore::from_flights(flights));
    let state = AppState::new(config, pipeline, store.clone());

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        dir,
    }
}
