//! Boarding-pass decoding.
//!
//! Turns an uploaded image into a single flight code:
//!
//! - [`normalize`] decodes any supported container into a grayscale [`Raster`]
//! - [`extract`] cuts the fixed text region out of it
//! - a [`TextRecognizer`] reads text from that region
//! - a [`SymbolDecoder`] scans the whole raster for a QR or barcode symbol;
//!   [`SymbolScanner`] chains QR with PDF417, Aztec, Data Matrix and Code 128
//! - [`BoardingPassPipeline`] runs both branches and reconciles them,
//!   preferring the symbol payload
//!
//! # Usage
//!
//! ```rust,ignore
//! let recognizer = Arc::new(TesseractRecognizer::new(&config.ocr));
//! let symbols = Arc::new(SymbolScanner::boarding_pass(config.decode.symbol_max_dimension));
//! let pipeline = BoardingPassPipeline::new(recognizer, symbols, PipelineOptions::from_config(&config)?);
//! match pipeline.decode(&bytes).await {
//!     DecodeOutcome::Success(code) => println!("{} via {}", code.value(), code.source()),
//!     DecodeOutcome::Failure(kind) => println!("failed: {kind}"),
//! }
//! ```

mod normalize;
mod pipeline;
mod recognizer;
mod region;
mod symbol;
mod types;

#[cfg(test)]
mod test_support;

pub use normalize::{normalize, normalize_with_limit, DEFAULT_MAX_DECODE_BYTES};
pub use pipeline::{
    reconcile, BoardingPassPipeline, DecodeReport, PersistRequest, PipelineOptions,
};
pub use recognizer::{TesseractRecognizer, TextRecognizer};
pub use region::extract;
pub use symbol::{
    BarcodeSymbolDecoder, QrSymbolDecoder, SymbolDecoder, SymbolScanner, BOARDING_PASS_FORMATS,
};
pub use types::{CodeSource, DecodeErrorKind, DecodeOutcome, DecodedCode, Raster, RegionRect};
