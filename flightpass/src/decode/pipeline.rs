use std::io;
use std::sync::Arc;
use std::time::Duration;

use image::ImageFormat;
use regex::Regex;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{FlightpassError, Result};
use crate::storage::{pass_file_name, PassSink};

use super::normalize::{normalize_with_limit, DEFAULT_MAX_DECODE_BYTES};
use super::recognizer::TextRecognizer;
use super::region::extract;
use super::symbol::SymbolDecoder;
use super::types::{
    CodeSource, DecodeErrorKind, DecodeOutcome, DecodedCode, Raster, RegionRect,
};

/// What a single decoder branch yields before reconciliation.
type BranchResult = std::result::Result<String, DecodeErrorKind>;

/// Tunables fixed for the lifetime of a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Rectangle handed to the text recognizer.
    pub region: RegionRect,
    /// Upper bound on a single recognition, queueing for an engine included;
    /// expiry counts as no text.
    pub ocr_timeout: Duration,
    /// Blocking normalize, symbol and encode jobs allowed to run at once.
    pub workers: usize,
    /// Recognitions allowed to run at once, separate from `workers` so a
    /// stuck engine never holds up normalization or symbol scanning.
    pub ocr_slots: usize,
    pub max_decode_bytes: u64,
    /// When set, OCR text must contain a match, and the match becomes the
    /// candidate code.
    pub code_pattern: Option<Regex>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            region: RegionRect::default(),
            ocr_timeout: Duration::from_secs(10),
            workers: default_parallelism(),
            ocr_slots: default_parallelism(),
            max_decode_bytes: DEFAULT_MAX_DECODE_BYTES,
            code_pattern: None,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Result<Self> {
        let code_pattern = config
            .ocr
            .code_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| FlightpassError::Validation(format!("Invalid OCR_CODE_PATTERN: {e}")))?;

        Ok(Self {
            region: config.ocr.region,
            ocr_timeout: Duration::from_secs(config.ocr.timeout_secs),
            workers: config.decode.workers.max(1),
            ocr_slots: config.ocr.engines.max(1),
            max_decode_bytes: config.decode.max_decode_bytes,
            code_pattern,
        })
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(usize::from)
        .unwrap_or(4)
}

/// Where and under which flight a normalized upload should be persisted.
#[derive(Debug, Clone)]
pub struct PersistRequest {
    pub flight_number: String,
    pub original_filename: Option<String>,
}

/// Outcome of [`BoardingPassPipeline::decode_and_persist`].
#[derive(Debug)]
pub struct DecodeReport {
    pub outcome: DecodeOutcome,
    /// Name the pass is stored under; `None` when the upload was unreadable
    /// and nothing was persisted.
    pub file_name: Option<String>,
    /// Resolves to the stored URI once the sink write finishes.
    pub persistence: Option<JoinHandle<io::Result<String>>>,
}

/// Boarding-pass decoding: normalize once, then run the symbol scanner over
/// the whole image and the text recognizer over the fixed region, and pick a
/// single code.
///
/// A symbol payload wins over OCR text whenever both are present. The
/// pipeline keeps no per-request state; clones share the decoders, both
/// permit pools and the task tracker.
#[derive(Clone)]
pub struct BoardingPassPipeline {
    recognizer: Arc<dyn TextRecognizer>,
    symbols: Arc<dyn SymbolDecoder>,
    options: Arc<PipelineOptions>,
    workers: Arc<Semaphore>,
    ocr_slots: Arc<Semaphore>,
    tasks: TaskTracker,
}

impl BoardingPassPipeline {
    pub fn new(
        recognizer: Arc<dyn TextRecognizer>,
        symbols: Arc<dyn SymbolDecoder>,
        options: PipelineOptions,
    ) -> Self {
        let workers = Arc::new(Semaphore::new(options.workers.max(1)));
        let ocr_slots = Arc::new(Semaphore::new(options.ocr_slots.max(1)));
        Self {
            recognizer,
            symbols,
            options: Arc::new(options),
            workers,
            ocr_slots,
            tasks: TaskTracker::new(),
        }
    }

    pub fn region(&self) -> RegionRect {
        self.options.region
    }

    pub fn recognizer_available(&self) -> bool {
        self.recognizer.is_available()
    }

    /// Background persistence jobs; close and wait on shutdown.
    pub fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    /// Decode `bytes` into a single flight code.
    pub async fn decode(&self, bytes: &[u8]) -> DecodeOutcome {
        match self.normalize(bytes).await {
            Ok(raster) => self.decode_raster(Arc::new(raster)).await,
            Err(kind) => DecodeOutcome::Failure(kind),
        }
    }

    /// Decode `bytes` and, in parallel, hand the normalized raster to `sink`.
    ///
    /// The sink write runs on its own task: its result never changes the
    /// returned outcome, and its failures are only logged and reported
    /// through [`DecodeReport::persistence`].
    pub async fn decode_and_persist(
        &self,
        bytes: &[u8],
        request: PersistRequest,
        sink: Arc<dyn PassSink>,
    ) -> DecodeReport {
        let raster = match self.normalize(bytes).await {
            Ok(raster) => Arc::new(raster),
            Err(kind) => {
                return DecodeReport {
                    outcome: DecodeOutcome::Failure(kind),
                    file_name: None,
                    persistence: None,
                }
            }
        };

        let file_name =
            pass_file_name(&request.flight_number, request.original_filename.as_deref());
        let persistence = self.persist(Arc::clone(&raster), file_name.clone(), sink);
        let outcome = self.decode_raster(raster).await;

        DecodeReport {
            outcome,
            file_name: Some(file_name),
            persistence: Some(persistence),
        }
    }

    async fn normalize(&self, bytes: &[u8]) -> std::result::Result<Raster, DecodeErrorKind> {
        let bytes = bytes.to_vec();
        let limit = self.options.max_decode_bytes;
        let result = match self
            .spawn_worker(move || normalize_with_limit(&bytes, limit))
            .await
        {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "image normalization worker failed");
                Err(DecodeErrorKind::UnreadableImage)
            }
        };

        if let Err(kind) = &result {
            warn!(error = %kind, "rejecting upload");
        }
        result
    }

    async fn decode_raster(&self, raster: Arc<Raster>) -> DecodeOutcome {
        let (symbol, text) = tokio::join!(
            self.scan_symbol(Arc::clone(&raster)),
            self.read_region(raster)
        );

        let outcome = reconcile(symbol, text);
        match &outcome {
            DecodeOutcome::Success(code) => {
                info!(source = %code.source(), code = code.value(), "boarding pass decoded");
            }
            DecodeOutcome::Failure(kind) => info!(error = %kind, "boarding pass not decoded"),
        }
        outcome
    }

    async fn scan_symbol(&self, raster: Arc<Raster>) -> BranchResult {
        let symbols = Arc::clone(&self.symbols);
        let result = match self
            .spawn_worker(move || symbols.decode(&raster))
            .await
        {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "symbol decoder worker failed");
                Err(DecodeErrorKind::NoSymbolFound)
            }
        };

        if let Err(kind) = &result {
            debug!(error = %kind, "symbol branch produced nothing");
        }
        result
    }

    async fn read_region(&self, raster: Arc<Raster>) -> BranchResult {
        let rect = self.options.region;
        let recognizer = Arc::clone(&self.recognizer);
        let timeout = self.options.ocr_timeout;

        let job = spawn_limited(&self.ocr_slots, move || {
            let region = extract(&raster, rect).map_err(|kind| {
                debug!(
                    width = raster.width(),
                    height = raster.height(),
                    region = %rect,
                    "text region out of bounds, skipping OCR"
                );
                kind
            })?;
            recognizer.recognize(&region)
        });

        let text = match tokio::time::timeout(timeout, job).await {
            Ok(Ok(result)) => result?,
            Ok(Err(e)) => {
                error!(error = %e, "text recognizer worker failed");
                return Err(DecodeErrorKind::NoTextFound);
            }
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "text recognition timed out"
                );
                return Err(DecodeErrorKind::NoTextFound);
            }
        };

        self.accept_text(&text)
    }

    /// Applies the optional code pattern to raw OCR output.
    fn accept_text(&self, text: &str) -> BranchResult {
        match &self.options.code_pattern {
            None => Ok(text.to_string()),
            Some(pattern) => pattern
                .find(text)
                .map(|m| m.as_str().to_string())
                .ok_or_else(|| {
                    debug!("OCR text does not match the code pattern");
                    DecodeErrorKind::NoTextFound
                }),
        }
    }

    fn persist(
        &self,
        raster: Arc<Raster>,
        file_name: String,
        sink: Arc<dyn PassSink>,
    ) -> JoinHandle<io::Result<String>> {
        let pipeline = self.clone();
        self.tasks.spawn(async move {
            let format = ImageFormat::from_path(&file_name)
                .ok()
                .filter(|format| format.writing_enabled())
                .unwrap_or(ImageFormat::Png);

            let encoded = pipeline
                .spawn_worker(move || encode_for_sink(&raster, format))
                .await
                .map_err(io::Error::other)
                .and_then(|result| result);

            let result = match encoded {
                Ok(bytes) => sink.store(&file_name, bytes).await,
                Err(e) => Err(e),
            };

            match &result {
                Ok(uri) => info!(file = %file_name, uri = %uri, "boarding pass persisted"),
                Err(e) => error!(file = %file_name, error = %e, "failed to persist boarding pass"),
            }
            result
        })
    }

    async fn spawn_worker<F, T>(&self, job: F) -> std::result::Result<T, JoinError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        spawn_limited(&self.workers, job).await
    }
}

/// Waits for a permit from `slots`, then runs `job` on the blocking pool.
/// The permit is held until the job returns, even if the caller stops
/// waiting.
async fn spawn_limited<F, T>(slots: &Arc<Semaphore>, job: F) -> std::result::Result<T, JoinError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let permit = Arc::clone(slots).acquire_owned().await;
    tokio::task::spawn_blocking(move || {
        let _permit = permit;
        job()
    })
    .await
}

fn encode_for_sink(raster: &Raster, format: ImageFormat) -> io::Result<Vec<u8>> {
    match raster.encode(format) {
        Ok(bytes) => Ok(bytes),
        Err(e) if format != ImageFormat::Png => {
            warn!(format = ?format, error = %e, "encoder rejected raster, storing PNG");
            raster.encode(ImageFormat::Png).map_err(io::Error::other)
        }
        Err(e) => Err(io::Error::other(e)),
    }
}

/// Pick one code from the two decoder results: symbol first, OCR text only
/// when no symbol was decoded, `NoCodeFound` when neither produced anything.
pub fn reconcile(symbol: BranchResult, text: BranchResult) -> DecodeOutcome {
    symbol
        .ok()
        .and_then(|payload| DecodedCode::new(payload, CodeSource::Symbol))
        .or_else(|| {
            text.ok()
                .and_then(|text| DecodedCode::new(text, CodeSource::Ocr))
        })
        .map(DecodeOutcome::Success)
        .unwrap_or(DecodeOutcome::Failure(DecodeErrorKind::NoCodeFound))
}
