use serde::Deserialize;
use std::env;

use crate::decode::{RegionRect, DEFAULT_MAX_DECODE_BYTES};

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(usize::from)
        .unwrap_or(4)
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub ocr: OcrConfig,
    pub decode: DecodeConfig,
    pub storage: StorageConfig,
    pub flights: FlightsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub api_keys: Vec<String>,
    /// Base URL used when building links to stored boarding passes.
    pub public_url: String,
    pub max_upload_bytes: usize,
}

/// Text recognition engine settings, loaded once and shared read-only by
/// every engine in the pool.
#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    pub languages: String,
    /// Trained-data directory; the engine's built-in default when `None`.
    pub data_path: Option<String>,
    pub timeout_secs: u64,
    pub engines: usize,
    pub region: RegionRect,
    pub code_pattern: Option<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: "eng".to_string(),
            data_path: None,
            timeout_secs: 10,
            engines: available_cores(),
            region: RegionRect::default(),
            code_pattern: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecodeConfig {
    pub workers: usize,
    pub max_decode_bytes: u64,
    pub symbol_max_dimension: u32,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            workers: available_cores(),
            max_decode_bytes: DEFAULT_MAX_DECODE_BYTES,
            symbol_max_dimension: 2048,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub pass_directory: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlightsConfig {
    pub seed_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let ocr_defaults = OcrConfig::default();
        let decode_defaults = DecodeConfig::default();

        Self {
            server: ServerConfig {
                host: env::var("FLIGHTPASS_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("FLIGHTPASS_PORT", 3000),
                api_keys: env::var("FLIGHTPASS_API_KEYS")
                    .map(|keys| {
                        keys.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
                public_url: env::var("FLIGHTPASS_PUBLIC_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
                max_upload_bytes: parse_env_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
            },
            ocr: OcrConfig {
                languages: env::var("OCR_LANGUAGES").unwrap_or(ocr_defaults.languages),
                data_path: env::var("OCR_DATA_PATH").ok(),
                timeout_secs: parse_env_or("OCR_TIMEOUT", ocr_defaults.timeout_secs),
                engines: parse_env_or("OCR_ENGINES", ocr_defaults.engines),
                region: parse_env_or("OCR_REGION", ocr_defaults.region),
                code_pattern: env::var("OCR_CODE_PATTERN")
                    .ok()
                    .filter(|p| !p.trim().is_empty()),
            },
            decode: DecodeConfig {
                workers: parse_env_or("DECODE_WORKERS", decode_defaults.workers),
                max_decode_bytes: parse_env_or(
                    "DECODE_MAX_BYTES",
                    decode_defaults.max_decode_bytes,
                ),
                symbol_max_dimension: parse_env_or(
                    "SYMBOL_MAX_DIMENSION",
                    decode_defaults.symbol_max_dimension,
                ),
            },
            storage: StorageConfig {
                pass_directory: env::var("PASS_DIRECTORY")
                    .unwrap_or_else(|_| "boarding-passes".to_string()),
            },
            flights: FlightsConfig {
                seed_path: env::var("FLIGHTS_SEED_PATH").ok(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}
