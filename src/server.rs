use crate::config::{parse_level, Config};
use crate::error::MicrError;
use crate::preprocessing::{CropFractions, StageImage, StepTiming};
use crate::scanner::{MicrScanner, ScanOptions};
use crate::translator::Translation;
use axum::{
    extract::{DefaultBodyLimit, State},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub scanner: Arc<MicrScanner>,
    pub config: Arc<Config>,
}

#[derive(Debug, Deserialize)]
pub struct ImagePayload {
    pub format: String,
    /// Base64-encoded image bytes
    pub buffer: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CropBounds {
    pub width: Option<f64>,
    pub height: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CropSpec {
    pub begin: Option<CropBounds>,
    pub end: Option<CropBounds>,
}

impl CropSpec {
    /// Merge request bounds over the default bottom-band window.
    fn fractions(&self) -> CropFractions {
        let defaults = CropFractions::default();
        let begin = self.begin.unwrap_or_default();
        let end = self.end.unwrap_or_default();
        CropFractions {
            begin_width: begin.width.unwrap_or(defaults.begin_width),
            begin_height: begin.height.unwrap_or(defaults.begin_height),
            end_width: end.width.unwrap_or(defaults.end_width),
            end_height: end.height.unwrap_or(defaults.end_height),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub id: String,
    pub image: ImagePayload,
    pub crop: Option<CropSpec>,
    pub debug: Option<Vec<String>>,
    pub log_level: Option<String>,
    pub translators: Option<Vec<String>>,
    pub correct: Option<bool>,
    pub actual: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessRequest {
    pub id: String,
    pub image: ImagePayload,
    pub crop: Option<CropSpec>,
    pub debug: Option<Vec<String>>,
    pub log_level: Option<String>,
}

/// An encoded raster handed back to the caller.
#[derive(Debug, Serialize)]
pub struct EncodedImage {
    pub name: String,
    pub format: String,
    pub buffer: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Serialize)]
pub struct ScanResponse {
    pub id: String,
    pub overlap: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<EncodedImage>,
    pub translators: BTreeMap<String, Translation>,
}

#[derive(Serialize)]
pub struct PreprocessResponse {
    pub id: String,
    pub image: EncodedImage,
    pub steps: Vec<StepTiming>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<EncodedImage>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub translators: Vec<String>,
    pub supported_formats: Vec<String>,
    pub max_file_size_bytes: usize,
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let scanner = MicrScanner::new(&config)?;
    let addr = format!("{}:{}", config.host, config.port);
    let max_file_size = config.max_file_size;

    let state = AppState {
        scanner: Arc::new(scanner),
        config: Arc::new(config),
    };

    let app = Router::new()
        .route("/scan", post(handle_scan))
        .route("/preprocess", post(handle_preprocess))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .layer(DefaultBodyLimit::max(max_file_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Handle scan requests
async fn handle_scan(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> Result<Json<ScanResponse>, MicrError> {
    let start = Instant::now();
    validate_log_level(request.log_level.as_deref())?;
    let image = decode_image(&state.config, &request.image)?;
    let watchdog = spawn_hung_watchdog(&state.config, request.id.clone());

    let options = ScanOptions {
        crop: request.crop.map(|c| c.fractions()),
        translators: request.translators.clone().unwrap_or_default(),
        correct: request.correct.unwrap_or(false),
        actual: request.actual.clone(),
    };

    let result = state.scanner.scan(&request.id, image, &options);
    if let Some(watchdog) = watchdog {
        watchdog.abort();
    }
    let outcome = result?;

    let images = encode_stages(&outcome.stages, request.debug.as_deref())?;
    let elapsed_ms = start.elapsed().as_millis() as u64;
    note_slow_request(&state.config, &request.id, elapsed_ms);

    tracing::info!(
        id = %request.id,
        elapsed_ms,
        translators = outcome.translations.len(),
        overlap = outcome.overlap,
        "scan completed"
    );

    Ok(Json(ScanResponse {
        id: request.id,
        overlap: outcome.overlap,
        images,
        translators: outcome.translations,
    }))
}

/// Handle preprocess requests
async fn handle_preprocess(
    State(state): State<AppState>,
    Json(request): Json<PreprocessRequest>,
) -> Result<Json<PreprocessResponse>, MicrError> {
    let start = Instant::now();
    validate_log_level(request.log_level.as_deref())?;
    let image = decode_image(&state.config, &request.image)?;
    let watchdog = spawn_hung_watchdog(&state.config, request.id.clone());

    let result = state
        .scanner
        .preprocess(image, request.crop.map(|c| c.fractions()));
    if let Some(watchdog) = watchdog {
        watchdog.abort();
    }
    let outcome = result?;

    let band = encode_gray("band", &outcome.image)?;
    let images = encode_stages(&outcome.stages, request.debug.as_deref())?;
    note_slow_request(&state.config, &request.id, start.elapsed().as_millis() as u64);

    Ok(Json(PreprocessResponse {
        id: request.id,
        image: band,
        steps: outcome.steps,
        images,
    }))
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        translators: state
            .scanner
            .translator_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
        supported_formats: ["tiff", "png", "jpeg", "gif", "bmp"]
            .into_iter()
            .map(str::to_string)
            .collect(),
        max_file_size_bytes: state.config.max_file_size,
    })
}

/// A request may narrow its own log level, but never to an unknown name.
fn validate_log_level(level: Option<&str>) -> Result<(), MicrError> {
    if let Some(level) = level {
        parse_level(level)?;
    }
    Ok(())
}

/// Decode a base64 image payload into a raster.
fn decode_image(config: &Config, payload: &ImagePayload) -> Result<DynamicImage, MicrError> {
    let format = match payload.format.to_lowercase().as_str() {
        "tiff" => ImageFormat::Tiff,
        "png" => ImageFormat::Png,
        "jpeg" | "jpg" => ImageFormat::Jpeg,
        "gif" => ImageFormat::Gif,
        "bmp" => ImageFormat::Bmp,
        other => {
            return Err(MicrError::InvalidImage(format!(
                "unsupported format '{other}'"
            )))
        }
    };

    let bytes = BASE64
        .decode(payload.buffer.as_bytes())
        .map_err(|e| MicrError::InvalidRequest(format!("bad base64 image buffer: {e}")))?;

    if bytes.len() > config.max_file_size {
        return Err(MicrError::ImageTooLarge {
            size: bytes.len(),
            max: config.max_file_size,
        });
    }
    if bytes.is_empty() {
        return Err(MicrError::InvalidImage("zero-size image".to_string()));
    }

    image::load_from_memory_with_format(&bytes, format)
        .map_err(|e| MicrError::InvalidImage(format!("failed to decode image: {e}")))
}

/// Encode the stage rasters selected by the request's debug list.
fn encode_stages(
    stages: &[StageImage],
    debug: Option<&[String]>,
) -> Result<Vec<EncodedImage>, MicrError> {
    let Some(names) = debug else {
        return Ok(Vec::new());
    };
    stages
        .iter()
        .filter(|s| names.iter().any(|n| n == s.name))
        .map(|s| encode_gray(s.name, &s.image))
        .collect()
}

fn encode_gray(name: &str, image: &image::GrayImage) -> Result<EncodedImage, MicrError> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .map_err(|e| MicrError::Internal(format!("failed to encode {name} image: {e}")))?;
    Ok(EncodedImage {
        name: name.to_string(),
        format: "png".to_string(),
        buffer: BASE64.encode(bytes.into_inner()),
        width: image.width(),
        height: image.height(),
    })
}

/// Emit a line at the configured level once a finished request turns out
/// slow.
fn note_slow_request(config: &Config, id: &str, elapsed_ms: u64) {
    if config.slow_request_ms == 0 || elapsed_ms <= config.slow_request_ms {
        return;
    }
    log_at(
        &config.slow_or_hung_request_log_level,
        &format!("slow request {id}: {elapsed_ms}ms"),
    );
}

/// Start a timer that reports a still-running request. The handle is
/// aborted on completion; the work itself is never cancelled.
fn spawn_hung_watchdog(config: &Config, id: String) -> Option<tokio::task::JoinHandle<()>> {
    if config.hung_request_ms == 0 {
        return None;
    }
    let deadline = config.hung_request_ms;
    let level = config.slow_or_hung_request_log_level.clone();
    Some(tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(deadline)).await;
        log_at(&level, &format!("request {id} still running after {deadline}ms"));
    }))
}

fn log_at(level: &str, message: &str) {
    match parse_level(level).unwrap_or(tracing::Level::DEBUG) {
        tracing::Level::TRACE => tracing::trace!("{message}"),
        tracing::Level::DEBUG => tracing::debug!("{message}"),
        tracing::Level::INFO => tracing::info!("{message}"),
        tracing::Level::WARN => tracing::warn!("{message}"),
        tracing::Level::ERROR => tracing::error!("{message}"),
    }
}
