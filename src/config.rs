use crate::error::MicrError;
use clap::Parser;
use std::path::PathBuf;

/// Command-line / environment configuration. Every key can be supplied as
/// `OCR_` + SCREAMING_SNAKE of its camelCase name.
#[derive(Parser, Debug)]
#[command(name = "micr-scan-server")]
#[command(about = "MICR cheque-line localization and reading server")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "OCR_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "OCR_PORT", default_value = "9292")]
    pub port: u16,

    /// Maximum request body size in bytes (default: 50MB)
    #[arg(long, env = "OCR_MAX_FILE_SIZE", default_value = "52428800")]
    pub max_file_size: usize,

    /// Path to the E-13B reference glyph sheet
    #[arg(long, env = "OCR_REFERENCE_PATH", default_value = "assets/e13b-reference.png")]
    pub reference_path: PathBuf,

    /// Path to the corrections store (JSON lines); unset disables it
    #[arg(long, env = "OCR_CORRECTIONS_PATH")]
    pub corrections_path: Option<PathBuf>,

    /// Run the overlap corrector when a line reports overlap
    #[arg(long, env = "OCR_OVERLAP_CORRECTION", default_value_t = true, action = clap::ArgAction::Set)]
    pub overlap_correction: bool,

    /// Padding around the line rectangle for the overlap ROI
    #[arg(long, env = "OCR_OVERLAP_PADDING", default_value = "5")]
    pub overlap_padding: i32,

    /// Maximum character height for segmenter estimate rectangles
    #[arg(long, env = "OCR_MAX_CHAR_HEIGHT", default_value = "30")]
    pub max_char_height: i32,

    /// Maximum character width for segmenter estimate rectangles
    #[arg(long, env = "OCR_MAX_CHAR_WIDTH", default_value = "28")]
    pub max_char_width: i32,

    /// Maximum character area (height x width)
    #[arg(long, env = "OCR_MAX_CHAR_AREA", default_value = "840")]
    pub max_char_area: i32,

    /// Contour filter: minimum filled area
    #[arg(long, env = "OCR_MIN_CONTOUR_AREA", default_value = "20")]
    pub min_contour_area: i32,

    /// Contour filter: minimum height
    #[arg(long, env = "OCR_MIN_CONTOUR_HEIGHT", default_value = "7")]
    pub min_contour_height: i32,

    /// Contour filter: minimum width
    #[arg(long, env = "OCR_MIN_CONTOUR_WIDTH", default_value = "3")]
    pub min_contour_width: i32,

    /// Widest in-word gap considered part of the same word
    #[arg(long, env = "OCR_MAX_SPACE_BETWEEN_CHARS_OF_WORD", default_value = "15")]
    pub max_space_between_chars_of_word: i32,

    /// Widest gap considered part of the same line
    #[arg(long, env = "OCR_MAX_SPACE_BETWEEN_WORDS", default_value = "200")]
    pub max_space_between_words: i32,

    /// Per-character choice list length in translator details
    #[arg(long, env = "OCR_MAX_TRANSLATOR_CHOICES", default_value = "3")]
    pub max_translator_choices: usize,

    /// Template score (0-100) at which the anchor search stops early
    #[arg(long, env = "OCR_ANCHOR_STOP_SCORE", default_value = "90")]
    pub anchor_stop_score: u8,

    /// Adaptive threshold block size (odd, at least 3)
    #[arg(long, env = "OCR_BINARIZE_BLOCK_SIZE", default_value = "19")]
    pub binarize_block_size: u32,

    /// Adaptive threshold constant subtracted from the local mean
    #[arg(long, env = "OCR_BINARIZE_C", default_value = "1")]
    pub binarize_c: i32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "OCR_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log a line when a request takes longer than this; 0 disables
    #[arg(long, env = "OCR_SLOW_REQUEST_MS", default_value = "0")]
    pub slow_request_ms: u64,

    /// Log a line when a request is still running after this; 0 disables
    #[arg(long, env = "OCR_HUNG_REQUEST_MS", default_value = "0")]
    pub hung_request_ms: u64,

    /// Level for slow/hung watchdog lines
    #[arg(long, env = "OCR_SLOW_OR_HUNG_REQUEST_LOG_LEVEL", default_value = "debug")]
    pub slow_or_hung_request_log_level: String,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_file_size: usize,
    pub reference_path: PathBuf,
    pub corrections_path: Option<PathBuf>,
    pub overlap_correction: bool,
    pub overlap_padding: i32,
    pub max_char_height: i32,
    pub max_char_width: i32,
    pub max_char_area: i32,
    pub min_contour_area: i32,
    pub min_contour_height: i32,
    pub min_contour_width: i32,
    pub max_space_between_chars_of_word: i32,
    pub max_space_between_words: i32,
    pub max_translator_choices: usize,
    pub anchor_stop_score: u8,
    pub binarize_block_size: u32,
    pub binarize_c: i32,
    pub log_level: String,
    pub slow_request_ms: u64,
    pub hung_request_ms: u64,
    pub slow_or_hung_request_log_level: String,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            max_file_size: args.max_file_size,
            reference_path: args.reference_path,
            corrections_path: args.corrections_path,
            overlap_correction: args.overlap_correction,
            overlap_padding: args.overlap_padding,
            max_char_height: args.max_char_height,
            max_char_width: args.max_char_width,
            max_char_area: args.max_char_area,
            min_contour_area: args.min_contour_area,
            min_contour_height: args.min_contour_height,
            min_contour_width: args.min_contour_width,
            max_space_between_chars_of_word: args.max_space_between_chars_of_word,
            max_space_between_words: args.max_space_between_words,
            max_translator_choices: args.max_translator_choices,
            anchor_stop_score: args.anchor_stop_score,
            binarize_block_size: args.binarize_block_size,
            binarize_c: args.binarize_c,
            log_level: args.log_level,
            slow_request_ms: args.slow_request_ms,
            hung_request_ms: args.hung_request_ms,
            slow_or_hung_request_log_level: args.slow_or_hung_request_log_level,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::from(Args::parse_from(["micr-scan-server"]))
    }
}

impl Config {
    /// Reject configurations that can only fail later.
    pub fn validate(&self) -> Result<(), MicrError> {
        parse_level(&self.log_level)?;
        parse_level(&self.slow_or_hung_request_log_level)?;
        if self.binarize_block_size < 3 || self.binarize_block_size % 2 == 0 {
            return Err(MicrError::Configuration(format!(
                "adaptive threshold block size must be odd and at least 3, got {}",
                self.binarize_block_size
            )));
        }
        Ok(())
    }
}

/// Parse a log level name; unknown names are a configuration error.
pub fn parse_level(name: &str) -> Result<tracing::Level, MicrError> {
    match name.to_lowercase().as_str() {
        "trace" => Ok(tracing::Level::TRACE),
        "debug" => Ok(tracing::Level::DEBUG),
        "info" => Ok(tracing::Level::INFO),
        "warn" => Ok(tracing::Level::WARN),
        "error" => Ok(tracing::Level::ERROR),
        other => Err(MicrError::Configuration(format!(
            "invalid log level '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.overlap_correction);
        assert_eq!(config.overlap_padding, 5);
        assert_eq!(config.max_char_area, 840);
    }

    #[test]
    fn even_block_size_is_rejected() {
        let config = Config {
            binarize_block_size: 20,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let config = Config {
            log_level: "loud".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
