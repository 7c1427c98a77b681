//! Per-request split configuration.
//!
//! A `SplitConfig` is resolved once by the caller and never mutated inside
//! the pipeline. All fields serialize cleanly so the frontend shell can pass
//! the configuration across its boundary as JSON.

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::error::SplitError;

/// Default number of data rows per output part.
pub const DEFAULT_CHUNK_SIZE: usize = 5_000;

/// Output format for the serialized parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Excel,
    Csv,
}

impl OutputFormat {
    /// File extension for parts written in this format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Excel => "xlsx",
            OutputFormat::Csv => "csv",
        }
    }
}

/// Delimiter and text encoding for reading or writing CSV data.
///
/// The encoding is a WHATWG label such as `utf-8`, `latin-1` or
/// `windows-1252`, resolved at run time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvDialect {
    pub delimiter: u8,
    pub encoding: String,
}

impl Default for CsvDialect {
    fn default() -> Self {
        Self {
            delimiter: b',',
            encoding: "utf-8".into(),
        }
    }
}

impl CsvDialect {
    /// Sets the field delimiter.
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets the text encoding by label.
    pub fn encoding(mut self, label: &str) -> Self {
        self.encoding = label.into();
        self
    }

    /// Resolves the configured encoding label.
    ///
    /// Spellings like `latin-1` or `latin_1` are accepted alongside the
    /// canonical `latin1` label.
    ///
    /// # Errors
    ///
    /// Returns `SplitError::Config` if the label is not a known encoding.
    pub(crate) fn resolve_encoding(&self) -> Result<&'static Encoding, SplitError> {
        let label = self.encoding.trim();
        Encoding::for_label(label.as_bytes())
            .or_else(|| Encoding::for_label(label.replace(['-', '_'], "").as_bytes()))
            .ok_or_else(|| SplitError::Config(format!("Unknown text encoding: {}", self.encoding)))
    }
}

/// How the per-request disambiguating token is produced.
///
/// The token is appended to every part name and to the archive name so that
/// two uploads with the same base name never collide when both archives are
/// retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPolicy {
    /// No token. Matches the bare `<base>_parte_<n>.<ext>` naming.
    None,
    /// Request timestamp, `YYYYMMDDHHMMSS`.
    Timestamp,
    /// Caller-supplied token. Useful for deterministic output names.
    Fixed(String),
}

impl TokenPolicy {
    /// Resolves the policy into a concrete token for one request.
    pub fn resolve(&self) -> Option<String> {
        match self {
            TokenPolicy::None => None,
            TokenPolicy::Timestamp => {
                Some(chrono::Utc::now().format("%Y%m%d%H%M%S").to_string())
            }
            TokenPolicy::Fixed(token) => Some(token.clone()),
        }
    }
}

/// Immutable configuration for one split request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Maximum data rows per part.
    pub chunk_size: usize,
    /// Format of the serialized parts.
    pub output: OutputFormat,
    /// Dialect used to parse CSV input.
    pub input_dialect: CsvDialect,
    /// Dialect used to write CSV parts. Independent of the input dialect.
    pub output_dialect: CsvDialect,
    /// Read CSV input incrementally instead of materializing the whole table.
    pub stream_csv: bool,
    /// Token appended to output names.
    pub token: TokenPolicy,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            output: OutputFormat::Excel,
            input_dialect: CsvDialect::default(),
            output_dialect: CsvDialect::default(),
            stream_csv: true,
            token: TokenPolicy::Timestamp,
        }
    }
}

impl SplitConfig {
    /// Sets the maximum data rows per part.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the output format.
    pub fn output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    /// Sets the dialect used to parse CSV input.
    pub fn input_dialect(mut self, dialect: CsvDialect) -> Self {
        self.input_dialect = dialect;
        self
    }

    /// Sets the dialect used to write CSV parts.
    pub fn output_dialect(mut self, dialect: CsvDialect) -> Self {
        self.output_dialect = dialect;
        self
    }

    /// Enables or disables incremental CSV reading.
    pub fn stream_csv(mut self, stream: bool) -> Self {
        self.stream_csv = stream;
        self
    }

    /// Sets the token policy for output names.
    pub fn token(mut self, token: TokenPolicy) -> Self {
        self.token = token;
        self
    }
}
