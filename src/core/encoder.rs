//! Record encoders
//!
//! Two encodings are provided:
//! - JSON: one machine-readable object per line
//! - Console: tab-separated human-readable line, fields appended as JSON
//!
//! Encoding never fails. Values that cannot be represented degrade to strings.

use super::error::LoggerError;
use super::field::Field;
use super::record::LogRecord;
use chrono::SecondsFormat;

/// Name accepted by [`build_encoder`] for the JSON encoder
pub const JSON_ENCODER: &str = "json";
/// Name accepted by [`build_encoder`] for the console encoder
pub const CONSOLE_ENCODER: &str = "console";

pub const LEVEL_KEY: &str = "level";
pub const TIME_KEY: &str = "ts";
pub const CALLER_KEY: &str = "caller";
pub const MESSAGE_KEY: &str = "msg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderKind {
    /// Machine-readable JSON lines
    Json,
    /// Human-readable text
    Console,
}

impl EncoderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncoderKind::Json => JSON_ENCODER,
            EncoderKind::Console => CONSOLE_ENCODER,
        }
    }
}

/// Turns a [`LogRecord`] into one line of bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoder {
    kind: EncoderKind,
    colors: bool,
}

impl Encoder {
    #[must_use]
    pub const fn json() -> Self {
        Self {
            kind: EncoderKind::Json,
            colors: false,
        }
    }

    #[must_use]
    pub const fn console() -> Self {
        Self {
            kind: EncoderKind::Console,
            colors: false,
        }
    }

    /// Color the level name in console output
    ///
    /// Has no effect on JSON output, or when the `console` feature is off.
    #[must_use]
    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }

    pub fn kind(&self) -> EncoderKind {
        self.kind
    }

    /// Encode a record, including the trailing newline
    pub fn encode(&self, record: &LogRecord) -> Vec<u8> {
        let mut line = match self.kind {
            EncoderKind::Json => self.encode_json(record),
            EncoderKind::Console => self.encode_console(record),
        };
        line.push('\n');
        line.into_bytes()
    }

    fn encode_json(&self, record: &LogRecord) -> String {
        let mut json_obj = fields_to_map(&record.fields);

        // Reserved keys win over fields of the same name
        json_obj.insert(
            LEVEL_KEY.to_string(),
            serde_json::Value::String(record.level.as_lowercase().to_string()),
        );
        json_obj.insert(
            TIME_KEY.to_string(),
            serde_json::Value::String(format_timestamp(record)),
        );
        if let Some(ref caller) = record.caller {
            json_obj.insert(
                CALLER_KEY.to_string(),
                serde_json::Value::String(caller.short()),
            );
        }
        json_obj.insert(
            MESSAGE_KEY.to_string(),
            serde_json::Value::String(record.message.clone()),
        );

        serde_json::to_string(&serde_json::Value::Object(json_obj)).unwrap_or_else(|e| {
            format!(
                "{{\"{}\":\"{}\",\"encoding_error\":\"{}\"}}",
                MESSAGE_KEY,
                escape_json(&record.message),
                escape_json(&e.to_string())
            )
        })
    }

    fn encode_console(&self, record: &LogRecord) -> String {
        let mut parts = vec![format_timestamp(record), self.level_text(record)];

        if let Some(ref caller) = record.caller {
            parts.push(caller.short());
        }
        parts.push(record.message.clone());

        if !record.fields.is_empty() {
            let fields = serde_json::Value::Object(fields_to_map(&record.fields));
            parts.push(fields.to_string());
        }

        parts.join("\t")
    }

    #[cfg(feature = "console")]
    fn level_text(&self, record: &LogRecord) -> String {
        use colored::Colorize;

        if self.colors {
            record
                .level
                .to_str()
                .color(record.level.color_code())
                .to_string()
        } else {
            record.level.to_str().to_string()
        }
    }

    #[cfg(not(feature = "console"))]
    fn level_text(&self, record: &LogRecord) -> String {
        record.level.to_str().to_string()
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::json()
    }
}

/// Requested encoder name was not recognized
///
/// Still carries a usable JSON encoder so callers that prefer to continue can
/// do so with [`UnsupportedEncoder::into_fallback`].
#[derive(Debug, thiserror::Error)]
#[error("unsupported encoder type '{requested}', falling back to JSON")]
pub struct UnsupportedEncoder {
    pub requested: String,
    fallback: Encoder,
}

impl UnsupportedEncoder {
    pub fn fallback(&self) -> Encoder {
        self.fallback
    }

    pub fn into_fallback(self) -> Encoder {
        self.fallback
    }
}

impl From<UnsupportedEncoder> for LoggerError {
    fn from(err: UnsupportedEncoder) -> Self {
        LoggerError::UnsupportedEncoder {
            requested: err.requested,
        }
    }
}

/// Resolve an encoder by name (`"json"` or `"console"`, case-insensitive)
pub fn build_encoder(name: &str) -> Result<Encoder, UnsupportedEncoder> {
    match name.trim().to_ascii_lowercase().as_str() {
        JSON_ENCODER => Ok(Encoder::json()),
        CONSOLE_ENCODER => Ok(Encoder::console()),
        _ => Err(UnsupportedEncoder {
            requested: name.to_string(),
            fallback: Encoder::json(),
        }),
    }
}

/// Flatten fields into a JSON object, later duplicates replacing earlier ones
pub fn fields_to_map(fields: &[Field]) -> serde_json::Map<String, serde_json::Value> {
    let mut map = serde_json::Map::with_capacity(fields.len());
    for field in fields {
        map.insert(field.key().to_string(), field.value().to_json_value());
    }
    map
}

fn format_timestamp(record: &LogRecord) -> String {
    record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
