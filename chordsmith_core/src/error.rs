// Error taxonomy for the resolver-plus-encoder pipeline.
//
// Construction-time range checks, theory-table lookups, and the final export
// all report through one `Error` enum. Only the chord-quality fallback is
// recoverable: it is described by `UnknownQuality`, which is attached to a
// parse result as a diagnostic and logged, never returned as an `Err`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A numeric field outside its legal range at construction time.
    #[error("invalid {field}: {value} (expected {expected})")]
    Validation {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("unknown scale type '{0}'")]
    UnknownScale(String),
    #[error("unknown pitch name '{0}'")]
    UnknownPitchName(String),
    /// The symbol has no recognizable root name.
    #[error("malformed chord symbol '{0}'")]
    MalformedChord(String),
    /// A chord without notes has no start time or duration to serialize.
    #[error("chord with no notes in track '{track}'")]
    EmptyChord { track: String },
    /// A tick too far out to schedule, or a gap wider than a 28-bit delta.
    #[error("event at tick {tick} is out of range for MIDI delta times")]
    TickOverflow { tick: u64 },
    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("midi encode error: {0}")]
    Encode(String),
    #[error("failed to export {}: {source}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn validation(
        field: &'static str,
        value: impl ToString,
        expected: &'static str,
    ) -> Self {
        Error::Validation {
            field,
            value: value.to_string(),
            expected,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Diagnostic for a chord-quality token that matched no voicing. The parser
/// substitutes the configured default quality and carries this record along.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("chord quality '{token}' in '{symbol}' not recognized, using '{substituted}'")]
pub struct UnknownQuality {
    pub symbol: String,
    pub token: String,
    pub substituted: String,
}
