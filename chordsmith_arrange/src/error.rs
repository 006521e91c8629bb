// Errors raised while turning a song description into a composition.
//
// Core failures (bad ranges, unknown scales, malformed chord symbols) pass
// through unchanged; the variants here cover the arrangement layer's own
// inputs.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] chordsmith_core::Error),
    #[error("song config parse error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Diatonic degrees are 1-based and heptatonic.
    #[error("scale degree {degree} in part '{part}' is outside 1..=7")]
    InvalidDegree { part: String, degree: u32 },
    #[error("unknown drum '{0}'")]
    UnknownDrum(String),
    #[error("pattern for '{drum}' has {found} steps, expected {expected}")]
    PatternLength {
        drum: String,
        expected: usize,
        found: usize,
    },
    /// A generator setting that can't produce music (empty pools, negative
    /// lengths and the like).
    #[error("track '{track}': invalid {field} ({reason})")]
    Parameter {
        track: String,
        field: &'static str,
        reason: &'static str,
    },
}

impl Error {
    pub(crate) fn parameter(track: &str, field: &'static str, reason: &'static str) -> Self {
        Error::Parameter {
            track: track.to_string(),
            field,
            reason,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
