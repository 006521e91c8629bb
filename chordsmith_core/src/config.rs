// Explicit, immutable configuration for the resolver and the encoder.
//
// Nothing in the pipeline reads module-level tables or magic numbers: the
// theory tables and the tick resolution are values handed in at call time.
// Both load from JSON (typed struct out) and have a named standard
// constructor.
//
// `TheoryTables` holds:
// - `scales`: scale name -> semitone intervals from the tonic
// - `diatonic_qualities`: scale name -> chord quality per scale degree
// - `voicings`: chord quality -> semitone intervals from the chord root
// - `default_quality`: substituted when a quality token matches nothing
// - `onset_decimals`: rounding precision for polyrhythm onsets
//
// `RenderConfig` holds the tick resolution shared by the scheduler and the
// SMF header.
//
// See also: `theory.rs` (consumes `TheoryTables`), `schedule.rs` and `smf.rs`
// (consume `RenderConfig`).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Standard tick resolution (ticks per quarter-note beat).
pub const DEFAULT_TICKS_PER_BEAT: u16 = 480;

/// The largest time division a metrical SMF header can declare (15 bits).
pub const MAX_TICKS_PER_BEAT: u16 = 0x7FFF;

/// Highest rounding precision accepted for polyrhythm onsets.
const MAX_ONSET_DECIMALS: u32 = 9;

// ---------------------------------------------------------------------------
// Theory tables
// ---------------------------------------------------------------------------

/// Music-theory lookup tables.
///
/// `maj7` and `dom7` are distinct entries: `maj7` is the major seventh
/// `[0, 4, 7, 11]`, `dom7` the dominant seventh `[0, 4, 7, 10]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TheoryTables {
    pub scales: BTreeMap<String, Vec<u8>>,
    pub diatonic_qualities: BTreeMap<String, Vec<String>>,
    pub voicings: BTreeMap<String, Vec<u8>>,
    #[serde(default = "default_quality")]
    pub default_quality: String,
    #[serde(default = "default_onset_decimals")]
    pub onset_decimals: u32,
}

fn default_quality() -> String {
    "maj".to_string()
}

fn default_onset_decimals() -> u32 {
    5
}

impl TheoryTables {
    /// The canonical tables: six scales, diatonic qualities for the three
    /// heptatonic ones (degree V of major and harmonic minor is a dominant
    /// seventh), and the full voicing vocabulary in both long (`min7`) and
    /// short (`m7`) spellings.
    pub fn standard() -> Self {
        let scales = [
            ("major", vec![0, 2, 4, 5, 7, 9, 11]),
            ("minor_natural", vec![0, 2, 3, 5, 7, 8, 10]),
            ("minor_harmonic", vec![0, 2, 3, 5, 7, 8, 11]),
            ("pentatonic_major", vec![0, 2, 4, 7, 9]),
            ("pentatonic_minor", vec![0, 3, 5, 7, 10]),
            ("blues", vec![0, 3, 5, 6, 7, 10]),
        ];

        let diatonic_qualities = [
            ("major", ["maj", "min", "min", "maj", "dom7", "min", "dim"]),
            (
                "minor_natural",
                ["min", "dim", "maj", "min", "min", "maj", "maj"],
            ),
            (
                "minor_harmonic",
                ["min", "dim", "maj(aug)", "min", "dom7", "maj", "dim"],
            ),
        ];

        let voicings: &[(&str, &[u8])] = &[
            // Triads
            ("maj", &[0, 4, 7]),
            ("min", &[0, 3, 7]),
            ("m", &[0, 3, 7]),
            ("dim", &[0, 3, 6]),
            ("aug", &[0, 4, 8]),
            ("maj(aug)", &[0, 4, 8]),
            ("sus2", &[0, 2, 7]),
            ("sus4", &[0, 5, 7]),
            // Sevenths
            ("maj7", &[0, 4, 7, 11]),
            ("dom7", &[0, 4, 7, 10]),
            ("7", &[0, 4, 7, 10]),
            ("min7", &[0, 3, 7, 10]),
            ("m7", &[0, 3, 7, 10]),
            ("dim7", &[0, 3, 6, 9]),
            ("m7b5", &[0, 3, 6, 10]),
            ("min7b5", &[0, 3, 6, 10]),
            ("min(maj7)", &[0, 3, 7, 11]),
            // Added tones and ninths
            ("add9", &[0, 4, 7, 14]),
            ("min(add9)", &[0, 3, 7, 14]),
            ("m(add9)", &[0, 3, 7, 14]),
            ("maj9", &[0, 4, 7, 11, 14]),
            ("min9", &[0, 3, 7, 10, 14]),
            ("m9", &[0, 3, 7, 10, 14]),
            ("dom9", &[0, 4, 7, 10, 14]),
            ("9", &[0, 4, 7, 10, 14]),
            // Altered dominants
            ("dom7#9", &[0, 4, 7, 10, 15]),
            ("7#9", &[0, 4, 7, 10, 15]),
            ("dom7b9", &[0, 4, 7, 10, 13]),
            ("7b9", &[0, 4, 7, 10, 13]),
            // Elevenths and thirteenths
            ("11", &[0, 4, 7, 10, 14, 17]),
            ("min11", &[0, 3, 7, 10, 14, 17]),
            ("m11", &[0, 3, 7, 10, 14, 17]),
            ("maj7#11", &[0, 4, 7, 11, 18]),
            ("#11", &[0, 4, 7, 11, 14, 18]),
            ("dom13", &[0, 4, 7, 10, 14, 21]),
            ("13", &[0, 4, 7, 10, 14, 21]),
            ("maj13", &[0, 4, 7, 11, 14, 21]),
            ("min13", &[0, 3, 7, 10, 14, 21]),
            ("m13", &[0, 3, 7, 10, 14, 21]),
        ];

        TheoryTables {
            scales: scales
                .into_iter()
                .map(|(name, intervals)| (name.to_string(), intervals))
                .collect(),
            diatonic_qualities: diatonic_qualities
                .into_iter()
                .map(|(name, qualities)| {
                    (
                        name.to_string(),
                        qualities.iter().map(|q| q.to_string()).collect(),
                    )
                })
                .collect(),
            voicings: voicings
                .iter()
                .map(|(name, intervals)| (name.to_string(), intervals.to_vec()))
                .collect(),
            default_quality: default_quality(),
            onset_decimals: default_onset_decimals(),
        }
    }

    /// Parse tables from a JSON string and validate them.
    pub fn from_json(json: &str) -> Result<Self> {
        let tables: TheoryTables = serde_json::from_str(json)?;
        tables.validate()?;
        Ok(tables)
    }

    /// Check cross-table consistency: every scale is non-empty, every
    /// diatonic quality table covers each degree of its scale with a known
    /// voicing, and the default quality has a voicing.
    pub fn validate(&self) -> Result<()> {
        for (name, intervals) in &self.scales {
            if intervals.is_empty() {
                return Err(Error::validation(
                    "scales",
                    name,
                    "at least one interval per scale",
                ));
            }
        }
        for (scale, qualities) in &self.diatonic_qualities {
            let Some(intervals) = self.scales.get(scale) else {
                return Err(Error::UnknownScale(scale.clone()));
            };
            if qualities.len() != intervals.len() {
                return Err(Error::validation(
                    "diatonic_qualities",
                    format!("{scale} has {} entries", qualities.len()),
                    "one quality per scale degree",
                ));
            }
            if let Some(missing) = qualities.iter().find(|q| !self.voicings.contains_key(*q)) {
                return Err(Error::validation(
                    "diatonic_qualities",
                    missing,
                    "a quality with a voicing",
                ));
            }
        }
        if self.voicings.values().any(|v| v.is_empty()) {
            return Err(Error::validation(
                "voicings",
                "empty interval list",
                "at least one interval per voicing",
            ));
        }
        if !self.voicings.contains_key(&self.default_quality) {
            return Err(Error::validation(
                "default_quality",
                &self.default_quality,
                "a quality with a voicing",
            ));
        }
        if self.onset_decimals > MAX_ONSET_DECIMALS {
            return Err(Error::validation(
                "onset_decimals",
                self.onset_decimals,
                "0..=9",
            ));
        }
        Ok(())
    }
}

impl Default for TheoryTables {
    fn default() -> Self {
        Self::standard()
    }
}

// ---------------------------------------------------------------------------
// Render config
// ---------------------------------------------------------------------------

/// Settings for scheduling and encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Ticks per quarter-note beat; also the SMF header's time division.
    #[serde(default = "default_ticks_per_beat")]
    pub ticks_per_beat: u16,
}

fn default_ticks_per_beat() -> u16 {
    DEFAULT_TICKS_PER_BEAT
}

impl RenderConfig {
    pub fn new(ticks_per_beat: u16) -> Result<Self> {
        let config = RenderConfig { ticks_per_beat };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: RenderConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ticks_per_beat == 0 || self.ticks_per_beat > MAX_TICKS_PER_BEAT {
            return Err(Error::validation(
                "ticks_per_beat",
                self.ticks_per_beat,
                "1..=32767",
            ));
        }
        Ok(())
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            ticks_per_beat: DEFAULT_TICKS_PER_BEAT,
        }
    }
}
