// Step-sequenced drum track on the General MIDI percussion channel.
//
// Each pattern row names a drum and lists one velocity marker per step of a
// measure (`beats_per_measure * subdivisions` steps): 0 is silence, 1 plays
// at `default_velocity`, anything higher is the velocity itself (capped at
// 127). The measure repeats `measures` times. Rows are laid down in drum-name
// order so the output doesn't depend on JSON key order.

use crate::error::{Error, Result};
use crate::song::Context;
use chordsmith_core::{Note, Track};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Channel 10 in 1-based numbering.
pub const DRUM_CHANNEL: u8 = 9;

/// General MIDI percussion key map (subset).
pub const GM_DRUMS: &[(&str, u8)] = &[
    ("acoustic_kick", 35),
    ("kick", 36),
    ("side_stick", 37),
    ("snare", 38),
    ("clap", 39),
    ("electric_snare", 40),
    ("closed_hat", 42),
    ("pedal_hat", 44),
    ("low_tom", 45),
    ("open_hat", 46),
    ("mid_tom", 47),
    ("crash1", 49),
    ("high_tom", 50),
    ("ride1", 51),
    ("ride_bell", 53),
    ("cowbell", 56),
    ("crash2", 57),
];

pub fn drum_key(name: &str) -> Option<u8> {
    GM_DRUMS
        .iter()
        .find(|(drum, _)| *drum == name)
        .map(|&(_, key)| key)
}

#[derive(Debug, Clone, Deserialize)]
pub struct DrumSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_pan")]
    pub pan: u8,
    #[serde(default = "default_volume")]
    pub volume: u8,
    pub patterns: BTreeMap<String, Vec<u32>>,
    #[serde(default = "default_measures")]
    pub measures: u32,
    /// Defaults to the song's time-signature numerator.
    #[serde(default)]
    pub beats_per_measure: Option<u32>,
    #[serde(default = "default_subdivisions")]
    pub subdivisions: u32,
    #[serde(default = "default_velocity")]
    pub default_velocity: u8,
    #[serde(default = "default_hit_length")]
    pub hit_length: f64,
}

fn default_pan() -> u8 {
    chordsmith_core::timeline::DEFAULT_PAN
}

fn default_volume() -> u8 {
    chordsmith_core::timeline::DEFAULT_VOLUME
}

fn default_measures() -> u32 {
    1
}

fn default_subdivisions() -> u32 {
    4
}

fn default_velocity() -> u8 {
    100
}

fn default_hit_length() -> f64 {
    0.1
}

impl DrumSpec {
    pub fn build(&self, ctx: &mut Context<'_>) -> Result<Track> {
        let mut track = Track::new(self.name.as_deref().unwrap_or("Drums"), 0, DRUM_CHANNEL)?
            .with_pan(self.pan)?
            .with_volume(self.volume)?;

        let beats_per_measure = self
            .beats_per_measure
            .unwrap_or_else(|| u32::from(ctx.time_signature.numerator()));
        if self.subdivisions == 0 || beats_per_measure == 0 {
            return Err(Error::parameter(
                track.name(),
                "subdivisions",
                "measures need at least one step",
            ));
        }
        let steps = beats_per_measure
            .checked_mul(self.subdivisions)
            .and_then(|steps| usize::try_from(steps).ok())
            .ok_or_else(|| {
                Error::parameter(track.name(), "beats_per_measure", "too many steps per measure")
            })?;
        let step_beats = 1.0 / f64::from(self.subdivisions);

        let mut rows = Vec::with_capacity(self.patterns.len());
        for (drum, pattern) in &self.patterns {
            let key = drum_key(drum).ok_or_else(|| Error::UnknownDrum(drum.clone()))?;
            if pattern.len() != steps {
                return Err(Error::PatternLength {
                    drum: drum.clone(),
                    expected: steps,
                    found: pattern.len(),
                });
            }
            rows.push((key, pattern));
        }

        for measure in 0..self.measures {
            let measure_start = f64::from(measure) * f64::from(beats_per_measure);
            for &(key, pattern) in &rows {
                for (step, &marker) in pattern.iter().enumerate() {
                    let velocity = match marker {
                        0 => continue,
                        1 => self.default_velocity,
                        v => v.min(127) as u8,
                    };
                    let start = measure_start + step as f64 * step_beats;
                    track.add_element(Note::new(key, start, self.hit_length, velocity)?)?;
                }
            }
        }
        Ok(track)
    }
}
