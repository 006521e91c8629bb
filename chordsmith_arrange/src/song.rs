// Song description: the JSON a user writes to get a MIDI file.
//
// A `SongConfig` carries the composition-level settings (title, tempo, meter,
// base octave, seed) and a list of track specs tagged by `kind`:
// `progression`, `random_progression`, `melody`, `chord_bass`, `drums`, or
// `polyrhythm`. `build` runs each spec's
// generator in order against one seeded `Dice` and collects the resulting
// tracks into a `Composition`.
//
// Example:
//
//   {
//     "title": "Sketch",
//     "tempo": 96,
//     "time_signature": [4, 4],
//     "seed": 7,
//     "tracks": [
//       {"kind": "progression", "name": "Keys", "program": 4,
//        "parts": [{"key": "A", "scale_type": "minor_natural",
//                   "degrees": [1, 6, 3, 7]}]},
//       {"kind": "drums", "patterns": {"kick": [1,0,0,0, 1,0,0,0, 1,0,0,0, 1,0,0,0]},
//        "measures": 4}
//     ]
//   }

use crate::chord_bass::ChordBassSpec;
use crate::dice::Dice;
use crate::drums::DrumSpec;
use crate::error::{Error, Result};
use crate::melody::MelodySpec;
use crate::polyrhythm::PolyrhythmSpec;
use crate::progression::ProgressionSpec;
use crate::random_progression::RandomProgressionSpec;
use chordsmith_core::{Composition, Theory, TimeSignature, Track};
use serde::Deserialize;
use std::path::Path;

/// Track-level settings shared by the pitched generators.
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub program: u8,
    #[serde(default)]
    pub channel: u8,
    #[serde(default = "default_pan")]
    pub pan: u8,
    #[serde(default = "default_volume")]
    pub volume: u8,
}

fn default_pan() -> u8 {
    chordsmith_core::timeline::DEFAULT_PAN
}

fn default_volume() -> u8 {
    chordsmith_core::timeline::DEFAULT_VOLUME
}

impl Default for VoiceSpec {
    fn default() -> Self {
        VoiceSpec {
            name: None,
            program: 0,
            channel: 0,
            pan: default_pan(),
            volume: default_volume(),
        }
    }
}

impl VoiceSpec {
    pub fn name_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(fallback)
    }

    /// An empty track carrying these settings.
    pub fn track(&self, fallback_name: &str) -> Result<Track> {
        Ok(Track::new(self.name_or(fallback_name), self.program, self.channel)?
            .with_pan(self.pan)?
            .with_volume(self.volume)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackSpec {
    Progression(ProgressionSpec),
    RandomProgression(RandomProgressionSpec),
    Melody(MelodySpec),
    ChordBass(ChordBassSpec),
    Drums(DrumSpec),
    Polyrhythm(PolyrhythmSpec),
}

/// What every generator gets to work with.
pub struct Context<'a> {
    pub theory: &'a Theory,
    pub base_octave: i32,
    pub time_signature: TimeSignature,
    pub dice: Dice,
}

impl TrackSpec {
    pub fn build(&self, ctx: &mut Context<'_>) -> Result<Vec<Track>> {
        match self {
            TrackSpec::Progression(spec) => Ok(vec![spec.build(ctx)?]),
            TrackSpec::RandomProgression(spec) => Ok(vec![spec.build(ctx)?]),
            TrackSpec::Melody(spec) => Ok(vec![spec.build(ctx)?]),
            TrackSpec::ChordBass(spec) => spec.build(ctx),
            TrackSpec::Drums(spec) => Ok(vec![spec.build(ctx)?]),
            TrackSpec::Polyrhythm(spec) => spec.build(ctx),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TrackSpec::Progression(_) => "progression",
            TrackSpec::RandomProgression(_) => "random_progression",
            TrackSpec::Melody(_) => "melody",
            TrackSpec::ChordBass(_) => "chord_bass",
            TrackSpec::Drums(_) => "drums",
            TrackSpec::Polyrhythm(_) => "polyrhythm",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SongConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_tempo")]
    pub tempo: f64,
    #[serde(default)]
    pub time_signature: TimeSignature,
    /// Octave that chord symbols and octave offsets are relative to.
    #[serde(default = "default_base_octave")]
    pub base_octave: i32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub tracks: Vec<TrackSpec>,
}

fn default_title() -> String {
    "Untitled Composition".to_string()
}

fn default_tempo() -> f64 {
    120.0
}

fn default_base_octave() -> i32 {
    4
}

impl SongConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Run every track generator and assemble the composition.
    pub fn build(&self, theory: &Theory, seed: u64) -> Result<Composition> {
        let mut composition = Composition::new(&self.title, self.tempo, self.time_signature)?;
        let mut ctx = Context {
            theory,
            base_octave: self.base_octave,
            time_signature: self.time_signature,
            dice: Dice::new(seed),
        };
        for spec in &self.tracks {
            for track in spec.build(&mut ctx)? {
                tracing::debug!(
                    kind = spec.kind(),
                    track = track.name(),
                    elements = track.elements().len(),
                    "generated track"
                );
                composition.add_track(track);
            }
        }
        Ok(composition)
    }
}
