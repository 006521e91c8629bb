// Polyrhythmic arpeggiator.
//
// Several evenly spaced pulses (`hits`, e.g. 3 against 2) are flattened over
// one cycle into a single onset list, and the cycle repeats until
// `total_beats`. At each onset a random tone of the chord currently active in
// `progression` is struck. Each progression entry holds for its `beats`; the
// generator stops early once the progression runs out.
//
// With `pad` set, a second track holds each progression chord as a sustained
// block, so the harmony under the arpeggio is audible.

use crate::error::{Error, Result};
use crate::song::{Context, VoiceSpec};
use chordsmith_core::{Chord, Note, Track};
use serde::Deserialize;

const VELOCITY: (u8, u8) = (90, 115);
const PAD_VELOCITY: u8 = 80;

#[derive(Debug, Clone, Deserialize)]
pub struct ChordEntry {
    pub root: String,
    /// Quality suffix; empty means the default quality.
    #[serde(default)]
    pub quality: String,
    /// Absolute octave; the song's base octave when absent.
    #[serde(default)]
    pub octave: Option<i32>,
    #[serde(default)]
    pub inversion: usize,
    pub beats: f64,
}

impl ChordEntry {
    pub fn symbol(&self) -> String {
        format!("{}{}", self.root, self.quality)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolyrhythmSpec {
    #[serde(flatten)]
    pub voice: VoiceSpec,
    pub hits: Vec<u32>,
    #[serde(default = "default_cycle_beats")]
    pub cycle_beats: f64,
    pub total_beats: f64,
    #[serde(default = "default_note_length")]
    pub note_length: f64,
    pub progression: Vec<ChordEntry>,
    #[serde(default)]
    pub pad: Option<VoiceSpec>,
}

fn default_cycle_beats() -> f64 {
    4.0
}

fn default_note_length() -> f64 {
    0.2
}

/// The chord sounding over `[start, end)`.
struct ActiveChord {
    end: f64,
    pitches: Vec<u8>,
}

impl PolyrhythmSpec {
    fn validate(&self, track: &str) -> Result<()> {
        if !self.total_beats.is_finite() || self.total_beats <= 0.0 {
            return Err(Error::parameter(track, "total_beats", "must be positive"));
        }
        if self.progression.is_empty() {
            return Err(Error::parameter(track, "progression", "needs at least one chord"));
        }
        if self
            .progression
            .iter()
            .any(|entry| !entry.beats.is_finite() || entry.beats <= 0.0)
        {
            return Err(Error::parameter(track, "progression", "chord lengths must be positive"));
        }
        Ok(())
    }

    fn voice_entry(
        &self,
        ctx: &Context<'_>,
        entry: &ChordEntry,
        start: f64,
        pad: Option<&mut Track>,
    ) -> Result<ActiveChord> {
        let octave = entry.octave.unwrap_or(ctx.base_octave);
        let pitches = ctx
            .theory
            .chord_pitches(&entry.symbol(), octave, 0, entry.inversion)?;
        tracing::debug!(beat = start, chord = %entry.symbol(), ?pitches, "chord change");
        if let Some(pad) = pad {
            pad.add_element(Chord::from_pitches(&pitches, start, entry.beats, PAD_VELOCITY)?)?;
        }
        Ok(ActiveChord {
            end: start + entry.beats,
            pitches,
        })
    }

    /// The arpeggio track, followed by the pad track when one is configured.
    pub fn build(&self, ctx: &mut Context<'_>) -> Result<Vec<Track>> {
        let mut track = self.voice.track("Polyrhythm")?;
        self.validate(track.name())?;
        let mut pad = self
            .pad
            .as_ref()
            .map(|voice| voice.track("Chord Pads"))
            .transpose()?;

        let onsets = ctx.theory.polyrhythm_onsets(&self.hits, self.cycle_beats)?;
        let mut entries = self.progression.iter();
        let mut chord = match entries.next() {
            Some(entry) => self.voice_entry(ctx, entry, 0.0, pad.as_mut())?,
            None => return Ok(vec![track]),
        };

        let mut cycle = 0u32;
        'cycles: while f64::from(cycle) * self.cycle_beats < self.total_beats {
            let cycle_start = f64::from(cycle) * self.cycle_beats;
            for &onset in &onsets {
                let time = cycle_start + onset;
                if time >= self.total_beats {
                    break 'cycles;
                }
                while time >= chord.end {
                    let Some(entry) = entries.next() else {
                        tracing::debug!(beat = time, "progression exhausted");
                        break 'cycles;
                    };
                    chord = self.voice_entry(ctx, entry, chord.end, pad.as_mut())?;
                }
                let Some(&pitch) = ctx.dice.pick(&chord.pitches) else {
                    continue;
                };
                let velocity = ctx.dice.between(VELOCITY.0, VELOCITY.1);
                track.add_element(Note::new(pitch, time, self.note_length, velocity)?)?;
            }
            cycle += 1;
        }

        let mut tracks = vec![track];
        tracks.extend(pad);
        Ok(tracks)
    }
}
