// Chord progression generator.
//
// A progression is a list of parts. Each part names a key and scale and
// either spells its chords out (`symbols`) or picks them by 1-based diatonic
// degree (`degrees`). The part's `inversions`, `octave_pattern`, and
// `rhythm_beats` lists cycle independently against the chord index, and the
// whole chord list repeats `loops` times.
//
// Chords are played in one of two styles:
// - block: every chord tone at once, sounding for 90% of the slot
// - arpeggio: tones walk up and back down the voicing (0,1,2,3,2,1,...),
//   one per `arpeggio_pattern` step, each sounding 95% of its step; the step
//   that would overrun the slot is cut to fit
//
// The symbol `REST` holds a slot of silence.

use crate::error::{Error, Result};
use crate::song::{Context, VoiceSpec};
use chordsmith_core::{Chord, Note, Rest, Track};
use serde::Deserialize;

/// Spelled-out silence in a symbol list.
pub const REST_SYMBOL: &str = "REST";

const BLOCK_SUSTAIN: f64 = 0.9;
const BLOCK_VELOCITY: u8 = 85;
const ARPEGGIO_SUSTAIN: f64 = 0.95;
const ARPEGGIO_VELOCITY: (u8, u8) = (80, 100);

/// Remainders shorter than this are float noise, not music.
pub(crate) const MIN_BEATS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayStyle {
    #[default]
    Block,
    Arpeggio,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub key: String,
    #[serde(default = "default_scale_type")]
    pub scale_type: String,
    #[serde(default)]
    pub symbols: Option<Vec<String>>,
    #[serde(default)]
    pub degrees: Option<Vec<u32>>,
    #[serde(default = "default_zero_usize")]
    pub inversions: Vec<usize>,
    #[serde(default = "default_zero_i32")]
    pub octave_pattern: Vec<i32>,
    #[serde(default = "default_rhythm_beats")]
    pub rhythm_beats: Vec<f64>,
    #[serde(default)]
    pub style: PlayStyle,
    #[serde(default = "default_arpeggio_pattern")]
    pub arpeggio_pattern: Vec<f64>,
    #[serde(default = "default_loops")]
    pub loops: u32,
}

pub(crate) fn default_scale_type() -> String {
    "major".to_string()
}

fn default_zero_usize() -> Vec<usize> {
    vec![0]
}

fn default_zero_i32() -> Vec<i32> {
    vec![0]
}

pub(crate) fn default_rhythm_beats() -> Vec<f64> {
    vec![4.0]
}

pub(crate) fn default_arpeggio_pattern() -> Vec<f64> {
    vec![0.5]
}

fn default_loops() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressionSpec {
    #[serde(flatten)]
    pub voice: VoiceSpec,
    pub parts: Vec<PartSpec>,
}

impl ProgressionSpec {
    pub fn build(&self, ctx: &mut Context<'_>) -> Result<Track> {
        let mut track = self.voice.track("Chord Progression")?;
        let mut time = 0.0;
        for (index, part) in self.parts.iter().enumerate() {
            let part_name = part.name.clone().unwrap_or_else(|| format!("part {}", index + 1));
            time = part.render(&part_name, ctx, &mut track, time)?;
        }
        Ok(track)
    }
}

/// Position in an up-and-back walk over `len` chord tones.
fn up_down_index(step: usize, len: usize) -> usize {
    let top = len.saturating_sub(1);
    let cycle = (top * 2).max(1);
    let pos = step % cycle;
    if pos > top { 2 * top - pos } else { pos }
}

pub(crate) fn check_lengths(track: &str, field: &'static str, values: &[f64]) -> Result<()> {
    if values.is_empty() {
        return Err(Error::parameter(track, field, "needs at least one entry"));
    }
    if values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return Err(Error::parameter(track, field, "beat lengths must be positive"));
    }
    Ok(())
}

impl PartSpec {
    /// The part's chord symbols, one pass (before looping).
    pub fn chord_symbols(&self, part_name: &str, ctx: &Context<'_>) -> Result<Vec<String>> {
        if let Some(symbols) = &self.symbols {
            return Ok(symbols.clone());
        }
        let Some(degrees) = &self.degrees else {
            return Ok(Vec::new());
        };
        let diatonic = ctx.theory.diatonic_chords(&self.key, &self.scale_type)?;
        degrees
            .iter()
            .map(|&degree| {
                (degree as usize)
                    .checked_sub(1)
                    .and_then(|i| diatonic.get(i))
                    .cloned()
                    .ok_or_else(|| Error::InvalidDegree {
                        part: part_name.to_string(),
                        degree,
                    })
            })
            .collect()
    }

    /// Append this part to `track` starting at `start`; returns the end time.
    fn render(
        &self,
        part_name: &str,
        ctx: &mut Context<'_>,
        track: &mut Track,
        start: f64,
    ) -> Result<f64> {
        let track_name = track.name().to_string();
        check_lengths(&track_name, "rhythm_beats", &self.rhythm_beats)?;
        check_lengths(&track_name, "arpeggio_pattern", &self.arpeggio_pattern)?;
        if self.inversions.is_empty() {
            return Err(Error::parameter(&track_name, "inversions", "needs at least one entry"));
        }
        if self.octave_pattern.is_empty() {
            return Err(Error::parameter(
                &track_name,
                "octave_pattern",
                "needs at least one entry",
            ));
        }

        let symbols = self.chord_symbols(part_name, ctx)?;
        if symbols.is_empty() {
            tracing::warn!("part '{part_name}' has no symbols or degrees, skipping");
            return Ok(start);
        }
        tracing::debug!(part = part_name, chords = %symbols.join(" "), "rendering part");

        let mut time = start;
        for _ in 0..self.loops {
            for (i, symbol) in symbols.iter().enumerate() {
                let slot = self.rhythm_beats[i % self.rhythm_beats.len()];
                if symbol == REST_SYMBOL {
                    track.add_element(Rest::new(time, slot)?)?;
                    time += slot;
                    continue;
                }
                let inversion = self.inversions[i % self.inversions.len()];
                let octave_offset = self.octave_pattern[i % self.octave_pattern.len()];
                let pitches =
                    ctx.theory
                        .chord_pitches(symbol, ctx.base_octave, octave_offset, inversion)?;
                play(ctx, track, self.style, &self.arpeggio_pattern, &pitches, time, slot)?;
                time += slot;
            }
        }
        Ok(time)
    }
}

/// Sound `pitches` over the slot `[start, start + slot)` in `style`.
/// `arpeggio_pattern` must already have passed `check_lengths`.
pub(crate) fn play(
    ctx: &mut Context<'_>,
    track: &mut Track,
    style: PlayStyle,
    arpeggio_pattern: &[f64],
    pitches: &[u8],
    start: f64,
    slot: f64,
) -> Result<()> {
    match style {
        PlayStyle::Block => {
            let chord = Chord::from_pitches(pitches, start, slot * BLOCK_SUSTAIN, BLOCK_VELOCITY)?;
            track.add_element(chord)?;
        }
        PlayStyle::Arpeggio => arpeggiate(ctx, track, arpeggio_pattern, pitches, start, slot)?,
    }
    Ok(())
}

fn arpeggiate(
    ctx: &mut Context<'_>,
    track: &mut Track,
    pattern: &[f64],
    pitches: &[u8],
    start: f64,
    slot: f64,
) -> Result<()> {
    if pitches.is_empty() || pattern.is_empty() {
        return Ok(());
    }
    let mut offset = 0.0;
    let mut step = 0;
    while offset < slot {
        let length = pattern[step % pattern.len()].min(slot - offset);
        if length <= MIN_BEATS {
            break;
        }
        let pitch = pitches[up_down_index(step, pitches.len())];
        let velocity = ctx.dice.between(ARPEGGIO_VELOCITY.0, ARPEGGIO_VELOCITY.1);
        track.add_element(Note::new(
            pitch,
            start + offset,
            length * ARPEGGIO_SUSTAIN,
            velocity,
        )?)?;
        offset += length;
        step += 1;
    }
    Ok(())
}
