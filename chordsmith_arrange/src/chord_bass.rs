// Random diatonic chords with a matching bass line.
//
// Every `chords.rhythm_beats` a root is drawn from the scale notes of
// `chords.octave`, and a chord is stacked on it by scale steps
// (`voicing_intervals`, [0, 2, 4] is a triad) over a three-octave palette.
// A stack that would climb past the palette falls back to the root alone.
// The bass plays the chord's lowest tone shifted by `bass.octave_offset`
// octaves at each `bass.rhythm_pattern` offset inside the chord's slot.
//
// Produces two tracks: chords, then bass.

use crate::error::{Error, Result};
use crate::progression::{MIN_BEATS, default_scale_type};
use crate::song::{Context, VoiceSpec};
use chordsmith_core::{Chord, Note, Track};
use serde::Deserialize;

const CHORD_VELOCITY: u8 = 80;
const BASS_VELOCITY: (u8, u8) = (85, 100);
/// Octaves above the root octave that chord stacks may reach into.
const PALETTE_SPAN: i32 = 2;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChordPart {
    #[serde(flatten)]
    pub voice: VoiceSpec,
    pub octave: i32,
    pub rhythm_beats: f64,
    pub voicing_intervals: Vec<usize>,
}

impl Default for ChordPart {
    fn default() -> Self {
        ChordPart {
            voice: VoiceSpec::default(),
            octave: 3,
            rhythm_beats: 4.0,
            voicing_intervals: vec![0, 2, 4],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BassPart {
    #[serde(flatten)]
    pub voice: VoiceSpec,
    pub octave_offset: i32,
    /// Beat offsets within each chord; offsets past the chord are skipped.
    pub rhythm_pattern: Vec<f64>,
    pub note_length: f64,
}

impl Default for BassPart {
    fn default() -> Self {
        BassPart {
            voice: VoiceSpec::default(),
            octave_offset: -2,
            rhythm_pattern: vec![0.0, 2.0],
            note_length: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChordBassSpec {
    pub key: String,
    #[serde(default = "default_scale_type")]
    pub scale_type: String,
    pub total_beats: f64,
    #[serde(default)]
    pub chords: ChordPart,
    #[serde(default)]
    pub bass: BassPart,
}

impl ChordBassSpec {
    fn validate(&self, track: &str) -> Result<()> {
        if !self.total_beats.is_finite() || self.total_beats <= 0.0 {
            return Err(Error::parameter(track, "total_beats", "must be positive"));
        }
        if !self.chords.rhythm_beats.is_finite() || self.chords.rhythm_beats <= 0.0 {
            return Err(Error::parameter(track, "rhythm_beats", "must be positive"));
        }
        if self.chords.voicing_intervals.is_empty() {
            return Err(Error::parameter(track, "voicing_intervals", "needs at least one entry"));
        }
        if !self.bass.note_length.is_finite() || self.bass.note_length <= 0.0 {
            return Err(Error::parameter(track, "note_length", "must be positive"));
        }
        if self
            .bass
            .rhythm_pattern
            .iter()
            .any(|offset| !offset.is_finite() || *offset < 0.0)
        {
            return Err(Error::parameter(track, "rhythm_pattern", "offsets must be >= 0"));
        }
        Ok(())
    }

    /// Scale steps above `root` within `palette`, or the root alone when the
    /// stack runs off the top.
    fn stack(&self, palette: &[u8], root: u8) -> Vec<u8> {
        let Some(base) = palette.iter().position(|&p| p == root) else {
            return vec![root];
        };
        self.chords
            .voicing_intervals
            .iter()
            .map(|&step| base.checked_add(step).and_then(|i| palette.get(i)).copied())
            .collect::<Option<Vec<u8>>>()
            .unwrap_or_else(|| vec![root])
    }

    fn bass_pitch(&self, track: &str, lowest: u8) -> Result<u8> {
        self.bass
            .octave_offset
            .checked_mul(12)
            .and_then(|shift| shift.checked_add(i32::from(lowest)))
            .and_then(|pitch| u8::try_from(pitch).ok())
            .filter(|pitch| *pitch <= 127)
            .ok_or_else(|| {
                Error::parameter(track, "octave_offset", "moves the bass outside MIDI range")
            })
    }

    pub fn build(&self, ctx: &mut Context<'_>) -> Result<Vec<Track>> {
        let mut chords = self.chords.voice.track("Chords")?;
        let mut bass = self.bass.voice.track("Bass")?;
        let name = chords.name().to_string();
        self.validate(&name)?;

        let octave = self.chords.octave;
        let roots = ctx
            .theory
            .scale_notes(&self.key, &self.scale_type, octave..=octave)?;
        if roots.is_empty() {
            return Err(Error::parameter(&name, "octave", "holds no MIDI pitches"));
        }
        let palette = ctx.theory.scale_notes(
            &self.key,
            &self.scale_type,
            octave..=octave.saturating_add(PALETTE_SPAN),
        )?;

        let mut time = 0.0;
        while self.total_beats - time > MIN_BEATS {
            let slot = self.chords.rhythm_beats.min(self.total_beats - time);
            let Some(&root) = ctx.dice.pick(&roots) else {
                break;
            };
            let pitches = self.stack(&palette, root);
            tracing::trace!(beat = time, root, ?pitches, "chord");
            chords.add_element(Chord::from_pitches(&pitches, time, slot, CHORD_VELOCITY)?)?;

            let lowest = pitches.iter().copied().min().unwrap_or(root);
            let bass_pitch = self.bass_pitch(bass.name(), lowest)?;
            for &offset in &self.bass.rhythm_pattern {
                if offset >= slot {
                    continue;
                }
                let length = self.bass.note_length.min(slot - offset);
                let velocity = ctx.dice.between(BASS_VELOCITY.0, BASS_VELOCITY.1);
                bass.add_element(Note::new(bass_pitch, time + offset, length, velocity)?)?;
            }
            time += slot;
        }
        Ok(vec![chords, bass])
    }
}
