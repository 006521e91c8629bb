// Weighted random chord progression.
//
// Chords are drawn from the key's diatonic chords (degree I first), each
// degree chosen in proportion to its entry in `chord_weights`, until
// `total_beats` is filled. `rhythm_beats` cycles as the slot lengths; the
// slot that would run past the end is cut to fit. With `random_inversions`
// every chord lands in root position or first inversion at random.

use crate::error::{Error, Result};
use crate::progression::{
    self, MIN_BEATS, PlayStyle, check_lengths, default_arpeggio_pattern, default_scale_type,
};
use crate::song::{Context, VoiceSpec};
use chordsmith_core::Track;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RandomProgressionSpec {
    #[serde(flatten)]
    pub voice: VoiceSpec,
    pub key: String,
    #[serde(default = "default_scale_type")]
    pub scale_type: String,
    pub total_beats: f64,
    /// One weight per diatonic degree; uniform when absent.
    #[serde(default)]
    pub chord_weights: Option<Vec<f64>>,
    #[serde(default = "default_rhythm_beats")]
    pub rhythm_beats: Vec<f64>,
    #[serde(default = "default_random_inversions")]
    pub random_inversions: bool,
    #[serde(default)]
    pub style: PlayStyle,
    #[serde(default = "default_arpeggio_pattern")]
    pub arpeggio_pattern: Vec<f64>,
}

fn default_rhythm_beats() -> Vec<f64> {
    vec![1.0, 1.0, 1.0, 0.5, 0.5]
}

fn default_random_inversions() -> bool {
    true
}

impl RandomProgressionSpec {
    pub fn build(&self, ctx: &mut Context<'_>) -> Result<Track> {
        let mut track = self.voice.track("Random Chords")?;
        let name = track.name().to_string();
        if !self.total_beats.is_finite() || self.total_beats <= 0.0 {
            return Err(Error::parameter(&name, "total_beats", "must be positive"));
        }
        check_lengths(&name, "rhythm_beats", &self.rhythm_beats)?;
        check_lengths(&name, "arpeggio_pattern", &self.arpeggio_pattern)?;

        let diatonic = ctx.theory.diatonic_chords(&self.key, &self.scale_type)?;
        let weights = match &self.chord_weights {
            Some(weights) if weights.len() != diatonic.len() => {
                return Err(Error::parameter(
                    &name,
                    "chord_weights",
                    "needs one weight per scale degree",
                ));
            }
            Some(weights) => weights.clone(),
            None => vec![1.0; diatonic.len()],
        };

        let mut chosen = Vec::new();
        let mut time = 0.0;
        let mut index = 0;
        while self.total_beats - time > MIN_BEATS {
            let slot = self.rhythm_beats[index % self.rhythm_beats.len()]
                .min(self.total_beats - time);
            let degree = ctx.dice.weighted(&weights).ok_or_else(|| {
                Error::parameter(&name, "chord_weights", "weights must be >= 0 and not all zero")
            })?;
            let symbol = &diatonic[degree];
            let inversion = if self.random_inversions {
                usize::from(ctx.dice.between(0, 1))
            } else {
                0
            };
            let pitches = ctx
                .theory
                .chord_pitches(symbol, ctx.base_octave, 0, inversion)?;
            progression::play(
                ctx,
                &mut track,
                self.style,
                &self.arpeggio_pattern,
                &pitches,
                time,
                slot,
            )?;
            chosen.push(symbol.as_str());
            time += slot;
            index += 1;
        }
        tracing::debug!(track = %name, chords = %chosen.join(" "), "random progression");
        Ok(track)
    }
}
