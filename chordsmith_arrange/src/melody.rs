// Random-walk melody over a scale palette.
//
// The palette is every in-range pitch of the key's scale across
// `octave_range`. The walk starts mid-palette. Each event is either a rest
// (with probability `rest_chance`, never at beat 0) or a note whose palette
// index moves by a uniform step in `-max_step..=max_step`, clamped to the
// palette. Durations are drawn from `rhythm_choices` / `rest_choices`, and the
// event that would run past `total_beats` is cut to end exactly there.

use crate::error::{Error, Result};
use crate::song::{Context, VoiceSpec};
use chordsmith_core::{Note, Rest, Track};
use serde::Deserialize;

const VELOCITY: (u8, u8) = (85, 115);
const MIN_BEATS: f64 = 1e-9;

#[derive(Debug, Clone, Deserialize)]
pub struct MelodySpec {
    #[serde(flatten)]
    pub voice: VoiceSpec,
    pub key: String,
    #[serde(default = "default_scale_type")]
    pub scale_type: String,
    /// Inclusive octave range for the palette.
    #[serde(default = "default_octave_range")]
    pub octave_range: (i32, i32),
    pub total_beats: f64,
    #[serde(default = "default_max_step")]
    pub max_step: u32,
    #[serde(default = "default_rest_chance")]
    pub rest_chance: f64,
    #[serde(default = "default_rhythm_choices")]
    pub rhythm_choices: Vec<f64>,
    #[serde(default = "default_rest_choices")]
    pub rest_choices: Vec<f64>,
}

fn default_scale_type() -> String {
    "major".to_string()
}

fn default_octave_range() -> (i32, i32) {
    (4, 5)
}

fn default_max_step() -> u32 {
    2
}

fn default_rest_chance() -> f64 {
    0.1
}

fn default_rhythm_choices() -> Vec<f64> {
    vec![0.5, 0.5, 1.0]
}

fn default_rest_choices() -> Vec<f64> {
    vec![0.25, 0.5]
}

fn positive_lengths(values: &[f64]) -> bool {
    !values.is_empty() && values.iter().all(|v| v.is_finite() && *v > 0.0)
}

impl MelodySpec {
    fn validate(&self, track: &str) -> Result<()> {
        if !self.total_beats.is_finite() || self.total_beats <= 0.0 {
            return Err(Error::parameter(track, "total_beats", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.rest_chance) {
            return Err(Error::parameter(track, "rest_chance", "must be within 0..=1"));
        }
        if !positive_lengths(&self.rhythm_choices) {
            return Err(Error::parameter(
                track,
                "rhythm_choices",
                "needs positive beat lengths",
            ));
        }
        if self.rest_chance > 0.0 && !positive_lengths(&self.rest_choices) {
            return Err(Error::parameter(
                track,
                "rest_choices",
                "needs positive beat lengths",
            ));
        }
        Ok(())
    }

    pub fn build(&self, ctx: &mut Context<'_>) -> Result<Track> {
        let mut track = self.voice.track("Melody")?;
        self.validate(track.name())?;

        let (low, high) = self.octave_range;
        let palette = ctx.theory.scale_notes(&self.key, &self.scale_type, low..=high)?;
        if palette.is_empty() {
            return Err(Error::parameter(
                track.name(),
                "octave_range",
                "contains no MIDI pitches",
            ));
        }

        let last = palette.len() as i64 - 1;
        let mut index = palette.len() as i64 / 2;
        let mut time = 0.0;
        let mut notes = 0usize;

        while self.total_beats - time > MIN_BEATS {
            let remaining = self.total_beats - time;
            if time > 0.0 && ctx.dice.chance(self.rest_chance) {
                if let Some(&length) = ctx.dice.pick(&self.rest_choices) {
                    let length = length.min(remaining);
                    track.add_element(Rest::new(time, length)?)?;
                    time += length;
                }
                continue;
            }

            let Some(&length) = ctx.dice.pick(&self.rhythm_choices) else {
                break;
            };
            let length = length.min(remaining);
            index = (index + ctx.dice.step(self.max_step)).clamp(0, last);
            let velocity = ctx.dice.between(VELOCITY.0, VELOCITY.1);
            track.add_element(Note::new(palette[index as usize], time, length, velocity)?)?;
            time += length;
            notes += 1;
        }

        tracing::debug!(notes, beats = self.total_beats, "melody walk finished");
        Ok(track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::Dice;
    use chordsmith_core::{Element, Theory, TimeSignature};

    fn build(json: &str, seed: u64) -> Result<Track> {
        let theory = Theory::standard();
        let mut ctx = Context {
            theory: &theory,
            base_octave: 4,
            time_signature: TimeSignature::default(),
            dice: Dice::new(seed),
        };
        let spec: MelodySpec = serde_json::from_str(json).unwrap();
        spec.build(&mut ctx)
    }

    #[test]
    fn melody_fills_exactly_total_beats() {
        let track = build(
            r#"{"key": "C", "total_beats": 7.75, "rhythm_choices": [0.5, 1.0, 1.5], "rest_chance": 0.2}"#,
            9,
        )
        .unwrap();
        let elements = track.elements();
        assert!(!elements.is_empty());
        let end = elements.last().and_then(Element::end_time).unwrap();
        assert!((end - 7.75).abs() < 1e-9);
        // Contiguous: each element starts where the previous one ended.
        for pair in elements.windows(2) {
            let gap = pair[1].start_time().unwrap() - pair[0].end_time().unwrap();
            assert!(gap.abs() < 1e-9);
        }
    }

    #[test]
    fn first_event_is_a_note_and_pitches_come_from_palette() {
        let theory = Theory::standard();
        let palette = theory.scale_notes("D", "blues", 3..=4).unwrap();
        for seed in 0..20 {
            let track = build(
                r#"{"key": "D", "scale_type": "blues", "octave_range": [3, 4],
                    "total_beats": 16, "rest_chance": 0.9, "max_step": 3}"#,
                seed,
            )
            .unwrap();
            assert!(matches!(track.elements()[0], Element::Note(_)));
            for element in track.elements() {
                if let Element::Note(note) = element {
                    assert!(palette.contains(&note.pitch()));
                    assert!((85..=115).contains(&note.velocity()));
                }
            }
        }
    }

    #[test]
    fn steps_stay_within_max_step() {
        let theory = Theory::standard();
        let palette = theory.scale_notes("C", "major", 4..=5).unwrap();
        let track = build(
            r#"{"key": "C", "total_beats": 32, "rest_chance": 0, "max_step": 1, "rhythm_choices": [0.5]}"#,
            4,
        )
        .unwrap();
        let indices: Vec<i64> = track
            .elements()
            .iter()
            .map(|e| match e {
                Element::Note(n) => palette.iter().position(|&p| p == n.pitch()).unwrap() as i64,
                other => panic!("expected only notes, got {other:?}"),
            })
            .collect();
        assert_eq!(indices.len(), 64);
        assert!(indices.windows(2).all(|w| (w[1] - w[0]).abs() <= 1));
    }

    #[test]
    fn same_seed_same_melody() {
        let json = r#"{"key": "A", "scale_type": "minor_natural", "total_beats": 12}"#;
        assert_eq!(build(json, 77).unwrap(), build(json, 77).unwrap());
    }

    #[test]
    fn invalid_settings_are_rejected() {
        for json in [
            r#"{"key": "C", "total_beats": 0}"#,
            r#"{"key": "C", "total_beats": 4, "rest_chance": 1.5}"#,
            r#"{"key": "C", "total_beats": 4, "rhythm_choices": []}"#,
            r#"{"key": "C", "total_beats": 4, "rest_choices": [0]}"#,
            r#"{"key": "C", "total_beats": 4, "octave_range": [11, 12]}"#,
        ] {
            assert!(matches!(build(json, 0), Err(Error::Parameter { .. })), "{json}");
        }
        assert!(matches!(
            build(r#"{"key": "C", "scale_type": "lydian", "total_beats": 4}"#, 0),
            Err(Error::Core(chordsmith_core::Error::UnknownScale(_)))
        ));
    }
}
