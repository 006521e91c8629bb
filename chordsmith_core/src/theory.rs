// Music-theory resolution: key, scale, and chord symbols to MIDI pitches, and
// polyrhythm specifications to onset times.
//
// Everything here is a pure function of its arguments plus an immutable
// `Theory` built from `TheoryTables` (see `config.rs`). No state survives a
// call, so one `Theory` can serve any number of threads.
//
// Octave convention: scientific pitch notation, octave 4 begins at middle C
// (MIDI 60). A pitch is `pitch_class + 12 * (octave + 1) + interval`.
//
// Chord symbols are `<root><quality>`. The root is one letter, or two when the
// second character is `#`/`b` and the pair is a known pitch name. The quality
// is resolved by longest-prefix match against the voicing table: the table's
// keys are pre-sorted by length descending and the first key that prefixes
// the remainder wins, so `min(maj7)` beats `min` and `maj13` beats `maj`.
// An unmatched quality falls back to the configured default and the parse
// result carries an `UnknownQuality` diagnostic.

use crate::config::TheoryTables;
use crate::error::{Error, Result, UnknownQuality};
use std::collections::{BTreeSet, VecDeque};
use std::ops::RangeInclusive;

/// Pitch names accepted in keys and chord roots, with their pitch classes.
const PITCH_NAMES: [(&str, u8); 17] = [
    ("C", 0),
    ("C#", 1),
    ("Db", 1),
    ("D", 2),
    ("D#", 3),
    ("Eb", 3),
    ("E", 4),
    ("F", 5),
    ("F#", 6),
    ("Gb", 6),
    ("G", 7),
    ("G#", 8),
    ("Ab", 8),
    ("A", 9),
    ("A#", 10),
    ("Bb", 10),
    ("B", 11),
];

/// Octaves that can hold a MIDI pitch for some pitch class and `u8`
/// interval. Anything outside is empty.
const LOWEST_OCTAVE: i32 = -23;
const HIGHEST_OCTAVE: i32 = 9;

/// Canonical spelling for each pitch class (sharps).
const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Look up the pitch class (0-11) of a pitch name such as `"Eb"`.
pub fn pitch_class(name: &str) -> Option<u8> {
    PITCH_NAMES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|&(_, pc)| pc)
}

/// Canonical (sharp) name of a pitch class. Wraps modulo 12.
pub fn pitch_class_name(pc: u8) -> &'static str {
    SHARP_NAMES[(pc % 12) as usize]
}

/// Name of a MIDI pitch with its octave, e.g. `60 -> "C4"`.
pub fn note_name(pitch: u8) -> String {
    let octave = i32::from(pitch / 12) - 1;
    format!("{}{}", pitch_class_name(pitch % 12), octave)
}

/// Resolve a key name, accepting a lowercase letter (`"f#"` is `"F#"`).
fn key_pitch_class(key: &str) -> Result<u8> {
    let mut chars = key.chars();
    let normalized = match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    };
    pitch_class(&normalized).ok_or_else(|| Error::UnknownPitchName(key.to_string()))
}

fn midi_pitch(value: i32) -> Result<u8> {
    u8::try_from(value)
        .ok()
        .filter(|p| *p <= 127)
        .ok_or_else(|| Error::validation("pitch", value, "0..=127"))
}

/// A parsed chord symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordSymbol {
    /// Root pitch name as written (`"Bb"`, `"F#"`, `"C"`).
    pub root: String,
    /// The quality the symbol resolved to, always a key of the voicing table.
    pub quality: String,
    /// Present when the written quality matched nothing and the default was
    /// substituted.
    pub fallback: Option<UnknownQuality>,
}

/// The theory resolver.
#[derive(Debug, Clone)]
pub struct Theory {
    tables: TheoryTables,
    /// Voicing keys, longest first (ties in lexical order).
    qualities_by_length: Vec<String>,
}

impl Theory {
    /// Build a resolver from validated tables.
    pub fn new(tables: TheoryTables) -> Result<Self> {
        tables.validate()?;
        Ok(Self::from_tables(tables))
    }

    /// Resolver over `TheoryTables::standard()`.
    pub fn standard() -> Self {
        Self::from_tables(TheoryTables::standard())
    }

    fn from_tables(tables: TheoryTables) -> Self {
        let mut qualities_by_length: Vec<String> = tables.voicings.keys().cloned().collect();
        qualities_by_length.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Theory {
            tables,
            qualities_by_length,
        }
    }

    pub fn tables(&self) -> &TheoryTables {
        &self.tables
    }

    /// Semitone intervals for a chord quality.
    pub fn voicing(&self, quality: &str) -> Option<&[u8]> {
        self.tables.voicings.get(quality).map(Vec::as_slice)
    }

    fn scale(&self, scale_type: &str) -> Result<&[u8]> {
        self.tables
            .scales
            .get(scale_type)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::UnknownScale(scale_type.to_string()))
    }

    /// All in-range MIDI pitches of a scale over an inclusive octave range,
    /// sorted and deduplicated. Pitches outside 0..=127 are dropped.
    pub fn scale_notes(
        &self,
        root: &str,
        scale_type: &str,
        octaves: RangeInclusive<i32>,
    ) -> Result<Vec<u8>> {
        let intervals = self.scale(scale_type)?;
        let pc = i32::from(key_pitch_class(root)?);

        let low = (*octaves.start()).max(LOWEST_OCTAVE);
        let high = (*octaves.end()).min(HIGHEST_OCTAVE);
        let mut pitches = BTreeSet::new();
        for octave in low..=high {
            for &interval in intervals {
                let pitch = pc + 12 * (octave + 1) + i32::from(interval);
                if (0..=127).contains(&pitch) {
                    pitches.insert(pitch as u8);
                }
            }
        }
        Ok(pitches.into_iter().collect())
    }

    /// The chord symbol for each degree of a key's scale, e.g. C major ->
    /// `["Cmaj", "Dmin", "Emin", "Fmaj", "Gdom7", "Amin", "Bdim"]`.
    pub fn diatonic_chords(&self, root: &str, scale_type: &str) -> Result<Vec<String>> {
        let intervals = self.scale(scale_type)?;
        let qualities = self
            .tables
            .diatonic_qualities
            .get(scale_type)
            .ok_or_else(|| Error::UnknownScale(scale_type.to_string()))?;
        let pc = key_pitch_class(root)?;

        Ok(intervals
            .iter()
            .zip(qualities)
            .map(|(&interval, quality)| {
                let degree_root = pitch_class_name((pc + interval % 12) % 12);
                format!("{degree_root}{quality}")
            })
            .collect())
    }

    /// Split a chord symbol into root name and quality.
    ///
    /// Fails with `MalformedChord` only when no root can be read. An unknown
    /// quality is recovered: the default quality is used and the returned
    /// `fallback` describes the substitution. An empty quality (`"C"`) means
    /// the default quality and carries no diagnostic.
    pub fn parse_chord_symbol(&self, symbol: &str) -> Result<ChordSymbol> {
        let malformed = || Error::MalformedChord(symbol.to_string());
        if symbol.is_empty() || !symbol.is_char_boundary(1) {
            return Err(malformed());
        }

        let bytes = symbol.as_bytes();
        let root_len = if bytes.len() >= 2
            && matches!(bytes[1], b'#' | b'b')
            && pitch_class(&symbol[..2]).is_some()
        {
            2
        } else {
            1
        };
        let root = &symbol[..root_len];
        if pitch_class(root).is_none() {
            return Err(malformed());
        }

        let token = &symbol[root_len..];
        if token.is_empty() {
            return Ok(ChordSymbol {
                root: root.to_string(),
                quality: self.tables.default_quality.clone(),
                fallback: None,
            });
        }

        match self
            .qualities_by_length
            .iter()
            .find(|quality| token.starts_with(quality.as_str()))
        {
            Some(quality) => Ok(ChordSymbol {
                root: root.to_string(),
                quality: quality.clone(),
                fallback: None,
            }),
            None => {
                let diagnostic = UnknownQuality {
                    symbol: symbol.to_string(),
                    token: token.to_string(),
                    substituted: self.tables.default_quality.clone(),
                };
                tracing::warn!("{diagnostic}");
                Ok(ChordSymbol {
                    root: root.to_string(),
                    quality: self.tables.default_quality.clone(),
                    fallback: Some(diagnostic),
                })
            }
        }
    }

    /// MIDI pitches of a chord symbol voiced at `base_octave + octave_offset`
    /// with `inversion` inversions applied.
    ///
    /// Each inversion takes the current lowest pitch and moves it up an
    /// octave to the end of the list; counts past the voicing size keep
    /// cycling. `chord_pitches("Cmaj", 4, 0, 1) == [64, 67, 72]`.
    pub fn chord_pitches(
        &self,
        symbol: &str,
        base_octave: i32,
        octave_offset: i32,
        inversion: usize,
    ) -> Result<Vec<u8>> {
        let parsed = self.parse_chord_symbol(symbol)?;
        let intervals = self
            .voicing(&parsed.quality)
            .ok_or_else(|| Error::MalformedChord(symbol.to_string()))?;
        let pc = pitch_class(&parsed.root)
            .map(i32::from)
            .ok_or_else(|| Error::MalformedChord(symbol.to_string()))?;
        let octave = base_octave
            .checked_add(octave_offset)
            .filter(|o| (LOWEST_OCTAVE..=HIGHEST_OCTAVE).contains(o))
            .ok_or_else(|| {
                Error::validation(
                    "octave",
                    format!("{base_octave}{octave_offset:+}"),
                    "an octave within -23..=9",
                )
            })?;
        let root_pitch = pc + 12 * (octave + 1);

        let mut pitches: VecDeque<i32> = intervals
            .iter()
            .map(|&interval| root_pitch + i32::from(interval))
            .collect();

        for _ in 0..inversion {
            let Some(lowest) = pitches
                .iter()
                .enumerate()
                .min_by_key(|&(_, pitch)| *pitch)
                .map(|(index, _)| index)
            else {
                break;
            };
            if let Some(pitch) = pitches.remove(lowest) {
                // Pitches only ever rise, so one past the top can't recover.
                let raised = pitch + 12;
                if raised > 127 {
                    return Err(Error::validation("pitch", raised, "0..=127"));
                }
                pitches.push_back(raised);
            }
        }

        pitches.into_iter().map(midi_pitch).collect()
    }

    /// Flatten several evenly spaced pulses over one cycle into a single
    /// sorted onset list in `[0, cycle_beats)`.
    ///
    /// Every onset `cycle_beats * i / n` is rounded to `onset_decimals`
    /// places on an integer grid before deduplication, so coincident onsets
    /// from different hit counts merge exactly.
    pub fn polyrhythm_onsets(&self, hits: &[u32], cycle_beats: f64) -> Result<Vec<f64>> {
        if !cycle_beats.is_finite() || cycle_beats <= 0.0 {
            return Err(Error::validation(
                "cycle_beats",
                cycle_beats,
                "a positive finite beat count",
            ));
        }
        if let Some(&zero) = hits.iter().find(|&&n| n == 0) {
            return Err(Error::validation("hits", zero, "a positive hit count"));
        }

        let scale = 10f64.powi(self.tables.onset_decimals as i32);
        let cycle_key = (cycle_beats * scale).round() as i64;
        let mut keys = BTreeSet::new();
        for &n in hits {
            for i in 0..n {
                let onset = cycle_beats * f64::from(i) / f64::from(n);
                let key = (onset * scale).round() as i64;
                if key < cycle_key {
                    keys.insert(key);
                }
            }
        }
        Ok(keys.into_iter().map(|key| key as f64 / scale).collect())
    }
}

impl Default for Theory {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_names_and_classes() {
        assert_eq!(pitch_class("C"), Some(0));
        assert_eq!(pitch_class("Db"), Some(1));
        assert_eq!(pitch_class("Bb"), Some(10));
        assert_eq!(pitch_class("H"), None);
        assert_eq!(pitch_class_name(1), "C#");
        assert_eq!(pitch_class_name(13), "C#");
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(0), "C-1");
        assert_eq!(note_name(127), "G9");
    }

    #[test]
    fn scale_notes_single_octave() {
        let theory = Theory::standard();
        let notes = theory.scale_notes("C", "major", 4..=4).unwrap();
        assert_eq!(notes, vec![60, 62, 64, 65, 67, 69, 71]);
    }

    #[test]
    fn scale_notes_drop_out_of_range_pitches() {
        let theory = Theory::standard();
        // G9 is 127; the rest of the G major scale in octave 9 is out of range.
        let notes = theory.scale_notes("G", "major", 9..=9).unwrap();
        assert_eq!(notes, vec![127]);
        let low = theory.scale_notes("C", "pentatonic_minor", -2..=-1).unwrap();
        assert_eq!(low, vec![0, 3, 5, 7, 10]);
    }

    #[test]
    fn scale_notes_are_sorted_and_unique() {
        let theory = Theory::standard();
        let notes = theory.scale_notes("a", "blues", 3..=5).unwrap();
        assert!(notes.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(notes.len(), 18);
    }

    #[test]
    fn scale_notes_unknown_scale() {
        let theory = Theory::standard();
        let err = theory.scale_notes("C", "lydian_dominant", 4..=4).unwrap_err();
        assert!(matches!(err, Error::UnknownScale(name) if name == "lydian_dominant"));
    }

    #[test]
    fn diatonic_chords_c_major() {
        let theory = Theory::standard();
        assert_eq!(
            theory.diatonic_chords("C", "major").unwrap(),
            vec!["Cmaj", "Dmin", "Emin", "Fmaj", "Gdom7", "Amin", "Bdim"]
        );
    }

    #[test]
    fn diatonic_chords_harmonic_minor() {
        let theory = Theory::standard();
        assert_eq!(
            theory.diatonic_chords("A", "minor_harmonic").unwrap(),
            vec!["Amin", "Bdim", "Cmaj(aug)", "Dmin", "Edom7", "Fmaj", "G#dim"]
        );
    }

    #[test]
    fn diatonic_chords_need_a_quality_table() {
        let theory = Theory::standard();
        let err = theory.diatonic_chords("C", "pentatonic_major").unwrap_err();
        assert!(matches!(err, Error::UnknownScale(_)));
        let err = theory.diatonic_chords("C", "nonexistent").unwrap_err();
        assert!(matches!(err, Error::UnknownScale(_)));
    }

    #[test]
    fn diatonic_chords_unknown_key() {
        let theory = Theory::standard();
        let err = theory.diatonic_chords("X", "major").unwrap_err();
        assert!(matches!(err, Error::UnknownPitchName(_)));
    }

    #[test]
    fn parse_two_character_roots() {
        let theory = Theory::standard();
        let parsed = theory.parse_chord_symbol("Bbmaj7").unwrap();
        assert_eq!(parsed.root, "Bb");
        assert_eq!(parsed.quality, "maj7");
        let parsed = theory.parse_chord_symbol("F#m7b5").unwrap();
        assert_eq!(parsed.root, "F#");
        assert_eq!(parsed.quality, "m7b5");
    }

    #[test]
    fn parse_prefers_longest_quality() {
        let theory = Theory::standard();
        assert_eq!(theory.parse_chord_symbol("Cmin(maj7)").unwrap().quality, "min(maj7)");
        assert_eq!(theory.parse_chord_symbol("Cmaj13").unwrap().quality, "maj13");
        assert_eq!(theory.parse_chord_symbol("Gdom7#9").unwrap().quality, "dom7#9");
        assert_eq!(theory.parse_chord_symbol("Am9").unwrap().quality, "m9");
        // Trailing text after the longest match is ignored.
        assert_eq!(theory.parse_chord_symbol("Cmaj9/E").unwrap().quality, "maj9");
    }

    #[test]
    fn parse_unknown_quality_falls_back_with_diagnostic() {
        let theory = Theory::standard();
        let parsed = theory.parse_chord_symbol("Cxyz").unwrap();
        assert_eq!(parsed.quality, "maj");
        let diagnostic = parsed.fallback.unwrap();
        assert_eq!(diagnostic.token, "xyz");
        assert_eq!(diagnostic.substituted, "maj");
    }

    #[test]
    fn parse_bare_root_uses_default_quality() {
        let theory = Theory::standard();
        let parsed = theory.parse_chord_symbol("E").unwrap();
        assert_eq!(parsed.root, "E");
        assert_eq!(parsed.quality, "maj");
        assert!(parsed.fallback.is_none());
    }

    #[test]
    fn parse_rejects_missing_root() {
        let theory = Theory::standard();
        for symbol in ["", "xmaj", "hmin", "émaj", "cmaj"] {
            let err = theory.parse_chord_symbol(symbol).unwrap_err();
            assert!(matches!(err, Error::MalformedChord(_)), "{symbol}");
        }
    }

    #[test]
    fn chord_pitches_root_position_and_inversions() {
        let theory = Theory::standard();
        assert_eq!(theory.chord_pitches("Cmaj", 4, 0, 0).unwrap(), vec![60, 64, 67]);
        assert_eq!(theory.chord_pitches("Cmaj", 4, 0, 1).unwrap(), vec![64, 67, 72]);
        assert_eq!(theory.chord_pitches("Cmaj", 4, 0, 2).unwrap(), vec![67, 72, 76]);
    }

    #[test]
    fn chord_pitches_inversion_keeps_cycling() {
        let theory = Theory::standard();
        // Three inversions of a triad is root position an octave up.
        assert_eq!(theory.chord_pitches("Cmaj", 4, 0, 3).unwrap(), vec![72, 76, 79]);
        assert_eq!(theory.chord_pitches("Cmaj", 4, 0, 4).unwrap(), vec![76, 79, 84]);
    }

    #[test]
    fn chord_pitches_octave_offset() {
        let theory = Theory::standard();
        assert_eq!(theory.chord_pitches("Amin", 4, -1, 0).unwrap(), vec![57, 60, 64]);
        assert_eq!(theory.chord_pitches("Ebmaj7", 3, 1, 0).unwrap(), vec![63, 67, 70, 74]);
    }

    #[test]
    fn chord_pitches_out_of_range() {
        let theory = Theory::standard();
        assert!(matches!(
            theory.chord_pitches("Cmaj", -2, 0, 0).unwrap_err(),
            Error::Validation { field: "pitch", .. }
        ));
        assert!(theory.chord_pitches("Gmaj", 9, 0, 0).is_err());
        // Unbounded inversion counts stop at the top of the MIDI range.
        assert!(theory.chord_pitches("Cmaj", 4, 0, usize::MAX).is_err());
    }

    #[test]
    fn extreme_octaves_are_errors_not_overflow() {
        let theory = Theory::standard();
        let cases = [(i32::MAX, 0), (i32::MIN, 0), (i32::MAX, 1), (i32::MIN, -1), (4, 20)];
        for (base, offset) in cases {
            assert!(
                matches!(
                    theory.chord_pitches("Cmaj", base, offset, 0),
                    Err(Error::Validation { field: "octave", .. })
                ),
                "{base} {offset}"
            );
        }
    }

    #[test]
    fn scale_notes_over_unbounded_octave_range() {
        let theory = Theory::standard();
        let all = theory.scale_notes("C", "major", i32::MIN..=i32::MAX).unwrap();
        // Ten full octaves below 120, then C D E F G of octave 9.
        assert_eq!(all.len(), 75);
        assert_eq!(all.first(), Some(&0));
        assert_eq!(all.last(), Some(&127));
        assert!(theory.scale_notes("C", "major", i32::MAX..=i32::MAX).unwrap().is_empty());
        assert!(theory.scale_notes("C", "major", i32::MIN..=i32::MIN).unwrap().is_empty());
    }

    #[test]
    fn polyrhythm_three_against_two() {
        let theory = Theory::standard();
        let onsets = theory.polyrhythm_onsets(&[3, 2], 4.0).unwrap();
        assert_eq!(onsets, vec![0.0, 1.33333, 2.0, 2.66667]);
    }

    #[test]
    fn polyrhythm_merges_coincident_onsets() {
        let theory = Theory::standard();
        // 3 and 6 over 1 beat share every third-of-a-beat onset.
        let onsets = theory.polyrhythm_onsets(&[3, 6], 1.0).unwrap();
        assert_eq!(onsets.len(), 6);
        let onsets = theory.polyrhythm_onsets(&[3, 4, 5], 4.0).unwrap();
        // 3 + 4 + 5 hits, sharing only the downbeat.
        assert_eq!(onsets.len(), 10);
        assert!(onsets.windows(2).all(|w| w[0] < w[1]));
        assert!(onsets.iter().all(|&t| (0.0..4.0).contains(&t)));
    }

    #[test]
    fn polyrhythm_rejects_bad_input() {
        let theory = Theory::standard();
        assert!(theory.polyrhythm_onsets(&[3, 0], 4.0).is_err());
        assert!(theory.polyrhythm_onsets(&[3], 0.0).is_err());
        assert!(theory.polyrhythm_onsets(&[3], f64::NAN).is_err());
        assert!(theory.polyrhythm_onsets(&[], 4.0).unwrap().is_empty());
    }

    #[test]
    fn custom_tables_drive_resolution() {
        let mut tables = TheoryTables::standard();
        tables.voicings.insert("q".to_string(), vec![0, 5, 10]);
        tables.default_quality = "min".to_string();
        let theory = Theory::new(tables).unwrap();
        assert_eq!(theory.chord_pitches("Dq", 4, 0, 0).unwrap(), vec![62, 67, 72]);
        assert_eq!(theory.parse_chord_symbol("D???").unwrap().quality, "min");
    }
}
