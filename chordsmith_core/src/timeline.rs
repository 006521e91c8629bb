// The composition model: notes, chords, and rests placed on a beat timeline,
// grouped into tracks, grouped into a composition.
//
// Every range invariant is checked at construction, so an invalid entity is
// never observable. Fields are private; the only mutation after construction
// is transposition and the track/composition setters, which re-check ranges.
//
// A `Track` keeps its elements sorted by start time at all times: insertion
// binary-searches for the slot after every element with an equal or earlier
// start, so elements sharing a start time stay in insertion order. Chords
// without notes have no start time and are refused at insertion.
//
// All types serialize with serde. Deserialization goes through the same
// validating constructors (`#[serde(try_from = ...)]`), so JSON can't build
// what the constructors would reject. The mirror `*Fields` structs read
// integers wide, so an out-of-range number in JSON reaches the constructor
// and reports as `Validation` from `Composition::from_json`.
//
// See also: `schedule.rs`, which turns a `Composition` into tick-ordered
// note events.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default note velocity.
pub const DEFAULT_VELOCITY: u8 = 100;
/// Default track pan (center).
pub const DEFAULT_PAN: u8 = 64;
/// Default track volume (controller 7).
pub const DEFAULT_VOLUME: u8 = 100;

const MICROS_PER_MINUTE: f64 = 60_000_000.0;
const MAX_TEMPO_MICROS: f64 = 16_777_215.0;

/// Narrow a JSON integer; the constructor checks the finer range.
fn narrow(field: &'static str, value: i64, expected: &'static str) -> Result<u8> {
    u8::try_from(value).map_err(|_| Error::validation(field, value, expected))
}

fn check_data_byte(field: &'static str, value: u8) -> Result<u8> {
    if value > 127 {
        return Err(Error::validation(field, value, "0..=127"));
    }
    Ok(value)
}

fn check_start(start_time: f64) -> Result<f64> {
    if !start_time.is_finite() || start_time < 0.0 {
        return Err(Error::validation(
            "start_time",
            start_time,
            "a finite beat position >= 0",
        ));
    }
    Ok(start_time)
}

fn check_duration(duration: f64) -> Result<f64> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(Error::validation(
            "duration",
            duration,
            "a finite beat length > 0",
        ));
    }
    Ok(duration)
}

// ---------------------------------------------------------------------------
// Note
// ---------------------------------------------------------------------------

/// A single pitched event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NoteFields")]
pub struct Note {
    pitch: u8,
    start_time: f64,
    duration: f64,
    velocity: u8,
}

#[derive(Deserialize)]
struct NoteFields {
    pitch: i64,
    start_time: f64,
    duration: f64,
    #[serde(default = "default_velocity")]
    velocity: i64,
}

fn default_velocity() -> i64 {
    i64::from(DEFAULT_VELOCITY)
}

impl TryFrom<NoteFields> for Note {
    type Error = Error;

    fn try_from(fields: NoteFields) -> Result<Self> {
        Note::new(
            narrow("pitch", fields.pitch, "0..=127")?,
            fields.start_time,
            fields.duration,
            narrow("velocity", fields.velocity, "0..=127")?,
        )
    }
}

impl Note {
    /// Pitch and velocity in 0..=127, start >= 0 beats, duration > 0 beats.
    pub fn new(pitch: u8, start_time: f64, duration: f64, velocity: u8) -> Result<Self> {
        Ok(Note {
            pitch: check_data_byte("pitch", pitch)?,
            start_time: check_start(start_time)?,
            duration: check_duration(duration)?,
            velocity: check_data_byte("velocity", velocity)?,
        })
    }

    pub fn pitch(&self) -> u8 {
        self.pitch
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Shift the pitch, clamping the result into 0..=127.
    pub fn transpose(&mut self, semitones: i32) {
        self.pitch = (i32::from(self.pitch) + semitones).clamp(0, 127) as u8;
    }
}

// ---------------------------------------------------------------------------
// Chord
// ---------------------------------------------------------------------------

/// Notes meant to sound together, kept ordered by pitch.
///
/// The chord's start time and duration are those of its first (lowest) note;
/// an empty chord has neither.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ChordFields")]
pub struct Chord {
    notes: Vec<Note>,
}

#[derive(Deserialize)]
struct ChordFields {
    #[serde(default)]
    notes: Vec<NoteFields>,
}

impl TryFrom<ChordFields> for Chord {
    type Error = Error;

    fn try_from(fields: ChordFields) -> Result<Self> {
        let notes = fields
            .notes
            .into_iter()
            .map(Note::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Chord::new(notes))
    }
}

impl Chord {
    pub fn new(mut notes: Vec<Note>) -> Self {
        notes.sort_by_key(Note::pitch);
        Chord { notes }
    }

    /// Build a chord from pitches that share one start, duration, and velocity.
    pub fn from_pitches(
        pitches: &[u8],
        start_time: f64,
        duration: f64,
        velocity: u8,
    ) -> Result<Self> {
        let notes = pitches
            .iter()
            .map(|&pitch| Note::new(pitch, start_time, duration, velocity))
            .collect::<Result<Vec<_>>>()?;
        Ok(Chord::new(notes))
    }

    pub fn add_note(&mut self, note: Note) {
        let at = self.notes.partition_point(|n| n.pitch <= note.pitch);
        self.notes.insert(at, note);
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn start_time(&self) -> Option<f64> {
        self.notes.first().map(Note::start_time)
    }

    pub fn duration(&self) -> Option<f64> {
        self.notes.first().map(Note::duration)
    }

    /// Transpose every note. Clamping is monotonic, so pitch order holds.
    pub fn transpose(&mut self, semitones: i32) {
        for note in &mut self.notes {
            note.transpose(semitones);
        }
    }
}

// ---------------------------------------------------------------------------
// Rest
// ---------------------------------------------------------------------------

/// Silence. Produces no events; callers use it as a timeline placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RestFields")]
pub struct Rest {
    start_time: f64,
    duration: f64,
}

#[derive(Deserialize)]
struct RestFields {
    start_time: f64,
    duration: f64,
}

impl TryFrom<RestFields> for Rest {
    type Error = Error;

    fn try_from(fields: RestFields) -> Result<Self> {
        Rest::new(fields.start_time, fields.duration)
    }
}

impl Rest {
    pub fn new(start_time: f64, duration: f64) -> Result<Self> {
        Ok(Rest {
            start_time: check_start(start_time)?,
            duration: check_duration(duration)?,
        })
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

// ---------------------------------------------------------------------------
// Element
// ---------------------------------------------------------------------------

/// Anything a track can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", try_from = "ElementFields")]
pub enum Element {
    Note(Note),
    Chord(Chord),
    Rest(Rest),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ElementFields {
    Note(NoteFields),
    Chord(ChordFields),
    Rest(RestFields),
}

impl TryFrom<ElementFields> for Element {
    type Error = Error;

    fn try_from(fields: ElementFields) -> Result<Self> {
        Ok(match fields {
            ElementFields::Note(note) => Element::Note(note.try_into()?),
            ElementFields::Chord(chord) => Element::Chord(chord.try_into()?),
            ElementFields::Rest(rest) => Element::Rest(rest.try_into()?),
        })
    }
}

impl Element {
    /// `None` only for an empty chord.
    pub fn start_time(&self) -> Option<f64> {
        match self {
            Element::Note(note) => Some(note.start_time()),
            Element::Chord(chord) => chord.start_time(),
            Element::Rest(rest) => Some(rest.start_time()),
        }
    }

    /// `None` only for an empty chord.
    pub fn end_time(&self) -> Option<f64> {
        match self {
            Element::Note(note) => Some(note.end_time()),
            Element::Chord(chord) => chord.notes().iter().map(Note::end_time).reduce(f64::max),
            Element::Rest(rest) => Some(rest.end_time()),
        }
    }
}

impl From<Note> for Element {
    fn from(note: Note) -> Self {
        Element::Note(note)
    }
}

impl From<Chord> for Element {
    fn from(chord: Chord) -> Self {
        Element::Chord(chord)
    }
}

impl From<Rest> for Element {
    fn from(rest: Rest) -> Self {
        Element::Rest(rest)
    }
}

// ---------------------------------------------------------------------------
// Track
// ---------------------------------------------------------------------------

/// One instrument part on one MIDI channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TrackFields")]
pub struct Track {
    name: String,
    instrument_program: u8,
    channel: u8,
    pan: u8,
    volume: u8,
    elements: Vec<Element>,
}

#[derive(Deserialize)]
struct TrackFields {
    name: String,
    #[serde(default)]
    instrument_program: i64,
    #[serde(default)]
    channel: i64,
    #[serde(default = "default_pan")]
    pan: i64,
    #[serde(default = "default_volume")]
    volume: i64,
    #[serde(default)]
    elements: Vec<ElementFields>,
}

fn default_pan() -> i64 {
    i64::from(DEFAULT_PAN)
}

fn default_volume() -> i64 {
    i64::from(DEFAULT_VOLUME)
}

impl TryFrom<TrackFields> for Track {
    type Error = Error;

    fn try_from(fields: TrackFields) -> Result<Self> {
        let program = narrow("instrument_program", fields.instrument_program, "0..=127")?;
        let channel = narrow("channel", fields.channel, "0..=15")?;
        let mut track = Track::new(fields.name, program, channel)?
            .with_pan(narrow("pan", fields.pan, "0..=127")?)?
            .with_volume(narrow("volume", fields.volume, "0..=127")?)?;
        for element in fields.elements {
            track.add_element(Element::try_from(element)?)?;
        }
        Ok(track)
    }
}

impl Track {
    /// A track with center pan and volume 100. Program in 0..=127, channel
    /// in 0..=15.
    pub fn new(name: impl Into<String>, instrument_program: u8, channel: u8) -> Result<Self> {
        if channel > 15 {
            return Err(Error::validation("channel", channel, "0..=15"));
        }
        Ok(Track {
            name: name.into(),
            instrument_program: check_data_byte("instrument_program", instrument_program)?,
            channel,
            pan: DEFAULT_PAN,
            volume: DEFAULT_VOLUME,
            elements: Vec::new(),
        })
    }

    pub fn with_pan(mut self, pan: u8) -> Result<Self> {
        self.set_pan(pan)?;
        Ok(self)
    }

    pub fn with_volume(mut self, volume: u8) -> Result<Self> {
        self.set_volume(volume)?;
        Ok(self)
    }

    pub fn set_pan(&mut self, pan: u8) -> Result<()> {
        self.pan = check_data_byte("pan", pan)?;
        Ok(())
    }

    pub fn set_volume(&mut self, volume: u8) -> Result<()> {
        self.volume = check_data_byte("volume", volume)?;
        Ok(())
    }

    /// Change the program, optionally renaming the track to match its new role.
    pub fn set_instrument(&mut self, instrument_program: u8, name: Option<&str>) -> Result<()> {
        self.instrument_program = check_data_byte("instrument_program", instrument_program)?;
        if let Some(name) = name {
            self.name = name.to_string();
        }
        Ok(())
    }

    /// Insert an element at its start-time position. Empty chords are refused.
    pub fn add_element(&mut self, element: impl Into<Element>) -> Result<()> {
        let element = element.into();
        let Some(start) = element.start_time() else {
            return Err(Error::EmptyChord {
                track: self.name.clone(),
            });
        };
        let at = self
            .elements
            .partition_point(|e| e.start_time().is_none_or(|t| t <= start));
        self.elements.insert(at, element);
        Ok(())
    }

    pub fn add_notes(&mut self, notes: impl IntoIterator<Item = Note>) -> Result<()> {
        for note in notes {
            self.add_element(note)?;
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instrument_program(&self) -> u8 {
        self.instrument_program
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn pan(&self) -> u8 {
        self.pan
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Elements in ascending start-time order.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// End of the last-sounding element, in beats.
    pub fn end_time(&self) -> f64 {
        self.elements
            .iter()
            .filter_map(Element::end_time)
            .fold(0.0, f64::max)
    }
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// Meter. The denominator must be a power of two because the SMF
/// time-signature event stores its base-2 logarithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "(u8, u8)", into = "(u8, u8)")]
pub struct TimeSignature {
    numerator: u8,
    denominator: u8,
}

impl TimeSignature {
    pub fn new(numerator: u8, denominator: u8) -> Result<Self> {
        if numerator == 0 {
            return Err(Error::validation("numerator", numerator, "1..=255"));
        }
        if !denominator.is_power_of_two() {
            return Err(Error::validation(
                "denominator",
                denominator,
                "a power of two in 1..=128",
            ));
        }
        Ok(TimeSignature {
            numerator,
            denominator,
        })
    }

    pub fn numerator(&self) -> u8 {
        self.numerator
    }

    pub fn denominator(&self) -> u8 {
        self.denominator
    }

    /// `log2(denominator)`, as written into the SMF event.
    pub fn denominator_power(&self) -> u8 {
        self.denominator.trailing_zeros() as u8
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature {
            numerator: 4,
            denominator: 4,
        }
    }
}

impl TryFrom<(u8, u8)> for TimeSignature {
    type Error = Error;

    fn try_from((numerator, denominator): (u8, u8)) -> Result<Self> {
        TimeSignature::new(numerator, denominator)
    }
}

impl From<TimeSignature> for (u8, u8) {
    fn from(ts: TimeSignature) -> Self {
        (ts.numerator, ts.denominator)
    }
}

/// A titled piece with a tempo, a meter, and its tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CompositionFields")]
pub struct Composition {
    title: String,
    tempo: f64,
    time_signature: TimeSignature,
    tracks: Vec<Track>,
}

#[derive(Deserialize)]
struct CompositionFields {
    #[serde(default = "default_title")]
    title: String,
    #[serde(default = "default_tempo")]
    tempo: f64,
    #[serde(default = "default_meter")]
    time_signature: (i64, i64),
    #[serde(default)]
    tracks: Vec<TrackFields>,
}

fn default_meter() -> (i64, i64) {
    (4, 4)
}

fn default_title() -> String {
    "Untitled Composition".to_string()
}

fn default_tempo() -> f64 {
    120.0
}

impl TryFrom<CompositionFields> for Composition {
    type Error = Error;

    fn try_from(fields: CompositionFields) -> Result<Self> {
        let (numerator, denominator) = fields.time_signature;
        let time_signature = TimeSignature::new(
            narrow("numerator", numerator, "1..=255")?,
            narrow("denominator", denominator, "a power of two in 1..=128")?,
        )?;
        let mut composition = Composition::new(fields.title, fields.tempo, time_signature)?;
        for track in fields.tracks {
            composition.add_track(Track::try_from(track)?);
        }
        Ok(composition)
    }
}

fn check_tempo(tempo: f64) -> Result<f64> {
    let micros = MICROS_PER_MINUTE / tempo;
    if !tempo.is_finite()
        || tempo <= 0.0
        || micros.round() < 1.0
        || micros.round() > MAX_TEMPO_MICROS
    {
        return Err(Error::validation(
            "tempo",
            tempo,
            "a finite BPM whose quarter note fits in 24-bit microseconds",
        ));
    }
    Ok(tempo)
}

impl Composition {
    pub fn new(title: impl Into<String>, tempo: f64, time_signature: TimeSignature) -> Result<Self> {
        Ok(Composition {
            title: title.into(),
            tempo: check_tempo(tempo)?,
            time_signature,
            tracks: Vec::new(),
        })
    }

    /// Parse a composition from JSON, validating every entity.
    ///
    /// Malformed JSON or a wrongly typed field is `Config`; a value outside
    /// its legal range is the constructor's own error (`Validation`,
    /// `EmptyChord`).
    pub fn from_json(json: &str) -> Result<Self> {
        let fields: CompositionFields = serde_json::from_str(json)?;
        Composition::try_from(fields)
    }

    /// Append a track. Reusing a channel is allowed but logged, since the
    /// tracks will then share program and controller state on playback.
    pub fn add_track(&mut self, track: Track) {
        if let Some(other) = self.tracks.iter().find(|t| t.channel == track.channel) {
            tracing::warn!(
                "channel {} of track '{}' is already used by track '{}'",
                track.channel,
                track.name,
                other.name
            );
        }
        self.tracks.push(track);
    }

    pub fn set_tempo(&mut self, tempo: f64) -> Result<()> {
        self.tempo = check_tempo(tempo)?;
        Ok(())
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Beats per minute.
    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// Quarter-note length in microseconds, rounded to the nearest whole one.
    pub fn tempo_micros(&self) -> u32 {
        (MICROS_PER_MINUTE / self.tempo).round() as u32
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    /// Channels carried by more than one track, ascending.
    pub fn shared_channels(&self) -> Vec<u8> {
        let mut counts: BTreeMap<u8, usize> = BTreeMap::new();
        for track in &self.tracks {
            *counts.entry(track.channel).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|&(_, count)| count > 1)
            .map(|(channel, _)| channel)
            .collect()
    }

    /// Length of the piece in beats (end of the last element of any track).
    pub fn total_beats(&self) -> f64 {
        self.tracks.iter().map(Track::end_time).fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(pitch: u8, start: f64, duration: f64) -> Note {
        Note::new(pitch, start, duration, 90).unwrap()
    }

    #[test]
    fn note_reads_back_its_fields() {
        let n = Note::new(61, 1.5, 0.25, 77).unwrap();
        assert_eq!(n.pitch(), 61);
        assert_eq!(n.start_time(), 1.5);
        assert_eq!(n.duration(), 0.25);
        assert_eq!(n.velocity(), 77);
        assert_eq!(n.end_time(), 1.75);
    }

    #[test]
    fn note_rejects_out_of_range_fields() {
        let cases = [
            (Note::new(128, 0.0, 1.0, 100), "pitch"),
            (Note::new(60, 0.0, 1.0, 128), "velocity"),
            (Note::new(60, -0.5, 1.0, 100), "start_time"),
            (Note::new(60, f64::NAN, 1.0, 100), "start_time"),
            (Note::new(60, 0.0, 0.0, 100), "duration"),
            (Note::new(60, 0.0, -1.0, 100), "duration"),
            (Note::new(60, 0.0, f64::INFINITY, 100), "duration"),
        ];
        for (result, expected) in cases {
            match result {
                Err(Error::Validation { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected {expected} validation error, got {other:?}"),
            }
        }
    }

    #[test]
    fn transpose_clamps_into_midi_range() {
        let mut n = note(120, 0.0, 1.0);
        n.transpose(12);
        assert_eq!(n.pitch(), 127);
        n.transpose(-200);
        assert_eq!(n.pitch(), 0);
        n.transpose(7);
        assert_eq!(n.pitch(), 7);
    }

    #[test]
    fn chord_orders_notes_by_pitch_and_derives_timing() {
        let chord = Chord::new(vec![note(67, 2.0, 1.0), note(60, 2.0, 1.0), note(64, 2.0, 1.0)]);
        let pitches: Vec<u8> = chord.notes().iter().map(Note::pitch).collect();
        assert_eq!(pitches, vec![60, 64, 67]);
        assert_eq!(chord.start_time(), Some(2.0));
        assert_eq!(chord.duration(), Some(1.0));
    }

    #[test]
    fn chord_add_note_keeps_pitch_order() {
        let mut chord = Chord::from_pitches(&[60, 67], 0.0, 1.0, 80).unwrap();
        chord.add_note(note(64, 0.0, 1.0));
        let pitches: Vec<u8> = chord.notes().iter().map(Note::pitch).collect();
        assert_eq!(pitches, vec![60, 64, 67]);
    }

    #[test]
    fn empty_chord_has_no_timing() {
        let chord = Chord::default();
        assert!(chord.is_empty());
        assert_eq!(chord.start_time(), None);
        assert_eq!(chord.duration(), None);
    }

    #[test]
    fn chord_from_pitches_validates() {
        assert!(Chord::from_pitches(&[60, 200], 0.0, 1.0, 80).is_err());
        assert!(Chord::from_pitches(&[60], 0.0, 0.0, 80).is_err());
    }

    #[test]
    fn rest_validates_and_reads_back() {
        let rest = Rest::new(3.0, 0.5).unwrap();
        assert_eq!(rest.start_time(), 3.0);
        assert_eq!(rest.duration(), 0.5);
        assert_eq!(rest.end_time(), 3.5);
        assert!(Rest::new(-1.0, 1.0).is_err());
        assert!(Rest::new(0.0, 0.0).is_err());
    }

    #[test]
    fn track_validates_ranges() {
        assert!(Track::new("t", 128, 0).is_err());
        assert!(Track::new("t", 0, 16).is_err());
        assert!(Track::new("t", 0, 0).unwrap().with_pan(128).is_err());
        assert!(Track::new("t", 0, 0).unwrap().with_volume(200).is_err());
        let track = Track::new("Lead", 80, 3).unwrap();
        assert_eq!(track.pan(), 64);
        assert_eq!(track.volume(), 100);
        assert_eq!(track.channel(), 3);
        assert_eq!(track.instrument_program(), 80);
    }

    #[test]
    fn track_keeps_elements_sorted() {
        let mut track = Track::new("t", 0, 0).unwrap();
        track.add_element(note(60, 2.0, 1.0)).unwrap();
        track.add_element(Rest::new(1.0, 1.0).unwrap()).unwrap();
        track
            .add_element(Chord::from_pitches(&[48, 52], 0.0, 1.0, 80).unwrap())
            .unwrap();
        track.add_element(note(62, 1.5, 0.5)).unwrap();

        let starts: Vec<f64> = track
            .elements()
            .iter()
            .map(|e| e.start_time().unwrap())
            .collect();
        assert_eq!(starts, vec![0.0, 1.0, 1.5, 2.0]);
    }

    #[test]
    fn track_equal_start_times_keep_insertion_order() {
        let mut track = Track::new("t", 0, 0).unwrap();
        track.add_element(note(60, 1.0, 1.0)).unwrap();
        track.add_element(note(50, 1.0, 1.0)).unwrap();
        track.add_element(note(70, 1.0, 1.0)).unwrap();
        let pitches: Vec<u8> = track
            .elements()
            .iter()
            .map(|e| match e {
                Element::Note(n) => n.pitch(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(pitches, vec![60, 50, 70]);
    }

    #[test]
    fn track_refuses_empty_chord() {
        let mut track = Track::new("Pads", 0, 0).unwrap();
        let err = track.add_element(Chord::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyChord { track } if track == "Pads"));
        assert!(track.elements().is_empty());
    }

    #[test]
    fn set_instrument_renames_optionally() {
        let mut track = Track::new("Keys", 0, 0).unwrap();
        track.set_instrument(48, None).unwrap();
        assert_eq!(track.name(), "Keys");
        track.set_instrument(33, Some("Bass")).unwrap();
        assert_eq!(track.name(), "Bass");
        assert_eq!(track.instrument_program(), 33);
        assert!(track.set_instrument(128, None).is_err());
    }

    #[test]
    fn time_signature_requires_power_of_two_denominator() {
        assert!(TimeSignature::new(4, 4).is_ok());
        assert!(TimeSignature::new(7, 8).is_ok());
        assert!(TimeSignature::new(0, 4).is_err());
        assert!(TimeSignature::new(4, 0).is_err());
        assert!(TimeSignature::new(4, 3).is_err());
        assert_eq!(TimeSignature::new(6, 8).unwrap().denominator_power(), 3);
        assert_eq!(TimeSignature::new(2, 1).unwrap().denominator_power(), 0);
    }

    #[test]
    fn composition_validates_tempo() {
        let ts = TimeSignature::default();
        assert!(Composition::new("x", 0.0, ts).is_err());
        assert!(Composition::new("x", -10.0, ts).is_err());
        assert!(Composition::new("x", f64::NAN, ts).is_err());
        // Slower than ~3.58 BPM overflows the 24-bit tempo field.
        assert!(Composition::new("x", 3.0, ts).is_err());
        let song = Composition::new("x", 120.0, ts).unwrap();
        assert_eq!(song.tempo_micros(), 500_000);
        let mut song = song;
        assert!(song.set_tempo(0.0).is_err());
        song.set_tempo(90.0).unwrap();
        assert_eq!(song.tempo_micros(), 666_667);
    }

    #[test]
    fn shared_channels_are_advisory() {
        let mut song = Composition::new("x", 120.0, TimeSignature::default()).unwrap();
        song.add_track(Track::new("a", 0, 0).unwrap());
        song.add_track(Track::new("b", 0, 1).unwrap());
        song.add_track(Track::new("c", 0, 0).unwrap());
        assert_eq!(song.tracks().len(), 3);
        assert_eq!(song.shared_channels(), vec![0]);
    }

    #[test]
    fn total_beats_spans_all_tracks() {
        let mut song = Composition::new("x", 120.0, TimeSignature::default()).unwrap();
        let mut a = Track::new("a", 0, 0).unwrap();
        a.add_element(note(60, 0.0, 2.0)).unwrap();
        let mut b = Track::new("b", 0, 1).unwrap();
        b.add_element(Rest::new(4.0, 4.0).unwrap()).unwrap();
        song.add_track(a);
        song.add_track(b);
        assert_eq!(song.total_beats(), 8.0);
    }

    #[test]
    fn composition_json_roundtrip() {
        let mut song = Composition::new("Etude", 96.0, TimeSignature::new(3, 4).unwrap()).unwrap();
        let mut track = Track::new("Piano", 0, 0).unwrap().with_pan(30).unwrap();
        track.add_element(note(60, 0.0, 1.0)).unwrap();
        track
            .add_element(Chord::from_pitches(&[48, 55], 1.0, 2.0, 70).unwrap())
            .unwrap();
        track.add_element(Rest::new(3.0, 1.0).unwrap()).unwrap();
        song.add_track(track);

        let json = serde_json::to_string(&song).unwrap();
        let restored = Composition::from_json(&json).unwrap();
        assert_eq!(song, restored);
    }

    #[test]
    fn composition_json_applies_defaults_and_sorts() {
        let json = r#"{
            "title": "Sketch",
            "tracks": [{
                "name": "Lead",
                "channel": 2,
                "elements": [
                    {"type": "note", "pitch": 64, "start_time": 2.0, "duration": 1.0},
                    {"type": "note", "pitch": 60, "start_time": 0.0, "duration": 1.0}
                ]
            }]
        }"#;
        let song = Composition::from_json(json).unwrap();
        assert_eq!(song.tempo(), 120.0);
        assert_eq!(song.time_signature(), TimeSignature::default());
        let track = &song.tracks()[0];
        assert_eq!(track.pan(), 64);
        assert_eq!(track.volume(), 100);
        assert_eq!(track.elements()[0].start_time(), Some(0.0));
        match &track.elements()[1] {
            Element::Note(n) => assert_eq!(n.velocity(), DEFAULT_VELOCITY),
            other => panic!("expected note, got {other:?}"),
        }
    }

    fn validation_field(json: &str) -> &'static str {
        match Composition::from_json(json) {
            Err(Error::Validation { field, .. }) => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn composition_json_reports_range_errors_as_validation() {
        let note = |pitch: i64| {
            format!(
                r#"{{"tracks": [{{"name": "t", "elements": [
                    {{"type": "note", "pitch": {pitch}, "start_time": 0.0, "duration": 1.0}}
                ]}}]}}"#
            )
        };
        assert_eq!(validation_field(&note(130)), "pitch");
        assert_eq!(validation_field(&note(300)), "pitch");
        assert_eq!(validation_field(&note(-1)), "pitch");
        assert_eq!(validation_field(r#"{"time_signature": [4, 6]}"#), "denominator");
        assert_eq!(validation_field(r#"{"time_signature": [0, 4]}"#), "numerator");
        assert_eq!(validation_field(r#"{"tempo": 0}"#), "tempo");
        assert_eq!(
            validation_field(r#"{"tracks": [{"name": "t", "channel": 16}]}"#),
            "channel"
        );
        assert_eq!(
            validation_field(r#"{"tracks": [{"name": "t", "volume": 1000}]}"#),
            "volume"
        );
        assert_eq!(
            validation_field(
                r#"{"tracks": [{"name": "t", "elements": [{"type": "chord", "notes": [
                    {"pitch": 60, "start_time": 0.0, "duration": 0.0}
                ]}]}]}"#
            ),
            "duration"
        );
    }

    #[test]
    fn composition_json_structural_errors() {
        let empty_chord = r#"{"tracks": [{"name": "t", "elements": [{"type": "chord", "notes": []}]}]}"#;
        assert!(matches!(
            Composition::from_json(empty_chord),
            Err(Error::EmptyChord { .. })
        ));
        assert!(matches!(Composition::from_json("{ nope"), Err(Error::Config(_))));
        let untyped = r#"{"tracks": [{"name": "t", "elements": [{"type": "drone"}]}]}"#;
        assert!(matches!(Composition::from_json(untyped), Err(Error::Config(_))));
    }

    #[test]
    fn serde_deserialize_still_rejects_invalid_entities() {
        let bad = r#"{"type": "note", "pitch": 200, "start_time": 0.0, "duration": 1.0}"#;
        assert!(serde_json::from_str::<Element>(bad).is_err());
        let good = r#"{"type": "rest", "start_time": 1.0, "duration": 2.0}"#;
        assert_eq!(
            serde_json::from_str::<Element>(good).unwrap(),
            Element::Rest(Rest::new(1.0, 2.0).unwrap())
        );
    }
}
