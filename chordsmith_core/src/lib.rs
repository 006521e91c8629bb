// Chordsmith core: music-theory resolution and Standard MIDI File encoding.
//
// Takes symbolic musical intent (keys, scale types, chord symbols, hit
// counts) to concrete MIDI pitches and beat positions, holds the result in a
// validated composition model, and serializes that model to a format 1 SMF.
//
// Architecture:
// - theory.rs: Scale and chord resolution (scale notes, diatonic chords,
//   chord-symbol parsing with quality fallback, inversions, polyrhythm onsets)
// - timeline.rs: Note / Chord / Rest / Track / Composition, range-checked at
//   construction, tracks kept sorted by start time
// - schedule.rs: Beats to ticks, NoteOn/NoteOff ordering, delta times
// - smf.rs: SMF chunks via `midly`, `.mid` extension correction, atomic export
// - config.rs: Theory tables and render settings (serde, explicit values)
// - error.rs: Error taxonomy and the chord-quality fallback diagnostic
//
// Every operation is a pure function of its inputs and the config values it
// is handed; there is no global state.

pub mod config;
pub mod error;
pub mod schedule;
pub mod smf;
pub mod theory;
pub mod timeline;

pub use config::{RenderConfig, TheoryTables};
pub use error::{Error, Result, UnknownQuality};
pub use smf::SmfEncoder;
pub use theory::{ChordSymbol, Theory};
pub use timeline::{Chord, Composition, Element, Note, Rest, TimeSignature, Track};
