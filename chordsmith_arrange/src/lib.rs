// Chordsmith arrangement layer.
//
// Builds compositions from a JSON song description by running data-driven
// generators over the core theory resolver, then hands them to the core SMF
// encoder. Deterministic given a seed.
//
// Architecture:
// - song.rs: `SongConfig` (title, tempo, meter, base octave, seed, tracks),
//   track specs tagged by `kind`, and the `build` driver
// - progression.rs: Multi-part chord progressions (symbols or diatonic
//   degrees, block or arpeggio playing, cycling inversion/octave/rhythm lists)
// - random_progression.rs: Weighted random draws from the diatonic chords
// - melody.rs: Random-walk melody over a scale palette with rests
// - chord_bass.rs: Random diatonic chords plus a bass line on their roots
// - drums.rs: Step-pattern drums on the GM percussion channel
// - polyrhythm.rs: Polyrhythmic chord-tone arpeggiator with optional pads
// - dice.rs: Seeded randomness shared by the generators
// - error.rs: Arrangement errors (wrapping core errors)
//
// The `render` binary (main.rs) is the command-line front end.

pub mod chord_bass;
pub mod dice;
pub mod drums;
pub mod error;
pub mod melody;
pub mod polyrhythm;
pub mod progression;
pub mod random_progression;
pub mod song;

pub use error::{Error, Result};
pub use song::{SongConfig, TrackSpec};
