// Flattens a composition into per-track, tick-ordered note events.
//
// Beat positions become ticks with `tick = round(beats * ticks_per_beat)`
// (round half away from zero). A position whose tick count is past the exact
// integer range of an f64 (2^53) is a `TickOverflow`. Every note, standalone or inside a chord,
// yields a NoteOn at its start tick and a NoteOff at its end tick; rests
// yield nothing. Events sort stably by `(tick, kind)` with NoteOff ordered
// before NoteOn, so a note re-struck at the instant its predecessor of the
// same pitch ends is never cut off by that predecessor's NoteOff.
//
// The sorted stream is then converted to delta times (ticks since the
// previous event in the track), which is what the SMF encoder writes.
//
// See also: `smf.rs`, which wraps the scheduled tracks in SMF chunks.

use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::timeline::{Composition, Element, Note, Track};

/// Largest delta time a variable-length quantity can hold (28 bits).
pub const MAX_DELTA: u32 = 0x0FFF_FFFF;

/// Largest absolute tick a beat position may land on.
pub const MAX_TICK: u64 = 1 << 53;

/// Note event kind. The derived order puts `NoteOff` first, which is the
/// tie-break at equal ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    NoteOff,
    NoteOn,
}

/// A note event at an absolute tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub tick: u64,
    pub kind: EventKind,
    pub pitch: u8,
    pub velocity: u8,
}

/// A note event relative to the previous event in its track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaEvent {
    pub delta: u32,
    pub kind: EventKind,
    pub pitch: u8,
    pub velocity: u8,
}

/// What the encoder writes ahead of a track's note stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSetup {
    pub name: String,
    pub channel: u8,
    pub program: u8,
    pub pan: u8,
    pub volume: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTrack {
    pub setup: TrackSetup,
    pub events: Vec<DeltaEvent>,
}

/// Beats to ticks.
pub fn to_ticks(beats: f64, ticks_per_beat: u16) -> Result<u64> {
    let ticks = (beats * f64::from(ticks_per_beat)).round();
    if ticks >= MAX_TICK as f64 {
        return Err(Error::TickOverflow { tick: ticks as u64 });
    }
    Ok(ticks as u64)
}

fn push_note(events: &mut Vec<ScheduledEvent>, note: &Note, ticks_per_beat: u16) -> Result<()> {
    let on = to_ticks(note.start_time(), ticks_per_beat)?;
    // A positive duration that rounds to nothing still gets one tick.
    let off = to_ticks(note.end_time(), ticks_per_beat)?.max(on + 1);
    events.push(ScheduledEvent {
        tick: on,
        kind: EventKind::NoteOn,
        pitch: note.pitch(),
        velocity: note.velocity(),
    });
    events.push(ScheduledEvent {
        tick: off,
        kind: EventKind::NoteOff,
        pitch: note.pitch(),
        velocity: 0,
    });
    Ok(())
}

/// Absolute-tick events for one track, sorted by `(tick, kind)`.
pub fn absolute_events(track: &Track, config: &RenderConfig) -> Result<Vec<ScheduledEvent>> {
    let tpb = config.ticks_per_beat;
    let mut events = Vec::new();
    for element in track.elements() {
        match element {
            Element::Note(note) => push_note(&mut events, note, tpb)?,
            Element::Chord(chord) => {
                if chord.is_empty() {
                    return Err(Error::EmptyChord {
                        track: track.name().to_string(),
                    });
                }
                for note in chord.notes() {
                    push_note(&mut events, note, tpb)?;
                }
            }
            Element::Rest(_) => {}
        }
    }
    events.sort_by_key(|e| (e.tick, e.kind));
    Ok(events)
}

/// Convert sorted absolute events into delta events.
pub fn to_deltas(events: &[ScheduledEvent]) -> Result<Vec<DeltaEvent>> {
    let mut previous = 0u64;
    events
        .iter()
        .map(|e| {
            let delta = e.tick - previous;
            if delta > u64::from(MAX_DELTA) {
                return Err(Error::TickOverflow { tick: e.tick });
            }
            previous = e.tick;
            Ok(DeltaEvent {
                delta: delta as u32,
                kind: e.kind,
                pitch: e.pitch,
                velocity: e.velocity,
            })
        })
        .collect()
}

pub fn schedule_track(track: &Track, config: &RenderConfig) -> Result<ScheduledTrack> {
    let events = to_deltas(&absolute_events(track, config)?)?;
    Ok(ScheduledTrack {
        setup: TrackSetup {
            name: track.name().to_string(),
            channel: track.channel(),
            program: track.instrument_program(),
            pan: track.pan(),
            volume: track.volume(),
        },
        events,
    })
}

/// Schedule every track of a composition, in track order.
pub fn schedule(composition: &Composition, config: &RenderConfig) -> Result<Vec<ScheduledTrack>> {
    let tracks = composition
        .tracks()
        .iter()
        .map(|track| schedule_track(track, config))
        .collect::<Result<Vec<_>>>()?;
    tracing::debug!(
        tracks = tracks.len(),
        events = tracks.iter().map(|t| t.events.len()).sum::<usize>(),
        "scheduled composition"
    );
    Ok(tracks)
}
