// Standard MIDI File output.
//
// Encodes a Composition as SMF format 1 (multi-track) using `midly`:
// - Track 0 (meta): title, tempo (microseconds per quarter note), time
//   signature, end of track.
// - One track per Composition track: name, program change, pan (CC 10),
//   volume (CC 7), the scheduled note stream, end of track.
// All setup events sit at delta 0. The header's time division is the
// configured ticks per beat.
//
// `export` encodes fully in memory before touching the filesystem, stages the
// bytes in a temp file next to the destination, and renames it into place,
// so a failed export never leaves a partial `.mid` behind.

use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::schedule::{self, EventKind, ScheduledTrack};
use crate::timeline::Composition;
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track as SmfTrack, TrackEvent,
    TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::ffi::OsStr;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// MIDI controller number for pan.
const CC_PAN: u8 = 10;
/// MIDI controller number for channel volume.
const CC_VOLUME: u8 = 7;
/// MIDI clocks per metronome click in the time-signature event.
const CLOCKS_PER_CLICK: u8 = 24;
/// Notated 32nd notes per MIDI quarter note in the time-signature event.
const THIRTY_SECONDS_PER_QUARTER: u8 = 8;

#[derive(Debug, Clone, Copy, Default)]
pub struct SmfEncoder {
    config: RenderConfig,
}

impl SmfEncoder {
    pub fn new(config: RenderConfig) -> Result<Self> {
        config.validate()?;
        Ok(SmfEncoder { config })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Encode a composition to SMF bytes. Pure: equal compositions give
    /// byte-identical output.
    pub fn encode(&self, composition: &Composition) -> Result<Vec<u8>> {
        self.config.validate()?;
        let scheduled = schedule::schedule(composition, &self.config)?;

        let mut smf = Smf::new(Header::new(
            Format::Parallel,
            Timing::Metrical(u15::new(self.config.ticks_per_beat)),
        ));
        smf.tracks.push(meta_track(composition));
        for track in &scheduled {
            smf.tracks.push(note_track(track));
        }

        let mut buf = Vec::new();
        smf.write(&mut buf)
            .map_err(|e| Error::Encode(e.to_string()))?;
        tracing::debug!(
            bytes = buf.len(),
            tracks = smf.tracks.len(),
            "encoded '{}'",
            composition.title()
        );
        Ok(buf)
    }

    /// Encode and write to `path`, appending `.mid` when the path lacks that
    /// extension. Returns the path actually written.
    pub fn export(&self, composition: &Composition, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = with_mid_extension(path.as_ref());
        let bytes = self.encode(composition)?;
        write_atomically(&path, &bytes).map_err(|source| Error::Export {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "exported MIDI file");
        Ok(path)
    }
}

/// `song.mid` and `SONG.MID` are kept; anything else gets `.mid` appended.
pub fn with_mid_extension(path: &Path) -> PathBuf {
    match path.extension().and_then(OsStr::to_str) {
        Some(ext) if ext.eq_ignore_ascii_case("mid") => path.to_path_buf(),
        _ => {
            let mut corrected = path.as_os_str().to_owned();
            corrected.push(".mid");
            let corrected = PathBuf::from(corrected);
            tracing::warn!(
                "destination {} lacks a .mid extension, writing {}",
                path.display(),
                corrected.display()
            );
            corrected
        }
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn meta_event(message: MetaMessage<'_>) -> TrackEvent<'_> {
    TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(message),
    }
}

fn meta_track(composition: &Composition) -> SmfTrack<'_> {
    let ts = composition.time_signature();
    vec![
        meta_event(MetaMessage::TrackName(composition.title().as_bytes())),
        meta_event(MetaMessage::Tempo(u24::new(composition.tempo_micros()))),
        meta_event(MetaMessage::TimeSignature(
            ts.numerator(),
            ts.denominator_power(),
            CLOCKS_PER_CLICK,
            THIRTY_SECONDS_PER_QUARTER,
        )),
        meta_event(MetaMessage::EndOfTrack),
    ]
}

fn note_track(track: &ScheduledTrack) -> SmfTrack<'_> {
    let setup = &track.setup;
    let channel = u4::new(setup.channel);
    let midi = |delta: u32, message: MidiMessage| TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Midi { channel, message },
    };

    let mut events = Vec::with_capacity(track.events.len() + 5);
    events.push(meta_event(MetaMessage::TrackName(setup.name.as_bytes())));
    events.push(midi(
        0,
        MidiMessage::ProgramChange {
            program: u7::new(setup.program),
        },
    ));
    events.push(midi(
        0,
        MidiMessage::Controller {
            controller: u7::new(CC_PAN),
            value: u7::new(setup.pan),
        },
    ));
    events.push(midi(
        0,
        MidiMessage::Controller {
            controller: u7::new(CC_VOLUME),
            value: u7::new(setup.volume),
        },
    ));
    for event in &track.events {
        let key = u7::new(event.pitch);
        let vel = u7::new(event.velocity);
        let message = match event.kind {
            EventKind::NoteOn => MidiMessage::NoteOn { key, vel },
            EventKind::NoteOff => MidiMessage::NoteOff { key, vel },
        };
        events.push(midi(event.delta, message));
    }
    events.push(meta_event(MetaMessage::EndOfTrack));
    events
}
