//! InstrumentScore to Standard MIDI File.
//!
//! Output is SMF format 0 at 480 ticks per quarter with a single track:
//! track name, program change and tempo map at the start, then one
//! note-on/note-off pair per sounding key. Events sharing a tick are ordered
//! note-off, tempo, note-on, then by key, so equal input gives equal bytes.
//!
//! A key is sounding while any note on it is active. Overlapping notes on
//! one key (unison parts merged onto one instrument) share a single
//! note-on/note-off pair, held until the last of them ends.

use crate::error::{Error, Result};
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use score2music_core::InstrumentScore;
use std::path::Path;
use tracing::debug;

/// Ticks per quarter note in emitted files.
pub const TICKS_PER_QUARTER: u16 = 480;

/// Channel of every emitted event. One file per instrument, so one channel.
pub const MIDI_CHANNEL: u8 = 0;

const MAX_DELTA: u64 = 0x0FFF_FFFF;
const MAX_TEMPO: u32 = 0x00FF_FFFF;

/// Same-tick ordering: lower sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Slot {
    NoteOff,
    Tempo,
    NoteOn,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    tick: u64,
    slot: Slot,
    key: u8,
    /// Velocity for notes, microseconds per quarter for tempo.
    value: u32,
}

/// Emit `instrument` as SMF bytes.
pub fn emit_midi(instrument: &InstrumentScore) -> Result<Vec<u8>> {
    let context = |reason: String| {
        Error::Emission(format!(
            "track {} (program {}): {}",
            instrument.position, instrument.program, reason
        ))
    };

    let mut pending = Vec::new();

    for tempo in instrument.score.tempos() {
        pending.push(Pending {
            tick: to_ticks(tempo.offset).map_err(|r| context(format!("tempo {}", r)))?,
            slot: Slot::Tempo,
            key: 0,
            value: tempo.micros_per_quarter().clamp(1, MAX_TEMPO),
        });
    }

    let part = instrument.part();
    for (index, event) in part.events.iter().enumerate() {
        let start = to_ticks(event.offset)
            .map_err(|r| context(format!("event {} offset {}", index, r)))?;
        let length = to_ticks(event.duration)
            .map_err(|r| context(format!("event {} duration {}", index, r)))?;

        if event.is_rest() {
            continue;
        }
        if length == 0 {
            // An on/off pair on one tick would sort off-before-on and hang.
            debug!(index, offset = event.offset, "skipping zero-length note");
            continue;
        }

        let velocity = event.velocity.clamp(1, 127) as u32;
        for &key in event.pitches() {
            if key > 127 {
                return Err(context(format!("event {} key {} out of range", index, key)));
            }
            pending.push(Pending {
                tick: start,
                slot: Slot::NoteOn,
                key,
                value: velocity,
            });
            let end = start.checked_add(length).ok_or_else(|| {
                context(format!("event {} ends past the last representable tick", index))
            })?;
            pending.push(Pending {
                tick: end,
                slot: Slot::NoteOff,
                key,
                value: 0,
            });
        }
    }

    pending.sort_by_key(|p| (p.tick, p.slot, p.key));
    hold_overlapping_keys(&mut pending);

    let channel = u4::new(MIDI_CHANNEL);
    let mut track = Vec::with_capacity(pending.len() + 3);

    if let Some(name) = part.name.as_deref() {
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
        });
    }
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange {
                program: u7::new(instrument.program.number()),
            },
        },
    });

    let mut last_tick = 0u64;
    for p in &pending {
        let delta = p.tick - last_tick;
        if delta > MAX_DELTA {
            return Err(context(format!(
                "delta of {} ticks exceeds the SMF limit",
                delta
            )));
        }
        last_tick = p.tick;

        let kind = match p.slot {
            Slot::Tempo => TrackEventKind::Meta(MetaMessage::Tempo(u24::new(p.value))),
            Slot::NoteOn => TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key: u7::new(p.key),
                    vel: u7::new(p.value as u8),
                },
            },
            Slot::NoteOff => TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key: u7::new(p.key),
                    vel: u7::new(0),
                },
            },
        };
        track.push(TrackEvent {
            delta: u28::new(delta as u32),
            kind,
        });
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));
    smf.tracks.push(track);

    let mut bytes = Vec::new();
    smf.write_std(&mut bytes)?;

    debug!(
        position = instrument.position,
        program = %instrument.program,
        events = pending.len(),
        bytes = bytes.len(),
        "emitted MIDI"
    );
    Ok(bytes)
}

/// Emit `instrument` and write it to `path`.
pub fn write_midi(instrument: &InstrumentScore, path: &Path) -> Result<()> {
    let bytes = emit_midi(instrument)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Drop the inner on/off of overlapping notes on one key. `pending` must be sorted.
fn hold_overlapping_keys(pending: &mut Vec<Pending>) {
    let mut sounding = [0u32; 128];
    pending.retain(|p| {
        let count = &mut sounding[p.key as usize];
        match p.slot {
            Slot::Tempo => true,
            Slot::NoteOn => {
                *count += 1;
                *count == 1
            }
            Slot::NoteOff => {
                *count = count.saturating_sub(1);
                *count == 0
            }
        }
    });
}

fn to_ticks(beats: f64) -> std::result::Result<u64, String> {
    if !beats.is_finite() {
        return Err(format!("{} is not finite", beats));
    }
    if beats < 0.0 {
        return Err(format!("{} is negative", beats));
    }
    let ticks = (beats * TICKS_PER_QUARTER as f64).round();
    whole_ticks(ticks).ok_or_else(|| format!("{} is too large", beats))
}

/// `ticks` as u64, if in range. `u64::MAX as f64` rounds up to 2^64, itself out of range.
fn whole_ticks(ticks: f64) -> Option<u64> {
    (ticks < u64::MAX as f64).then_some(ticks as u64)
}
