//! Standard MIDI File reading.
//!
//! Reads SMF bytes (ours or anyone's) into absolute-time events, used to
//! inspect emitted tracks before synthesis.

use crate::error::{Error, Result};
use midly::{MetaMessage, MidiMessage, Smf, Timing, Track, TrackEventKind};
use std::path::Path;
use tracing::debug;

/// A parsed MIDI file.
#[derive(Debug, Clone)]
pub struct ParsedMidiFile {
    /// Channel events of all tracks, sorted by time.
    pub events: Vec<TimedMidiEvent>,

    pub ticks_per_beat: u16,

    pub track_count: usize,

    /// Track name meta events, in track order.
    pub track_names: Vec<String>,

    /// `(beats, bpm)` for every tempo event, sorted by time.
    pub tempos: Vec<(f64, f64)>,

    /// Time of the last channel event, in beats.
    pub duration_beats: f64,
}

/// A channel event with absolute timestamp.
#[derive(Debug, Clone, Copy)]
pub struct TimedMidiEvent {
    pub tick: u64,

    /// Beats since the start of the file.
    pub time_beats: f64,

    /// MIDI channel (0-15)
    pub channel: u8,

    pub event: MidiEventType,
}

/// Channel messages we care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEventType {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8, velocity: u8 },
    ProgramChange { program: u8 },
    ControlChange { controller: u8, value: u8 },
}

impl ParsedMidiFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::parse(&data)
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let smf = Smf::parse(data)?;

        let ticks_per_beat = match smf.header.timing {
            Timing::Metrical(tpb) => tpb.as_int(),
            Timing::Timecode(_, _) => {
                return Err(Error::UnsupportedTiming);
            }
        };
        if ticks_per_beat == 0 {
            return Err(Error::Parse("zero ticks per beat".into()));
        }

        let mut events = Vec::new();
        let mut track_names = Vec::new();
        let mut tempos = Vec::new();

        for track in smf.tracks.iter() {
            Self::parse_track(
                track,
                ticks_per_beat,
                &mut events,
                &mut track_names,
                &mut tempos,
            );
        }

        // Stable: same-tick events keep file order.
        events.sort_by_key(|e| e.tick);
        tempos.sort_by(|a: &(f64, f64), b| a.0.total_cmp(&b.0));

        let duration_beats = events.last().map_or(0.0, |e| e.time_beats);

        debug!(
            tracks = smf.tracks.len(),
            events = events.len(),
            duration_beats,
            "parsed MIDI file"
        );

        Ok(Self {
            events,
            ticks_per_beat,
            track_count: smf.tracks.len(),
            track_names,
            tempos,
            duration_beats,
        })
    }

    fn parse_track(
        track: &Track,
        ticks_per_beat: u16,
        events: &mut Vec<TimedMidiEvent>,
        names: &mut Vec<String>,
        tempos: &mut Vec<(f64, f64)>,
    ) {
        let mut tick = 0u64;
        for event in track.iter() {
            tick += event.delta.as_int() as u64;
            let time_beats = tick as f64 / ticks_per_beat as f64;

            match &event.kind {
                TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
                    names.push(String::from_utf8_lossy(name).into_owned());
                }
                TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                    let micros = tempo.as_int().max(1);
                    tempos.push((time_beats, 60_000_000.0 / micros as f64));
                }
                kind => {
                    if let Some(e) = Self::convert_event(kind, tick, time_beats) {
                        events.push(e);
                    }
                }
            }
        }
    }

    fn convert_event(kind: &TrackEventKind, tick: u64, time_beats: f64) -> Option<TimedMidiEvent> {
        let TrackEventKind::Midi { channel, message } = kind else {
            return None;
        };
        let event = match message {
            // velocity 0 note-on is a note-off
            MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => MidiEventType::NoteOff {
                note: key.as_int(),
                velocity: 0,
            },
            MidiMessage::NoteOn { key, vel } => MidiEventType::NoteOn {
                note: key.as_int(),
                velocity: vel.as_int(),
            },
            MidiMessage::NoteOff { key, vel } => MidiEventType::NoteOff {
                note: key.as_int(),
                velocity: vel.as_int(),
            },
            MidiMessage::ProgramChange { program } => MidiEventType::ProgramChange {
                program: program.as_int(),
            },
            MidiMessage::Controller { controller, value } => MidiEventType::ControlChange {
                controller: controller.as_int(),
                value: value.as_int(),
            },
            _ => return None,
        };
        Some(TimedMidiEvent {
            tick,
            time_beats,
            channel: channel.as_int(),
            event,
        })
    }

    /// Programs selected by program-change events, in order.
    pub fn programs(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|e| match e.event {
                MidiEventType::ProgramChange { program } => Some(program),
                _ => None,
            })
            .collect()
    }

    /// Number of note-on events.
    pub fn note_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.event, MidiEventType::NoteOn { .. }))
            .count()
    }
}
