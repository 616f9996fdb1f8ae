//! Canonical, format-independent score representation.
//!
//! All timing is in quarter-note beats from the start of the score. A score is
//! produced once by the normalizer and then only read.

use crate::program::Program;
use std::slice;

/// Tempo used when the source does not state one.
pub const DEFAULT_TEMPO_BPM: f64 = 120.0;

/// Velocity used when the source has no dynamics.
pub const DEFAULT_VELOCITY: u8 = 64;

/// What sounds (or doesn't) during an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Note { pitch: u8 },
    Chord { pitches: Vec<u8> },
    Rest,
}

/// A time-stamped note, chord or rest.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Start in beats.
    pub offset: f64,
    /// Length in beats.
    pub duration: f64,
    /// MIDI velocity (1-127).
    pub velocity: u8,
    pub kind: EventKind,
}

impl Event {
    pub fn note(offset: f64, duration: f64, pitch: u8, velocity: u8) -> Self {
        Self {
            offset,
            duration,
            velocity,
            kind: EventKind::Note { pitch },
        }
    }

    pub fn chord(offset: f64, duration: f64, pitches: Vec<u8>, velocity: u8) -> Self {
        Self {
            offset,
            duration,
            velocity,
            kind: EventKind::Chord { pitches },
        }
    }

    pub fn rest(offset: f64, duration: f64) -> Self {
        Self {
            offset,
            duration,
            velocity: 0,
            kind: EventKind::Rest,
        }
    }

    pub fn end(&self) -> f64 {
        self.offset + self.duration
    }

    /// Sounding MIDI keys (empty for rests).
    pub fn pitches(&self) -> &[u8] {
        match &self.kind {
            EventKind::Note { pitch } => slice::from_ref(pitch),
            EventKind::Chord { pitches } => pitches,
            EventKind::Rest => &[],
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self.kind, EventKind::Rest)
    }
}

/// One melodic or harmonic line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Part {
    pub name: Option<String>,
    /// Program named by the source file. Informational only.
    pub instrument_hint: Option<Program>,
    pub events: Vec<Event>,
}

impl Part {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            instrument_hint: None,
            events: Vec::new(),
        }
    }

    pub fn with_hint(mut self, hint: Program) -> Self {
        self.instrument_hint = Some(hint);
        self
    }

    pub fn with_events(mut self, events: Vec<Event>) -> Self {
        self.events = events;
        self
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    /// End time of the last event, in beats.
    pub fn duration(&self) -> f64 {
        self.events.iter().map(Event::end).fold(0.0, f64::max)
    }

    /// Number of sounding keys across all events.
    pub fn note_count(&self) -> usize {
        self.events.iter().map(|e| e.pitches().len()).sum()
    }
}

/// Tempo change at a beat offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoChange {
    pub offset: f64,
    pub bpm: f64,
}

impl TempoChange {
    pub fn new(offset: f64, bpm: f64) -> Self {
        Self { offset, bpm }
    }

    /// Microseconds per quarter note, as stored in MIDI tempo events.
    pub fn micros_per_quarter(&self) -> u32 {
        (60_000_000.0 / self.bpm).round() as u32
    }
}

/// An ordered set of parts plus a tempo map.
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub title: Option<String>,
    parts: Vec<Part>,
    tempos: Vec<TempoChange>,
}

impl Score {
    /// Tempo map is sorted and always gets an entry at beat 0.
    pub fn new(parts: Vec<Part>, mut tempos: Vec<TempoChange>) -> Self {
        tempos.retain(|t| t.bpm.is_finite() && t.bpm > 0.0 && t.offset >= 0.0);
        tempos.sort_by(|a, b| a.offset.total_cmp(&b.offset));
        tempos.dedup_by(|later, earlier| later.offset == earlier.offset);
        if tempos.first().map_or(true, |t| t.offset > 0.0) {
            tempos.insert(0, TempoChange::new(0.0, DEFAULT_TEMPO_BPM));
        }
        Self {
            title: None,
            parts,
            tempos,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn parts_mut(&mut self) -> &mut [Part] {
        &mut self.parts
    }

    pub fn part(&self, index: usize) -> Option<&Part> {
        self.parts.get(index)
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    pub fn tempos(&self) -> &[TempoChange] {
        &self.tempos
    }

    /// Maximum end time across all parts, in beats.
    pub fn duration(&self) -> f64 {
        self.parts.iter().map(Part::duration).fold(0.0, f64::max)
    }

    /// Wall-clock length in seconds, following the tempo map.
    pub fn duration_seconds(&self) -> f64 {
        let end = self.duration();
        let mut seconds = 0.0;
        for (i, tempo) in self.tempos.iter().enumerate() {
            if tempo.offset >= end {
                break;
            }
            let segment_end = self
                .tempos
                .get(i + 1)
                .map_or(end, |next| next.offset.min(end));
            seconds += (segment_end - tempo.offset) * 60.0 / tempo.bpm;
        }
        seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_duration_is_max_end_across_parts() {
        let a = Part::new(None).with_events(vec![
            Event::note(0.0, 1.0, 60, 64),
            Event::note(1.0, 1.0, 62, 64),
        ]);
        let b = Part::new(None).with_events(vec![Event::chord(0.0, 3.5, vec![48, 52], 64)]);
        let score = Score::new(vec![a, b], Vec::new());
        assert_relative_eq!(score.duration(), 3.5);
    }

    #[test]
    fn test_tempo_map_gets_default_at_zero() {
        let score = Score::new(Vec::new(), vec![TempoChange::new(4.0, 60.0)]);
        assert_eq!(score.tempos().len(), 2);
        assert_eq!(score.tempos()[0], TempoChange::new(0.0, DEFAULT_TEMPO_BPM));
    }

    #[test]
    fn test_tempo_map_drops_invalid_and_duplicates() {
        let score = Score::new(
            Vec::new(),
            vec![
                TempoChange::new(0.0, 90.0),
                TempoChange::new(0.0, 100.0),
                TempoChange::new(2.0, f64::NAN),
                TempoChange::new(2.0, -5.0),
            ],
        );
        assert_eq!(score.tempos(), &[TempoChange::new(0.0, 90.0)][..]);
    }

    #[test]
    fn test_duration_seconds_follows_tempo_map() {
        let part = Part::new(None).with_events(vec![Event::note(0.0, 8.0, 60, 64)]);
        // 4 beats at 120 BPM (2s) + 4 beats at 60 BPM (4s)
        let score = Score::new(
            vec![part],
            vec![TempoChange::new(0.0, 120.0), TempoChange::new(4.0, 60.0)],
        );
        assert_relative_eq!(score.duration_seconds(), 6.0);
    }

    #[test]
    fn test_event_pitches() {
        assert_eq!(Event::note(0.0, 1.0, 60, 64).pitches(), &[60]);
        assert_eq!(
            Event::chord(0.0, 1.0, vec![60, 64, 67], 64).pitches(),
            &[60, 64, 67]
        );
        assert!(Event::rest(0.0, 1.0).pitches().is_empty());
    }

    #[test]
    fn test_micros_per_quarter() {
        assert_eq!(TempoChange::new(0.0, 120.0).micros_per_quarter(), 500_000);
        assert_eq!(TempoChange::new(0.0, 60.0).micros_per_quarter(), 1_000_000);
    }
}
