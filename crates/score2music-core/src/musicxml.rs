//! MusicXML (partwise) reader producing a canonical [`Score`].
//!
//! Handles the subset needed for playback: parts and their names/programs,
//! divisions, pitched notes, rests, chords, ties, grace notes (skipped),
//! backup/forward, and `<sound>` tempo and dynamics.

use crate::error::{Error, Result};
use crate::program::Program;
use crate::score::{Event, Part, Score, TempoChange, DEFAULT_VELOCITY};
use roxmltree::{Document, Node, ParsingOptions};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

/// MusicXML dynamics are a percentage of this forte velocity.
const FORTE_VELOCITY: f64 = 90.0;

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Read and parse an uncompressed MusicXML file.
pub fn load_musicxml(path: &Path) -> Result<Score> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8(bytes)
        .map_err(|_| Error::parse(path, "document is not valid UTF-8"))?;
    parse_musicxml(&text, path)
}

/// Read the root document of a compressed (`.mxl`) MusicXML archive and parse it.
pub fn load_compressed_musicxml(path: &Path) -> Result<Score> {
    let text = read_compressed(path)?;
    parse_musicxml(&text, path)
}

fn read_compressed(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| Error::parse(path, format!("not a valid .mxl archive: {}", e)))?;

    let root = match read_entry(&mut archive, CONTAINER_PATH, path) {
        Ok(container) => container_rootfile(&container),
        Err(_) => None,
    };
    let root = root
        .or_else(|| {
            archive
                .file_names()
                .filter(|name| !name.starts_with("META-INF/"))
                .find(|name| name.ends_with(".xml") || name.ends_with(".musicxml"))
                .map(str::to_string)
        })
        .ok_or_else(|| Error::parse(path, "archive contains no MusicXML document"))?;

    debug!(archive = %path.display(), root = %root, "reading compressed MusicXML");
    read_entry(&mut archive, &root, path)
}

fn read_entry<R: Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
    path: &Path,
) -> Result<String> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| Error::parse(path, format!("{}: {}", name, e)))?;
    let mut text = String::new();
    entry
        .read_to_string(&mut text)
        .map_err(|e| Error::parse(path, format!("{}: {}", name, e)))?;
    Ok(text)
}

fn container_rootfile(container: &str) -> Option<String> {
    let doc = Document::parse(container).ok()?;
    doc.descendants()
        .find(|n| n.has_tag_name("rootfile"))
        .and_then(|n| n.attribute("full-path"))
        .map(str::to_string)
}

/// Parse MusicXML text. `path` is only used for error context.
pub fn parse_musicxml(text: &str, path: &Path) -> Result<Score> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(text, options)
        .map_err(|e| Error::parse(path, e.to_string()))?;

    let root = doc.root_element();
    match root.tag_name().name() {
        "score-partwise" => {}
        "score-timewise" => {
            return Err(Error::parse(
                path,
                "timewise MusicXML is not supported, convert to partwise first",
            ))
        }
        other => {
            return Err(Error::parse(
                path,
                format!("unexpected root element <{}>", other),
            ))
        }
    }

    let part_info = read_part_list(root);
    let mut tempos = Vec::new();
    let mut parts = Vec::new();

    for part_node in root.children().filter(|n| n.has_tag_name("part")) {
        let id = part_node.attribute("id").unwrap_or_default();
        let info = part_info.get(id).cloned().unwrap_or_default();

        let mut reader = PartReader::new();
        for measure in part_node.children().filter(|n| n.has_tag_name("measure")) {
            reader.read_measure(measure, &mut tempos, path)?;
        }

        let mut part = Part::new(info.name).with_events(reader.finish());
        part.instrument_hint = info.program;
        debug!(
            part = id,
            events = part.events.len(),
            beats = part.duration(),
            "parsed part"
        );
        parts.push(part);
    }

    if parts.is_empty() {
        return Err(Error::parse(path, "score has no parts"));
    }

    let mut score = Score::new(parts, tempos);
    if score.duration() <= 0.0 {
        return Err(Error::parse(path, "score has zero duration"));
    }

    let title = child(root, "work")
        .and_then(|w| child_text(w, "work-title"))
        .or_else(|| child_text(root, "movement-title"));
    if let Some(title) = title {
        score = score.with_title(title.trim());
    }

    Ok(score)
}

#[derive(Debug, Clone, Default)]
struct PartInfo {
    name: Option<String>,
    program: Option<Program>,
}

fn read_part_list(root: Node) -> HashMap<String, PartInfo> {
    let Some(list) = child(root, "part-list") else {
        return HashMap::new();
    };

    list.children()
        .filter(|n| n.has_tag_name("score-part"))
        .filter_map(|score_part| {
            let id = score_part.attribute("id")?.to_string();
            let name = child_text(score_part, "part-name")
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            // midi-program is 1-based in MusicXML
            let program = score_part
                .descendants()
                .find(|n| n.has_tag_name("midi-program"))
                .and_then(|n| n.text())
                .and_then(|t| t.trim().parse::<u32>().ok())
                .and_then(|p| p.checked_sub(1))
                .and_then(|p| Program::new(p).ok());
            Some((id, PartInfo { name, program }))
        })
        .collect()
}

/// One sounding key before chords are regrouped.
#[derive(Debug, Clone)]
struct RawNote {
    offset: f64,
    duration: f64,
    pitch: u8,
    velocity: u8,
    /// Notes sharing a group were written as one chord.
    group: usize,
}

struct PartReader {
    divisions: f64,
    cursor: f64,
    last_onset: f64,
    velocity: u8,
    notes: Vec<RawNote>,
    rests: Vec<Event>,
    /// Pitch -> index into `notes` of a note waiting for its tie stop.
    open_ties: HashMap<u8, usize>,
    next_group: usize,
}

impl PartReader {
    fn new() -> Self {
        Self {
            divisions: 1.0,
            cursor: 0.0,
            last_onset: 0.0,
            velocity: DEFAULT_VELOCITY,
            notes: Vec::new(),
            rests: Vec::new(),
            open_ties: HashMap::new(),
            next_group: 0,
        }
    }

    fn beats(&self, node: Node) -> f64 {
        child_text(node, "duration")
            .and_then(|t| t.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map_or(0.0, |d| d / self.divisions)
    }

    fn read_measure(
        &mut self,
        measure: Node,
        tempos: &mut Vec<TempoChange>,
        path: &Path,
    ) -> Result<()> {
        let mut measure_end = self.cursor;

        for node in measure.children().filter(|n| n.is_element()) {
            match node.tag_name().name() {
                "attributes" => {
                    if let Some(divisions) = child_text(node, "divisions") {
                        let divisions: f64 = divisions.trim().parse().map_err(|_| {
                            Error::parse(path, format!("invalid divisions '{}'", divisions))
                        })?;
                        if !(divisions.is_finite() && divisions > 0.0) {
                            return Err(Error::parse(
                                path,
                                format!("divisions must be positive, got {}", divisions),
                            ));
                        }
                        self.divisions = divisions;
                    }
                }
                "direction" => {
                    for sound in node.descendants().filter(|n| n.has_tag_name("sound")) {
                        self.read_sound(sound, tempos);
                    }
                }
                "sound" => self.read_sound(node, tempos),
                "note" => self.read_note(node, path)?,
                "backup" => {
                    self.cursor = (self.cursor - self.beats(node)).max(0.0);
                }
                "forward" => {
                    self.cursor += self.beats(node);
                }
                _ => {}
            }
            measure_end = measure_end.max(self.cursor);
        }

        self.cursor = measure_end;
        Ok(())
    }

    fn read_sound(&mut self, sound: Node, tempos: &mut Vec<TempoChange>) {
        if let Some(bpm) = sound
            .attribute("tempo")
            .and_then(|t| t.trim().parse::<f64>().ok())
        {
            tempos.push(TempoChange::new(self.cursor, bpm));
        }
        if let Some(velocity) = sound.attribute("dynamics").and_then(dynamics_to_velocity) {
            self.velocity = velocity;
        }
    }

    fn read_note(&mut self, note: Node, path: &Path) -> Result<()> {
        if child(note, "grace").is_some() {
            return Ok(());
        }

        let is_chord = child(note, "chord").is_some();
        let duration = self.beats(note);
        let onset = if is_chord { self.last_onset } else { self.cursor };

        if !is_chord {
            self.last_onset = onset;
            self.cursor += duration;
        }

        let pitch = match child(note, "pitch") {
            Some(pitch) => pitch,
            None => {
                // Rests, and unpitched or cue notes, which we don't voice.
                if !is_chord && duration > 0.0 {
                    self.rests.push(Event::rest(onset, duration));
                }
                return Ok(());
            }
        };
        if child(note, "cue").is_some() {
            return Ok(());
        }

        let Some(key) = midi_key(pitch) else {
            warn!(file = %path.display(), offset = onset, "skipping note outside MIDI range");
            return Ok(());
        };

        let velocity = note
            .attribute("dynamics")
            .and_then(dynamics_to_velocity)
            .unwrap_or(self.velocity);

        let (tie_start, tie_stop) = note
            .children()
            .filter(|n| n.has_tag_name("tie"))
            .fold((false, false), |(start, stop), tie| match tie.attribute("type") {
                Some("start") => (true, stop),
                Some("stop") => (start, true),
                _ => (start, stop),
            });

        if tie_stop {
            if let Some(&index) = self.open_ties.get(&key) {
                let held = &mut self.notes[index];
                held.duration = (onset + duration - held.offset).max(held.duration);
                if !tie_start {
                    self.open_ties.remove(&key);
                }
                return Ok(());
            }
        }

        if !is_chord {
            self.next_group += 1;
        }
        self.notes.push(RawNote {
            offset: onset,
            duration,
            pitch: key,
            velocity,
            group: self.next_group,
        });
        if tie_start {
            self.open_ties.insert(key, self.notes.len() - 1);
        }

        Ok(())
    }

    /// Regroup notes into chords and merge with rests, ordered by onset.
    fn finish(self) -> Vec<Event> {
        let mut events = self.rests;
        let mut notes = self.notes.into_iter().peekable();

        while let Some(first) = notes.next() {
            let group = first.group;
            let mut members = vec![first];
            while let Some(next) = notes.next_if(|n| n.group == group) {
                members.push(next);
            }
            events.extend(group_to_events(members));
        }

        events.sort_by(|a, b| a.offset.total_cmp(&b.offset));
        events
    }
}

/// A chord stays one event when all members share a duration; ties can make
/// them diverge, in which case each key becomes its own note.
fn group_to_events(members: Vec<RawNote>) -> Vec<Event> {
    let head = &members[0];
    if members.len() == 1 {
        return vec![Event::note(head.offset, head.duration, head.pitch, head.velocity)];
    }

    let uniform = members
        .iter()
        .all(|n| n.duration == head.duration && n.offset == head.offset);
    if uniform {
        let mut pitches: Vec<u8> = members.iter().map(|n| n.pitch).collect();
        pitches.dedup();
        vec![Event::chord(head.offset, head.duration, pitches, head.velocity)]
    } else {
        members
            .iter()
            .map(|n| Event::note(n.offset, n.duration, n.pitch, n.velocity))
            .collect()
    }
}

fn midi_key(pitch: Node) -> Option<u8> {
    let step = match child_text(pitch, "step")?.trim() {
        "C" => 0,
        "D" => 2,
        "E" => 4,
        "F" => 5,
        "G" => 7,
        "A" => 9,
        "B" => 11,
        _ => return None,
    };
    let octave: i32 = child_text(pitch, "octave")?.trim().parse().ok()?;
    let alter = child_text(pitch, "alter")
        .and_then(|a| a.trim().parse::<f64>().ok())
        .map_or(0, |a| a.round() as i32);
    let key = (octave + 1) * 12 + step + alter;
    u8::try_from(key).ok().filter(|k| *k <= 127)
}

fn dynamics_to_velocity(percent: &str) -> Option<u8> {
    let percent: f64 = percent.trim().parse().ok()?;
    if !percent.is_finite() {
        return None;
    }
    Some((percent * FORTE_VELOCITY / 100.0).round().clamp(1.0, 127.0) as u8)
}

fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn child_text<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<&'a str> {
    child(node, name).and_then(|n| n.text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::EventKind;
    use approx::assert_relative_eq;

    fn parse(text: &str) -> Result<Score> {
        parse_musicxml(text, Path::new("test.musicxml"))
    }

    fn wrap(part_list: &str, parts: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 4.0 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd">
<score-partwise version="4.0">
  <part-list>{}</part-list>
  {}
</score-partwise>"#,
            part_list, parts
        )
    }

    const ONE_PART_LIST: &str =
        r#"<score-part id="P1"><part-name>Melody</part-name></score-part>"#;

    #[test]
    fn test_simple_melody() {
        let xml = wrap(
            ONE_PART_LIST,
            r#"<part id="P1"><measure number="1">
                <attributes><divisions>2</divisions></attributes>
                <note><pitch><step>C</step><octave>4</octave></pitch><duration>2</duration></note>
                <note><pitch><step>F</step><alter>1</alter><octave>4</octave></pitch><duration>1</duration></note>
                <note><rest/><duration>1</duration></note>
                <note><pitch><step>A</step><octave>4</octave></pitch><duration>4</duration></note>
            </measure></part>"#,
        );
        let score = parse(&xml).unwrap();
        assert_eq!(score.part_count(), 1);
        let part = &score.parts()[0];
        assert_eq!(part.name.as_deref(), Some("Melody"));

        let sounding: Vec<(f64, f64, u8)> = part
            .events
            .iter()
            .filter(|e| !e.is_rest())
            .map(|e| (e.offset, e.duration, e.pitches()[0]))
            .collect();
        assert_eq!(sounding, vec![(0.0, 1.0, 60), (1.0, 0.5, 66), (2.0, 2.0, 69)]);
        assert_relative_eq!(score.duration(), 4.0);
        assert!(part.events.iter().any(|e| e.is_rest() && e.offset == 1.5));
    }

    #[test]
    fn test_chord_and_backup_voices() {
        let xml = wrap(
            ONE_PART_LIST,
            r#"<part id="P1"><measure number="1">
                <attributes><divisions>1</divisions></attributes>
                <note><pitch><step>C</step><octave>4</octave></pitch><duration>2</duration></note>
                <note><chord/><pitch><step>E</step><octave>4</octave></pitch><duration>2</duration></note>
                <note><chord/><pitch><step>G</step><octave>4</octave></pitch><duration>2</duration></note>
                <backup><duration>2</duration></backup>
                <note><pitch><step>C</step><octave>3</octave></pitch><duration>1</duration></note>
            </measure>
            <measure number="2">
                <note><pitch><step>D</step><octave>4</octave></pitch><duration>1</duration></note>
            </measure></part>"#,
        );
        let score = parse(&xml).unwrap();
        let events = &score.parts()[0].events;
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0].kind,
            EventKind::Chord {
                pitches: vec![60, 64, 67]
            }
        );
        assert_eq!(events[1].pitches(), &[48]);
        assert_relative_eq!(events[1].offset, 0.0);
        // Measure 2 starts after the longest voice of measure 1.
        assert_relative_eq!(events[2].offset, 2.0);
    }

    #[test]
    fn test_ties_merge_into_one_note() {
        let xml = wrap(
            ONE_PART_LIST,
            r#"<part id="P1">
            <measure number="1">
                <attributes><divisions>1</divisions></attributes>
                <note><pitch><step>G</step><octave>4</octave></pitch><duration>4</duration><tie type="start"/></note>
            </measure>
            <measure number="2">
                <note><pitch><step>G</step><octave>4</octave></pitch><duration>2</duration><tie type="stop"/></note>
                <note><pitch><step>A</step><octave>4</octave></pitch><duration>2</duration></note>
            </measure></part>"#,
        );
        let score = parse(&xml).unwrap();
        let events = &score.parts()[0].events;
        assert_eq!(events.len(), 2);
        assert_relative_eq!(events[0].duration, 6.0);
        assert_relative_eq!(events[1].offset, 6.0);
    }

    #[test]
    fn test_grace_notes_skipped() {
        let xml = wrap(
            ONE_PART_LIST,
            r#"<part id="P1"><measure number="1">
                <note><grace/><pitch><step>B</step><octave>3</octave></pitch></note>
                <note><pitch><step>C</step><octave>4</octave></pitch><duration>1</duration></note>
            </measure></part>"#,
        );
        let score = parse(&xml).unwrap();
        assert_eq!(score.parts()[0].events.len(), 1);
        assert_eq!(score.parts()[0].events[0].pitches(), &[60]);
    }

    #[test]
    fn test_tempo_and_dynamics() {
        let xml = wrap(
            ONE_PART_LIST,
            r#"<part id="P1"><measure number="1">
                <attributes><divisions>1</divisions></attributes>
                <direction><sound tempo="90" dynamics="50"/></direction>
                <note><pitch><step>C</step><octave>4</octave></pitch><duration>1</duration></note>
                <sound tempo="60"/>
                <note dynamics="100"><pitch><step>D</step><octave>4</octave></pitch><duration>1</duration></note>
            </measure></part>"#,
        );
        let score = parse(&xml).unwrap();
        assert_eq!(
            score.tempos(),
            &[TempoChange::new(0.0, 90.0), TempoChange::new(1.0, 60.0)][..]
        );
        let events = &score.parts()[0].events;
        assert_eq!(events[0].velocity, 45);
        assert_eq!(events[1].velocity, 90);
    }

    #[test]
    fn test_part_list_names_and_programs() {
        let xml = wrap(
            r#"<score-part id="P1"><part-name>Violin</part-name>
                 <midi-instrument id="P1-I1"><midi-channel>1</midi-channel><midi-program>41</midi-program></midi-instrument>
               </score-part>
               <score-part id="P2"><part-name>Cello</part-name></score-part>"#,
            r#"<part id="P1"><measure number="1"><note><pitch><step>E</step><octave>5</octave></pitch><duration>1</duration></note></measure></part>
               <part id="P2"><measure number="1"><note><pitch><step>C</step><octave>3</octave></pitch><duration>1</duration></note></measure></part>"#,
        );
        let score = parse(&xml).unwrap();
        assert_eq!(score.part_count(), 2);
        assert_eq!(score.parts()[0].name.as_deref(), Some("Violin"));
        assert_eq!(score.parts()[0].instrument_hint, Some(Program::new(40).unwrap()));
        assert_eq!(score.parts()[1].instrument_hint, None);
    }

    #[test]
    fn test_no_parts_is_parse_error() {
        let xml = wrap("", "");
        assert!(matches!(parse(&xml), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_zero_duration_is_parse_error() {
        let xml = wrap(
            ONE_PART_LIST,
            r#"<part id="P1"><measure number="1"></measure></part>"#,
        );
        match parse(&xml) {
            Err(Error::Parse { reason, .. }) => assert!(reason.contains("zero duration")),
            other => panic!("expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_xml() {
        assert!(matches!(
            parse("<score-partwise><part>"),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_timewise_rejected() {
        let xml = r#"<?xml version="1.0"?><score-timewise version="4.0"></score-timewise>"#;
        match parse(xml) {
            Err(Error::Parse { reason, .. }) => assert!(reason.contains("timewise")),
            other => panic!("expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_dynamics_to_velocity() {
        assert_eq!(dynamics_to_velocity("100"), Some(90));
        assert_eq!(dynamics_to_velocity("0"), Some(1));
        assert_eq!(dynamics_to_velocity("500"), Some(127));
        assert_eq!(dynamics_to_velocity("loud"), None);
    }
}
