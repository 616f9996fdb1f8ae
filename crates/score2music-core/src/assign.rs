//! Instrument assignment: decides which parts each requested program plays.
//!
//! With M programs and N parts:
//! - M <= N: program at position i plays every part p with `p % M == i`
//!   (one-to-one when M == N). Each part is played by exactly one program.
//! - M > N: program at position i plays part `i % N`. Parts are duplicated
//!   verbatim, so several programs may double the same line.
//!
//! The result depends only on N and the request order, so renders are
//! reproducible.

use crate::error::{Error, Result};
use crate::program::{InstrumentRequest, Program};
use crate::score::{Part, Score};
use serde::Serialize;
use tracing::debug;

/// Parts played by one entry of the instrument request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstrumentAssignment {
    /// Index in the request; disambiguates duplicate programs.
    pub position: usize,
    pub program: Program,
    /// Sorted part indices.
    pub parts: Vec<usize>,
}

/// A single-part score ready for MIDI emission with one program.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentScore {
    pub position: usize,
    pub program: Program,
    /// Source part indices merged into this score's only part.
    pub source_parts: Vec<usize>,
    pub score: Score,
}

impl InstrumentScore {
    /// The only part of the score.
    pub fn part(&self) -> &Part {
        &self.score.parts()[0]
    }
}

/// Compute the part sets for every requested program, in request order.
pub fn assign_parts(
    part_count: usize,
    request: &InstrumentRequest,
) -> Result<Vec<InstrumentAssignment>> {
    if part_count == 0 {
        return Err(Error::EmptyScore);
    }

    let instrument_count = request.len();
    let assignments = request
        .programs()
        .iter()
        .enumerate()
        .map(|(position, &program)| {
            let parts = if instrument_count <= part_count {
                (position..part_count).step_by(instrument_count).collect()
            } else {
                vec![position % part_count]
            };
            InstrumentAssignment {
                position,
                program,
                parts,
            }
        })
        .collect();

    Ok(assignments)
}

/// Split `score` into one single-part score per requested program.
///
/// Programs assigned several parts get those parts merged into one line,
/// ordered by onset. Note content and timing are copied unchanged.
pub fn split_for_instruments(
    score: &Score,
    request: &InstrumentRequest,
) -> Result<Vec<InstrumentScore>> {
    let assignments = assign_parts(score.part_count(), request)?;

    Ok(assignments
        .into_iter()
        .map(|assignment| {
            let part = merge_parts(score, &assignment.parts);
            debug!(
                position = assignment.position,
                program = %assignment.program,
                parts = ?assignment.parts,
                part_name = part.name.as_deref().unwrap_or(""),
                "assigned"
            );

            let mut single = Score::new(vec![part], score.tempos().to_vec());
            single.title = score.title.clone();

            InstrumentScore {
                position: assignment.position,
                program: assignment.program,
                source_parts: assignment.parts,
                score: single,
            }
        })
        .collect())
}

fn merge_parts(score: &Score, indices: &[usize]) -> Part {
    if let [only] = indices {
        return score.parts()[*only].clone();
    }

    let sources: Vec<&Part> = indices.iter().map(|&i| &score.parts()[i]).collect();

    let names: Vec<&str> = sources.iter().filter_map(|p| p.name.as_deref()).collect();
    let name = (!names.is_empty()).then(|| names.join(" + "));

    let mut events: Vec<_> = sources
        .iter()
        .flat_map(|p| p.events.iter().cloned())
        .collect();
    // Stable, so simultaneous onsets keep part order.
    events.sort_by(|a, b| a.offset.total_cmp(&b.offset));

    Part {
        name,
        instrument_hint: sources.iter().find_map(|p| p.instrument_hint),
        events,
    }
}
