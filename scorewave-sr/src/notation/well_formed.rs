//! Structural checks applied before a fragment may be merged
//!
//! A document is well-formed when:
//! - it has at least one part, every part has measures, and all parts have
//!   the same number of measures
//! - divisions are declared (and positive) before any timed element
//! - every non-grace note has a duration
//! - a chord note follows another note in the same measure
//! - `backup` never moves before the start of the measure
//! - no measure holds more than its time signature allows
//! - octaves lie within 0..=9 and tempo marks are positive

use super::{MeasureElement, NotationDocument, Part};
use thiserror::Error;

const MAX_OCTAVE: i8 = 9;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WellFormednessError {
    #[error("document has no parts")]
    NoParts,

    #[error("part {part} has no measures")]
    EmptyPart { part: String },

    #[error("part {part} has {found} measures, expected {expected}")]
    MeasureCountMismatch {
        part: String,
        expected: usize,
        found: usize,
    },

    #[error("part {part}, measure {measure}: {problem}")]
    InMeasure {
        part: String,
        measure: String,
        problem: MeasureProblem,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeasureProblem {
    #[error("timed element before divisions are declared")]
    MissingDivisions,

    #[error("divisions must be positive")]
    ZeroDivisions,

    #[error("invalid time signature {beats}/{beat_type}")]
    InvalidTimeSignature { beats: u32, beat_type: u32 },

    #[error("note without duration")]
    NoteWithoutDuration,

    #[error("chord note without a preceding note")]
    OrphanChord,

    #[error("backup of {duration} divisions moves before the measure start")]
    BackupBeforeStart { duration: u32 },

    #[error("{length} divisions overfill {beats}/{beat_type} at {divisions} divisions per quarter")]
    Overfull {
        length: u64,
        beats: u32,
        beat_type: u32,
        divisions: u32,
    },

    #[error("octave {0} out of range")]
    OctaveOutOfRange(i8),

    #[error("tempo must be positive")]
    InvalidTempo,
}

/// Check a parsed document
pub fn check_well_formed(doc: &NotationDocument) -> Result<(), WellFormednessError> {
    let first = doc.parts.first().ok_or(WellFormednessError::NoParts)?;
    let expected = first.measures.len();

    for part in &doc.parts {
        if part.measures.is_empty() {
            return Err(WellFormednessError::EmptyPart {
                part: part.id.clone(),
            });
        }
        if part.measures.len() != expected {
            return Err(WellFormednessError::MeasureCountMismatch {
                part: part.id.clone(),
                expected,
                found: part.measures.len(),
            });
        }
        check_part(part)?;
    }

    Ok(())
}

fn check_part(part: &Part) -> Result<(), WellFormednessError> {
    let mut divisions: Option<u32> = None;
    let mut time: Option<(u32, u32)> = None;

    for measure in &part.measures {
        let fail = |problem| WellFormednessError::InMeasure {
            part: part.id.clone(),
            measure: measure.number.clone(),
            problem,
        };

        let mut cursor: u64 = 0;
        let mut length: u64 = 0;
        let mut last_onset: Option<u64> = None;

        for element in &measure.elements {
            match element {
                MeasureElement::Divisions { divisions: 0 } => {
                    return Err(fail(MeasureProblem::ZeroDivisions))
                }
                MeasureElement::Divisions { divisions: d } => divisions = Some(*d),
                MeasureElement::Time { beats, beat_type } => {
                    if *beats == 0 || *beat_type == 0 {
                        return Err(fail(MeasureProblem::InvalidTimeSignature {
                            beats: *beats,
                            beat_type: *beat_type,
                        }));
                    }
                    time = Some((*beats, *beat_type));
                }
                MeasureElement::Tempo { bpm } => {
                    if !bpm.is_finite() || *bpm <= 0.0 {
                        return Err(fail(MeasureProblem::InvalidTempo));
                    }
                }
                MeasureElement::Note(note) => {
                    if let Some(pitch) = note.pitch {
                        if !(0..=MAX_OCTAVE).contains(&pitch.octave) {
                            return Err(fail(MeasureProblem::OctaveOutOfRange(pitch.octave)));
                        }
                    }
                    if note.grace {
                        continue;
                    }
                    if note.duration == 0 {
                        return Err(fail(MeasureProblem::NoteWithoutDuration));
                    }
                    if divisions.is_none() {
                        return Err(fail(MeasureProblem::MissingDivisions));
                    }

                    let duration = note.duration as u64;
                    if note.chord {
                        let onset = last_onset.ok_or_else(|| fail(MeasureProblem::OrphanChord))?;
                        length = length.max(onset + duration);
                    } else {
                        last_onset = Some(cursor);
                        cursor += duration;
                        length = length.max(cursor);
                    }
                }
                MeasureElement::Backup { duration } => {
                    if divisions.is_none() {
                        return Err(fail(MeasureProblem::MissingDivisions));
                    }
                    let back = *duration as u64;
                    if back > cursor {
                        return Err(fail(MeasureProblem::BackupBeforeStart {
                            duration: *duration,
                        }));
                    }
                    cursor -= back;
                    last_onset = None;
                }
                MeasureElement::Forward { duration } => {
                    if divisions.is_none() {
                        return Err(fail(MeasureProblem::MissingDivisions));
                    }
                    cursor += *duration as u64;
                    length = length.max(cursor);
                }
            }
        }

        // length / divisions quarters must fit beats * 4 / beat_type quarters
        if let (Some((beats, beat_type)), Some(d)) = (time, divisions) {
            if length * beat_type as u64 > beats as u64 * d as u64 * 4 {
                return Err(fail(MeasureProblem::Overfull {
                    length,
                    beats,
                    beat_type,
                    divisions: d,
                }));
            }
        }
    }

    Ok(())
}
