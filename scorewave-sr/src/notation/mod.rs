//! Symbolic notation documents
//!
//! A recognized page is read from MusicXML (`score-partwise`, plain or in an
//! `.mxl` container) into a [`NotationDocument`]. Only the elements needed to
//! check structure and to derive a performance are kept: divisions, time
//! signatures, tempo marks, notes, rests, `backup` and `forward`.

pub mod musicxml;
pub mod well_formed;

pub use musicxml::{parse_musicxml, read_fragment};
pub use well_formed::{check_well_formed, MeasureProblem, WellFormednessError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Notation reading errors
#[derive(Debug, Error)]
pub enum NotationError {
    /// Fragment file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `.mxl` container could not be opened
    #[error("Invalid MusicXML container: {0}")]
    Container(String),

    /// Text is not well-formed XML
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// Root element is not `score-partwise`
    #[error("Unsupported notation document root <{0}>")]
    UnsupportedRoot(String),

    /// Required attribute absent
    #[error("<{element}> is missing attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    /// Element text could not be interpreted
    #[error("Invalid <{element}> value '{value}'")]
    InvalidValue { element: &'static str, value: String },

    /// Parsed, but structurally unsound
    #[error("Not well-formed: {0}")]
    Malformed(#[from] WellFormednessError),
}

/// One recognized notation document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotationDocument {
    /// Work or movement title, when present
    pub title: Option<String>,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub id: String,
    pub name: Option<String>,
    pub measures: Vec<Measure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    /// Measure number as written (may be non-numeric, e.g. "X1")
    pub number: String,
    pub elements: Vec<MeasureElement>,
}

/// Musical content of a measure, in document order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeasureElement {
    /// Divisions per quarter note from here on
    Divisions { divisions: u32 },
    /// Time signature from here on
    Time { beats: u32, beat_type: u32 },
    /// Tempo mark in quarter notes per minute
    Tempo { bpm: f64 },
    Note(Note),
    /// Move the cursor back (another voice follows)
    Backup { duration: u32 },
    /// Move the cursor forward without sounding
    Forward { duration: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// `None` for rests and unpitched notes
    pub pitch: Option<Pitch>,
    /// Length in divisions (0 for grace notes)
    pub duration: u32,
    /// Sounds together with the preceding note
    pub chord: bool,
    pub grace: bool,
    pub voice: Option<String>,
    pub tie_start: bool,
    pub tie_stop: bool,
}

impl Note {
    pub fn is_rest(&self) -> bool {
        self.pitch.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pitch {
    /// Diatonic step, one of `A`..=`G`
    pub step: char,
    /// Chromatic alteration in semitones
    pub alter: i8,
    pub octave: i8,
}

impl Pitch {
    /// MIDI key number (middle C, C4, is 60)
    pub fn midi_key(&self) -> i32 {
        let step = match self.step {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            _ => 11,
        };
        (self.octave as i32 + 1) * 12 + step + self.alter as i32
    }
}

impl NotationDocument {
    /// Total number of notes and rests across all parts
    pub fn note_count(&self) -> usize {
        self.parts
            .iter()
            .flat_map(|p| &p.measures)
            .flat_map(|m| &m.elements)
            .filter(|e| matches!(e, MeasureElement::Note(_)))
            .count()
    }

    pub fn measure_count(&self) -> usize {
        self.parts.iter().map(|p| p.measures.len()).max().unwrap_or(0)
    }
}
