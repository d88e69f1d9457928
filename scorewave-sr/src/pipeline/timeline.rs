//! Performance timeline derivation
//!
//! Expands an assembled score into timed note and tempo events:
//! - fragments play back to back, each starting where the previous ended
//! - part N plays on MIDI channel N, skipping the percussion channel (10)
//! - every measure index has one length across parts (the longest wins)
//! - chords share an onset, rests advance, grace notes are not played
//! - tied notes sound once for their combined length
//!
//! The result is encoded as a single-track Standard MIDI File for the
//! synthesizer.

use super::assembler::AssembledScore;
use crate::notation::{MeasureElement, NotationDocument, Part};
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

pub const TICKS_PER_QUARTER: u16 = 480;
pub const DEFAULT_BPM: f64 = 120.0;
pub const DEFAULT_VELOCITY: u8 = 90;

/// General MIDI percussion channel (10, zero-based 9)
const PERCUSSION_CHANNEL: u8 = 9;
const MELODIC_CHANNELS: u8 = 15;
const MAX_KEY: i32 = 127;
const MAX_TEMPO_MICROS: u32 = 0x00FF_FFFF;
const MAX_DELTA: u64 = 0x0FFF_FFFF;
const MICROS_PER_MINUTE: f64 = 60_000_000.0;

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("fragment {fragment}: pitch maps to MIDI key {key}, outside 0..=127")]
    KeyOutOfRange { fragment: String, key: i32 },

    #[error("fragment {fragment}: tempo {bpm} BPM cannot be encoded")]
    TempoOutOfRange { fragment: String, bpm: f64 },

    #[error("event gap of {delta} ticks exceeds the MIDI delta range")]
    DeltaOverflow { delta: u64 },

    #[error("fragment {fragment}: divisions not declared before timed content")]
    MissingDivisions { fragment: String },

    #[error("failed to encode MIDI file: {0}")]
    Encode(#[from] std::io::Error),
}

/// One timeline event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimelineEvent {
    Tempo { micros_per_quarter: u32 },
    NoteOff { channel: u8, key: u8 },
    NoteOn { channel: u8, key: u8, velocity: u8 },
}

impl TimelineEvent {
    /// Order of simultaneous events: tempo, then releases, then onsets
    fn rank(&self) -> u8 {
        match self {
            TimelineEvent::Tempo { .. } => 0,
            TimelineEvent::NoteOff { .. } => 1,
            TimelineEvent::NoteOn { .. } => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimedEvent {
    pub tick: u64,
    pub event: TimelineEvent,
}

/// Time-ordered performance events of one assembled score
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerformanceTimeline {
    pub ticks_per_quarter: u16,
    pub events: Vec<TimedEvent>,
    /// Tick at which the last fragment ends
    pub end_tick: u64,
}

/// Sounding note before it is split into on/off events
#[derive(Debug, Clone, Copy)]
struct SoundingNote {
    channel: u8,
    key: u8,
    start: u64,
    end: u64,
}

/// Per-measure content of one part, relative to the measure start
#[derive(Debug, Default)]
struct MeasureContent {
    length: u64,
    notes: Vec<LocalNote>,
    tempos: Vec<(u64, f64)>,
}

#[derive(Debug, Clone, Copy)]
struct LocalNote {
    key: i32,
    onset: u64,
    duration: u64,
    tie_start: bool,
    tie_stop: bool,
}

/// MIDI channel for a part index
pub fn channel_for_part(part_index: usize) -> u8 {
    let slot = (part_index % MELODIC_CHANNELS as usize) as u8;
    if slot >= PERCUSSION_CHANNEL {
        slot + 1
    } else {
        slot
    }
}

fn to_ticks(duration: u32, divisions: u32) -> u64 {
    let divisions = divisions as u64;
    (duration as u64 * TICKS_PER_QUARTER as u64 + divisions / 2) / divisions
}

impl PerformanceTimeline {
    /// Expand an assembled score; deterministic for a given score
    pub fn from_score(score: &AssembledScore) -> Result<Self, TimelineError> {
        let mut notes: Vec<SoundingNote> = Vec::new();
        let mut tempos: Vec<(u64, u32)> = Vec::new();
        // Index into `notes` of a tie waiting for its continuation
        let mut open_ties: HashMap<(u8, u8), usize> = HashMap::new();
        let mut offset: u64 = 0;

        for fragment in &score.fragments {
            let name = &fragment.source;
            let contents = fragment_contents(&fragment.document, name)?;

            let measure_count = fragment.document.measure_count();
            let mut starts = Vec::with_capacity(measure_count);
            let mut cursor = offset;
            for index in 0..measure_count {
                starts.push(cursor);
                cursor += contents
                    .iter()
                    .filter_map(|part| part.get(index))
                    .map(|m| m.length)
                    .max()
                    .unwrap_or(0);
            }

            for (part_index, measures) in contents.iter().enumerate() {
                let channel = channel_for_part(part_index);

                for (measure, start) in measures.iter().zip(&starts) {
                    for &(at, bpm) in &measure.tempos {
                        tempos.push((start + at, tempo_micros(bpm, name)?));
                    }

                    for note in &measure.notes {
                        if !(0..=MAX_KEY).contains(&note.key) {
                            return Err(TimelineError::KeyOutOfRange {
                                fragment: name.clone(),
                                key: note.key,
                            });
                        }
                        let key = note.key as u8;
                        let begin = start + note.onset;
                        let end = begin + note.duration.max(1);

                        if note.tie_stop {
                            if let Some(&i) = open_ties.get(&(channel, key)) {
                                if notes[i].end == begin {
                                    notes[i].end = end;
                                    if !note.tie_start {
                                        open_ties.remove(&(channel, key));
                                    }
                                    continue;
                                }
                            }
                        }

                        notes.push(SoundingNote {
                            channel,
                            key,
                            start: begin,
                            end,
                        });
                        if note.tie_start {
                            open_ties.insert((channel, key), notes.len() - 1);
                        } else {
                            open_ties.remove(&(channel, key));
                        }
                    }
                }
            }

            offset = cursor;
        }

        tempos.sort_unstable();
        tempos.dedup();

        let mut events = Vec::with_capacity(notes.len() * 2 + tempos.len() + 1);
        if tempos.first().map(|&(tick, _)| tick) != Some(0) {
            events.push(TimedEvent {
                tick: 0,
                event: TimelineEvent::Tempo {
                    micros_per_quarter: (MICROS_PER_MINUTE / DEFAULT_BPM) as u32,
                },
            });
        }
        events.extend(tempos.into_iter().map(|(tick, micros)| TimedEvent {
            tick,
            event: TimelineEvent::Tempo {
                micros_per_quarter: micros,
            },
        }));
        for note in &notes {
            events.push(TimedEvent {
                tick: note.start,
                event: TimelineEvent::NoteOn {
                    channel: note.channel,
                    key: note.key,
                    velocity: DEFAULT_VELOCITY,
                },
            });
            events.push(TimedEvent {
                tick: note.end,
                event: TimelineEvent::NoteOff {
                    channel: note.channel,
                    key: note.key,
                },
            });
        }
        events.sort_by_key(|e| (e.tick, e.event.rank()));

        let end_tick = events.last().map(|e| e.tick).unwrap_or(0).max(offset);

        Ok(Self {
            ticks_per_quarter: TICKS_PER_QUARTER,
            events,
            end_tick,
        })
    }

    pub fn note_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.event, TimelineEvent::NoteOn { .. }))
            .count()
    }

    /// Encode as a single-track Standard MIDI File
    pub fn to_smf_bytes(&self) -> Result<Vec<u8>, TimelineError> {
        let mut track = Vec::with_capacity(self.events.len() + 1);
        let mut last_tick = 0;

        for timed in &self.events {
            let delta = timed.tick - last_tick;
            if delta > MAX_DELTA {
                return Err(TimelineError::DeltaOverflow { delta });
            }
            last_tick = timed.tick;

            let kind = match timed.event {
                TimelineEvent::Tempo { micros_per_quarter } => {
                    TrackEventKind::Meta(MetaMessage::Tempo(u24::new(micros_per_quarter)))
                }
                TimelineEvent::NoteOn {
                    channel,
                    key,
                    velocity,
                } => TrackEventKind::Midi {
                    channel: u4::new(channel),
                    message: MidiMessage::NoteOn {
                        key: u7::new(key),
                        vel: u7::new(velocity),
                    },
                },
                TimelineEvent::NoteOff { channel, key } => TrackEventKind::Midi {
                    channel: u4::new(channel),
                    message: MidiMessage::NoteOff {
                        key: u7::new(key),
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

        let smf = Smf {
            header: Header::new(
                Format::SingleTrack,
                Timing::Metrical(u15::new(self.ticks_per_quarter)),
            ),
            tracks: vec![track],
        };

        let mut bytes = Vec::new();
        smf.write_std(&mut bytes)?;
        Ok(bytes)
    }
}

fn tempo_micros(bpm: f64, fragment: &str) -> Result<u32, TimelineError> {
    let micros = (MICROS_PER_MINUTE / bpm).round();
    if !micros.is_finite() || micros < 1.0 || micros > MAX_TEMPO_MICROS as f64 {
        return Err(TimelineError::TempoOutOfRange {
            fragment: fragment.to_string(),
            bpm,
        });
    }
    Ok(micros as u32)
}

fn timed(duration: u32, divisions: Option<u32>, fragment: &str) -> Result<u64, TimelineError> {
    divisions
        .filter(|d| *d > 0)
        .map(|d| to_ticks(duration, d))
        .ok_or_else(|| TimelineError::MissingDivisions {
            fragment: fragment.to_string(),
        })
}

fn fragment_contents(
    doc: &NotationDocument,
    fragment: &str,
) -> Result<Vec<Vec<MeasureContent>>, TimelineError> {
    doc.parts
        .iter()
        .map(|part| part_contents(part, fragment))
        .collect()
}

fn part_contents(part: &Part, fragment: &str) -> Result<Vec<MeasureContent>, TimelineError> {
    let mut divisions: Option<u32> = None;
    let mut measures = Vec::with_capacity(part.measures.len());

    for measure in &part.measures {
        let mut content = MeasureContent::default();
        let mut cursor: u64 = 0;
        let mut last_onset: u64 = 0;

        for element in &measure.elements {
            let ticks = |duration: u32| timed(duration, divisions, fragment);

            match element {
                MeasureElement::Divisions { divisions: d } => divisions = Some(*d),
                MeasureElement::Time { .. } => {}
                MeasureElement::Tempo { bpm } => content.tempos.push((cursor, *bpm)),
                MeasureElement::Note(note) => {
                    if note.grace {
                        continue;
                    }
                    let duration = ticks(note.duration)?;
                    let onset = if note.chord { last_onset } else { cursor };

                    if let Some(pitch) = note.pitch {
                        content.notes.push(LocalNote {
                            key: pitch.midi_key(),
                            onset,
                            duration,
                            tie_start: note.tie_start,
                            tie_stop: note.tie_stop,
                        });
                    }

                    if !note.chord {
                        last_onset = cursor;
                        cursor += duration;
                    }
                    content.length = content.length.max(onset + duration);
                }
                MeasureElement::Backup { duration } => {
                    cursor = cursor.saturating_sub(ticks(*duration)?);
                }
                MeasureElement::Forward { duration } => {
                    cursor += ticks(*duration)?;
                    content.length = content.length.max(cursor);
                }
            }
        }

        measures.push(content);
    }

    Ok(measures)
}
