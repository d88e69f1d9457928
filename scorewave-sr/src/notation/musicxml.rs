//! MusicXML reader
//!
//! Reads `score-partwise` documents. Compressed `.mxl` files are zip
//! containers whose root document is named in `META-INF/container.xml`.

use super::{Measure, MeasureElement, NotationDocument, NotationError, Note, Part, Pitch};
use roxmltree::{Document, Node, ParsingOptions};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;

const CONTAINER_ENTRY: &str = "META-INF/container.xml";

/// Read and parse one recognition output file
pub fn read_fragment(path: &Path) -> Result<NotationDocument, NotationError> {
    let bytes = std::fs::read(path)?;
    let is_container = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("mxl"))
        .unwrap_or(false);

    let text = if is_container {
        extract_container_root(&bytes)?
    } else {
        String::from_utf8(bytes).map_err(|e| NotationError::InvalidValue {
            element: "score-partwise",
            value: format!("non UTF-8 text ({})", e),
        })?
    };

    parse_musicxml(&text)
}

/// Extract the root MusicXML document from an `.mxl` container
fn extract_container_root(bytes: &[u8]) -> Result<String, NotationError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| NotationError::Container(e.to_string()))?;

    let root_path = match read_entry(&mut archive, CONTAINER_ENTRY) {
        Ok(container) => rootfile_path(&container)?,
        Err(_) => None,
    };

    let root_path = match root_path {
        Some(path) => path,
        // Containers without a manifest: first top-level XML entry
        None => archive
            .file_names()
            .filter(|name| !name.starts_with("META-INF/") && !name.contains('/'))
            .filter(|name| {
                let lower = name.to_ascii_lowercase();
                lower.ends_with(".xml") || lower.ends_with(".musicxml")
            })
            .min()
            .map(str::to_string)
            .ok_or_else(|| NotationError::Container("no MusicXML entry found".to_string()))?,
    };

    read_entry(&mut archive, &root_path)
}

fn read_entry(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<String, NotationError> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| NotationError::Container(format!("{}: {}", name, e)))?;
    let mut text = String::new();
    entry
        .read_to_string(&mut text)
        .map_err(|e| NotationError::Container(format!("{}: {}", name, e)))?;
    Ok(text)
}

fn rootfile_path(container: &str) -> Result<Option<String>, NotationError> {
    let xml = Document::parse_with_options(container, parsing_options())?;
    Ok(xml
        .descendants()
        .filter(|n| n.has_tag_name("rootfile"))
        .filter(|n| {
            n.attribute("media-type")
                .map(|m| m == "application/vnd.recordare.musicxml+xml")
                .unwrap_or(true)
        })
        .find_map(|n| n.attribute("full-path"))
        .map(str::to_string))
}

fn parsing_options() -> ParsingOptions {
    // MusicXML files carry a DOCTYPE declaration
    ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    }
}

/// Parse a MusicXML `score-partwise` document
pub fn parse_musicxml(text: &str) -> Result<NotationDocument, NotationError> {
    let xml = Document::parse_with_options(text, parsing_options())?;
    let root = xml.root_element();

    if root.tag_name().name() != "score-partwise" {
        return Err(NotationError::UnsupportedRoot(
            root.tag_name().name().to_string(),
        ));
    }

    let title = child(root, "work")
        .and_then(|work| child_text(work, "work-title"))
        .or_else(|| child_text(root, "movement-title"))
        .map(str::to_string);

    let part_names: HashMap<&str, &str> = child(root, "part-list")
        .into_iter()
        .flat_map(|list| list.children().filter(|n| n.has_tag_name("score-part")))
        .filter_map(|sp| Some((sp.attribute("id")?, child_text(sp, "part-name")?)))
        .collect();

    let mut parts = Vec::new();
    for part_node in root.children().filter(|n| n.has_tag_name("part")) {
        let id = part_node
            .attribute("id")
            .ok_or(NotationError::MissingAttribute {
                element: "part",
                attribute: "id",
            })?;

        let measures = part_node
            .children()
            .filter(|n| n.has_tag_name("measure"))
            .enumerate()
            .map(|(index, m)| parse_measure(m, index))
            .collect::<Result<Vec<_>, _>>()?;

        parts.push(Part {
            id: id.to_string(),
            name: part_names.get(id).map(|s| s.to_string()),
            measures,
        });
    }

    Ok(NotationDocument { title, parts })
}

fn parse_measure(node: Node, index: usize) -> Result<Measure, NotationError> {
    let number = node
        .attribute("number")
        .map(str::to_string)
        .unwrap_or_else(|| (index + 1).to_string());

    let mut elements = Vec::new();
    for element in node.children().filter(Node::is_element) {
        match element.tag_name().name() {
            "attributes" => parse_attributes(element, &mut elements)?,
            "note" => elements.push(MeasureElement::Note(parse_note(element)?)),
            "backup" => elements.push(MeasureElement::Backup {
                duration: required_number(element, "duration")?,
            }),
            "forward" => elements.push(MeasureElement::Forward {
                duration: required_number(element, "duration")?,
            }),
            "direction" => {
                for sound in element.descendants().filter(|n| n.has_tag_name("sound")) {
                    push_tempo(sound, &mut elements)?;
                }
            }
            "sound" => push_tempo(element, &mut elements)?,
            _ => {}
        }
    }

    Ok(Measure { number, elements })
}

fn parse_attributes(node: Node, elements: &mut Vec<MeasureElement>) -> Result<(), NotationError> {
    if let Some(text) = child_text(node, "divisions") {
        elements.push(MeasureElement::Divisions {
            divisions: parse_number("divisions", text)?,
        });
    }

    // Only the first time signature counts; others are per-staff duplicates
    if let Some(time) = child(node, "time") {
        if child(time, "senza-misura").is_none() {
            let beats = child_text(time, "beats").ok_or(NotationError::InvalidValue {
                element: "time",
                value: "missing <beats>".to_string(),
            })?;
            let beat_type = child_text(time, "beat-type").ok_or(NotationError::InvalidValue {
                element: "time",
                value: "missing <beat-type>".to_string(),
            })?;
            elements.push(MeasureElement::Time {
                beats: parse_beats(beats)?,
                beat_type: parse_number("beat-type", beat_type)?,
            });
        }
    }

    Ok(())
}

/// Beats may be compound, e.g. "3+2"
fn parse_beats(text: &str) -> Result<u32, NotationError> {
    let mut total = 0u32;
    for part in text.split('+') {
        total = total.saturating_add(parse_number("beats", part)?);
    }
    Ok(total)
}

fn parse_note(node: Node) -> Result<Note, NotationError> {
    let pitch = match child(node, "pitch") {
        Some(pitch) => Some(parse_pitch(pitch)?),
        None => None,
    };

    let grace = child(node, "grace").is_some();
    let duration = match child_text(node, "duration") {
        Some(text) => parse_number("duration", text)?,
        None => 0,
    };

    let ties = node.children().filter(|n| n.has_tag_name("tie"));
    let (mut tie_start, mut tie_stop) = (false, false);
    for tie in ties {
        match tie.attribute("type") {
            Some("start") => tie_start = true,
            Some("stop") => tie_stop = true,
            _ => {}
        }
    }

    Ok(Note {
        pitch,
        duration,
        chord: child(node, "chord").is_some(),
        grace,
        voice: child_text(node, "voice").map(str::to_string),
        tie_start,
        tie_stop,
    })
}

fn parse_pitch(node: Node) -> Result<Pitch, NotationError> {
    let step_text = child_text(node, "step").ok_or(NotationError::InvalidValue {
        element: "pitch",
        value: "missing <step>".to_string(),
    })?;
    let step = match step_text {
        "A" | "B" | "C" | "D" | "E" | "F" | "G" => step_text.chars().next().unwrap_or('C'),
        other => {
            return Err(NotationError::InvalidValue {
                element: "step",
                value: other.to_string(),
            })
        }
    };

    // Microtonal alterations are rounded to the nearest semitone
    let alter = match child_text(node, "alter") {
        Some(text) => {
            let value: f64 = parse_number("alter", text)?;
            if !(-4.0..=4.0).contains(&value) {
                return Err(NotationError::InvalidValue {
                    element: "alter",
                    value: text.to_string(),
                });
            }
            value.round() as i8
        }
        None => 0,
    };

    let octave = required_number(node, "octave")?;

    Ok(Pitch { step, alter, octave })
}

fn push_tempo(sound: Node, elements: &mut Vec<MeasureElement>) -> Result<(), NotationError> {
    if let Some(text) = sound.attribute("tempo") {
        elements.push(MeasureElement::Tempo {
            bpm: parse_number("sound", text)?,
        });
    }
    Ok(())
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name).and_then(|n| n.text()).map(str::trim)
}

fn required_number<T: std::str::FromStr>(node: Node, name: &'static str) -> Result<T, NotationError> {
    let text = child_text(node, name).ok_or(NotationError::InvalidValue {
        element: name,
        value: String::new(),
    })?;
    parse_number(name, text)
}

fn parse_number<T: std::str::FromStr>(element: &'static str, text: &str) -> Result<T, NotationError> {
    text.trim().parse().map_err(|_| NotationError::InvalidValue {
        element,
        value: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TWO_VOICES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 4.0 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd">
<score-partwise version="4.0">
  <work><work-title>Minuet</work-title></work>
  <part-list>
    <score-part id="P1"><part-name>Piano</part-name></score-part>
  </part-list>
  <part id="P1">
    <measure number="1">
      <attributes>
        <divisions>2</divisions>
        <time><beats>3</beats><beat-type>4</beat-type></time>
      </attributes>
      <direction><sound tempo="96"/></direction>
      <note><pitch><step>D</step><octave>5</octave></pitch><duration>2</duration><voice>1</voice></note>
      <note><pitch><step>G</step><octave>4</octave></pitch><duration>1</duration><voice>1</voice></note>
      <note><chord/><pitch><step>B</step><alter>-1</alter><octave>4</octave></pitch><duration>1</duration><voice>1</voice></note>
      <note><rest/><duration>3</duration><voice>1</voice></note>
      <backup><duration>6</duration></backup>
      <note><pitch><step>G</step><octave>3</octave></pitch><duration>6</duration><voice>2</voice><tie type="start"/></note>
    </measure>
  </part>
</score-partwise>"#;

    #[test]
    fn test_parse_partwise_document() {
        let doc = parse_musicxml(TWO_VOICES).unwrap();

        assert_eq!(doc.title.as_deref(), Some("Minuet"));
        assert_eq!(doc.parts.len(), 1);
        assert_eq!(doc.parts[0].name.as_deref(), Some("Piano"));

        let elements = &doc.parts[0].measures[0].elements;
        assert_eq!(elements[0], MeasureElement::Divisions { divisions: 2 });
        assert_eq!(elements[1], MeasureElement::Time { beats: 3, beat_type: 4 });
        assert_eq!(elements[2], MeasureElement::Tempo { bpm: 96.0 });
        assert_eq!(elements[7], MeasureElement::Backup { duration: 6 });

        match &elements[5] {
            MeasureElement::Note(note) => {
                assert!(note.chord);
                assert_eq!(note.pitch.unwrap().midi_key(), 70);
            }
            other => panic!("Expected chord note, got {:?}", other),
        }
        match &elements[6] {
            MeasureElement::Note(note) => assert!(note.is_rest()),
            other => panic!("Expected rest, got {:?}", other),
        }
        match &elements[8] {
            MeasureElement::Note(note) => {
                assert!(note.tie_start);
                assert!(!note.tie_stop);
                assert_eq!(note.voice.as_deref(), Some("2"));
            }
            other => panic!("Expected tied note, got {:?}", other),
        }
        assert_eq!(doc.note_count(), 5);
    }

    #[test]
    fn test_timewise_root_is_unsupported() {
        let result = parse_musicxml("<score-timewise/>");
        assert!(matches!(result, Err(NotationError::UnsupportedRoot(root)) if root == "score-timewise"));
    }

    #[test]
    fn test_invalid_step_is_rejected() {
        let text = r#"<score-partwise><part id="P1"><measure number="1">
            <note><pitch><step>H</step><octave>4</octave></pitch><duration>1</duration></note>
        </measure></part></score-partwise>"#;
        assert!(matches!(
            parse_musicxml(text),
            Err(NotationError::InvalidValue { element: "step", .. })
        ));
    }

    #[test]
    fn test_truncated_xml_is_parse_error() {
        let result = parse_musicxml("<score-partwise><part id=\"P1\">");
        assert!(matches!(result, Err(NotationError::Xml(_))));
    }

    #[test]
    fn test_compound_beats() {
        assert_eq!(parse_beats("3+2").unwrap(), 5);
        assert!(parse_beats("x").is_err());
    }

    #[test]
    fn test_read_mxl_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0001-page.mxl");

        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        zip.start_file("META-INF/container.xml", options).unwrap();
        zip.write_all(
            br#"<?xml version="1.0"?><container><rootfiles>
                <rootfile full-path="score/page.xml"/>
            </rootfiles></container>"#,
        )
        .unwrap();
        zip.start_file("score/page.xml", options).unwrap();
        zip.write_all(TWO_VOICES.as_bytes()).unwrap();
        zip.finish().unwrap();

        let doc = read_fragment(&path).unwrap();
        assert_eq!(doc.title.as_deref(), Some("Minuet"));
    }

    #[test]
    fn test_read_corrupt_mxl_is_container_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.mxl");
        std::fs::write(&path, b"not a zip file").unwrap();

        assert!(matches!(read_fragment(&path), Err(NotationError::Container(_))));
    }
}
