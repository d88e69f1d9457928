//! MusicXML fixtures

/// One part, one 4/4 measure of four quarter notes on `step`
pub fn fragment(title: &str, step: char) -> String {
    let note = format!(
        "<note><pitch><step>{step}</step><octave>4</octave></pitch><duration>1</duration></note>"
    );
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise version="4.0">
  <work><work-title>{title}</work-title></work>
  <part-list><score-part id="P1"><part-name>Piano</part-name></score-part></part-list>
  <part id="P1">
    <measure number="1">
      <attributes><divisions>1</divisions><time><beats>4</beats><beat-type>4</beat-type></time></attributes>
      {notes}
    </measure>
  </part>
</score-partwise>"#,
        notes = note.repeat(4)
    )
}

/// Well-formed, but A9 maps to MIDI key 129
pub fn out_of_range_fragment(title: &str) -> String {
    let note = "<note><pitch><step>A</step><octave>9</octave></pitch><duration>1</duration></note>";
    format!(
        r#"<score-partwise version="4.0">
  <work><work-title>{title}</work-title></work>
  <part-list><score-part id="P1"/></part-list>
  <part id="P1">
    <measure number="1">
      <attributes><divisions>1</divisions><time><beats>4</beats><beat-type>4</beat-type></time></attributes>
      {notes}
    </measure>
  </part>
</score-partwise>"#,
        notes = note.repeat(4)
    )
}

/// Parses, but notes carry durations before any divisions are declared
pub fn malformed_fragment(title: &str) -> String {
    format!(
        r#"<score-partwise version="4.0">
  <work><work-title>{title}</work-title></work>
  <part-list><score-part id="P1"/></part-list>
  <part id="P1">
    <measure number="1">
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>1</duration></note>
    </measure>
  </part>
</score-partwise>"#
    )
}

/// Six quarter notes in a 4/4 measure
pub fn overfull_fragment(title: &str) -> String {
    let note = "<note><pitch><step>E</step><octave>4</octave></pitch><duration>1</duration></note>";
    format!(
        r#"<score-partwise version="4.0">
  <work><work-title>{title}</work-title></work>
  <part-list><score-part id="P1"/></part-list>
  <part id="P1">
    <measure number="1">
      <attributes><divisions>1</divisions><time><beats>4</beats><beat-type>4</beat-type></time></attributes>
      {notes}
    </measure>
  </part>
</score-partwise>"#,
        notes = note.repeat(6)
    )
}

/// Truncated XML
pub fn unparsable_fragment() -> String {
    "<score-partwise version=\"4.0\"><part id=\"P1\"><measure".to_string()
}
