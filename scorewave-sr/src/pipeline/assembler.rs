//! Score assembly
//!
//! Discovered fragments are ordered by (page index, movement ordinal,
//! relative path), then each is read, parsed and checked for
//! well-formedness. Fragments failing any step are skipped with a warning.
//! An assembly with no surviving fragment is an error, never an empty score.

use super::error::PipelineError;
use super::recognition::DiscoveredFragment;
use crate::notation::{check_well_formed, read_fragment, NotationDocument, NotationError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

/// One accepted fragment in score order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledFragment {
    pub page_index: usize,
    pub ordinal: u32,
    /// Path relative to the recognition output directory
    pub source: String,
    pub document: NotationDocument,
}

/// Ordered, validated fragments of one work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledScore {
    pub fragments: Vec<AssembledFragment>,
}

impl AssembledScore {
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Canonical serialization; identical scores give identical bytes
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Lowercase hex SHA-256 of the canonical bytes
    pub fn digest(&self) -> Result<String, serde_json::Error> {
        let mut hasher = Sha256::new();
        hasher.update(self.to_canonical_bytes()?);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// Assembly result
#[derive(Debug, Clone)]
pub struct AssemblyOutcome {
    pub score: AssembledScore,
    pub skipped: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ScoreAssembler;

impl ScoreAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Merge fragments in page order, skipping invalid ones
    pub fn assemble(&self, mut fragments: Vec<DiscoveredFragment>) -> Result<AssemblyOutcome, PipelineError> {
        // Discovery order depends on the filesystem
        fragments.sort_by(|a, b| {
            (a.page_index, a.ordinal, &a.relative).cmp(&(b.page_index, b.ordinal, &b.relative))
        });

        let mut accepted = Vec::with_capacity(fragments.len());
        let mut skipped = 0;

        for fragment in fragments {
            match load(&fragment) {
                Ok(document) => {
                    debug!(
                        page = fragment.page_index + 1,
                        ordinal = fragment.ordinal,
                        fragment = %fragment.relative,
                        parts = document.parts.len(),
                        measures = document.measure_count(),
                        "Fragment accepted"
                    );
                    accepted.push(AssembledFragment {
                        page_index: fragment.page_index,
                        ordinal: fragment.ordinal,
                        source: fragment.relative,
                        document,
                    });
                }
                Err(e) => {
                    warn!(
                        page = fragment.page_index + 1,
                        fragment = %fragment.relative,
                        "Skipping notation fragment: {}",
                        e
                    );
                    skipped += 1;
                }
            }
        }

        if accepted.is_empty() {
            return Err(PipelineError::AssemblyFailed { skipped });
        }

        info!(accepted = accepted.len(), skipped, "Score assembled");

        Ok(AssemblyOutcome {
            score: AssembledScore {
                fragments: accepted,
            },
            skipped,
        })
    }
}

fn load(fragment: &DiscoveredFragment) -> Result<NotationDocument, NotationError> {
    let document = read_fragment(&fragment.path)?;
    check_well_formed(&document)?;
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn score(title: &str, notes: usize) -> String {
        let notes: String = (0..notes)
            .map(|_| "<note><pitch><step>C</step><octave>4</octave></pitch><duration>1</duration></note>")
            .collect();
        format!(
            r#"<score-partwise version="4.0">
  <work><work-title>{title}</work-title></work>
  <part-list><score-part id="P1"><part-name>Piano</part-name></score-part></part-list>
  <part id="P1"><measure number="1">
    <attributes><divisions>1</divisions><time><beats>4</beats><beat-type>4</beat-type></time></attributes>
    {notes}
  </measure></part>
</score-partwise>"#
        )
    }

    fn write(dir: &Path, page_index: usize, name: &str, content: &str) -> DiscoveredFragment {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        DiscoveredFragment {
            page_index,
            ordinal: crate::pipeline::recognition::movement_ordinal(&path),
            path,
            relative: name.to_string(),
        }
    }

    fn titles(outcome: &AssemblyOutcome) -> Vec<String> {
        outcome
            .score
            .fragments
            .iter()
            .map(|f| f.document.title.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_orders_by_page_then_movement() {
        let dir = tempfile::tempdir().unwrap();
        let fragments = vec![
            write(dir.path(), 1, "0002-b.mvt2.musicxml", &score("p2m2", 1)),
            write(dir.path(), 0, "0001-a.musicxml", &score("p1", 1)),
            write(dir.path(), 1, "0002-b.mvt1.musicxml", &score("p2m1", 1)),
        ];

        let outcome = ScoreAssembler::new().assemble(fragments).unwrap();
        assert_eq!(titles(&outcome), vec!["p1", "p2m1", "p2m2"]);
        assert_eq!(outcome.skipped, 0);
    }

    #[test]
    fn test_invalid_fragments_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let fragments = vec![
            write(dir.path(), 0, "0001-a.musicxml", &score("ok", 2)),
            // Five quarter notes in 4/4
            write(dir.path(), 1, "0002-b.musicxml", &score("overfull", 5)),
            write(dir.path(), 2, "0003-c.musicxml", "<score-partwise"),
        ];

        let outcome = ScoreAssembler::new().assemble(fragments).unwrap();
        assert_eq!(titles(&outcome), vec!["ok"]);
        assert_eq!(outcome.skipped, 2);
    }

    #[test]
    fn test_all_skipped_is_assembly_failure() {
        let dir = tempfile::tempdir().unwrap();
        let fragments = vec![
            write(dir.path(), 0, "0001-a.musicxml", &score("bad", 9)),
            write(dir.path(), 1, "0002-b.musicxml", "not xml"),
        ];

        assert!(matches!(
            ScoreAssembler::new().assemble(fragments),
            Err(PipelineError::AssemblyFailed { skipped: 2 })
        ));
        assert!(matches!(
            ScoreAssembler::new().assemble(Vec::new()),
            Err(PipelineError::AssemblyFailed { skipped: 0 })
        ));
    }

    #[test]
    fn test_digest_independent_of_discovery_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), 0, "0001-a.musicxml", &score("a", 1));
        let b = write(dir.path(), 1, "0002-b.musicxml", &score("b", 3));

        let forward = ScoreAssembler::new().assemble(vec![a.clone(), b.clone()]).unwrap();
        let reverse = ScoreAssembler::new().assemble(vec![b, a]).unwrap();

        assert_eq!(
            forward.score.to_canonical_bytes().unwrap(),
            reverse.score.to_canonical_bytes().unwrap()
        );
        let digest = forward.score.digest().unwrap();
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, reverse.score.digest().unwrap());
    }
}
