//! Recognition invocation and fragment discovery
//!
//! The recognizer is called once per request with every stored page in page
//! order. Its output is then walked recursively; each notation file is
//! linked back to its page through the stored page token, which is either a
//! prefix of the file stem (`0002-scan.mvt1.mxl`) or the name of an ancestor
//! directory (`0002-scan/book.mxl`).

use super::error::PipelineError;
use super::workspace::StoredPage;
use crate::capability::Recognizer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Notation file extensions produced by recognizers
const NOTATION_EXTENSIONS: [&str; 3] = ["mxl", "musicxml", "xml"];

/// Container metadata directory, never a fragment
const CONTAINER_METADATA_DIR: &str = "META-INF";

/// Movement suffix marking the intra-page order
const MOVEMENT_MARKER: &str = ".mvt";

/// Notation file attributed to a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFragment {
    pub page_index: usize,
    /// Order within the page (`.mvt<N>` suffix, 0 when absent)
    pub ordinal: u32,
    pub path: PathBuf,
    /// Path relative to the recognition output directory
    pub relative: String,
}

/// Invokes the recognition capability under a time limit
pub struct RecognitionInvoker {
    recognizer: Arc<dyn Recognizer>,
    timeout: Duration,
}

impl RecognitionInvoker {
    pub fn new(recognizer: Arc<dyn Recognizer>, timeout: Duration) -> Self {
        Self {
            recognizer,
            timeout,
        }
    }

    /// Run recognition over all pages, sorted by stored filename
    pub async fn invoke(&self, pages: &[StoredPage], output_dir: &Path) -> Result<(), PipelineError> {
        let mut paths: Vec<PathBuf> = pages.iter().map(|p| p.path.clone()).collect();
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        info!(
            recognizer = self.recognizer.name(),
            pages = paths.len(),
            timeout_secs = self.timeout.as_secs(),
            "Invoking recognition"
        );

        match tokio::time::timeout(self.timeout, self.recognizer.recognize(&paths, output_dir)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(PipelineError::RecognitionFailed(e)),
            Err(_) => Err(PipelineError::Timeout {
                stage: "recognition",
                limit: self.timeout,
            }),
        }
    }
}

/// Recursively find notation files and attribute each to a page
///
/// Files that match no page are ignored with a warning. The result is in
/// walk order; callers sort it.
pub fn discover_fragments(output_dir: &Path, pages: &[StoredPage]) -> Vec<DiscoveredFragment> {
    let mut fragments = Vec::new();

    let walker = WalkDir::new(output_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != CONTAINER_METADATA_DIR);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error accessing recognition output: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_notation_file(entry.path()) {
            continue;
        }

        let path = entry.path();
        let relative_path = path.strip_prefix(output_dir).unwrap_or(path);
        let relative = relative_path.to_string_lossy().replace('\\', "/");

        match attribute(relative_path, pages) {
            Some(page) => {
                let fragment = DiscoveredFragment {
                    page_index: page.index,
                    ordinal: movement_ordinal(path),
                    path: path.to_path_buf(),
                    relative,
                };
                debug!(
                    page = fragment.page_index + 1,
                    ordinal = fragment.ordinal,
                    fragment = %fragment.relative,
                    "Discovered notation fragment"
                );
                fragments.push(fragment);
            }
            None => warn!(fragment = %relative, "Notation file matches no page, ignoring"),
        }
    }

    fragments
}

fn is_notation_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| NOTATION_EXTENSIONS.contains(&ext.as_str()))
}

fn attribute<'p>(relative: &Path, pages: &'p [StoredPage]) -> Option<&'p StoredPage> {
    let stem = relative.file_stem()?.to_string_lossy();

    let by_stem = pages.iter().find(|page| {
        stem == page.token.as_str()
            || stem
                .strip_prefix(page.token.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
    });
    if by_stem.is_some() {
        return by_stem;
    }

    let ancestors: Vec<String> = relative
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    pages
        .iter()
        .find(|page| ancestors.iter().any(|dir| *dir == page.token))
}

/// `.mvt<N>` suffix of the file stem, 0 when absent
pub fn movement_ordinal(path: &Path) -> u32 {
    path.file_stem()
        .map(|s| s.to_string_lossy())
        .and_then(|stem| {
            stem.rsplit_once(MOVEMENT_MARKER)
                .and_then(|(_, n)| n.parse().ok())
        })
        .unwrap_or(0)
}
