//! Scoped temporary workspace for one pipeline invocation
//!
//! Layout:
//! ```text
//! scorewave-XXXXXX/
//!   pages/    validated page images, 0001-<name>.<ext>
//!   omr/      recognition output
//!   render/   assembled.json, timeline.mid, output.wav
//! ```
//!
//! The directory is removed when the workspace is dropped, on every exit path.

use crate::models::PageImage;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PAGES_DIR: &str = "pages";
const RECOGNITION_DIR: &str = "omr";
const RENDER_DIR: &str = "render";

pub const ASSEMBLED_FILE: &str = "assembled.json";
pub const TIMELINE_FILE: &str = "timeline.mid";
pub const WAVEFORM_FILE: &str = "output.wav";

/// Page image written into the workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPage {
    /// Zero-based page index from the request
    pub index: usize,
    pub path: PathBuf,
    /// Stored file stem; recognition output for this page carries it
    pub token: String,
}

#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh workspace under `scratch_dir` (system temp dir when `None`)
    pub fn create(scratch_dir: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("scorewave-");
        let dir = match scratch_dir {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };

        for sub in [PAGES_DIR, RECOGNITION_DIR, RENDER_DIR] {
            std::fs::create_dir(dir.path().join(sub))?;
        }

        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.path().join(PAGES_DIR)
    }

    pub fn recognition_dir(&self) -> PathBuf {
        self.path().join(RECOGNITION_DIR)
    }

    pub fn render_dir(&self) -> PathBuf {
        self.path().join(RENDER_DIR)
    }

    pub fn render_file(&self, name: &str) -> PathBuf {
        self.render_dir().join(name)
    }

    /// Write an accepted page as `pages/<NNNN>-<sanitized name>`
    pub async fn store_page(&self, page: &PageImage) -> io::Result<StoredPage> {
        let file_name = stored_file_name(page.index, &page.filename);
        let path = self.pages_dir().join(&file_name);
        tokio::fs::write(&path, &page.bytes).await?;

        let token = Path::new(&file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(file_name);

        Ok(StoredPage {
            index: page.index,
            path,
            token,
        })
    }

    /// Remove the workspace now, reporting any removal error
    pub fn release(self) -> io::Result<()> {
        self.dir.close()
    }
}

/// Stored name for a page: 1-based four-digit page number plus the sanitized name
pub fn stored_file_name(index: usize, original: &str) -> String {
    format!("{:04}-{}", index + 1, sanitize_filename(original))
}

/// Reduce a client filename to a safe single path component
///
/// Directory parts are dropped, characters outside `[A-Za-z0-9_-]` become
/// `_`, and only the final extension keeps its dot.
pub fn sanitize_filename(original: &str) -> String {
    // Clients may send Windows paths
    let name = original.rsplit(['/', '\\']).next().unwrap_or(original);

    let (stem, extension) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    };

    let mut stem = clean(stem.trim_start_matches('.'));
    if stem.is_empty() {
        stem = "page".to_string();
    }

    match extension {
        Some(ext) => format!("{}.{}", stem, clean(ext).to_ascii_lowercase()),
        None => stem,
    }
}
