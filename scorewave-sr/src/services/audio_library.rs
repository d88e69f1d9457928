//! Per-account audio library
//!
//! Waveforms are stored as `<root>/library/<user_id>/<name>.wav`. Listing
//! returns every saved waveform with its base64-encoded content.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use scorewave_common::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

const WAV_EXTENSION: &str = "wav";

/// Saved waveform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryEntry {
    pub name: String,
    /// Base64 (standard alphabet) of the WAV bytes
    pub payload: String,
}

#[async_trait::async_trait]
pub trait AudioLibrary: Send + Sync {
    /// Save (or replace) a named waveform
    async fn save(&self, user_id: i64, name: &str, wav: &[u8]) -> Result<()>;

    /// Saved waveforms sorted by name
    async fn list(&self, user_id: i64) -> Result<Vec<LibraryEntry>>;

    /// Remove a waveform; `NotFound` when absent
    async fn delete(&self, user_id: i64, name: &str) -> Result<()>;
}

/// Filesystem-backed audio library
#[derive(Debug, Clone)]
pub struct FsAudioLibrary {
    root: PathBuf,
}

impl FsAudioLibrary {
    /// `root` is the library directory (`<root folder>/library`)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn user_dir(&self, user_id: i64) -> PathBuf {
        self.root.join(user_id.to_string())
    }

    fn entry_path(&self, user_id: i64, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self
            .user_dir(user_id)
            .join(format!("{}.{}", name, WAV_EXTENSION)))
    }
}

/// Reject names that could escape the account directory
fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("name must not be empty".to_string()));
    }
    if name.contains(['/', '\\', '\0']) || name.starts_with('.') {
        return Err(Error::InvalidInput(format!("invalid name '{}'", name)));
    }
    Ok(())
}

#[async_trait::async_trait]
impl AudioLibrary for FsAudioLibrary {
    async fn save(&self, user_id: i64, name: &str, wav: &[u8]) -> Result<()> {
        let path = self.entry_path(user_id, name)?;
        tokio::fs::create_dir_all(self.user_dir(user_id)).await?;
        tokio::fs::write(&path, wav).await?;

        tracing::info!(user_id, name, bytes = wav.len(), "Audio saved to library");
        Ok(())
    }

    async fn list(&self, user_id: i64) -> Result<Vec<LibraryEntry>> {
        let dir = self.user_dir(user_id);
        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let path = entry.path();
            let is_wav = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(WAV_EXTENSION));
            if !is_wav || !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };

            let bytes = tokio::fs::read(&path).await?;
            entries.push(LibraryEntry {
                name,
                payload: STANDARD.encode(bytes),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn delete(&self, user_id: i64, name: &str) -> Result<()> {
        let path = self.entry_path(user_id, name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(user_id, name, "Audio removed from library");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("File {}.{} not found", name, WAV_EXTENSION)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let library = FsAudioLibrary::new(dir.path().join("library"));

        library.save(7, "nocturne", b"RIFF-b").await.unwrap();
        library.save(7, "etude", b"RIFF-a").await.unwrap();
        library.save(8, "other", b"RIFF-c").await.unwrap();

        let entries = library.list(7).await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["etude", "nocturne"]);
        assert_eq!(STANDARD.decode(&entries[0].payload).unwrap(), b"RIFF-a");
        assert!(dir.path().join("library/7/etude.wav").is_file());

        library.delete(7, "etude").await.unwrap();
        assert_eq!(library.list(7).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_user_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let library = FsAudioLibrary::new(dir.path());
        assert!(library.list(42).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let library = FsAudioLibrary::new(dir.path());
        assert!(matches!(
            library.delete(1, "ghost").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_path_escaping_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let library = FsAudioLibrary::new(dir.path());

        for name in ["../escape", "a/b", "..", ".hidden", ""] {
            assert!(
                matches!(library.save(1, name, b"x").await, Err(Error::InvalidInput(_))),
                "name {:?} should be rejected",
                name
            );
        }
    }
}
