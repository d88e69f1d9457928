//! Collaborator stores used by the HTTP surface
//!
//! Accounts and saved audio are outside the rendering pipeline; the pipeline
//! never writes to either.

pub mod account_store;
pub mod audio_library;

pub use account_store::{Account, AccountStore, SqliteAccountStore};
pub use audio_library::{AudioLibrary, FsAudioLibrary, LibraryEntry};
