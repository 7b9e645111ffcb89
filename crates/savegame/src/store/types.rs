use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read/write save file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("save '{save_name}' does not exist")]
    NotFound { save_name: String },
    #[error("save '{save_name}' contains no rows")]
    Empty { save_name: String },
    #[error("save '{save_name}' does not start with a header row")]
    MissingHeader { save_name: String },
    #[error("save file {path} has an invalid row at line {line}: {message}")]
    InvalidRow {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("failed to encode row: {message}")]
    Encode { message: String },
    #[error("save '{save_name}' already has a row for '{character_name}'")]
    DuplicateCharacter {
        save_name: String,
        character_name: String,
    },
    #[error("character name '{character_name}' is reserved for the header row")]
    ReservedCharacterName { character_name: String },
    #[error("row tagged for save '{actual}' cannot be written into save '{expected}'")]
    SaveNameMismatch { expected: String, actual: String },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Write-side state of one open save. Owned by whoever serializes appends.
#[derive(Debug)]
pub struct SaveHandle {
    pub(crate) save_name: String,
    pub(crate) path: PathBuf,
    pub(crate) next_id: u64,
    pub(crate) written_characters: HashSet<String>,
}

impl SaveHandle {
    pub fn save_name(&self) -> &str {
        &self.save_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> usize {
        self.written_characters.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveEntry {
    pub save_name: String,
    pub path: PathBuf,
    pub created: SystemTime,
}
