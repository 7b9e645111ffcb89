use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use super::atomic_io::{append_line_synced, remove_if_present, replace_with_bytes};
use super::row::SaveRecordRow;
use super::types::{SaveEntry, SaveHandle, StoreError};

pub const SAVE_NAME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Save identifier for a wall-clock timestamp, e.g. `2024-01-01_00-00-00`.
pub fn save_name_for(timestamp: NaiveDateTime) -> String {
    timestamp.format(SAVE_NAME_FORMAT).to_string()
}

/// File-backed row store. One JSON-lines file per save inside `dir`.
///
/// Cheap to clone; holds no open handles, so clones can be moved onto
/// background threads.
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
    extension: String,
    header_name: String,
}

impl RecordStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        extension: impl Into<String>,
        header_name: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
            header_name: header_name.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    pub fn save_path(&self, save_name: &str) -> PathBuf {
        self.dir.join(format!("{save_name}.{}", self.extension))
    }

    /// Starts a fresh save: drops any file already using `save_name` and
    /// writes the header row.
    pub fn create_save(&self, save_name: &str, scene_name: &str) -> Result<SaveHandle, StoreError> {
        let path = self.save_path(save_name);
        let mut header = SaveRecordRow::header(save_name, scene_name, &self.header_name);
        header.id = 1;
        let mut line = encode_row(&header)?;
        line.push('\n');
        replace_with_bytes(&path, line.as_bytes()).map_err(|source| StoreError::io(&path, source))?;
        debug!(save_name, path = %path.display(), "save_file_created");

        Ok(SaveHandle {
            save_name: save_name.to_string(),
            path,
            next_id: 2,
            written_characters: HashSet::new(),
        })
    }

    /// Appends one participant row and returns the id assigned to it.
    ///
    /// Callers must serialize appends for the same handle; the handle is
    /// `&mut` for that reason.
    pub fn append_row(
        &self,
        handle: &mut SaveHandle,
        mut row: SaveRecordRow,
    ) -> Result<u64, StoreError> {
        if row.save_name != handle.save_name {
            return Err(StoreError::SaveNameMismatch {
                expected: handle.save_name.clone(),
                actual: row.save_name,
            });
        }
        if row.is_header(&self.header_name) {
            return Err(StoreError::ReservedCharacterName {
                character_name: row.character_name,
            });
        }
        if handle.written_characters.contains(&row.character_name) {
            return Err(StoreError::DuplicateCharacter {
                save_name: handle.save_name.clone(),
                character_name: row.character_name,
            });
        }

        row.id = handle.next_id;
        let line = encode_row(&row)?;
        append_line_synced(&handle.path, &line)
            .map_err(|source| StoreError::io(&handle.path, source))?;

        handle.next_id += 1;
        handle.written_characters.insert(row.character_name);
        Ok(row.id)
    }

    /// Save identifiers, newest first.
    pub fn list_saves(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .list_entries()?
            .into_iter()
            .map(|entry| entry.save_name)
            .collect())
    }

    /// Save files newest first by creation time, ties broken by name.
    pub fn list_entries(&self) -> Result<Vec<SaveEntry>, StoreError> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::io(&self.dir, source)),
        };

        let mut entries = Vec::new();
        for dir_entry in read_dir {
            let dir_entry = dir_entry.map_err(|source| StoreError::io(&self.dir, source))?;
            let path = dir_entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(self.extension.as_str()) {
                continue;
            }
            let Some(save_name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let metadata = match dir_entry.metadata() {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(source) => return Err(StoreError::io(&path, source)),
            };
            let created = metadata
                .created()
                .or_else(|_| metadata.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push(SaveEntry {
                save_name: save_name.to_string(),
                path,
                created,
            });
        }

        entries.sort_by(|a, b| {
            b.created
                .cmp(&a.created)
                .then_with(|| b.save_name.cmp(&a.save_name))
        });
        Ok(entries)
    }

    pub fn latest_save(&self) -> Result<Option<String>, StoreError> {
        Ok(self.list_saves()?.into_iter().next())
    }

    pub fn is_save_available(&self) -> bool {
        match self.list_entries() {
            Ok(entries) => !entries.is_empty(),
            Err(error) => {
                warn!(error = %error, "save_listing_failed");
                false
            }
        }
    }

    /// Every row of `save_name`, header first.
    pub fn read_all_rows(&self, save_name: &str) -> Result<Vec<SaveRecordRow>, StoreError> {
        let path = self.save_path(save_name);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    save_name: save_name.to_string(),
                })
            }
            Err(source) => return Err(StoreError::io(&path, source)),
        };

        let terminated = raw.ends_with('\n');
        let lines: Vec<&str> = raw.lines().collect();
        let last_index = lines.len().saturating_sub(1);
        let mut rows = Vec::with_capacity(lines.len());
        for (index, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_row(line) {
                Ok(row) => rows.push(row),
                Err(message) if index == last_index && !terminated => {
                    warn!(
                        save_name,
                        line = index + 1,
                        error = %message,
                        "save_trailing_row_truncated_skipped"
                    );
                }
                Err(message) => {
                    return Err(StoreError::InvalidRow {
                        path,
                        line: index + 1,
                        message,
                    })
                }
            }
        }

        let Some(first) = rows.first() else {
            return Err(StoreError::Empty {
                save_name: save_name.to_string(),
            });
        };
        if !first.is_header(&self.header_name) {
            return Err(StoreError::MissingHeader {
                save_name: save_name.to_string(),
            });
        }
        Ok(rows)
    }

    /// Removes a save. Absent saves are not an error.
    pub fn delete_save(&self, save_name: &str) -> Result<(), StoreError> {
        let path = self.save_path(save_name);
        let removed = remove_if_present(&path).map_err(|source| StoreError::io(&path, source))?;
        if removed {
            info!(save_name, path = %path.display(), "save_deleted");
        }
        Ok(())
    }

    /// Deletes everything except the `keep` newest saves and returns the
    /// names that were removed. A file that cannot be removed is logged and
    /// skipped.
    pub fn prune_oldest(&self, keep: usize) -> Result<Vec<String>, StoreError> {
        let entries = self.list_entries()?;
        let mut removed = Vec::new();
        for entry in entries.into_iter().skip(keep) {
            match self.delete_save(&entry.save_name) {
                Ok(()) => removed.push(entry.save_name),
                Err(error) => warn!(
                    save_name = %entry.save_name,
                    error = %error,
                    "save_prune_failed"
                ),
            }
        }
        Ok(removed)
    }
}

fn encode_row(row: &SaveRecordRow) -> Result<String, StoreError> {
    serde_json::to_string(row).map_err(|error| StoreError::Encode {
        message: error.to_string(),
    })
}

fn parse_row(raw: &str) -> Result<SaveRecordRow, String> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, SaveRecordRow>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        let source = error.into_inner();
        if path.is_empty() || path == "." {
            source.to_string()
        } else {
            format!("at {path}: {source}")
        }
    })
}
