use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Replaces `path` with `bytes` via a sibling temp file so a reader never
/// observes a half-written header.
pub(crate) fn replace_with_bytes(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let staging = staging_path_for(path);
    {
        let mut file = fs::File::create(&staging)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    swap_into_place(&staging, path)
}

/// Appends one newline-terminated record and flushes it to stable storage.
pub(crate) fn append_line_synced(path: &Path, line: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    let mut buffer = String::with_capacity(line.len() + 1);
    buffer.push_str(line);
    buffer.push('\n');
    file.write_all(buffer.as_bytes())?;
    file.sync_data()
}

pub(crate) fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error),
    }
}

fn swap_into_place(staging: &Path, final_path: &Path) -> io::Result<()> {
    if let Err(error) = remove_if_present(final_path) {
        let _ = fs::remove_file(staging);
        return Err(error);
    }

    if let Err(error) = fs::rename(staging, final_path) {
        let _ = fs::remove_file(staging);
        return Err(error);
    }
    Ok(())
}

fn staging_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("save");
    let staging_name = format!("{file_name}.tmp");
    match path.parent() {
        Some(parent) => parent.join(staging_name),
        None => PathBuf::from(staging_name),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn replace_overwrites_existing_file_and_leaves_no_staging_file() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("nested").join("a.db");
        replace_with_bytes(&path, b"first\n").expect("first write");
        replace_with_bytes(&path, b"second\n").expect("second write");

        assert_eq!(fs::read_to_string(&path).expect("read"), "second\n");
        assert!(!staging_path_for(&path).exists());
    }

    #[test]
    fn append_adds_terminated_lines_in_order() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("a.db");
        replace_with_bytes(&path, b"head\n").expect("head");
        append_line_synced(&path, "one").expect("one");
        append_line_synced(&path, "two").expect("two");

        assert_eq!(fs::read_to_string(&path).expect("read"), "head\none\ntwo\n");
    }

    #[test]
    fn append_to_missing_file_fails() {
        let temp = TempDir::new().expect("temp");
        let error = append_line_synced(&temp.path().join("missing.db"), "x").expect_err("error");
        assert_eq!(error.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn remove_if_present_reports_whether_anything_was_deleted() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("a.db");
        fs::write(&path, "x").expect("write");
        assert!(remove_if_present(&path).expect("remove"));
        assert!(!remove_if_present(&path).expect("remove again"));
    }
}
