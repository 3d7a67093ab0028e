// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Archive listing and entry reading with password attempts.
//!
//! Listing never decompresses. Reading tries the entry in the clear
//! first, then walks the configured password list for encrypted entries
//! (ZipCrypto and AES). All zip I/O is blocking; async callers go
//! through the `spawn_blocking` wrappers.

use std::io::Read;
use std::path::{Path, PathBuf};

use mediaferry_core::FerryError;
use tracing::debug;
use zip::result::ZipError;
use zip::unstable::write::FileOptionsExt;
use zip::ZipArchive;

/// Metadata of one file entry inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Slash-normalized entry name.
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// CRC-32 of the uncompressed content.
    pub crc: u32,
}

fn archive_error(
    path: &Path,
    message: impl Into<String>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
) -> FerryError {
    FerryError::Archive {
        message: format!("{}: {}", path.display(), message.into()),
        source,
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<std::fs::File>, FerryError> {
    let file = std::fs::File::open(path)
        .map_err(|e| archive_error(path, "cannot open archive", Some(Box::new(e))))?;
    ZipArchive::new(file)
        .map_err(|e| archive_error(path, "invalid archive", Some(Box::new(e))))
}

/// Lists the file entries of an archive without decompressing them.
pub fn list_entries_sync(path: &Path) -> Result<Vec<ArchiveEntry>, FerryError> {
    let mut archive = open_archive(path)?;
    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let entry = archive
            .by_index_raw(index)
            .map_err(|e| archive_error(path, "cannot read archive entry", Some(Box::new(e))))?;
        if entry.is_dir() {
            continue;
        }
        entries.push(ArchiveEntry {
            name: entry.name().replace('\\', "/"),
            size: entry.size(),
            crc: entry.crc32(),
        });
    }
    Ok(entries)
}

/// Reads one entry, attempting each password in turn for encrypted
/// entries. An empty password list on an encrypted entry is an error.
pub fn read_entry_sync(
    path: &Path,
    inner: &str,
    passwords: &[String],
) -> Result<Vec<u8>, FerryError> {
    let mut archive = open_archive(path)?;

    match archive.by_name(inner) {
        Ok(mut entry) => {
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut data)
                .map_err(|e| archive_error(path, format!("cannot read {inner}"), Some(Box::new(e))))?;
            return Ok(data);
        }
        Err(ZipError::FileNotFound) => {
            return Err(archive_error(path, format!("entry not found: {inner}"), None));
        }
        Err(ZipError::UnsupportedArchive(msg)) if msg.contains("Password") => {
            // Fall through to the password attempts below.
        }
        Err(e) => {
            return Err(archive_error(path, format!("cannot open {inner}"), Some(Box::new(e))));
        }
    }

    if passwords.is_empty() {
        return Err(archive_error(
            path,
            format!("entry {inner} is encrypted but no passwords were provided"),
            None,
        ));
    }

    let mut attempts = 0u32;
    for password in passwords {
        let password = password.trim();
        if password.is_empty() {
            continue;
        }
        attempts += 1;
        match archive.by_name_decrypt(inner, password.as_bytes()) {
            Ok(mut entry) => {
                let mut data = Vec::with_capacity(entry.size() as usize);
                match entry.read_to_end(&mut data) {
                    Ok(_) => return Ok(data),
                    // A ZipCrypto password can pass the header check and
                    // still fail the CRC; treat it as a failed attempt.
                    Err(e) => {
                        debug!(entry = inner, error = %e, "password attempt failed mid-read");
                        continue;
                    }
                }
            }
            Err(ZipError::InvalidPassword) => continue,
            Err(e) => {
                return Err(archive_error(path, format!("cannot decrypt {inner}"), Some(Box::new(e))));
            }
        }
    }

    Err(archive_error(
        path,
        format!("password attempts exhausted after {attempts} attempt(s) for {inner}"),
        None,
    ))
}

/// Async wrapper over [`list_entries_sync`].
pub async fn list_entries(path: PathBuf) -> Result<Vec<ArchiveEntry>, FerryError> {
    tokio::task::spawn_blocking(move || list_entries_sync(&path))
        .await
        .map_err(|e| FerryError::Internal(format!("archive task failed: {e}")))?
}

/// Async wrapper over [`read_entry_sync`].
pub async fn read_entry(
    path: PathBuf,
    inner: String,
    passwords: Vec<String>,
) -> Result<Vec<u8>, FerryError> {
    tokio::task::spawn_blocking(move || read_entry_sync(&path, &inner, &passwords))
        .await
        .map_err(|e| FerryError::Internal(format!("archive task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_archive(path: &Path, encrypted: Option<&[u8]>) {
        let file = std::fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let mut options = SimpleFileOptions::default();
        if let Some(password) = encrypted {
            options = options.with_deprecated_encryption(password);
        }

        writer.add_directory("img", SimpleFileOptions::default()).unwrap();
        writer.start_file("img/a.png", options).unwrap();
        writer.write_all(b"png-bytes").unwrap();
        writer.start_file("notes.txt", options).unwrap();
        writer.write_all(b"hello").unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn list_skips_directories_and_reports_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.zip");
        build_archive(&path, None);

        let entries = list_entries_sync(&path).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["img/a.png", "notes.txt"]);
        assert_eq!(entries[0].size, 9);
        assert_eq!(entries[1].size, 5);
    }

    #[test]
    fn read_plain_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.zip");
        build_archive(&path, None);

        let data = read_entry_sync(&path, "img/a.png", &[]).unwrap();
        assert_eq!(data, b"png-bytes");
    }

    #[test]
    fn missing_entry_is_an_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.zip");
        build_archive(&path, None);

        let result = read_entry_sync(&path, "img/missing.png", &[]);
        assert!(matches!(result, Err(FerryError::Archive { .. })));
    }

    #[test]
    fn encrypted_entry_without_passwords_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.zip");
        build_archive(&path, Some(b"secret"));

        let result = read_entry_sync(&path, "img/a.png", &[]);
        let message = result.unwrap_err().to_string();
        assert!(message.contains("encrypted"), "got: {message}");
    }

    #[test]
    fn encrypted_entry_opens_with_the_right_password_in_the_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.zip");
        build_archive(&path, Some(b"secret"));

        let passwords = vec!["wrong".to_string(), "secret".to_string()];
        let data = read_entry_sync(&path, "img/a.png", &passwords).unwrap();
        assert_eq!(data, b"png-bytes");
    }

    #[test]
    fn wrong_passwords_exhaust() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.zip");
        build_archive(&path, Some(b"secret"));

        let passwords = vec!["nope".to_string(), " ".to_string()];
        let result = read_entry_sync(&path, "img/a.png", &passwords);
        assert!(matches!(result, Err(FerryError::Archive { .. })));
    }

    #[test]
    fn invalid_archive_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a.zip");
        std::fs::write(&path, b"garbage").unwrap();
        assert!(list_entries_sync(&path).is_err());
    }

    #[tokio::test]
    async fn async_wrappers_delegate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.zip");
        build_archive(&path, None);

        let entries = list_entries(path.clone()).await.unwrap();
        assert_eq!(entries.len(), 2);
        let data = read_entry(path, "notes.txt".into(), Vec::new()).await.unwrap();
        assert_eq!(data, b"hello");
    }
}
