// JURADOC Archive Extraction - zip container enumeration
// Entries are handed back to the classifier; nothing is interpreted here

use std::io::{Cursor, Read};
use tracing::{info, warn};

use super::{ExtractError, ExtractResult};

/// One archive member with its raw bytes.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub size_bytes: usize,
    pub bytes: Vec<u8>,
}

/// Enumerates zip archives. Directories, empty members and macOS metadata
/// junk are skipped.
#[derive(Debug, Default, Clone)]
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn list_entries(&self, content: &[u8]) -> ExtractResult<Vec<ArchiveEntry>> {
        let mut archive =
            zip::ZipArchive::new(Cursor::new(content)).map_err(|e| ExtractError::Corrupt {
                kind: "zip",
                detail: e.to_string(),
            })?;

        let mut entries = Vec::new();

        for index in 0..archive.len() {
            let mut member = match archive.by_index(index) {
                Ok(member) => member,
                Err(e) => {
                    warn!(index, "Skipping unreadable archive member: {e}");
                    continue;
                }
            };

            if member.is_dir() {
                continue;
            }

            let name = member.name().to_string();
            if name.starts_with("__MACOSX/") || name.ends_with(".DS_Store") {
                continue;
            }

            let mut bytes = Vec::with_capacity(member.size() as usize);
            if let Err(e) = member.read_to_end(&mut bytes) {
                warn!(name, "Skipping archive member with read error: {e}");
                continue;
            }
            if bytes.is_empty() {
                continue;
            }

            entries.push(ArchiveEntry {
                name,
                size_bytes: bytes.len(),
                bytes,
            });
        }

        info!(members = entries.len(), "Enumerated archive entries");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_zip() -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();

            writer.add_directory("ordner/", options).unwrap();
            writer.start_file("ordner/schreiben.eml", options).unwrap();
            writer.write_all(b"From: a@b.de\nSubject: Test\n\nHallo").unwrap();

            writer.start_file("__MACOSX/._junk", options).unwrap();
            writer.write_all(b"junk").unwrap();

            writer.start_file("leer.txt", options).unwrap();

            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn test_entries_enumerated() {
        let extractor = ArchiveExtractor::new();
        let entries = extractor.list_entries(&sample_zip()).unwrap();

        // Directory, macOS junk and the empty member are all skipped
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "ordner/schreiben.eml");
        assert!(entries[0].bytes.starts_with(b"From:"));
    }

    #[test]
    fn test_corrupt_archive() {
        let extractor = ArchiveExtractor::new();
        assert!(matches!(
            extractor.list_entries(b"not a zip"),
            Err(ExtractError::Corrupt { kind: "zip", .. })
        ));
    }
}
