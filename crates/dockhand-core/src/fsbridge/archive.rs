//! Single-file tar construction for in-container writes
//!
//! When a write target is not mount-backed, the content is packaged as a
//! one-entry tar archive and uploaded into the target's parent directory.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};

/// Build an in-memory tar archive containing exactly one file.
///
/// The entry is named `filename`, sized to the UTF-8 encoding of `content`,
/// and stamped with the current time. Pure, no I/O.
pub fn build_single_file_archive(filename: &str, content: &str) -> Result<Vec<u8>> {
    let data = content.as_bytes();

    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
    );
    header.set_cksum();

    let mut builder = tar::Builder::new(Vec::new());
    builder
        .append_data(&mut header, filename, data)
        .map_err(|e| Error::UploadFailed(format!("failed to build archive: {e}")))?;
    builder
        .into_inner()
        .map_err(|e| Error::UploadFailed(format!("failed to finish archive: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn archive_round_trips_single_entry() {
        let bytes = build_single_file_archive("config.json", "{\"a\": 1}").unwrap();

        let mut archive = tar::Archive::new(bytes.as_slice());
        let mut entries = archive.entries().unwrap();

        let mut entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.path().unwrap().to_str().unwrap(), "config.json");
        assert_eq!(entry.header().size().unwrap(), 8);
        assert!(entry.header().mtime().unwrap() > 0);

        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "{\"a\": 1}");

        assert!(entries.next().is_none());
    }

    #[test]
    fn archive_handles_empty_content() {
        let bytes = build_single_file_archive("empty.txt", "").unwrap();
        let mut archive = tar::Archive::new(bytes.as_slice());
        let entry = archive.entries().unwrap().next().unwrap().unwrap();
        assert_eq!(entry.header().size().unwrap(), 0);
    }

    #[test]
    fn archive_sizes_utf8_bytes_not_chars() {
        let bytes = build_single_file_archive("uni.txt", "héllo").unwrap();
        let mut archive = tar::Archive::new(bytes.as_slice());
        let entry = archive.entries().unwrap().next().unwrap().unwrap();
        assert_eq!(entry.header().size().unwrap(), 6);
    }
}
