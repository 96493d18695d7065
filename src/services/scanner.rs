//! Header scanner for Bethesda content files.
//!
//! Extracts the master list of a `.esm`/`.esp`/`.esl` file by tag-scanning the
//! raw bytes for `MAST` subrecords:
//!
//! ```text
//! "MAST" | u32 little-endian length | <length bytes: name, usually NUL-terminated>
//! ```
//!
//! This is a tag scan, not a record parser. It does not check that a `MAST`
//! sequence sits on a real subrecord boundary, so binary payloads that happen to
//! contain those four bytes can produce spurious masters, and an oversized
//! length can end the scan early. Treat the result as best-effort metadata.

use crate::models::PluginInfo;
use crate::models::plugin::is_content_file;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use thiserror::Error;

/// Files smaller than this cannot hold a header and are reported without masters.
pub const MIN_HEADER_SIZE: usize = 16;

const MASTER_TAG: &[u8; 4] = b"MAST";
const SUBRECORD_PREFIX: usize = 8;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to read {path}: {source}")]
    Unreadable {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Scan a single content file.
pub fn scan_plugin(path: &Utf8Path) -> Result<PluginInfo, ScanError> {
    let filename = path.file_name().unwrap_or(path.as_str());
    let mut info = PluginInfo::new(filename);

    let buf = fs::read(path).map_err(|source| ScanError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    if buf.len() < MIN_HEADER_SIZE {
        tracing::debug!("{} is too small to contain a header ({} bytes)", path, buf.len());
        return Ok(info);
    }

    info.masters = parse_masters(&buf);
    Ok(info)
}

/// Tag-scan a byte buffer for `MAST` subrecords, in order of appearance.
pub fn parse_masters(buf: &[u8]) -> Vec<String> {
    let mut masters = Vec::new();
    let mut cursor = 0usize;

    while cursor + SUBRECORD_PREFIX < buf.len() {
        if &buf[cursor..cursor + 4] != MASTER_TAG {
            cursor += 1;
            continue;
        }

        let length_bytes = [
            buf[cursor + 4],
            buf[cursor + 5],
            buf[cursor + 6],
            buf[cursor + 7],
        ];
        let length = u32::from_le_bytes(length_bytes) as usize;
        let name_start = cursor + SUBRECORD_PREFIX;

        let Some(name_end) = name_start.checked_add(length).filter(|end| *end <= buf.len())
        else {
            break;
        };

        let raw = &buf[name_start..name_end];
        let raw = match raw.iter().position(|b| *b == 0) {
            Some(nul) => &raw[..nul],
            None => raw,
        };
        masters.push(String::from_utf8_lossy(raw).into_owned());

        cursor = name_end;
    }

    masters
}

/// Scan every top-level content file in a directory.
///
/// Files that cannot be read are logged and skipped. The result is sorted by
/// filename, case-insensitively.
pub fn scan_directory(dir: &Utf8Path) -> Result<Vec<PluginInfo>, ScanError> {
    let entries = dir.read_dir_utf8().map_err(|source| ScanError::Unreadable {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut plugins = Vec::new();
    for entry in entries.flatten() {
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if !is_file || !is_content_file(entry.file_name()) {
            continue;
        }

        match scan_plugin(entry.path()) {
            Ok(info) => plugins.push(info),
            Err(e) => tracing::warn!("Skipping unreadable content file: {}", e),
        }
    }

    plugins.sort_by_key(|p| p.key());
    tracing::info!("Scanned {} content file(s) in {}", plugins.len(), dir);
    Ok(plugins)
}
