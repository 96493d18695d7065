//! Tool mods (script extenders).
//!
//! A tool mod ships loader executables and DLLs that run beside the game rather
//! than content files. Its assets are deployed flat into `Tools/<id>/` and the
//! loader executable found there becomes the record's launcher.

use crate::models::ModRecord;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fs;
use std::sync::LazyLock;
use thiserror::Error;
use walkdir::WalkDir;

/// Archive name fragment that marks a tool mod (case-insensitive).
pub const TOOL_NAME_PATTERN: &str = "skse";

/// Loader executables checked in order.
pub const LAUNCHER_CANDIDATES: [&str; 2] = ["skse64_loader.exe", "skse_loader.exe"];

/// Files copied out of a tool mod: `skse*.exe`, `skse*.dll`, `skse*.txt`.
static TOOL_ASSET_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^skse.*\.(exe|dll|txt)$").expect("Invalid tool asset regex"));

/// Deployed executables that start the game through the extender.
static LOADER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)loader.*\.exe$").expect("Invalid loader regex"));

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Failed to deploy tool asset {path}: {source}")]
    Deploy {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove tool assets at {path}: {source}")]
    Cleanup {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of [`deploy_tool_assets`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub copied: usize,
    pub launcher: Option<Utf8PathBuf>,
}

/// Whether a mod name marks a tool mod.
pub fn is_tool_mod_name(name: &str) -> bool {
    name.to_ascii_lowercase().contains(TOOL_NAME_PATTERN)
}

/// First launcher candidate present directly inside `dir`.
pub fn find_launcher(dir: &Utf8Path) -> Option<Utf8PathBuf> {
    LAUNCHER_CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

fn is_tool_asset(file_name: &str) -> bool {
    TOOL_ASSET_PATTERN.is_match(file_name)
}

/// Copy a tool mod's loader assets into `tool_dir`, replacing existing copies.
///
/// Every file below the mod folder whose name starts with `skse` and ends in
/// `.exe`, `.dll` or `.txt` is copied. An executable whose name contains
/// `loader` is recorded as the launcher on `record`.
pub fn deploy_tool_assets(record: &mut ModRecord, tool_dir: &Utf8Path) -> Result<DeployOutcome, ToolError> {
    let mut outcome = DeployOutcome::default();
    if !record.is_tool() {
        return Ok(outcome);
    }

    fs::create_dir_all(tool_dir).map_err(|source| ToolError::Deploy {
        path: tool_dir.to_path_buf(),
        source,
    })?;

    tracing::debug!("Deploying tool assets for {} from {} to {}", record.name, record.mod_path, tool_dir);

    for entry in WalkDir::new(&record.mod_path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let Some(file_name) = entry.file_name().to_str() else {
            continue;
        };
        if !is_tool_asset(file_name) {
            continue;
        }

        let dest = tool_dir.join(file_name);
        fs::copy(entry.path(), &dest).map_err(|source| ToolError::Deploy {
            path: dest.clone(),
            source,
        })?;
        outcome.copied += 1;

        if LOADER_PATTERN.is_match(file_name) {
            outcome.launcher = Some(dest);
        }
    }

    if let Some(launcher) = &outcome.launcher {
        record.set_launcher_path(launcher.clone());
    }

    if outcome.copied == 0 {
        tracing::warn!("No tool assets found in {}", record.mod_path);
    } else {
        tracing::info!(
            "Deployed {} tool asset(s) for {}; launcher: {}",
            outcome.copied,
            record.id,
            record
                .launcher_path()
                .map(|p| p.as_str())
                .unwrap_or("<none>")
        );
    }

    Ok(outcome)
}

/// Remove a tool mod's deployed assets. Missing folders are fine.
pub fn cleanup_tool_assets(record: &ModRecord, tool_dir: &Utf8Path) -> Result<(), ToolError> {
    if !record.is_tool() || !tool_dir.exists() {
        return Ok(());
    }

    fs::remove_dir_all(tool_dir).map_err(|source| ToolError::Cleanup {
        path: tool_dir.to_path_buf(),
        source,
    })?;
    tracing::debug!("Removed tool assets at {}", tool_dir);
    Ok(())
}
