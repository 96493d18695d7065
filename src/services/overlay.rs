//! Overlay projector.
//!
//! The virtual content directory is the union of the base game's content files
//! and the content files of every enabled mod. The projector keeps no state of
//! its own: every action is derived from a [`ModRecord`] and the filesystem, so
//! repeating an operation converges on the same directory contents.
//!
//! When two enabled mods provide the same file name, the mod processed last
//! wins. Disabling either one removes the shared file.

use crate::metrics::Metrics;
use crate::models::ModRecord;
use crate::models::plugin::is_content_file;
use crate::services::installer::find_data_dir;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Failed to copy {file} into the virtual directory: {source}")]
    Copy {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove {file} from the virtual directory: {source}")]
    Remove {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Game Data folder not found under {0}")]
    MissingBaseData(Utf8PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Projects enabled mods into the virtual content directory.
#[derive(Debug, Clone)]
pub struct OverlayProjector {
    virtual_dir: Utf8PathBuf,
    metrics: Arc<Metrics>,
}

impl OverlayProjector {
    pub fn new(virtual_dir: impl Into<Utf8PathBuf>, metrics: Arc<Metrics>) -> Self {
        Self {
            virtual_dir: virtual_dir.into(),
            metrics,
        }
    }

    pub fn virtual_dir(&self) -> &Utf8Path {
        &self.virtual_dir
    }

    /// Copy every content file of `record` into the virtual directory,
    /// replacing files already there. Returns the number of files copied.
    pub fn enable(&self, record: &ModRecord) -> Result<usize, OverlayError> {
        for file in &record.plugin_files {
            let src = record.data_path.join(file);
            let dest = self.virtual_dir.join(file);
            fs::copy(&src, &dest).map_err(|source| OverlayError::Copy {
                file: file.clone(),
                source,
            })?;
            tracing::debug!("Projected {} from {}", file, record.id);
        }

        self.metrics.record_files_copied(record.plugin_files.len());
        Ok(record.plugin_files.len())
    }

    /// Remove every content file of `record` from the virtual directory.
    /// Files already absent are skipped. Returns the number of files removed.
    pub fn disable(&self, record: &ModRecord) -> Result<usize, OverlayError> {
        let mut removed = 0;
        for file in &record.plugin_files {
            let dest = self.virtual_dir.join(file);
            if !dest.exists() {
                continue;
            }
            fs::remove_file(&dest).map_err(|source| OverlayError::Remove {
                file: file.clone(),
                source,
            })?;
            removed += 1;
            tracing::debug!("Withdrew {} of {}", file, record.id);
        }

        self.metrics.record_files_removed(removed);
        Ok(removed)
    }

    /// Enable every enabled record, in order. Returns the number of files copied.
    pub fn reconcile(&self, records: &[ModRecord]) -> Result<usize, OverlayError> {
        let mut copied = 0;
        for record in records.iter().filter(|r| r.enabled) {
            copied += self.enable(record)?;
        }
        tracing::info!("Reconciled virtual directory: {} file(s) projected", copied);
        Ok(copied)
    }

    /// Copy the base game's content files from `<install>/Data` into the virtual
    /// directory, leaving files that already exist untouched.
    pub fn seed_base_content(&self, game_install: &Utf8Path) -> Result<usize, OverlayError> {
        let data_dir =
            find_data_dir(game_install).ok_or_else(|| OverlayError::MissingBaseData(game_install.to_path_buf()))?;

        let entries = data_dir.read_dir_utf8().map_err(|source| OverlayError::Read {
            path: data_dir.clone(),
            source,
        })?;

        let mut seeded = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file || !is_content_file(name) {
                continue;
            }

            let dest = self.virtual_dir.join(name);
            if dest.exists() {
                continue;
            }
            fs::copy(entry.path(), &dest).map_err(|source| OverlayError::Copy {
                file: name.to_string(),
                source,
            })?;
            seeded += 1;
        }

        tracing::info!("Seeded {} base content file(s) from {}", seeded, data_dir);
        Ok(seeded)
    }
}
