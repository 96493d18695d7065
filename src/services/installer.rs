//! Archive installer.
//!
//! Turns an archive into an installed, enabled mod:
//!
//! 1. derive a unique id from the archive base name
//! 2. extract into `Mods/<id>/` with the configured [`Extractor`]
//! 3. normalize the layout so content lives under a `Data` folder
//! 4. enumerate content files and classify tool mods
//! 5. append the record, persist the registry, deploy tool assets and
//!    publish the content files through the [`OverlayProjector`]
//!
//! Once extraction has succeeded the extracted folder is kept whatever happens
//! next; later failures are reported with the id of the affected mod.

use crate::metrics::Metrics;
use crate::models::mod_record::dedup_plugin_files;
use crate::models::plugin::is_content_file;
use crate::models::{ModKind, ModRecord, Workspace};
use crate::services::extractor::{ExtractError, Extractor};
use crate::services::overlay::{OverlayError, OverlayProjector};
use crate::services::registry::{ModRegistry, RegistryError};
use crate::services::tools::{self, ToolError};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

const DATA_FOLDER: &str = "Data";

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Archive not found: {0}")]
    NotFound(Utf8PathBuf),

    #[error("Failed to prepare mod folder {path}: {source}")]
    Folder {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    ExtractionFailed(#[from] ExtractError),

    #[error("Installed {id} but failed to normalize its layout: {source}")]
    Layout {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Installed {id} but failed to save the mod registry: {source}")]
    RegistrySave {
        id: String,
        #[source]
        source: RegistryError,
    },

    #[error("Installed {id} but failed to deploy its tool assets; it is left disabled: {source}")]
    ToolDeploy {
        id: String,
        #[source]
        source: ToolError,
    },

    #[error("Installed {id} but could not publish it; it is left disabled: {source}")]
    PublishFailed {
        id: String,
        #[source]
        source: OverlayError,
    },
}

/// Installs archives into one workspace.
pub struct ArchiveInstaller {
    workspace: Workspace,
    extractor: Arc<dyn Extractor>,
    registry: ModRegistry,
    overlay: OverlayProjector,
    metrics: Arc<Metrics>,
}

impl ArchiveInstaller {
    pub fn new(
        workspace: Workspace,
        extractor: Arc<dyn Extractor>,
        registry: ModRegistry,
        overlay: OverlayProjector,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            workspace,
            extractor,
            registry,
            overlay,
            metrics,
        }
    }

    /// Install `archive` and append its record to `records`.
    ///
    /// On success the record is enabled, persisted and published.
    pub fn install(&self, archive: &Utf8Path, records: &mut Vec<ModRecord>) -> Result<ModRecord, InstallError> {
        let result = self.install_inner(archive, records);
        match &result {
            Ok(record) => {
                self.metrics.record_mod_installed();
                tracing::info!("Installed {} as {} ({} content file(s))", archive, record.id, record.plugin_files.len());
            }
            Err(e) => {
                self.metrics.record_install_failure();
                tracing::warn!("Install of {} failed: {}", archive, e);
            }
        }
        result
    }

    fn install_inner(&self, archive: &Utf8Path, records: &mut Vec<ModRecord>) -> Result<ModRecord, InstallError> {
        if !archive.is_file() {
            return Err(InstallError::NotFound(archive.to_path_buf()));
        }

        let archive_name = archive.file_name().unwrap_or(archive.as_str()).to_string();
        let name = archive.file_stem().unwrap_or(archive_name.as_str()).to_string();
        let id = unique_id(&sanitize_id(&name), records, &self.workspace.mods_dir);
        let mod_path = self.workspace.mods_dir.join(&id);

        fs::create_dir_all(&mod_path).map_err(|source| InstallError::Folder {
            path: mod_path.clone(),
            source,
        })?;

        let start = Instant::now();
        let extracted = self.extractor.extract(archive, &mod_path);
        self.metrics.record_extraction_time(start.elapsed());
        if let Err(e) = extracted {
            // Nothing references the folder yet
            if let Err(cleanup) = fs::remove_dir_all(&mod_path) {
                tracing::warn!("Failed to remove partial extraction {}: {}", mod_path, cleanup);
            }
            return Err(e.into());
        }

        let data_path = resolve_data_folder(&mod_path).map_err(|source| InstallError::Layout {
            id: id.clone(),
            source,
        })?;
        let plugin_files = find_plugin_files(&data_path).map_err(|source| InstallError::Layout {
            id: id.clone(),
            source,
        })?;

        let tool_dir = self.workspace.tool_dir(&id);
        let kind = if tools::is_tool_mod_name(&name) {
            let launcher_path = tools::find_launcher(&mod_path)
                .and_then(|found| found.file_name().map(|f| tool_dir.join(f)));
            ModKind::Tool {
                launcher_path,
                launcher_args: String::new(),
            }
        } else {
            ModKind::Content
        };

        let mut record = ModRecord {
            id: id.clone(),
            name,
            archive_name,
            mod_path,
            data_path,
            plugin_files,
            enabled: true,
            kind,
        };

        let deployed = tools::deploy_tool_assets(&mut record, &tool_dir);
        records.push(record.clone());

        if let Err(source) = self.registry.save(records) {
            return Err(InstallError::RegistrySave { id, source });
        }
        if let Err(source) = deployed {
            self.record_disabled(&id, records);
            return Err(InstallError::ToolDeploy { id, source });
        }

        if let Err(source) = self.overlay.enable(&record) {
            self.record_disabled(&id, records);
            return Err(InstallError::PublishFailed { id, source });
        }

        Ok(record)
    }

    /// Mark a record that was saved as enabled but never published as disabled.
    fn record_disabled(&self, id: &str, records: &mut [ModRecord]) {
        if let Some(stored) = records.iter_mut().find(|r| r.id == id) {
            stored.enabled = false;
        }
        if let Err(e) = self.registry.save(records) {
            tracing::warn!("Failed to record {} as disabled: {}", id, e);
        }
    }
}

/// Mod id from an archive base name: spaces and path separators become `_`.
pub fn sanitize_id(base_name: &str) -> String {
    let id: String = base_name
        .trim()
        .chars()
        .map(|c| if c == ' ' || c == '/' || c == '\\' { '_' } else { c })
        .collect();
    if id.is_empty() { "mod".to_string() } else { id }
}

/// First of `base`, `base_1`, `base_2`, … not used by a record or an existing folder.
pub fn unique_id(base: &str, records: &[ModRecord], mods_dir: &Utf8Path) -> String {
    let taken = |candidate: &str| {
        records.iter().any(|r| r.id.eq_ignore_ascii_case(candidate)) || mods_dir.join(candidate).exists()
    };

    if !taken(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Existing `Data` directory inside `root`, matched case-insensitively.
pub fn find_data_dir(root: &Utf8Path) -> Option<Utf8PathBuf> {
    let exact = root.join(DATA_FOLDER);
    if exact.is_dir() {
        return Some(exact);
    }

    root.read_dir_utf8()
        .ok()?
        .flatten()
        .find(|entry| {
            entry.file_name().eq_ignore_ascii_case(DATA_FOLDER)
                && entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
        })
        .map(|entry| entry.path().to_path_buf())
}

/// Return the content folder of an extracted mod, creating `Data` and moving
/// every top-level entry into it when the archive had none.
pub fn resolve_data_folder(mod_root: &Utf8Path) -> std::io::Result<Utf8PathBuf> {
    if let Some(found) = find_data_dir(mod_root) {
        return Ok(found);
    }

    let data_path = mod_root.join(DATA_FOLDER);
    fs::create_dir_all(&data_path)?;

    for entry in mod_root.read_dir_utf8()? {
        let entry = entry?;
        if entry.file_name() == DATA_FOLDER {
            continue;
        }
        fs::rename(entry.path(), data_path.join(entry.file_name()))?;
    }

    tracing::debug!("Synthesized Data folder in {}", mod_root);
    Ok(data_path)
}

/// Content files directly inside `data_dir`, sorted case-insensitively.
pub fn find_plugin_files(data_dir: &Utf8Path) -> std::io::Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in data_dir.read_dir_utf8()? {
        let entry = entry?;
        if entry.file_type()?.is_file() && is_content_file(entry.file_name()) {
            files.push(entry.file_name().to_string());
        }
    }
    files.sort_by_key(|f| f.to_lowercase());
    Ok(dedup_plugin_files(files))
}
