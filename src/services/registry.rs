//! Durable mod registry (`mods.json`).
//!
//! The registry file is a JSON array of objects with camelCase keys:
//! `id`, `name`, `archive`, `modPath`, `dataPath`, `enabled`, `type`
//! (`"tool"` or `"mod"`), `launcherPath`, `launcherArgs` and `plugins`.
//! Each field is read on its own: absent or wrong-typed fields take defaults
//! (`enabled` → true, `type` → `"mod"`, strings → empty) and elements that are
//! not objects are skipped.
//!
//! A missing file is an empty registry. A file that is not a JSON array is an
//! empty registry plus a warning for the caller. A file that exists but cannot
//! be read is an error.

use crate::models::mod_record::dedup_plugin_files;
use crate::models::{ModKind, ModRecord, Workspace};
use crate::services::tools;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to access registry {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Registry {path} is corrupt: {source}")]
    Corrupt {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode registry: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Result of [`ModRegistry::load`].
#[derive(Debug, Default)]
pub struct LoadedRegistry {
    pub records: Vec<ModRecord>,
    /// Set when the file existed but was not a JSON array; `records` is then empty.
    pub warning: Option<RegistryError>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredMod {
    id: String,
    name: String,
    archive: String,
    mod_path: String,
    data_path: String,
    enabled: bool,
    #[serde(rename = "type")]
    kind: String,
    launcher_path: String,
    launcher_args: String,
    plugins: Vec<String>,
}

impl StoredMod {
    /// Read one registry element field by field. Non-objects yield `None`.
    fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            id: string_field(object, "id"),
            name: string_field(object, "name"),
            archive: string_field(object, "archive"),
            mod_path: string_field(object, "modPath"),
            data_path: string_field(object, "dataPath"),
            enabled: object.get("enabled").and_then(Value::as_bool).unwrap_or(true),
            kind: object
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("mod")
                .to_string(),
            launcher_path: string_field(object, "launcherPath"),
            launcher_args: string_field(object, "launcherArgs"),
            plugins: object
                .get("plugins")
                .and_then(Value::as_array)
                .map(|plugins| {
                    plugins
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> String {
    object
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

impl From<&ModRecord> for StoredMod {
    fn from(record: &ModRecord) -> Self {
        let (launcher_path, launcher_args) = match &record.kind {
            ModKind::Tool {
                launcher_path,
                launcher_args,
            } => (
                launcher_path
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_default(),
                launcher_args.clone(),
            ),
            ModKind::Content => (String::new(), String::new()),
        };

        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            archive: record.archive_name.clone(),
            mod_path: record.mod_path.to_string(),
            data_path: record.data_path.to_string(),
            enabled: record.enabled,
            kind: record.kind.tag().to_string(),
            launcher_path,
            launcher_args,
            plugins: record.plugin_files.clone(),
        }
    }
}

impl From<StoredMod> for ModRecord {
    fn from(stored: StoredMod) -> Self {
        let kind = if stored.kind.eq_ignore_ascii_case("tool") {
            ModKind::Tool {
                launcher_path: (!stored.launcher_path.is_empty())
                    .then(|| Utf8PathBuf::from(stored.launcher_path)),
                launcher_args: stored.launcher_args,
            }
        } else {
            ModKind::Content
        };

        Self {
            id: stored.id,
            name: stored.name,
            archive_name: stored.archive,
            mod_path: Utf8PathBuf::from(stored.mod_path),
            data_path: Utf8PathBuf::from(stored.data_path),
            plugin_files: dedup_plugin_files(stored.plugins),
            enabled: stored.enabled,
            kind,
        }
    }
}

/// Reader and writer for the registry file of one workspace.
#[derive(Debug, Clone)]
pub struct ModRegistry {
    path: Utf8PathBuf,
    tools_dir: Utf8PathBuf,
}

impl ModRegistry {
    pub fn new(workspace: &Workspace) -> Self {
        Self {
            path: workspace.registry_path.clone(),
            tools_dir: workspace.tools_dir.clone(),
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Where [`backup`](Self::backup) copies an unusable registry file.
    pub fn backup_path(&self) -> Utf8PathBuf {
        self.path.with_extension("json.corrupt")
    }

    /// Read every record from storage.
    ///
    /// Tool records without a launcher get one located under
    /// `Tools/<id>/` when a known loader exists there; storage is not rewritten.
    ///
    /// # Errors
    ///
    /// `RegistryError::Io` when the file exists but cannot be read.
    pub fn load(&self) -> Result<LoadedRegistry, RegistryError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("No registry at {}, starting empty", self.path);
                return Ok(LoadedRegistry::default());
            }
            Err(source) => return Err(self.io_error(source)),
        };

        let elements: Vec<Value> = match serde_json::from_slice(&bytes) {
            Ok(elements) => elements,
            Err(source) => {
                let warning = RegistryError::Corrupt {
                    path: self.path.clone(),
                    source,
                };
                tracing::warn!("{}; continuing with an empty registry", warning);
                return Ok(LoadedRegistry {
                    records: Vec::new(),
                    warning: Some(warning),
                });
            }
        };

        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            let Some(entry) = StoredMod::from_value(element) else {
                tracing::warn!("Skipping registry element {}: not an object", index);
                continue;
            };
            if entry.id.trim().is_empty() {
                tracing::warn!("Skipping registry entry without an id ({:?})", entry.name);
                continue;
            }
            if !seen.insert(entry.id.clone()) {
                tracing::warn!("Skipping duplicate registry entry {}", entry.id);
                continue;
            }

            let mut record = ModRecord::from(entry);
            if record.is_tool() && record.launcher_path().is_none() {
                let tool_dir = self.tools_dir.join(&record.id);
                if let Some(launcher) = tools::find_launcher(&tool_dir) {
                    tracing::debug!("Located launcher for {}: {}", record.id, launcher);
                    record.set_launcher_path(launcher);
                }
            }
            records.push(record);
        }

        tracing::info!("Loaded {} mod(s) from {}", records.len(), self.path);
        Ok(LoadedRegistry {
            records,
            warning: None,
        })
    }

    /// Copy the current registry file to [`backup_path`](Self::backup_path),
    /// replacing an earlier backup.
    pub fn backup(&self) -> Result<Utf8PathBuf, RegistryError> {
        let backup = self.backup_path();
        fs::copy(&self.path, &backup).map_err(|source| self.io_error(source))?;
        tracing::warn!("Kept unusable registry as {}", backup);
        Ok(backup)
    }

    /// Persist all records, replacing the file atomically.
    pub fn save(&self, records: &[ModRecord]) -> Result<(), RegistryError> {
        let stored: Vec<StoredMod> = records.iter().map(StoredMod::from).collect();
        let json = serde_json::to_vec_pretty(&stored).map_err(RegistryError::Encode)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, json).map_err(|source| self.io_error(source))?;
        fs::rename(&temp_path, &self.path).map_err(|source| self.io_error(source))?;

        tracing::debug!("Saved {} mod(s) to {}", records.len(), self.path);
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> RegistryError {
        RegistryError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
