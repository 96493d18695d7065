//! Mod library.
//!
//! [`ModLibrary`] owns the in-memory registry records for one workspace and is
//! the single writer for the registry file and the virtual content directory.

use crate::metrics::Metrics;
use crate::models::{ConfigError, ModRecord, PluginInfo, Workspace};
use crate::services::extractor::Extractor;
use crate::services::installer::{ArchiveInstaller, InstallError};
use crate::services::overlay::{OverlayError, OverlayProjector};
use crate::services::registry::{ModRegistry, RegistryError};
use crate::services::scanner::{self, ScanError};
use crate::services::tools::{self, ToolError};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::broadcast;

/// Change events emitted when the library is modified
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LibraryChange {
    /// An archive was installed and published
    ModInstalled { id: String },

    /// A mod was enabled or disabled
    ModToggled { id: String, enabled: bool },

    /// A mod and its files were removed
    ModRemoved { id: String },

    /// Every enabled mod was re-projected into the virtual directory
    Reconciled { enabled: usize },
}

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Overlay(#[from] OverlayError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("Unknown mod id: {0}")]
    UnknownMod(String),

    #[error("Failed to delete mod folder {path}: {source}")]
    RemoveFolder {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Installed mods of one workspace.
///
/// Mutations (`install_archive`, `set_enabled`, `remove`, `reconcile`) are
/// serialized through one lock that guards both the records and the virtual
/// directory, so the registry file always matches what was projected.
pub struct ModLibrary {
    workspace: Workspace,
    records: Mutex<Vec<ModRecord>>,
    registry: ModRegistry,
    overlay: OverlayProjector,
    installer: ArchiveInstaller,
    metrics: Arc<Metrics>,
    load_warning: Option<String>,

    /// Broadcast channel for change events; sending with no subscriber is fine
    changes_tx: broadcast::Sender<LibraryChange>,
}

impl ModLibrary {
    /// Open a workspace.
    ///
    /// Creates the workspace directories, seeds the virtual directory with the
    /// base game's content files when `game_install` is set, loads the registry,
    /// re-projects enabled mods, redeploys tool assets and saves the registry.
    /// An enabled mod that cannot be projected is marked disabled.
    ///
    /// A registry file that is not a JSON array is copied to `mods.json.corrupt`
    /// before being replaced; one that cannot be read at all fails the open.
    pub fn open(
        workspace: Workspace,
        game_install: Option<&Utf8Path>,
        extractor: Arc<dyn Extractor>,
    ) -> Result<Self, LibraryError> {
        workspace.ensure_directories()?;

        let metrics = Arc::new(Metrics::new());
        let registry = ModRegistry::new(&workspace);
        let overlay = OverlayProjector::new(workspace.virtual_data_dir.clone(), metrics.clone());
        let installer = ArchiveInstaller::new(
            workspace.clone(),
            extractor,
            registry.clone(),
            overlay.clone(),
            metrics.clone(),
        );

        if let Some(install) = game_install {
            overlay.seed_base_content(install)?;
        }

        let loaded = registry.load()?;
        let load_warning = loaded.warning.map(|w| w.to_string());
        if load_warning.is_some() {
            registry.backup()?;
        }
        let mut records = loaded.records;

        let mut enabled = 0;
        for record in records.iter_mut().filter(|r| r.enabled) {
            if let Err(e) = overlay.enable(record) {
                tracing::warn!("Disabling {}: {}", record.id, e);
                record.enabled = false;
                continue;
            }
            enabled += 1;

            if record.is_tool() {
                let tool_dir = workspace.tool_dir(&record.id);
                if let Err(e) = tools::deploy_tool_assets(record, &tool_dir) {
                    tracing::warn!("Tool assets of {} not deployed: {}", record.id, e);
                }
            }
        }
        registry.save(&records)?;

        let (changes_tx, _) = broadcast::channel(100);
        let library = Self {
            workspace,
            records: Mutex::new(records),
            registry,
            overlay,
            installer,
            metrics,
            load_warning,
            changes_tx,
        };

        tracing::info!("Opened workspace {} ({} mod(s) enabled)", library.workspace.root, enabled);
        library.emit(LibraryChange::Reconciled { enabled });
        Ok(library)
    }

    /// Snapshot of every installed mod, in install order.
    pub fn mods(&self) -> Vec<ModRecord> {
        self.lock().clone()
    }

    pub fn get(&self, id: &str) -> Option<ModRecord> {
        self.lock().iter().find(|r| r.id == id).cloned()
    }

    /// Install an archive; the new mod is enabled and published.
    pub fn install_archive(&self, archive: &Utf8Path) -> Result<ModRecord, LibraryError> {
        let mut records = self.lock();
        let record = self.installer.install(archive, &mut records)?;
        drop(records);

        self.emit(LibraryChange::ModInstalled {
            id: record.id.clone(),
        });
        Ok(record)
    }

    /// Enable or disable a mod. Does nothing when the mod is already in the
    /// requested state.
    ///
    /// A failed enable leaves the mod disabled; a failed disable leaves it
    /// enabled.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), LibraryError> {
        let mut records = self.lock();
        let index = find_index(&records, id)?;
        if records[index].enabled == enabled {
            return Ok(());
        }

        let tool_dir = self.workspace.tool_dir(id);
        let record = &mut records[index];
        if enabled {
            self.overlay.enable(record)?;
            if record.is_tool() {
                if let Err(e) = tools::deploy_tool_assets(record, &tool_dir) {
                    if let Err(rollback) = self.overlay.disable(record) {
                        tracing::warn!("Failed to withdraw {} after tool error: {}", id, rollback);
                    }
                    return Err(e.into());
                }
            }
            record.enabled = true;
        } else {
            self.overlay.disable(record)?;
            record.enabled = false;
            if let Err(e) = tools::cleanup_tool_assets(record, &tool_dir) {
                tracing::warn!("Tool assets of {} left behind: {}", id, e);
            }
        }

        self.registry.save(&records)?;
        drop(records);

        tracing::info!("{} {}", if enabled { "Enabled" } else { "Disabled" }, id);
        self.emit(LibraryChange::ModToggled {
            id: id.to_string(),
            enabled,
        });
        Ok(())
    }

    /// Uninstall a mod: withdraw its files, remove tool assets, delete its
    /// folder and drop its record.
    ///
    /// Once its files are withdrawn the mod is recorded as disabled, so a
    /// failure in a later step leaves a disabled record behind.
    pub fn remove(&self, id: &str) -> Result<(), LibraryError> {
        let mut records = self.lock();
        let index = find_index(&records, id)?;
        self.overlay.disable(&records[index])?;
        if records[index].enabled {
            // Withdrawn from the overlay; keep storage in step if a later step fails
            records[index].enabled = false;
            self.registry.save(&records)?;
        }

        let record = &records[index];
        tools::cleanup_tool_assets(record, &self.workspace.tool_dir(id))?;
        if record.mod_path.exists() {
            fs::remove_dir_all(&record.mod_path).map_err(|source| LibraryError::RemoveFolder {
                path: record.mod_path.clone(),
                source,
            })?;
        }

        records.remove(index);
        self.registry.save(&records)?;
        drop(records);

        tracing::info!("Removed {}", id);
        self.emit(LibraryChange::ModRemoved { id: id.to_string() });
        Ok(())
    }

    /// Re-project every enabled mod into the virtual directory.
    pub fn reconcile(&self) -> Result<usize, LibraryError> {
        let records = self.lock();
        self.overlay.reconcile(&records)?;
        let enabled = records.iter().filter(|r| r.enabled).count();
        drop(records);

        self.emit(LibraryChange::Reconciled { enabled });
        Ok(enabled)
    }

    /// Scan the content files currently in the virtual directory.
    pub fn scan_plugins(&self) -> Result<Vec<PluginInfo>, LibraryError> {
        let plugins = scanner::scan_directory(self.overlay.virtual_dir())?;
        Ok(plugins)
    }

    /// Subscribe to change events
    ///
    /// Returns a receiver that will get notified of all future changes.
    pub fn subscribe(&self) -> broadcast::Receiver<LibraryChange> {
        self.changes_tx.subscribe()
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Problem found while loading the registry, if it had to be discarded.
    pub fn load_warning(&self) -> Option<&str> {
        self.load_warning.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ModRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, change: LibraryChange) {
        if self.changes_tx.send(change).is_err() {
            self.metrics.record_unobserved_change();
        }
    }
}

fn find_index(records: &[ModRecord], id: &str) -> Result<usize, LibraryError> {
    records
        .iter()
        .position(|r| r.id == id)
        .ok_or_else(|| LibraryError::UnknownMod(id.to_string()))
}
