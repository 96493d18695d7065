use crate::engine::GameKind;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;

/// Default extraction tool invoked for archive installs.
pub const DEFAULT_EXTRACTOR: &str = "7z";

/// User settings from `Reliquary Settings.yaml`, overridable through
/// `RELIQUARY_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the managed store (mods, downloads, virtual data, tools)
    pub workspace_path: Utf8PathBuf,

    /// Real game install directory; its `Data` folder seeds the virtual directory
    pub game_install_path: Option<Utf8PathBuf>,

    /// Game kind override; detected from the install directory when unset
    pub game_type: Option<GameKind>,

    /// Program used to extract archives
    pub extractor: String,

    /// Path to the sorting engine shim library
    pub engine_library: Option<Utf8PathBuf>,

    pub debug_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workspace_path: Utf8PathBuf::from("Workspace"),
            game_install_path: None,
            game_type: None,
            extractor: DEFAULT_EXTRACTOR.to_string(),
            engine_library: None,
            debug_mode: false,
        }
    }
}

/// Errors for structurally invalid configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Workspace path is empty; refusing to manage mods without a workspace root")]
    EmptyWorkspace,

    #[error("Failed to create workspace directory {path}: {source}")]
    CreateDirectory {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Directory layout derived from the workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub root: Utf8PathBuf,
    pub mods_dir: Utf8PathBuf,
    pub downloads_dir: Utf8PathBuf,
    pub virtual_data_dir: Utf8PathBuf,
    pub tools_dir: Utf8PathBuf,
    pub loot_data_dir: Utf8PathBuf,
    pub registry_path: Utf8PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        if root.as_str().trim().is_empty() {
            return Err(ConfigError::EmptyWorkspace);
        }

        Ok(Self {
            mods_dir: root.join("Mods"),
            downloads_dir: root.join("Downloads"),
            virtual_data_dir: root.join("VirtualData"),
            tools_dir: root.join("Tools"),
            loot_data_dir: root.join("LootData"),
            registry_path: root.join("mods.json"),
            root,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Self::new(settings.workspace_path.clone())
    }

    /// Folder that receives the deployed assets of a tool mod.
    pub fn tool_dir(&self, mod_id: &str) -> Utf8PathBuf {
        self.tools_dir.join(mod_id)
    }

    /// Create every managed directory that does not exist yet.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        for dir in [
            &self.root,
            &self.mods_dir,
            &self.downloads_dir,
            &self.virtual_data_dir,
            &self.tools_dir,
            &self.loot_data_dir,
        ] {
            create_dir(dir)?;
        }
        Ok(())
    }
}

fn create_dir(path: &Utf8Path) -> Result<(), ConfigError> {
    fs::create_dir_all(path).map_err(|source| ConfigError::CreateDirectory {
        path: path.to_path_buf(),
        source,
    })
}
