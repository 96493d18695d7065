use crate::models::Settings;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;

/// File name of the settings file inside the configuration directory.
pub const SETTINGS_FILE_NAME: &str = "Reliquary Settings.yaml";

/// Prefix of environment variables that override settings (`RELIQUARY_WORKSPACE_PATH`, ...).
pub const ENV_PREFIX: &str = "RELIQUARY";

/// Configuration manager for loading and saving the settings file.
///
/// Settings are layered: defaults, then `Reliquary Settings.yaml` if present,
/// then `RELIQUARY_*` environment variables.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory holding the settings file (created if missing)
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join(SETTINGS_FILE_NAME),
            config_dir,
        })
    }

    /// Load settings from the file and the process environment.
    pub fn load_settings(&self) -> Result<Settings> {
        self.load_settings_from(Environment::with_prefix(ENV_PREFIX))
    }

    /// Load settings with an explicit environment source.
    ///
    /// # Returns
    /// The merged Settings; defaults fill anything neither source provides
    pub fn load_settings_from(&self, environment: Environment) -> Result<Settings> {
        if self.settings_path.exists() {
            tracing::info!("Loading settings from {}", self.settings_path);
        } else {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
        }

        let layered = Config::builder()
            .add_source(
                File::from(self.settings_path.as_std_path())
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(environment.try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;

        let settings: Settings = layered
            .try_deserialize()
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::debug!("Effective settings: {:?}", settings);
        Ok(settings)
    }

    /// Save settings, replacing the file atomically.
    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        let temp_path = self.settings_path.with_extension("yaml.tmp");
        fs::write(&temp_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", temp_path))?;
        fs::rename(&temp_path, &self.settings_path)
            .with_context(|| format!("Failed to replace settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GameKind;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(&config_path).unwrap();
        (manager, temp_dir)
    }

    fn env(vars: &[(&str, &str)]) -> Environment {
        let mut map = config::Map::new();
        for (key, value) in vars {
            map.insert(key.to_string(), value.to_string());
        }
        Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();
        let settings = manager.load_settings_from(env(&[])).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let (manager, _temp_dir) = create_test_config_manager();
        let settings = Settings {
            workspace_path: Utf8PathBuf::from("/srv/reliquary"),
            game_install_path: Some(Utf8PathBuf::from("/games/Fallout 4")),
            game_type: Some(GameKind::Fallout4),
            debug_mode: true,
            ..Default::default()
        };
        manager.save_settings(&settings).unwrap();
        assert!(!manager.settings_path().with_extension("yaml.tmp").exists());

        let loaded = manager.load_settings_from(env(&[])).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_environment_overrides_file() {
        let (manager, _temp_dir) = create_test_config_manager();
        manager.save_settings(&Settings::default()).unwrap();

        let loaded = manager
            .load_settings_from(env(&[
                ("RELIQUARY_WORKSPACE_PATH", "/tmp/override"),
                ("RELIQUARY_DEBUG_MODE", "true"),
            ]))
            .unwrap();
        assert_eq!(loaded.workspace_path, Utf8PathBuf::from("/tmp/override"));
        assert!(loaded.debug_mode);
        assert_eq!(loaded.extractor, "7z");
    }
}
