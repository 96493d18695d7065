use super::GameKind;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// File reference inside plugin metadata (load-after, requirement, incompatibility).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileEntry {
    pub name: String,
    pub display: Option<String>,
    pub detail: Option<String>,
    pub condition: Option<String>,
    pub constraint: Option<String>,
}

/// Bash tag suggestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagEntry {
    pub name: String,
    /// "add" or "remove"
    pub suggestion: String,
    pub condition: Option<String>,
}

/// Message attached to a plugin or to the whole load order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineMessage {
    /// "info", "warn" or "error"; anything else is treated as info
    pub level: String,
    pub text: String,
    pub condition: Option<String>,
}

/// Dirty or clean record for one plugin revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningEntry {
    /// Formatted as `0x%08X`
    pub crc: String,
    pub utility: String,
    pub itm: u32,
    pub deleted_references: u32,
    pub deleted_navmeshes: u32,
    pub detail: Option<String>,
}

/// Per-file metadata decoded from the engine. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginDetails {
    pub name: String,
    pub has_masterlist: bool,
    pub has_user_metadata: bool,
    pub group: Option<String>,
    pub load_after: Vec<FileEntry>,
    pub requirements: Vec<FileEntry>,
    pub incompatibilities: Vec<FileEntry>,
    pub tags: Vec<TagEntry>,
    pub messages: Vec<EngineMessage>,
    pub dirty: Vec<CleaningEntry>,
    pub clean: Vec<CleaningEntry>,
}

/// Locations of the metadata files for one game under the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataPaths {
    pub masterlist: Utf8PathBuf,
    pub prelude: Utf8PathBuf,
    pub userlist: Utf8PathBuf,
}

impl MetadataPaths {
    pub fn new(loot_data_dir: &Utf8Path, game: GameKind) -> Self {
        let masterlist_dir = loot_data_dir.join("masterlists").join(game.slug());
        let userlist_dir = loot_data_dir.join("userlists").join(game.slug());
        Self {
            masterlist: masterlist_dir.join("masterlist.yaml"),
            prelude: masterlist_dir.join("prelude.yaml"),
            userlist: userlist_dir.join("userlist.yaml"),
        }
    }

    /// Prelude path, only if the file exists.
    pub fn existing_prelude(&self) -> Option<&Utf8Path> {
        self.prelude.is_file().then_some(self.prelude.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_details_tolerate_missing_fields() {
        let details: PluginDetails = serde_json::from_str(r#"{"name":"A.esp"}"#).unwrap();
        assert_eq!(details.name, "A.esp");
        assert!(!details.has_user_metadata);
        assert!(details.requirements.is_empty());
        assert!(details.group.is_none());
    }

    #[test]
    fn test_details_full_payload() {
        let json = r#"{
            "name":"Patch.esp","has_masterlist":true,"has_user_metadata":true,"group":"late",
            "requirements":[{"name":"Ghost.esm","display":"Ghost"}],
            "tags":[{"name":"Delev","suggestion":"add"}],
            "messages":[{"level":"error","text":"Broken","condition":null}],
            "clean":[{"crc":"0x12345678","utility":"SSEEdit v4","itm":0,"deleted_references":0,"deleted_navmeshes":0}]
        }"#;
        let details: PluginDetails = serde_json::from_str(json).unwrap();
        assert_eq!(details.group.as_deref(), Some("late"));
        assert_eq!(details.requirements[0].display.as_deref(), Some("Ghost"));
        assert_eq!(details.tags[0].suggestion, "add");
        assert_eq!(details.messages[0].level, "error");
        assert_eq!(details.clean[0].crc, "0x12345678");
    }

    #[test]
    fn test_metadata_paths_layout() {
        let paths = MetadataPaths::new(Utf8Path::new("/ws/LootData"), GameKind::SkyrimSE);
        assert_eq!(
            paths.masterlist,
            Utf8PathBuf::from("/ws/LootData/masterlists/skyrimse/masterlist.yaml")
        );
        assert_eq!(
            paths.userlist,
            Utf8PathBuf::from("/ws/LootData/userlists/skyrimse/userlist.yaml")
        );
        assert!(paths.existing_prelude().is_none());
    }
}
