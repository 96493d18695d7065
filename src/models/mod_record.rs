use camino::Utf8PathBuf;

/// Variant of an installed mod.
///
/// Tool mods (script extenders) ship executables that are deployed next to the
/// workspace instead of content files, and carry the launcher to start them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModKind {
    #[default]
    Content,
    Tool {
        launcher_path: Option<Utf8PathBuf>,
        launcher_args: String,
    },
}

impl ModKind {
    /// A tool kind with no launcher located yet.
    pub fn tool() -> Self {
        ModKind::Tool {
            launcher_path: None,
            launcher_args: String::new(),
        }
    }

    pub fn is_tool(&self) -> bool {
        matches!(self, ModKind::Tool { .. })
    }

    /// Storage tag used by the registry ("tool" or "mod").
    pub fn tag(&self) -> &'static str {
        match self {
            ModKind::Content => "mod",
            ModKind::Tool { .. } => "tool",
        }
    }
}

/// One installed mod, owned by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModRecord {
    /// Unique slug assigned at install time
    pub id: String,
    /// Display name derived from the archive base name
    pub name: String,
    pub archive_name: String,
    /// Extraction folder owned by this mod
    pub mod_path: Utf8PathBuf,
    /// Content subfolder inside `mod_path`
    pub data_path: Utf8PathBuf,
    /// Content file names this mod provides, unique within the mod
    pub plugin_files: Vec<String>,
    pub enabled: bool,
    pub kind: ModKind,
}

impl ModRecord {
    pub fn is_tool(&self) -> bool {
        self.kind.is_tool()
    }

    /// Launcher executable, if this is a tool mod and one has been located.
    pub fn launcher_path(&self) -> Option<&Utf8PathBuf> {
        match &self.kind {
            ModKind::Tool { launcher_path, .. } => launcher_path.as_ref(),
            ModKind::Content => None,
        }
    }

    /// Set the launcher path; ignored for content mods.
    pub fn set_launcher_path(&mut self, path: Utf8PathBuf) {
        if let ModKind::Tool { launcher_path, .. } = &mut self.kind {
            *launcher_path = Some(path);
        }
    }
}

/// Remove duplicate file names while keeping first-seen order.
pub fn dedup_plugin_files<I>(files: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = indexmap::IndexSet::new();
    for file in files {
        seen.insert(file);
    }
    seen.into_iter().collect()
}
