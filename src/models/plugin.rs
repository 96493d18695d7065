use camino::Utf8Path;
use std::fmt;

/// File extensions the game loads as content files.
pub const CONTENT_EXTENSIONS: [&str; 3] = ["esm", "esp", "esl"];

/// Kind of a content file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Master,
    Plugin,
    LightPlugin,
}

impl PluginKind {
    /// Classify a file name by extension (case-insensitive).
    ///
    /// Anything that is not `.esm` or `.esl` is treated as a regular plugin;
    /// use [`is_content_file`] first when the extension is not known to be one
    /// of [`CONTENT_EXTENSIONS`].
    pub fn from_file_name(name: &str) -> Self {
        let extension = Utf8Path::new(name)
            .extension()
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "esm" => PluginKind::Master,
            "esl" => PluginKind::LightPlugin,
            _ => PluginKind::Plugin,
        }
    }

    /// Short label matching the file extension ("ESM", "ESP", "ESL").
    pub fn label(&self) -> &'static str {
        match self {
            PluginKind::Master => "ESM",
            PluginKind::Plugin => "ESP",
            PluginKind::LightPlugin => "ESL",
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Check whether a file name carries one of the content extensions.
pub fn is_content_file(name: &str) -> bool {
    Utf8Path::new(name)
        .extension()
        .map(|ext| {
            CONTENT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// One scanned content file.
///
/// `masters` is best-effort: it comes from a tag scan over the raw bytes, not
/// from a structured record parser, so it may contain spurious entries or miss
/// some on unusual files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub filename: String,
    pub display_name: String,
    pub kind: PluginKind,
    pub masters: Vec<String>,
}

impl PluginInfo {
    /// Create an info record with no masters; the display name mirrors the filename.
    pub fn new(filename: impl Into<String>) -> Self {
        let filename = filename.into();
        Self {
            kind: PluginKind::from_file_name(&filename),
            display_name: filename.clone(),
            filename,
            masters: Vec::new(),
        }
    }

    /// Lowercase lookup key used for case-insensitive matching.
    pub fn key(&self) -> String {
        self.filename.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(PluginKind::from_file_name("Skyrim.esm"), PluginKind::Master);
        assert_eq!(PluginKind::from_file_name("Update.ESM"), PluginKind::Master);
        assert_eq!(PluginKind::from_file_name("Patch.esp"), PluginKind::Plugin);
        assert_eq!(PluginKind::from_file_name("Light.EsL"), PluginKind::LightPlugin);
        assert_eq!(PluginKind::from_file_name("noext"), PluginKind::Plugin);
    }

    #[test]
    fn test_is_content_file() {
        assert!(is_content_file("Dawnguard.esm"));
        assert!(is_content_file("mod.ESP"));
        assert!(is_content_file("small.esl"));
        assert!(!is_content_file("textures.bsa"));
        assert!(!is_content_file("readme.txt"));
        assert!(!is_content_file("esp"));
    }

    #[test]
    fn test_new_plugin_info_defaults() {
        let info = PluginInfo::new("Unofficial Patch.esp");
        assert_eq!(info.display_name, "Unofficial Patch.esp");
        assert_eq!(info.kind, PluginKind::Plugin);
        assert!(info.masters.is_empty());
        assert_eq!(info.key(), "unofficial patch.esp");
    }
}
