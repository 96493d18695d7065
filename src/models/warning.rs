use std::fmt;

/// Category of a correlated warning.
///
/// Ordering follows declaration order and is the secondary sort key of the
/// warning report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WarningCategory {
    Info,
    Warning,
    Error,
    UserOverride,
    Dirty,
    MissingMaster,
}

impl WarningCategory {
    /// Map a sorting-engine message level to a category.
    ///
    /// Unknown or missing levels fall back to [`WarningCategory::Info`].
    pub fn from_level(level: &str) -> Self {
        match level.trim().to_ascii_lowercase().as_str() {
            "warn" | "warning" => WarningCategory::Warning,
            "error" => WarningCategory::Error,
            _ => WarningCategory::Info,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WarningCategory::Info => "Info",
            WarningCategory::Warning => "Warning",
            WarningCategory::Error => "Error",
            WarningCategory::UserOverride => "User Override",
            WarningCategory::Dirty => "Dirty",
            WarningCategory::MissingMaster => "Missing Master",
        }
    }
}

impl fmt::Display for WarningCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the warning report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarningEntry {
    pub plugin_name: String,
    pub category: WarningCategory,
    pub message: String,
}

impl WarningEntry {
    pub fn new(
        plugin_name: impl Into<String>,
        category: WarningCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            category,
            message: message.into(),
        }
    }
}
