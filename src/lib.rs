// Reliquary - mod overlay and plugin metadata engine for Bethesda games
//
// This is the library crate containing the core logic and data structures.
// The binary crate (main.rs) provides the command-line entry point.

pub mod config;
pub mod engine;
pub mod library;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use engine::{EngineSession, GameKind};
pub use library::{LibraryChange, LibraryError, ModLibrary};
pub use models::{ModKind, ModRecord, PluginInfo, Settings, WarningCategory, WarningEntry, Workspace};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
