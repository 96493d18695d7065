//! Data models for Reliquary.
//!
//! - [`ModRecord`]: One installed mod as stored by the registry
//! - [`PluginInfo`]: One scanned content file (never persisted)
//! - [`WarningEntry`]: One row of the correlated warning report
//! - [`Settings`] / [`Workspace`]: User settings and the directory layout derived from them

pub mod config;
pub mod mod_record;
pub mod plugin;
pub mod warning;

pub use config::{ConfigError, Settings, Workspace};
pub use mod_record::{ModKind, ModRecord};
pub use plugin::{PluginInfo, PluginKind};
pub use warning::{WarningCategory, WarningEntry};
