//! Services module - business logic for managing mods and their metadata.
//!
//! The services are framework-agnostic and synchronous. Each works on explicit
//! inputs (a workspace, a record, a path), which keeps them testable in
//! isolation; [`crate::library::ModLibrary`] composes them.
//!
//! # Components
//!
//! - [`scanner`]: Reads the master list out of a content file header
//! - [`registry`]: Loads and saves `mods.json`
//! - [`extractor`]: Runs the external archive tool
//! - [`installer`]: Extracts an archive, normalizes its layout and records the mod
//! - [`overlay`]: Projects enabled mods into the virtual content directory
//! - [`tools`]: Deploys script extender executables next to the workspace
//! - [`correlator`]: Merges scan results with sorting engine metadata into warnings
//! - [`report`]: Drives an engine session from metadata files to a warning report
//! - [`game_detection`]: Identifies the game from its install directory
//!
//! # Usage Example
//!
//! ```ignore
//! use reliquary::services::{scanner, correlator};
//!
//! let plugins = scanner::scan_directory(&workspace.virtual_data_dir)?;
//! let report = correlator::correlate(&plugins, &details, &general_messages);
//! ```

pub mod correlator;
pub mod extractor;
pub mod game_detection;
pub mod installer;
pub mod overlay;
pub mod registry;
pub mod report;
pub mod scanner;
pub mod tools;

pub use correlator::correlate;
pub use extractor::{ExtractError, Extractor, SevenZip};
pub use game_detection::detect_game_kind;
pub use installer::{ArchiveInstaller, InstallError};
pub use overlay::{OverlayError, OverlayProjector};
pub use registry::{LoadedRegistry, ModRegistry, RegistryError};
pub use report::build_report;
pub use scanner::{ScanError, scan_directory, scan_plugin};
pub use tools::ToolError;
