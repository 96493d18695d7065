//! Game detection for a real game install directory.
//!
//! The sorting engine needs to know which game it is working on. Detection
//! looks at:
//! - the game executables present in the install directory
//!   (`SkyrimSE.exe` → Skyrim SE, `Fallout4.exe` → Fallout 4, etc.)
//! - failing that, the game master files in the install's `Data` folder
//!   (`Skyrim.esm`, `Fallout4.esm`, ...)
//!
//! When neither identifies the game, Skyrim SE is assumed.
//!
//! # Examples
//!
//! ```ignore
//! use reliquary::services::game_detection::detect_game_kind;
//! use camino::Utf8Path;
//!
//! let game = detect_game_kind(Utf8Path::new("/games/Skyrim Special Edition"));
//! assert_eq!(game.slug(), "skyrimse");
//! ```

use crate::engine::GameKind;
use crate::services::installer::find_data_dir;
use camino::Utf8Path;

/// Game kind used when nothing in the install directory identifies the game.
pub const FALLBACK_GAME: GameKind = GameKind::SkyrimSE;

/// Marker files checked in order; the first one present wins.
const EXECUTABLE_MARKERS: [(&str, GameKind); 9] = [
    ("Morrowind.exe", GameKind::Morrowind),
    ("Oblivion.exe", GameKind::Oblivion),
    ("TESV.exe", GameKind::Skyrim),
    ("SkyrimSE.exe", GameKind::SkyrimSE),
    ("Fallout3.exe", GameKind::Fallout3),
    ("FalloutNV.exe", GameKind::FalloutNV),
    ("FalloutNVLauncher.exe", GameKind::FalloutNV),
    ("Fallout4.exe", GameKind::Fallout4),
    ("openmw.cfg", GameKind::OpenMW),
];

/// Game master files, checked in order.
const MASTER_MARKERS: [(&str, GameKind); 7] = [
    ("Starfield.esm", GameKind::Starfield),
    ("Fallout4.esm", GameKind::Fallout4),
    ("FalloutNV.esm", GameKind::FalloutNV),
    ("Fallout3.esm", GameKind::Fallout3),
    ("Skyrim.esm", GameKind::SkyrimSE),
    ("Oblivion.esm", GameKind::Oblivion),
    ("Morrowind.esm", GameKind::Morrowind),
];

/// Detects the game kind of an install directory, falling back to Skyrim SE.
pub fn detect_game_kind(install_dir: &Utf8Path) -> GameKind {
    tracing::debug!("Checking game directory: {}", install_dir);

    if let Some(game) = detect_game_from_executables(install_dir) {
        tracing::info!("Detected game type from executables: {}", game);
        return game;
    }

    if let Some(game) = find_data_dir(install_dir).and_then(|data| detect_game_from_masters(&data)) {
        tracing::info!("Detected game type from master files: {}", game);
        return game;
    }

    tracing::warn!(
        "Unknown game type in {}; defaulting to {}",
        install_dir,
        FALLBACK_GAME
    );
    FALLBACK_GAME
}

/// Detects the game kind from the executables in the install directory.
///
/// # Returns
///
/// The game kind for the first marker file present, None otherwise
pub fn detect_game_from_executables(install_dir: &Utf8Path) -> Option<GameKind> {
    EXECUTABLE_MARKERS
        .iter()
        .find(|(marker, _)| install_dir.join(marker).is_file())
        .map(|(_, game)| *game)
}

/// Detects the game kind from the game master files in a `Data` folder.
///
/// Skyrim.esm is reported as Skyrim SE since both editions ship it.
pub fn detect_game_from_masters(data_dir: &Utf8Path) -> Option<GameKind> {
    let entries = data_dir.read_dir_utf8().ok()?;
    let present: Vec<String> = entries
        .flatten()
        .map(|entry| entry.file_name().to_lowercase())
        .collect();

    MASTER_MARKERS
        .iter()
        .find(|(master, _)| present.iter().any(|name| name == &master.to_lowercase()))
        .map(|(_, game)| *game)
}
