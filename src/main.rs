//! Reliquary - mod overlay manager and plugin metadata engine
//!
//! Command-line entry point. It loads settings, initializes logging, opens the
//! workspace (which reconciles the virtual directory) and runs one command.
//!
//! Library work is synchronous file I/O, so each step runs on tokio's blocking
//! pool while a background task logs library change events.

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use reliquary::engine::{EngineSession, MetadataPaths, ShimLibrary};
use reliquary::services::game_detection::{FALLBACK_GAME, detect_game_kind};
use reliquary::services::{SevenZip, build_report};
use reliquary::{APP_NAME, ConfigManager, GameKind, LibraryChange, ModLibrary, Settings, VERSION, Workspace};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser, Debug)]
#[command(name = "reliquary", version, about = "Mod overlay manager and plugin metadata engine")]
struct Cli {
    /// Directory holding `Reliquary Settings.yaml`
    #[arg(long, default_value = "Reliquary Data")]
    config_dir: Utf8PathBuf,

    /// Workspace root, overriding the settings file
    #[arg(long)]
    workspace: Option<Utf8PathBuf>,

    /// Directory for rotating log files
    #[arg(long, default_value = "logs")]
    log_dir: Utf8PathBuf,

    /// Echo log output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List installed mods
    List,
    /// Install a mod archive and enable it
    Install { archive: Utf8PathBuf },
    /// Enable an installed mod
    Enable { id: String },
    /// Disable an installed mod
    Disable { id: String },
    /// Uninstall a mod and delete its files
    Remove { id: String },
    /// Scan content files in the virtual directory
    Scan,
    /// Correlate scanned content files with sorting engine metadata
    Report,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigManager::new(&cli.config_dir)?;
    let mut settings = config.load_settings()?;
    if let Some(workspace) = &cli.workspace {
        settings.workspace_path = workspace.clone();
    }

    let _guard = reliquary::logging::setup_logging_with_console(
        &cli.log_dir,
        APP_NAME,
        settings.debug_mode,
        cli.verbose,
    )?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let workspace = Workspace::from_settings(&settings)?;
    let extractor = Arc::new(SevenZip::new(settings.extractor.clone()));
    let game_install = settings.game_install_path.clone();

    let library = tokio::task::spawn_blocking(move || {
        ModLibrary::open(workspace, game_install.as_deref(), extractor)
    })
    .await
    .context("Workspace task panicked")??;
    let library = Arc::new(library);

    if let Some(warning) = library.load_warning() {
        eprintln!("warning: {}", warning);
    }

    let listener = tokio::spawn(log_changes(library.subscribe()));

    let worker = library.clone();
    let outcome = tokio::task::spawn_blocking(move || run(&worker, &settings, cli.command))
        .await
        .context("Command task panicked")?;

    library.metrics().log_summary();
    listener.abort();
    outcome
}

async fn log_changes(mut changes: tokio::sync::broadcast::Receiver<LibraryChange>) {
    loop {
        match changes.recv().await {
            Ok(change) => tracing::debug!("Library change: {:?}", change),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Change listener lagged, skipped {} event(s)", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn run(library: &ModLibrary, settings: &Settings, command: Command) -> Result<()> {
    match command {
        Command::List => {
            let mods = library.mods();
            if mods.is_empty() {
                println!("No mods installed.");
            }
            for record in mods {
                println!(
                    "[{}] {} ({}) plugins: {}",
                    if record.enabled { "x" } else { " " },
                    record.id,
                    if record.is_tool() { "tool" } else { "mod" },
                    record.plugin_files.join(", ")
                );
            }
        }
        Command::Install { archive } => {
            let record = library.install_archive(&archive)?;
            println!("Installed {} as {}", archive, record.id);
        }
        Command::Enable { id } => {
            library.set_enabled(&id, true)?;
            println!("Enabled {}", id);
        }
        Command::Disable { id } => {
            library.set_enabled(&id, false)?;
            println!("Disabled {}", id);
        }
        Command::Remove { id } => {
            library.remove(&id)?;
            println!("Removed {}", id);
        }
        Command::Scan => {
            for plugin in library.scan_plugins()? {
                println!("{} [{}]", plugin.filename, plugin.kind.label());
                for master in &plugin.masters {
                    println!("    requires {}", master);
                }
            }
        }
        Command::Report => report(library, settings)?,
    }
    Ok(())
}

fn report(library: &ModLibrary, settings: &Settings) -> Result<()> {
    let workspace = library.workspace();
    let install = settings
        .game_install_path
        .clone()
        .unwrap_or_else(|| workspace.root.clone());
    let game: GameKind = settings.game_type.unwrap_or_else(|| match &settings.game_install_path {
        Some(path) => detect_game_kind(path),
        None => FALLBACK_GAME,
    });

    let Some(library_path) = &settings.engine_library else {
        println!("Sorting engine unavailable: no engine_library configured.");
        return Ok(());
    };
    let backend = match ShimLibrary::load(library_path) {
        Ok(shim) => Arc::new(shim),
        Err(e) => {
            tracing::warn!("{}", e);
            println!("{}", e);
            return Ok(());
        }
    };
    let Some(mut session) =
        EngineSession::open(backend, game, &workspace.virtual_data_dir, &install)
    else {
        println!("Sorting engine unavailable: the {} session could not be created.", game);
        return Ok(());
    };

    let plugins = library.scan_plugins()?;
    let paths = MetadataPaths::new(&workspace.loot_data_dir, game);
    let warnings = build_report(&mut session, &plugins, &paths, library.metrics());
    session.close();

    if warnings.is_empty() {
        println!("No warnings for {} plugin(s).", plugins.len());
    }
    for warning in warnings {
        println!("{:<40} {:<14} {}", warning.plugin_name, warning.category.label(), warning.message);
    }
    Ok(())
}
