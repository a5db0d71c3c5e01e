//! `slotkeeper`: back up, install and switch game slots from the terminal.

mod config;
mod launcher;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use slotkeeper_file_ops::Root;
use slotkeeper_file_tree::{FileNode, GameKind, SignatureCatalog, resolve_executable_offset};
use slotkeeper_install::{
    Collaborators, HttpTransport, InstallOutcome, JsonMetadataStore, Launcher, LevelId, Pipeline,
    SlotRef, SlotState, ZipArchiveReader, build_manifest,
};
use tracing_subscriber::EnvFilter;

use config::CliConfig;
use launcher::CommandLauncher;

#[derive(Parser, Debug)]
#[command(name = "slotkeeper", version, about = "Game slot installation manager")]
struct Cli {
    /// Config file to use instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find the executable offset inside a directory.
    Resolve {
        dir: PathBuf,
        /// Only try signatures of this game (e.g. TR4).
        #[arg(long)]
        kind: Option<GameKind>,
    },
    /// Show what sits at a game's live path.
    State { game: GameKind },
    /// Verify and back up an original installation, then link it back.
    Backup { game: GameKind },
    /// Record the manifest of a game's live installation.
    Record { game: GameKind },
    /// Download (if needed), verify and extract a level.
    Install { level_id: LevelId },
    /// Make a slot live: a game code (TR4) or `level:<id>`.
    Activate { slot: SlotRef },
    /// Remove a path below one of the roots.
    Remove { root: RootArg, path: PathBuf },
    /// Activate a slot and run its executable.
    Launch { slot: SlotRef },
    /// Print the SHA-256 digest of a file.
    Digest { file: PathBuf },
    /// Print the effective configuration.
    Config {
        /// Write the effective configuration back to disk.
        #[arg(long)]
        save: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RootArg {
    Install,
    Library,
}

impl From<RootArg> for Root {
    fn from(root: RootArg) -> Self {
        match root {
            RootArg::Install => Root::Install,
            RootArg::Library => Root::Library,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = main_entry() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn main_entry() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Resolve { dir, kind } => resolve(&dir, kind),
        Command::Digest { file } => {
            let digest = slotkeeper_integrity::digest_file(&file)?;
            println!("{digest}  {}", file.display());
            Ok(())
        }
        Command::Config { save } => show_config(&config, save),
        Command::State { game } => {
            let (pipeline, _) = open_pipeline(&config)?;
            match pipeline.slot_state(game)? {
                SlotState::Absent => println!("{game}: absent"),
                SlotState::Installed => println!("{game}: installed (not backed up)"),
                SlotState::Linked(target) => println!("{game}: -> {}", target.display()),
                SlotState::Occupied => println!("{game}: occupied by a file"),
            }
            Ok(())
        }
        Command::Backup { game } => {
            let (pipeline, _) = open_pipeline(&config)?;
            let report = pipeline.materialize_original(game)?;
            println!(
                "{game}: {} copied, {} already present",
                report.copied, report.skipped
            );
            println!("  quarantine: {}", report.quarantine.display());
            println!("  previous:   {}", report.backup.display());
            Ok(())
        }
        Command::Record { game } => {
            let (pipeline, metadata) = open_pipeline(&config)?;
            let live = pipeline.live_path(game)?;
            let manifest = build_manifest(live.as_path())?;
            let count = manifest.len();
            metadata.set_manifest(game, manifest)?;
            println!("{game}: recorded {count} files from {live}");
            Ok(())
        }
        Command::Install { level_id } => {
            let (pipeline, _) = open_pipeline(&config)?;
            let mut progress = |percent: u8| {
                eprint!("\rextracting {percent:>3}%");
                let _ = std::io::stderr().flush();
            };
            let outcome = pipeline.fetch_and_install(level_id, &mut progress);
            eprintln!();
            match outcome? {
                InstallOutcome::Installed { root, offset } => {
                    println!("level {level_id}: installed at {}", root.display());
                    println!(
                        "  executable under {} ({})",
                        offset.absolute(&root).display(),
                        offset.signature
                    );
                }
                InstallOutcome::ExecutableNotLocated { root } => {
                    println!("level {level_id}: extracted to {}", root.display());
                    println!("  no known game layout found inside");
                }
            }
            Ok(())
        }
        Command::Activate { slot } => {
            let (pipeline, _) = open_pipeline(&config)?;
            let slot = pipeline.slot(slot)?;
            let target = pipeline.activate(&slot)?;
            println!("{slot}: -> {}", target.display());
            Ok(())
        }
        Command::Remove { root, path } => {
            let (pipeline, _) = open_pipeline(&config)?;
            let removal = pipeline.remove(root.into(), &path)?;
            println!("{}: {removal:?}", path.display());
            Ok(())
        }
        Command::Launch { slot } => {
            let (pipeline, _) = open_pipeline(&config)?;
            let slot = pipeline.slot(slot)?;
            let target = pipeline.prepare_launch(&slot)?;
            CommandLauncher::new(config.runner.clone())
                .launch(&target)
                .with_context(|| format!("running {slot}"))?;
            Ok(())
        }
    }
}

fn resolve(dir: &Path, kind: Option<GameKind>) -> anyhow::Result<()> {
    let scan = FileNode::scan(dir)?;
    match resolve_executable_offset(&scan, &SignatureCatalog::builtin(), kind) {
        Some(found) => {
            let offset = if found.offset.as_os_str().is_empty() {
                ".".to_string()
            } else {
                found.offset.display().to_string()
            };
            println!("{offset}\t{}\t{}", found.kind, found.signature);
        }
        None => anyhow::bail!("no known game layout under {}", dir.display()),
    }
    Ok(())
}

fn show_config(config: &CliConfig, save: bool) -> anyhow::Result<()> {
    println!("config:   {}", config.file_path().display());
    println!("install:  {}", config.install_root.display());
    println!("library:  {}", config.library_root.display());
    println!("metadata: {}", config.metadata_path.display());
    println!("runner:   {}", config.runner);
    if save {
        config.save()?;
        println!("saved");
    }
    Ok(())
}

/// Builds the pipeline from config, creating both roots if needed.
fn open_pipeline(config: &CliConfig) -> anyhow::Result<(Pipeline, Arc<JsonMetadataStore>)> {
    for root in [&config.install_root, &config.library_root] {
        std::fs::create_dir_all(root)
            .with_context(|| format!("creating {}", root.display()))?;
    }

    let metadata = Arc::new(JsonMetadataStore::load(&config.metadata_path)?);
    let collaborators = Collaborators {
        metadata: metadata.clone(),
        transport: Arc::new(HttpTransport::new()?),
        archive: Arc::new(ZipArchiveReader::new()),
    };
    let pipeline = Pipeline::new(
        &config.pipeline_config(),
        SignatureCatalog::builtin(),
        collaborators,
    )?;
    Ok((pipeline, metadata))
}
