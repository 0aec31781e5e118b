//! PermaKV CLI
//!
//! Inspect and maintain string maps stored by PermaKV.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use permakv::{Codecs, Compression, FileGroup, Options, ReadOnlyPerma, Result, WritablePerma};
use tracing_subscriber::{fmt, EnvFilter};

/// PermaKV CLI
#[derive(Parser, Debug)]
#[command(name = "permakv-cli")]
#[command(about = "CLI for PermaKV persistent maps")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Location of one logical map
#[derive(Args, Debug)]
struct MapArgs {
    /// Directory holding the map files
    dir: PathBuf,

    /// Logical map name
    name: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the full file and delta chain of a map
    List {
        #[command(flatten)]
        map: MapArgs,
    },

    /// Print all entries of a string map
    Dump {
        #[command(flatten)]
        map: MapArgs,
    },

    /// Collapse full file and deltas into a new full file
    Compact {
        #[command(flatten)]
        map: MapArgs,

        /// Compress the new full file with zstd
        #[arg(long)]
        zstd: bool,
    },

    /// Remove temp files left behind by interrupted writes
    Clean {
        #[command(flatten)]
        map: MapArgs,
    },

    /// Set a key in a string map and persist it
    Put {
        #[command(flatten)]
        map: MapArgs,

        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key from a string map and persist it
    Del {
        #[command(flatten)]
        map: MapArgs,

        /// The key to delete
        key: String,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,permakv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!("PermaKV CLI v{}", permakv::VERSION);

    if let Err(e) = run(cli.command) {
        tracing::error!("Command failed: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::List { map } => {
            let files = FileGroup::list(&map.dir, &map.name)?;
            if !files.exists() {
                println!("(no files)");
                return Ok(());
            }
            println!("{}", files.full_file()?.file_name());
            for delta in files.delta_files() {
                println!("{}", delta.file_name());
            }
        }

        Commands::Dump { map } => {
            let perma = ReadOnlyPerma::load_string_map(&map.dir, &map.name)?;
            for (key, value) in perma.map().iter() {
                println!("{}={}", key, value);
            }
        }

        Commands::Compact { map, zstd } => {
            let compression = if zstd { Compression::Zstd } else { Compression::None };
            let options = Options::builder().compression(compression).build();
            let perma = open_writable(&map, options)?;
            perma.compact()?;
            tracing::info!(map = %map.name, "Compaction finished");
        }

        Commands::Clean { map } => {
            let removed = FileGroup::list(&map.dir, &map.name)?.delete_stale_temp_files()?;
            println!("removed {} temp file(s)", removed);
        }

        Commands::Put { map, key, value } => {
            let perma = open_writable(&map, Options::default())?;
            perma.insert(key, value);
            perma.persist()?;
        }

        Commands::Del { map, key } => {
            let perma = open_writable(&map, Options::default())?;
            if perma.remove(&key).is_none() {
                println!("(not found)");
                return Ok(());
            }
            perma.persist()?;
        }
    }
    Ok(())
}

fn open_writable(map: &MapArgs, options: Options) -> Result<WritablePerma<String, String>> {
    WritablePerma::load_with_options(&map.dir, &map.name, options, Codecs::strings())
}
