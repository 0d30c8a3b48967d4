//! regionstore CLI
//!
//! Inspect and maintain region container files.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use regionstore::storage::{rebuild, RegionChunkIterator};
use regionstore::{RegionAddress, RegionConfig, RegionFile, SlotIndex};
use tracing_subscriber::{fmt, EnvFilter};

/// regionstore CLI
#[derive(Parser, Debug)]
#[command(name = "regionstore-cli")]
#[command(about = "Inspect and maintain region container files")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show space usage of a region file
    Info {
        /// Region file
        file: PathBuf,
    },

    /// List occupied slots in on-disk order
    List {
        /// Region file
        file: PathBuf,

        /// Region coordinates "X,Z" to print world chunk coordinates
        #[arg(short, long, value_parser = parse_region)]
        region: Option<RegionAddress>,
    },

    /// Compact a region file in place
    Optimize {
        /// Region file
        file: PathBuf,
    },

    /// Rewrite a region file into a fresh, gap-free copy
    Rebuild {
        /// Source region file
        src: PathBuf,

        /// Destination region file
        dst: PathBuf,
    },

    /// Remove one slot by local coordinates
    Remove {
        /// Region file
        file: PathBuf,

        /// Local x in [0, 31]
        x: i32,

        /// Local z in [0, 31]
        z: i32,
    },
}

fn parse_region(value: &str) -> Result<RegionAddress, String> {
    let (x, z) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Z, got '{}'", value))?;
    let x = x.trim().parse().map_err(|e| format!("bad region x: {}", e))?;
    let z = z.trim().parse().map_err(|e| format!("bad region z: {}", e))?;
    Ok(RegionAddress::new(x, z))
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,regionstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args.command) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> regionstore::Result<()> {
    match command {
        Commands::Info { file } => {
            let mut region = RegionFile::open_with(&file, RegionConfig::read_only())?;
            let stats = region.stats()?;
            println!("file:           {}", file.display());
            println!("length:         {} bytes", stats.file_len);
            println!("occupied slots: {}", stats.occupied_slots);
            println!("used sectors:   {}", stats.used_sectors);
            println!("free sectors:   {} in {} blocks", stats.free_sectors, stats.free_blocks);
            println!("append cursor:  {}", stats.append_cursor);
            region.close()
        }

        Commands::List { file, region } => {
            let chunks = RegionChunkIterator::open(&file)?;
            for entry in chunks.entries() {
                let coords = match region {
                    Some(address) => {
                        let (cx, cz) = address.chunk_at(entry.index);
                        format!("chunk ({}, {})", cx, cz)
                    }
                    None => format!("local ({}, {})", entry.index.local_x(), entry.index.local_z()),
                };
                println!(
                    "slot {:4}  {}  sector {:6} x{:<3}  timestamp {}",
                    entry.index.get(),
                    coords,
                    entry.sector.start,
                    entry.sector.count,
                    entry.timestamp
                );
            }
            println!("{} occupied slots", chunks.len());
            Ok(())
        }

        Commands::Optimize { file } => {
            let mut region = RegionFile::open_with(
                &file,
                RegionConfig::builder().create_if_missing(false).build(),
            )?;
            let reclaimed = region.optimize()?;
            region.close()?;
            println!("reclaimed {} bytes", reclaimed);
            Ok(())
        }

        Commands::Rebuild { src, dst } => {
            let summary = rebuild(&src, &dst)?;
            println!(
                "wrote {} slots in {} sectors",
                summary.slots_written, summary.sectors_written
            );
            Ok(())
        }

        Commands::Remove { file, x, z } => {
            let slot = SlotIndex::from_local(x, z)?;
            let mut region = RegionFile::open_with(
                &file,
                RegionConfig::builder().create_if_missing(false).build(),
            )?;
            let removed = region.remove(slot)?;
            region.close()?;
            println!("{}", if removed { "removed" } else { "slot was empty" });
            Ok(())
        }
    }
}
