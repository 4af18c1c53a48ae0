//! Boxer ISO
//!
//! Command-line inspector for ISO 9660 and BIN/CUE disc images.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Error};
use clap::{Parser, Subcommand};

use boxer_iso::disc::bincue::{bin_path_in_cue, raw_paths_in_cue, resource_paths_in_cue};
use boxer_iso::disc::{EnumerationOptions, FileEntry, Filesystem, IsoImage};
use boxer_iso::stream::IoAdapter;
use boxer_iso::ReaderConfig;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file (default: boxer-iso.json if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show volume information
    Info {
        /// Disc image (.iso, .cdr, .bin, .cue)
        image: PathBuf,
    },
    /// List a directory
    Ls {
        image: PathBuf,
        #[arg(default_value = "/")]
        path: String,
        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
        /// Include hidden entries
        #[arg(long)]
        hidden: bool,
    },
    /// Write a file's contents to stdout
    Cat { image: PathBuf, path: String },
    /// Show the files a cue sheet refers to
    Cue { cue: PathBuf },
}

fn main() -> Result<(), Error> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ReaderConfig::load_from_path(path)
            .with_context(|| format!("error loading config {}", path.display()))?,
        None => ReaderConfig::load(),
    };

    match cli.command {
        Command::Info { image } => info(&open(&image, &config)?),
        Command::Ls {
            image,
            path,
            recursive,
            hidden,
        } => list(&open(&image, &config)?, &path, recursive, hidden),
        Command::Cat { image, path } => cat(&open(&image, &config)?, &path),
        Command::Cue { cue } => cue_info(&cue),
    }
}

fn open(path: &Path, config: &ReaderConfig) -> Result<IsoImage, Error> {
    IsoImage::open_with_config(path, config)
        .with_context(|| format!("error opening image {}", path.display()))
}

fn info(image: &IsoImage) -> Result<(), Error> {
    let pvd = image.volume_descriptor();
    println!("Volume:       {}", image.volume_name());
    println!("Layout:       {}", image.layout());
    println!("Block size:   {}", image.logical_block_size());
    println!("Blocks:       {}", pvd.volume_space_size);

    let identifiers = [
        ("System", &pvd.system_id),
        ("Volume set", &pvd.volume_set_id),
        ("Publisher", &pvd.publisher_id),
        ("Preparer", &pvd.preparer_id),
        ("Application", &pvd.application_id),
    ];
    for (label, value) in identifiers {
        if !value.is_empty() {
            println!("{:<13} {}", format!("{}:", label), value);
        }
    }
    if let Some(date) = pvd.creation_date {
        println!("Created:      {}", date.to_rfc3339());
    }
    if let Some(date) = pvd.modification_date {
        println!("Modified:     {}", date.to_rfc3339());
    }
    Ok(())
}

fn print_entry(entry: &FileEntry, name: &str, indent: usize) {
    let date = entry
        .creation_date()
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    let marker = if entry.is_directory() { "/" } else { "" };
    println!(
        "{:>10} {:16} {}{}{}",
        entry.size_string(),
        date,
        "  ".repeat(indent),
        name,
        marker
    );
}

fn list(image: &IsoImage, path: &str, recursive: bool, hidden: bool) -> Result<(), Error> {
    if !recursive {
        let entries = image
            .list_directory(path)
            .with_context(|| format!("error listing {}", path))?;
        for entry in entries.iter().filter(|e| hidden || !e.is_hidden()) {
            print_entry(entry, entry.file_name(), 0);
        }
        return Ok(());
    }

    let options = EnumerationOptions { show_hidden: hidden };
    for item in image.enumerate_with(path, options)? {
        let item = item.with_context(|| format!("error walking {}", path))?;
        print_entry(&item.entry, item.entry.file_name(), item.level - 1);
    }
    Ok(())
}

fn cat(image: &IsoImage, path: &str) -> Result<(), Error> {
    let handle = image
        .open_file(path)
        .with_context(|| format!("error opening {}", path))?;
    let mut stdout = io::stdout().lock();
    io::copy(&mut IoAdapter(handle), &mut stdout).with_context(|| format!("error reading {}", path))?;
    stdout.flush()?;
    Ok(())
}

fn cue_info(cue: &Path) -> Result<(), Error> {
    let raw = raw_paths_in_cue(cue).with_context(|| format!("error reading {}", cue.display()))?;
    let resolved = resource_paths_in_cue(cue)?;

    for (raw, resolved) in raw.iter().zip(&resolved) {
        let status = if resolved.exists() { "" } else { " (missing)" };
        println!("{} -> {}{}", raw, resolved.display(), status);
    }

    match bin_path_in_cue(cue) {
        Ok(bin) => println!("Data image: {}", bin.display()),
        Err(e) => println!("Data image: none ({})", e),
    }
    Ok(())
}
