// Romcomp - A resource compiler for banked cartridge ROM images
// Copyright (C) 2026  Marcel Joachim Kloubert <marcel@kloubert.dev>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Romcomp CLI
//!
//! Extracts, edits and repacks the resources of banked cartridge ROM images.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use romcomp::codec::sixbit::{pack, unpack, CharTable};
use romcomp::codec::rle;
use romcomp::error::{format_error, ErrorCode, RomError};
use romcomp::{extract, repack, Edits, Layout, RomImage};

/// Romcomp - A resource compiler for banked cartridge ROM images
#[derive(Parser, Debug)]
#[command(name = "romcomp")]
#[command(author = "Romcomp Team")]
#[command(version)]
#[command(about = "A resource compiler for banked cartridge ROM images")]
#[command(long_about = r#"
Romcomp extracts the text and data resources of a banked cartridge ROM,
lets you edit them as TOML, and packs them back into the space the game
reserves for them. Identical resources are stored once.

Example usage:
  romcomp extract game.nes -l text -o text.toml
  romcomp repack game.nes -l text -e text.toml -o game-edited.nes
  romcomp repack game.nes -l text -l map-data-rle --allow-expand

Codecs on their own:
  romcomp rle encode map.bin -o map.rle
  romcomp text pack "HELLO~"
"#)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run-length encode or decode a file
    Rle {
        #[command(subcommand)]
        action: RleAction,
    },

    /// Pack or unpack six-bit text
    Text {
        #[command(subcommand)]
        action: TextAction,
    },

    /// List the built-in layouts
    Layouts {
        /// Print the TOML of one preset
        #[arg(long, value_name = "NAME")]
        show: Option<String>,
    },

    /// Decode a layout's resources into an edits file
    Extract {
        /// ROM image (.nes)
        rom: PathBuf,

        /// Preset name or layout file
        #[arg(short, long)]
        layout: String,

        /// Edits file to write; printed when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Apply edits and pack resources back into the ROM
    Repack {
        /// ROM image (.nes)
        rom: PathBuf,

        /// Preset names or layout files, run in order
        #[arg(short, long = "layout", required = true)]
        layouts: Vec<String>,

        /// Edits files; later files override earlier ones
        #[arg(short, long)]
        edits: Vec<PathBuf>,

        /// Output image; the input is overwritten when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Allow a region to grow into its reserved overflow space
        #[arg(long)]
        allow_expand: bool,
    },
}

#[derive(Subcommand, Debug)]
enum RleAction {
    /// Compress a file
    Encode {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Decompress a file
    Decode {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum TextAction {
    /// Print the packed bytes of a text as hex
    Pack { text: String },
    /// Print the text packed in a hex string
    Unpack { hex: String },
}

/// Why a command failed; decides the exit code.
enum Failure {
    /// Malformed arguments.
    Usage(String),
    /// An input could not be read.
    Input(RomError),
    /// The operation itself failed.
    Operation(RomError),
}

impl From<RomError> for Failure {
    fn from(error: RomError) -> Self {
        if error.code == ErrorCode::Io {
            Failure::Input(error)
        } else {
            Failure::Operation(error)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Command::Rle { action } => run_rle(action),
        Command::Text { action } => run_text(action),
        Command::Layouts { show } => run_layouts(show.as_deref()),
        Command::Extract {
            rom,
            layout,
            output,
        } => run_extract(&rom, &layout, output.as_deref()),
        Command::Repack {
            rom,
            layouts,
            edits,
            output,
            allow_expand,
        } => run_repack(&rom, &layouts, &edits, output.as_deref(), allow_expand),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failure::Usage(message)) => {
            eprintln!("Error: {}", message);
            ExitCode::from(2)
        }
        Err(Failure::Input(e)) => {
            eprint!("{}", format_error(&e));
            ExitCode::from(3)
        }
        Err(Failure::Operation(e)) => {
            eprint!("{}", format_error(&e));
            ExitCode::from(1)
        }
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>, Failure> {
    std::fs::read(path).map_err(|e| {
        Failure::Input(RomError::new(
            ErrorCode::Io,
            format!("cannot read {}: {}", path.display(), e),
        ))
    })
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), Failure> {
    std::fs::write(path, bytes).map_err(|e| {
        Failure::Operation(RomError::new(
            ErrorCode::Io,
            format!("cannot write {}: {}", path.display(), e),
        ))
    })
}

fn run_rle(action: RleAction) -> Result<(), Failure> {
    match action {
        RleAction::Encode { input, output } => {
            let data = read_input(&input)?;
            let encoded = rle::encode(&data);
            write_output(&output, &encoded)?;
            println!(
                "Encoded {} -> {} ({} -> {} bytes)",
                input.display(),
                output.display(),
                data.len(),
                encoded.len()
            );
        }
        RleAction::Decode { input, output } => {
            let data = read_input(&input)?;
            let decoded = rle::decode(&data);
            let bytes = decoded.content.as_bytes().unwrap_or_default();
            write_output(&output, bytes)?;
            println!(
                "Decoded {} -> {} ({} -> {} bytes)",
                input.display(),
                output.display(),
                decoded.consumed,
                bytes.len()
            );
        }
    }
    Ok(())
}

fn run_text(action: TextAction) -> Result<(), Failure> {
    let table = CharTable::standard();
    match action {
        TextAction::Pack { text } => {
            println!("{}", hex::encode(pack(&text, &table)));
        }
        TextAction::Unpack { hex } => {
            let bytes = hex::decode(hex.trim())
                .map_err(|e| Failure::Usage(format!("'{}' is not a hex string: {}", hex, e)))?;
            let decoded = unpack(&bytes, &table);
            println!("{}", decoded.content.as_text().unwrap_or_default());
        }
    }
    Ok(())
}

fn run_layouts(show: Option<&str>) -> Result<(), Failure> {
    if let Some(name) = show {
        // Parsing first reports unknown names with the list of presets.
        Layout::preset(name)?;
        print!("{}", Layout::preset_source(name).unwrap_or_default());
        return Ok(());
    }

    for name in Layout::preset_names() {
        let layout = Layout::preset(name)?;
        let kind = if layout.codec.is_text() { "text" } else { "bytes" };
        println!("{:<16} {:<6} {}", name, kind, layout.description);
    }
    Ok(())
}

fn run_extract(rom_path: &Path, layout: &str, output: Option<&Path>) -> Result<(), Failure> {
    let rom = RomImage::load(rom_path)?;
    let layout = Layout::resolve(layout)?;

    let extraction = extract(&rom, &layout)?;
    let edits = Edits::from_extraction(&extraction);
    let text = edits.to_toml()?;

    match output {
        Some(path) => {
            write_output(path, text.as_bytes())?;
            eprintln!(
                "Extracted {} resources from {} -> {}",
                edits.len(),
                rom_path.display(),
                path.display()
            );
        }
        None => print!("{}", text),
    }

    if !extraction.diagnostics.is_empty() {
        eprintln!("{} warnings while decoding", extraction.diagnostics.len());
    }
    Ok(())
}

fn run_repack(
    rom_path: &Path,
    layout_names: &[String],
    edits_paths: &[PathBuf],
    output: Option<&Path>,
    allow_expand: bool,
) -> Result<(), Failure> {
    let mut rom = RomImage::load(rom_path)?;
    let layouts = layout_names
        .iter()
        .map(|name| Layout::resolve(name))
        .collect::<romcomp::Result<Vec<_>>>()?;

    let mut edits = Edits::default();
    for path in edits_paths {
        edits.merge(Edits::load(path)?);
    }
    edits.check_tables(&layouts)?;

    for layout in &layouts {
        let mut extraction = extract(&rom, layout)?;
        edits.apply(&mut extraction)?;

        let report = repack(&mut rom, layout, &extraction, |relaxation| {
            if allow_expand {
                log::info!(
                    "expanding region '{}' to ${:04X}",
                    relaxation.region,
                    relaxation.end
                );
            }
            allow_expand
        })?;
        print!("{}", report);
    }

    let output = output.unwrap_or(rom_path);
    rom.save(output).map_err(Failure::Operation)?;
    println!("Wrote {}", output.display());
    Ok(())
}
