//! vmdktool - bidirectional converter/inspector for stream-optimized VMDK
//! sparse disk images.
//!
//! This binary is the external collaborator `vmdk-core` defers to
//! (`spec.md` §1): argument parsing, capacity size-string parsing, mode
//! selection, and human-readable printing of metadata all live here, never
//! in the core crate.

mod size;

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Seek, SeekFrom};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand};

use vmdk_core::diagnostics::Diagnostics;
use vmdk_core::sector::{self, SECTOR_SIZE};
use vmdk_core::vmdk::format::{GdOffset, Header, MarkerType};
use vmdk_core::vmdk::inspector::{self, InspectOptions, TableKind};
use vmdk_core::vmdk::writer::{self, WriterOptions};
use vmdk_core::vmdk::{random, stream_reader};
use vmdk_core::Error;

/// Minimum bytes needed to even attempt reading a header + descriptor sector.
const MIN_INSPECTABLE_SIZE: u64 = SECTOR_SIZE * 2;

#[derive(Parser)]
#[command(name = "vmdktool")]
#[command(version, about = "Convert between raw disk images and stream-optimized VMDK", long_about = None)]
struct Cli {
    /// Increase diagnostic verbosity; repeat for per-sector tracing (-d -d).
    #[arg(short = 'd', long = "diagnostics", action = ArgAction::Count, global = true)]
    diagnostics: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show header and descriptor metadata for a VMDK file.
    Info {
        /// Path to the VMDK file.
        file: PathBuf,
        /// Also dump the grain table sectors starting at this raw sector.
        #[arg(long = "table", value_name = "SECTOR")]
        table: Option<u64>,
    },
    /// Reconstruct a raw image from a VMDK via the grain directory (random access).
    ExtractRandom {
        /// Path to the VMDK file.
        file: PathBuf,
        /// Path to write the reconstructed raw image to.
        output: PathBuf,
    },
    /// Reconstruct a raw image from a VMDK by walking it as a forward marker stream.
    ExtractStream {
        /// Path to the VMDK file.
        file: PathBuf,
        /// Path to write the reconstructed raw image to.
        output: PathBuf,
    },
    /// Convert a raw disk image into a stream-optimized VMDK.
    Write {
        /// Path to the raw disk image.
        file: PathBuf,
        /// Path to write the VMDK to.
        output: PathBuf,
        /// Disk capacity to declare (e.g. "10G", "2048s"); defaults to the input's size.
        #[arg(short = 'c', long = "capacity", value_name = "SIZE")]
        capacity: Option<String>,
        /// DEFLATE compression strength, 0 (none) through 9 (best).
        #[arg(short = 'z', long = "deflate-strength", value_name = "0-9", default_value_t = 6)]
        deflate_strength: u32,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut diag = Diagnostics::new(cli.diagnostics);

    let result = match cli.command {
        Commands::Info { file, table } => cmd_info(&file, table, &mut diag),
        Commands::ExtractRandom { file, output } => cmd_extract_random(&file, &output, &mut diag),
        Commands::ExtractStream { file, output } => cmd_extract_stream(&file, &output, &mut diag),
        Commands::Write {
            file,
            output,
            capacity,
            deflate_strength,
        } => cmd_write(&file, &output, capacity.as_deref(), deflate_strength, &mut diag),
    };

    print_warnings(&diag);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("vmdktool: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn print_warnings(diag: &Diagnostics) {
    for warning in &diag.warnings {
        eprintln!("warning: {warning}");
    }
}

/// Map a top-level failure to a distinct process exit code, matching the
/// spread of failure kinds `spec.md` §6 calls out (usage, open/stat
/// failures, too-small input, bad magic, missing footer, not
/// stream-optimized, unsupported compression).
fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<Error>() {
        Some(Error::FileTooSmall { .. }) => 5,
        Some(Error::BadMagic { .. }) => 6,
        Some(Error::BadFooter { .. }) => 8,
        Some(Error::NotStreamOptimized) => 10,
        Some(Error::UnsupportedCompression { .. }) => 13,
        Some(Error::CorruptGrain { .. }) => 14,
        Some(Error::Io { .. }) => 3,
        None => 1,
    }
}

/// Open a VMDK and resolve its header, chasing the footer if `gdOffset` is
/// the sentinel. Returns the reader (positioned after the descriptor) plus
/// the full inspection.
fn inspect_file(
    path: &PathBuf,
    diag: &mut Diagnostics,
) -> anyhow::Result<(BufReader<File>, inspector::Inspection)> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let input_len = file.metadata()?.len();
    if input_len < MIN_INSPECTABLE_SIZE {
        return Err(Error::FileTooSmall {
            needed: MIN_INSPECTABLE_SIZE,
            got: input_len,
        }
        .into());
    }

    let mut reader = BufReader::new(file);
    let inspection = inspector::inspect(
        &mut reader,
        diag,
        InspectOptions {
            allow_footer_search: true,
            input_len,
        },
    )?;

    if diag.traced() {
        print_inspection(&inspection.header, &inspection.descriptor_text, inspection.stream_optimized);
    }

    Ok((reader, inspection))
}

fn cmd_info(path: &PathBuf, table: Option<u64>, diag: &mut Diagnostics) -> anyhow::Result<()> {
    let (mut reader, inspection) = inspect_file(path, diag)?;

    if !diag.traced() {
        print_inspection(&inspection.header, &inspection.descriptor_text, inspection.stream_optimized);
    }

    if diag.traced() {
        if let Some(gd_sector) = inspection.header.gd_offset.sector() {
            println!();
            print_table(&mut reader, gd_sector, TableKind::GrainDirectory, &inspection.header)?;
        }
    }

    if let Some(sector) = table {
        println!();
        print_table(&mut reader, sector, TableKind::GrainTable, &inspection.header)?;
    }

    Ok(())
}

fn print_inspection(header: &Header, descriptor_text: &str, stream_optimized: bool) {
    println!("version: {}", header.version);

    let mut flags = Vec::new();
    if header.newline_detect_valid() {
        flags.push("valid NL detect".to_string());
    }
    if header.has_redundant_grain_table() {
        flags.push(format!("redundant grain table [0x{:x}]", header.rgd_offset));
    }
    if header.zero_grain_gte_valid() {
        flags.push("zero-grain GTE".to_string());
    }
    if header.is_compressed() {
        let algo = match header.compress_algorithm {
            vmdk_core::vmdk::format::COMPRESSION_NONE => "NONE".to_string(),
            vmdk_core::vmdk::format::COMPRESSION_DEFLATE => "DEFLATE".to_string(),
            other => format!("0x{other:02x}"),
        };
        flags.push(format!("compressed grains [{algo}]"));
    }
    if header.has_markers() {
        flags.push("markers present".to_string());
    }
    println!("flags: 0x{:08x}", header.flags);
    if !flags.is_empty() {
        println!("       {}", flags.join(", "));
    }

    println!(
        "capacity: 0x{:08x} sectors ({} GiB)",
        header.capacity,
        header.capacity / 2_097_152
    );
    println!(
        "grainSize: 0x{:08x} sectors ({} KiB)",
        header.grain_size,
        header.grain_size / 2
    );
    println!("descriptorOffset: 0x{:08x}", header.descriptor_offset);
    println!("descriptorSize: 0x{:08x} sectors", header.descriptor_size);
    println!("numGTEsPerGT: {}", header.num_gtes_per_gt);
    match header.gd_offset {
        GdOffset::InFooter => println!("gdOffset: set at end"),
        GdOffset::Known(sector) => println!("gdOffset: 0x{sector:08x} [0x{:x}]", sector * SECTOR_SIZE),
    }
    println!(
        "overHead: 0x{:08x} sectors ({} KiB)",
        header.overhead,
        header.overhead / 2
    );
    println!("shutdown: {}", if header.unclean_shutdown { "UNCLEAN" } else { "CLEAN" });
    println!("streamOptimized: {stream_optimized}");
    println!();
    println!("{descriptor_text}");
}

fn print_table<R: std::io::Read + Seek>(
    reader: &mut R,
    start_sector: u64,
    kind: TableKind,
    header: &Header,
) -> anyhow::Result<()> {
    let label = match kind {
        TableKind::GrainDirectory => "DIR",
        TableKind::GrainTable => "TBL",
    };
    let entries = inspector::dump_table(reader, start_sector, kind, header)?;
    println!("type GRAIN {label}, {} entries", entries.len());
    for chunk in entries.chunks(8) {
        let line: Vec<String> = chunk.iter().map(|e| format!("{e:08x}")).collect();
        println!("    {}", line.join(" "));
    }
    Ok(())
}

fn cmd_extract_random(file: &PathBuf, output: &PathBuf, diag: &mut Diagnostics) -> anyhow::Result<()> {
    let (mut reader, inspection) = inspect_file(file, diag)?;
    let header = inspection.header;

    let out_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(output)
        .with_context(|| format!("creating {}", output.display()))?;
    let mut out = BufWriter::new(out_file);

    random::extract(&mut reader, &header, &mut out, diag)?;
    out.flush()?;
    let out_file = out.into_inner().map_err(|e| anyhow::anyhow!("{}", e.into_error()))?;
    sector::set_output_size(&out_file, header.capacity_bytes())?;

    Ok(())
}

fn cmd_extract_stream(file: &PathBuf, output: &PathBuf, diag: &mut Diagnostics) -> anyhow::Result<()> {
    let (mut reader, inspection) = inspect_file(file, diag)?;

    if !inspection.stream_optimized {
        return Err(Error::NotStreamOptimized.into());
    }

    let mut header = inspection.header;

    if header.is_compressed() {
        match header.compress_algorithm {
            vmdk_core::vmdk::format::COMPRESSION_NONE | vmdk_core::vmdk::format::COMPRESSION_DEFLATE => {}
            other => {
                return Err(Error::UnsupportedCompression { algorithm: other }.into());
            }
        }
    }

    reader.seek(SeekFrom::Start(header.overhead * SECTOR_SIZE))?;

    let out_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(output)
        .with_context(|| format!("creating {}", output.display()))?;
    let mut out = BufWriter::new(out_file);

    stream_reader::extract(&mut reader, &mut header, &mut out, diag)?;
    out.flush()?;
    let out_file = out.into_inner().map_err(|e| anyhow::anyhow!("{}", e.into_error()))?;
    sector::set_output_size(&out_file, header.capacity_bytes())?;

    Ok(())
}

fn cmd_write(
    file: &PathBuf,
    output: &PathBuf,
    capacity: Option<&str>,
    deflate_strength: u32,
    diag: &mut Diagnostics,
) -> anyhow::Result<()> {
    if deflate_strength > 9 {
        bail!("deflate strength must be 0-9, got {deflate_strength}");
    }

    let capacity_bytes = capacity.map(size::parse_size).transpose()?;

    let in_file = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let input_len = in_file.metadata()?.len();
    if input_len < SECTOR_SIZE {
        return Err(Error::FileTooSmall {
            needed: SECTOR_SIZE,
            got: input_len,
        }
        .into());
    }
    let mut reader = BufReader::new(in_file);

    let out_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(output)
        .with_context(|| format!("creating {}", output.display()))?;
    let mut out = BufWriter::new(out_file);

    let opts = WriterOptions {
        capacity_bytes,
        deflate_level: deflate_strength,
    };
    let header = writer::write_stream_optimized(&mut reader, &mut out, opts, diag)?;
    out.flush()?;

    if diag.traced() {
        println!(
            "wrote {} ({} sectors, {} KiB grains)",
            output.display(),
            header.capacity,
            header.grain_bytes() / 1024
        );
    }

    Ok(())
}
