use clap::{Parser, Subcommand};
use discfile::{ChunkType, DiscFile, DiscFileError, OptionValue, SectionType};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "discdump", about = "Inspect discfile containers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the format generation and a structure summary
    Info {
        input: PathBuf,
    },
    /// List every section and chunk of a sectioned file
    Sections {
        input: PathBuf,
        /// Print the structure report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Decode the option records of one chunk
    Options {
        input: PathBuf,
        #[arg(short, long)]
        section: String,
        #[arg(short, long)]
        chunk: String,
        /// Which instance of a repeatable section (0 = first)
        #[arg(short, long, default_value = "0")]
        instance: usize,
    },
    /// Hex dump the payload of one chunk
    Chunk {
        input: PathBuf,
        #[arg(short, long)]
        section: String,
        #[arg(short, long)]
        chunk: String,
        #[arg(short, long, default_value = "0")]
        instance: usize,
    },
    /// List the positional sections of a legacy file
    Legacy {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let mut file = DiscFile::open(&input);
            println!("── discfile ─────────────────────────────────────────────");
            println!("  Path           {}", input.display());
            match file.format() {
                Some(format) => println!("  Format         {format:?}"),
                None         => println!("  Format         unrecognised"),
            }
            if let Some(report) = file.structure() {
                let chunks: usize = report.sections.iter().map(|s| s.chunks.len()).sum();
                println!("  Size           {} B", report.file_len);
                println!("  Sections       {}", report.sections.len());
                println!("  Chunks         {chunks}");
                for kind in SectionType::ALL {
                    let count = report.sections_of(kind).count();
                    if count > 0 {
                        println!("    {:<12} {count}", kind.name());
                    }
                }
            }
            if let Some(report) = file.legacy_structure() {
                println!("  Size           {} B", report.file_len);
                println!("  Sections       {}", report.sections.len());
            }
            file.close()?;
        }

        // ── Sections ─────────────────────────────────────────────────────────
        Commands::Sections { input, json } => {
            let mut file = DiscFile::open(&input);
            if let Some(report) = file.structure() {
                if json {
                    println!("{}", serde_json::to_string_pretty(report)?);
                } else {
                    println!("{:>10} {:<12} {:>8}  Multiple", "Offset", "Section", "Size");
                    for s in &report.sections {
                        println!("{:>10} {:<12} {:>8}  {}", s.offset, s.kind.name(), s.size, s.multiple);
                        for c in &s.chunks {
                            println!("{:>10}   {:<10} {:>8}", c.offset, c.kind.name(), c.size);
                        }
                    }
                }
            } else if file.legacy_structure().is_some() {
                eprintln!("{} is a legacy file; use `discdump legacy`", input.display());
            }
            file.close()?;
        }

        // ── Options ──────────────────────────────────────────────────────────
        Commands::Options { input, section, chunk, instance } => {
            let mut file = DiscFile::open(&input);
            if open_chunk(&mut file, &section, &chunk, instance)? {
                for entry in file.options().unwrap_or_default() {
                    println!("{:>10}  {:<3}  {:<14} {}",
                        entry.offset, entry.tag, entry.value.kind().name(), render(&entry.value));
                }
            }
            file.close()?;
        }

        // ── Chunk ────────────────────────────────────────────────────────────
        Commands::Chunk { input, section, chunk, instance } => {
            let mut file = DiscFile::open(&input);
            if open_chunk(&mut file, &section, &chunk, instance)? {
                let mut payload = vec![0u8; file.chunk_size() as usize];
                if file.read_raw(&mut payload) {
                    for (i, line) in payload.chunks(16).enumerate() {
                        println!("{:08x}  {}", i * 16, hex::encode(line));
                    }
                }
            }
            file.close()?;
        }

        // ── Legacy ───────────────────────────────────────────────────────────
        Commands::Legacy { input, json } => {
            let mut file = DiscFile::open(&input);
            if let Some(report) = file.legacy_structure() {
                if json {
                    println!("{}", serde_json::to_string_pretty(report)?);
                } else {
                    println!("{:>5} {:>10} {:>8}", "#", "Offset", "Size");
                    for (i, s) in report.sections.iter().enumerate() {
                        println!("{:>5} {:>10} {:>8}", i, s.offset, s.size);
                    }
                }
            }
            file.close()?;
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

/// Navigate to `instance` of `section`, then to `chunk` inside it.
fn open_chunk(file: &mut DiscFile, section: &str, chunk: &str, instance: usize) -> Result<bool, DiscFileError> {
    let section_type = SectionType::from_name(section)
        .ok_or_else(|| DiscFileError::Caller(format!("unknown section type '{section}'")))?;
    let chunk_type = ChunkType::from_name(chunk)
        .ok_or_else(|| DiscFileError::Caller(format!("unknown chunk type '{chunk}'")))?;

    for _ in 0..instance {
        if !file.open_section(section_type) {
            eprintln!("fewer than {} {section} sections", instance + 1);
            return Ok(false);
        }
        file.close_section();
    }
    if !file.open_section(section_type) {
        eprintln!("no {section} section found");
        return Ok(false);
    }
    if !file.open_chunk(chunk_type) {
        eprintln!("no {chunk} chunk in that section");
        return Ok(false);
    }
    Ok(true)
}

fn render(value: &OptionValue) -> String {
    match value {
        OptionValue::Boolean(b)       => b.to_string(),
        OptionValue::Unsigned(v)      => v.to_string(),
        OptionValue::String(s)        => format!("{s:?}"),
        OptionValue::Date(d)          => d
            .to_datetime()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| format!("{} cs", d.centiseconds())),
        OptionValue::UnsignedArray(v) => format!("{v:?}"),
    }
}
