use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use framing::config::DEFAULT_DECODER_BUFFER_SIZE;
use framing::media::h264::{self, BitstreamAssembler, BitstreamBuffer};
use framing::media::speech::SpeechProfile;
use framing::media::toc::{self, DemuxStatus, TocEntry};
use framing::media::amr::AmrMode;
use framing::media::{amr, g729};

#[derive(Parser)]
#[command(
    name = "framing-inspect",
    about = "Inspect and reframe captured codec payloads"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the coding units in a raw H.264 encoder output dump
    Units { file: PathBuf },
    /// Rebuild a decoder-ready escaped bitstream from an encoder output dump
    Annexb {
        input: PathBuf,
        output: PathBuf,
        /// Bitstream buffer capacity in bytes
        #[arg(long, default_value_t = DEFAULT_DECODER_BUFFER_SIZE)]
        capacity: usize,
    },
    /// Demultiplex one aggregate speech payload
    Toc {
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = Codec::Amr)]
        codec: Codec,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Codec {
    Amr,
    G729,
}

impl Codec {
    fn profile(self) -> &'static SpeechProfile {
        match self {
            Codec::Amr => &amr::PROFILE,
            Codec::G729 => &g729::PROFILE,
        }
    }
}

fn read(path: &Path) -> Result<Vec<u8>, String> {
    fs::read(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))
}

fn list_units(file: &Path) -> Result<(), String> {
    let data = read(file)?;
    let units = h264::split_encoder_output(&data);
    for (i, unit) in units.iter().enumerate() {
        let kind = unit.parameter_set().map_or("", |k| k.name());
        println!(
            "{:4}  type {:2}  {:6} bytes  {}",
            i,
            unit.unit_type().unwrap_or_default(),
            unit.len(),
            kind
        );
    }
    println!("{} units", units.len());
    Ok(())
}

fn rebuild_annexb(input: &Path, output: &Path, capacity: usize) -> Result<(), String> {
    let data = read(input)?;
    let mut units = h264::split_encoder_output(&data);
    let mut buffer = BitstreamBuffer::with_capacity(capacity);
    let au = BitstreamAssembler::new()
        .assemble(&mut units, &mut buffer)
        .map_err(|e| e.to_string())?;

    fs::write(output, buffer.as_bytes())
        .map_err(|e| format!("failed to write {}: {}", output.display(), e))?;
    println!(
        "{} units, {} bytes written to {}",
        au.units,
        au.size,
        output.display()
    );
    Ok(())
}

fn inspect_toc(file: &Path, codec: Codec) -> Result<(), String> {
    let profile = codec.profile();
    let data = read(file)?;
    let out = toc::demux(&data, profile.frame_sizes).map_err(|e| e.to_string())?;

    for (i, frame) in out.frames.iter().enumerate() {
        let entry = TocEntry::new(frame[0]);
        let rate = match codec {
            Codec::Amr => AmrMode::from_index(entry.mode())
                .map(|m| format!("{:.2} kbit/s", m.bitrate() as f32 / 1000.0))
                .unwrap_or_else(|| "SID".to_string()),
            Codec::G729 => String::new(),
        };
        println!(
            "{:4}  mode {:2}  {:3} bytes  {}",
            i,
            entry.mode(),
            frame.len() - 1,
            rate
        );
    }
    match out.status {
        DemuxStatus::Complete => println!("{}: {} frames", profile.name, out.frames.len()),
        DemuxStatus::Truncated {
            entry,
            needed,
            remaining,
        } => println!(
            "{}: truncated at entry {} ({} bytes needed, {} left)",
            profile.name, entry, needed, remaining
        ),
        DemuxStatus::InvalidMode { entry, mode } => {
            println!("{}: invalid mode {} at entry {}", profile.name, mode, entry)
        }
    }

    let samples = out.frames.len() * profile.samples_per_frame;
    tracing::debug!(samples, clock_rate = profile.clock_rate, "payload duration");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let result = match &args.command {
        Command::Units { file } => list_units(file),
        Command::Annexb {
            input,
            output,
            capacity,
        } => rebuild_annexb(input, output, *capacity),
        Command::Toc { file, codec } => inspect_toc(file, *codec),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
