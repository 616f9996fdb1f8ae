//! `score2music` command line.

use clap::{ArgAction, CommandFactory, Parser, ValueEnum};
use score2music::export::DEFAULT_BITRATE_KBPS;
use score2music::synth::SoundFontSystem;
use score2music::{
    Ffmpeg, FluidSynth, InstrumentRequest, MuseScoreConverter, Pipeline, PipelineBuilder,
    Result, GM_PROGRAM_NAMES,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "score2music", version)]
#[command(about = "Render a music score to MP3/AAC through a SoundFont")]
struct Cli {
    /// Score file (.musicxml, .xml, .mxl, .mscz, .mscx, .mid, .midi).
    /// With --list-instruments, a SoundFont whose presets to list.
    #[arg(value_name = "SCORE")]
    score: Option<PathBuf>,

    /// SoundFont 2 file to render with.
    #[arg(value_name = "SOUNDFONT")]
    soundfont: Option<PathBuf>,

    /// Output file (.mp3, .m4a, .aac).
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// MIDI program, or a comma-separated list with one entry per instrument.
    #[arg(short, long, value_name = "LIST", default_value = "0")]
    instrument: String,

    /// Print the General MIDI program table (or a SoundFont's presets) and exit.
    #[arg(long)]
    list_instruments: bool,

    /// Print the instrument assignment as JSON and exit without rendering.
    #[arg(long)]
    plan: bool,

    /// Synthesizer backend.
    #[arg(long, value_enum, default_value_t = SynthBackend::Fluidsynth)]
    synth: SynthBackend,

    #[arg(long, value_name = "HZ", default_value_t = 44100)]
    sample_rate: u32,

    /// Per-tool deadline for MuseScore, FluidSynth and ffmpeg.
    #[arg(long, value_name = "SECS", default_value_t = 600)]
    timeout: u64,

    /// Instruments rendered in parallel. Defaults to one per core.
    #[arg(long, value_name = "N")]
    jobs: Option<usize>,

    /// Play every note at one velocity, ignoring dynamics (64 unless given as
    /// `--uniform-velocity=N`).
    #[arg(
        long,
        value_name = "VELOCITY",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "64"
    )]
    uniform_velocity: Option<u8>,

    /// Encoder bitrate in kbit/s.
    #[arg(long, value_name = "KBPS", default_value_t = DEFAULT_BITRATE_KBPS)]
    bitrate: u32,

    /// Skip checking the SoundFont for the requested programs.
    #[arg(long)]
    no_verify_presets: bool,

    /// MuseScore executable.
    #[arg(long, value_name = "PATH", env = "SCORE2MUSIC_MSCORE")]
    mscore: Option<PathBuf>,

    /// FluidSynth executable.
    #[arg(long, value_name = "PATH", env = "SCORE2MUSIC_FLUIDSYNTH")]
    fluidsynth: Option<PathBuf>,

    /// ffmpeg executable.
    #[arg(long, value_name = "PATH", env = "SCORE2MUSIC_FFMPEG")]
    ffmpeg: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SynthBackend {
    /// The `fluidsynth` executable.
    Fluidsynth,
    /// In-process RustySynth.
    Builtin,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(kind = ?e.kind(), "{}", e);
            eprintln!("score2music: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn run(cli: Cli) -> Result<()> {
    if cli.list_instruments {
        return list_instruments(cli.score.as_deref());
    }

    // Before touching any file.
    let request: InstrumentRequest = cli.instrument.parse()?;

    let score = required(cli.score.as_ref(), "SCORE");
    let pipeline = build_pipeline(&cli)?;

    if cli.plan {
        let plan = pipeline.plan(score, &request)?;
        let json = serde_json::to_string_pretty(&plan).map_err(std::io::Error::from)?;
        println!("{}", json);
        return Ok(());
    }

    let soundfont = required(cli.soundfont.as_ref(), "SOUNDFONT");
    let output = required(cli.output.as_ref(), "OUTPUT");

    let report = pipeline.render(score, soundfont, &request, output)?;
    println!(
        "{}: {} instrument(s) [{}], {:.1}s, {} in {:.1}s",
        report.output.display(),
        report.tracks,
        request,
        report.duration_seconds,
        report.format,
        report.elapsed.as_secs_f64()
    );
    Ok(())
}

fn build_pipeline(cli: &Cli) -> Result<Pipeline> {
    let timeout = Duration::from_secs(cli.timeout);

    let mut converter = MuseScoreConverter::new().timeout(timeout);
    if let Some(program) = &cli.mscore {
        converter = converter.with_program(program);
    }

    let mut encoder = Ffmpeg::new().bitrate(cli.bitrate).timeout(timeout);
    if let Some(program) = &cli.ffmpeg {
        encoder = encoder.with_program(program);
    }

    let mut builder = PipelineBuilder::default()
        .sample_rate(cli.sample_rate)
        .tool_timeout(timeout)
        .verify_presets(!cli.no_verify_presets)
        .converter(converter)
        .encoder(encoder);

    if let Some(jobs) = cli.jobs {
        builder = builder.jobs(jobs);
    }
    if let Some(velocity) = cli.uniform_velocity {
        builder = builder.velocity_override(velocity);
    }

    builder = match cli.synth {
        SynthBackend::Builtin => builder.builtin_synthesizer(),
        SynthBackend::Fluidsynth => {
            let mut fluidsynth = FluidSynth::new().timeout(timeout);
            if let Some(program) = &cli.fluidsynth {
                fluidsynth = fluidsynth.with_program(program);
            }
            builder.synthesizer(fluidsynth)
        }
    };

    builder.build()
}

fn list_instruments(soundfont: Option<&std::path::Path>) -> Result<()> {
    match soundfont {
        Some(path) => {
            let presets = SoundFontSystem::new().presets(path)?;
            for preset in presets {
                println!("{:03}:{:03} {}", preset.bank, preset.program, preset.name);
            }
        }
        None => {
            for (program, name) in GM_PROGRAM_NAMES.iter().enumerate() {
                println!("{:3} {}", program, name);
            }
        }
    }
    Ok(())
}

/// Positionals are optional for `--list-instruments`; report a missing one
/// the way clap would.
fn required<'a>(value: Option<&'a PathBuf>, name: &str) -> &'a std::path::Path {
    match value {
        Some(path) => path,
        None => Cli::command()
            .error(
                clap::error::ErrorKind::MissingRequiredArgument,
                format!("the <{}> argument is required", name),
            )
            .exit(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["score2music", "a.mxl", "gm.sf2", "out.mp3"]).unwrap();
        assert_eq!(cli.instrument, "0");
        assert_eq!(cli.synth, SynthBackend::Fluidsynth);
        assert_eq!(cli.sample_rate, 44100);
        assert_eq!(cli.uniform_velocity, None);
        assert!(!cli.no_verify_presets);
    }

    #[test]
    fn test_uniform_velocity_without_value() {
        let cli = Cli::try_parse_from([
            "score2music",
            "--uniform-velocity",
            "-i",
            "40,41",
            "a.mxl",
            "gm.sf2",
            "out.mp3",
        ])
        .unwrap();
        assert_eq!(cli.uniform_velocity, Some(64));
        assert_eq!(cli.instrument, "40,41");
    }

    #[test]
    fn test_bare_uniform_velocity_leaves_positionals_alone() {
        let cli = Cli::try_parse_from([
            "score2music",
            "--uniform-velocity",
            "a.mxl",
            "gm.sf2",
            "out.mp3",
        ])
        .unwrap();
        assert_eq!(cli.uniform_velocity, Some(64));
        assert_eq!(cli.score.as_deref(), Some(std::path::Path::new("a.mxl")));
        assert_eq!(cli.output.as_deref(), Some(std::path::Path::new("out.mp3")));
    }

    #[test]
    fn test_uniform_velocity_with_value() {
        let cli = Cli::try_parse_from([
            "score2music",
            "--uniform-velocity=80",
            "a.mxl",
            "gm.sf2",
            "out.mp3",
        ])
        .unwrap();
        assert_eq!(cli.uniform_velocity, Some(80));
    }

    #[test]
    fn test_bad_program_is_invalid_program() {
        let cli = Cli::try_parse_from(["score2music", "-i", "200", "missing.mxl", "x.sf2", "o.mp3"])
            .unwrap();
        let err = run(cli).unwrap_err();
        assert_eq!(err.exit_code(), 14);
    }
}
