use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pitchtrack::{JsonLinesSource, Pipeline, TrackerConfig, TrackerSession};

#[derive(Parser)]
#[command(
    name = "pitchtrack",
    about = "Track players across frames from per-frame detections",
    version
)]
struct Args {
    /// Detections file, one JSON object per frame
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write tracks (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Tracker configuration JSON
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Frames a confirmed track survives without a match
    #[arg(long)]
    max_age: Option<u32>,

    /// Matches needed to confirm a track
    #[arg(long)]
    n_init: Option<u32>,

    /// Drop detections scoring below this
    #[arg(long)]
    conf_threshold: Option<f32>,

    /// Largest pair cost accepted as a match
    #[arg(long)]
    cost_gate: Option<f64>,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Keep unmatched boxes where they were instead of predicting them forward
    #[arg(long)]
    no_motion: bool,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pitchtrack=info"));

    // logs go to stderr so stdout stays clean for track output
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(io::stderr))
            .with(env_filter)
            .init();
    }
}

fn load_config(args: &Args) -> anyhow::Result<TrackerConfig> {
    let mut cfg = match &args.config {
        Some(path) => TrackerConfig::from_file(path)?,
        None => TrackerConfig::default(),
    };
    if let Some(v) = args.max_age {
        cfg.max_age = v;
    }
    if let Some(v) = args.n_init {
        cfg.n_init = v;
    }
    if let Some(v) = args.conf_threshold {
        cfg.confidence_threshold = v;
    }
    if let Some(v) = args.cost_gate {
        cfg.cost_gate = v;
    }
    if args.no_motion {
        cfg.motion_model = false;
    }
    Ok(cfg)
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let cfg = load_config(&args)?;
    let session = TrackerSession::new(cfg).context("invalid tracker configuration")?;
    let source = JsonLinesSource::open(&args.input)?;

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut writer = BufWriter::new(sink);

    let mut pipeline = Pipeline::new(source, session);
    info!(
        input = %args.input.display(),
        config = ?pipeline.session().config(),
        "tracking"
    );
    let stats = pipeline.run(args.max_frames, |result| {
        serde_json::to_writer(&mut writer, result)?;
        writeln!(writer)?;
        Ok(())
    })?;
    writer.flush()?;

    info!(
        frames = stats.frames,
        total_ids = pipeline.session().total_tracks_created(),
        confirmed_ids = stats.unique_ids,
        peak_confirmed = stats.peak_confirmed,
        "done"
    );
    Ok(())
}
