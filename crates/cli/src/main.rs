use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use h264enc::{
    EncodeStream, EncoderConfig, EncoderRegistry, EncoderSession, PixelFormat, TimeBase,
};
use image::{DynamicImage, Rgba, RgbaImage};
use tracing_subscriber::EnvFilter;

/// Colours cycled through when no input images are given, one per second.
const SYNTHETIC_COLOURS: [[u8; 3]; 6] = [
    [255, 0, 0],
    [0, 0, 255],
    [0, 255, 0],
    [255, 255, 0],
    [255, 0, 255],
    [0, 255, 255],
];

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Yuv420p,
    Yuv444p,
}

impl From<Format> for PixelFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Yuv420p => PixelFormat::Yuv420p,
            Format::Yuv444p => PixelFormat::Yuv444p,
        }
    }
}

#[derive(Parser)]
#[command(name = "h264enc", about = "Encode images to an H.264 Annex-B stream")]
struct Args {
    /// PNG frames, encoded in order. Without any, solid colour frames are generated.
    inputs: Vec<PathBuf>,

    /// Output file (Annex-B byte stream)
    #[arg(long, short, default_value = "out.h264")]
    output: PathBuf,

    /// Frame width for generated frames
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Frame height for generated frames
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Frames per second (time base 1/fps)
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Force a key frame every N frames
    #[arg(long)]
    keyint: Option<u32>,

    /// Number of frames to encode; inputs are repeated to fill it
    #[arg(long, short = 'n')]
    frames: Option<usize>,

    /// Encoder name (default: first available)
    #[arg(long, short)]
    encoder: Option<String>,

    #[arg(long, value_enum, default_value = "yuv420p")]
    pixel_format: Format,

    /// Backend option as key=value (repeatable), e.g. preset=ultrafast
    #[arg(long = "option", short = 'O', value_parser = parse_key_val)]
    options: Vec<(String, String)>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{s}`"))?;
    Ok((key.to_string(), value.to_string()))
}

fn load_inputs(paths: &[PathBuf]) -> anyhow::Result<Vec<DynamicImage>> {
    paths
        .iter()
        .map(|path| image::open(path).with_context(|| format!("cannot read {}", path.display())))
        .collect()
}

fn synthetic_frame(width: u32, height: u32, index: usize, fps: u32) -> DynamicImage {
    let [r, g, b] = SYNTHETIC_COLOURS[(index / fps.max(1) as usize) % SYNTHETIC_COLOURS.len()];
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255])))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive("info".parse()?)
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();
    let inputs = load_inputs(&args.inputs)?;

    let (width, height) = match inputs.first() {
        Some(first) => (first.width(), first.height()),
        None => (args.width, args.height),
    };
    let frames = args.frames.unwrap_or(if inputs.is_empty() {
        args.fps as usize * SYNTHETIC_COLOURS.len()
    } else {
        inputs.len()
    });

    let mut config = EncoderConfig::new(width, height)
        .pixel_format(args.pixel_format.into())
        .time_base(TimeBase::from_fps(args.fps));
    if let Some(keyint) = args.keyint {
        config = config.key_frame_interval(keyint);
    }
    if let Some(name) = &args.encoder {
        config = config.encoder(name.clone());
    }
    config.options = args.options;

    let registry = EncoderRegistry::with_defaults();
    if registry.is_empty() {
        bail!("no H.264 encoder available (build with the `ffmpeg` feature)");
    }
    tracing::info!(encoders = ?registry.names(), "encoders available");

    let mut session = EncoderSession::open(config, &registry)?;

    let file = File::create(&args.output)
        .with_context(|| format!("cannot create {}", args.output.display()))?;
    let mut out = BufWriter::new(file);

    let source = (0..frames).map(|i| {
        if inputs.is_empty() {
            synthetic_frame(width, height, i, args.fps)
        } else {
            inputs[i % inputs.len()].clone()
        }
    });

    let mut stream = EncodeStream::new(&mut session, source).flush_at_end(true);
    for chunk in &mut stream {
        match chunk {
            Ok(bytes) => out.write_all(&bytes)?,
            Err(err) if err.is_recoverable() => {
                tracing::warn!(error = %err, stage = %err.stage(), "frame skipped");
            }
            Err(err) => return Err(err.into()),
        }
    }
    out.flush()?;

    let stats = session.stats();
    tracing::info!(
        output = %args.output.display(),
        frames = stats.frames_submitted,
        packets = stats.packets,
        bytes = stats.bytes,
        key_frames = stats.key_frames,
        "encoding finished"
    );
    if let Some(sprop) = session.parameter_sets().sprop_parameter_sets() {
        tracing::info!(%sprop, fmtp = %session.parameter_sets().fmtp(96), "parameter sets");
    }

    session.close();
    Ok(())
}
