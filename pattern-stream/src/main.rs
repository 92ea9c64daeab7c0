//! Streams a moving test pattern through a [`Streamer`] into a loopback client.
//!
//! Useful for checking encoder throughput and frame-drop behaviour without a
//! real renderer or network transport.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{debug, info, warn};

use framecast_engine::encoder::FrameBuffer;
use framecast_engine::{
    AsynchronousInputProcessor, ChannelClient, ClientOutput, InputHandler, Streamer,
    StreamerConfig,
};
use framecast_events::{
    Codec, CodecOptions, Event, MouseAction, MouseButton, MouseButtons, MouseInput,
};

#[derive(Parser, Debug)]
#[command(name = "pattern-stream")]
#[command(about = "Stream a generated test pattern through the encoding pipeline")]
struct Args {
    /// Frame width in pixels.
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Frame height in pixels.
    #[arg(long, default_value_t = 360)]
    height: u32,

    /// Frames per second to produce.
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Codec requested by the loopback client.
    #[arg(long, value_enum, default_value_t = CodecArg::Raw)]
    codec: CodecArg,

    /// Seconds to run for.
    #[arg(long, default_value_t = 10)]
    duration: u64,

    /// Streamer configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CodecArg {
    Raw,
    H264,
}

impl From<CodecArg> for Codec {
    fn from(arg: CodecArg) -> Self {
        match arg {
            CodecArg::Raw => Codec::Raw,
            CodecArg::H264 => Codec::H264,
        }
    }
}

/// Logs forwarded input at info level.
struct LoggingInput;

impl InputHandler for LoggingInput {
    fn process_mouse_input(&self, event: &MouseInput) {
        info!(%event, "Mouse input");
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => StreamerConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => StreamerConfig::default(),
    };

    info!(
        width = args.width,
        height = args.height,
        fps = args.fps,
        codec = ?args.codec,
        "Starting pattern stream"
    );

    let streamer = Streamer::new(config).context("starting streamer")?;
    info!(config = %streamer.stream_config_json()?, "Stream configuration");
    streamer.register_input_processor(Arc::new(AsynchronousInputProcessor::new(LoggingInput)));

    let (sink, sink_rx) = ChannelClient::new(16);
    streamer.insert_client(sink.clone());

    let codec = Codec::from(args.codec);
    let options = match codec {
        Codec::Raw => CodecOptions::new(),
        Codec::H264 => CodecOptions::new()
            .with("width", i64::from(args.width))
            .with("height", i64::from(args.height))
            .with("framerate", i64::from(args.fps)),
    };
    for event in [
        Event::Play,
        Event::AcquireInput,
        Event::ChangeCodec { codec, options },
    ] {
        sink.receive_bytes(&event.to_bytes()?);
    }

    let frame_interval = Duration::from_nanos(1_000_000_000 / u64::from(args.fps.max(1)));
    let run_for = Duration::from_secs(args.duration);
    let frame_size = FrameBuffer::size_for(args.width, args.height)
        .with_context(|| format!("{}x{} frame is too large", args.width, args.height))?;
    let mut pixels = vec![0u8; frame_size];

    let start = Instant::now();
    let mut next_frame = start;
    let mut last_log_time = start;
    let mut frame_index: u64 = 0;
    let mut received_frames: u64 = 0;
    let mut received_bytes: u64 = 0;

    while start.elapsed() < run_for {
        render_pattern(&mut pixels, args.width, args.height, frame_index);
        if let Err(e) = streamer.push_frame(args.width, args.height, &pixels, false) {
            warn!(error = %e, "Frame rejected");
        }

        if frame_index % u64::from(args.fps.max(1)) == 0 {
            let t = (frame_index as f64 / 100.0).fract();
            let mouse = MouseInput::new(
                MouseAction::Move,
                MouseButton::Primary,
                MouseButtons::empty(),
                t,
                1.0 - t,
            );
            sink.receive_bytes(&Event::MouseInput(mouse).to_bytes()?);
        }
        frame_index += 1;

        for output in sink_rx.try_iter() {
            match output {
                ClientOutput::Frame(packet) => {
                    received_frames += 1;
                    received_bytes += packet.data.len() as u64;
                }
                ClientOutput::CodecSwitched { codec, options } => {
                    info!(%codec, %options, "Loopback client switched codec");
                }
                ClientOutput::Event(event) => debug!(%event, "Loopback client event"),
            }
        }

        if last_log_time.elapsed() >= Duration::from_secs(5) {
            let stats = streamer.stats();
            info!(
                pushed = stats.frames_pushed,
                published = stats.frames_published,
                dropped = stats.frames_dropped,
                encoded = stats.frames_encoded,
                failures = stats.encode_failures,
                received_frames,
                received_kb = received_bytes / 1024,
                "Stream stats"
            );
            for encoder in streamer.encoders() {
                info!(
                    codec = %encoder.codec,
                    name = encoder.name,
                    clients = encoder.clients,
                    options = %encoder.options,
                    "Encoder"
                );
            }
            last_log_time = Instant::now();
        }

        next_frame += frame_interval;
        let now = Instant::now();
        if next_frame > now {
            thread::sleep(next_frame - now);
        } else {
            next_frame = now;
        }
    }

    sink.disconnect();
    info!(frames = frame_index, received_frames, "Pattern stream finished");
    Ok(())
}

/// Diagonal colour gradient scrolling one pixel per frame.
fn render_pattern(pixels: &mut [u8], width: u32, height: u32, frame_index: u64) {
    let Some(stride) = FrameBuffer::stride_for(width).filter(|&stride| stride > 0) else {
        return;
    };
    let shift = frame_index as usize;

    for (y, row) in pixels.chunks_exact_mut(stride).take(height as usize).enumerate() {
        for x in 0..width as usize {
            let offset = x * 3;
            let phase = x + y + shift;
            row[offset] = (phase % 256) as u8;
            row[offset + 1] = ((x * 255) / width.max(1) as usize) as u8;
            row[offset + 2] = ((y * 255) / height.max(1) as usize) as u8;
        }
    }
}
