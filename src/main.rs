use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::info;

use framescroll::canvas::{RenderOutcome, Viewport};
use framescroll::config;
use framescroll::error::FrameError;
use framescroll::player::Player;
use framescroll::source::open_source;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("FRAMESCROLL_BUILD_GIT_HASH"),
    " ",
    env!("FRAMESCROLL_BUILD_PROFILE"),
    ")"
);

#[derive(Parser)]
#[command(
    name = "framescroll",
    version = VERSION,
    about = "Scroll-synchronized frame-sequence player for modern terminals"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file (default: $XDG_CONFIG_HOME/framescroll/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output file path (enables logging in viewer mode)
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    /// Frame directory or base URL
    #[arg(long, global = true)]
    frames: Option<String>,

    /// Frame filename prefix
    #[arg(long, global = true)]
    prefix: Option<String>,

    /// Frame filename extension, including the dot
    #[arg(long, global = true)]
    extension: Option<String>,

    /// Zero-padding width of the frame number
    #[arg(long, global = true)]
    pad: Option<usize>,

    /// Number of frames in the sequence
    #[arg(long, global = true)]
    total: Option<u32>,

    /// Fraction of the remaining distance covered per tick, in (0, 1)
    #[arg(long, global = true)]
    damping: Option<f64>,
}

#[derive(Subcommand)]
enum Command {
    /// Render the frame at a scroll position to PNG
    Render {
        /// Scroll progress through the tracked region, 0.0..=1.0
        #[arg(long, default_value_t = 0.0)]
        progress: f64,

        /// Viewport size in logical pixels, WIDTHxHEIGHT
        #[arg(long, default_value = "1280x720")]
        size: String,

        /// Device pixel ratio (overrides render.device_pixel_ratio)
        #[arg(long)]
        dpr: Option<f64>,

        /// Output PNG file
        #[arg(short, long, default_value = "frame.png")]
        output: PathBuf,

        /// Seconds to wait for frames to load
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Some(log_path) = &cli.log {
        let file = match fs::File::create(log_path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("Error: failed to open log file {}: {e}", log_path.display());
                std::process::exit(1);
            }
        };
        env_logger::Builder::from_default_env()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    } else if cli.command.is_some() {
        env_logger::init();
    }
    // viewer mode + no --log → logger not initialized (stdout is the UI)

    let overrides = config::CliOverrides {
        frames: cli.frames.clone(),
        prefix: cli.prefix.clone(),
        extension: cli.extension.clone(),
        pad: cli.pad,
        total: cli.total,
        damping: cli.damping,
    };

    let result = config::load_config(cli.config.as_deref())
        .and_then(|mut cfg| {
            cfg.merge_cli(&overrides);
            cfg.resolve()
        })
        .and_then(|config| match cli.command {
            Some(Command::Render {
                progress,
                size,
                dpr,
                output,
                timeout,
            }) => cmd_render(
                &config,
                &RenderArgs {
                    progress,
                    size,
                    dpr,
                    output,
                    timeout: Duration::from_secs(timeout),
                },
            ),
            None => framescroll::viewer::run(config),
        });

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

struct RenderArgs {
    progress: f64,
    size: String,
    dpr: Option<f64>,
    output: PathBuf,
    timeout: Duration,
}

fn cmd_render(config: &config::Config, args: &RenderArgs) -> Result<()> {
    let start = Instant::now();

    if !(0.0..=1.0).contains(&args.progress) {
        bail!("--progress must be within 0.0..=1.0 (got {})", args.progress);
    }
    let (width, height) = parse_size(&args.size)?;
    let device_pixel_ratio = args.dpr.unwrap_or(config.render.device_pixel_ratio);
    if device_pixel_ratio.is_nan() || device_pixel_ratio <= 0.0 {
        bail!("--dpr must be > 0 (got {device_pixel_ratio})");
    }
    let viewport = Viewport {
        width,
        height,
        device_pixel_ratio,
    };

    let source = open_source(&config.frames);
    let mut player = Player::mount(config, source, viewport)?;
    if !player.wait_until_loaded(args.timeout) {
        bail!("timed out waiting for the initial frames");
    }

    player.seek_progress(args.progress);
    player.snap_to_target();
    let frame = player.state().animation.display_frame();
    if !player.wait_for_frame(frame, args.timeout) {
        bail!(
            "frame {frame} could not be loaded from {}",
            config.frames.address_for(frame)
        );
    }

    let drawn = match player.render_current() {
        RenderOutcome::Drawn(index) | RenderOutcome::Unchanged(index) => index,
        RenderOutcome::NoTarget => return Err(FrameError::MissingRenderTarget.into()),
        RenderOutcome::Skipped => bail!("frame {frame} is not cached"),
    };
    let png = player.canvas().encode_png()?;
    fs::write(&args.output, &png)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    let scene = player
        .active_scene()
        .map(|s| format!(", scene {} \"{}\"", s.id, s.title))
        .unwrap_or_default();
    player.teardown();

    info!(
        "cmd_render: completed in {:.1}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );
    eprintln!(
        "rendered frame {drawn}/{}{scene} -> {} ({} bytes)",
        config.frames.total,
        args.output.display(),
        png.len()
    );
    Ok(())
}

/// Parse `WIDTHxHEIGHT` into logical pixel dimensions.
fn parse_size(s: &str) -> Result<(f64, f64)> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .with_context(|| format!("invalid size '{s}', expected WIDTHxHEIGHT"))?;
    let w: f64 = w
        .trim()
        .parse()
        .with_context(|| format!("invalid width in '{s}'"))?;
    let h: f64 = h
        .trim()
        .parse()
        .with_context(|| format!("invalid height in '{s}'"))?;
    if w.is_nan() || h.is_nan() || w <= 0.0 || h <= 0.0 {
        bail!("size must be positive (got {s})");
    }
    Ok((w, h))
}
