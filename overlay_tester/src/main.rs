use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use spray_overlay::config::parse_size;
use spray_overlay::{CameraSettings, LogNotifier, OverlayController, RtspSettings, ViewerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Headless host for the sprayer overlay: snapshots the live canvas and drives
/// the backend's control endpoints.
#[derive(Debug, Parser)]
#[command(name = "overlay_tester", version)]
struct Cli {
    /// Backend base URL; overrides the config file and SPRAY_BACKEND_URL.
    #[arg(long, global = true)]
    backend: Option<String>,

    /// JSON config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Canvas size as WIDTHxHEIGHT.
    #[arg(long, global = true, value_parser = parse_canvas)]
    canvas: Option<(u32, u32)>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Mount the overlay and write canvas snapshots as PNG files.
    Watch {
        #[arg(long, default_value_t = 5)]
        snapshots: u32,
        #[arg(long, default_value_t = 1000)]
        every_ms: u64,
        #[arg(long, default_value = "snapshots")]
        out: PathBuf,
    },
    /// Replay a press/release pair in canvas pixels and save the line.
    SaveLine {
        #[arg(long, value_parser = parse_point)]
        from: (f64, f64),
        #[arg(long, value_parser = parse_point)]
        to: (f64, f64),
    },
    /// Set the sprayer device address.
    SetIp { ip: String },
    Start,
    Stop,
    SprayTest,
    /// Switch the backend's camera source.
    SetCamera {
        #[command(subcommand)]
        source: CameraSource,
    },
}

#[derive(Debug, Subcommand)]
enum CameraSource {
    Usb {
        #[arg(long, default_value = "/dev/video0")]
        device: String,
    },
    Rtsp {
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "")]
        username: String,
        #[arg(long, default_value = "")]
        password: String,
    },
}

fn parse_canvas(value: &str) -> Result<(u32, u32), String> {
    parse_size(value).ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{value}`"))
}

fn parse_point(value: &str) -> Result<(f64, f64), String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got `{value}`"))?;
    let x = x.trim().parse().map_err(|_| format!("bad x in `{value}`"))?;
    let y = y.trim().parse().map_err(|_| format!("bad y in `{value}`"))?;
    Ok((x, y))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,spray_overlay=debug")),
        )
        .init();

    let cli = Cli::parse();

    // --- 1. Configuration ---
    let mut config = ViewerConfig::load(cli.config.as_deref()).context("loading viewer config")?;
    if let Some(backend) = cli.backend {
        config.backend_url = backend;
    }
    if let Some((w, h)) = cli.canvas {
        config.canvas_width = w;
        config.canvas_height = h;
    }
    if !matches!(cli.command, Command::Watch { .. }) {
        config.stream_enabled = false;
    }

    let mut controller = OverlayController::new(config, Arc::new(LogNotifier)).context("creating overlay controller")?;

    // --- 2. Command ---
    match cli.command {
        Command::Watch { snapshots, every_ms, out } => {
            watch(&mut controller, snapshots, Duration::from_millis(every_ms), out).await?
        }
        Command::SaveLine { from, to } => {
            controller.pointer_down(from.0, from.1);
            controller.pointer_up(to.0, to.1);
            controller.save_line().await?;
        }
        Command::SetIp { ip } => {
            controller.save_device_address(&ip).await?;
        }
        Command::Start => controller.start_detection().await?,
        Command::Stop => controller.stop_detection().await?,
        Command::SprayTest => controller.spray_test().await?,
        Command::SetCamera { source } => {
            let camera = match source {
                CameraSource::Usb { device } => CameraSettings::Usb { device },
                CameraSource::Rtsp { url, username, password } => CameraSettings::Rtsp {
                    rtsp: RtspSettings { url, username, password },
                },
            };
            controller.set_camera(&camera).await?;
        }
    }

    if let Some(status) = controller.status() {
        println!("{}", status.text);
    }
    Ok(())
}

async fn watch(controller: &mut OverlayController, snapshots: u32, every: Duration, out: PathBuf) -> anyhow::Result<()> {
    if snapshots == 0 {
        bail!("--snapshots must be at least 1");
    }
    std::fs::create_dir_all(&out).with_context(|| format!("creating {}", out.display()))?;

    controller.mount().await;
    let canvas = controller.subscribe_canvas();
    let mut ticker = tokio::time::interval(every);
    let mut written = 0;

    for index in 0..snapshots {
        ticker.tick().await;
        let boxes = controller.detections().len();
        let status = controller.status().map(|s| s.text).unwrap_or_default();

        let frame = canvas.borrow().clone();
        match frame {
            Some(image) => {
                let path = out.join(format!("canvas_{index:04}.png"));
                image.save(&path).with_context(|| format!("writing {}", path.display()))?;
                written += 1;
                info!(path = %path.display(), boxes, status = %status, "snapshot written");
            }
            None => info!(boxes, "no frame from stream yet"),
        }
    }

    controller.unmount().await;
    println!("Snapshots complete. {written} written to {}", out.display());
    Ok(())
}
