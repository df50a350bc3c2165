mod scenario;

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use glam::Vec3;

use rubberband::{AxisMask, CompressionMode, PacketLossSimulation, SyncConfig};
use scenario::{Scenario, ScenarioConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Compression {
    None,
    Some,
    Much,
    Lots,
}

impl From<Compression> for CompressionMode {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => CompressionMode::None,
            Compression::Some => CompressionMode::Some,
            Compression::Much => CompressionMode::Much,
            Compression::Lots => CompressionMode::Lots,
        }
    }
}

fn parse_axes(value: &str) -> Result<AxisMask, String> {
    let mut mask = AxisMask::empty();
    for c in value.chars() {
        mask |= match c.to_ascii_lowercase() {
            'x' => AxisMask::X,
            'y' => AxisMask::Y,
            'z' => AxisMask::Z,
            other => return Err(format!("unknown axis '{other}', expected a mix of x, y and z")),
        };
    }
    Ok(mask)
}

#[derive(Parser)]
#[command(name = "rubberband-sim")]
#[command(about = "Headless owner, server and observer over simulated links")]
struct Args {
    #[arg(short, long, value_enum, default_value = "much")]
    compression: Compression,

    #[arg(short, long, value_parser = parse_axes, default_value = "xyz", help = "Synced rotation axes")]
    axes: AxisMask,

    #[arg(long, default_value_t = rubberband::DEFAULT_SEND_INTERVAL, help = "Seconds between owner updates")]
    send_interval: f32,

    #[arg(long, default_value_t = rubberband::DEFAULT_RUBBERBAND_DISTANCE)]
    rubberband_distance: f32,

    #[arg(short, long, default_value_t = 60)]
    tick_rate: u32,

    #[arg(short, long, default_value_t = 10.0, help = "Simulated seconds")]
    duration: f32,

    #[arg(long, default_value_t = 8.0)]
    radius: f32,

    #[arg(long, default_value_t = 5.0)]
    speed: f32,

    #[arg(long, default_value_t = 0.0, help = "Downlink packet loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, default_value_t = 0, help = "Minimum latency in ms")]
    min_latency: u32,

    #[arg(long, default_value_t = 0, help = "Maximum latency in ms")]
    max_latency: u32,

    #[arg(long, default_value_t = 0, help = "Jitter in ms")]
    jitter: u32,

    #[arg(long, default_value_t = 1)]
    seed: u64,

    #[arg(long, help = "Move the player on the server at this time (seconds)")]
    teleport_at: Option<f32>,

    #[arg(long, default_value_t = 20.0)]
    teleport_distance: f32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.tick_rate == 0 {
        bail!("tick rate must be positive");
    }
    if !(0.0..=100.0).contains(&args.loss_percent) {
        bail!("loss percentage {} is outside 0-100", args.loss_percent);
    }

    let sync = SyncConfig {
        compression: args.compression.into(),
        axes: args.axes,
        send_interval: args.send_interval,
        rubberband_distance: args.rubberband_distance,
        ..Default::default()
    };
    let link = |loss_percent| PacketLossSimulation {
        enabled: true,
        loss_percent,
        min_latency_ms: args.min_latency,
        max_latency_ms: args.max_latency.max(args.min_latency),
        jitter_ms: args.jitter,
    };

    let config = ScenarioConfig {
        tick_rate: args.tick_rate,
        duration: args.duration,
        radius: args.radius,
        speed: args.speed,
        // owner updates are reliable, so only latency applies upstream
        uplink: link(0.0),
        downlink: link(args.loss_percent),
        seed: args.seed,
        teleport_at: args.teleport_at,
        teleport_offset: Vec3::new(0.0, 0.0, args.teleport_distance),
        sync,
    };

    log::info!(
        "simulating {:.1}s at {} Hz, {:?} compression on {:?}, {} byte payloads",
        config.duration,
        config.tick_rate,
        config.sync.compression,
        config.sync.axes,
        config.sync.wire_format().payload_len()
    );

    let mut scenario = Scenario::new(config)?;
    let report = scenario.run()?;

    log::info!(
        "{} frames, drift max {:.3} mean {:.3} final {:.3}",
        report.frames,
        report.max_drift,
        report.mean_drift,
        report.final_drift
    );
    log::info!(
        "{} snaps, {} rubberbands, {} forced corrections, {} packets ignored, {} rejected",
        report.snaps,
        report.rubberbands,
        report.forced,
        report.ignored,
        report.rejected
    );
    log::info!(
        "uplink {} bytes ({:.1}% lost), downlink {} bytes ({:.1}% lost)",
        report.uplink_bytes,
        report.uplink_loss,
        report.downlink_bytes,
        report.downlink_loss
    );

    Ok(())
}
