use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use pvwatch::{
    ChannelEmitter, Monitor, MonitorConfig, MonitorEvent, ReplaySource, ReportEmitter,
    TracingEmitter,
};

#[derive(Parser, Debug)]
#[command(name = "pvwatch")]
#[command(about = "Detect frozen and disconnected process variables")]
struct Args {
    /// Replay recording (JSON) to use as the data source
    #[arg(short, long)]
    replay: PathBuf,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only monitor PVs starting with this prefix (e.g. "SI-01C1")
    #[arg(short, long)]
    prefix: Option<String>,

    /// Only monitor PVs ending with this suffix (e.g. "Temp-Mon")
    #[arg(short, long)]
    suffix: Option<String>,

    /// Seconds between check cycles
    #[arg(short, long)]
    interval: Option<u64>,

    /// Stop after this many check cycles
    #[arg(long)]
    cycles: Option<u64>,

    /// Emit logs as newline-delimited JSON
    #[arg(long)]
    json_logs: bool,

    /// Print each check report as JSON on stdout
    #[arg(long)]
    json_reports: bool,
}

fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let mut config =
        MonitorConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if args.prefix.is_some() {
        config.filter_prefix = args.prefix;
    }
    if args.suffix.is_some() {
        config.filter_suffix = args.suffix;
    }
    if let Some(interval) = args.interval {
        config.check_interval_secs = interval;
    }

    let source = Arc::new(
        ReplaySource::load(&args.replay)
            .with_context(|| format!("failed to load {}", args.replay.display()))?,
    );
    info!(events = source.event_count(), "loaded replay recording");

    let (emitter, mut events) = ChannelEmitter::create();
    let monitor = Monitor::builder()
        .config(config)
        .source(source.clone())
        .emitter(Arc::new(emitter))
        .build()?;

    let handle = monitor.start()?;
    let replay = source.start_replay();
    let log = TracingEmitter;
    let mut completed = 0u64;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    MonitorEvent::Progress(p) => log.on_progress(p),
                    MonitorEvent::Status(s) => log.on_status(&s),
                    MonitorEvent::MonitoredList(names) => log.on_monitored_list(&names),
                    MonitorEvent::FrozenList(names) => log.on_frozen_list(&names),
                    MonitorEvent::DisconnectedList(names) => log.on_disconnected_list(&names),
                    MonitorEvent::Report(report) => {
                        log.on_report(&report);

                        completed += 1;
                        if args.json_reports {
                            println!("{}", serde_json::to_string(&report)?);
                        }
                        if args.cycles.is_some_and(|n| completed >= n) {
                            handle.stop();
                        }
                    }
                }
            }
            _ = handle.stopped() => break,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received");
                handle.stop();
            }
        }
    }

    source.stop_replay();
    let result = handle.join().await;
    if replay.join().is_err() {
        warn!("replay thread panicked");
    }

    // Surface any remaining status lines
    while let Ok(event) = events.try_recv() {
        if let MonitorEvent::Status(s) = event {
            log.on_status(&s);
        }
    }

    result?;
    Ok(())
}
