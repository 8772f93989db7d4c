use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use clocktree::{ClockGraph, MemoryMap, RegisterSource, Snapshot, Topology};

mod report;

/// Print the clock tree of a memory-mapped clock controller.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Topology description (YAML). Defaults to the bundled SAME54 description.
    #[arg(short, long)]
    topology: Option<PathBuf>,

    /// Register image (hjson map of address to word) to decode offline.
    #[arg(short, long)]
    dump: Option<PathBuf>,

    /// Attach to a live target of this chip through a debug probe.
    #[cfg(feature = "probe")]
    #[arg(short, long, conflicts_with = "dump")]
    chip: Option<String>,

    /// Number of snapshots to take.
    #[arg(short = 'n', long, default_value_t = 1)]
    count: u32,

    /// Delay between snapshots.
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Write the register image of the last snapshot to this file.
    #[arg(short, long)]
    save: Option<PathBuf>,

    /// Log more (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init(args.verbose).context("Failed to install logger")?;

    let topology = load_topology(args.topology.as_deref())?;

    #[cfg(feature = "probe")]
    if let Some(chip) = &args.chip {
        let mut session =
            probe_rs::Session::auto_attach(chip.as_str(), probe_rs::Permissions::default())
                .with_context(|| format!("Failed to attach to {}", chip))?;
        let mut core = session.core(0).context("Failed to open core 0")?;
        let mut source = clocktree::ProbeSource::new(&mut core);
        return poll(&args, &topology, &mut source);
    }

    let path = args
        .dump
        .as_deref()
        .context("No register source given, pass --dump <file>")?;
    let mut image = load_image(path)?;
    poll(&args, &topology, &mut image)
}

fn load_topology(path: Option<&Path>) -> Result<Topology> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Topology::from_yaml(&text)
                .with_context(|| format!("Failed to load topology {}", path.display()))
        }
        None => Topology::same54().context("Failed to load bundled SAME54 topology"),
    }
}

fn load_image(path: &Path) -> Result<MemoryMap> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_hjson::from_str(&text)
        .with_context(|| format!("Failed to parse register image {}", path.display()))
}

/// Take `args.count` independent snapshots and print each one.
fn poll(args: &Args, topology: &Topology, source: &mut dyn RegisterSource) -> Result<()> {
    let mut last = None;
    for n in 0..args.count {
        if n > 0 {
            thread::sleep(Duration::from_millis(args.interval_ms));
            println!();
        }
        let snapshot = Snapshot::capture(topology, source);
        let graph = ClockGraph::from_snapshot(topology, &snapshot);
        print!("{}", report::render(&graph));
        last = Some(snapshot);
    }

    if let (Some(path), Some(snapshot)) = (&args.save, last) {
        let text = serde_hjson::to_string(&snapshot.to_memory_map())
            .context("Failed to serialize register image")?;
        fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("saved register image to {}", path.display());
    }
    Ok(())
}

mod logger {
    use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

    struct StderrLogger;

    static LOGGER: StderrLogger = StderrLogger;

    impl Log for StderrLogger {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= log::max_level()
        }

        fn log(&self, record: &Record) {
            if self.enabled(record.metadata()) {
                eprintln!("[{:<5}] {}", record.level(), record.args());
            }
        }

        fn flush(&self) {}
    }

    pub fn init(verbosity: u8) -> Result<(), SetLoggerError> {
        log::set_logger(&LOGGER)?;
        log::set_max_level(match verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        });
        Ok(())
    }
}
