use std::io;
use std::path::PathBuf;
use std::thread;

use anyhow::Context;
use clap::Parser;

use pmtpulse::config::ReadoutConfig;
use pmtpulse::output::{EventSink, OutputFormat, create_formatter};
use pmtpulse::simulation::{ScintillationConfig, create_rng, generate_event};
use pmtpulse::{ReadoutChannel, SENTINEL};

/// Synthesize, digitize and analyze scintillation events on emulated PMT
/// readout channels.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Number of events to process
    #[arg(short = 'n', long, default_value_t = 100)]
    events: usize,

    /// Number of worker threads, each owning one readout channel
    #[arg(short, long, default_value_t = 1)]
    workers: usize,

    /// Seed for deterministic generation and digitization
    #[arg(short, long)]
    seed: Option<u64>,

    /// Output format for committed event records
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Readout channel configuration (TOML); defaults to the reference channel
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mean number of photons per synthetic event
    #[arg(long, default_value_t = 40.0)]
    photons: f64,

    /// Attach Gaussian-scattered positions to generated photons
    #[arg(long)]
    positions: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ReadoutConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ReadoutConfig::default(),
    };
    config.validate()?;

    let source = ScintillationConfig {
        mean_photons: args.photons,
        with_positions: args.positions || config.segmentation.is_some(),
        ..ScintillationConfig::default()
    };

    let sink = EventSink::new(io::stdout(), create_formatter(args.format))?;
    let workers = args.workers.max(1);
    let per_worker = args.events.div_ceil(workers);

    log::info!(
        "processing {} events on {} worker(s), {} ticks per trace",
        args.events,
        workers,
        config.digitizer.ticks()
    );

    thread::scope(|scope| -> anyhow::Result<()> {
        let mut handles = Vec::new();
        for worker in 0..workers {
            let first = worker * per_worker;
            let count = per_worker.min(args.events.saturating_sub(first));
            if count == 0 {
                break;
            }
            let config = &config;
            let source = &source;
            let sink = &sink;
            let seed = args.seed;

            handles.push(scope.spawn(move || -> anyhow::Result<u64> {
                let mut channel = ReadoutChannel::new(config)?;
                let mut rng = create_rng(seed.map(|s| s.wrapping_add(worker as u64)));
                let mut saturated = 0u64;

                for _ in 0..count {
                    for photon in generate_event(source, &mut rng) {
                        channel.add_photon(&photon, &mut rng);
                    }
                    let summary = channel.process(&mut rng);
                    if summary.saturated {
                        saturated += 1;
                    }
                    if summary.poly_cfd_ns == SENTINEL {
                        log::debug!("no usable rising edge in event");
                    }
                    sink.commit(&summary)?;
                    channel.clear();
                }
                Ok(saturated)
            }));
        }

        let mut saturated = 0u64;
        for handle in handles {
            saturated += handle.join().expect("worker panicked")?;
        }
        if saturated > 0 {
            log::warn!("{saturated} event(s) saturated the ADC");
        }
        Ok(())
    })?;

    log::info!("committed {} event records", sink.committed());
    Ok(())
}
