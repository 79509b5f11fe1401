//! Command line front end: single runs, parameter sweeps and preset batches.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use neuronet::constants::SPIKE_THRESHOLD;
use neuronet::dimension::Millis;
use neuronet::sweep::{sweep_values, Progress};
use neuronet::{
    spikes, BatchSweep, CableKernel, Presets, SimulationConfig, SimulationEngine, SweepParameter,
};

#[derive(Parser)]
#[command(name = "neuronet")]
#[command(
    about = "Build, run and sweep small networks of compartmental neurons",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one simulation and print spike times per neuron
    Run {
        /// JSON configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Write the voltage traces as CSV
        #[arg(short, long)]
        traces: Option<PathBuf>,

        /// Also record the first dendrite of each neuron
        #[arg(long)]
        record_dendrites: bool,
    },

    /// Sweep a stimulus parameter and report average firing rates
    Sweep {
        /// JSON configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// stim-amp or syn-weight
        #[arg(short, long)]
        param: SweepParameter,

        #[arg(long)]
        start: f64,

        #[arg(long)]
        stop: f64,

        #[arg(long)]
        step: f64,

        /// Trials per swept value
        #[arg(long, default_value_t = 1)]
        trials: usize,

        /// Write the sweep result as CSV
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Run every preset in a presets file
    Presets {
        /// JSON map of preset name to configuration
        #[arg(short, long)]
        file: PathBuf,

        /// Directory for one trace CSV per preset
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("neuronet=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut engine = SimulationEngine::new(CableKernel::new());

    match cli.command {
        Commands::Run {
            config,
            traces,
            record_dendrites,
        } => {
            let config = SimulationConfig::load(&config)
                .with_context(|| format!("Failed to load {}", config.display()))?;
            let mut engine = engine.record_dendrites(record_dendrites);
            let table = config.run(&mut engine)?;
            for (neuron, count) in spikes::counts(&table, SPIKE_THRESHOLD.0).iter().enumerate() {
                let times = spikes::detect(
                    table.soma(neuron).unwrap_or_default(),
                    table.time(),
                    SPIKE_THRESHOLD.0,
                );
                let rate = spikes::firing_rate(*count, Millis(config.duration));
                println!("neuron {neuron}: {count} spikes ({:.2} Hz) at {times:?}", rate.0);
            }
            if let Some(path) = traces {
                table
                    .save_csv(&path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
        }

        Commands::Sweep {
            config,
            param,
            start,
            stop,
            step,
            trials,
            out,
        } => {
            let config = SimulationConfig::load(&config)
                .with_context(|| format!("Failed to load {}", config.display()))?;
            let values = sweep_values(start, stop, step)?;
            let (tx, rx) = crossbeam::channel::unbounded::<Progress>();
            let reporter = std::thread::spawn(move || {
                for progress in rx.iter() {
                    eprintln!(
                        "{}/{} trials ({:.0}%)",
                        progress.completed,
                        progress.total,
                        progress.fraction() * 100.0
                    );
                }
            });
            let result = BatchSweep::new(&mut engine)
                .with_progress(tx)
                .sweep(param, &values, trials, &config.sweep_config());
            reporter
                .join()
                .map_err(|_| anyhow::anyhow!("Progress reporter panicked"))?;
            let result = result?;

            println!("{},avg_firing_rate", result.parameter);
            for row in result.rows.iter() {
                println!("{},{:.3}", row.param_value, row.avg_firing_rate);
            }
            if let Some(path) = out {
                result
                    .save_csv(&path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
        }

        Commands::Presets { file, out_dir } => {
            let presets = Presets::load(&file)
                .with_context(|| format!("Failed to load {}", file.display()))?;
            for (name, table) in presets.run_all(&mut engine)? {
                let counts = spikes::counts(&table, SPIKE_THRESHOLD.0);
                println!("{name}: spikes per neuron {counts:?}");
                if let Some(dir) = out_dir.as_ref() {
                    let path = dir.join(format!("{name}.csv"));
                    table
                        .save_csv(&path)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                }
            }
        }
    }
    Ok(())
}
