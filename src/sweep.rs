use crossbeam::channel::{Sender, TrySendError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::constants::{MAX_STEPS, SPIKE_THRESHOLD, SWEEP_CLAMP_DELAY, SWEEP_CLAMP_DURATION};
use crate::dimension::{MicroSiemens, Millis, NanoAmps};
use crate::engine::SimulationEngine;
use crate::error::{Error, Result};
use crate::kernel::{step_count, SimulationKernel};
use crate::network::NetworkConfig;
use crate::neuron::synapse::SynapseKind;
use crate::spikes;
use crate::stimulator::{self, Stimulus};

/// The stimulus quantity varied across a sweep. Always applied to neuron 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepParameter {
    /// Current clamp amplitude (nA).
    StimAmp,
    /// Synaptic train weight (uS).
    SynWeight,
}

impl SweepParameter {
    pub fn name(&self) -> &'static str {
        match self {
            SweepParameter::StimAmp => "stim_amp",
            SweepParameter::SynWeight => "syn_weight",
        }
    }
}

impl fmt::Display for SweepParameter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SweepParameter {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stim_amp" | "stim-amp" | "StimAmp" => Ok(SweepParameter::StimAmp),
            "syn_weight" | "syn-weight" | "SynWeight" => Ok(SweepParameter::SynWeight),
            _ => Err(Error::UnknownSweepParameter(s.to_string())),
        }
    }
}

/// Everything held fixed while one parameter varies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub network: NetworkConfig,
    /// Synapse kind of the swept synaptic train.
    pub synapse_kind: SynapseKind,
    /// Onset of the swept synaptic train.
    pub stimulus_onset: Millis,
    pub duration: Millis,
    pub dt: Millis,
    /// Seeds the random connectivity of every trial in the sweep.
    pub seed: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    pub param_value: f64,
    /// Spikes per neuron per second, averaged over trials.
    pub avg_firing_rate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub parameter: SweepParameter,
    pub rows: Vec<SweepRow>,
}

impl SweepResult {
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(["param_name", "param_value", "avg_firing_rate"])?;
        for row in self.rows.iter() {
            wtr.write_record(&[
                self.parameter.name().to_string(),
                row.param_value.to_string(),
                row.avg_firing_rate.to_string(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_csv(io::BufWriter::new(file))
    }
}

/// Values from `start` up to and including `stop`, `step` apart.
pub fn sweep_values(start: f64, stop: f64, step: f64) -> Result<Vec<f64>> {
    if step.is_nan() || step <= 0.0 || !start.is_finite() || !stop.is_finite() {
        return Err(Error::InvalidParameter(format!(
            "cannot step from {start} to {stop} by {step}"
        )));
    }
    if stop < start {
        return Ok(vec![]);
    }
    let Some(steps) = step_count(stop - start, step) else {
        return Err(Error::InvalidParameter(format!(
            "stepping from {start} to {stop} by {step} exceeds {MAX_STEPS} values"
        )));
    };
    Ok((0..=steps).map(|i| start + i as f64 * step).collect())
}

/// Runs repeated, independent trials over a range of stimulus values.
pub struct BatchSweep<'a, K: SimulationKernel> {
    engine: &'a mut SimulationEngine<K>,
    progress: Option<Sender<Progress>>,
}

impl<'a, K: SimulationKernel> BatchSweep<'a, K> {
    pub fn new(engine: &'a mut SimulationEngine<K>) -> BatchSweep<'a, K> {
        BatchSweep {
            engine,
            progress: None,
        }
    }

    /// Report progress after every trial. A full or disconnected channel
    /// never stalls the sweep.
    pub fn with_progress(mut self, sender: Sender<Progress>) -> BatchSweep<'a, K> {
        self.progress = Some(sender);
        self
    }

    fn report(&mut self, progress: Progress) {
        let Some(sender) = self.progress.as_ref() else {
            return;
        };
        match sender.try_send(progress) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => {
                warn!("Progress receiver dropped; no further progress will be reported");
                self.progress = None;
            }
        }
    }

    pub fn sweep(
        &mut self,
        parameter: SweepParameter,
        values: &[f64],
        trials_per_value: usize,
        config: &SweepConfig,
    ) -> Result<SweepResult> {
        if trials_per_value == 0 {
            return Err(Error::InvalidParameter(
                "a sweep needs at least one trial per value".to_string(),
            ));
        }
        if config.network.neuron_count == 0 {
            return Err(Error::EmptyNetwork);
        }

        let total = values.len() * trials_per_value;
        info!(%parameter, values = values.len(), trials_per_value, "Starting sweep");
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut rows = Vec::with_capacity(values.len());
        let mut completed = 0;
        for &value in values {
            let mut rate_sum = 0.0;
            for trial in 0..trials_per_value {
                let network = config
                    .network
                    .build(&mut rng)?
                    .with_stimulus(sweep_stimulus(parameter, value, config)?)?;
                let table = self.engine.run(&network, config.duration, config.dt)?;
                let spike_count: usize = spikes::counts(&table, SPIKE_THRESHOLD.0).iter().sum();
                let per_neuron = spike_count as f64 / network.neurons().len() as f64;
                let rate = per_neuron / config.duration.seconds();
                debug!(value, trial, spike_count, rate, "Trial finished");
                rate_sum += rate;

                completed += 1;
                self.report(Progress { completed, total });
            }
            rows.push(SweepRow {
                param_value: value,
                avg_firing_rate: rate_sum / trials_per_value as f64,
            });
        }
        info!(%parameter, rows = rows.len(), "Sweep finished");
        Ok(SweepResult { parameter, rows })
    }
}

fn sweep_stimulus(parameter: SweepParameter, value: f64, config: &SweepConfig) -> Result<Stimulus> {
    match parameter {
        SweepParameter::StimAmp => stimulator::current_clamp(
            0,
            SWEEP_CLAMP_DELAY,
            SWEEP_CLAMP_DURATION,
            NanoAmps(value),
        ),
        SweepParameter::SynWeight => stimulator::synaptic_train(
            0,
            config.synapse_kind,
            MicroSiemens(value),
            config.stimulus_onset,
        ),
    }
}
