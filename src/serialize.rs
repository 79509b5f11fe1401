use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::dimension::{
    MicroFaradsPerSquareCm, MicroSiemens, MilliVolts, Millis, NanoAmps, OhmSquareCm,
};
use crate::engine::{SimulationEngine, TraceTable};
use crate::error::{Error, Result};
use crate::kernel::{Integration, SimulationKernel};
use crate::network::{ConnectivityPolicy, Network, NetworkConfig};
use crate::neuron::synapse::SynapseKind;
use crate::neuron::ModelKind;
use crate::stimulator::{self, Stimulus};
use crate::sweep::SweepConfig;

/// A flat, JSON-friendly description of one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub model_choice: ModelKind,
    /// Specific membrane resistance, ohm cm^2.
    pub rm: f64,
    /// Specific membrane capacitance, uF/cm^2.
    pub cm: f64,
    #[serde(flatten)]
    pub stimulus: StimulusConfig,
    pub duration: f64,
    pub dt: f64,
    #[serde(default = "default_neuron_count")]
    pub neuron_count: usize,
    #[serde(default = "default_connectivity")]
    pub connectivity_choice: ConnectivityPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_probability: Option<f64>,
    #[serde(default)]
    pub seed: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "selected_stimulus")]
pub enum StimulusConfig {
    NetStim {
        synapse_choice: SynapseKind,
        syn_weight: f64,
        #[serde(default = "default_syn_onset")]
        syn_onset: f64,
    },
    IClamp {
        stim_delay: f64,
        stim_dur: f64,
        stim_amp: f64,
    },
    VClamp {
        vc_dur: f64,
        vc_level: f64,
    },
}

fn default_neuron_count() -> usize {
    1
}

fn default_connectivity() -> ConnectivityPolicy {
    ConnectivityPolicy::AllToAll
}

fn default_syn_onset() -> f64 {
    50.0
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            model_choice: ModelKind::SimpleSoma,
            rm: 10000.0,
            cm: 1.0,
            stimulus: StimulusConfig::NetStim {
                synapse_choice: SynapseKind::ExpSyn,
                syn_weight: 0.05,
                syn_onset: default_syn_onset(),
            },
            duration: 500.0,
            dt: 0.025,
            neuron_count: default_neuron_count(),
            connectivity_choice: default_connectivity(),
            connection_probability: None,
            seed: 0,
        }
    }
}

impl SimulationConfig {
    pub fn from_json(text: &str) -> Result<SimulationConfig> {
        let config: SimulationConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<SimulationConfig> {
        SimulationConfig::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Catch everything a run would reject before anything is built.
    pub fn validate(&self) -> Result<()> {
        if !(self.rm > 0.0 && self.cm > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "membrane resistance and capacitance must be positive, got rm {} and cm {}",
                self.rm, self.cm
            )));
        }
        if self.neuron_count == 0 {
            return Err(Error::EmptyNetwork);
        }
        if self.connectivity_choice == ConnectivityPolicy::Random
            && self.connection_probability.is_none()
        {
            return Err(Error::MissingProbability);
        }
        Integration::new(Millis(self.dt), Millis(self.duration))?;
        self.stimulus()?;
        Ok(())
    }

    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            neuron_count: self.neuron_count,
            model: self.model_choice,
            membrane_resistance: OhmSquareCm(self.rm),
            membrane_capacitance: MicroFaradsPerSquareCm(self.cm),
            connectivity: self.connectivity_choice,
            connection_probability: self.connection_probability,
        }
    }

    /// The configured stimulus, on neuron 0.
    pub fn stimulus(&self) -> Result<Stimulus> {
        match self.stimulus {
            StimulusConfig::NetStim {
                synapse_choice,
                syn_weight,
                syn_onset,
            } => stimulator::synaptic_train(
                0,
                synapse_choice,
                MicroSiemens(syn_weight),
                Millis(syn_onset),
            ),
            StimulusConfig::IClamp {
                stim_delay,
                stim_dur,
                stim_amp,
            } => stimulator::current_clamp(
                0,
                Millis(stim_delay),
                Millis(stim_dur),
                NanoAmps(stim_amp),
            ),
            StimulusConfig::VClamp { vc_dur, vc_level } => {
                stimulator::voltage_clamp(0, Millis(vc_dur), MilliVolts(vc_level))
            }
        }
    }

    pub fn build_network(&self) -> Result<Network> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.network_config()
            .build(&mut rng)?
            .with_stimulus(self.stimulus()?)
    }

    /// Sweep settings that keep this config's network, synapse and timing.
    pub fn sweep_config(&self) -> SweepConfig {
        let (synapse_kind, onset) = match self.stimulus {
            StimulusConfig::NetStim {
                synapse_choice,
                syn_onset,
                ..
            } => (synapse_choice, syn_onset),
            _ => (SynapseKind::ExpSyn, default_syn_onset()),
        };
        SweepConfig {
            network: self.network_config(),
            synapse_kind,
            stimulus_onset: Millis(onset),
            duration: Millis(self.duration),
            dt: Millis(self.dt),
            seed: self.seed,
        }
    }

    pub fn run<K: SimulationKernel>(&self, engine: &mut SimulationEngine<K>) -> Result<TraceTable> {
        let network = self.build_network()?;
        engine.run(&network, Millis(self.duration), Millis(self.dt))
    }
}

/// Named configurations, kept in name order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Presets(BTreeMap<String, SimulationConfig>);

impl Presets {
    pub fn from_json(text: &str) -> Result<Presets> {
        let presets: Presets = serde_json::from_str(text)?;
        for config in presets.0.values() {
            config.validate()?;
        }
        Ok(presets)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Presets> {
        Presets::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Replaces any preset already saved under `name`.
    pub fn insert(&mut self, name: &str, config: SimulationConfig) {
        self.0.insert(name.to_string(), config);
    }

    pub fn get(&self, name: &str) -> Option<&SimulationConfig> {
        self.0.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|name| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Run every preset in name order, each from a freshly reset kernel.
    pub fn run_all<K: SimulationKernel>(
        &self,
        engine: &mut SimulationEngine<K>,
    ) -> Result<Vec<(String, TraceTable)>> {
        let mut results = Vec::with_capacity(self.0.len());
        for (name, config) in self.0.iter() {
            info!(preset = name.as_str(), "Running preset");
            results.push((name.clone(), config.run(engine)?));
        }
        Ok(results)
    }
}
