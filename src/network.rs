use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::constants::{
    DEFAULT_CONNECTION_DELAY, DEFAULT_CONNECTION_WEIGHT, DETECTOR_THRESHOLD, SOMA_CENTER,
};
use crate::dimension::{MicroFaradsPerSquareCm, MicroSiemens, Millis, MilliVolts, OhmSquareCm};
use crate::error::{Error, Result};
use crate::neuron::synapse::{Synapse, SynapseKind};
use crate::neuron::{self, ModelKind, Neuron, Site};
use crate::stimulator::Stimulus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectivityPolicy {
    /// Every ordered pair of distinct neurons.
    #[serde(rename = "All-to-All", alias = "AllToAll")]
    AllToAll,
    /// Each ordered pair independently, with a fixed probability.
    Random,
}

impl fmt::Display for ConnectivityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConnectivityPolicy::AllToAll => write!(f, "All-to-All"),
            ConnectivityPolicy::Random => write!(f, "Random"),
        }
    }
}

impl FromStr for ConnectivityPolicy {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "All-to-All" | "AllToAll" => Ok(ConnectivityPolicy::AllToAll),
            "Random" => Ok(ConnectivityPolicy::Random),
            _ => Err(Error::UnknownConnectivity(s.to_string())),
        }
    }
}

/// Where a connection takes its pre-synaptic signal from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConnectionSource {
    /// An event detector at the distal end of the axon. Transmission happens
    /// only on upward threshold crossings.
    SpikeDetector { site: Site, threshold: MilliVolts },
    /// The raw membrane voltage at the distal end of the soma, used when the
    /// pre-synaptic neuron has no axon.
    MembraneVoltage { site: Site, threshold: MilliVolts },
}

impl ConnectionSource {
    /// Prefer the axon when the neuron has one.
    pub fn for_neuron(index: usize, neuron: &Neuron) -> ConnectionSource {
        match neuron.axon() {
            Some(axon) => ConnectionSource::SpikeDetector {
                site: Site {
                    neuron: index,
                    compartment: axon,
                    position: 1.0,
                },
                threshold: DETECTOR_THRESHOLD,
            },
            None => ConnectionSource::MembraneVoltage {
                site: Site::soma(index, 1.0),
                threshold: DETECTOR_THRESHOLD,
            },
        }
    }

    pub fn site(&self) -> Site {
        match self {
            ConnectionSource::SpikeDetector { site, .. } => *site,
            ConnectionSource::MembraneVoltage { site, .. } => *site,
        }
    }

    pub fn threshold(&self) -> MilliVolts {
        match self {
            ConnectionSource::SpikeDetector { threshold, .. } => *threshold,
            ConnectionSource::MembraneVoltage { threshold, .. } => *threshold,
        }
    }
}

/// A directed, weighted, delayed edge from a source to a synapse.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub pre: usize,
    pub post: usize,
    pub source: ConnectionSource,
    pub synapse: Synapse,
    pub weight: MicroSiemens,
    pub delay: Millis,
}

/// Build the synapse graph over `neurons`. Pairs are visited in ascending
/// `(pre, post)` order, and under `Random` each visit draws once from `rng`,
/// so a seeded source gives a reproducible graph.
pub fn connect<R: Rng + ?Sized>(
    neurons: &[Neuron],
    policy: ConnectivityPolicy,
    probability: Option<f64>,
    rng: &mut R,
) -> Result<Vec<Connection>> {
    let probability = match policy {
        ConnectivityPolicy::AllToAll => None,
        ConnectivityPolicy::Random => {
            let p = probability.ok_or(Error::MissingProbability)?;
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::InvalidParameter(format!(
                    "connection probability must be within [0, 1], got {p}"
                )));
            }
            Some(p)
        }
    };

    let mut connections = Vec::new();
    for (pre, pre_neuron) in neurons.iter().enumerate() {
        for post in 0..neurons.len() {
            if pre == post {
                continue;
            }
            let include = match probability {
                None => true,
                Some(p) => rng.gen_bool(p),
            };
            if !include {
                continue;
            }
            connections.push(Connection {
                pre,
                post,
                source: ConnectionSource::for_neuron(pre, pre_neuron),
                synapse: Synapse::new(SynapseKind::ExpSyn, Site::soma(post, SOMA_CENTER)),
                weight: DEFAULT_CONNECTION_WEIGHT,
                delay: DEFAULT_CONNECTION_DELAY,
            });
        }
    }
    debug!(
        neurons = neurons.len(),
        connections = connections.len(),
        %policy,
        "Built connectivity graph"
    );
    Ok(connections)
}

/// Everything one run simulates: the neurons, their connections, and at most
/// one external stimulus.
#[derive(Clone, Debug, PartialEq)]
pub struct Network {
    neurons: Vec<Neuron>,
    connections: Vec<Connection>,
    stimulus: Option<Stimulus>,
}

impl Network {
    pub fn new(neurons: Vec<Neuron>) -> Result<Network> {
        if neurons.is_empty() {
            return Err(Error::EmptyNetwork);
        }
        Ok(Network {
            neurons,
            connections: vec![],
            stimulus: None,
        })
    }

    pub fn with_connections(mut self, connections: Vec<Connection>) -> Network {
        self.connections = connections;
        self
    }

    pub fn with_stimulus(mut self, stimulus: Stimulus) -> Result<Network> {
        if stimulus.target() >= self.neurons.len() {
            return Err(Error::InvalidStimulus(format!(
                "target neuron {} is outside a network of {}",
                stimulus.target(),
                self.neurons.len()
            )));
        }
        self.stimulus = Some(stimulus);
        Ok(self)
    }

    pub fn neurons(&self) -> &[Neuron] {
        &self.neurons
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn stimulus(&self) -> Option<&Stimulus> {
        self.stimulus.as_ref()
    }
}

/// The recipe for rebuilding a network's neurons and connections.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub neuron_count: usize,
    pub model: ModelKind,
    pub membrane_resistance: OhmSquareCm,
    pub membrane_capacitance: MicroFaradsPerSquareCm,
    pub connectivity: ConnectivityPolicy,
    pub connection_probability: Option<f64>,
}

impl NetworkConfig {
    /// Build fresh neurons and a fresh connectivity graph.
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Network> {
        if self.neuron_count == 0 {
            return Err(Error::EmptyNetwork);
        }
        let neurons = (0..self.neuron_count)
            .map(|_| neuron::build(self.model, self.membrane_resistance, self.membrane_capacitance))
            .collect::<Result<Vec<_>>>()?;
        let connections = connect(
            &neurons,
            self.connectivity,
            self.connection_probability,
            rng,
        )?;
        Ok(Network::new(neurons)?.with_connections(connections))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::NanoAmps;
    use crate::stimulator;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn neurons(kind: ModelKind, n: usize) -> Vec<Neuron> {
        (0..n)
            .map(|_| {
                neuron::build(kind, OhmSquareCm(10000.0), MicroFaradsPerSquareCm(1.0)).unwrap()
            })
            .collect()
    }

    #[test]
    fn all_to_all_connects_every_ordered_pair() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in 1..=6 {
            let graph = connect(
                &neurons(ModelKind::SimpleSoma, n),
                ConnectivityPolicy::AllToAll,
                None,
                &mut rng,
            )
            .unwrap();
            assert_eq!(graph.len(), n * (n - 1));
            assert!(graph.iter().all(|c| c.pre != c.post));
        }
    }

    #[test]
    fn random_with_zero_probability_is_empty() {
        let mut rng = StdRng::seed_from_u64(7);
        let graph = connect(
            &neurons(ModelKind::SimpleSoma, 5),
            ConnectivityPolicy::Random,
            Some(0.0),
            &mut rng,
        )
        .unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn random_with_certain_probability_matches_all_to_all() {
        let ns = neurons(ModelKind::MultiCompartment, 4);
        let mut rng = StdRng::seed_from_u64(7);
        let random = connect(&ns, ConnectivityPolicy::Random, Some(1.0), &mut rng).unwrap();
        let all = connect(&ns, ConnectivityPolicy::AllToAll, None, &mut rng).unwrap();
        assert_eq!(random, all);
    }

    #[test]
    fn random_graphs_are_reproducible_from_a_seed() {
        let ns = neurons(ModelKind::SimpleSoma, 8);
        let edges = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            connect(&ns, ConnectivityPolicy::Random, Some(0.3), &mut rng)
                .unwrap()
                .iter()
                .map(|c| (c.pre, c.post))
                .collect::<Vec<_>>()
        };
        assert_eq!(edges(11), edges(11));
        assert!(edges(11).len() < 8 * 7);
    }

    #[test]
    fn random_without_probability_fails() {
        let mut rng = StdRng::seed_from_u64(7);
        let result = connect(
            &neurons(ModelKind::SimpleSoma, 3),
            ConnectivityPolicy::Random,
            None,
            &mut rng,
        );
        assert!(matches!(result, Err(Error::MissingProbability)));
    }

    #[test]
    fn out_of_range_probability_fails() {
        let mut rng = StdRng::seed_from_u64(7);
        let result = connect(
            &neurons(ModelKind::SimpleSoma, 3),
            ConnectivityPolicy::Random,
            Some(1.5),
            &mut rng,
        );
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn axon_bearing_neurons_use_spike_detectors() {
        let mut rng = StdRng::seed_from_u64(7);
        let graph = connect(
            &neurons(ModelKind::MultiCompartment, 2),
            ConnectivityPolicy::AllToAll,
            None,
            &mut rng,
        )
        .unwrap();
        for connection in graph.iter() {
            let ConnectionSource::SpikeDetector { site, .. } = connection.source else {
                panic!("expected a spike detector");
            };
            assert_eq!(site.neuron, connection.pre);
            assert_eq!(site.compartment, 4);
            assert_eq!(site.position, 1.0);
        }
    }

    #[test]
    fn axonless_neurons_fall_back_to_soma_voltage() {
        let mut rng = StdRng::seed_from_u64(7);
        let graph = connect(
            &neurons(ModelKind::PassiveDendrite, 2),
            ConnectivityPolicy::AllToAll,
            None,
            &mut rng,
        )
        .unwrap();
        for connection in graph.iter() {
            assert!(matches!(
                connection.source,
                ConnectionSource::MembraneVoltage { site, .. }
                    if site == Site::soma(connection.pre, 1.0)
            ));
        }
    }

    #[test]
    fn internal_connections_use_fixed_defaults() {
        let mut rng = StdRng::seed_from_u64(7);
        let graph = connect(
            &neurons(ModelKind::SimpleSoma, 3),
            ConnectivityPolicy::AllToAll,
            None,
            &mut rng,
        )
        .unwrap();
        for connection in graph.iter() {
            assert_eq!(connection.weight, MicroSiemens(0.02));
            assert_eq!(connection.delay, Millis(5.0));
            assert_eq!(connection.synapse.kind, SynapseKind::ExpSyn);
            assert_eq!(connection.synapse.site, Site::soma(connection.post, 0.5));
        }
    }

    #[test]
    fn empty_networks_are_rejected() {
        assert!(matches!(Network::new(vec![]), Err(Error::EmptyNetwork)));
        let config = NetworkConfig {
            neuron_count: 0,
            model: ModelKind::SimpleSoma,
            membrane_resistance: OhmSquareCm(10000.0),
            membrane_capacitance: MicroFaradsPerSquareCm(1.0),
            connectivity: ConnectivityPolicy::AllToAll,
            connection_probability: None,
        };
        let mut rng = StdRng::seed_from_u64(7);
        assert!(matches!(config.build(&mut rng), Err(Error::EmptyNetwork)));
    }

    #[test]
    fn stimulus_must_target_a_member() {
        let network = Network::new(neurons(ModelKind::SimpleSoma, 2)).unwrap();
        let stimulus =
            stimulator::current_clamp(2, Millis(0.0), Millis(1.0), NanoAmps(0.1)).unwrap();
        assert!(matches!(
            network.with_stimulus(stimulus),
            Err(Error::InvalidStimulus(_))
        ));
    }
}
