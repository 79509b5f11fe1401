use serde::ser::{Serialize, SerializeMap, Serializer};
use std::io;
use std::path::Path;
use tracing::{debug, info, info_span};
use uuid::Uuid;

use crate::constants::SOMA_CENTER;
use crate::dimension::Millis;
use crate::error::Result;
use crate::kernel::{CableKernel, Integration, NetworkState, Probe, SimulationKernel};
use crate::network::Network;
use crate::neuron::Site;

pub const TIME_KEY: &str = "time";

pub fn soma_key(neuron: usize) -> String {
    format!("neuron_{neuron}_v_soma")
}

pub fn dendrite_key(neuron: usize) -> String {
    format!("neuron_{neuron}_v_dend")
}

/// Owns the kernel and decides which compartments get recorded.
#[derive(Debug)]
pub struct SimulationEngine<K: SimulationKernel> {
    kernel: K,
    record_dendrites: bool,
}

impl Default for SimulationEngine<CableKernel> {
    fn default() -> Self {
        SimulationEngine::new(CableKernel::new())
    }
}

impl<K: SimulationKernel> SimulationEngine<K> {
    pub fn new(kernel: K) -> SimulationEngine<K> {
        SimulationEngine {
            kernel,
            record_dendrites: false,
        }
    }

    /// Also record the dendrite attached to each soma, for neurons that have
    /// one.
    pub fn record_dendrites(mut self, enabled: bool) -> SimulationEngine<K> {
        self.record_dendrites = enabled;
        self
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    fn probes(&self, network: &Network) -> Vec<Probe> {
        let mut probes = Vec::with_capacity(network.neurons().len());
        for (index, neuron) in network.neurons().iter().enumerate() {
            probes.push(Probe {
                key: soma_key(index),
                site: Site::soma(index, SOMA_CENTER),
            });
            if !self.record_dendrites {
                continue;
            }
            if let Some(compartment) = neuron.first_dendrite() {
                probes.push(Probe {
                    key: dendrite_key(index),
                    site: Site {
                        neuron: index,
                        compartment,
                        position: 0.5,
                    },
                });
            }
        }
        probes
    }

    /// Simulate `network` from rest for `duration` in steps of `dt`.
    pub fn run(&mut self, network: &Network, duration: Millis, dt: Millis) -> Result<TraceTable> {
        let integration = Integration::new(dt, duration)?;
        let state = NetworkState {
            id: Uuid::new_v4(),
            network,
            probes: self.probes(network),
        };
        let span = info_span!("run", id = %state.id);
        let _enter = span.enter();

        self.kernel.reset();
        info!(
            neurons = network.neurons().len(),
            connections = network.connections().len(),
            stimulus = ?network.stimulus().map(|s| s.kind()),
            duration = duration.0,
            dt = dt.0,
            "Starting simulation"
        );
        let output = self.kernel.integrate(&state, &integration);
        self.kernel.reset();
        let output = output?;
        debug!(samples = output.time.len(), "Simulation finished");

        let traces = state
            .probes
            .into_iter()
            .map(|probe| probe.key)
            .zip(output.traces)
            .collect();
        Ok(TraceTable {
            id: state.id,
            time: output.time,
            traces,
        })
    }
}

/// The voltage traces of one run, keyed `time` and `neuron_<i>_v_soma` (plus
/// `neuron_<i>_v_dend` when dendrites are recorded), in neuron order.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceTable {
    pub id: Uuid,
    time: Vec<f64>,
    traces: Vec<(String, Vec<f64>)>,
}

impl TraceTable {
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn get(&self, key: &str) -> Option<&[f64]> {
        if key == TIME_KEY {
            return Some(&self.time);
        }
        self.traces
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, trace)| trace.as_slice())
    }

    pub fn soma(&self, neuron: usize) -> Option<&[f64]> {
        self.get(&soma_key(neuron))
    }

    pub fn dendrite(&self, neuron: usize) -> Option<&[f64]> {
        self.get(&dendrite_key(neuron))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(TIME_KEY).chain(self.traces.iter().map(|(k, _)| k.as_str()))
    }

    /// Number of neurons with a soma trace.
    pub fn neuron_count(&self) -> usize {
        self.traces
            .iter()
            .filter(|(k, _)| k.ends_with("_v_soma"))
            .count()
    }

    /// Number of samples per trace.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// One header row of keys, then one row per sample.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.keys())?;
        for (index, t) in self.time.iter().enumerate() {
            let mut record = vec![t.to_string()];
            record.extend(self.traces.iter().map(|(_, trace)| trace[index].to_string()));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_csv(io::BufWriter::new(file))
    }
}

impl Serialize for TraceTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.traces.len() + 1))?;
        map.serialize_entry(TIME_KEY, &self.time)?;
        for (key, trace) in self.traces.iter() {
            map.serialize_entry(key, trace)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SPIKE_THRESHOLD;
    use crate::dimension::{MicroFaradsPerSquareCm, NanoAmps, OhmSquareCm};
    use crate::error::Error;
    use crate::network::{connect, ConnectivityPolicy};
    use crate::neuron::{self, ModelKind};
    use crate::spikes;
    use crate::stimulator;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn network(kind: ModelKind, n: usize) -> Network {
        let neurons = (0..n)
            .map(|_| {
                neuron::build(kind, OhmSquareCm(10000.0), MicroFaradsPerSquareCm(1.0)).unwrap()
            })
            .collect();
        Network::new(neurons).unwrap()
    }

    #[test]
    fn simple_soma_under_current_clamp_spikes_during_pulse() {
        let stimulus =
            stimulator::current_clamp(0, Millis(100.0), Millis(100.0), NanoAmps(0.5)).unwrap();
        let network = network(ModelKind::SimpleSoma, 1).with_stimulus(stimulus).unwrap();
        let mut engine = SimulationEngine::new(CableKernel::new());
        let table = engine.run(&network, Millis(500.0), Millis(0.025)).unwrap();

        assert_eq!(table.len(), 20001);
        let keys: Vec<_> = table.keys().collect();
        assert_eq!(keys, vec!["time", "neuron_0_v_soma"]);

        let spikes = spikes::detect(table.soma(0).unwrap(), table.time(), SPIKE_THRESHOLD.0);
        assert!(spikes.iter().any(|t| (100.0..=200.0).contains(t)));
    }

    #[test]
    fn time_axis_is_strictly_increasing() {
        let mut engine = SimulationEngine::new(CableKernel::new());
        for (duration, dt) in [(10.0, 0.1), (5.0, 0.025), (1.0, 0.3), (2.0, 2.0)] {
            let table = engine
                .run(&network(ModelKind::PassiveDendrite, 2), Millis(duration), Millis(dt))
                .unwrap();
            assert_eq!(table.len(), (duration / dt + 1e-9).floor() as usize + 1);
            assert_eq!(table.time()[0], 0.0);
            assert!(table.time().windows(2).all(|w| w[1] > w[0]));
            assert_eq!(table.soma(1).unwrap().len(), table.len());
        }
    }

    #[test]
    fn rejects_non_positive_step() {
        let mut engine = SimulationEngine::new(CableKernel::new());
        let result = engine.run(&network(ModelKind::SimpleSoma, 1), Millis(10.0), Millis(0.0));
        assert!(matches!(
            result,
            Err(Error::InvalidIntegrationParameters { .. })
        ));
        let result = engine.run(&network(ModelKind::SimpleSoma, 1), Millis(-1.0), Millis(0.1));
        assert!(result.is_err());
    }

    #[test]
    fn traces_follow_neuron_order() {
        let mut engine = SimulationEngine::new(CableKernel::new());
        let table = engine
            .run(&network(ModelKind::MultiCompartment, 3), Millis(1.0), Millis(0.1))
            .unwrap();
        let keys: Vec<_> = table.keys().collect();
        assert_eq!(
            keys,
            vec!["time", "neuron_0_v_soma", "neuron_1_v_soma", "neuron_2_v_soma"]
        );
        assert_eq!(table.neuron_count(), 3);
        assert_eq!(engine.kernel().node_count(), 0);
    }

    #[test]
    fn dendrite_recording_adds_traces_where_available() {
        let mut engine = SimulationEngine::new(CableKernel::new()).record_dendrites(true);
        let table = engine
            .run(&network(ModelKind::PassiveDendrite, 2), Millis(1.0), Millis(0.1))
            .unwrap();
        let keys: Vec<_> = table.keys().collect();
        assert_eq!(
            keys,
            vec![
                "time",
                "neuron_0_v_soma",
                "neuron_0_v_dend",
                "neuron_1_v_soma",
                "neuron_1_v_dend"
            ]
        );
        assert_eq!(table.neuron_count(), 2);

        let table = engine
            .run(&network(ModelKind::SimpleSoma, 1), Millis(1.0), Millis(0.1))
            .unwrap();
        assert!(table.dendrite(0).is_none());
    }

    #[test]
    fn csv_export_has_one_column_per_key() {
        let mut engine = SimulationEngine::new(CableKernel::new());
        let table = engine
            .run(&network(ModelKind::SimpleSoma, 2), Millis(0.3), Millis(0.1))
            .unwrap();
        let mut buffer = vec![];
        table.write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "time,neuron_0_v_soma,neuron_1_v_soma");
        assert_eq!(lines.len(), 5);
        assert!(lines[1].starts_with("0,-65"));
    }

    #[test]
    fn json_export_keeps_key_order() {
        let mut engine = SimulationEngine::new(CableKernel::new());
        let table = engine
            .run(&network(ModelKind::SimpleSoma, 1), Millis(0.1), Millis(0.1))
            .unwrap();
        let json = serde_json::to_string(&table).unwrap();
        assert!(json.starts_with("{\"time\":[0.0,0.1],\"neuron_0_v_soma\":[-65.0,"));
    }

    #[test]
    fn failed_run_leaves_kernel_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        let base = network(ModelKind::SimpleSoma, 2);
        let mut connections =
            connect(base.neurons(), ConnectivityPolicy::AllToAll, None, &mut rng).unwrap();
        connections[0].synapse.site.compartment = 3;
        let broken = base.with_connections(connections);

        let mut engine = SimulationEngine::new(CableKernel::new());
        assert!(matches!(
            engine.run(&broken, Millis(10.0), Millis(0.1)),
            Err(Error::InvalidParameter(_))
        ));
        assert_eq!(engine.kernel().node_count(), 0);
    }
}
