use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{debug, warn};

use crate::constants::EPSILON;
use crate::dimension::{MicroSiemens, MilliVolts, Millis};
use crate::error::{Error, Result};
use crate::kernel::{Integration, KernelOutput, NetworkState, SimulationKernel};
use crate::neuron::membrane::Membrane;
use crate::neuron::synapse::SynapseState;
use crate::neuron::{Neuron, Site};
use crate::stimulator::{CurrentClamp, Stimulus, VoltageClamp};

/// Converts S/cm^2 times cm^2 into microsiemens.
const MICROSIEMENS_PER_SIEMENS: f64 = 1e6;

/// One isopotential node per compartment.
#[derive(Clone, Debug)]
struct Node {
    membrane: Membrane,
    /// cm^2
    area: f64,
    /// nF
    capacitance: f64,
    membrane_potential: MilliVolts,
}

impl Node {
    /// Total membrane conductance (uS) and the matching driving term
    /// `sum(g * E)` (nA).
    fn conductances(&self) -> (f64, f64) {
        let scale = self.area * MICROSIEMENS_PER_SIEMENS;
        let (conductance, drive) = self.membrane.conductance_and_drive();
        (conductance.0 * scale, drive * scale)
    }
}

/// Axial coupling between a compartment and its parent.
#[derive(Clone, Copy, Debug)]
struct Coupling {
    child: usize,
    parent: usize,
    /// uS
    conductance: f64,
}

#[derive(Clone, Debug)]
struct SynapseSlot {
    node: usize,
    reversal: MilliVolts,
    state: SynapseState,
}

/// Watches a node for upward threshold crossings.
#[derive(Clone, Debug)]
struct Detector {
    node: usize,
    threshold: MilliVolts,
    above: bool,
    synapse: usize,
    weight: MicroSiemens,
    delay: Millis,
}

#[derive(Clone, Copy, Debug)]
struct PendingEvent {
    time: f64,
    sequence: u64,
    synapse: usize,
    weight: MicroSiemens,
}

impl PartialEq for PendingEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PendingEvent {}

impl PartialOrd for PendingEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingEvent {
    // Reversed so the heap pops the earliest event first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// A fixed-step cable solver with one node per compartment.
///
/// Each step updates every node semi-implicitly against its own conductances
/// and its neighbours' previous voltages, then advances the channel gates and
/// synapses to the new voltage, then checks the detectors.
#[derive(Debug, Default)]
pub struct CableKernel {
    nodes: Vec<Node>,
    couplings: Vec<Coupling>,
    synapses: Vec<SynapseSlot>,
    detectors: Vec<Detector>,
    events: BinaryHeap<PendingEvent>,
    next_sequence: u64,
    injection: Option<(usize, CurrentClamp)>,
    hold: Option<(usize, VoltageClamp)>,
}

impl CableKernel {
    pub fn new() -> CableKernel {
        CableKernel::default()
    }

    /// Number of loaded nodes. Zero after a reset.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn schedule(&mut self, time: f64, synapse: usize, weight: MicroSiemens) {
        self.events.push(PendingEvent {
            time,
            sequence: self.next_sequence,
            synapse,
            weight,
        });
        self.next_sequence += 1;
    }

    fn add_synapse(&mut self, node: usize, reversal: MilliVolts, state: SynapseState) -> usize {
        self.synapses.push(SynapseSlot {
            node,
            reversal,
            state,
        });
        self.synapses.len() - 1
    }

    fn load(&mut self, state: &NetworkState, integration: &Integration) -> Result<Vec<usize>> {
        let network = state.network;
        let mut offsets = Vec::with_capacity(network.neurons().len());
        for neuron in network.neurons() {
            let base = self.nodes.len();
            offsets.push(base);
            for compartment in neuron.compartments.iter() {
                let area = compartment.geometry.surface_area();
                let mut membrane = compartment.membrane.clone();
                if membrane.is_active() {
                    membrane.insert_active(&integration.v_init);
                }
                self.nodes.push(Node {
                    capacitance: compartment.membrane.capacitance.0 * area * 1e3,
                    membrane,
                    area,
                    membrane_potential: integration.v_init,
                });
            }
            for (index, compartment) in neuron.compartments.iter().enumerate() {
                if let Some(attachment) = compartment.attachment {
                    let parent = &neuron.compartments[attachment.parent];
                    let resistance =
                        compartment.half_axial_resistance() + parent.half_axial_resistance();
                    self.couplings.push(Coupling {
                        child: base + index,
                        parent: base + attachment.parent,
                        conductance: MICROSIEMENS_PER_SIEMENS / resistance,
                    });
                }
            }
        }
        let locate = |site: &Site| node_index(network.neurons(), &offsets, site);

        for connection in network.connections() {
            let node = locate(&connection.synapse.site)?;
            let synapse = self.add_synapse(
                node,
                connection.synapse.reversal,
                SynapseState::new(connection.synapse.dynamics),
            );
            let source = locate(&connection.source.site())?;
            let threshold = connection.source.threshold();
            self.detectors.push(Detector {
                node: source,
                threshold,
                above: integration.v_init.0 > threshold.0,
                synapse,
                weight: connection.weight,
                delay: connection.delay,
            });
        }

        match network.stimulus() {
            Some(Stimulus::SynapticTrain(train)) => {
                let node = locate(&train.synapse.site)?;
                let synapse = self.add_synapse(
                    node,
                    train.synapse.reversal,
                    SynapseState::new(train.synapse.dynamics),
                );
                let times: Vec<Millis> = train.source.event_times().collect();
                for time in times {
                    self.schedule(time.0 + train.delay.0, synapse, train.weight);
                }
            }
            Some(Stimulus::CurrentClamp(clamp)) => {
                self.injection = Some((locate(&clamp.site)?, clamp.clone()));
            }
            Some(Stimulus::VoltageClamp(clamp)) => {
                self.hold = Some((locate(&clamp.site)?, clamp.clone()));
            }
            None => {}
        }

        let probes = state
            .probes
            .iter()
            .map(|probe| locate(&probe.site))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            run = %state.id,
            nodes = self.nodes.len(),
            synapses = self.synapses.len(),
            detectors = self.detectors.len(),
            "Loaded network into cable kernel"
        );
        Ok(probes)
    }

    fn deliver_events(&mut self, t: f64) {
        while let Some(event) = self.events.peek() {
            if event.time > t + EPSILON {
                break;
            }
            let event = *event;
            self.events.pop();
            self.synapses[event.synapse].state.receive(event.weight);
        }
    }

    /// Advance every node from `t` to `t + dt`.
    fn advance(&mut self, t: f64, dt: f64) {
        let previous: Vec<f64> = self.nodes.iter().map(|n| n.membrane_potential.0).collect();
        let mut numerator = Vec::with_capacity(self.nodes.len());
        let mut denominator = Vec::with_capacity(self.nodes.len());
        for (node, v) in self.nodes.iter().zip(previous.iter()) {
            let c = node.capacitance / dt;
            let (conductance, drive) = node.conductances();
            numerator.push(c * v + drive);
            denominator.push(c + conductance);
        }
        for coupling in self.couplings.iter() {
            numerator[coupling.child] += coupling.conductance * previous[coupling.parent];
            denominator[coupling.child] += coupling.conductance;
            numerator[coupling.parent] += coupling.conductance * previous[coupling.child];
            denominator[coupling.parent] += coupling.conductance;
        }
        for synapse in self.synapses.iter() {
            let g = synapse.state.conductance().0;
            numerator[synapse.node] += g * synapse.reversal.0;
            denominator[synapse.node] += g;
        }
        if let Some((node, clamp)) = self.injection.as_ref() {
            numerator[*node] += clamp.current(Millis(t + dt / 2.0)).0;
        }

        for (index, node) in self.nodes.iter_mut().enumerate() {
            node.membrane_potential = MilliVolts(numerator[index] / denominator[index]);
        }
        // Gates see the held level, not the free update.
        self.apply_hold(t + dt);
        let interval = Millis(dt);
        for node in self.nodes.iter_mut() {
            node.membrane.step(&node.membrane_potential, &interval);
        }
        for synapse in self.synapses.iter_mut() {
            synapse.state.step(&interval);
        }
    }

    fn apply_hold(&mut self, t: f64) {
        if let Some((node, clamp)) = self.hold.as_ref() {
            if clamp.holds(Millis(t)) {
                self.nodes[*node].membrane_potential = clamp.level;
            }
        }
    }

    fn check_detectors(&mut self, t: f64) {
        let mut crossings = vec![];
        for detector in self.detectors.iter_mut() {
            let above = self.nodes[detector.node].membrane_potential.0 > detector.threshold.0;
            if above && !detector.above {
                crossings.push((t + detector.delay.0, detector.synapse, detector.weight));
            }
            detector.above = above;
        }
        for (time, synapse, weight) in crossings {
            self.schedule(time, synapse, weight);
        }
    }
}

fn node_index(neurons: &[Neuron], offsets: &[usize], site: &Site) -> Result<usize> {
    match neurons.get(site.neuron) {
        Some(neuron) if site.compartment < neuron.len() => {
            Ok(offsets[site.neuron] + site.compartment)
        }
        _ => Err(Error::InvalidParameter(format!(
            "no compartment {} on neuron {}",
            site.compartment, site.neuron
        ))),
    }
}

impl SimulationKernel for CableKernel {
    fn reset(&mut self) {
        *self = CableKernel::default();
    }

    fn integrate(
        &mut self,
        state: &NetworkState,
        integration: &Integration,
    ) -> Result<KernelOutput> {
        if !self.nodes.is_empty() {
            warn!(run = %state.id, "Cable kernel was not reset before integrating; resetting");
            self.reset();
        }
        let probes = self.load(state, integration)?;

        let samples = integration.samples();
        let dt = integration.dt.0;
        let mut time = Vec::with_capacity(samples);
        let mut traces = vec![Vec::with_capacity(samples); probes.len()];

        let mut t = 0.0;
        self.apply_hold(t);
        for k in 0..samples {
            if k > 0 {
                self.deliver_events(t);
                self.advance(t, dt);
                t = integration.sample_time(k);
                self.check_detectors(t);
            }
            time.push(t);
            for (trace, node) in traces.iter_mut().zip(probes.iter()) {
                trace.push(self.nodes[*node].membrane_potential.0);
            }
        }
        Ok(KernelOutput { time, traces })
    }
}
