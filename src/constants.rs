use crate::dimension::{MicroSiemens, Millis, MilliVolts};

/// Uniform membrane potential every run is initialized to.
pub const RESTING_POTENTIAL: MilliVolts = MilliVolts(-65.0);

/// Reversal potential of the passive leak on every compartment.
pub const LEAK_REVERSAL: MilliVolts = MilliVolts(-65.0);

/// Spikes closer than this to the previous accepted spike are dropped.
pub const REFRACTORY_PERIOD: Millis = Millis(2.0);

/// Threshold used when counting spikes for firing-rate statistics.
pub const SPIKE_THRESHOLD: MilliVolts = MilliVolts(-20.0);

/// Threshold of the event detectors that drive network connections.
pub const DETECTOR_THRESHOLD: MilliVolts = MilliVolts(10.0);

/// Weight of every connection produced by the graph builder.
pub const DEFAULT_CONNECTION_WEIGHT: MicroSiemens = MicroSiemens(0.02);
pub const DEFAULT_CONNECTION_DELAY: Millis = Millis(5.0);

/// Delay between a stimulus event and its arrival at the target synapse.
pub const STIMULUS_CONNECTION_DELAY: Millis = Millis(1.0);

/// Relative position of probes, synapses and clamps along the soma.
pub const SOMA_CENTER: f64 = 0.5;

/// Current-clamp window used by amplitude sweeps.
pub const SWEEP_CLAMP_DELAY: Millis = Millis(100.0);
pub const SWEEP_CLAMP_DURATION: Millis = Millis(100.0);

pub const EPSILON: f64 = 1e-9;

/// Upper bound on the number of steps in one run or one sweep range.
pub const MAX_STEPS: usize = 100_000_000;
