pub mod constants;
pub mod dimension;
pub mod engine;
pub mod error;
pub mod kernel;
pub mod network;
pub mod neuron;
pub mod serialize;
pub mod spikes;
pub mod stimulator;
pub mod sweep;

pub use engine::{SimulationEngine, TraceTable};
pub use error::{Error, Result};
pub use kernel::{CableKernel, SimulationKernel};
pub use network::{connect, ConnectivityPolicy, Network, NetworkConfig};
pub use neuron::{build, ModelKind, Neuron};
pub use serialize::{Presets, SimulationConfig};
pub use sweep::{BatchSweep, SweepParameter, SweepResult};
