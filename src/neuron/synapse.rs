use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::dimension::{MicroSiemens, MilliVolts, Millis};
use crate::error::{Error, Result};
use crate::neuron::Site;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SynapseKind {
    ExpSyn,
    Exp2Syn,
    AlphaSynapse,
}

impl SynapseKind {
    pub fn name(&self) -> &'static str {
        match self {
            SynapseKind::ExpSyn => "ExpSyn",
            SynapseKind::Exp2Syn => "Exp2Syn",
            SynapseKind::AlphaSynapse => "AlphaSynapse",
        }
    }

    /// Default time constants for each kind.
    pub fn dynamics(&self) -> SynapseDynamics {
        match self {
            SynapseKind::ExpSyn => SynapseDynamics::Exponential { tau: Millis(2.0) },
            SynapseKind::Exp2Syn => SynapseDynamics::BiExponential {
                tau_rise: Millis(0.5),
                tau_decay: Millis(2.0),
            },
            SynapseKind::AlphaSynapse => SynapseDynamics::Alpha { tau: Millis(1.0) },
        }
    }
}

impl fmt::Display for SynapseKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SynapseKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ExpSyn" => Ok(SynapseKind::ExpSyn),
            "Exp2Syn" => Ok(SynapseKind::Exp2Syn),
            "AlphaSynapse" => Ok(SynapseKind::AlphaSynapse),
            _ => Err(Error::UnknownSynapseKind(s.to_string())),
        }
    }
}

/// How a synaptic conductance evolves after an incoming event.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum SynapseDynamics {
    /// Instantaneous rise, single exponential decay.
    Exponential { tau: Millis },
    /// Difference of two exponentials, scaled so one event peaks at the
    /// event weight.
    BiExponential { tau_rise: Millis, tau_decay: Millis },
    /// `w * (t / tau) * exp(1 - t / tau)`, peaking at the weight at `t == tau`.
    Alpha { tau: Millis },
}

/// A post-synaptic conductance at a fixed site.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Synapse {
    pub kind: SynapseKind,
    pub site: Site,
    pub dynamics: SynapseDynamics,
    pub reversal: MilliVolts,
}

impl Synapse {
    pub fn new(kind: SynapseKind, site: Site) -> Synapse {
        Synapse {
            kind,
            site,
            dynamics: kind.dynamics(),
            reversal: MilliVolts(0.0),
        }
    }
}

/// The conductance state of one synapse during a run.
#[derive(Clone, Debug, PartialEq)]
pub struct SynapseState {
    dynamics: SynapseDynamics,
    /// Rise state (bi-exponential, alpha); unused for the exponential kind.
    a: f64,
    /// Conductance-carrying state, in microsiemens.
    b: f64,
    /// Per-event scaling that normalizes the peak conductance to the weight.
    factor: f64,
}

impl SynapseState {
    pub fn new(dynamics: SynapseDynamics) -> SynapseState {
        let (dynamics, factor) = match dynamics {
            SynapseDynamics::Exponential { .. } => (dynamics, 1.0),
            SynapseDynamics::BiExponential { tau_rise, tau_decay } => {
                let tau_rise = Millis(tau_rise.0.min(0.9999 * tau_decay.0));
                let t_peak = tau_rise.0 * tau_decay.0 / (tau_decay.0 - tau_rise.0)
                    * (tau_decay.0 / tau_rise.0).ln();
                let factor =
                    1.0 / ((-t_peak / tau_decay.0).exp() - (-t_peak / tau_rise.0).exp());
                (SynapseDynamics::BiExponential { tau_rise, tau_decay }, factor)
            }
            SynapseDynamics::Alpha { .. } => (dynamics, std::f64::consts::E),
        };
        SynapseState {
            dynamics,
            a: 0.0,
            b: 0.0,
            factor,
        }
    }

    /// Deliver one event of the given weight.
    pub fn receive(&mut self, weight: MicroSiemens) {
        let w = weight.0 * self.factor;
        match self.dynamics {
            SynapseDynamics::Exponential { .. } => self.b += w,
            SynapseDynamics::BiExponential { .. } => {
                self.a += w;
                self.b += w;
            }
            SynapseDynamics::Alpha { .. } => self.a += w,
        }
    }

    pub fn conductance(&self) -> MicroSiemens {
        match self.dynamics {
            SynapseDynamics::BiExponential { .. } => MicroSiemens(self.b - self.a),
            _ => MicroSiemens(self.b),
        }
    }

    pub fn step(&mut self, interval: &Millis) {
        match self.dynamics {
            SynapseDynamics::Exponential { tau } => {
                self.b *= (-interval.0 / tau.0).exp();
            }
            SynapseDynamics::BiExponential { tau_rise, tau_decay } => {
                self.a *= (-interval.0 / tau_rise.0).exp();
                self.b *= (-interval.0 / tau_decay.0).exp();
            }
            SynapseDynamics::Alpha { tau } => {
                let decay = (-interval.0 / tau.0).exp();
                self.b = decay * (self.b + self.a * interval.0 / tau.0);
                self.a *= decay;
            }
        }
    }
}
