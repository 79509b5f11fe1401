use crate::dimension::{MilliVolts, Millis, SiemensPerSquareCm};

/// An opening or closing rate of a gate, in 1/ms, as a function of the
/// membrane potential. `x` below is `v - v_half`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RateFunction {
    /// `a * x / (1 - exp(-x / k))`, with the removable singularity at
    /// `x == 0` replaced by its limit `a * k`.
    Linoid { a: f64, v_half: MilliVolts, k: f64 },
    /// `a * exp(-x / k)`.
    Exponential { a: f64, v_half: MilliVolts, k: f64 },
    /// `a / (1 + exp(-x / k))`.
    Sigmoid { a: f64, v_half: MilliVolts, k: f64 },
}

impl RateFunction {
    pub fn rate(&self, v: &MilliVolts) -> f64 {
        match self {
            RateFunction::Linoid { a, v_half, k } => {
                let x = v.0 - v_half.0;
                if (x / k).abs() < 1e-6 {
                    a * k * (1.0 + x / k / 2.0)
                } else {
                    a * x / (1.0 - (-x / k).exp())
                }
            }
            RateFunction::Exponential { a, v_half, k } => a * (-(v.0 - v_half.0) / k).exp(),
            RateFunction::Sigmoid { a, v_half, k } => a / (1.0 + (-(v.0 - v_half.0) / k).exp()),
        }
    }
}

/// The configuration for a single type of gate in a single channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gating {
    /// The number of such gates in each channel. For instance, the 4
    /// activation gates of a potassium channel, or the 1 inactivation
    /// gate of a sodium channel.
    pub gates: u8,
    /// Opening rate.
    pub alpha: RateFunction,
    /// Closing rate.
    pub beta: RateFunction,
}

impl Gating {
    pub fn steady_state(&self, v: &MilliVolts) -> f64 {
        let alpha = self.alpha.rate(v);
        alpha / (alpha + self.beta.rate(v))
    }

    pub fn tau(&self, v: &MilliVolts) -> Millis {
        Millis(1.0 / (self.alpha.rate(v) + self.beta.rate(v)))
    }
}

/// The state for a particular type of gate (either the activation or
/// inactivation gate).
#[derive(Clone, Debug, PartialEq)]
pub struct GateState {
    /// The current open fraction. 'm', 'n' or 'h' in the Hodgkin-Huxley model.
    pub magnitude: f64,
    pub parameters: Gating,
}

impl GateState {
    /// Relax the gate toward its steady state at the given potential.
    /// Exponential Euler: exact for a constant potential over the interval.
    pub fn step(&mut self, membrane_potential: &MilliVolts, interval: &Millis) {
        let v_inf = self.parameters.steady_state(membrane_potential);
        let tau = self.parameters.tau(membrane_potential);
        self.magnitude = v_inf + (self.magnitude - v_inf) * (-interval.0 / tau.0).exp();
    }

    fn coefficient(&self) -> f64 {
        self.magnitude.powi(self.parameters.gates as i32)
    }
}

/// A voltage-gated (or ungated) conductance with a fixed reversal potential.
#[derive(Clone, Debug, PartialEq)]
pub struct Channel {
    pub name: &'static str,
    pub activation: Option<GateState>,
    pub inactivation: Option<GateState>,
    /// Conductance with every gate open.
    pub max_conductance: SiemensPerSquareCm,
    pub reversal: MilliVolts,
}

impl Channel {
    pub fn step(&mut self, membrane_potential: &MilliVolts, interval: &Millis) {
        self.activation
            .iter_mut()
            .for_each(|activation| activation.step(membrane_potential, interval));
        self.inactivation
            .iter_mut()
            .for_each(|inactivation| inactivation.step(membrane_potential, interval));
    }

    /// The product of the various gates in the channel.
    pub fn conductance_coefficient(&self) -> f64 {
        let activation = self.activation.as_ref().map_or(1.0, GateState::coefficient);
        let inactivation = self.inactivation.as_ref().map_or(1.0, GateState::coefficient);
        activation * inactivation
    }

    pub fn conductance(&self) -> SiemensPerSquareCm {
        SiemensPerSquareCm(self.max_conductance.0 * self.conductance_coefficient())
    }
}

#[derive(Clone, Debug)]
pub struct ChannelBuilder {
    pub name: &'static str,
    pub activation_parameters: Option<Gating>,
    pub inactivation_parameters: Option<Gating>,
    pub max_conductance: SiemensPerSquareCm,
    pub reversal: MilliVolts,
}

impl ChannelBuilder {
    /// Construct a channel with its gates at their steady-state levels for
    /// the initial membrane potential.
    pub fn build(&self, initial_membrane_potential: &MilliVolts) -> Channel {
        let gate = |parameters: &Gating| GateState {
            magnitude: parameters.steady_state(initial_membrane_potential),
            parameters: *parameters,
        };
        Channel {
            name: self.name,
            activation: self.activation_parameters.as_ref().map(gate),
            inactivation: self.inactivation_parameters.as_ref().map(gate),
            max_conductance: self.max_conductance,
            reversal: self.reversal,
        }
    }
}

pub mod common_channels {

    /// The squid giant axon channels at 6.3 degrees C.
    pub mod hodgkin_huxley {
        use crate::dimension::{MilliVolts, SiemensPerSquareCm};
        use crate::neuron::channel::*;

        pub const NA_CHANNEL: ChannelBuilder = ChannelBuilder {
            name: "na",
            activation_parameters: Some(Gating {
                gates: 3,
                alpha: RateFunction::Linoid {
                    a: 0.1,
                    v_half: MilliVolts(-40.0),
                    k: 10.0,
                },
                beta: RateFunction::Exponential {
                    a: 4.0,
                    v_half: MilliVolts(-65.0),
                    k: 18.0,
                },
            }),
            inactivation_parameters: Some(Gating {
                gates: 1,
                alpha: RateFunction::Exponential {
                    a: 0.07,
                    v_half: MilliVolts(-65.0),
                    k: 20.0,
                },
                beta: RateFunction::Sigmoid {
                    a: 1.0,
                    v_half: MilliVolts(-35.0),
                    k: 10.0,
                },
            }),
            max_conductance: SiemensPerSquareCm(0.12),
            reversal: MilliVolts(50.0),
        };

        pub const K_CHANNEL: ChannelBuilder = ChannelBuilder {
            name: "k",
            activation_parameters: Some(Gating {
                gates: 4,
                alpha: RateFunction::Linoid {
                    a: 0.01,
                    v_half: MilliVolts(-55.0),
                    k: 10.0,
                },
                beta: RateFunction::Exponential {
                    a: 0.125,
                    v_half: MilliVolts(-65.0),
                    k: 80.0,
                },
            }),
            inactivation_parameters: None,
            max_conductance: SiemensPerSquareCm(0.036),
            reversal: MilliVolts(-77.0),
        };

        pub const LEAK_CHANNEL: ChannelBuilder = ChannelBuilder {
            name: "l",
            activation_parameters: None,
            inactivation_parameters: None,
            max_conductance: SiemensPerSquareCm(0.0003),
            reversal: MilliVolts(-54.3),
        };

        /// The full active mechanism set, gates at steady state.
        pub fn channels(initial_membrane_potential: &MilliVolts) -> Vec<Channel> {
            [NA_CHANNEL, K_CHANNEL, LEAK_CHANNEL]
                .iter()
                .map(|builder| builder.build(initial_membrane_potential))
                .collect()
        }
    }
}
