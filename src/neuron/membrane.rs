use crate::constants::LEAK_REVERSAL;
use crate::dimension::{
    MicroFaradsPerSquareCm, MilliVolts, Millis, OhmSquareCm, SiemensPerSquareCm,
};
use crate::neuron::channel::{common_channels::hodgkin_huxley, Channel};

/// The passive leak mechanism present on every compartment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PassiveLeak {
    pub conductance: SiemensPerSquareCm,
    pub reversal: MilliVolts,
}

impl PassiveLeak {
    /// A leak whose conductance is the reciprocal of the specific membrane
    /// resistance.
    pub fn from_resistance(membrane_resistance: OhmSquareCm) -> PassiveLeak {
        PassiveLeak {
            conductance: SiemensPerSquareCm(1.0 / membrane_resistance.0),
            reversal: LEAK_REVERSAL,
        }
    }
}

/// The electrical properties of a compartment's membrane: its capacitance,
/// its passive leak, and any inserted voltage-gated channels.
#[derive(Clone, Debug, PartialEq)]
pub struct Membrane {
    pub capacitance: MicroFaradsPerSquareCm,
    pub leak: PassiveLeak,
    /// Voltage-gated channels. Empty for passive compartments.
    pub active_channels: Vec<Channel>,
}

impl Membrane {
    pub fn passive(
        membrane_resistance: OhmSquareCm,
        capacitance: MicroFaradsPerSquareCm,
    ) -> Membrane {
        Membrane {
            capacitance,
            leak: PassiveLeak::from_resistance(membrane_resistance),
            active_channels: vec![],
        }
    }

    /// Insert the Hodgkin-Huxley channel set on top of the passive leak.
    pub fn insert_active(&mut self, initial_membrane_potential: &MilliVolts) {
        self.active_channels = hodgkin_huxley::channels(initial_membrane_potential);
    }

    pub fn is_active(&self) -> bool {
        !self.active_channels.is_empty()
    }

    /// Names of the inserted mechanisms.
    pub fn mechanisms(&self) -> Vec<&'static str> {
        if self.is_active() {
            vec!["pas", "hh"]
        } else {
            vec!["pas"]
        }
    }

    /// Total specific conductance and the reversal-weighted sum `sum(g * E)`
    /// in S/cm^2 * mV.
    pub fn conductance_and_drive(&self) -> (SiemensPerSquareCm, f64) {
        let leak = self.leak.conductance.0;
        let (conductance, drive) = self.active_channels.iter().fold(
            (leak, leak * self.leak.reversal.0),
            |(conductance, drive), channel| {
                let g = channel.conductance().0;
                (conductance + g, drive + g * channel.reversal.0)
            },
        );
        (SiemensPerSquareCm(conductance), drive)
    }

    /// Advance every gate to the given potential.
    pub fn step(&mut self, membrane_potential: &MilliVolts, interval: &Millis) {
        self.active_channels
            .iter_mut()
            .for_each(|channel| channel.step(membrane_potential, interval));
    }
}
