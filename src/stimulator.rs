use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{SOMA_CENTER, STIMULUS_CONNECTION_DELAY};
use crate::dimension::{MicroSiemens, Millis, MilliVolts, NanoAmps};
use crate::error::{Error, Result};
use crate::neuron::synapse::{Synapse, SynapseKind};
use crate::neuron::Site;

/// A regular source of synaptic events. The default train fires once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTrain {
    pub onset: Millis,
    pub interval: Millis,
    pub number: u32,
}

impl EventTrain {
    pub fn event_times(&self) -> impl Iterator<Item = Millis> + '_ {
        (0..self.number).map(move |i| Millis(self.onset.0 + i as f64 * self.interval.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynapticTrain {
    pub source: EventTrain,
    pub synapse: Synapse,
    pub weight: MicroSiemens,
    pub delay: Millis,
}

impl SynapticTrain {
    /// Fire `number` events, `interval` apart, instead of one.
    pub fn repeating(mut self, number: u32, interval: Millis) -> Result<SynapticTrain> {
        if interval.0.is_nan() || interval.0 <= 0.0 {
            return Err(Error::InvalidStimulus(format!(
                "event interval must be positive, got {} ms",
                interval.0
            )));
        }
        self.source.number = number;
        self.source.interval = interval;
        Ok(self)
    }
}

/// A square current pulse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentClamp {
    pub site: Site,
    pub delay: Millis,
    pub duration: Millis,
    pub amplitude: NanoAmps,
}

impl CurrentClamp {
    pub fn current(&self, t: Millis) -> NanoAmps {
        let in_pulse = t.0 >= self.delay.0 && t.0 < self.delay.0 + self.duration.0;
        if in_pulse {
            self.amplitude
        } else {
            NanoAmps(0.0)
        }
    }
}

/// Holds the target at `level` from the start of the run for `duration`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageClamp {
    pub site: Site,
    pub duration: Millis,
    pub level: MilliVolts,
}

impl VoltageClamp {
    pub fn holds(&self, t: Millis) -> bool {
        t.0 < self.duration.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stimulus {
    SynapticTrain(SynapticTrain),
    CurrentClamp(CurrentClamp),
    VoltageClamp(VoltageClamp),
}

impl Stimulus {
    /// Index of the neuron receiving the stimulus.
    pub fn target(&self) -> usize {
        match self {
            Stimulus::SynapticTrain(train) => train.synapse.site.neuron,
            Stimulus::CurrentClamp(clamp) => clamp.site.neuron,
            Stimulus::VoltageClamp(clamp) => clamp.site.neuron,
        }
    }

    pub fn kind(&self) -> StimulusKind {
        match self {
            Stimulus::SynapticTrain(_) => StimulusKind::NetStim,
            Stimulus::CurrentClamp(_) => StimulusKind::IClamp,
            Stimulus::VoltageClamp(_) => StimulusKind::VClamp,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StimulusKind {
    NetStim,
    IClamp,
    VClamp,
}

impl fmt::Display for StimulusKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            StimulusKind::NetStim => "NetStim",
            StimulusKind::IClamp => "IClamp",
            StimulusKind::VClamp => "VClamp",
        };
        write!(f, "{name}")
    }
}

impl FromStr for StimulusKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NetStim" => Ok(StimulusKind::NetStim),
            "IClamp" => Ok(StimulusKind::IClamp),
            "VClamp" => Ok(StimulusKind::VClamp),
            _ => Err(Error::UnknownStimulusKind(s.to_string())),
        }
    }
}

fn non_negative(what: &str, value: Millis) -> Result<()> {
    if value.0 >= 0.0 && value.0.is_finite() {
        Ok(())
    } else {
        Err(Error::InvalidStimulus(format!(
            "{what} must be a non-negative number of ms, got {}",
            value.0
        )))
    }
}

/// A single synaptic event at `onset`, delivered to a fresh synapse of the
/// given kind at the center of the target's soma.
pub fn synaptic_train(
    target: usize,
    kind: SynapseKind,
    weight: MicroSiemens,
    onset: Millis,
) -> Result<Stimulus> {
    non_negative("onset", onset)?;
    Ok(Stimulus::SynapticTrain(SynapticTrain {
        source: EventTrain {
            onset,
            interval: Millis(10.0),
            number: 1,
        },
        synapse: Synapse::new(kind, Site::soma(target, SOMA_CENTER)),
        weight,
        delay: STIMULUS_CONNECTION_DELAY,
    }))
}

pub fn current_clamp(
    target: usize,
    delay: Millis,
    duration: Millis,
    amplitude: NanoAmps,
) -> Result<Stimulus> {
    non_negative("delay", delay)?;
    non_negative("duration", duration)?;
    Ok(Stimulus::CurrentClamp(CurrentClamp {
        site: Site::soma(target, SOMA_CENTER),
        delay,
        duration,
        amplitude,
    }))
}

pub fn voltage_clamp(target: usize, duration: Millis, level: MilliVolts) -> Result<Stimulus> {
    non_negative("duration", duration)?;
    Ok(Stimulus::VoltageClamp(VoltageClamp {
        site: Site::soma(target, SOMA_CENTER),
        duration,
        level,
    }))
}
