use serde::{Deserialize, Serialize};

/// Length in micrometers.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Microns(pub f64);

impl Microns {
    pub fn cm(&self) -> f64 {
        self.0 * 1e-4
    }
}

/// Simulation time and time intervals, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Millis(pub f64);

impl Millis {
    pub fn seconds(&self) -> f64 {
        self.0 * 1e-3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct MilliVolts(pub f64);

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct NanoAmps(pub f64);

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct MicroSiemens(pub f64);

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct SiemensPerSquareCm(pub f64);

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct MicroFaradsPerSquareCm(pub f64);

/// Specific membrane resistance.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct OhmSquareCm(pub f64);

/// Specific axial (cytoplasmic) resistance.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct OhmCm(pub f64);

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Hz(pub f64);
