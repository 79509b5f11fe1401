//! The boundary between the orchestration layer and whatever integrates
//! membrane voltage over time.

pub mod cable;

pub use cable::CableKernel;

use tracing::warn;
use uuid::Uuid;

use crate::constants::{EPSILON, MAX_STEPS, RESTING_POTENTIAL};
use crate::dimension::{MilliVolts, Millis};
use crate::error::{Error, Result};
use crate::network::Network;
use crate::neuron::Site;

/// A named voltage recording at one site.
#[derive(Clone, Debug, PartialEq)]
pub struct Probe {
    pub key: String,
    pub site: Site,
}

/// Everything a kernel needs for one run. Built fresh by the engine for every
/// run and dropped when the run ends.
#[derive(Clone, Debug)]
pub struct NetworkState<'a> {
    pub id: Uuid,
    pub network: &'a Network,
    pub probes: Vec<Probe>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Integration {
    pub dt: Millis,
    pub duration: Millis,
    pub v_init: MilliVolts,
}

impl Integration {
    /// Fails unless both the step and the duration are positive and finite,
    /// and the run takes at most `MAX_STEPS` steps.
    pub fn new(dt: Millis, duration: Millis) -> Result<Integration> {
        let valid = |x: f64| x.is_finite() && x > 0.0;
        if !valid(dt.0) || !valid(duration.0) || step_count(duration.0, dt.0).is_none() {
            warn!(dt = dt.0, duration = duration.0, "Rejected integration parameters");
            return Err(Error::InvalidIntegrationParameters {
                dt_ms: dt.0,
                duration_ms: duration.0,
            });
        }
        Ok(Integration {
            dt,
            duration,
            v_init: RESTING_POTENTIAL,
        })
    }

    /// Number of recorded samples, including the one at t = 0.
    pub fn samples(&self) -> usize {
        step_count(self.duration.0, self.dt.0).unwrap_or(MAX_STEPS) + 1
    }

    pub fn sample_time(&self, index: usize) -> f64 {
        index as f64 * self.dt.0
    }
}

/// Whole steps of `step` that fit in `span`, or `None` past `MAX_STEPS`.
pub(crate) fn step_count(span: f64, step: f64) -> Option<usize> {
    let steps = (span / step + EPSILON).floor();
    if steps.is_finite() && steps >= 0.0 && steps <= MAX_STEPS as f64 {
        Some(steps as usize)
    } else {
        None
    }
}

/// Kernel output: the shared time axis and one voltage sequence per probe, in
/// probe order.
#[derive(Clone, Debug, PartialEq)]
pub struct KernelOutput {
    pub time: Vec<f64>,
    pub traces: Vec<Vec<f64>>,
}

pub trait SimulationKernel {
    /// Discard all compartments, mechanisms, connections and queued events.
    fn reset(&mut self);

    fn integrate(
        &mut self,
        state: &NetworkState,
        integration: &Integration,
    ) -> Result<KernelOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_steps_are_rejected() {
        let cases = [
            (0.0, 10.0),
            (-0.1, 10.0),
            (0.1, 0.0),
            (0.1, -5.0),
            (f64::NAN, 1.0),
        ];
        for (dt, duration) in cases {
            assert!(matches!(
                Integration::new(Millis(dt), Millis(duration)),
                Err(Error::InvalidIntegrationParameters { .. })
            ));
        }
    }

    #[test]
    fn sample_count_includes_both_ends() {
        let integration = Integration::new(Millis(0.025), Millis(500.0)).unwrap();
        assert_eq!(integration.samples(), 20001);
        assert_eq!(integration.sample_time(20000), 500.0);
        assert_eq!(integration.v_init, MilliVolts(-65.0));

        let uneven = Integration::new(Millis(0.3), Millis(1.0)).unwrap();
        assert_eq!(uneven.samples(), 4);
    }

    #[test]
    fn steps_too_small_for_the_duration_are_rejected() {
        for dt in [1e-320, 1e-9, f64::MIN_POSITIVE] {
            assert!(matches!(
                Integration::new(Millis(dt), Millis(500.0)),
                Err(Error::InvalidIntegrationParameters { .. })
            ));
        }
        assert_eq!(step_count(1.0, 1e-320), None);
        assert_eq!(step_count(1.0, 0.25), Some(4));
    }

    #[test]
    fn hand_built_integration_never_overflows_sample_count() {
        let integration = Integration {
            dt: Millis(1e-320),
            duration: Millis(500.0),
            v_init: MilliVolts(-65.0),
        };
        assert_eq!(integration.samples(), MAX_STEPS + 1);
    }
}
