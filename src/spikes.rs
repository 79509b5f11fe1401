use crate::constants::REFRACTORY_PERIOD;
use crate::dimension::{Hz, Millis};
use crate::engine::TraceTable;

/// Spike times at upward crossings of `threshold`.
///
/// A sample counts when it is strictly above the threshold, its predecessor
/// is at or below it, and more than the refractory period has passed since
/// the last accepted spike. Only the common prefix of the two sequences is
/// scanned.
pub fn detect(voltages: &[f64], times: &[f64], threshold: f64) -> Vec<f64> {
    let mut spikes = vec![];
    let mut last_spike = -REFRACTORY_PERIOD.0;
    let samples = voltages.len().min(times.len());
    for j in 1..samples {
        let rising = voltages[j] > threshold && voltages[j - 1] <= threshold;
        if rising && times[j] - last_spike > REFRACTORY_PERIOD.0 {
            spikes.push(times[j]);
            last_spike = times[j];
        }
    }
    spikes
}

pub fn firing_rate(spike_count: usize, duration: Millis) -> Hz {
    if duration.0 <= 0.0 {
        return Hz(0.0);
    }
    Hz(spike_count as f64 / duration.seconds())
}

/// `(neuron index, spike time)` for every soma trace in the table, ordered by
/// neuron and then by time.
pub fn raster(table: &TraceTable, threshold: f64) -> Vec<(usize, f64)> {
    (0..table.neuron_count())
        .filter_map(|neuron| table.soma(neuron).map(|trace| (neuron, trace)))
        .flat_map(|(neuron, trace)| {
            detect(trace, table.time(), threshold)
                .into_iter()
                .map(move |t| (neuron, t))
        })
        .collect()
}

/// Spikes per neuron across a whole table.
pub fn counts(table: &TraceTable, threshold: f64) -> Vec<usize> {
    (0..table.neuron_count())
        .map(|neuron| {
            table
                .soma(neuron)
                .map(|trace| detect(trace, table.time(), threshold).len())
                .unwrap_or(0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn times(n: usize, dt: f64) -> Vec<f64> {
        (0..n).map(|i| i as f64 * dt).collect()
    }

    #[test]
    fn crossings_within_refractory_period_are_suppressed() {
        // Upward crossings at 1.0 and 2.5 ms.
        let t = times(8, 0.5);
        let v = vec![-70.0, -70.0, 0.0, -70.0, -70.0, 0.0, -70.0, -70.0];
        assert_eq!(detect(&v, &t, -20.0), vec![1.0]);
    }

    #[test]
    fn crossings_beyond_refractory_period_are_both_reported() {
        // Upward crossings at 1.0 and 3.5 ms.
        let t = times(10, 0.5);
        let v = vec![-70.0, -70.0, 0.0, -70.0, -70.0, -70.0, -70.0, 0.0, -70.0, -70.0];
        assert_eq!(detect(&v, &t, -20.0), vec![1.0, 3.5]);
    }

    #[test]
    fn exactly_refractory_gap_is_suppressed() {
        let t = times(6, 1.0);
        let v = vec![-70.0, 0.0, -70.0, 0.0, -70.0, -70.0];
        assert_eq!(detect(&v, &t, -20.0), vec![1.0]);
    }

    #[test]
    fn flat_trace_at_threshold_has_no_spikes() {
        let t = times(100, 0.1);
        let v = vec![-20.0; 100];
        assert!(detect(&v, &t, -20.0).is_empty());
    }

    #[test]
    fn spike_at_first_step_is_not_refractory() {
        let v = vec![-70.0, 10.0];
        assert_eq!(detect(&v, &[0.0, 0.025], -20.0), vec![0.025]);
    }

    #[test]
    fn a_trace_starting_above_threshold_does_not_spike_immediately() {
        let v = vec![10.0, 10.0, 10.0];
        assert!(detect(&v, &times(3, 1.0), -20.0).is_empty());
    }

    #[test]
    fn mismatched_lengths_scan_common_prefix() {
        let v = vec![-70.0, 0.0, -70.0, -70.0, -70.0, 0.0];
        let t = times(4, 1.0);
        assert_eq!(detect(&v, &t, -20.0), vec![1.0]);
    }

    #[test]
    fn raster_lists_spikes_by_neuron() {
        use crate::dimension::{MicroFaradsPerSquareCm, NanoAmps, OhmSquareCm};
        use crate::engine::SimulationEngine;
        use crate::kernel::CableKernel;
        use crate::network::Network;
        use crate::neuron::{self, ModelKind};
        use crate::stimulator;

        let neurons = (0..2)
            .map(|_| {
                neuron::build(
                    ModelKind::SimpleSoma,
                    OhmSquareCm(10000.0),
                    MicroFaradsPerSquareCm(1.0),
                )
                .unwrap()
            })
            .collect();
        let stimulus =
            stimulator::current_clamp(0, Millis(1.0), Millis(5.0), NanoAmps(0.5)).unwrap();
        let network = Network::new(neurons).unwrap().with_stimulus(stimulus).unwrap();
        let mut engine = SimulationEngine::new(CableKernel::new());
        let table = engine.run(&network, Millis(10.0), Millis(0.025)).unwrap();

        let raster = raster(&table, -20.0);
        assert_eq!(raster.len(), 1);
        assert_eq!(raster[0].0, 0);
        assert!(raster[0].1 > 1.0 && raster[0].1 < 2.0);
        assert_eq!(counts(&table, -20.0), vec![1, 0]);
    }

    #[test]
    fn firing_rate_is_per_second() {
        assert_relative_eq!(firing_rate(5, Millis(500.0)).0, 10.0);
        assert_eq!(firing_rate(5, Millis(0.0)).0, 0.0);
    }
}
