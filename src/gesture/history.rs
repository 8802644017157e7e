//! Bounded intensity history and per-kind detection statistics.

use std::collections::VecDeque;

/// Maximum intensity samples kept per activation.
pub const HISTORY_CAPACITY: usize = 10;

// ── IntensityHistory ────────────────────────────────────────

/// FIFO ring of the most recent intensity readings of one activation.
#[derive(Debug, Clone)]
pub struct IntensityHistory {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl Default for IntensityHistory {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

impl IntensityHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a reading, evicting the oldest if full.
    pub fn push(&mut self, intensity: f64) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(intensity);
    }

    /// Mean of the retained readings (0.0 when empty).
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Largest retained reading (0.0 when empty).
    pub fn peak(&self) -> f64 {
        self.samples.iter().copied().fold(0.0, f64::max)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Oldest-first view of the retained readings.
    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.samples.iter()
    }
}

// ── GestureStats ────────────────────────────────────────────

/// Running totals for one gesture kind across activations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GestureStats {
    /// Qualifying observations accepted.
    pub observations: u64,
    /// Readings rejected by threshold or confidence gating.
    pub rejected: u64,
    /// Activations started.
    pub activations: u64,
    /// Triggered events emitted.
    pub triggers: u64,
    /// Highest intensity ever accepted.
    pub peak_intensity: f64,
    /// Sum of the average intensities reported at trigger time.
    trigger_intensity_sum: f64,
}

impl GestureStats {
    pub fn record_observation(&mut self, intensity: f64) {
        self.observations += 1;
        if intensity > self.peak_intensity {
            self.peak_intensity = intensity;
        }
    }

    pub fn record_rejection(&mut self) {
        self.rejected += 1;
    }

    pub fn record_activation(&mut self) {
        self.activations += 1;
    }

    pub fn record_trigger(&mut self, average_intensity: f64) {
        self.triggers += 1;
        self.trigger_intensity_sum += average_intensity;
    }

    /// Mean intensity over all triggered events.
    pub fn mean_trigger_intensity(&self) -> f64 {
        if self.triggers == 0 {
            0.0
        } else {
            self.trigger_intensity_sum / self.triggers as f64
        }
    }

    /// Fraction of activations that ended up triggering.
    pub fn trigger_ratio(&self) -> f64 {
        if self.activations == 0 {
            0.0
        } else {
            self.triggers as f64 / self.activations as f64
        }
    }

    pub fn to_sexp(&self) -> String {
        format!(
            "(:observations {} :rejected {} :activations {} :triggers {} :trigger-ratio {:.2} :peak {:.2} :mean-trigger-intensity {:.2})",
            self.observations,
            self.rejected,
            self.activations,
            self.triggers,
            self.trigger_ratio(),
            self.peak_intensity,
            self.mean_trigger_intensity(),
        )
    }
}
