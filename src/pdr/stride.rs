use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::config::{StrideConfig, TrackerConfig};

/// Human stride bounds, centimetres
pub const MIN_STRIDE_CM: f64 = 30.0;
pub const MAX_STRIDE_CM: f64 = 120.0;

/// Weight of the instantaneous cadence in the blend with the rolling average
pub const INSTANT_CADENCE_WEIGHT: f64 = 0.3;

/// Running cadence/stride summary since the current origin
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CadenceState {
    /// Rolling average cadence, steps/s
    pub average_cadence: f64,
    pub last_stride_cm: f64,
    pub step_count: u64,
}

/// Result of estimating one step
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrideEstimate {
    pub instant_cadence: f64,
    pub average_cadence: f64,
    pub smoothed_cadence: f64,
    pub stride_cm: f64,
}

/// Cadence-driven stride length model
///
/// `stride = height · (k' · cadence + c)`, where cadence is a blend of the
/// latest step and a rolling average over the last `window` steps, and `k'`
/// is bumped for fast walking.
pub struct StrideEstimator {
    config: StrideConfig,
    fast_threshold: f64,
    fast_k_factor: f64,
    history: VecDeque<f64>,
}

impl StrideEstimator {
    pub fn new(config: StrideConfig, tuning: &TrackerConfig) -> Self {
        let window = config.window.max(1);
        StrideEstimator {
            config,
            fast_threshold: tuning.fast_cadence_threshold,
            fast_k_factor: tuning.fast_cadence_k_factor,
            history: VecDeque::with_capacity(window),
        }
    }

    pub fn config(&self) -> &StrideConfig {
        &self.config
    }

    /// Swap in new walker parameters, trimming history to the new window.
    pub fn reconfigure(&mut self, config: StrideConfig) {
        self.config = config;
        let window = self.window();
        while self.history.len() > window {
            self.history.pop_front();
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    fn window(&self) -> usize {
        self.config.window.max(1)
    }

    /// Feed one step interval and estimate its stride.
    pub fn estimate(&mut self, interval_ms: i64) -> StrideEstimate {
        let instant_cadence = if interval_ms > 0 {
            1000.0 / interval_ms as f64
        } else {
            0.0
        };

        self.history.push_back(instant_cadence);
        while self.history.len() > self.window() {
            self.history.pop_front();
        }

        let average_cadence = self.history.iter().sum::<f64>() / self.history.len() as f64;
        let smoothed_cadence = INSTANT_CADENCE_WEIGHT * instant_cadence
            + (1.0 - INSTANT_CADENCE_WEIGHT) * average_cadence;

        StrideEstimate {
            instant_cadence,
            average_cadence,
            smoothed_cadence,
            stride_cm: self.stride_cm(smoothed_cadence),
        }
    }

    /// Stride for a given cadence, clamped to human bounds.
    pub fn stride_cm(&self, cadence: f64) -> f64 {
        let k = if cadence > self.fast_threshold {
            self.config.k * self.fast_k_factor
        } else {
            self.config.k
        };

        let height_m = self.config.height_cm / 100.0;
        let stride_cm = height_m * (k * cadence + self.config.c) * 100.0;

        if stride_cm.is_nan() {
            return MIN_STRIDE_CM;
        }
        stride_cm.clamp(MIN_STRIDE_CM, MAX_STRIDE_CM)
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}
