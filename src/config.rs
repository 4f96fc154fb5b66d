//! Engine configuration.
//!
//! Every tunable the engine uses lives here with its default. The whole tree
//! deserializes from JSON with missing fields falling back to defaults, so a
//! config file only needs to mention what it overrides.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{NavError, NavResult};

/// Edge length of one cost-grid cell, in raw floor-plan units.
pub const DEFAULT_CELL_SIZE: f64 = 10.0;

/// Weight applied to the Manhattan heuristic.
///
/// Empirical: keeps the search biased towards direct routes while staying
/// below the cheapest possible per-cell cost of 1.
pub const DEFAULT_HEURISTIC_WEIGHT: f64 = 0.5;

/// Expansion cap after which a search reports no path.
pub const DEFAULT_MAX_EXPANSIONS: usize = 50_000;

/// Interior points closer than this (world units) to their neighbours'
/// chord are dropped by the smoother.
pub const DEFAULT_SMOOTHING_THRESHOLD: f64 = 5.0;

/// Cadence (steps/s) above which the fast-walking stride adjustment kicks in.
pub const FAST_CADENCE_THRESHOLD: f64 = 2.0;

/// Multiplier applied to `k` while walking fast. Empirical gait tuning.
pub const FAST_CADENCE_K_FACTOR: f64 = 1.15;

/// Raw floor-plan units per centimetre walked.
pub const DEFAULT_UNITS_PER_CM: f64 = 0.5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub cell_size: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            cell_size: DEFAULT_CELL_SIZE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub heuristic_weight: f64,
    pub max_expansions: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            heuristic_weight: DEFAULT_HEURISTIC_WEIGHT,
            max_expansions: DEFAULT_MAX_EXPANSIONS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub threshold: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        SmoothingConfig {
            threshold: DEFAULT_SMOOTHING_THRESHOLD,
        }
    }
}

/// Walker-specific stride parameters, normally from user settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrideConfig {
    /// Body height in centimetres
    pub height_cm: f64,
    pub k: f64,
    pub c: f64,
    /// Number of recent cadences averaged
    pub window: usize,
}

impl Default for StrideConfig {
    fn default() -> Self {
        StrideConfig {
            height_cm: 170.0,
            k: 0.37,
            c: 0.15,
            window: 5,
        }
    }
}

impl StrideConfig {
    pub fn new(height_cm: f64, k: f64, c: f64, window: usize) -> Self {
        StrideConfig {
            height_cm,
            k,
            c,
            window,
        }
    }

    pub fn validate(&self) -> NavResult<()> {
        if !(self.height_cm.is_finite() && self.height_cm > 0.0) {
            return Err(NavError::InvalidConfig(format!(
                "height must be positive, got {}",
                self.height_cm
            )));
        }
        if self.window == 0 {
            return Err(NavError::InvalidConfig(
                "cadence window must hold at least one sample".to_string(),
            ));
        }
        if !self.k.is_finite() || !self.c.is_finite() {
            return Err(NavError::InvalidConfig("k and c must be finite".to_string()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub units_per_cm: f64,
    pub fast_cadence_threshold: f64,
    pub fast_cadence_k_factor: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            units_per_cm: DEFAULT_UNITS_PER_CM,
            fast_cadence_threshold: FAST_CADENCE_THRESHOLD,
            fast_cadence_k_factor: FAST_CADENCE_K_FACTOR,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    pub grid: GridConfig,
    pub search: SearchConfig,
    pub smoothing: SmoothingConfig,
    pub stride: StrideConfig,
    pub tracker: TrackerConfig,
}

impl NavConfig {
    pub fn from_json_str(json: &str) -> NavResult<Self> {
        let config: NavConfig = serde_json::from_str(json)
            .map_err(|e| NavError::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> NavResult<Self> {
        let file = File::open(path).map_err(|e| {
            NavError::InvalidConfig(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let config: NavConfig = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| NavError::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> NavResult<()> {
        if !(self.grid.cell_size.is_finite() && self.grid.cell_size > 0.0) {
            return Err(NavError::InvalidConfig(format!(
                "cell size must be positive, got {}",
                self.grid.cell_size
            )));
        }
        if !(self.search.heuristic_weight >= 0.0) {
            return Err(NavError::InvalidConfig(
                "heuristic weight must be non-negative".to_string(),
            ));
        }
        if !(self.tracker.units_per_cm.is_finite() && self.tracker.units_per_cm > 0.0) {
            return Err(NavError::InvalidConfig(
                "units per cm must be positive".to_string(),
            ));
        }
        self.stride.validate()
    }
}
