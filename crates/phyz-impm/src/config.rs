//! Solver configuration.
//!
//! Configs are plain serde structs so scenes can be described in JSON:
//!
//! ```
//! use phyz_impm::SolverConfig;
//!
//! let config = SolverConfig::from_json(
//!     r#"{
//!         "grid": { "origin": [0.0, 0.0], "cell_size": 0.5, "cells": [8, 8] },
//!         "gravity": 9.8
//!     }"#,
//! )
//! .unwrap();
//! assert_eq!(config.gravity, 9.8);
//! ```

use serde::{Deserialize, Serialize};

use crate::enrichment::EnrichmentPolicy;
use crate::error::{ImpmError, Result};

/// Particle-domain update scheme.
///
/// Only [`UpdateMethod::Cpdi2`] carries the per-corner weights the enriched
/// transfer needs; the others are rejected when the solver is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpdateMethod {
    /// Point-sampled particles with multilinear grid weights.
    Linear,
    /// Parallelogram domains (CPDI1).
    Cpdi,
    /// Arbitrary quadrilateral/hexahedral domains tracked by their corners.
    #[default]
    Cpdi2,
}

/// Uniform background grid description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Position of node (0, ..., 0) (m).
    pub origin: Vec<f64>,
    /// Edge length of a grid cell (m).
    pub cell_size: f64,
    /// Number of cells along each axis; nodes are `cells + 1`.
    pub cells: Vec<usize>,
}

impl GridConfig {
    /// Create a grid description.
    pub fn new(origin: &[f64], cell_size: f64, cells: &[usize]) -> Self {
        Self {
            origin: origin.to_vec(),
            cell_size,
            cells: cells.to_vec(),
        }
    }
}

fn default_gravity() -> f64 {
    phyz_math::GRAVITY
}

fn default_cfl() -> f64 {
    0.5
}

fn default_max_dt() -> f64 {
    1e-3
}

/// Full solver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    pub grid: GridConfig,
    /// Magnitude of gravity along -y (m/s²).
    #[serde(default = "default_gravity")]
    pub gravity: f64,
    #[serde(default)]
    pub update_method: UpdateMethod,
    #[serde(default)]
    pub enrichment: EnrichmentPolicy,
    /// Corners closer than this are merged into one mesh vertex. Zero merges
    /// only bit-identical positions.
    #[serde(default)]
    pub weld_tolerance: f64,
    /// CFL number used by `compute_time_step`.
    #[serde(default = "default_cfl")]
    pub cfl_number: f64,
    /// Upper bound on the time step (s).
    #[serde(default = "default_max_dt")]
    pub max_dt: f64,
}

impl SolverConfig {
    /// Config with default physics over the given grid.
    pub fn new(grid: GridConfig) -> Self {
        Self {
            grid,
            gravity: default_gravity(),
            update_method: UpdateMethod::default(),
            enrichment: EnrichmentPolicy::default(),
            weld_tolerance: 0.0,
            cfl_number: default_cfl(),
            max_dt: default_max_dt(),
        }
    }

    /// Parse a config from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SolverConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_gravity(mut self, gravity: f64) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_update_method(mut self, method: UpdateMethod) -> Self {
        self.update_method = method;
        self
    }

    pub fn with_enrichment(mut self, policy: EnrichmentPolicy) -> Self {
        self.enrichment = policy;
        self
    }

    pub fn with_weld_tolerance(mut self, tolerance: f64) -> Self {
        self.weld_tolerance = tolerance;
        self
    }

    pub fn with_cfl_number(mut self, cfl: f64) -> Self {
        self.cfl_number = cfl;
        self
    }

    pub fn with_max_dt(mut self, max_dt: f64) -> Self {
        self.max_dt = max_dt;
        self
    }

    /// Check value ranges. Dimension consistency is checked when the grid is built.
    pub fn validate(&self) -> Result<()> {
        if !(self.grid.cell_size > 0.0 && self.grid.cell_size.is_finite()) {
            return Err(ImpmError::InvalidParameter(format!(
                "grid cell size must be positive, got {}",
                self.grid.cell_size
            )));
        }
        if self.grid.origin.len() != self.grid.cells.len() {
            return Err(ImpmError::InvalidParameter(format!(
                "grid origin has {} components but cells has {}",
                self.grid.origin.len(),
                self.grid.cells.len()
            )));
        }
        if self.grid.cells.iter().any(|&n| n == 0) {
            return Err(ImpmError::InvalidParameter(
                "grid needs at least one cell per axis".into(),
            ));
        }
        if !self.gravity.is_finite() {
            return Err(ImpmError::InvalidParameter("gravity must be finite".into()));
        }
        if !(self.weld_tolerance >= 0.0) {
            return Err(ImpmError::InvalidParameter(
                "weld tolerance must be non-negative".into(),
            ));
        }
        if !(self.cfl_number > 0.0 && self.cfl_number <= 1.0) {
            return Err(ImpmError::InvalidParameter(format!(
                "CFL number must lie in (0, 1], got {}",
                self.cfl_number
            )));
        }
        if !(self.max_dt > 0.0) {
            return Err(ImpmError::InvalidParameter("max_dt must be positive".into()));
        }
        self.enrichment.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_defaults() {
        let config = SolverConfig::from_json(
            r#"{ "grid": { "origin": [0.0, 0.0, 0.0], "cell_size": 0.1, "cells": [4, 4, 4] } }"#,
        )
        .unwrap();
        assert_eq!(config.gravity, phyz_math::GRAVITY);
        assert_eq!(config.update_method, UpdateMethod::Cpdi2);
        assert_eq!(config.weld_tolerance, 0.0);
    }

    #[test]
    fn test_json_round_trip_preserves_builder_values() {
        let config = SolverConfig::new(GridConfig::new(&[0.0, 0.0], 0.25, &[4, 4]))
            .with_gravity(9.8)
            .with_enrichment(EnrichmentPolicy::Always)
            .with_max_dt(0.01);
        let parsed = SolverConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let grid = GridConfig::new(&[0.0, 0.0], 0.25, &[4, 4]);
        assert!(SolverConfig::new(grid.clone()).validate().is_ok());
        assert!(
            SolverConfig::new(GridConfig::new(&[0.0, 0.0], -1.0, &[4, 4]))
                .validate()
                .is_err()
        );
        assert!(
            SolverConfig::new(GridConfig::new(&[0.0], 1.0, &[4, 4]))
                .validate()
                .is_err()
        );
        assert!(
            SolverConfig::new(grid.clone())
                .with_cfl_number(1.5)
                .validate()
                .is_err()
        );
        assert!(
            SolverConfig::new(grid)
                .with_weld_tolerance(-1.0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let err = SolverConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ImpmError::Config(_)));
    }
}
