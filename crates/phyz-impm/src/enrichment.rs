//! Enrichment of particle-domain corners.
//!
//! An enriched corner carries its own mass and velocity and moves independently
//! of the background grid for the current step. Enrichment is decided per
//! particle: when the criterion holds, every corner of that particle's domain
//! is enriched.

use phyz_math::{determinant, frobenius_condition};
use serde::{Deserialize, Serialize};

use crate::error::{ImpmError, Result};
use crate::particle::SolidParticle;

/// Decides whether a particle's domain corners are enriched this step.
pub trait EnrichmentCriterion<const D: usize>: Send + Sync {
    fn is_satisfied(&self, object: usize, particle_idx: usize, particle: &SolidParticle<D>) -> bool;
}

impl<const D: usize, F> EnrichmentCriterion<D> for F
where
    F: Fn(usize, usize, &SolidParticle<D>) -> bool + Send + Sync,
{
    fn is_satisfied(&self, object: usize, particle_idx: usize, particle: &SolidParticle<D>) -> bool {
        self(object, particle_idx, particle)
    }
}

/// Built-in enrichment criteria, selectable from config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EnrichmentPolicy {
    /// Plain CPDI2: every particle is transferred through the grid.
    Never,
    /// Every corner of every particle is enriched.
    Always,
    /// Enrich particles whose deformation is severe.
    DeformationSeverity {
        /// Enrich when det F drops below this.
        min_volume_ratio: f64,
        /// Enrich when det F exceeds this.
        max_volume_ratio: f64,
        /// Enrich when ‖F‖·‖F⁻¹‖ (Frobenius) exceeds this.
        max_condition: f64,
    },
}

impl Default for EnrichmentPolicy {
    fn default() -> Self {
        EnrichmentPolicy::DeformationSeverity {
            min_volume_ratio: 0.25,
            max_volume_ratio: 4.0,
            max_condition: 20.0,
        }
    }
}

impl EnrichmentPolicy {
    pub fn validate(&self) -> Result<()> {
        if let EnrichmentPolicy::DeformationSeverity {
            min_volume_ratio,
            max_volume_ratio,
            max_condition,
        } = *self
        {
            if !(min_volume_ratio > 0.0 && min_volume_ratio <= 1.0) {
                return Err(ImpmError::InvalidParameter(format!(
                    "min_volume_ratio must lie in (0, 1], got {min_volume_ratio}"
                )));
            }
            if !(max_volume_ratio >= 1.0) {
                return Err(ImpmError::InvalidParameter(format!(
                    "max_volume_ratio must be at least 1, got {max_volume_ratio}"
                )));
            }
            if !(max_condition > 0.0) {
                return Err(ImpmError::InvalidParameter(format!(
                    "max_condition must be positive, got {max_condition}"
                )));
            }
        }
        Ok(())
    }
}

impl<const D: usize> EnrichmentCriterion<D> for EnrichmentPolicy {
    fn is_satisfied(&self, _object: usize, _particle_idx: usize, particle: &SolidParticle<D>) -> bool {
        match *self {
            EnrichmentPolicy::Never => false,
            EnrichmentPolicy::Always => true,
            EnrichmentPolicy::DeformationSeverity {
                min_volume_ratio,
                max_volume_ratio,
                max_condition,
            } => {
                let j = determinant(&particle.f);
                j < min_volume_ratio
                    || j > max_volume_ratio
                    || frobenius_condition(&particle.f) > max_condition
            }
        }
    }
}

/// Three-way classification of a particle by how many of its corners are enriched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticleKind {
    /// No enriched corner: transfers through the grid only.
    Ordinary,
    /// Some corners enriched: transfers through the grid and the enriched corners.
    Transient,
    /// All corners enriched: transfers through its corners only.
    Enriched,
}

impl ParticleKind {
    pub fn classify(enriched_count: usize, corner_num: usize) -> Self {
        debug_assert!(enriched_count <= corner_num);
        if enriched_count == 0 {
            ParticleKind::Ordinary
        } else if enriched_count < corner_num {
            ParticleKind::Transient
        } else {
            ParticleKind::Enriched
        }
    }

    /// Whether the particle exchanges data with grid nodes.
    #[inline]
    pub fn uses_grid(self) -> bool {
        self != ParticleKind::Enriched
    }

    /// Whether the particle exchanges data with enriched corners.
    #[inline]
    pub fn uses_corners(self) -> bool {
        self != ParticleKind::Ordinary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;
    use phyz_math::{Mat2, Vec2};

    fn particle() -> SolidParticle<2> {
        SolidParticle::new(
            Vec2::zeros(),
            Vec2::zeros(),
            1.0,
            1.0,
            Material::NeoHookean { e: 1e4, nu: 0.3 },
        )
    }

    #[test]
    fn test_classification() {
        assert_eq!(ParticleKind::classify(0, 4), ParticleKind::Ordinary);
        assert_eq!(ParticleKind::classify(2, 4), ParticleKind::Transient);
        assert_eq!(ParticleKind::classify(4, 4), ParticleKind::Enriched);
        assert!(ParticleKind::Transient.uses_grid() && ParticleKind::Transient.uses_corners());
        assert!(!ParticleKind::Enriched.uses_grid());
        assert!(!ParticleKind::Ordinary.uses_corners());
    }

    #[test]
    fn test_fixed_policies() {
        let p = particle();
        assert!(!EnrichmentPolicy::Never.is_satisfied(0, 0, &p));
        assert!(EnrichmentPolicy::Always.is_satisfied(0, 0, &p));
    }

    #[test]
    fn test_deformation_severity() {
        let policy = EnrichmentPolicy::default();
        let mut p = particle();
        assert!(!policy.is_satisfied(0, 0, &p));

        p.f = Mat2::identity() * 0.4; // det = 0.16
        assert!(policy.is_satisfied(0, 0, &p));

        p.f = Mat2::new(1.0, 10.0, 0.0, 1.0); // volume preserving, badly conditioned
        assert!(policy.is_satisfied(0, 0, &p));
    }

    #[test]
    fn test_closure_criterion() {
        let only_first = |_obj: usize, idx: usize, _p: &SolidParticle<2>| idx == 0;
        let p = particle();
        assert!(only_first.is_satisfied(0, 0, &p));
        assert!(!only_first.is_satisfied(0, 1, &p));
    }

    #[test]
    fn test_policy_validation() {
        assert!(EnrichmentPolicy::default().validate().is_ok());
        let bad = EnrichmentPolicy::DeformationSeverity {
            min_volume_ratio: 2.0,
            max_volume_ratio: 4.0,
            max_condition: 10.0,
        };
        assert!(bad.validate().is_err());
    }
}
