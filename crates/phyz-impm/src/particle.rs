//! Solid particle state for the invertible MPM solver.

use phyz_math::{Matrix, Vector, corner_count, corner_signs, determinant};
use smallvec::SmallVec;

use crate::error::{ImpmError, Result};
use crate::material::Material;

/// Corner positions of a particle domain, ordered as in [`phyz_math::hypercube`].
pub type DomainCorners<const D: usize> = SmallVec<[Vector<D>; 8]>;

/// A material point carrying a CPDI2 domain.
#[derive(Debug, Clone)]
pub struct SolidParticle<const D: usize> {
    /// Position (m).
    pub x: Vector<D>,
    /// Velocity (m/s).
    pub v: Vector<D>,
    /// Mass (kg).
    pub mass: f64,
    /// Current volume (m² in 2D, m³ in 3D).
    pub volume: f64,
    /// Volume at rest.
    pub initial_volume: f64,
    /// Deformation gradient F.
    pub f: Matrix<D>,
    /// Constitutive model.
    pub material: Material,
    /// Domain corners, 2^D of them.
    pub domain: DomainCorners<D>,
}

impl<const D: usize> SolidParticle<D> {
    /// Create a particle at rest whose domain is an axis-aligned box of
    /// volume `volume` centered at `x`.
    pub fn new(x: Vector<D>, v: Vector<D>, mass: f64, volume: f64, material: Material) -> Self {
        let half = 0.5 * volume.powf(1.0 / D as f64);
        let domain = (0..corner_count::<D>())
            .map(|c| x + corner_signs::<D>(c) * half)
            .collect();
        Self {
            x,
            v,
            mass,
            volume,
            initial_volume: volume,
            f: Matrix::<D>::identity(),
            material,
            domain,
        }
    }

    /// Replace the domain with explicit corner positions.
    pub fn with_domain(mut self, corners: &[Vector<D>]) -> Self {
        self.domain = corners.iter().copied().collect();
        self
    }

    /// Check the invariants the solver relies on.
    pub fn validate(&self) -> Result<()> {
        if !(self.mass > 0.0 && self.mass.is_finite()) {
            return Err(ImpmError::InvalidParticle(format!(
                "mass must be positive, got {}",
                self.mass
            )));
        }
        if !(self.initial_volume > 0.0 && self.initial_volume.is_finite()) {
            return Err(ImpmError::InvalidParticle(format!(
                "initial volume must be positive, got {}",
                self.initial_volume
            )));
        }
        if self.domain.len() != corner_count::<D>() {
            return Err(ImpmError::InvalidParticle(format!(
                "domain has {} corners, expected {}",
                self.domain.len(),
                corner_count::<D>()
            )));
        }
        let j = determinant(&self.f);
        if !(j > 0.0) {
            return Err(ImpmError::InvalidParticle(format!(
                "deformation gradient determinant must be positive, got {j}"
            )));
        }
        Ok(())
    }

    /// det F, the current-to-initial volume ratio.
    pub fn jacobian(&self) -> f64 {
        determinant(&self.f)
    }

    /// Cauchy stress from the constitutive model.
    pub fn cauchy_stress(&self) -> Matrix<D> {
        self.material.cauchy_stress(&self.f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use phyz_math::{Mat2, Vec2, Vec3};

    #[test]
    fn test_particle_creation() {
        let mat = Material::NeoHookean { e: 1e6, nu: 0.3 };
        let p = SolidParticle::new(Vec2::new(0.5, 0.5), Vec2::zeros(), 1.0, 1.0, mat);
        assert_eq!(p.mass, 1.0);
        assert_eq!(p.jacobian(), 1.0);
        assert_eq!(p.domain.len(), 4);
        assert_eq!(p.domain[0], Vec2::new(0.0, 0.0));
        assert_eq!(p.domain[3], Vec2::new(1.0, 1.0));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_domain_volume_3d() {
        let mat = Material::LinearElastic { e: 1e5, nu: 0.2 };
        let p = SolidParticle::new(Vec3::zeros(), Vec3::zeros(), 1.0, 0.125, mat);
        assert_eq!(p.domain.len(), 8);
        let extent = p.domain[7] - p.domain[0];
        assert_relative_eq!(extent, Vec3::new(0.5, 0.5, 0.5), epsilon = 1e-12);
    }

    #[test]
    fn test_validate_rejects_bad_particles() {
        let mat = Material::NeoHookean { e: 1e6, nu: 0.3 };
        let p = SolidParticle::new(Vec2::zeros(), Vec2::zeros(), 0.0, 1.0, mat);
        assert!(p.validate().is_err());

        let p = SolidParticle::new(Vec2::zeros(), Vec2::zeros(), 1.0, 1.0, mat)
            .with_domain(&[Vec2::zeros(); 3]);
        assert!(p.validate().is_err());

        let mut p = SolidParticle::new(Vec2::zeros(), Vec2::zeros(), 1.0, 1.0, mat);
        p.f = Mat2::new(-1.0, 0.0, 0.0, 1.0);
        assert!(p.validate().is_err());
    }
}
