//! Constitutive models for solid particles.
//!
//! Every model returns the Cauchy (true) stress, which is what the grid and
//! enriched-corner force integration consume.

use phyz_math::{Matrix, determinant};
use serde::{Deserialize, Serialize};

/// Solid constitutive model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Material {
    /// Compressible Neo-Hookean hyperelasticity.
    NeoHookean {
        /// Young's modulus (Pa).
        e: f64,
        /// Poisson's ratio (dimensionless).
        nu: f64,
    },
    /// St. Venant-Kirchhoff hyperelasticity.
    StVenantKirchhoff {
        /// Young's modulus (Pa).
        e: f64,
        /// Poisson's ratio (dimensionless).
        nu: f64,
    },
    /// Small-strain linear elasticity.
    LinearElastic {
        /// Young's modulus (Pa).
        e: f64,
        /// Poisson's ratio (dimensionless).
        nu: f64,
    },
    /// Neo-Hookean response with von Mises capping of the deviatoric stress.
    Plastic {
        /// Young's modulus (Pa).
        e: f64,
        /// Poisson's ratio (dimensionless).
        nu: f64,
        /// Yield stress (Pa).
        yield_stress: f64,
    },
}

/// Lamé parameters (μ, λ) from Young's modulus and Poisson's ratio.
pub fn lame_parameters(e: f64, nu: f64) -> (f64, f64) {
    let mu = e / (2.0 * (1.0 + nu));
    let lambda = e * nu / ((1.0 + nu) * (1.0 - 2.0 * nu));
    (mu, lambda)
}

impl Material {
    /// Cauchy stress for deformation gradient `f`.
    ///
    /// `f` must have a positive determinant, which the solver guarantees.
    pub fn cauchy_stress<const D: usize>(&self, f: &Matrix<D>) -> Matrix<D> {
        let identity = Matrix::<D>::identity();
        let j = determinant(f);
        match *self {
            Material::NeoHookean { e, nu } => {
                // σ = [μ (F Fᵀ - I) + λ ln(J) I] / J
                let (mu, lambda) = lame_parameters(e, nu);
                (mu * (f * f.transpose() - identity) + lambda * j.ln() * identity) / j
            }
            Material::StVenantKirchhoff { e, nu } => {
                // σ = F S Fᵀ / J with S = 2μE + λ tr(E) I
                let (mu, lambda) = lame_parameters(e, nu);
                let strain = 0.5 * (f.transpose() * f - identity);
                let pk2 = 2.0 * mu * strain + lambda * strain.trace() * identity;
                f * pk2 * f.transpose() / j
            }
            Material::LinearElastic { e, nu } => {
                let (mu, lambda) = lame_parameters(e, nu);
                let strain = 0.5 * (f + f.transpose()) - identity;
                2.0 * mu * strain + lambda * strain.trace() * identity
            }
            Material::Plastic {
                e,
                nu,
                yield_stress,
            } => {
                let elastic = Material::NeoHookean { e, nu }.cauchy_stress(f);
                let mean = elastic.trace() / D as f64;
                let dev = elastic - mean * identity;
                let dev_norm = dev.norm();
                // von Mises equivalent stress is sqrt(3/2) |dev|
                let equivalent = (1.5f64).sqrt() * dev_norm;
                if equivalent > yield_stress && dev_norm > 1e-12 {
                    dev * (yield_stress / equivalent) + mean * identity
                } else {
                    elastic
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use phyz_math::{Mat2, Mat3};

    const MATERIALS: [Material; 4] = [
        Material::NeoHookean { e: 1e6, nu: 0.3 },
        Material::StVenantKirchhoff { e: 1e6, nu: 0.3 },
        Material::LinearElastic { e: 1e6, nu: 0.3 },
        Material::Plastic {
            e: 1e6,
            nu: 0.3,
            yield_stress: 1e4,
        },
    ];

    #[test]
    fn test_rest_state_is_stress_free() {
        for material in MATERIALS {
            assert_relative_eq!(material.cauchy_stress(&Mat2::identity()).norm(), 0.0);
            assert_relative_eq!(material.cauchy_stress(&Mat3::identity()).norm(), 0.0);
        }
    }

    #[test]
    fn test_compression_gives_negative_pressure_trace() {
        let f = Mat3::identity() * 0.9;
        for material in MATERIALS {
            let sigma = material.cauchy_stress(&f);
            assert!(sigma.trace() < 0.0, "{material:?} gave trace {}", sigma.trace());
            assert_relative_eq!(sigma, sigma.transpose(), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_plastic_caps_deviatoric_stress() {
        let f = Mat2::new(1.0, 0.5, 0.0, 1.0);
        let capped = Material::Plastic {
            e: 1e6,
            nu: 0.3,
            yield_stress: 1e3,
        }
        .cauchy_stress(&f);
        let mean = capped.trace() / 2.0;
        let dev = capped - mean * Mat2::identity();
        assert_relative_eq!((1.5f64).sqrt() * dev.norm(), 1e3, epsilon = 1e-6);
    }
}
