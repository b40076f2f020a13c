//! Deformation gradient update with the inversion remedy.

use phyz_math::{Matrix, corner_count, determinant, outer};
use rayon::prelude::*;

use crate::enrichment::ParticleKind;
use crate::error::{ImpmError, Result};
use crate::object::MpmObject;
use crate::particle::SolidParticle;
use crate::solver::InvertibleMpmSolid;

/// Advance `f` by velocity gradient `l` over `dt`.
///
/// Uses `F + dt·L·F` when `det(I + dt·L) > 0`, otherwise the second-order
/// step `F + (dt·L + dt²/4·L·L)·F`. The flag reports whether the second
/// branch was taken.
pub fn advance_deformation_gradient<const D: usize>(
    f: &Matrix<D>,
    l: &Matrix<D>,
    dt: f64,
) -> (Matrix<D>, bool) {
    let step = l * dt;
    if determinant(&(Matrix::<D>::identity() + step)) > 0.0 {
        (f + step * f, false)
    } else {
        (f + (step + l * l * (0.25 * dt * dt)) * f, true)
    }
}

/// Advance F of one particle and rescale its volume; F must keep a positive determinant.
fn integrate_deformation<const D: usize>(
    particle: &mut SolidParticle<D>,
    l: &Matrix<D>,
    dt: f64,
    object: usize,
    idx: usize,
) -> Result<()> {
    let (f, remedied) = advance_deformation_gradient(&particle.f, l, dt);
    if remedied {
        log::trace!("inversion remedy applied to particle {idx} of object {object}");
    }
    let j = determinant(&f);
    if !(j > 0.0) {
        return Err(ImpmError::InvertedDeformation {
            object,
            particle: idx,
            determinant: j,
        });
    }
    particle.f = f;
    particle.volume = j * particle.initial_volume;
    Ok(())
}

impl<const D: usize> InvertibleMpmSolid<D> {
    /// Update F and volume of every particle from grid and enriched-corner velocities.
    pub fn update_particle_constitutive_model_state(&mut self, dt: f64) -> Result<()> {
        self.notify(|o, s| o.on_update_constitutive_model_state(s, dt));

        let nodes = &self.nodes;
        for (obj_idx, object) in self.objects.iter_mut().enumerate() {
            let MpmObject {
                particles,
                mesh,
                interpolation,
                ..
            } = object;
            let mesh = &*mesh;
            particles
                .par_iter_mut()
                .zip(interpolation.par_iter())
                .enumerate()
                .try_for_each(|(p_idx, (particle, interp))| {
                    let kind =
                        ParticleKind::classify(mesh.enriched_count(p_idx), corner_count::<D>());
                    let mut l = Matrix::<D>::zeros();
                    if kind.uses_grid() {
                        for pair in &interp.grid {
                            l += outer(&nodes[pair.node].velocity_of(obj_idx), &pair.gradient);
                        }
                    }
                    if kind.uses_corners() {
                        for (local, gradient) in interp.corner_gradients.iter().enumerate() {
                            let corner = mesh.corner(mesh.ele_vert_index(p_idx, local));
                            if corner.enriched {
                                l += outer(&corner.velocity, gradient);
                            }
                        }
                    }

                    integrate_deformation(particle, &l, dt, obj_idx, p_idx)
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use phyz_math::{Mat2, Vec2};

    use crate::config::{GridConfig, SolverConfig};
    use crate::enrichment::EnrichmentPolicy;
    use crate::material::Material;

    #[test]
    fn test_first_order_branch() {
        let l = Mat2::new(0.1, 0.0, 0.0, -0.1);
        let (f, remedied) = advance_deformation_gradient(&Mat2::identity(), &l, 0.1);
        assert!(!remedied);
        assert_relative_eq!(f, Mat2::new(1.01, 0.0, 0.0, 0.99), epsilon = 1e-12);
    }

    #[test]
    fn test_remedy_keeps_determinant_positive() {
        let l = Mat2::new(-150.0, 80.0, 0.0, 0.0);
        let dt = 0.01;
        // naive step: det(I + dt L) = 1 - 1.5 < 0
        assert!(determinant(&(Mat2::identity() + l * dt)) <= 0.0);
        let (f, remedied) = advance_deformation_gradient(&Mat2::identity(), &l, dt);
        assert!(remedied);
        assert!(determinant(&f) > 0.0);
    }

    #[test]
    fn test_fully_enriched_large_shear() {
        let config = SolverConfig::new(GridConfig::new(&[0.0, 0.0], 1.0, &[4, 4]))
            .with_enrichment(EnrichmentPolicy::Always)
            .with_gravity(0.0);
        let mut solver = InvertibleMpmSolid::<2>::new(config).unwrap();
        let p = SolidParticle::new(
            Vec2::new(2.0, 2.0),
            Vec2::zeros(),
            1.0,
            1.0,
            Material::NeoHookean { e: 1e3, nu: 0.3 },
        );
        solver.add_object(vec![p]).unwrap();
        solver.rasterize();

        // prescribe corner velocities v_c = L x_c, which the corner gradients reproduce exactly
        let l = Mat2::new(-150.0, 80.0, 0.0, 0.0);
        let dt = 0.01;
        for corner in solver.objects[0].mesh.corners_mut() {
            corner.velocity = l * corner.position;
        }
        solver.update_particle_constitutive_model_state(dt).unwrap();

        let particle = &solver.object(0).unwrap().particles()[0];
        let (expected, remedied) = advance_deformation_gradient(&Mat2::identity(), &l, dt);
        assert!(remedied);
        assert_relative_eq!(particle.f, expected, epsilon = 1e-9);
        assert!(particle.jacobian() > 0.0);
        assert_relative_eq!(particle.volume, particle.jacobian(), epsilon = 1e-12);
    }

    #[test]
    fn test_singular_half_step_is_rejected() {
        // I + dt L / 2 = diag(0, 1), so the remedied F is singular
        let l = Mat2::new(-2.0, 0.0, 0.0, 0.0);
        let mut p = SolidParticle::new(
            Vec2::new(2.0, 2.0),
            Vec2::zeros(),
            1.0,
            1.0,
            Material::NeoHookean { e: 1e3, nu: 0.3 },
        );
        let (f, remedied) = advance_deformation_gradient(&p.f, &l, 1.0);
        assert!(remedied);
        assert_eq!(f, Mat2::new(0.0, 0.0, 0.0, 1.0));

        let err = integrate_deformation(&mut p, &l, 1.0, 3, 7).unwrap_err();
        assert!(matches!(
            err,
            ImpmError::InvertedDeformation { object: 3, particle: 7, determinant } if determinant == 0.0
        ));
        // rejected update leaves the particle untouched
        assert_eq!(p.f, Mat2::identity());
        assert_eq!(p.volume, 1.0);
    }

    #[test]
    fn test_non_finite_corner_velocity_is_inverted_deformation() {
        let config = SolverConfig::new(GridConfig::new(&[0.0, 0.0], 1.0, &[4, 4]))
            .with_enrichment(EnrichmentPolicy::Always)
            .with_gravity(0.0);
        let mut solver = InvertibleMpmSolid::<2>::new(config).unwrap();
        let p = SolidParticle::new(
            Vec2::new(2.0, 2.0),
            Vec2::zeros(),
            1.0,
            1.0,
            Material::NeoHookean { e: 1e3, nu: 0.3 },
        );
        solver.add_object(vec![p]).unwrap();
        solver.rasterize();
        solver.objects[0].mesh.corners_mut()[0].velocity = Vec2::new(f64::NAN, 0.0);

        let result = solver.update_particle_constitutive_model_state(0.01);
        assert!(matches!(
            result,
            Err(ImpmError::InvertedDeformation { object: 0, particle: 0, .. })
        ));
        assert_eq!(solver.object(0).unwrap().particles()[0].f, Mat2::identity());
    }
}
