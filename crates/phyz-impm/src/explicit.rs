//! Forward-Euler force integration on grid nodes and enriched corners.

use phyz_math::{Vector, corner_count};

use crate::enrichment::ParticleKind;
use crate::grid::GridNodeState;
use crate::object::MpmObject;
use crate::solver::InvertibleMpmSolid;

impl<const D: usize> InvertibleMpmSolid<D> {
    /// Apply internal-force impulses and gravity to grid and corner velocities.
    pub fn solve_on_grid_forward_euler(&mut self, dt: f64) {
        self.notify(|o, s| o.on_solve_on_grid(s, dt));

        let welded = self.contact.is_none();
        let g = self.config.gravity;
        let gravity_step = Vector::<D>::from_fn(|d, _| if d == 1 { -dt * g } else { 0.0 });
        let nodes = &mut self.nodes;
        for (obj_idx, object) in self.objects.iter_mut().enumerate() {
            let MpmObject {
                particles,
                mesh,
                interpolation,
                ..
            } = object;
            for (p_idx, (particle, interp)) in particles.iter().zip(interpolation.iter()).enumerate() {
                let kind = ParticleKind::classify(mesh.enriched_count(p_idx), corner_count::<D>());
                // -dt V σ, shared by every grid and corner impulse of this particle
                let stress = particle.cauchy_stress() * (-dt * particle.volume);
                // gravity reaching this particle through the grid; enriched corners carry the rest
                let grid_share = 1.0
                    - interp
                        .corner_weights
                        .iter()
                        .enumerate()
                        .filter(|&(local, _)| mesh.corner(mesh.ele_vert_index(p_idx, local)).enriched)
                        .map(|(_, w)| w)
                        .sum::<f64>();

                if kind.uses_grid() {
                    for pair in &interp.grid {
                        let node = &mut nodes[pair.node];
                        if node.is_dirichlet(obj_idx) {
                            continue;
                        }
                        let mass = node.mass_of(obj_idx);
                        if mass <= f64::EPSILON {
                            continue;
                        }
                        let impulse = (stress * pair.gradient
                            + gravity_step * (pair.weight * particle.mass * grid_share))
                            / mass;
                        if welded {
                            if !node.dirichlet.is_empty() {
                                continue;
                            }
                            let GridNodeState {
                                mass: masses,
                                velocity,
                                ..
                            } = node;
                            for (object, v) in velocity.iter_mut() {
                                if masses.get(object).is_some_and(|&m| m > f64::EPSILON) {
                                    *v += impulse;
                                }
                            }
                        } else if let Some(v) = node.velocity.get_mut(obj_idx) {
                            *v += impulse;
                        }
                    }
                }

                if kind.uses_corners() {
                    for (local, gradient) in interp.corner_gradients.iter().enumerate() {
                        let corner = mesh.corner_mut(mesh.ele_vert_index(p_idx, local));
                        if !corner.enriched || corner.mass <= f64::EPSILON {
                            continue;
                        }
                        corner.velocity += stress * gradient / corner.mass;
                    }
                }
            }
        }

        self.apply_gravity_on_enriched_domain_corner(dt);
    }

    /// `v.y -= dt·g` on every enriched corner.
    fn apply_gravity_on_enriched_domain_corner(&mut self, dt: f64) {
        let dv = dt * self.config.gravity;
        for object in self.objects.iter_mut() {
            for corner in object.mesh.corners_mut() {
                if corner.enriched {
                    corner.velocity[1] -= dv;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use phyz_math::Vec2;

    use crate::config::{GridConfig, SolverConfig};
    use crate::enrichment::EnrichmentPolicy;
    use crate::material::Material;
    use crate::particle::SolidParticle;
    use crate::solver::InvertibleMpmSolid;

    fn solver(policy: EnrichmentPolicy) -> InvertibleMpmSolid<2> {
        let config = SolverConfig::new(GridConfig::new(&[0.0, 0.0], 1.0, &[6, 6]))
            .with_enrichment(policy)
            .with_gravity(9.8);
        InvertibleMpmSolid::new(config).unwrap()
    }

    fn particle(x: Vec2) -> SolidParticle<2> {
        SolidParticle::new(x, Vec2::zeros(), 1.0, 1.0, Material::NeoHookean { e: 1e4, nu: 0.3 })
    }

    #[test]
    fn test_gravity_on_grid_nodes() {
        let mut s = solver(EnrichmentPolicy::Never);
        s.add_object(vec![particle(Vec2::new(2.5, 2.5))]).unwrap();
        s.rasterize();
        s.solve_on_grid_forward_euler(0.01);
        for (&flat, _) in s.active_grid_nodes() {
            let v = s.grid_node(flat).unwrap().velocity_of(0);
            assert_relative_eq!(v, Vec2::new(0.0, -0.098), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_gravity_on_enriched_corners() {
        let mut s = solver(EnrichmentPolicy::Always);
        s.add_object(vec![particle(Vec2::new(2.5, 2.5))]).unwrap();
        s.rasterize();
        s.solve_on_grid_forward_euler(0.01);
        for c in s.object(0).unwrap().domain_mesh().corners() {
            assert_relative_eq!(c.velocity, Vec2::new(0.0, -0.098), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_transient_particle_splits_gravity_between_grid_and_corners() {
        let mut s = solver(EnrichmentPolicy::Never);
        s.add_object(vec![particle(Vec2::new(2.5, 2.5)), particle(Vec2::new(3.5, 2.5))])
            .unwrap();
        s.set_enrichment_criterion(|_object: usize, idx: usize, _p: &SolidParticle<2>| idx == 1);
        s.rasterize();
        assert_eq!(s.object(0).unwrap().particle_kind(0), crate::ParticleKind::Transient);
        s.solve_on_grid_forward_euler(0.01);
        // only particle 0 touches the grid, and half of its corners are enriched
        for (&flat, _) in s.active_grid_nodes() {
            let v = s.grid_node(flat).unwrap().velocity_of(0);
            assert_relative_eq!(v, Vec2::new(0.0, -0.049), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_dirichlet_node_receives_no_impulse() {
        let mut s = solver(EnrichmentPolicy::Never);
        let mut p = particle(Vec2::new(2.5, 2.5));
        p.f = phyz_math::Mat2::new(1.2, 0.0, 0.0, 1.0);
        s.add_object(vec![p]).unwrap();
        s.set_dirichlet_grid_node(0, [2, 2], Vec2::zeros()).unwrap();
        s.rasterize();
        s.solve_on_grid_forward_euler(0.01);
        assert_eq!(s.grid_velocity(0, [2, 2]).unwrap(), Vec2::zeros());
        // stretched along x, the free nodes are pulled back toward the center
        assert!(s.grid_velocity(0, [3, 2]).unwrap().x < 0.0);
    }
}
