//! Invertible MPM solid solver: state, setup and the per-step driver.
//!
//! The phases of a step are implemented in their own modules:
//! [`transfer`](crate::transfer), [`constitutive`](crate::constitutive),
//! [`explicit`](crate::explicit) and [`update`](crate::update).

use phyz_math::Vector;

use crate::config::{SolverConfig, UpdateMethod};
use crate::contact::{ActiveGridNodes, GridContactMethod};
use crate::enrichment::EnrichmentCriterion;
use crate::error::{ImpmError, Result};
use crate::grid::{GridNodeState, UniformGrid};
use crate::object::MpmObject;
use crate::observer::SolverObserver;
use crate::particle::SolidParticle;

/// Hybrid grid / CPDI2-domain MPM solver for 2D (`D = 2`) and 3D (`D = 3`) solids.
pub struct InvertibleMpmSolid<const D: usize> {
    pub(crate) config: SolverConfig,
    pub(crate) grid: UniformGrid<D>,
    pub(crate) nodes: Vec<GridNodeState<D>>,
    pub(crate) active_nodes: ActiveGridNodes,
    pub(crate) objects: Vec<MpmObject<D>>,
    pub(crate) criterion: Box<dyn EnrichmentCriterion<D>>,
    pub(crate) contact: Option<Box<dyn GridContactMethod<D>>>,
    pub(crate) observers: Vec<Box<dyn SolverObserver<D>>>,
    time: f64,
}

impl<const D: usize> InvertibleMpmSolid<D> {
    /// Create a solver with no objects.
    ///
    /// Fails if the config is invalid, describes a grid of another dimension,
    /// or selects an update method other than CPDI2.
    pub fn new(config: SolverConfig) -> Result<Self> {
        if !(2..=3).contains(&D) {
            return Err(ImpmError::InvalidParameter(format!(
                "only 2D and 3D solids are supported, got D = {D}"
            )));
        }
        config.validate()?;
        if config.update_method != UpdateMethod::Cpdi2 {
            return Err(ImpmError::UnsupportedUpdateMethod(config.update_method));
        }
        let grid = UniformGrid::from_config(&config.grid)?;
        let nodes = vec![GridNodeState::default(); grid.node_count()];
        let criterion: Box<dyn EnrichmentCriterion<D>> = Box::new(config.enrichment);
        Ok(Self {
            config,
            grid,
            nodes,
            active_nodes: ActiveGridNodes::new(),
            objects: Vec::new(),
            criterion,
            contact: None,
            observers: Vec::new(),
            time: 0.0,
        })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn grid(&self) -> &UniformGrid<D> {
        &self.grid
    }

    /// Simulated time (s).
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn object_num(&self) -> usize {
        self.objects.len()
    }

    pub fn objects(&self) -> &[MpmObject<D>] {
        &self.objects
    }

    pub fn object(&self, object: usize) -> Option<&MpmObject<D>> {
        self.objects.get(object)
    }

    pub fn particle_num_of_object(&self, object: usize) -> Result<usize> {
        Ok(self.object_ref(object)?.particle_num())
    }

    pub(crate) fn object_ref(&self, object: usize) -> Result<&MpmObject<D>> {
        self.objects
            .get(object)
            .ok_or(ImpmError::ObjectOutOfRange(object))
    }

    pub(crate) fn object_mut(&mut self, object: usize) -> Result<&mut MpmObject<D>> {
        self.objects
            .get_mut(object)
            .ok_or(ImpmError::ObjectOutOfRange(object))
    }

    /// Replace the enrichment criterion chosen by the config.
    pub fn set_enrichment_criterion(&mut self, criterion: impl EnrichmentCriterion<D> + 'static) {
        self.criterion = Box::new(criterion);
    }

    /// Install an external contact model; grid values then stay per object.
    pub fn set_contact_method(&mut self, contact: Box<dyn GridContactMethod<D>>) {
        self.contact = Some(contact);
    }

    /// Remove the contact model; objects sharing nodes are welded again.
    pub fn clear_contact_method(&mut self) {
        self.contact = None;
    }

    pub fn has_contact_method(&self) -> bool {
        self.contact.is_some()
    }

    pub fn add_observer(&mut self, observer: Box<dyn SolverObserver<D>>) {
        self.observers.push(observer);
    }

    // ---------------------------------------------------------------------
    // Objects and particles
    // ---------------------------------------------------------------------

    /// Add an object and build its domain mesh. Returns the object index.
    pub fn add_object(&mut self, particles: Vec<SolidParticle<D>>) -> Result<usize> {
        for p in &particles {
            p.validate()?;
        }
        self.objects.push(MpmObject::new(particles));
        let idx = self.objects.len() - 1;
        self.rebuild_object(idx);
        log::debug!(
            "added object {idx} with {} particles, {} domain corners",
            self.objects[idx].particle_num(),
            self.objects[idx].mesh.vert_num()
        );
        Ok(idx)
    }

    /// Remove an object. Higher object indices shift down by one.
    pub fn remove_object(&mut self, object: usize) -> Result<MpmObject<D>> {
        self.object_ref(object)?;
        let removed = self.objects.remove(object);
        for node in self.nodes.iter_mut() {
            node.remove_object(object);
        }
        self.active_nodes.clear();
        Ok(removed)
    }

    /// Append a particle to `object` and rebuild its domain mesh.
    pub fn add_particle(&mut self, object: usize, particle: SolidParticle<D>) -> Result<usize> {
        particle.validate()?;
        let obj = self.object_mut(object)?;
        obj.particles.push(particle);
        obj.dirichlet.push(false);
        let idx = obj.particles.len() - 1;
        self.rebuild_object(object);
        Ok(idx)
    }

    /// Remove a particle from `object` and rebuild its domain mesh.
    pub fn remove_particle(&mut self, object: usize, particle: usize) -> Result<SolidParticle<D>> {
        let obj = self.object_mut(object)?;
        if particle >= obj.particles.len() {
            return Err(ImpmError::ParticleOutOfRange { object, particle });
        }
        let removed = obj.particles.remove(particle);
        obj.dirichlet.remove(particle);
        self.rebuild_object(object);
        Ok(removed)
    }

    /// Mark a particle as boundary-fixed: its velocity and position are not updated.
    pub fn set_dirichlet_particle(&mut self, object: usize, particle: usize, fixed: bool) -> Result<()> {
        let obj = self.object_mut(object)?;
        let flag = obj
            .dirichlet
            .get_mut(particle)
            .ok_or(ImpmError::ParticleOutOfRange { object, particle })?;
        *flag = fixed;
        Ok(())
    }

    /// Prescribe the velocity of `object` at grid node `node`.
    pub fn set_dirichlet_grid_node(
        &mut self,
        object: usize,
        node: [usize; D],
        velocity: Vector<D>,
    ) -> Result<()> {
        self.object_ref(object)?;
        let flat = self.checked_flat_index(node)?;
        let state = &mut self.nodes[flat];
        state.dirichlet.insert(object, velocity);
        state.velocity.insert(object, velocity);
        Ok(())
    }

    pub fn clear_dirichlet_grid_node(&mut self, object: usize, node: [usize; D]) -> Result<()> {
        let flat = self.checked_flat_index(node)?;
        self.nodes[flat].dirichlet.remove(object);
        Ok(())
    }

    fn checked_flat_index(&self, node: [usize; D]) -> Result<usize> {
        let num = self.grid.node_num();
        if node.iter().zip(num.iter()).any(|(i, n)| i >= n) {
            return Err(ImpmError::NodeOutOfRange(node.to_vec()));
        }
        Ok(self.grid.flat_index(node))
    }

    /// Overwrite the domain corners of a particle.
    ///
    /// Corners are shared through the mesh, so neighbors that use the same
    /// vertices move with it. Interpolation weights of the object are refreshed.
    pub fn set_current_particle_domain(
        &mut self,
        object: usize,
        particle: usize,
        corners: &[Vector<D>],
    ) -> Result<()> {
        let obj = self
            .objects
            .get_mut(object)
            .ok_or(ImpmError::ObjectOutOfRange(object))?;
        let expected = obj
            .particles
            .get(particle)
            .ok_or(ImpmError::ParticleOutOfRange { object, particle })?
            .domain
            .len();
        if corners.len() != expected {
            return Err(ImpmError::InvalidParameter(format!(
                "particle domain needs {expected} corners, got {}",
                corners.len()
            )));
        }
        for (local, pos) in corners.iter().enumerate() {
            let vert = obj.mesh.ele_vert_index(particle, local);
            obj.move_corner(vert, *pos);
        }
        obj.refresh_interpolation(&self.grid);
        Ok(())
    }

    /// Move mesh corner `corner` of `object`, updating every particle domain that uses it.
    pub fn set_corner_position(&mut self, object: usize, corner: usize, pos: Vector<D>) -> Result<()> {
        let obj = self
            .objects
            .get_mut(object)
            .ok_or(ImpmError::ObjectOutOfRange(object))?;
        if corner >= obj.mesh.vert_num() {
            return Err(ImpmError::CornerOutOfRange { object, corner });
        }
        obj.move_corner(corner, pos);
        obj.refresh_interpolation(&self.grid);
        Ok(())
    }

    fn rebuild_object(&mut self, object: usize) {
        let tolerance = self.config.weld_tolerance;
        let obj = &mut self.objects[object];
        obj.rebuild_domain_mesh(tolerance);
        obj.refresh_interpolation(&self.grid);
    }

    /// Rebuild every domain mesh and interpolation weight from current particle state.
    pub fn init_simulation_data(&mut self) {
        for object in 0..self.objects.len() {
            self.rebuild_object(object);
        }
        for node in self.nodes.iter_mut() {
            node.reset();
        }
        self.active_nodes.clear();
    }

    // ---------------------------------------------------------------------
    // Grid queries
    // ---------------------------------------------------------------------

    pub fn grid_node(&self, flat: usize) -> Option<&GridNodeState<D>> {
        self.nodes.get(flat)
    }

    /// Mass of `object` at node `node`, zero if it has none.
    pub fn grid_mass(&self, object: usize, node: [usize; D]) -> Result<f64> {
        Ok(self.nodes[self.checked_flat_index(node)?].mass_of(object))
    }

    /// Velocity of `object` at node `node`, zero if it has none.
    pub fn grid_velocity(&self, object: usize, node: [usize; D]) -> Result<Vector<D>> {
        Ok(self.nodes[self.checked_flat_index(node)?].velocity_of(object))
    }

    /// Active (node, objects) pairs found by the last rasterization.
    pub fn active_grid_nodes(&self) -> &ActiveGridNodes {
        &self.active_nodes
    }

    // ---------------------------------------------------------------------
    // Stepping
    // ---------------------------------------------------------------------

    /// CFL-limited time step, capped by the configured maximum.
    pub fn compute_time_step(&self) -> f64 {
        let max_speed = self
            .objects
            .iter()
            .flat_map(|o| o.particles.iter())
            .map(|p| p.v.norm())
            .fold(0.0, f64::max);
        if max_speed > f64::EPSILON {
            (self.config.cfl_number * self.grid.dx() / max_speed).min(self.config.max_dt)
        } else {
            self.config.max_dt
        }
    }

    /// Advance the simulation by `dt`, running every phase in order.
    pub fn advance_step(&mut self, dt: f64) -> Result<()> {
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(ImpmError::InvalidParameter(format!(
                "time step must be positive, got {dt}"
            )));
        }
        self.rasterize();
        self.update_particle_interpolation_weight();
        self.update_particle_constitutive_model_state(dt)?;
        self.solve_on_grid_forward_euler(dt);
        if let Some(contact) = self.contact.as_mut() {
            contact.resolve_contact(&self.grid, &mut self.nodes, &self.active_nodes, dt);
        }
        self.update_particle_velocity()?;
        self.update_particle_position(dt);
        self.time += dt;
        Ok(())
    }

    /// Refresh CPDI2 particle-grid and particle-corner weights from the current domains.
    pub fn update_particle_interpolation_weight(&mut self) {
        self.notify(|o, s| o.on_update_particle_interpolation_weight(s));
        let grid = &self.grid;
        for object in self.objects.iter_mut() {
            object.refresh_interpolation(grid);
        }
    }

    // ---------------------------------------------------------------------
    // Diagnostics
    // ---------------------------------------------------------------------

    /// Sum of grid mass over all nodes and objects.
    ///
    /// Welded nodes store the node total in every object's entry; they are
    /// counted once, using the active objects of the last rasterization.
    pub fn total_grid_mass(&self) -> f64 {
        let welded = self.contact.is_none();
        self.nodes
            .iter()
            .enumerate()
            .map(|(flat, node)| {
                let total: f64 = node.mass.iter().map(|(_, m)| *m).sum();
                match self.active_nodes.get(&flat) {
                    Some(objects) if welded && objects.len() > 1 => {
                        total - node.mass_of(objects[0]) * (objects.len() - 1) as f64
                    }
                    _ => total,
                }
            })
            .sum()
    }

    /// Total particle momentum.
    pub fn total_momentum(&self) -> Vector<D> {
        self.objects
            .iter()
            .flat_map(|o| o.particles.iter())
            .map(|p| p.v * p.mass)
            .fold(Vector::<D>::zeros(), |acc, m| acc + m)
    }

    /// Total particle kinetic energy.
    pub fn kinetic_energy(&self) -> f64 {
        self.objects
            .iter()
            .flat_map(|o| o.particles.iter())
            .map(|p| 0.5 * p.mass * p.v.norm_squared())
            .sum()
    }
}
