//! Phase notifications.
//!
//! Observers are told when each phase of a step begins. They receive a shared
//! reference to the solver, so they can inspect state but not change it.

use crate::solver::InvertibleMpmSolid;

/// Callbacks fired at the start of each solver phase. All default to no-ops.
pub trait SolverObserver<const D: usize> {
    fn on_rasterize(&mut self, _solver: &InvertibleMpmSolid<D>) {}

    fn on_update_particle_interpolation_weight(&mut self, _solver: &InvertibleMpmSolid<D>) {}

    fn on_update_constitutive_model_state(&mut self, _solver: &InvertibleMpmSolid<D>, _dt: f64) {}

    fn on_solve_on_grid(&mut self, _solver: &InvertibleMpmSolid<D>, _dt: f64) {}

    fn on_update_particle_velocity(&mut self, _solver: &InvertibleMpmSolid<D>) {}

    fn on_update_particle_position(&mut self, _solver: &InvertibleMpmSolid<D>, _dt: f64) {}
}

impl<const D: usize> InvertibleMpmSolid<D> {
    /// Invoke `f` on every registered observer.
    pub(crate) fn notify(&mut self, f: impl Fn(&mut dyn SolverObserver<D>, &Self)) {
        if self.observers.is_empty() {
            return;
        }
        let mut observers = std::mem::take(&mut self.observers);
        for observer in observers.iter_mut() {
            f(observer.as_mut(), self);
        }
        self.observers = observers;
    }
}
