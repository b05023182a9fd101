use super::force::Force;
use nalgebra::Vector3;
use std::sync::Arc;

/// Anything that owns an engine force and can register it with a [`System`].
pub trait ForceProvider {
    fn force(&self) -> &Arc<Force>;
}

impl ForceProvider for Arc<Force> {
    fn force(&self) -> &Arc<Force> {
        self
    }
}

/// Particles, an optional rectangular periodic box, and the forces acting on them.
#[derive(Debug, Clone, Default)]
pub struct System {
    masses: Vec<f64>,
    box_lengths: Option<Vector3<f64>>,
    forces: Vec<Arc<Force>>,
}

impl System {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_masses(masses: impl IntoIterator<Item = f64>) -> Self {
        Self {
            masses: masses.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Adds a particle and returns its index. A mass of zero marks a virtual site.
    pub fn add_particle(&mut self, mass: f64) -> usize {
        self.masses.push(mass);
        self.masses.len() - 1
    }

    pub fn num_particles(&self) -> usize {
        self.masses.len()
    }

    pub fn particle_mass(&self, index: usize) -> Option<f64> {
        self.masses.get(index).copied()
    }

    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    pub fn set_periodic_box(&mut self, box_lengths: Option<Vector3<f64>>) {
        self.box_lengths = box_lengths;
    }

    pub fn periodic_box(&self) -> Option<Vector3<f64>> {
        self.box_lengths
    }

    /// Registers the provider's force and returns its index in the system.
    pub fn add_force(&mut self, provider: &impl ForceProvider) -> usize {
        self.forces.push(Arc::clone(provider.force()));
        self.forces.len() - 1
    }

    pub fn remove_force(&mut self, index: usize) -> Option<Arc<Force>> {
        (index < self.forces.len()).then(|| self.forces.remove(index))
    }

    pub fn forces(&self) -> &[Arc<Force>] {
        &self.forces
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::force::GyrationForce;

    #[test]
    fn particles_are_indexed_in_insertion_order() {
        let mut system = System::new();
        assert_eq!(system.add_particle(12.0), 0);
        assert_eq!(system.add_particle(0.0), 1);
        assert_eq!(system.num_particles(), 2);
        assert_eq!(system.particle_mass(1), Some(0.0));
        assert_eq!(system.particle_mass(2), None);
    }

    #[test]
    fn forces_are_shared_not_copied() {
        let force = Arc::new(Force::from(GyrationForce::new(vec![0, 1])));
        let mut system = System::with_masses([1.0, 1.0]);
        let index = system.add_force(&force);
        assert!(Arc::ptr_eq(&system.forces()[index], &force));
        let removed = system.remove_force(index).unwrap();
        assert!(Arc::ptr_eq(&removed, &force));
        assert!(system.forces().is_empty());
        assert!(system.remove_force(0).is_none());
    }
}
