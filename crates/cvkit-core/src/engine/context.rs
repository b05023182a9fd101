use super::error::EngineError;
use super::force::{Force, Frame};
use super::system::System;
use nalgebra::{Point3, Vector3};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Forces are bound but no positions have been set.
    Bound,
    Evaluable,
    /// The system was modified after the context was initialized.
    Stale,
}

/// A system bound to a set of coordinates.
///
/// The context snapshots the system's forces when it is created or reinitialized and
/// only evaluates those. Taking the system mutably marks the context stale until
/// [`Context::reinitialize`] is called.
#[derive(Debug)]
pub struct Context {
    system: System,
    bound: Vec<Arc<Force>>,
    positions: Option<Vec<Point3<f64>>>,
    state: ContextState,
}

impl Context {
    pub fn new(system: System) -> Result<Self, EngineError> {
        let mut context = Self {
            system,
            bound: Vec::new(),
            positions: None,
            state: ContextState::Bound,
        };
        context.bind()?;
        Ok(context)
    }

    /// Convenience constructor for a context that is immediately evaluable.
    pub fn with_positions(
        system: System,
        positions: Vec<Point3<f64>>,
    ) -> Result<Self, EngineError> {
        let mut context = Self::new(system)?;
        context.set_positions(positions)?;
        Ok(context)
    }

    fn bind(&mut self) -> Result<(), EngineError> {
        let count = self.system.num_particles();
        for force in self.system.forces() {
            if let Some(index) = force.max_particle_index().filter(|&i| i >= count) {
                return Err(EngineError::ParticleOutOfRange { index, count });
            }
            if force.uses_periodic_boundary_conditions() && self.system.periodic_box().is_none() {
                warn!("Force requests periodic distances but the system has no periodic box; using plain distances");
            }
        }
        self.bound = self.system.forces().to_vec();
        debug!(
            particles = count,
            forces = self.bound.len(),
            "Context bound to system"
        );
        Ok(())
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn system(&self) -> &System {
        &self.system
    }

    /// Mutable access to the system. The context becomes stale.
    pub fn system_mut(&mut self) -> &mut System {
        self.state = ContextState::Stale;
        &mut self.system
    }

    /// Rebinds the context to the current system. With `preserve_state`, positions
    /// survive if the particle count is unchanged.
    pub fn reinitialize(&mut self, preserve_state: bool) -> Result<(), EngineError> {
        self.bind()?;
        let keep = preserve_state
            && self
                .positions
                .as_ref()
                .is_some_and(|p| p.len() == self.system.num_particles());
        if !keep {
            self.positions = None;
        }
        self.state = if self.positions.is_some() {
            ContextState::Evaluable
        } else {
            ContextState::Bound
        };
        Ok(())
    }

    pub fn set_positions(&mut self, positions: Vec<Point3<f64>>) -> Result<(), EngineError> {
        if self.state == ContextState::Stale {
            return Err(EngineError::Stale);
        }
        if positions.len() != self.system.num_particles() {
            return Err(EngineError::PositionCount {
                expected: self.system.num_particles(),
                found: positions.len(),
            });
        }
        self.positions = Some(positions);
        self.state = ContextState::Evaluable;
        Ok(())
    }

    pub fn positions(&self) -> Option<&[Point3<f64>]> {
        self.positions.as_deref()
    }

    fn frame(&self, force: &Arc<Force>) -> Result<Frame<'_>, EngineError> {
        match self.state {
            ContextState::Stale => return Err(EngineError::Stale),
            ContextState::Bound => return Err(EngineError::NotInitialized),
            ContextState::Evaluable => {}
        }
        if !self.bound.iter().any(|bound| Arc::ptr_eq(bound, force)) {
            return Err(EngineError::NotBound);
        }
        let positions = self.positions.as_deref().ok_or(EngineError::NotInitialized)?;
        Ok(Frame {
            positions,
            box_lengths: self.system.periodic_box(),
        })
    }

    pub fn evaluate(&self, force: &Arc<Force>) -> Result<f64, EngineError> {
        let value = force.compute(&self.frame(force)?, 1.0, None)?;
        finite(value)
    }

    /// Value of the force and its gradient with respect to every particle.
    pub fn value_and_gradient(
        &self,
        force: &Arc<Force>,
    ) -> Result<(f64, Vec<Vector3<f64>>), EngineError> {
        let frame = self.frame(force)?;
        let mut gradient = vec![Vector3::zeros(); frame.positions.len()];
        let value = force.compute(&frame, 1.0, Some(&mut gradient))?;
        Ok((finite(value)?, gradient))
    }

    /// Generalized mass `1 / Σ_i |∇_i f|² / m_i`. Massless particles do not contribute,
    /// and a vanishing gradient gives an infinite mass.
    pub fn effective_mass(&self, force: &Arc<Force>) -> Result<f64, EngineError> {
        let (_, gradient) = self.value_and_gradient(force)?;
        let inverse: f64 = gradient
            .iter()
            .zip(self.system.masses())
            .filter(|&(_, &mass)| mass > 0.0)
            .map(|(g, &mass)| g.norm_squared() / mass)
            .sum();
        if inverse > 0.0 {
            Ok(1.0 / inverse)
        } else {
            Ok(f64::INFINITY)
        }
    }
}

fn finite(value: f64) -> Result<f64, EngineError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EngineError::NonFinite(value))
    }
}
