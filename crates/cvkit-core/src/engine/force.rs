use super::error::EngineError;
use crate::core::expression::{Expression, ExpressionError};
use crate::core::utils::geometry::{
    align, angle_with_gradient, centered, dihedral_with_gradient, distance_with_gradient,
    minimum_image,
};
use nalgebra::{Point3, Vector3};
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Largest number of named collective variables a single [`CustomCvForce`] accepts.
pub const MAX_COLLECTIVE_VARIABLES: usize = 32;

/// Coordinates a force is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub positions: &'a [Point3<f64>],
    pub box_lengths: Option<Vector3<f64>>,
}

/// A geometric quantity of a bond, addressed by slot within the bond's particle tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Distance([usize; 2]),
    Angle([usize; 3]),
    Dihedral([usize; 4]),
}

impl Primitive {
    fn slots(&self) -> &[usize] {
        match self {
            Primitive::Distance(slots) => slots,
            Primitive::Angle(slots) => slots,
            Primitive::Dihedral(slots) => slots,
        }
    }

    fn value_and_gradient(&self, points: &[Point3<f64>]) -> (f64, Vec<Vector3<f64>>) {
        match *self {
            Primitive::Distance([a, b]) => {
                let (value, grad) = distance_with_gradient(&points[a].coords, &points[b].coords);
                (value, grad.to_vec())
            }
            Primitive::Angle([a, b, c]) => {
                let (value, grad) = angle_with_gradient(&points[a], &points[b], &points[c]);
                (value, grad.to_vec())
            }
            Primitive::Dihedral([a, b, c, d]) => {
                let (value, grad) =
                    dihedral_with_gradient(&points[a], &points[b], &points[c], &points[d]);
                (value, grad.to_vec())
            }
        }
    }
}

/// An energy expression over named geometric primitives, summed over every bond.
#[derive(Debug, Clone)]
pub struct CompoundBondForce {
    particles_per_bond: usize,
    energy: Expression,
    primitives: Vec<(String, Primitive)>,
    derivatives: Vec<Expression>,
    bonds: Vec<Vec<usize>>,
    periodic: bool,
}

impl CompoundBondForce {
    pub fn new(
        particles_per_bond: usize,
        energy: Expression,
        primitives: Vec<(String, Primitive)>,
    ) -> Result<Self, EngineError> {
        for (_, primitive) in &primitives {
            if let Some(&slot) = primitive.slots().iter().find(|&&s| s >= particles_per_bond) {
                return Err(EngineError::ParticleOutOfRange {
                    index: slot,
                    count: particles_per_bond,
                });
            }
        }
        if let Some(unknown) = energy
            .variables()
            .into_iter()
            .find(|var| !primitives.iter().any(|(name, _)| name == var))
        {
            return Err(ExpressionError::UnknownVariable(unknown).into());
        }
        let derivatives = primitives
            .iter()
            .map(|(name, _)| energy.derivative(name))
            .collect();
        Ok(Self {
            particles_per_bond,
            energy,
            primitives,
            derivatives,
            bonds: Vec::new(),
            periodic: false,
        })
    }

    pub fn add_bond(&mut self, particles: Vec<usize>) -> Result<usize, EngineError> {
        if particles.len() != self.particles_per_bond {
            return Err(EngineError::BondSize {
                expected: self.particles_per_bond,
                found: particles.len(),
            });
        }
        self.bonds.push(particles);
        Ok(self.bonds.len() - 1)
    }

    pub fn set_uses_periodic_boundary_conditions(&mut self, periodic: bool) {
        self.periodic = periodic;
    }

    pub fn uses_periodic_boundary_conditions(&self) -> bool {
        self.periodic
    }

    pub fn particles_per_bond(&self) -> usize {
        self.particles_per_bond
    }

    pub fn energy(&self) -> &Expression {
        &self.energy
    }

    pub fn bonds(&self) -> &[Vec<usize>] {
        &self.bonds
    }

    /// Bond coordinates, unwrapped around the first particle when periodic.
    fn bond_points(&self, frame: &Frame, bond: &[usize]) -> Vec<Point3<f64>> {
        let origin = frame.positions[bond[0]];
        bond.iter()
            .map(|&p| match (self.periodic, frame.box_lengths) {
                (true, Some(lengths)) => origin + minimum_image(frame.positions[p] - origin, &lengths),
                _ => frame.positions[p],
            })
            .collect()
    }

    fn compute(
        &self,
        frame: &Frame,
        scale: f64,
        mut gradient: Option<&mut [Vector3<f64>]>,
    ) -> Result<f64, EngineError> {
        let mut total = 0.0;
        for bond in &self.bonds {
            let points = self.bond_points(frame, bond);
            let (values, grads): (Vec<f64>, Vec<Vec<Vector3<f64>>>) = self
                .primitives
                .iter()
                .map(|(_, primitive)| primitive.value_and_gradient(&points))
                .unzip();
            let lookup = |name: &str| {
                self.primitives
                    .iter()
                    .position(|(n, _)| n == name)
                    .map(|k| values[k])
            };
            total += self.energy.evaluate(&lookup)?;

            if let Some(gradient) = gradient.as_deref_mut() {
                for (k, (_, primitive)) in self.primitives.iter().enumerate() {
                    let factor = scale * self.derivatives[k].evaluate(&lookup)?;
                    if factor == 0.0 {
                        continue;
                    }
                    for (&slot, g) in primitive.slots().iter().zip(&grads[k]) {
                        gradient[bond[slot]] += g * factor;
                    }
                }
            }
        }
        Ok(total)
    }
}

/// RMSD of a particle group after optimal superposition onto a fixed reference.
#[derive(Debug, Clone)]
pub struct RmsdForce {
    particles: Vec<usize>,
    reference: Arc<[Vector3<f64>]>,
}

impl RmsdForce {
    /// `reference` must already be centered and have one point per particle.
    pub fn new(reference: Arc<[Vector3<f64>]>, particles: Vec<usize>) -> Result<Self, EngineError> {
        if reference.len() != particles.len() {
            return Err(EngineError::ReferenceSize {
                reference: reference.len(),
                group: particles.len(),
            });
        }
        if particles.is_empty() {
            return Err(crate::core::utils::geometry::AlignmentError::Empty.into());
        }
        Ok(Self {
            particles,
            reference,
        })
    }

    pub fn particles(&self) -> &[usize] {
        &self.particles
    }

    pub fn reference(&self) -> &Arc<[Vector3<f64>]> {
        &self.reference
    }

    fn compute(
        &self,
        frame: &Frame,
        scale: f64,
        gradient: Option<&mut [Vector3<f64>]>,
    ) -> Result<f64, EngineError> {
        let points: Vec<Point3<f64>> = self.particles.iter().map(|&p| frame.positions[p]).collect();
        let mobile = centered(&points);
        let alignment = align(&mobile, &self.reference)?;
        let rmsd = alignment.rmsd;

        if let Some(gradient) = gradient {
            if rmsd > 0.0 {
                let inverse = alignment.rotation.inverse();
                let factor = scale / (self.particles.len() as f64 * rmsd);
                for ((&p, x), y) in self.particles.iter().zip(&mobile).zip(self.reference.iter()) {
                    gradient[p] += (x - inverse * y) * factor;
                }
            }
        }
        Ok(rmsd)
    }
}

#[derive(Debug, Clone)]
pub struct GyrationForce {
    particles: Vec<usize>,
}

impl GyrationForce {
    pub fn new(particles: Vec<usize>) -> Self {
        Self { particles }
    }

    pub fn particles(&self) -> &[usize] {
        &self.particles
    }

    fn compute(
        &self,
        frame: &Frame,
        scale: f64,
        gradient: Option<&mut [Vector3<f64>]>,
    ) -> Result<f64, EngineError> {
        if self.particles.is_empty() {
            return Ok(0.0);
        }
        let points: Vec<Point3<f64>> = self.particles.iter().map(|&p| frame.positions[p]).collect();
        let offsets = centered(&points);
        let n = offsets.len() as f64;
        let rg = (offsets.iter().map(|v| v.norm_squared()).sum::<f64>() / n).sqrt();

        if let Some(gradient) = gradient {
            if rg > 0.0 {
                let factor = scale / (n * rg);
                for (&p, offset) in self.particles.iter().zip(&offsets) {
                    gradient[p] += offset * factor;
                }
            }
        }
        Ok(rg)
    }
}

/// An expression whose variables are the values of other forces.
#[derive(Debug, Clone)]
pub struct CustomCvForce {
    energy: Expression,
    variables: Vec<(String, Arc<Force>)>,
    derivatives: Vec<Expression>,
}

impl CustomCvForce {
    pub fn new(energy: Expression) -> Self {
        Self {
            energy,
            variables: Vec::new(),
            derivatives: Vec::new(),
        }
    }

    pub fn add_collective_variable(
        &mut self,
        name: impl Into<String>,
        force: Arc<Force>,
    ) -> Result<usize, EngineError> {
        if self.variables.len() >= MAX_COLLECTIVE_VARIABLES {
            return Err(EngineError::ArityExceeded {
                count: self.variables.len() + 1,
                max: MAX_COLLECTIVE_VARIABLES,
            });
        }
        let name = name.into();
        self.derivatives.push(self.energy.derivative(&name));
        self.variables.push((name, force));
        Ok(self.variables.len() - 1)
    }

    pub fn energy(&self) -> &Expression {
        &self.energy
    }

    pub fn num_collective_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn collective_variable(&self, index: usize) -> Option<(&str, &Arc<Force>)> {
        self.variables
            .get(index)
            .map(|(name, force)| (name.as_str(), force))
    }

    fn compute(
        &self,
        frame: &Frame,
        scale: f64,
        gradient: Option<&mut [Vector3<f64>]>,
    ) -> Result<f64, EngineError> {
        // With a gradient requested, each sub-force fills its own unit-scale buffer in the
        // same pass that yields its value. The buffers are scaled once the expression
        // derivatives are known.
        let gradient_len = gradient.as_ref().map(|g| g.len());
        let evaluate = |(_, force): &(String, Arc<Force>)| -> Result<_, EngineError> {
            match gradient_len {
                Some(len) => {
                    let mut scratch = vec![Vector3::zeros(); len];
                    let value = force.compute(frame, 1.0, Some(&mut scratch))?;
                    Ok((value, Some(scratch)))
                }
                None => Ok((force.compute(frame, 1.0, None)?, None)),
            }
        };

        #[cfg(not(feature = "parallel"))]
        let iterator = self.variables.iter();

        #[cfg(feature = "parallel")]
        let iterator = self.variables.par_iter();

        let results: Vec<(f64, Option<Vec<Vector3<f64>>>)> =
            iterator.map(evaluate).collect::<Result<_, EngineError>>()?;
        let lookup = |name: &str| {
            self.variables
                .iter()
                .position(|(n, _)| n == name)
                .map(|k| results[k].0)
        };
        let value = self.energy.evaluate(&lookup)?;

        if let Some(gradient) = gradient {
            for (derivative, (_, scratch)) in self.derivatives.iter().zip(&results) {
                let factor = scale * derivative.evaluate(&lookup)?;
                let Some(scratch) = scratch else { continue };
                if factor != 0.0 {
                    for (total, partial) in gradient.iter_mut().zip(scratch) {
                        *total += partial * factor;
                    }
                }
            }
        }
        Ok(value)
    }
}

#[derive(Debug, Clone)]
pub enum Force {
    CompoundBond(CompoundBondForce),
    Rmsd(RmsdForce),
    Gyration(GyrationForce),
    CustomCv(CustomCvForce),
}

impl Force {
    /// Returns the force value and, when a buffer is given, adds `scale` times its
    /// gradient to it.
    pub(crate) fn compute(
        &self,
        frame: &Frame,
        scale: f64,
        gradient: Option<&mut [Vector3<f64>]>,
    ) -> Result<f64, EngineError> {
        match self {
            Force::CompoundBond(force) => force.compute(frame, scale, gradient),
            Force::Rmsd(force) => force.compute(frame, scale, gradient),
            Force::Gyration(force) => force.compute(frame, scale, gradient),
            Force::CustomCv(force) => force.compute(frame, scale, gradient),
        }
    }

    pub fn uses_periodic_boundary_conditions(&self) -> bool {
        match self {
            Force::CompoundBond(force) => force.periodic,
            Force::Rmsd(_) | Force::Gyration(_) => false,
            Force::CustomCv(force) => force
                .variables
                .iter()
                .any(|(_, f)| f.uses_periodic_boundary_conditions()),
        }
    }

    /// Largest particle index the force reads, if it reads any.
    pub fn max_particle_index(&self) -> Option<usize> {
        match self {
            Force::CompoundBond(force) => force.bonds.iter().flatten().copied().max(),
            Force::Rmsd(force) => force.particles.iter().copied().max(),
            Force::Gyration(force) => force.particles.iter().copied().max(),
            Force::CustomCv(force) => force
                .variables
                .iter()
                .filter_map(|(_, f)| f.max_particle_index())
                .max(),
        }
    }
}

impl From<CompoundBondForce> for Force {
    fn from(force: CompoundBondForce) -> Self {
        Force::CompoundBond(force)
    }
}

impl From<RmsdForce> for Force {
    fn from(force: RmsdForce) -> Self {
        Force::Rmsd(force)
    }
}

impl From<GyrationForce> for Force {
    fn from(force: GyrationForce) -> Self {
        Force::Gyration(force)
    }
}

impl From<CustomCvForce> for Force {
    fn from(force: CustomCvForce) -> Self {
        Force::CustomCv(force)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expression::parse;

    fn positions() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.05, 0.14, 0.02),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.15, 0.01, 0.01),
            Point3::new(0.19, 0.06, 0.13),
            Point3::new(-0.11, 0.07, 0.21),
            Point3::new(0.31, -0.12, 0.09),
        ]
    }

    fn value(force: &Force, positions: &[Point3<f64>]) -> f64 {
        let frame = Frame {
            positions,
            box_lengths: None,
        };
        force.compute(&frame, 1.0, None).unwrap()
    }

    fn check_gradient(force: &Force) {
        let positions = positions();
        let frame = Frame {
            positions: &positions,
            box_lengths: None,
        };
        let mut analytic = vec![Vector3::zeros(); positions.len()];
        force.compute(&frame, 1.0, Some(&mut analytic)).unwrap();
        let h = 1e-6;
        for atom in 0..positions.len() {
            for axis in 0..3 {
                let mut plus = positions.clone();
                let mut minus = positions.clone();
                plus[atom][axis] += h;
                minus[atom][axis] -= h;
                let numeric = (value(force, &plus) - value(force, &minus)) / (2.0 * h);
                assert!(
                    (numeric - analytic[atom][axis]).abs() < 1e-5,
                    "atom {atom} axis {axis}: numeric {numeric} vs analytic {}",
                    analytic[atom][axis]
                );
            }
        }
    }

    fn torsion_force() -> Force {
        let mut force = CompoundBondForce::new(
            4,
            parse("0.5*(1+cos(theta-0.3))").unwrap(),
            vec![("theta".into(), Primitive::Dihedral([0, 1, 2, 3]))],
        )
        .unwrap();
        force.add_bond(vec![0, 1, 2, 3]).unwrap();
        force.add_bond(vec![4, 1, 2, 5]).unwrap();
        force.into()
    }

    fn reference_for(particles: &[usize]) -> Arc<[Vector3<f64>]> {
        let points: Vec<Point3<f64>> = particles
            .iter()
            .map(|&p| {
                let q = positions()[p];
                Point3::new(q.y + 0.02, -q.x, q.z * 1.1)
            })
            .collect();
        centered(&points).into()
    }

    #[test]
    fn compound_bond_gradient_matches_finite_differences() {
        check_gradient(&torsion_force());

        let mut force = CompoundBondForce::new(
            3,
            parse("r^2+step(1-r/0.6)*theta").unwrap(),
            vec![
                ("r".into(), Primitive::Distance([0, 2])),
                ("theta".into(), Primitive::Angle([0, 1, 2])),
            ],
        )
        .unwrap();
        force.add_bond(vec![0, 1, 2]).unwrap();
        force.add_bond(vec![3, 4, 5]).unwrap();
        check_gradient(&force.into());
    }

    #[test]
    fn compound_bond_rejects_unknown_variables_and_slots() {
        let result = CompoundBondForce::new(
            2,
            parse("r+q").unwrap(),
            vec![("r".into(), Primitive::Distance([0, 1]))],
        );
        assert!(matches!(
            result,
            Err(EngineError::Expression {
                source: ExpressionError::UnknownVariable(_)
            })
        ));
        let result = CompoundBondForce::new(
            2,
            parse("r").unwrap(),
            vec![("r".into(), Primitive::Distance([0, 2]))],
        );
        assert!(matches!(
            result,
            Err(EngineError::ParticleOutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    fn compound_bond_rejects_wrong_bond_size() {
        let mut force = CompoundBondForce::new(
            2,
            parse("r").unwrap(),
            vec![("r".into(), Primitive::Distance([0, 1]))],
        )
        .unwrap();
        assert!(matches!(
            force.add_bond(vec![0, 1, 2]),
            Err(EngineError::BondSize {
                expected: 2,
                found: 3
            })
        ));
    }

    #[test]
    fn periodic_distance_uses_minimum_image() {
        let mut force = CompoundBondForce::new(
            2,
            parse("r").unwrap(),
            vec![("r".into(), Primitive::Distance([0, 1]))],
        )
        .unwrap();
        force.add_bond(vec![0, 1]).unwrap();
        force.set_uses_periodic_boundary_conditions(true);
        let force = Force::from(force);
        let positions = [Point3::new(0.1, 0.0, 0.0), Point3::new(2.9, 0.0, 0.0)];
        let periodic = Frame {
            positions: &positions,
            box_lengths: Some(Vector3::new(3.0, 3.0, 3.0)),
        };
        let open = Frame {
            positions: &positions,
            box_lengths: None,
        };
        assert!((force.compute(&periodic, 1.0, None).unwrap() - 0.2).abs() < 1e-12);
        assert!((force.compute(&open, 1.0, None).unwrap() - 2.8).abs() < 1e-12);
        assert!(force.uses_periodic_boundary_conditions());
    }

    #[test]
    fn rmsd_gradient_matches_finite_differences() {
        let particles = vec![0, 2, 3, 4, 5];
        let force = Force::from(RmsdForce::new(reference_for(&particles), particles).unwrap());
        assert!(value(&force, &positions()) > 0.0);
        check_gradient(&force);
    }

    #[test]
    fn rmsd_rejects_mismatched_reference() {
        let result = RmsdForce::new(reference_for(&[0, 1]), vec![0, 1, 2]);
        assert!(matches!(
            result,
            Err(EngineError::ReferenceSize {
                reference: 2,
                group: 3
            })
        ));
    }

    #[test]
    fn gyration_gradient_matches_finite_differences() {
        check_gradient(&Force::from(GyrationForce::new(vec![0, 1, 3, 5])));
    }

    #[test]
    fn custom_cv_gradient_follows_chain_rule() {
        let particles = vec![0, 1, 2, 3];
        let mut force = CustomCvForce::new(parse("1/(1+(a/0.1)^6)+b^2").unwrap());
        force
            .add_collective_variable(
                "a",
                Arc::new(RmsdForce::new(reference_for(&particles), particles).unwrap().into()),
            )
            .unwrap();
        force
            .add_collective_variable("b", Arc::new(torsion_force()))
            .unwrap();
        check_gradient(&force.into());
    }

    #[test]
    fn nested_custom_cv_gradient_comes_from_one_pass() {
        let mut inner = CustomCvForce::new(parse("a+2*b").unwrap());
        let particles = vec![0, 2, 3, 4];
        inner
            .add_collective_variable(
                "a",
                Arc::new(RmsdForce::new(reference_for(&particles), particles).unwrap().into()),
            )
            .unwrap();
        inner
            .add_collective_variable("b", Arc::new(GyrationForce::new(vec![1, 3, 5]).into()))
            .unwrap();
        let mut outer = CustomCvForce::new(parse("c^2-c").unwrap());
        outer
            .add_collective_variable("c", Arc::new(inner.into()))
            .unwrap();
        let outer = Force::from(outer);

        let positions = positions();
        let frame = Frame {
            positions: &positions,
            box_lengths: None,
        };
        let mut gradient = vec![Vector3::zeros(); positions.len()];
        let with_gradient = outer.compute(&frame, 1.0, Some(&mut gradient)).unwrap();
        assert!((with_gradient - value(&outer, &positions)).abs() < 1e-12);
        check_gradient(&outer);
    }

    #[test]
    fn custom_cv_enforces_arity_limit() {
        let mut force = CustomCvForce::new(parse("x0").unwrap());
        let gyration = Arc::new(Force::from(GyrationForce::new(vec![0, 1])));
        for i in 0..MAX_COLLECTIVE_VARIABLES {
            assert_eq!(
                force
                    .add_collective_variable(format!("x{i}"), gyration.clone())
                    .unwrap(),
                i
            );
        }
        let result = force.add_collective_variable("overflow", gyration);
        assert!(matches!(
            result,
            Err(EngineError::ArityExceeded { count: 33, max: 32 })
        ));
        assert_eq!(force.num_collective_variables(), 32);
    }

    #[test]
    fn max_particle_index_looks_into_sub_forces() {
        let mut force = CustomCvForce::new(parse("a").unwrap());
        force
            .add_collective_variable("a", Arc::new(GyrationForce::new(vec![3, 9, 1]).into()))
            .unwrap();
        assert_eq!(Force::from(force).max_particle_index(), Some(9));
        assert_eq!(Force::from(GyrationForce::new(vec![])).max_particle_index(), None);
    }
}
