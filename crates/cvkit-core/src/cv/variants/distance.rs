use super::bond_force;
use crate::core::expression::Expression;
use crate::core::units::Unit;
use crate::cv::Variant;
use crate::cv::error::CvError;
use crate::cv::schema::{ArgDefault, ArgSpec, ArgType, ArgValue, Arguments};
use crate::engine::force::{Force, Primitive};
use std::sync::Arc;

/// Euclidean distance between two atoms.
#[derive(Debug, Clone, PartialEq)]
pub struct Distance {
    pub atom1: usize,
    pub atom2: usize,
    pub pbc: bool,
}

impl Distance {
    pub fn new(atom1: usize, atom2: usize) -> Self {
        Self {
            atom1,
            atom2,
            pbc: false,
        }
    }

    pub fn with_pbc(mut self, pbc: bool) -> Self {
        self.pbc = pbc;
        self
    }
}

impl Variant for Distance {
    const TAG: &'static str = "Distance";
    const SCHEMA: &'static [ArgSpec] = &[
        ArgSpec::required("atom1", ArgType::Index),
        ArgSpec::required("atom2", ArgType::Index),
        ArgSpec::optional("pbc", ArgType::Boolean, ArgDefault::Boolean(false)),
    ];

    fn unit() -> Unit {
        Unit::nanometer()
    }

    fn arguments(&self) -> Vec<ArgValue> {
        vec![
            ArgValue::Integer(self.atom1),
            ArgValue::Integer(self.atom2),
            ArgValue::Boolean(self.pbc),
        ]
    }

    fn from_arguments(args: &Arguments) -> Result<Self, CvError> {
        Ok(Self {
            atom1: args.integer("atom1")?,
            atom2: args.integer("atom2")?,
            pbc: args.boolean("pbc")?,
        })
    }

    fn build_force(&self) -> Result<Arc<Force>, CvError> {
        bond_force(
            2,
            Expression::variable("r"),
            vec![("r", Primitive::Distance([0, 1]))],
            [vec![self.atom1, self.atom2]],
            self.pbc,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cv::CollectiveVariable;
    use crate::cv::variants::testing::{assert_round_trip, sample_masses, sample_positions};
    use crate::engine::context::Context;
    use crate::engine::system::System;
    use nalgebra::{Point3, Vector3};

    #[test]
    fn distance_matches_direct_computation() {
        let cv = CollectiveVariable::new(Distance::new(0, 5)).unwrap();
        let positions = sample_positions();
        let mut system = System::with_masses(sample_masses());
        system.add_force(&cv);
        let expected = (positions[0] - positions[5]).norm();
        let context = Context::with_positions(system, positions).unwrap();
        let value = cv.evaluate(&context).unwrap().value;
        assert!((value - expected).abs() < 1e-12);
    }

    #[test]
    fn periodic_distance_wraps_across_the_box() {
        let cv = CollectiveVariable::new(Distance::new(0, 1).with_pbc(true)).unwrap();
        let mut system = System::with_masses([1.0, 1.0]);
        system.set_periodic_box(Some(Vector3::new(2.0, 2.0, 2.0)));
        system.add_force(&cv);
        let context = Context::with_positions(
            system,
            vec![Point3::new(0.1, 0.1, 0.1), Point3::new(1.9, 0.1, 0.1)],
        )
        .unwrap();
        assert!((cv.evaluate(&context).unwrap().value - 0.2).abs() < 1e-12);
    }

    #[test]
    fn distance_survives_round_trip() {
        let cv = CollectiveVariable::new(Distance::new(0, 5)).unwrap();
        assert_round_trip(&cv, sample_positions(), sample_masses());
    }
}
