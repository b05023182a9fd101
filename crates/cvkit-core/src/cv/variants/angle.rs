use super::bond_force;
use crate::core::expression::Expression;
use crate::core::units::Unit;
use crate::cv::Variant;
use crate::cv::error::CvError;
use crate::cv::schema::{ArgDefault, ArgSpec, ArgType, ArgValue, Arguments};
use crate::engine::force::{Force, Primitive};
use std::sync::Arc;

/// Angle at `atom2` formed by `atom1-atom2-atom3`, in `[0, π]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Angle {
    pub atom1: usize,
    pub atom2: usize,
    pub atom3: usize,
    pub pbc: bool,
}

impl Angle {
    pub fn new(atom1: usize, atom2: usize, atom3: usize) -> Self {
        Self {
            atom1,
            atom2,
            atom3,
            pbc: false,
        }
    }

    pub fn with_pbc(mut self, pbc: bool) -> Self {
        self.pbc = pbc;
        self
    }
}

impl Variant for Angle {
    const TAG: &'static str = "Angle";
    const SCHEMA: &'static [ArgSpec] = &[
        ArgSpec::required("atom1", ArgType::Index),
        ArgSpec::required("atom2", ArgType::Index),
        ArgSpec::required("atom3", ArgType::Index),
        ArgSpec::optional("pbc", ArgType::Boolean, ArgDefault::Boolean(false)),
    ];

    fn unit() -> Unit {
        Unit::radian()
    }

    fn arguments(&self) -> Vec<ArgValue> {
        vec![
            ArgValue::Integer(self.atom1),
            ArgValue::Integer(self.atom2),
            ArgValue::Integer(self.atom3),
            ArgValue::Boolean(self.pbc),
        ]
    }

    fn from_arguments(args: &Arguments) -> Result<Self, CvError> {
        Ok(Self {
            atom1: args.integer("atom1")?,
            atom2: args.integer("atom2")?,
            atom3: args.integer("atom3")?,
            pbc: args.boolean("pbc")?,
        })
    }

    fn build_force(&self) -> Result<Arc<Force>, CvError> {
        bond_force(
            3,
            Expression::variable("theta"),
            vec![("theta", Primitive::Angle([0, 1, 2]))],
            [vec![self.atom1, self.atom2, self.atom3]],
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

    #[test]
    fn angle_matches_arccos_of_normalized_dot_product() {
        let atoms = [0, 2, 4];
        let cv = CollectiveVariable::new(Angle::new(atoms[0], atoms[1], atoms[2])).unwrap();
        let positions = sample_positions();
        let r21 = positions[atoms[0]] - positions[atoms[1]];
        let r23 = positions[atoms[2]] - positions[atoms[1]];
        let expected = (r21.dot(&r23) / (r21.norm() * r23.norm())).acos();

        let mut system = System::with_masses(sample_masses());
        system.add_force(&cv);
        let context = Context::with_positions(system, positions).unwrap();
        assert!((cv.evaluate(&context).unwrap().value - expected).abs() < 1e-12);
    }

    #[test]
    fn angle_survives_round_trip() {
        let cv = CollectiveVariable::new(Angle::new(0, 2, 4).with_pbc(true)).unwrap();
        assert_round_trip(&cv, sample_positions(), sample_masses());
    }
}
