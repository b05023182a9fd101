use super::bond_force;
use crate::core::expression::Expression;
use crate::core::units::Unit;
use crate::cv::Variant;
use crate::cv::error::CvError;
use crate::cv::schema::{ArgDefault, ArgSpec, ArgType, ArgValue, Arguments};
use crate::engine::force::{Force, Primitive};
use std::sync::Arc;

/// Dihedral angle `atom1-atom2-atom3-atom4` in `(-π, π]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Torsion {
    pub atoms: [usize; 4],
    pub pbc: bool,
}

impl Torsion {
    pub fn new(atom1: usize, atom2: usize, atom3: usize, atom4: usize) -> Self {
        Self {
            atoms: [atom1, atom2, atom3, atom4],
            pbc: false,
        }
    }

    pub fn with_pbc(mut self, pbc: bool) -> Self {
        self.pbc = pbc;
        self
    }
}

impl Variant for Torsion {
    const TAG: &'static str = "Torsion";
    const SCHEMA: &'static [ArgSpec] = &[
        ArgSpec::required("atom1", ArgType::Index),
        ArgSpec::required("atom2", ArgType::Index),
        ArgSpec::required("atom3", ArgType::Index),
        ArgSpec::required("atom4", ArgType::Index),
        ArgSpec::optional("pbc", ArgType::Boolean, ArgDefault::Boolean(false)),
    ];

    fn unit() -> Unit {
        Unit::radian()
    }

    fn arguments(&self) -> Vec<ArgValue> {
        let mut values: Vec<ArgValue> = self.atoms.iter().map(|&a| ArgValue::Integer(a)).collect();
        values.push(ArgValue::Boolean(self.pbc));
        values
    }

    fn from_arguments(args: &Arguments) -> Result<Self, CvError> {
        Ok(Self {
            atoms: [
                args.integer("atom1")?,
                args.integer("atom2")?,
                args.integer("atom3")?,
                args.integer("atom4")?,
            ],
            pbc: args.boolean("pbc")?,
        })
    }

    fn build_force(&self) -> Result<Arc<Force>, CvError> {
        bond_force(
            4,
            Expression::variable("theta"),
            vec![("theta", Primitive::Dihedral([0, 1, 2, 3]))],
            [self.atoms.to_vec()],
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
    fn torsion_matches_atan2_formula() {
        let atoms = [0, 2, 4, 6];
        let cv = CollectiveVariable::new(Torsion::new(atoms[0], atoms[1], atoms[2], atoms[3]))
            .unwrap();
        let p = sample_positions();
        let r21 = p[atoms[0]] - p[atoms[1]];
        let u23 = (p[atoms[2]] - p[atoms[1]]).normalize();
        let r34 = p[atoms[3]] - p[atoms[2]];
        let expected = r21
            .cross(&r34)
            .dot(&u23)
            .atan2(r21.dot(&r34) - r21.dot(&u23) * r34.dot(&u23));

        let mut system = System::with_masses(sample_masses());
        system.add_force(&cv);
        let context = Context::with_positions(system, p).unwrap();
        assert!((cv.evaluate(&context).unwrap().value - expected).abs() < 1e-10);
    }

    #[test]
    fn torsion_survives_round_trip() {
        let cv = CollectiveVariable::new(Torsion::new(0, 2, 4, 6)).unwrap();
        assert_round_trip(&cv, sample_positions(), sample_masses());
    }
}
