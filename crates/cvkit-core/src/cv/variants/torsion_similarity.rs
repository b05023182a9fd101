use super::bond_force;
use crate::core::expression::parse;
use crate::core::units::Unit;
use crate::cv::Variant;
use crate::cv::error::CvError;
use crate::cv::schema::{ArgDefault, ArgSpec, ArgType, ArgValue, Arguments};
use crate::engine::force::{Force, Primitive};
use std::sync::Arc;

const SIMILARITY: &str = "0.5*(1+cos(theta1-theta2))";

/// Similarity of two paired lists of torsions, `Σ_k ½(1 + cos(θ_k − θ'_k))`.
#[derive(Debug, Clone, PartialEq)]
pub struct TorsionSimilarity {
    pub first_list: Vec<[usize; 4]>,
    pub second_list: Vec<[usize; 4]>,
    pub pbc: bool,
}

impl TorsionSimilarity {
    pub fn new(first_list: Vec<[usize; 4]>, second_list: Vec<[usize; 4]>) -> Self {
        Self {
            first_list,
            second_list,
            pbc: false,
        }
    }

    pub fn with_pbc(mut self, pbc: bool) -> Self {
        self.pbc = pbc;
        self
    }
}

impl Variant for TorsionSimilarity {
    const TAG: &'static str = "TorsionSimilarity";
    const SCHEMA: &'static [ArgSpec] = &[
        ArgSpec::required("first_list", ArgType::IndexQuadruples),
        ArgSpec::required("second_list", ArgType::IndexQuadruples),
        ArgSpec::optional("pbc", ArgType::Boolean, ArgDefault::Boolean(false)),
    ];

    fn unit() -> Unit {
        Unit::dimensionless()
    }

    fn arguments(&self) -> Vec<ArgValue> {
        vec![
            ArgValue::IndexQuadruples(self.first_list.clone()),
            ArgValue::IndexQuadruples(self.second_list.clone()),
            ArgValue::Boolean(self.pbc),
        ]
    }

    fn from_arguments(args: &Arguments) -> Result<Self, CvError> {
        Ok(Self {
            first_list: args.index_quadruples("first_list")?,
            second_list: args.index_quadruples("second_list")?,
            pbc: args.boolean("pbc")?,
        })
    }

    fn build_force(&self) -> Result<Arc<Force>, CvError> {
        if self.first_list.len() != self.second_list.len() {
            return Err(CvError::invalid(
                "second_list",
                format!(
                    "has {} torsions but first_list has {}",
                    self.second_list.len(),
                    self.first_list.len()
                ),
            ));
        }
        if self.first_list.is_empty() {
            return Err(CvError::invalid("first_list", "must contain at least one torsion"));
        }
        let bonds = self
            .first_list
            .iter()
            .zip(&self.second_list)
            .map(|(first, second)| first.iter().chain(second).copied().collect());
        bond_force(
            8,
            parse(SIMILARITY)?,
            vec![
                ("theta1", Primitive::Dihedral([0, 1, 2, 3])),
                ("theta2", Primitive::Dihedral([4, 5, 6, 7])),
            ],
            bonds,
            self.pbc,
        )
    }
}
