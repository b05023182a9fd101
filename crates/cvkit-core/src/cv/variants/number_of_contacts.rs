use super::{bond_force, check_index, parse_step_function};
use crate::core::expression::{BinaryOp, Expression, Function};
use crate::core::units::Unit;
use crate::cv::Variant;
use crate::cv::error::CvError;
use crate::cv::schema::{ArgDefault, ArgSpec, ArgType, ArgValue, Arguments};
use crate::engine::force::{Force, Primitive};
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_CONTACT_STEP_FUNCTION: &str = "1/(1+x^6)";

/// Smoothly counted atom pairs from two groups that lie within a cutoff.
///
/// Each distinct unordered pair `(i, j)` with `i` in `group1`, `j` in `group2` and
/// `i ≠ j` contributes `S(r / threshold_distance)` if `r ≤ cutoff_distance`.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberOfContacts {
    pub group1: Vec<usize>,
    pub group2: Vec<usize>,
    pub num_atoms: usize,
    pub pbc: bool,
    pub step_function: String,
    pub threshold_distance: f64,
    pub cutoff_distance: f64,
}

impl NumberOfContacts {
    pub fn new(group1: Vec<usize>, group2: Vec<usize>, num_atoms: usize) -> Self {
        Self {
            group1,
            group2,
            num_atoms,
            pbc: true,
            step_function: DEFAULT_CONTACT_STEP_FUNCTION.to_string(),
            threshold_distance: 0.3,
            cutoff_distance: 0.6,
        }
    }

    pub fn with_pbc(mut self, pbc: bool) -> Self {
        self.pbc = pbc;
        self
    }

    pub fn with_step_function(mut self, step_function: &str) -> Self {
        self.step_function = step_function.to_string();
        self
    }

    pub fn with_distances(mut self, threshold: f64, cutoff: f64) -> Self {
        self.threshold_distance = threshold;
        self.cutoff_distance = cutoff;
        self
    }

    /// Distinct unordered pairs in first-seen order.
    pub fn pairs(&self) -> Vec<[usize; 2]> {
        let mut seen = HashSet::new();
        let mut pairs = Vec::new();
        for &i in &self.group1 {
            for &j in &self.group2 {
                if i != j && seen.insert((i.min(j), i.max(j))) {
                    pairs.push([i, j]);
                }
            }
        }
        pairs
    }

    fn energy(&self) -> Result<Expression, CvError> {
        let r = || Expression::variable("r");
        let switch = parse_step_function(&self.step_function)?.substitute(
            "x",
            &Expression::binary(
                BinaryOp::Divide,
                r(),
                Expression::constant(self.threshold_distance),
            ),
        );
        let within_cutoff = Expression::call(
            Function::Step,
            Expression::binary(
                BinaryOp::Subtract,
                Expression::constant(1.0),
                Expression::binary(
                    BinaryOp::Divide,
                    r(),
                    Expression::constant(self.cutoff_distance),
                ),
            ),
        );
        Ok(Expression::binary(BinaryOp::Multiply, within_cutoff, switch))
    }
}

impl Variant for NumberOfContacts {
    const TAG: &'static str = "NumberOfContacts";
    const SCHEMA: &'static [ArgSpec] = &[
        ArgSpec::required("group1", ArgType::IndexList),
        ArgSpec::required("group2", ArgType::IndexList),
        ArgSpec::required("num_atoms", ArgType::Integer),
        ArgSpec::optional("pbc", ArgType::Boolean, ArgDefault::Boolean(true)),
        ArgSpec::optional(
            "step_function",
            ArgType::Text,
            ArgDefault::Text(DEFAULT_CONTACT_STEP_FUNCTION),
        ),
        ArgSpec::optional("threshold_distance", ArgType::Length, ArgDefault::Real(0.3)),
        ArgSpec::optional("cutoff_distance", ArgType::Length, ArgDefault::Real(0.6)),
    ];

    fn unit() -> Unit {
        Unit::dimensionless()
    }

    fn arguments(&self) -> Vec<ArgValue> {
        vec![
            ArgValue::IndexList(self.group1.clone()),
            ArgValue::IndexList(self.group2.clone()),
            ArgValue::Integer(self.num_atoms),
            ArgValue::Boolean(self.pbc),
            ArgValue::Text(self.step_function.clone()),
            ArgValue::Real(self.threshold_distance),
            ArgValue::Real(self.cutoff_distance),
        ]
    }

    fn from_arguments(args: &Arguments) -> Result<Self, CvError> {
        Ok(Self {
            group1: args.index_list("group1")?,
            group2: args.index_list("group2")?,
            num_atoms: args.integer("num_atoms")?,
            pbc: args.boolean("pbc")?,
            step_function: args.text("step_function")?,
            threshold_distance: args.real("threshold_distance")?,
            cutoff_distance: args.real("cutoff_distance")?,
        })
    }

    fn build_force(&self) -> Result<Arc<Force>, CvError> {
        for &index in &self.group1 {
            check_index("group1", index, self.num_atoms)?;
        }
        for &index in &self.group2 {
            check_index("group2", index, self.num_atoms)?;
        }
        for (argument, value) in [
            ("threshold_distance", self.threshold_distance),
            ("cutoff_distance", self.cutoff_distance),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(CvError::invalid(
                    argument,
                    format!("must be a positive length, got {value}"),
                ));
            }
        }
        bond_force(
            2,
            self.energy()?,
            vec![("r", Primitive::Distance([0, 1]))],
            self.pairs().into_iter().map(|pair| pair.to_vec()),
            self.pbc,
        )
    }
}
