use super::{bond_force, parse_step_function, residue_atom};
use crate::core::expression::{BinaryOp, Expression};
use crate::core::models::residue::Residue;
use crate::core::units::Unit;
use crate::cv::Variant;
use crate::cv::error::CvError;
use crate::cv::schema::{ArgDefault, ArgSpec, ArgType, ArgValue, Arguments};
use crate::engine::force::{Force, Primitive};
use std::sync::Arc;

/// -63.8 degrees.
pub const DEFAULT_PHI_REFERENCE: f64 = -1.1135200627723822;
/// -41.1 degrees.
pub const DEFAULT_PSI_REFERENCE: f64 = -0.7173303225696694;
/// 25 degrees.
pub const DEFAULT_TOLERANCE: f64 = 0.4363323129985824;
pub const DEFAULT_HELIX_STEP_FUNCTION: &str = "1/(1+x^6)";

const BACKBONE_ATOMS: [&str; 3] = ["N", "CA", "C"];

/// Fraction of α-helical backbone torsions in a contiguous residue sequence.
///
/// Only inner residues contribute, since the first lacks φ and the last lacks ψ.
/// Each inner residue `i` adds `S((φ_i − φ0)/w) + S((ψ_i − ψ0)/w)` and the sum is
/// divided by `2(n − 2)`.
#[derive(Debug, Clone, PartialEq)]
pub struct HelixTorsionContent {
    pub residues: Vec<Residue>,
    pub pbc: bool,
    pub phi_reference: f64,
    pub psi_reference: f64,
    pub tolerance: f64,
    pub step_function: String,
}

impl HelixTorsionContent {
    pub fn new(residues: Vec<Residue>) -> Self {
        Self {
            residues,
            pbc: false,
            phi_reference: DEFAULT_PHI_REFERENCE,
            psi_reference: DEFAULT_PSI_REFERENCE,
            tolerance: DEFAULT_TOLERANCE,
            step_function: DEFAULT_HELIX_STEP_FUNCTION.to_string(),
        }
    }

    pub fn with_pbc(mut self, pbc: bool) -> Self {
        self.pbc = pbc;
        self
    }

    pub fn with_references(mut self, phi: f64, psi: f64, tolerance: f64) -> Self {
        self.phi_reference = phi;
        self.psi_reference = psi;
        self.tolerance = tolerance;
        self
    }

    pub fn with_step_function(mut self, step_function: &str) -> Self {
        self.step_function = step_function.to_string();
        self
    }

    /// `[N, CA, C]` particle indices of every residue, stopping at the first missing atom.
    fn backbone(&self) -> Result<Vec<[usize; 3]>, CvError> {
        self.residues
            .iter()
            .map(|residue| {
                let [n, ca, c] = BACKBONE_ATOMS;
                Ok([
                    residue_atom(residue, n)?,
                    residue_atom(residue, ca)?,
                    residue_atom(residue, c)?,
                ])
            })
            .collect()
    }

    fn energy(&self) -> Result<Expression, CvError> {
        let step = parse_step_function(&self.step_function)?;
        let term = |angle: &str, reference: f64| {
            let offset = Expression::binary(
                BinaryOp::Subtract,
                Expression::variable(angle),
                Expression::constant(reference),
            );
            step.substitute(
                "x",
                &Expression::binary(
                    BinaryOp::Divide,
                    offset,
                    Expression::constant(self.tolerance),
                ),
            )
        };
        let sum = Expression::binary(
            BinaryOp::Add,
            term("phi", self.phi_reference),
            term("psi", self.psi_reference),
        );
        let count = 2 * (self.residues.len() - 2);
        Ok(Expression::binary(
            BinaryOp::Divide,
            sum,
            Expression::constant(count as f64),
        ))
    }
}

impl Variant for HelixTorsionContent {
    const TAG: &'static str = "HelixTorsionContent";
    const SCHEMA: &'static [ArgSpec] = &[
        ArgSpec::required("residues", ArgType::Residues),
        ArgSpec::optional("pbc", ArgType::Boolean, ArgDefault::Boolean(false)),
        ArgSpec::optional(
            "phi_reference",
            ArgType::Angle,
            ArgDefault::Real(DEFAULT_PHI_REFERENCE),
        ),
        ArgSpec::optional(
            "psi_reference",
            ArgType::Angle,
            ArgDefault::Real(DEFAULT_PSI_REFERENCE),
        ),
        ArgSpec::optional("tolerance", ArgType::Angle, ArgDefault::Real(DEFAULT_TOLERANCE)),
        ArgSpec::optional(
            "step_function",
            ArgType::Text,
            ArgDefault::Text(DEFAULT_HELIX_STEP_FUNCTION),
        ),
    ];

    fn unit() -> Unit {
        Unit::dimensionless()
    }

    fn arguments(&self) -> Vec<ArgValue> {
        vec![
            ArgValue::Residues(self.residues.clone()),
            ArgValue::Boolean(self.pbc),
            ArgValue::Real(self.phi_reference),
            ArgValue::Real(self.psi_reference),
            ArgValue::Real(self.tolerance),
            ArgValue::Text(self.step_function.clone()),
        ]
    }

    fn from_arguments(args: &Arguments) -> Result<Self, CvError> {
        Ok(Self {
            residues: args.residues("residues")?,
            pbc: args.boolean("pbc")?,
            phi_reference: args.real("phi_reference")?,
            psi_reference: args.real("psi_reference")?,
            tolerance: args.real("tolerance")?,
            step_function: args.text("step_function")?,
        })
    }

    fn build_force(&self) -> Result<Arc<Force>, CvError> {
        if self.residues.len() < 3 {
            return Err(CvError::invalid(
                "residues",
                format!("needs at least 3 residues, got {}", self.residues.len()),
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(CvError::invalid(
                "tolerance",
                format!("must be a positive angle, got {}", self.tolerance),
            ));
        }
        let backbone = self.backbone()?;
        let bonds = backbone.windows(3).map(|w| {
            let ([_, _, c_prev], [n, ca, c], [n_next, _, _]) = (w[0], w[1], w[2]);
            vec![c_prev, n, ca, c, n_next]
        });
        bond_force(
            5,
            self.energy()?,
            vec![
                ("phi", Primitive::Dihedral([0, 1, 2, 3])),
                ("psi", Primitive::Dihedral([1, 2, 3, 4])),
            ],
            bonds,
            self.pbc,
        )
    }
}
