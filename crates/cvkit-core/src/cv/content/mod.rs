//! Alignment-based structural content.
//!
//! A content score sums a switching function of the RMSD of many atom groups from one
//! ideal reference. The engine caps the number of sub-variables of a single expression
//! at [`MAX_COLLECTIVE_VARIABLES`], so large sums are assembled as a tree of partial
//! sums through [`reduce_in_chunks`]. Every node of the tree is a plain sum, which makes
//! the chunking invisible in the result.

pub mod sheet;

use super::config::ContentConfig;
use super::error::CvError;
use super::variants::parse_step_function;
use crate::core::expression::{BinaryOp, Expression};
use crate::engine::force::{CustomCvForce, Force, MAX_COLLECTIVE_VARIABLES, RmsdForce};
use crate::engine::reduction::reduce_in_chunks;
use nalgebra::Vector3;
use std::sync::Arc;
use tracing::info;

/// Upper bound on the number of groups in one content variable.
pub const MAX_GROUPS: usize = 1024;

/// Builds the force `Σ_g S(rmsd_g / threshold)`, divided by the number of groups when
/// `config.normalize` is set.
///
/// Leaves are named `rmsd{g}` and intermediate partial sums `chunk{k}`.
pub(crate) fn assemble(
    groups: &[Vec<usize>],
    reference: &Arc<[Vector3<f64>]>,
    config: &ContentConfig,
) -> Result<Arc<Force>, CvError> {
    let num_groups = groups.len();
    if !(1..=MAX_GROUPS).contains(&num_groups) {
        return Err(CvError::GroupCountOutOfRange { groups: num_groups });
    }
    let step = parse_step_function(&config.step_function)?;

    let leaves = groups
        .iter()
        .map(|group| {
            let force = RmsdForce::new(Arc::clone(reference), group.clone())?;
            Ok(Arc::new(Force::from(force)))
        })
        .collect::<Result<Vec<_>, CvError>>()?;

    let mut chunks = 0;
    let root = reduce_in_chunks(leaves, MAX_COLLECTIVE_VARIABLES, |chunk| -> Result<_, CvError> {
        let names: Vec<String> = (0..chunk.items.len())
            .map(|j| match chunk.level {
                0 => format!("rmsd{}", chunk.offset + j),
                _ => format!("chunk{}", chunk.offset + j),
            })
            .collect();
        let terms = names.iter().map(|name| {
            let variable = Expression::variable(name.as_str());
            if chunk.level == 0 {
                step.substitute(
                    "x",
                    &Expression::binary(
                        BinaryOp::Divide,
                        variable,
                        Expression::constant(config.threshold_rmsd),
                    ),
                )
            } else {
                variable
            }
        });
        let mut energy = Expression::sum(terms);
        if chunk.is_root && config.normalize {
            energy = Expression::binary(
                BinaryOp::Divide,
                energy,
                Expression::constant(num_groups as f64),
            );
        }
        if chunk.level == 0 {
            chunks += 1;
        }

        let mut force = CustomCvForce::new(energy);
        for (name, item) in names.into_iter().zip(chunk.items) {
            force.add_collective_variable(name, item)?;
        }
        Ok(Arc::new(Force::from(force)))
    })?;

    info!(
        groups = num_groups,
        chunks,
        normalize = config.normalize,
        "Assembled RMSD content"
    );
    Ok(root)
}
