use super::check_index;
use crate::core::units::Unit;
use crate::core::utils::geometry::centered;
use crate::cv::Variant;
use crate::cv::error::CvError;
use crate::cv::schema::{ArgSpec, ArgType, ArgValue, Arguments};
use crate::engine::force::{Force, RmsdForce};
use nalgebra::Point3;
use std::sync::Arc;

/// Minimal RMSD of a group of atoms with respect to a reference structure.
///
/// `reference` holds either one row per atom of the system (`num_atoms` rows), from
/// which the group's rows are selected, or one row per group member in group order.
#[derive(Debug, Clone, PartialEq)]
pub struct Rmsd {
    pub reference: Vec<[f64; 3]>,
    pub group: Vec<usize>,
    pub num_atoms: usize,
}

impl Rmsd {
    pub fn new(reference: Vec<[f64; 3]>, group: Vec<usize>, num_atoms: usize) -> Self {
        Self {
            reference,
            group,
            num_atoms,
        }
    }

    pub fn from_points(reference: &[Point3<f64>], group: Vec<usize>, num_atoms: usize) -> Self {
        Self::new(
            reference.iter().map(|p| [p.x, p.y, p.z]).collect(),
            group,
            num_atoms,
        )
    }

    /// Reference rows of the group members, in group order.
    fn group_reference(&self) -> Result<Vec<Point3<f64>>, CvError> {
        let row = |r: &[f64; 3]| Point3::new(r[0], r[1], r[2]);
        if self.reference.len() == self.num_atoms {
            Ok(self.group.iter().map(|&i| row(&self.reference[i])).collect())
        } else if self.reference.len() == self.group.len() {
            Ok(self.reference.iter().map(row).collect())
        } else {
            Err(CvError::invalid(
                "reference",
                format!(
                    "has {} rows, expected {} (all atoms) or {} (group)",
                    self.reference.len(),
                    self.num_atoms,
                    self.group.len()
                ),
            ))
        }
    }
}

impl Variant for Rmsd {
    const TAG: &'static str = "RMSD";
    const SCHEMA: &'static [ArgSpec] = &[
        ArgSpec::required("reference", ArgType::Points),
        ArgSpec::required("group", ArgType::IndexList),
        ArgSpec::required("num_atoms", ArgType::Integer),
    ];

    fn unit() -> Unit {
        Unit::nanometer()
    }

    fn arguments(&self) -> Vec<ArgValue> {
        vec![
            ArgValue::Points(self.reference.clone()),
            ArgValue::IndexList(self.group.clone()),
            ArgValue::Integer(self.num_atoms),
        ]
    }

    fn from_arguments(args: &Arguments) -> Result<Self, CvError> {
        Ok(Self {
            reference: args.points("reference")?,
            group: args.index_list("group")?,
            num_atoms: args.integer("num_atoms")?,
        })
    }

    fn build_force(&self) -> Result<Arc<Force>, CvError> {
        if self.group.is_empty() {
            return Err(CvError::invalid("group", "must contain at least one atom"));
        }
        for &index in &self.group {
            check_index("group", index, self.num_atoms)?;
        }
        let reference = centered(&self.group_reference()?);
        let force = RmsdForce::new(reference.into(), self.group.clone())?;
        Ok(Arc::new(force.into()))
    }
}
