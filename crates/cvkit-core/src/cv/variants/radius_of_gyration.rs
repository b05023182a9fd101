use crate::core::units::Unit;
use crate::cv::Variant;
use crate::cv::error::CvError;
use crate::cv::schema::{ArgSpec, ArgType, ArgValue, Arguments};
use crate::engine::force::{Force, GyrationForce};
use std::sync::Arc;

/// Root-mean-square distance of a group of atoms from their centroid (unweighted).
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusOfGyration {
    pub group: Vec<usize>,
}

impl RadiusOfGyration {
    pub fn new(group: impl IntoIterator<Item = usize>) -> Self {
        Self {
            group: group.into_iter().collect(),
        }
    }
}

impl Variant for RadiusOfGyration {
    const TAG: &'static str = "RadiusOfGyration";
    const SCHEMA: &'static [ArgSpec] = &[ArgSpec::required("group", ArgType::IndexList)];

    fn unit() -> Unit {
        Unit::nanometer()
    }

    fn arguments(&self) -> Vec<ArgValue> {
        vec![ArgValue::IndexList(self.group.clone())]
    }

    fn from_arguments(args: &Arguments) -> Result<Self, CvError> {
        Ok(Self {
            group: args.index_list("group")?,
        })
    }

    fn build_force(&self) -> Result<Arc<Force>, CvError> {
        if self.group.is_empty() {
            return Err(CvError::invalid("group", "must contain at least one atom"));
        }
        Ok(Arc::new(GyrationForce::new(self.group.clone()).into()))
    }
}
