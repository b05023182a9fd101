//! # Collective Variables
//!
//! The public API of the crate. A [`CollectiveVariable`] wraps one variant of the
//! closed set [`CvKind`], the engine force built from its arguments, a name and a unit.
//!
//! ## Contract
//!
//! - **Introspection** - every variant declares a static argument schema
//!   ([`schema::ArgSpec`]). [`CollectiveVariable::declared_arguments`] and
//!   [`CollectiveVariable::default_arguments`] read it, and
//!   [`CollectiveVariable::arguments`] returns the values bound at construction.
//! - **Evaluation** - after the variable is added to a [`System`](crate::engine::system::System)
//!   and a [`Context`] is initialized with positions, [`CollectiveVariable::evaluate`] and
//!   [`CollectiveVariable::effective_mass`] query the engine.
//! - **Serialization** - [`serializer`] writes and reads JSON Lines records that rebuild
//!   an equivalent variable from its tag and arguments alone.
//!
//! All validation happens in [`CollectiveVariable::new`], before any force exists.

pub mod config;
pub mod content;
pub mod error;
pub mod schema;
pub mod serializer;
pub mod variants;

use crate::core::units::{Quantity, Unit};
use crate::engine::context::Context;
use crate::engine::force::Force;
use crate::engine::system::ForceProvider;
use error::CvError;
use schema::{ArgSpec, ArgType, ArgValue, Arguments};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

use content::sheet::SheetRmsdContent;
use variants::{
    angle::Angle, distance::Distance, helix_torsion_content::HelixTorsionContent,
    number_of_contacts::NumberOfContacts, radius_of_gyration::RadiusOfGyration, rmsd::Rmsd,
    torsion::Torsion, torsion_similarity::TorsionSimilarity,
};

/// Behavior shared by every concrete variant.
pub(crate) trait Variant: Sized + Into<CvKind> {
    const TAG: &'static str;
    const SCHEMA: &'static [ArgSpec];

    fn unit() -> Unit;

    /// Bound values, one per schema entry and in schema order.
    fn arguments(&self) -> Vec<ArgValue>;

    fn from_arguments(args: &Arguments) -> Result<Self, CvError>;

    /// Validates the arguments and builds the engine force.
    fn build_force(&self) -> Result<Arc<Force>, CvError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum CvKind {
    Distance(Distance),
    Angle(Angle),
    Torsion(Torsion),
    RadiusOfGyration(RadiusOfGyration),
    NumberOfContacts(NumberOfContacts),
    Rmsd(Rmsd),
    TorsionSimilarity(TorsionSimilarity),
    HelixTorsionContent(HelixTorsionContent),
    SheetRmsdContent(SheetRmsdContent),
}

macro_rules! dispatch {
    ($kind:expr, $v:ident => $body:expr) => {
        match $kind {
            CvKind::Distance($v) => $body,
            CvKind::Angle($v) => $body,
            CvKind::Torsion($v) => $body,
            CvKind::RadiusOfGyration($v) => $body,
            CvKind::NumberOfContacts($v) => $body,
            CvKind::Rmsd($v) => $body,
            CvKind::TorsionSimilarity($v) => $body,
            CvKind::HelixTorsionContent($v) => $body,
            CvKind::SheetRmsdContent($v) => $body,
        }
    };
}

macro_rules! impl_into_kind {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for CvKind {
                fn from(value: $variant) -> Self {
                    CvKind::$variant(value)
                }
            }
        )*
    };
}

impl_into_kind!(
    Distance,
    Angle,
    Torsion,
    RadiusOfGyration,
    NumberOfContacts,
    Rmsd,
    TorsionSimilarity,
    HelixTorsionContent,
    SheetRmsdContent,
);

fn tag_of<V: Variant>(_: &V) -> &'static str {
    V::TAG
}

fn schema_of<V: Variant>(_: &V) -> &'static [ArgSpec] {
    V::SCHEMA
}

fn unit_of<V: Variant>(_: &V) -> Unit {
    V::unit()
}

impl CvKind {
    pub fn tag(&self) -> &'static str {
        dispatch!(self, v => tag_of(v))
    }

    pub fn schema(&self) -> &'static [ArgSpec] {
        dispatch!(self, v => schema_of(v))
    }

    pub fn unit(&self) -> Unit {
        dispatch!(self, v => unit_of(v))
    }

    pub fn arguments(&self) -> Arguments {
        let mut args = Arguments::new(self.tag());
        let values = dispatch!(self, v => v.arguments());
        for (spec, value) in self.schema().iter().zip(values) {
            args.push(spec.name, value);
        }
        args
    }

    fn build_force(&self) -> Result<Arc<Force>, CvError> {
        dispatch!(self, v => v.build_force())
    }
}

/// Checks that a schema has unique, non-empty names and type-consistent defaults.
///
/// Every argument carries an [`ArgType`], so a missing semantic type cannot be expressed.
pub(crate) fn check_schema(variant: &'static str, schema: &[ArgSpec]) -> Result<(), CvError> {
    let mut seen = HashSet::new();
    for spec in schema {
        let violation = |message: String| CvError::Contract { variant, message };
        if spec.name.is_empty() {
            return Err(violation("argument with an empty name".to_string()));
        }
        if !seen.insert(spec.name) {
            return Err(violation(format!("argument '{}' is declared twice", spec.name)));
        }
        if let Some(default) = spec.default {
            if !default.fits(spec.ty) {
                return Err(violation(format!(
                    "default of argument '{}' does not fit type {}",
                    spec.name, spec.ty
                )));
            }
        }
    }
    Ok(())
}

/// A named, unit-carrying scalar function of particle coordinates.
#[derive(Debug, Clone)]
pub struct CollectiveVariable {
    name: String,
    unit: Unit,
    kind: CvKind,
    force: Arc<Force>,
}

impl CollectiveVariable {
    pub fn new(kind: impl Into<CvKind>) -> Result<Self, CvError> {
        let kind = kind.into();
        let tag = kind.tag();
        check_schema(tag, kind.schema())?;
        let unit = kind.unit();
        if !unit.is_md_unit() {
            return Err(CvError::Contract {
                variant: tag,
                message: format!(
                    "unit {} is {} in MD units, expected 1",
                    unit,
                    unit.conversion_factor()
                ),
            });
        }
        let force = kind.build_force()?;
        debug!(variant = tag, unit = %unit, "Constructed collective variable");
        Ok(Self {
            name: tag.to_string(),
            unit,
            kind,
            force,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &'static str {
        self.kind.tag()
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn kind(&self) -> &CvKind {
        &self.kind
    }

    /// Argument names with their semantic types, in declared order.
    pub fn declared_arguments(&self) -> Vec<(&'static str, ArgType)> {
        self.kind
            .schema()
            .iter()
            .map(|spec| (spec.name, spec.ty))
            .collect()
    }

    pub fn default_arguments(&self) -> Vec<(&'static str, ArgValue)> {
        self.kind
            .schema()
            .iter()
            .filter_map(|spec| spec.default.map(|d| (spec.name, d.to_value())))
            .collect()
    }

    pub fn arguments(&self) -> Arguments {
        self.kind.arguments()
    }

    /// Number of residue groups of a sheet-content variable.
    pub fn num_residue_blocks(&self) -> Option<usize> {
        match &self.kind {
            CvKind::SheetRmsdContent(content) => Some(content.num_residue_blocks()),
            _ => None,
        }
    }

    #[instrument(level = "debug", skip_all, fields(cv = %self.name))]
    pub fn evaluate(&self, context: &Context) -> Result<Quantity, CvError> {
        let value = context.evaluate(&self.force)?;
        Ok(Quantity::new(value, self.unit.clone()))
    }

    #[instrument(level = "debug", skip_all, fields(cv = %self.name))]
    pub fn effective_mass(&self, context: &Context) -> Result<Quantity, CvError> {
        let mass = context.effective_mass(&self.force)?;
        Ok(Quantity::new(mass, self.unit.effective_mass_unit()))
    }
}

impl ForceProvider for CollectiveVariable {
    fn force(&self) -> &Arc<Force> {
        &self.force
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::units::Dimensions;
    use crate::engine::system::System;
    use nalgebra::Point3;
    use schema::ArgDefault;

    fn context_with(cv: &CollectiveVariable, positions: Vec<Point3<f64>>) -> Context {
        let mut system = System::with_masses(vec![12.0; positions.len()]);
        system.add_force(cv);
        Context::with_positions(system, positions).unwrap()
    }

    #[test]
    fn default_name_is_the_tag() {
        let cv = CollectiveVariable::new(Distance::new(0, 1)).unwrap();
        assert_eq!(cv.name(), "Distance");
        assert_eq!(cv.tag(), "Distance");
        let cv = cv.with_name("end_to_end");
        assert_eq!(cv.name(), "end_to_end");
        assert_eq!(cv.tag(), "Distance");
    }

    #[test]
    fn introspection_reports_schema_and_bound_values() {
        let cv = CollectiveVariable::new(Distance::new(3, 7).with_pbc(true)).unwrap();
        assert_eq!(
            cv.declared_arguments(),
            vec![
                ("atom1", ArgType::Index),
                ("atom2", ArgType::Index),
                ("pbc", ArgType::Boolean)
            ]
        );
        assert_eq!(cv.default_arguments(), vec![("pbc", ArgValue::Boolean(false))]);
        let args = cv.arguments();
        assert_eq!(args.get("atom2"), Some(&ArgValue::Integer(7)));
        assert_eq!(args.get("pbc"), Some(&ArgValue::Boolean(true)));
    }

    #[test]
    fn every_variant_schema_passes_the_contract_check() {
        let schemas: [(&str, &[ArgSpec]); 9] = [
            (Distance::TAG, Distance::SCHEMA),
            (Angle::TAG, Angle::SCHEMA),
            (Torsion::TAG, Torsion::SCHEMA),
            (RadiusOfGyration::TAG, RadiusOfGyration::SCHEMA),
            (NumberOfContacts::TAG, NumberOfContacts::SCHEMA),
            (Rmsd::TAG, Rmsd::SCHEMA),
            (TorsionSimilarity::TAG, TorsionSimilarity::SCHEMA),
            (HelixTorsionContent::TAG, HelixTorsionContent::SCHEMA),
            (SheetRmsdContent::TAG, SheetRmsdContent::SCHEMA),
        ];
        for (tag, schema) in schemas {
            assert!(check_schema(tag, schema).is_ok(), "{tag}");
        }
    }

    #[test]
    fn broken_schemas_are_contract_violations() {
        static DUPLICATE: &[ArgSpec] = &[
            ArgSpec::required("atom", ArgType::Index),
            ArgSpec::required("atom", ArgType::Index),
        ];
        static BAD_DEFAULT: &[ArgSpec] = &[ArgSpec::optional(
            "cutoff",
            ArgType::Length,
            ArgDefault::Text("far"),
        )];
        assert!(matches!(
            check_schema("Broken", DUPLICATE),
            Err(CvError::Contract { variant: "Broken", .. })
        ));
        assert!(matches!(
            check_schema("Broken", BAD_DEFAULT),
            Err(CvError::Contract { .. })
        ));
    }

    #[test]
    fn units_are_canonical() {
        let distance = CollectiveVariable::new(Distance::new(0, 1)).unwrap();
        assert!(distance.unit().is_md_unit());
        assert_eq!(
            distance.unit().dimensions(),
            Dimensions {
                length: 1,
                ..Dimensions::NONE
            }
        );
        let angle = CollectiveVariable::new(Angle::new(0, 1, 2)).unwrap();
        assert_eq!(angle.unit().symbol(), "rad");
    }

    #[test]
    fn evaluation_requires_a_bound_context() {
        let cv = CollectiveVariable::new(Distance::new(0, 1)).unwrap();
        let other = CollectiveVariable::new(Distance::new(0, 1)).unwrap();
        let context = context_with(&cv, vec![Point3::origin(), Point3::new(0.0, 0.3, 0.4)]);
        let value = cv.evaluate(&context).unwrap();
        assert!((value.value - 0.5).abs() < 1e-12);
        assert_eq!(value.unit, Unit::nanometer());
        assert!(matches!(
            other.evaluate(&context),
            Err(CvError::Engine {
                source: crate::engine::error::EngineError::NotBound
            })
        ));
    }

    #[test]
    fn effective_mass_carries_conjugate_unit() {
        let cv = CollectiveVariable::new(Angle::new(0, 1, 2)).unwrap();
        let context = context_with(
            &cv,
            vec![
                Point3::new(0.15, 0.0, 0.0),
                Point3::origin(),
                Point3::new(0.0, 0.15, 0.0),
            ],
        );
        let mass = cv.effective_mass(&context).unwrap();
        assert_eq!(mass.unit.symbol(), "Da*nm**2*rad**-2");
        assert!(mass.value.is_finite() && mass.value > 0.0);
    }

    #[test]
    fn num_residue_blocks_is_only_defined_for_sheet_content() {
        let cv = CollectiveVariable::new(Distance::new(0, 1)).unwrap();
        assert_eq!(cv.num_residue_blocks(), None);
    }
}
