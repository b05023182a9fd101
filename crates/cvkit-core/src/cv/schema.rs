//! Static argument schemas and the values bound to them.

use super::error::SerializationError;
use crate::core::models::residue::Residue;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Semantic type of a constructor argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgType {
    Boolean,
    Integer,
    /// A particle index.
    Index,
    Real,
    /// A real number in nanometers.
    Length,
    /// A real number in radians.
    Angle,
    Text,
    IndexList,
    OptionalIndexList,
    IndexQuadruples,
    /// Coordinates in nanometers, one `[x, y, z]` row per point.
    Points,
    Residues,
}

impl ArgType {
    pub fn name(self) -> &'static str {
        match self {
            ArgType::Boolean => "bool",
            ArgType::Integer => "int",
            ArgType::Index => "index",
            ArgType::Real => "float",
            ArgType::Length => "length",
            ArgType::Angle => "angle",
            ArgType::Text => "str",
            ArgType::IndexList => "list[index]",
            ArgType::OptionalIndexList => "optional[list[int]]",
            ArgType::IndexQuadruples => "list[tuple[index; 4]]",
            ArgType::Points => "list[tuple[length; 3]]",
            ArgType::Residues => "list[residue]",
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A default value that can be written in a `static` schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgDefault {
    Boolean(bool),
    Integer(usize),
    Real(f64),
    Text(&'static str),
    Absent,
}

impl ArgDefault {
    pub fn to_value(self) -> ArgValue {
        match self {
            ArgDefault::Boolean(value) => ArgValue::Boolean(value),
            ArgDefault::Integer(value) => ArgValue::Integer(value),
            ArgDefault::Real(value) => ArgValue::Real(value),
            ArgDefault::Text(value) => ArgValue::Text(value.to_string()),
            ArgDefault::Absent => ArgValue::OptionalIndexList(None),
        }
    }

    pub fn fits(self, ty: ArgType) -> bool {
        matches!(
            (self, ty),
            (ArgDefault::Boolean(_), ArgType::Boolean)
                | (ArgDefault::Integer(_), ArgType::Integer | ArgType::Index)
                | (
                    ArgDefault::Real(_),
                    ArgType::Real | ArgType::Length | ArgType::Angle
                )
                | (ArgDefault::Text(_), ArgType::Text)
                | (ArgDefault::Absent, ArgType::OptionalIndexList)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArgSpec {
    pub name: &'static str,
    pub ty: ArgType,
    pub default: Option<ArgDefault>,
}

impl ArgSpec {
    pub const fn required(name: &'static str, ty: ArgType) -> Self {
        Self {
            name,
            ty,
            default: None,
        }
    }

    pub const fn optional(name: &'static str, ty: ArgType, default: ArgDefault) -> Self {
        Self {
            name,
            ty,
            default: Some(default),
        }
    }
}

/// A bound argument value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArgValue {
    Boolean(bool),
    Integer(usize),
    Real(f64),
    Text(String),
    IndexList(Vec<usize>),
    OptionalIndexList(Option<Vec<usize>>),
    IndexQuadruples(Vec<[usize; 4]>),
    Points(Vec<[f64; 3]>),
    Residues(Vec<Residue>),
}

impl ArgValue {
    /// Reads a JSON value as an argument of the given semantic type.
    pub fn from_json(ty: ArgType, value: &Value) -> Option<Self> {
        let converted = match ty {
            ArgType::Boolean => ArgValue::Boolean(value.as_bool()?),
            ArgType::Integer | ArgType::Index => {
                ArgValue::Integer(usize::try_from(value.as_u64()?).ok()?)
            }
            ArgType::Real | ArgType::Length | ArgType::Angle => ArgValue::Real(value.as_f64()?),
            ArgType::Text => ArgValue::Text(value.as_str()?.to_string()),
            ArgType::IndexList => ArgValue::IndexList(serde_json::from_value(value.clone()).ok()?),
            ArgType::OptionalIndexList => {
                ArgValue::OptionalIndexList(serde_json::from_value(value.clone()).ok()?)
            }
            ArgType::IndexQuadruples => {
                ArgValue::IndexQuadruples(serde_json::from_value(value.clone()).ok()?)
            }
            ArgType::Points => ArgValue::Points(serde_json::from_value(value.clone()).ok()?),
            ArgType::Residues => ArgValue::Residues(serde_json::from_value(value.clone()).ok()?),
        };
        Some(converted)
    }
}

/// Arguments of one collective variable, in declared order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Arguments {
    tag: &'static str,
    values: Vec<(&'static str, ArgValue)>,
}

macro_rules! typed_getter {
    ($fn_name:ident, $variant:ident, $ty:ty) => {
        pub fn $fn_name(&self, name: &'static str) -> Result<$ty, SerializationError> {
            match self.get(name) {
                Some(ArgValue::$variant(value)) => Ok(value.clone()),
                Some(_) => Err(self.mismatch(name)),
                None => Err(self.missing(name)),
            }
        }
    };
}

impl Arguments {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            values: Vec::new(),
        }
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn push(&mut self, name: &'static str, value: ArgValue) {
        self.values.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values
            .iter()
            .find(|(arg, _)| *arg == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ArgValue)> {
        self.values.iter().map(|(name, value)| (*name, value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn missing(&self, name: &'static str) -> SerializationError {
        SerializationError::MissingArgument {
            tag: self.tag.to_string(),
            argument: name.to_string(),
        }
    }

    fn mismatch(&self, name: &'static str) -> SerializationError {
        SerializationError::TypeMismatch {
            tag: self.tag.to_string(),
            argument: name.to_string(),
        }
    }

    typed_getter!(boolean, Boolean, bool);
    typed_getter!(integer, Integer, usize);
    typed_getter!(real, Real, f64);
    typed_getter!(text, Text, String);
    typed_getter!(index_list, IndexList, Vec<usize>);
    typed_getter!(optional_index_list, OptionalIndexList, Option<Vec<usize>>);
    typed_getter!(index_quadruples, IndexQuadruples, Vec<[usize; 4]>);
    typed_getter!(points, Points, Vec<[f64; 3]>);
    typed_getter!(residues, Residues, Vec<Residue>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_fit_their_declared_types() {
        assert!(ArgDefault::Real(0.3).fits(ArgType::Length));
        assert!(ArgDefault::Integer(3).fits(ArgType::Index));
        assert!(ArgDefault::Absent.fits(ArgType::OptionalIndexList));
        assert!(!ArgDefault::Text("x").fits(ArgType::Real));
        assert!(!ArgDefault::Boolean(true).fits(ArgType::Integer));
    }

    #[test]
    fn json_values_are_coerced_by_type() {
        assert_eq!(
            ArgValue::from_json(ArgType::Length, &json!(1)),
            Some(ArgValue::Real(1.0))
        );
        assert_eq!(
            ArgValue::from_json(ArgType::Index, &json!(7)),
            Some(ArgValue::Integer(7))
        );
        assert_eq!(ArgValue::from_json(ArgType::Index, &json!(-1)), None);
        assert_eq!(ArgValue::from_json(ArgType::Index, &json!(1.5)), None);
        assert_eq!(
            ArgValue::from_json(ArgType::OptionalIndexList, &json!(null)),
            Some(ArgValue::OptionalIndexList(None))
        );
        assert_eq!(
            ArgValue::from_json(ArgType::IndexQuadruples, &json!([[0, 1, 2, 3]])),
            Some(ArgValue::IndexQuadruples(vec![[0, 1, 2, 3]]))
        );
        assert_eq!(ArgValue::from_json(ArgType::Points, &json!([[0.0, 1.0]])), None);
        assert_eq!(ArgValue::from_json(ArgType::Boolean, &json!("true")), None);
    }

    #[test]
    fn values_serialize_without_tags() {
        let value = serde_json::to_value(ArgValue::OptionalIndexList(Some(vec![3, 4]))).unwrap();
        assert_eq!(value, json!([3, 4]));
        let value = serde_json::to_value(ArgValue::OptionalIndexList(None)).unwrap();
        assert_eq!(value, json!(null));
        let value = serde_json::to_value(ArgValue::Real(0.08)).unwrap();
        assert_eq!(value, json!(0.08));
    }

    #[test]
    fn typed_getters_report_missing_and_mismatched_arguments() {
        let mut args = Arguments::new("Distance");
        args.push("atom1", ArgValue::Integer(0));
        args.push("pbc", ArgValue::Integer(1));
        assert_eq!(args.integer("atom1").unwrap(), 0);
        assert!(matches!(
            args.integer("atom2"),
            Err(SerializationError::MissingArgument { .. })
        ));
        assert!(matches!(
            args.boolean("pbc"),
            Err(SerializationError::TypeMismatch { .. })
        ));
        assert_eq!(args.len(), 2);
    }
}
