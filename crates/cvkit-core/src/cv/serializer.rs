//! JSON Lines persistence of collective variables.
//!
//! A record holds the variant tag, the variable's name, and its bound arguments in
//! declared order:
//!
//! ```text
//! {"type":"Distance","name":"end_to_end","arguments":{"atom1":0,"atom2":41,"pbc":false}}
//! ```
//!
//! Reading a record looks the tag up in a compile-time registry, checks every value
//! against the variant's schema, fills in defaults for omitted optional arguments and
//! rebuilds the variable through its regular constructor.

use super::content::sheet::SheetRmsdContent;
use super::error::{CvError, SerializationError};
use super::schema::{ArgSpec, ArgValue, Arguments};
use super::variants::{
    angle::Angle, distance::Distance, helix_torsion_content::HelixTorsionContent,
    number_of_contacts::NumberOfContacts, radius_of_gyration::RadiusOfGyration, rmsd::Rmsd,
    torsion::Torsion, torsion_similarity::TorsionSimilarity,
};
use super::{CollectiveVariable, CvKind, Variant};
use phf::{Map, phf_map};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufRead, Write};
use tracing::debug;

/// One serialized collective variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedRecord {
    #[serde(rename = "type")]
    pub tag: String,
    pub name: String,
    pub arguments: serde_json::Map<String, Value>,
}

struct Registration {
    schema: &'static [ArgSpec],
    construct: fn(&Arguments) -> Result<CvKind, CvError>,
}

fn construct<V: Variant>(args: &Arguments) -> Result<CvKind, CvError> {
    Ok(V::from_arguments(args)?.into())
}

static REGISTRY: Map<&'static str, Registration> = phf_map! {
    "Distance" => Registration { schema: Distance::SCHEMA, construct: construct::<Distance> },
    "Angle" => Registration { schema: Angle::SCHEMA, construct: construct::<Angle> },
    "Torsion" => Registration { schema: Torsion::SCHEMA, construct: construct::<Torsion> },
    "RadiusOfGyration" => Registration {
        schema: RadiusOfGyration::SCHEMA,
        construct: construct::<RadiusOfGyration>,
    },
    "NumberOfContacts" => Registration {
        schema: NumberOfContacts::SCHEMA,
        construct: construct::<NumberOfContacts>,
    },
    "RMSD" => Registration { schema: Rmsd::SCHEMA, construct: construct::<Rmsd> },
    "TorsionSimilarity" => Registration {
        schema: TorsionSimilarity::SCHEMA,
        construct: construct::<TorsionSimilarity>,
    },
    "HelixTorsionContent" => Registration {
        schema: HelixTorsionContent::SCHEMA,
        construct: construct::<HelixTorsionContent>,
    },
    "SheetRMSDContent" => Registration {
        schema: SheetRmsdContent::SCHEMA,
        construct: construct::<SheetRmsdContent>,
    },
};

pub fn to_record(cv: &CollectiveVariable) -> Result<SerializedRecord, SerializationError> {
    let mut arguments = serde_json::Map::new();
    for (name, value) in cv.arguments().iter() {
        arguments.insert(name.to_string(), serde_json::to_value(value)?);
    }
    Ok(SerializedRecord {
        tag: cv.tag().to_string(),
        name: cv.name().to_string(),
        arguments,
    })
}

pub fn from_record(record: &SerializedRecord) -> Result<CollectiveVariable, CvError> {
    let (&tag, registration) = REGISTRY
        .get_entry(record.tag.as_str())
        .ok_or_else(|| SerializationError::UnknownTag(record.tag.clone()))?;

    if let Some(extra) = record
        .arguments
        .keys()
        .find(|key| !registration.schema.iter().any(|spec| spec.name == key.as_str()))
    {
        return Err(SerializationError::UnexpectedArgument {
            tag: tag.to_string(),
            argument: extra.clone(),
        }
        .into());
    }

    let mut args = Arguments::new(tag);
    for spec in registration.schema {
        let value = match record.arguments.get(spec.name) {
            Some(json) => ArgValue::from_json(spec.ty, json).ok_or_else(|| {
                SerializationError::TypeMismatch {
                    tag: tag.to_string(),
                    argument: spec.name.to_string(),
                }
            })?,
            None => spec.default.map(|default| default.to_value()).ok_or_else(|| {
                SerializationError::MissingArgument {
                    tag: tag.to_string(),
                    argument: spec.name.to_string(),
                }
            })?,
        };
        args.push(spec.name, value);
    }

    let cv = CollectiveVariable::new((registration.construct)(&args)?)?.with_name(&record.name);
    debug!(variant = tag, name = %record.name, "Deserialized collective variable");
    Ok(cv)
}

/// Writes one record followed by a newline.
pub fn serialize<W: Write>(cv: &CollectiveVariable, mut writer: W) -> Result<(), SerializationError> {
    let record = to_record(cv)?;
    serde_json::to_writer(&mut writer, &record)?;
    writer.write_all(b"\n")?;
    Ok(())
}

pub fn serialize_all<W: Write>(
    cvs: &[CollectiveVariable],
    mut writer: W,
) -> Result<(), SerializationError> {
    for cv in cvs {
        serialize(cv, &mut writer)?;
    }
    writer.flush()?;
    Ok(())
}

fn records<R: BufRead>(reader: R) -> impl Iterator<Item = Result<SerializedRecord, SerializationError>> {
    reader.lines().filter_map(|line| match line {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(serde_json::from_str(&line).map_err(SerializationError::from)),
        Err(e) => Some(Err(e.into())),
    })
}

/// Reads the first record of the stream, skipping blank lines.
pub fn deserialize<R: BufRead>(reader: R) -> Result<CollectiveVariable, CvError> {
    let record = records(reader)
        .next()
        .ok_or(SerializationError::EmptyStream)??;
    from_record(&record)
}

pub fn deserialize_all<R: BufRead>(reader: R) -> Result<Vec<CollectiveVariable>, CvError> {
    records(reader)
        .map(|record| from_record(&record?))
        .collect()
}
