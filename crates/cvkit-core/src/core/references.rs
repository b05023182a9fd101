use crate::core::utils::geometry::centered;
use nalgebra::{Point3, Vector3};
use once_cell::sync::OnceCell;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Ångström to nanometer.
const ANGSTROM: f64 = 0.1;

const PARALLEL_SHEET_CSV: &str = include_str!("../../data/ideal_parallel_beta_sheet.csv");
const ANTIPARALLEL_SHEET_CSV: &str = include_str!("../../data/ideal_antiparallel_beta_sheet.csv");

/// Atoms per residue in the sheet templates, in template order.
pub const SHEET_ATOMS_PER_RESIDUE: usize = 5;
/// Residues per sheet template: two strands of three residues.
pub const SHEET_RESIDUES: usize = 6;

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV parsing error for '{name}': {source}")]
    Csv { name: String, source: csv::Error },
    #[error("Reference '{name}' has {found} points, expected {expected}")]
    Size {
        name: String,
        found: usize,
        expected: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SheetGeometry {
    Parallel,
    Antiparallel,
}

impl SheetGeometry {
    pub fn from_parallel_flag(parallel: bool) -> Self {
        if parallel {
            SheetGeometry::Parallel
        } else {
            SheetGeometry::Antiparallel
        }
    }

    /// Smallest sequence separation between the first residues of the two strands.
    pub fn min_separation(self) -> usize {
        match self {
            SheetGeometry::Parallel => 6,
            SheetGeometry::Antiparallel => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SheetGeometry::Parallel => "ideal_parallel_beta_sheet",
            SheetGeometry::Antiparallel => "ideal_antiparallel_beta_sheet",
        }
    }

    fn source(self) -> &'static str {
        match self {
            SheetGeometry::Parallel => PARALLEL_SHEET_CSV,
            SheetGeometry::Antiparallel => ANTIPARALLEL_SHEET_CSV,
        }
    }

    fn cell(self) -> &'static OnceCell<Arc<[Vector3<f64>]>> {
        static PARALLEL: OnceCell<Arc<[Vector3<f64>]>> = OnceCell::new();
        static ANTIPARALLEL: OnceCell<Arc<[Vector3<f64>]>> = OnceCell::new();
        match self {
            SheetGeometry::Parallel => &PARALLEL,
            SheetGeometry::Antiparallel => &ANTIPARALLEL,
        }
    }
}

/// Returns the ideal six-residue β-sheet in nanometers, centered at the origin.
///
/// Atoms are ordered residue by residue as N, CA, CB, C, O. The data is parsed on
/// first use and every later call shares the same buffer.
pub fn ideal_sheet(geometry: SheetGeometry) -> Result<Arc<[Vector3<f64>]>, ReferenceError> {
    geometry
        .cell()
        .get_or_try_init(|| {
            let points = read_points(geometry.name(), geometry.source().as_bytes())?;
            let expected = SHEET_RESIDUES * SHEET_ATOMS_PER_RESIDUE;
            if points.len() != expected {
                return Err(ReferenceError::Size {
                    name: geometry.name().to_string(),
                    found: points.len(),
                    expected,
                });
            }
            debug!(reference = geometry.name(), "Loaded ideal sheet geometry");
            Ok(centered(&points).into())
        })
        .cloned()
}

/// Loads `x,y,z` rows in ångström from a headerless CSV file and returns them in
/// nanometers, uncentered.
pub fn load_points(path: &Path) -> Result<Vec<Point3<f64>>, ReferenceError> {
    let file = std::fs::File::open(path).map_err(|e| ReferenceError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    read_points(&path.to_string_lossy(), file)
}

fn read_points<R: Read>(name: &str, source: R) -> Result<Vec<Point3<f64>>, ReferenceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(source);
    reader
        .deserialize::<(f64, f64, f64)>()
        .map(|row| {
            row.map(|(x, y, z)| Point3::new(x, y, z) * ANGSTROM)
                .map_err(|e| ReferenceError::Csv {
                    name: name.to_string(),
                    source: e,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn sheets_have_thirty_centered_atoms() {
        for geometry in [SheetGeometry::Parallel, SheetGeometry::Antiparallel] {
            let points = ideal_sheet(geometry).unwrap();
            assert_eq!(points.len(), 30);
            let center: Vector3<f64> = points.iter().sum::<Vector3<f64>>() / 30.0;
            assert!(center.norm() < 1e-12);
        }
    }

    #[test]
    fn sheet_is_shared_between_calls() {
        let first = ideal_sheet(SheetGeometry::Antiparallel).unwrap();
        let second = ideal_sheet(SheetGeometry::Antiparallel).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn sheet_bond_lengths_are_in_nanometers() {
        let points = ideal_sheet(SheetGeometry::Parallel).unwrap();
        // N-CA of the first residue
        let bond = (points[1] - points[0]).norm();
        assert!((bond - 0.146).abs() < 0.005, "N-CA bond length {bond}");
    }

    #[test]
    fn geometries_differ_in_strand_separation() {
        assert_eq!(SheetGeometry::from_parallel_flag(true).min_separation(), 6);
        assert_eq!(SheetGeometry::from_parallel_flag(false).min_separation(), 5);
    }

    #[test]
    fn load_points_converts_angstrom_to_nanometer() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "10.0, 0.0, -5.0").unwrap();
        writeln!(file, "1.0,2.0,3.0").unwrap();
        let points = load_points(file.path()).unwrap();
        assert_eq!(points.len(), 2);
        assert!((points[0] - Point3::new(1.0, 0.0, -0.5)).norm() < 1e-12);
    }

    #[test]
    fn load_points_rejects_malformed_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1.0,abc,3.0").unwrap();
        let result = load_points(file.path());
        assert!(matches!(result, Err(ReferenceError::Csv { .. })));
    }

    #[test]
    fn load_points_fails_for_missing_file() {
        let result = load_points(Path::new("/definitely/not/here.csv"));
        assert!(matches!(result, Err(ReferenceError::Io { .. })));
    }
}
