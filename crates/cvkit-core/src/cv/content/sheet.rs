use super::{MAX_GROUPS, assemble};
use crate::core::models::residue::Residue;
use crate::core::references::{SheetGeometry, ideal_sheet};
use crate::core::units::Unit;
use crate::cv::Variant;
use crate::cv::config::{ContentConfig, DEFAULT_SHEET_STEP_FUNCTION, DEFAULT_THRESHOLD_RMSD};
use crate::cv::error::CvError;
use crate::cv::schema::{ArgDefault, ArgSpec, ArgType, ArgValue, Arguments};
use crate::cv::variants::{check_index, residue_atom};
use crate::engine::force::Force;
use std::sync::Arc;

/// Per-residue atoms matched against the sheet templates, in template order.
const SHEET_ATOMS: [&str; 5] = ["N", "CA", "CB", "C", "O"];

/// β-sheet content of a residue sequence, measured by RMSD from an ideal sheet.
///
/// A group joins two triplets of consecutive residues, `(i, i+1, i+2)` and
/// `(j, j+1, j+2)`. Without blocks every pair with `j - i` at least the minimum strand
/// separation of the chosen geometry is used. With blocks, `i` runs over one block and
/// `j` over the next, so strands only pair across neighboring blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRmsdContent {
    residues: Vec<Residue>,
    num_atoms: usize,
    config: ContentConfig,
    groups: Vec<Vec<usize>>,
}

impl SheetRmsdContent {
    /// Validates the parameters and resolves every group into its particle indices.
    pub fn new(
        residues: Vec<Residue>,
        num_atoms: usize,
        config: ContentConfig,
    ) -> Result<Self, CvError> {
        config.validate()?;
        let geometry = SheetGeometry::from_parallel_flag(config.parallel);
        let pairs = match &config.block_sizes {
            None => strand_pairs(residues.len(), geometry.min_separation()),
            Some(sizes) => block_pairs(residues.len(), sizes)?,
        };
        if !(1..=MAX_GROUPS).contains(&pairs.len()) {
            return Err(CvError::BlockCountOutOfRange {
                residues: residues.len(),
                blocks: pairs.len(),
            });
        }

        let residue_atoms = residues
            .iter()
            .map(|residue| sheet_atoms(residue, num_atoms))
            .collect::<Result<Vec<_>, _>>()?;
        let groups = pairs
            .iter()
            .map(|&(i, j)| {
                [i, i + 1, i + 2, j, j + 1, j + 2]
                    .iter()
                    .flat_map(|&r| residue_atoms[r])
                    .collect()
            })
            .collect();

        Ok(Self {
            residues,
            num_atoms,
            config,
            groups,
        })
    }

    pub fn residues(&self) -> &[Residue] {
        &self.residues
    }

    pub fn config(&self) -> &ContentConfig {
        &self.config
    }

    pub fn num_residue_blocks(&self) -> usize {
        self.groups.len()
    }

    /// Particle indices of every group, thirty per group.
    pub fn groups(&self) -> &[Vec<usize>] {
        &self.groups
    }
}

/// First residues of every strand pair in an unblocked sequence.
fn strand_pairs(num_residues: usize, min_separation: usize) -> Vec<(usize, usize)> {
    let last_start = num_residues.saturating_sub(2);
    (0..last_start.saturating_sub(min_separation))
        .flat_map(|i| (i + min_separation..last_start).map(move |j| (i, j)))
        .collect()
}

/// First residues of every strand pair across consecutive blocks.
fn block_pairs(num_residues: usize, sizes: &[usize]) -> Result<Vec<(usize, usize)>, CvError> {
    let sum: usize = sizes.iter().sum();
    if sum != num_residues {
        return Err(CvError::BlockSizeMismatch {
            sum,
            residues: num_residues,
        });
    }
    let bounds: Vec<usize> = std::iter::once(0)
        .chain(sizes.iter().scan(0, |end, &size| {
            *end += size;
            Some(*end)
        }))
        .collect();
    Ok(bounds
        .windows(3)
        .flat_map(|w| {
            let (first, second) = (w[0]..w[1].saturating_sub(2), w[1]..w[2].saturating_sub(2));
            first.flat_map(move |i| second.clone().map(move |j| (i, j)))
        })
        .collect())
}

/// The five template atoms of a residue. Glycine lends its HA2 for the missing CB.
fn sheet_atoms(residue: &Residue, num_atoms: usize) -> Result<[usize; 5], CvError> {
    let mut atoms = [0; 5];
    for (slot, name) in atoms.iter_mut().zip(SHEET_ATOMS) {
        let index = match (name, residue.is_glycine()) {
            ("CB", true) => residue_atom(residue, "HA2")
                .map_err(|_| CvError::MissingAtom {
                    atom: name.to_string(),
                    residue: residue.label(),
                })?,
            _ => residue_atom(residue, name)?,
        };
        check_index("residues", index, num_atoms)?;
        *slot = index;
    }
    Ok(atoms)
}

impl Variant for SheetRmsdContent {
    const TAG: &'static str = "SheetRMSDContent";
    const SCHEMA: &'static [ArgSpec] = &[
        ArgSpec::required("residues", ArgType::Residues),
        ArgSpec::required("num_atoms", ArgType::Integer),
        ArgSpec::optional("parallel", ArgType::Boolean, ArgDefault::Boolean(false)),
        ArgSpec::optional("block_sizes", ArgType::OptionalIndexList, ArgDefault::Absent),
        ArgSpec::optional(
            "threshold_rmsd",
            ArgType::Length,
            ArgDefault::Real(DEFAULT_THRESHOLD_RMSD),
        ),
        ArgSpec::optional(
            "step_function",
            ArgType::Text,
            ArgDefault::Text(DEFAULT_SHEET_STEP_FUNCTION),
        ),
        ArgSpec::optional("normalize", ArgType::Boolean, ArgDefault::Boolean(false)),
    ];

    fn unit() -> Unit {
        Unit::dimensionless()
    }

    fn arguments(&self) -> Vec<ArgValue> {
        vec![
            ArgValue::Residues(self.residues.clone()),
            ArgValue::Integer(self.num_atoms),
            ArgValue::Boolean(self.config.parallel),
            ArgValue::OptionalIndexList(self.config.block_sizes.clone()),
            ArgValue::Real(self.config.threshold_rmsd),
            ArgValue::Text(self.config.step_function.clone()),
            ArgValue::Boolean(self.config.normalize),
        ]
    }

    fn from_arguments(args: &Arguments) -> Result<Self, CvError> {
        let config = ContentConfig {
            parallel: args.boolean("parallel")?,
            block_sizes: args.optional_index_list("block_sizes")?,
            threshold_rmsd: args.real("threshold_rmsd")?,
            step_function: args.text("step_function")?,
            normalize: args.boolean("normalize")?,
        };
        Self::new(args.residues("residues")?, args.integer("num_atoms")?, config)
    }

    fn build_force(&self) -> Result<Arc<Force>, CvError> {
        let reference = ideal_sheet(SheetGeometry::from_parallel_flag(self.config.parallel))?;
        assemble(&self.groups, &reference, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::topology::TopologyBuilder;
    use crate::core::utils::geometry::{align, centered};
    use crate::cv::CollectiveVariable;
    use crate::cv::variants::testing::assert_round_trip;
    use crate::engine::context::Context;
    use crate::engine::system::{ForceProvider, System};
    use nalgebra::Point3;

    /// Residues named ALA with N, CA, CB, C, O, except that every fourth is a glycine
    /// carrying HA2 instead of CB.
    fn peptide(count: usize) -> Vec<Residue> {
        let mut builder = TopologyBuilder::new();
        builder.start_chain('A');
        for k in 0..count {
            let glycine = k % 4 == 3;
            builder.start_residue(k as isize + 1, if glycine { "GLY" } else { "ALA" });
            for atom in ["N", "CA", if glycine { "HA2" } else { "CB" }, "C", "O"] {
                builder.add_atom(atom);
            }
        }
        builder.build().residues().cloned().collect()
    }

    /// Deterministic, irregular coordinates in nanometers.
    fn scattered(count: usize) -> Vec<Point3<f64>> {
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        (0..count)
            .map(|k| {
                let t = k as f64;
                Point3::new(
                    0.35 * t / 5.0 + 0.2 * next(),
                    0.5 * (0.4 * t).sin() + 0.2 * next(),
                    0.3 * (0.25 * t).cos() + 0.2 * next(),
                )
            })
            .collect()
    }

    fn content(residues: usize, config: ContentConfig) -> Result<SheetRmsdContent, CvError> {
        SheetRmsdContent::new(peptide(residues), 5 * residues, config)
    }

    fn switch(x: f64) -> f64 {
        (1.0 + x.powi(4)) / (1.0 + x.powi(4) + x.powi(8))
    }

    #[test]
    fn unblocked_group_count_matches_closed_form() {
        for (n, parallel) in [(12, false), (20, false), (31, false), (41, true), (14, true)] {
            let d = if parallel { 6 } else { 5 };
            let config = ContentConfig::builder().parallel(parallel).build().unwrap();
            let sheet = content(n, config).unwrap();
            assert_eq!(sheet.num_residue_blocks(), (n - 2 - d) * (n - 1 - d) / 2, "n = {n}");
        }
        let parallel = ContentConfig::builder().parallel(true).build().unwrap();
        assert_eq!(content(41, parallel).unwrap().num_residue_blocks(), 561);
    }

    #[test]
    fn blocked_group_count_matches_closed_form() {
        let config = ContentConfig::builder()
            .block_sizes(vec![11, 11, 9])
            .build()
            .unwrap();
        let sheet = content(31, config).unwrap();
        assert_eq!(sheet.num_residue_blocks(), 9 * 9 + 9 * 7);
        assert_eq!(sheet.num_residue_blocks(), 144);
    }

    #[test]
    fn blocked_groups_pair_only_neighboring_blocks() {
        let pairs = block_pairs(10, &[4, 3, 3]).unwrap();
        assert_eq!(pairs, vec![(0, 4), (1, 4), (4, 7)]);
    }

    #[test]
    fn block_sizes_must_cover_every_residue() {
        let config = ContentConfig::builder()
            .block_sizes(vec![11, 11, 8])
            .build()
            .unwrap();
        let err = content(31, config).unwrap_err();
        assert!(matches!(
            err,
            CvError::BlockSizeMismatch {
                sum: 30,
                residues: 31
            }
        ));
        assert!(err.is_configuration());
    }

    #[test]
    fn short_sequences_yield_no_groups() {
        let err = content(7, ContentConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            CvError::BlockCountOutOfRange {
                residues: 7,
                blocks: 0
            }
        ));
        assert!(content(8, ContentConfig::default()).is_ok());
    }

    #[test]
    fn glycine_lends_its_alpha_hydrogen() {
        let sheet = content(8, ContentConfig::default()).unwrap();
        // The only group joins residues 0, 1, 2 with 5, 6, 7; residue 7 is a glycine.
        let gly = &sheet.residues()[7];
        assert!(gly.is_glycine());
        let ha2 = gly.atom_index("HA2").unwrap();
        assert_eq!(sheet.groups()[0][5 * 5 + 2], ha2);
        assert_eq!(sheet.groups()[0].len(), 30);
    }

    #[test]
    fn missing_nitrogen_names_atom_and_residue() {
        let mut residues = peptide(12);
        let ca = residues[4].atom_index("CA").unwrap();
        residues[4] = Residue::with_atoms("VAL", 5, [("CA", ca)]);
        residues[9] = Residue::new("LYS", 10);
        let err = SheetRmsdContent::new(residues, 60, ContentConfig::default()).unwrap_err();
        assert_eq!(err.to_string(), "Atom N not found in residue VAL5");
    }

    #[test]
    fn glycine_without_alpha_hydrogen_reports_missing_beta_carbon() {
        let mut residues = peptide(12);
        residues[3] = Residue::with_atoms("GLY", 4, [("N", 15), ("CA", 16), ("C", 18), ("O", 19)]);
        let err = SheetRmsdContent::new(residues, 60, ContentConfig::default()).unwrap_err();
        assert_eq!(err.to_string(), "Atom CB not found in residue GLY4");
    }

    #[test]
    fn chunked_content_equals_sum_of_switched_rmsds() {
        let residues = 31;
        let positions = scattered(5 * residues);
        let sheet = content(residues, ContentConfig::default()).unwrap();
        assert_eq!(sheet.num_residue_blocks(), 300);

        let reference = ideal_sheet(SheetGeometry::Antiparallel).unwrap();
        let partial_sums: Vec<f64> = sheet
            .groups()
            .chunks(32)
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|group| {
                        let points: Vec<_> = group.iter().map(|&i| positions[i]).collect();
                        let rmsd = align(&centered(&points), &reference).unwrap().rmsd;
                        switch(rmsd / 0.08)
                    })
                    .sum::<f64>()
            })
            .collect();
        assert_eq!(partial_sums.len(), 10);
        let expected: f64 = partial_sums.iter().sum();

        let cv = CollectiveVariable::new(sheet).unwrap();
        let Force::CustomCv(root) = cv.force().as_ref() else {
            panic!("content variables are custom CV forces");
        };
        assert_eq!(root.num_collective_variables(), 10);

        let mut system = System::with_masses(vec![12.0; positions.len()]);
        system.add_force(&cv);
        let context = Context::with_positions(system, positions).unwrap();
        let value = cv.evaluate(&context).unwrap().value;
        assert!((value - expected).abs() < 1e-9 * expected.abs().max(1.0));
        assert!(value > 0.0);
    }

    #[test]
    fn normalized_content_is_divided_by_group_count() {
        let residues = 31;
        let positions = scattered(5 * residues);
        let raw = CollectiveVariable::new(content(residues, ContentConfig::default()).unwrap())
            .unwrap();
        let config = ContentConfig::builder().normalize(true).build().unwrap();
        let normalized = CollectiveVariable::new(content(residues, config).unwrap()).unwrap();
        assert_eq!(normalized.num_residue_blocks(), Some(300));

        let mut system = System::with_masses(vec![12.0; positions.len()]);
        system.add_force(&raw);
        system.add_force(&normalized);
        let context = Context::with_positions(system, positions).unwrap();
        let raw = raw.evaluate(&context).unwrap().value;
        let normalized = normalized.evaluate(&context).unwrap().value;
        assert!((normalized - raw / 300.0).abs() < 1e-12);
    }

    #[test]
    fn sheet_content_survives_round_trip() {
        let config = ContentConfig::builder()
            .parallel(true)
            .block_sizes(vec![6, 7, 6])
            .threshold_rmsd(0.1)
            .normalize(true)
            .build()
            .unwrap();
        let sheet = content(19, config).unwrap();
        let cv = CollectiveVariable::new(sheet).unwrap().with_name("beta");
        assert_round_trip(&cv, scattered(95), vec![12.0; 95]);
    }
}
