use std::collections::HashSet;

use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::algorithm::annotation::TheoreticalFragment;
use crate::chemistry::constants::MASS_HYDROGEN;
use crate::chemistry::smiles::{BondOrder, Molecule};
use crate::chemistry::sum_formula::SumFormula;
use crate::data::annotation::{Annotation, MoleculeFragmentAnnotation};
use crate::data::peptide::calculate_mz;
use crate::error::{Result, SpectrumError};

const MAX_BOND_SUBSETS: u128 = 250_000;

/// Controls how a molecular graph is broken into fragments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentationRules {
    /// Maximum number of bonds broken at once.
    pub max_cleavages: usize,
    pub cleavable_bonds: Vec<BondOrder>,
    /// Hydrogens gained or lost per broken bond touching a fragment.
    pub max_hydrogen_shift: u32,
    pub max_charge: u32,
    /// Also report the intact molecule.
    pub include_precursor: bool,
}

impl Default for FragmentationRules {
    fn default() -> Self {
        FragmentationRules {
            max_cleavages: 2,
            cleavable_bonds: vec![BondOrder::Single],
            max_hydrogen_shift: 1,
            max_charge: 1,
            include_precursor: true,
        }
    }
}

impl FragmentationRules {
    pub fn validate(&self) -> Result<()> {
        if self.max_cleavages == 0 {
            return Err(SpectrumError::InvalidConfig("at least one bond cleavage is required".to_string()));
        }
        if self.cleavable_bonds.is_empty() {
            return Err(SpectrumError::InvalidConfig("no cleavable bond orders selected".to_string()));
        }
        if self.max_charge == 0 {
            return Err(SpectrumError::InvalidConfig("maximum fragment charge must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// A connected substructure left after breaking bonds.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MoleculeFragment {
    pub id: usize,
    pub atoms: Vec<usize>,
    pub broken_bonds: Vec<usize>,
    pub hydrogen_shift: i32,
    /// Neutral monoisotopic mass.
    pub mass: f64,
    pub formula: String,
    pub description: String,
}

/// Number of bond subsets of size 1..=depth out of n, exact up to the first total above
/// `MAX_BOND_SUBSETS`.
fn count_bond_subsets(n: usize, depth: usize) -> u128 {
    let mut total = 0u128;
    let mut combinations = 1u128;
    for k in 1..=depth {
        // C(n, k) = C(n, k - 1) * (n - k + 1) / k
        combinations = match combinations.checked_mul((n - k + 1) as u128) {
            Some(product) => product / k as u128,
            None => return u128::MAX,
        };
        total = total.saturating_add(combinations);
        if total > MAX_BOND_SUBSETS {
            break;
        }
    }
    total
}

/// Enumerates the distinct fragments of `molecule` allowed by `rules`.
///
/// Every combination of up to `max_cleavages` cleavable bonds is removed from the graph and each
/// resulting connected part that is not already a part of the intact molecule becomes a fragment.
/// A fragment touched by `k` broken bonds is reported with hydrogen shifts from `-k * h` to `k * h`.
/// Fragments are unique by atom set and hydrogen shift and numbered in discovery order.
///
/// # Example
///
/// ```
/// use msannotate::algorithm::molecule::{enumerate_fragments, FragmentationRules};
/// use msannotate::chemistry::smiles::Molecule;
///
/// let ethanol = Molecule::from_smiles("CCO").unwrap();
/// let rules = FragmentationRules { max_cleavages: 1, max_hydrogen_shift: 0, include_precursor: false, ..Default::default() };
/// let fragments = enumerate_fragments(&ethanol, &rules).unwrap();
/// let formulas: Vec<&str> = fragments.iter().map(|f| f.formula.as_str()).collect();
/// assert_eq!(formulas, vec!["CH3", "CH3O", "C2H5", "HO"]);
/// ```
pub fn enumerate_fragments(molecule: &Molecule, rules: &FragmentationRules) -> Result<Vec<MoleculeFragment>> {
    rules.validate()?;

    let cleavable: Vec<usize> = molecule
        .bonds
        .iter()
        .positions(|b| rules.cleavable_bonds.contains(&b.order))
        .collect();
    let depth = rules.max_cleavages.min(cleavable.len());

    let subsets = count_bond_subsets(cleavable.len(), depth);
    if subsets > MAX_BOND_SUBSETS {
        return Err(SpectrumError::InvalidConfig(format!(
            "{} cleavable bonds at up to {} cleavages exceed the limit of {} bond combinations, reduce max_cleavages",
            cleavable.len(),
            depth,
            MAX_BOND_SUBSETS
        )));
    }

    let intact: HashSet<Vec<usize>> = molecule.components(&[]).into_iter().collect();
    let mut seen: HashSet<(Vec<usize>, i32)> = HashSet::new();
    let mut fragments = Vec::new();

    if rules.include_precursor {
        let atoms: Vec<usize> = (0..molecule.atoms.len()).collect();
        seen.insert((atoms.clone(), 0));
        fragments.push(MoleculeFragment {
            id: 0,
            mass: molecule.monoisotopic_mass(),
            formula: molecule.formula().to_string(),
            description: "precursor".to_string(),
            atoms,
            broken_bonds: Vec::new(),
            hydrogen_shift: 0,
        });
    }

    let mut broken = vec![false; molecule.bonds.len()];
    for k in 1..=depth {
        for subset in cleavable.iter().copied().combinations(k) {
            broken.iter_mut().for_each(|b| *b = false);
            for &bond in &subset {
                broken[bond] = true;
            }

            for component in molecule.components(&broken) {
                if intact.contains(&component) {
                    continue;
                }
                let touching: Vec<usize> = subset
                    .iter()
                    .copied()
                    .filter(|&b| {
                        let bond = &molecule.bonds[b];
                        component.binary_search(&bond.source).is_ok() != component.binary_search(&bond.target).is_ok()
                    })
                    .collect();
                if touching.is_empty() {
                    continue;
                }

                let limit = (rules.max_hydrogen_shift as usize * touching.len()) as i32;
                for shift in -limit..=limit {
                    if seen.contains(&(component.clone(), shift)) {
                        continue;
                    }
                    let mut counts = molecule.composition_of(&component);
                    let hydrogens = counts.entry("H".to_string()).or_insert(0);
                    *hydrogens += shift;
                    if *hydrogens < 0 {
                        continue;
                    }
                    let mass = molecule.mass_of(&component) + shift as f64 * MASS_HYDROGEN;
                    if mass <= 0.0 {
                        continue;
                    }

                    seen.insert((component.clone(), shift));
                    fragments.push(MoleculeFragment {
                        id: fragments.len(),
                        atoms: component.clone(),
                        broken_bonds: touching.clone(),
                        hydrogen_shift: shift,
                        mass,
                        formula: SumFormula::from_counts(counts).to_string(),
                        description: describe_bonds(molecule, &touching),
                    });
                }
            }
        }
    }

    debug!(
        "enumerated {} fragments of {} from {} bond combinations",
        fragments.len(),
        molecule.smiles,
        subsets
    );
    Ok(fragments)
}

fn describe_bonds(molecule: &Molecule, bonds: &[usize]) -> String {
    bonds
        .iter()
        .map(|&b| {
            let bond = &molecule.bonds[b];
            format!(
                "{}{}{}{}{}",
                molecule.atoms[bond.source].element.symbol,
                bond.source,
                bond.order.symbol(),
                molecule.atoms[bond.target].element.symbol,
                bond.target
            )
        })
        .join(",")
}

/// Fragment ions of `molecule` at every charge up to `rules.max_charge`.
pub fn theoretical_fragments(molecule: &Molecule, rules: &FragmentationRules) -> Result<Vec<TheoreticalFragment>> {
    let fragments = enumerate_fragments(molecule, rules)?;
    Ok(fragments
        .iter()
        .flat_map(|fragment| {
            (1..=rules.max_charge).map(move |charge| TheoreticalFragment {
                mz: calculate_mz(fragment.mass, charge),
                annotation: Annotation::MoleculeFragment(MoleculeFragmentAnnotation {
                    fragment_id: fragment.id,
                    formula: fragment.formula.clone(),
                    description: fragment.description.clone(),
                    hydrogen_shift: fragment.hydrogen_shift,
                    charge,
                    mz_delta: 0.0,
                }),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chemistry::constants::MASS_PROTON;

    fn molecule(smiles: &str) -> Molecule {
        Molecule::from_smiles(smiles).unwrap()
    }

    #[test]
    fn test_single_cleavages_of_ethanol() {
        let rules = FragmentationRules { max_cleavages: 1, max_hydrogen_shift: 0, ..Default::default() };
        let fragments = enumerate_fragments(&molecule("CCO"), &rules).unwrap();
        assert_eq!(fragments[0].description, "precursor");
        assert_eq!(fragments.len(), 5);
        assert_eq!(fragments[1].atoms, vec![0]);
        assert_eq!(fragments[1].description, "C0-C1");
        assert!((fragments[1].mass - (12.0 + 3.0 * MASS_HYDROGEN)).abs() < 1e-9);
    }

    #[test]
    fn test_hydrogen_shifts() {
        let rules = FragmentationRules { max_cleavages: 1, include_precursor: false, ..Default::default() };
        let fragments = enumerate_fragments(&molecule("CO"), &rules).unwrap();
        let shifts: Vec<(String, i32)> = fragments.iter().map(|f| (f.formula.clone(), f.hydrogen_shift)).collect();
        assert_eq!(
            shifts,
            vec![
                ("CH2".to_string(), -1),
                ("CH3".to_string(), 0),
                ("CH4".to_string(), 1),
                ("O".to_string(), -1),
                ("HO".to_string(), 0),
                ("H2O".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_ring_needs_two_cleavages() {
        let ring = molecule("C1CCCCC1");
        let one = FragmentationRules { max_cleavages: 1, include_precursor: false, ..Default::default() };
        assert!(enumerate_fragments(&ring, &one).unwrap().is_empty());

        let two = FragmentationRules { max_cleavages: 2, max_hydrogen_shift: 0, include_precursor: false, ..Default::default() };
        let fragments = enumerate_fragments(&ring, &two).unwrap();
        assert!(!fragments.is_empty());
        assert!(fragments.iter().all(|f| f.broken_bonds.len() == 2));
        // every contiguous arc of 1..=5 carbons, each unique
        let unique: HashSet<&Vec<usize>> = fragments.iter().map(|f| &f.atoms).collect();
        assert_eq!(unique.len(), fragments.len());
        assert_eq!(fragments.len(), 6 * 5);
    }

    #[test]
    fn test_double_bonds_are_kept_by_default() {
        let rules = FragmentationRules { include_precursor: false, ..Default::default() };
        assert!(enumerate_fragments(&molecule("C=C"), &rules).unwrap().is_empty());

        let rules = FragmentationRules {
            cleavable_bonds: vec![BondOrder::Double],
            max_hydrogen_shift: 0,
            include_precursor: false,
            ..Default::default()
        };
        assert_eq!(enumerate_fragments(&molecule("C=C"), &rules).unwrap().len(), 2);
    }

    #[test]
    fn test_fragment_ions_are_charged() {
        let rules = FragmentationRules { max_cleavages: 1, max_hydrogen_shift: 0, max_charge: 2, ..Default::default() };
        let ions = theoretical_fragments(&molecule("CCO"), &rules).unwrap();
        assert_eq!(ions.len(), 10);
        let ethanol_mass = molecule("CCO").monoisotopic_mass();
        assert!((ions[0].mz - (ethanol_mass + MASS_PROTON)).abs() < 1e-9);
        assert!((ions[1].mz - (ethanol_mass + 2.0 * MASS_PROTON) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_rules() {
        let ethanol = molecule("CCO");
        let rules = FragmentationRules { max_cleavages: 0, ..Default::default() };
        assert!(matches!(enumerate_fragments(&ethanol, &rules), Err(SpectrumError::InvalidConfig(_))));
        let rules = FragmentationRules { cleavable_bonds: vec![], ..Default::default() };
        assert!(enumerate_fragments(&ethanol, &rules).is_err());
    }

    #[test]
    fn test_combination_limit() {
        let long_chain = molecule(&"C".repeat(60));
        let rules = FragmentationRules { max_cleavages: 5, ..Default::default() };
        assert!(matches!(enumerate_fragments(&long_chain, &rules), Err(SpectrumError::InvalidConfig(_))));

        // counts far beyond u128 are rejected without overflowing
        let longer_chain = molecule(&"C".repeat(300));
        let rules = FragmentationRules { max_cleavages: 40, ..Default::default() };
        assert!(matches!(enumerate_fragments(&longer_chain, &rules), Err(SpectrumError::InvalidConfig(_))));
    }

    #[test]
    fn test_count_bond_subsets() {
        assert_eq!(count_bond_subsets(5, 1), 5);
        assert_eq!(count_bond_subsets(5, 2), 5 + 10);
        assert_eq!(count_bond_subsets(5, 5), 31);
        assert_eq!(count_bond_subsets(0, 0), 0);
        assert!(count_bond_subsets(299, 299) > MAX_BOND_SUBSETS);
    }

    #[test]
    fn test_same_atoms_from_different_cleavages_are_merged() {
        let rules = FragmentationRules { max_cleavages: 2, max_hydrogen_shift: 0, include_precursor: false, ..Default::default() };
        let fragments = enumerate_fragments(&molecule("CCC"), &rules).unwrap();
        let atoms: Vec<Vec<usize>> = fragments.iter().map(|f| f.atoms.clone()).collect();
        // breaking both bonds yields [0], [1] and [2] again, only [1] is new
        assert_eq!(atoms, vec![vec![0], vec![1, 2], vec![0, 1], vec![2], vec![1]]);
        assert_eq!(fragments[4].broken_bonds, vec![0, 1]);
        assert!(fragments.iter().enumerate().all(|(i, f)| f.id == i));
    }
}
