use std::collections::BTreeSet;
use std::iter::once;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::algorithm::annotation::TheoreticalFragment;
use crate::chemistry::constants::{MASS_C13_DIFF, MASS_CO, MASS_CO2, MASS_NH3, MASS_WATER};
use crate::chemistry::neutral_loss::NeutralLoss;
use crate::data::annotation::{Annotation, PeptideFragmentAnnotation};
use crate::data::peptide::{calculate_mz, Peptide};
use crate::error::{Result, SpectrumError};

/// Peptide ion series. Declaration order is the tie-break order between annotations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IonType {
    A,
    B,
    C,
    X,
    Y,
    Z,
    /// Single residue ion from a combined a/y cleavage, singly charged.
    #[serde(rename = "I")]
    Immonium,
    /// Ion spanning inner residues from a double backbone cleavage, b-type.
    #[serde(rename = "m")]
    Internal,
    /// The intact peptide.
    #[serde(rename = "p")]
    Precursor,
}

impl IonType {
    pub fn from_letter(letter: char) -> Result<Self> {
        match letter {
            'a' => Ok(IonType::A),
            'b' => Ok(IonType::B),
            'c' => Ok(IonType::C),
            'x' => Ok(IonType::X),
            'y' => Ok(IonType::Y),
            'z' => Ok(IonType::Z),
            'I' => Ok(IonType::Immonium),
            'm' => Ok(IonType::Internal),
            'p' => Ok(IonType::Precursor),
            other => Err(SpectrumError::InvalidConfig(format!("unknown ion type '{}'", other))),
        }
    }

    pub fn letter(&self) -> char {
        match self {
            IonType::A => 'a',
            IonType::B => 'b',
            IonType::C => 'c',
            IonType::X => 'x',
            IonType::Y => 'y',
            IonType::Z => 'z',
            IonType::Immonium => 'I',
            IonType::Internal => 'm',
            IonType::Precursor => 'p',
        }
    }

    /// Whether the ion carries the N-terminus (a, b, c).
    pub fn is_n_terminal(&self) -> bool {
        matches!(self, IonType::A | IonType::B | IonType::C)
    }

    /// Neutral mass added to the residue sum of the fragment.
    pub fn mass_offset(&self) -> f64 {
        match self {
            // A: b - CO
            IonType::A => -MASS_CO,
            IonType::B => 0.0,
            // C: b + NH3
            IonType::C => MASS_NH3,
            // X: y + CO - 2H
            IonType::X => MASS_CO2,
            IonType::Y => MASS_WATER,
            // Z: y - NH3
            IonType::Z => MASS_WATER - MASS_NH3,
            // residue - CO, the proton is added with the charge
            IonType::Immonium => -MASS_CO,
            IonType::Internal => 0.0,
            IonType::Precursor => MASS_WATER,
        }
    }
}

/// Which peptide ions to generate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IonTypeConfig {
    pub ion_types: Vec<IonType>,
    /// Fragments are generated for every charge from 1 up to this value.
    pub max_charge: u32,
    #[serde(default)]
    pub neutral_losses: Vec<NeutralLoss>,
    /// Isotope peaks generated per fragment besides the monoisotopic one.
    #[serde(default)]
    pub max_isotope: u8,
}

impl Default for IonTypeConfig {
    fn default() -> Self {
        IonTypeConfig {
            ion_types: vec![IonType::B, IonType::Y],
            max_charge: 1,
            neutral_losses: Vec::new(),
            max_isotope: 0,
        }
    }
}

impl IonTypeConfig {
    /// # Example
    ///
    /// ```
    /// use msannotate::algorithm::peptide::{IonType, IonTypeConfig};
    ///
    /// let config = IonTypeConfig::from_letters("by", 2).unwrap();
    /// assert_eq!(config.ion_types, vec![IonType::B, IonType::Y]);
    /// assert!(IonTypeConfig::from_letters("bq", 1).is_err());
    /// ```
    pub fn from_letters(letters: &str, max_charge: u32) -> Result<Self> {
        let ion_types = letters.chars().map(IonType::from_letter).collect::<Result<Vec<_>>>()?;
        let config = IonTypeConfig { ion_types, max_charge, ..Default::default() };
        config.validate()?;
        Ok(config)
    }

    pub fn with_neutral_losses(mut self, neutral_losses: Vec<NeutralLoss>) -> Self {
        self.neutral_losses = neutral_losses;
        self
    }

    pub fn with_max_isotope(mut self, max_isotope: u8) -> Self {
        self.max_isotope = max_isotope;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.ion_types.is_empty() {
            return Err(SpectrumError::InvalidConfig("no ion types selected".to_string()));
        }
        if self.max_charge == 0 {
            return Err(SpectrumError::InvalidConfig("maximum fragment charge must be at least 1".to_string()));
        }
        if let Some(loss) = self.neutral_losses.iter().find(|l| !l.mass_delta.is_finite()) {
            return Err(SpectrumError::InvalidConfig(format!(
                "neutral loss {} has non-finite mass {}",
                loss.name, loss.mass_delta
            )));
        }
        Ok(())
    }
}

/// Uncharged ion before charges, losses and isotopes are applied.
struct NeutralIon {
    ion_type: IonType,
    position: usize,
    end: Option<usize>,
    residue: Option<char>,
    mass: f64,
}

impl NeutralIon {
    fn new(ion_type: IonType, position: usize, mass: f64) -> Self {
        NeutralIon { ion_type, position, end: None, residue: None, mass }
    }
}

/// Theoretical m/z of every fragment of `peptide` described by `config`.
///
/// Prefix and suffix sums include the modification at each position and the terminal
/// modifications. Immonium ions are generated once per distinct residue and only singly
/// charged; internal ions carry the modifications of the residues they span but no terminal
/// modification. Fragments whose mass would drop to zero or below after a loss are skipped.
///
/// # Example
///
/// ```
/// use msannotate::algorithm::peptide::{theoretical_fragments, IonTypeConfig};
/// use msannotate::data::peptide::Peptide;
///
/// let peptide = Peptide::parse("PEPTIDE").unwrap();
/// let fragments = theoretical_fragments(&peptide, &IonTypeConfig::from_letters("by", 1).unwrap()).unwrap();
/// // b1..b6 and y1..y6
/// assert_eq!(fragments.len(), 12);
/// ```
pub fn theoretical_fragments(peptide: &Peptide, config: &IonTypeConfig) -> Result<Vec<TheoreticalFragment>> {
    config.validate()?;
    peptide.modifications().validate_for_length(peptide.len())?;

    let masses = peptide.modified_residue_masses()?;
    let n_term = peptide.modifications().n_term.unwrap_or(0.0);
    let c_term = peptide.modifications().c_term.unwrap_or(0.0);

    // prefix[i] holds the first i + 1 residues, suffix[i] the last i + 1
    let prefix: Vec<f64> = masses
        .iter()
        .scan(n_term, |acc, m| {
            *acc += m;
            Some(*acc)
        })
        .collect();
    let suffix: Vec<f64> = masses
        .iter()
        .rev()
        .scan(c_term, |acc, m| {
            *acc += m;
            Some(*acc)
        })
        .collect();

    let ion_types: BTreeSet<IonType> = config.ion_types.iter().copied().collect();
    let losses: Vec<Option<&NeutralLoss>> = once(None).chain(config.neutral_losses.iter().map(Some)).collect();
    let length = masses.len();
    let residues = peptide.residues();

    let mut neutral_ions: Vec<NeutralIon> = Vec::new();
    for &ion_type in &ion_types {
        match ion_type {
            IonType::Precursor => {
                neutral_ions.push(NeutralIon::new(ion_type, length, prefix[length - 1] + c_term + ion_type.mass_offset()));
            }
            IonType::Immonium => {
                // one ion per distinct residue and modification state
                let mut seen: Vec<(char, f64)> = Vec::new();
                for (index, (&residue, &mass)) in residues.iter().zip(&masses).enumerate() {
                    if residue == 'X' || seen.contains(&(residue, mass)) {
                        continue;
                    }
                    seen.push((residue, mass));
                    neutral_ions.push(NeutralIon {
                        residue: Some(residue),
                        ..NeutralIon::new(ion_type, index + 1, mass + ion_type.mass_offset())
                    });
                }
            }
            IonType::Internal => {
                // starts after the first residue and ends before the last, at least two residues long
                for first in 1..length {
                    for last in first + 1..length - 1 {
                        let residue_sum = prefix[last] - prefix[first - 1];
                        neutral_ions.push(NeutralIon {
                            end: Some(last + 1),
                            ..NeutralIon::new(ion_type, first + 1, residue_sum + ion_type.mass_offset())
                        });
                    }
                }
            }
            _ => {
                for position in 1..length {
                    let residue_sum = if ion_type.is_n_terminal() {
                        prefix[position - 1]
                    } else {
                        suffix[position - 1]
                    };
                    neutral_ions.push(NeutralIon::new(ion_type, position, residue_sum + ion_type.mass_offset()));
                }
            }
        }
    }

    let mut fragments = Vec::new();
    for ion in neutral_ions {
        let max_charge = if ion.ion_type == IonType::Immonium { 1 } else { config.max_charge };
        for charge in 1..=max_charge {
            for loss in &losses {
                for isotope in 0..=config.max_isotope {
                    let mass = ion.mass
                        + loss.map_or(0.0, |l| l.mass_delta)
                        + isotope as f64 * MASS_C13_DIFF;
                    if mass <= 0.0 {
                        continue;
                    }
                    fragments.push(TheoreticalFragment {
                        mz: calculate_mz(mass, charge),
                        annotation: Annotation::PeptideFragment(PeptideFragmentAnnotation {
                            ion_type: ion.ion_type,
                            position: ion.position,
                            end: ion.end,
                            residue: ion.residue,
                            charge,
                            neutral_loss: loss.cloned(),
                            isotope,
                            mz_delta: 0.0,
                        }),
                    });
                }
            }
        }
    }

    debug!("generated {} theoretical fragments for {}", fragments.len(), peptide);
    Ok(fragments)
}
