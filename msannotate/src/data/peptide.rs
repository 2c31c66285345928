use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::chemistry::amino_acid::checked_residue_mass;
use crate::chemistry::constants::{MASS_PROTON, MASS_WATER};
use crate::chemistry::modification::ModificationSet;
use crate::chemistry::unimod::modification_mass;
use crate::error::{Result, SpectrumError};

static MASS_DELTA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]\d+(?:\.\d+)?$").expect("mass delta pattern compiles"));

/// A peptide sequence with its modifications.
///
/// Parsed from a ProForma-like notation: `[Acetyl]-PEPM[Oxidation]TIDEK[+8.014]-[-0.984]`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Peptide {
    sequence: String,
    residues: Vec<char>,
    modifications: ModificationSet,
}

impl Peptide {
    /// Parses a sequence, validating every residue.
    ///
    /// # Example
    ///
    /// ```
    /// use msannotate::data::peptide::Peptide;
    ///
    /// let peptide = Peptide::parse("PEPTIDEM[UNIMOD:35]K").unwrap();
    /// assert_eq!(peptide.stripped_sequence(), "PEPTIDEMK");
    /// assert_eq!(peptide.modifications().variable_mods.get(&7), Some(&15.994915));
    /// assert!(Peptide::parse("PEPBIDE").is_err());
    /// ```
    pub fn parse(sequence: &str) -> Result<Self> {
        let chars: Vec<char> = sequence.chars().collect();
        let unparsable = |offset: usize, reason: &str| SpectrumError::UnparsableStructure {
            input: sequence.to_string(),
            offset,
            reason: reason.to_string(),
        };

        if chars.is_empty() {
            return Err(SpectrumError::InvalidInput("empty peptide sequence".to_string()));
        }

        let mut residues = Vec::new();
        let mut modifications = ModificationSet::default();
        let mut i = 0;

        if chars[0] == '[' {
            let (delta, end) = read_modification(sequence, &chars, 0)?;
            if chars.get(end) != Some(&'-') {
                return Err(unparsable(end, "N-terminal modification must be followed by '-'"));
            }
            modifications.n_term = Some(delta);
            i = end + 1;
        }

        while i < chars.len() {
            let c = chars[i];
            match c {
                '-' => {
                    if chars.get(i + 1) != Some(&'[') || residues.is_empty() {
                        return Err(unparsable(i, "'-' must introduce a C-terminal modification"));
                    }
                    let (delta, end) = read_modification(sequence, &chars, i + 1)?;
                    if end != chars.len() {
                        return Err(unparsable(end, "C-terminal modification must end the sequence"));
                    }
                    modifications.c_term = Some(delta);
                    i = end;
                }
                '[' => return Err(unparsable(i, "modification without a preceding residue")),
                _ => {
                    let position = residues.len();
                    checked_residue_mass(c, position)?;
                    residues.push(c);
                    i += 1;

                    let mut total = None;
                    while chars.get(i) == Some(&'[') {
                        let (delta, end) = read_modification(sequence, &chars, i)?;
                        total = Some(total.unwrap_or(0.0) + delta);
                        i = end;
                    }
                    if let Some(delta) = total {
                        modifications.variable_mods.insert(position, delta);
                    }
                }
            }
        }

        if residues.is_empty() {
            return Err(SpectrumError::InvalidInput(format!("peptide '{}' has no residues", sequence)));
        }

        Ok(Peptide {
            sequence: sequence.to_string(),
            residues,
            modifications,
        })
    }

    /// Adds modifications given separately from the sequence.
    pub fn with_modifications(&self, modifications: &ModificationSet) -> Result<Self> {
        let merged = self.modifications.merge(modifications)?;
        merged.validate_for_length(self.len())?;
        Ok(Peptide {
            sequence: self.sequence.clone(),
            residues: self.residues.clone(),
            modifications: merged,
        })
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    pub fn residues(&self) -> &[char] {
        &self.residues
    }

    pub fn stripped_sequence(&self) -> String {
        self.residues.iter().collect()
    }

    pub fn modifications(&self) -> &ModificationSet {
        &self.modifications
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    /// Residue masses with the effective modification at each position.
    pub fn modified_residue_masses(&self) -> Result<Vec<f64>> {
        self.residues
            .iter()
            .enumerate()
            .map(|(position, &residue)| {
                Ok(checked_residue_mass(residue, position)? + self.modifications.delta_at(position, residue))
            })
            .collect()
    }

    /// Neutral monoisotopic mass of the intact peptide.
    pub fn mono_isotopic_mass(&self) -> Result<f64> {
        let residues: f64 = self.modified_residue_masses()?.iter().sum();
        Ok(residues
            + MASS_WATER
            + self.modifications.n_term.unwrap_or(0.0)
            + self.modifications.c_term.unwrap_or(0.0))
    }

    pub fn mz(&self, charge: u32) -> Result<f64> {
        Ok(calculate_mz(self.mono_isotopic_mass()?, charge))
    }
}

impl Display for Peptide {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(delta) = self.modifications.n_term {
            write!(f, "[{:+}]-", delta)?;
        }
        for (position, residue) in self.residues.iter().enumerate() {
            write!(f, "{}", residue)?;
            if let Some(delta) = self.modifications.variable_mods.get(&position) {
                write!(f, "[{:+}]", delta)?;
            }
        }
        if let Some(delta) = self.modifications.c_term {
            write!(f, "-[{:+}]", delta)?;
        }
        Ok(())
    }
}

/// Reads `[token]` starting at `start`, returning its mass delta and the offset after `]`.
fn read_modification(sequence: &str, chars: &[char], start: usize) -> Result<(f64, usize)> {
    let unparsable = |offset: usize, reason: String| SpectrumError::UnparsableStructure {
        input: sequence.to_string(),
        offset,
        reason,
    };

    let close = chars[start + 1..]
        .iter()
        .position(|&c| c == ']' || c == '[')
        .map(|p| p + start + 1)
        .filter(|&p| chars[p] == ']')
        .ok_or_else(|| unparsable(start, "unterminated modification".to_string()))?;

    let token: String = chars[start + 1..close].iter().collect();
    let delta = if MASS_DELTA.is_match(&token) {
        token
            .parse::<f64>()
            .map_err(|e| unparsable(start + 1, format!("invalid mass delta {}: {}", token, e)))?
    } else {
        modification_mass(&token).ok_or_else(|| unparsable(start + 1, format!("unknown modification {}", token)))?
    };

    Ok((delta, close + 1))
}

/// calculate the m/z of an ion
///
/// Arguments:
///
/// * `mono_isotopic_mass` - neutral mass of the ion
/// * `charge` - charge state, at least 1
///
/// Returns:
///
/// * `mz` - m/z of the protonated ion
///
/// # Examples
///
/// ```
/// use msannotate::data::peptide::calculate_mz;
///
/// let mz = calculate_mz(1000.0, 2);
/// assert!((mz - 501.007276466621).abs() < 1e-9);
/// ```
pub fn calculate_mz(mono_isotopic_mass: f64, charge: u32) -> f64 {
    let charge = charge as f64;
    (mono_isotopic_mass + charge * MASS_PROTON) / charge
}
