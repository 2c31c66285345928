use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chemistry::amino_acid::residue_mass;
use crate::error::{Result, SpectrumError};

/// Mass modifications applied to a peptide.
///
/// Static modifications apply to every occurrence of a residue type, variable modifications
/// to a single 0-based position and take precedence over a static modification there.
/// Terminal modifications are added to every N-terminal (a/b/c) or C-terminal (x/y/z) fragment.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModificationSet {
    pub static_mods: BTreeMap<char, f64>,
    pub variable_mods: BTreeMap<usize, f64>,
    pub n_term: Option<f64>,
    pub c_term: Option<f64>,
}

fn check_finite(what: &str, delta: f64) -> Result<f64> {
    if delta.is_finite() {
        Ok(delta)
    } else {
        Err(SpectrumError::InvalidConfig(format!("{} has non-finite mass delta {}", what, delta)))
    }
}

impl ModificationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a static modification for a residue type.
    ///
    /// # Example
    ///
    /// ```
    /// use msannotate::chemistry::modification::ModificationSet;
    ///
    /// let mods = ModificationSet::new()
    ///     .with_static('C', 57.021464).unwrap()
    ///     .with_variable(2, 15.994915).unwrap();
    /// assert_eq!(mods.delta_at(0, 'C'), 57.021464);
    /// assert_eq!(mods.delta_at(2, 'C'), 15.994915);
    /// assert_eq!(mods.delta_at(1, 'K'), 0.0);
    /// ```
    pub fn with_static(mut self, residue: char, delta: f64) -> Result<Self> {
        if residue_mass(residue).is_none() {
            return Err(SpectrumError::InvalidConfig(format!(
                "static modification on unknown residue '{}'",
                residue
            )));
        }
        self.static_mods.insert(residue, check_finite("static modification", delta)?);
        Ok(self)
    }

    pub fn with_variable(mut self, position: usize, delta: f64) -> Result<Self> {
        self.variable_mods.insert(position, check_finite("variable modification", delta)?);
        Ok(self)
    }

    pub fn with_n_term(mut self, delta: f64) -> Result<Self> {
        self.n_term = Some(check_finite("N-terminal modification", delta)?);
        Ok(self)
    }

    pub fn with_c_term(mut self, delta: f64) -> Result<Self> {
        self.c_term = Some(check_finite("C-terminal modification", delta)?);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.static_mods.is_empty() && self.variable_mods.is_empty() && self.n_term.is_none() && self.c_term.is_none()
    }

    /// Effective mass delta of `residue` at `position`.
    pub fn delta_at(&self, position: usize, residue: char) -> f64 {
        self.variable_mods
            .get(&position)
            .or_else(|| self.static_mods.get(&residue))
            .copied()
            .unwrap_or(0.0)
    }

    /// Checks every variable position against a sequence of `length` residues.
    pub fn validate_for_length(&self, length: usize) -> Result<()> {
        if let Some((&position, _)) = self.variable_mods.range(length..).next() {
            return Err(SpectrumError::ConfigurationConflict(format!(
                "variable modification at position {} is outside a sequence of length {}",
                position, length
            )));
        }
        Ok(())
    }

    /// Combines two sets. Both defining the same position, terminus or residue type is a conflict.
    pub fn merge(&self, other: &ModificationSet) -> Result<ModificationSet> {
        let mut merged = self.clone();

        for (&residue, &delta) in &other.static_mods {
            match merged.static_mods.insert(residue, delta) {
                Some(existing) if existing != delta => {
                    return Err(SpectrumError::ConfigurationConflict(format!(
                        "static modification on '{}' defined twice ({} and {})",
                        residue, existing, delta
                    )))
                }
                _ => {}
            }
        }

        for (&position, &delta) in &other.variable_mods {
            if let Some(existing) = merged.variable_mods.insert(position, delta) {
                return Err(SpectrumError::ConfigurationConflict(format!(
                    "position {} carries two variable modifications ({} and {})",
                    position, existing, delta
                )));
            }
        }

        merged.n_term = merge_terminal("N", self.n_term, other.n_term)?;
        merged.c_term = merge_terminal("C", self.c_term, other.c_term)?;
        Ok(merged)
    }
}

fn merge_terminal(terminus: &str, left: Option<f64>, right: Option<f64>) -> Result<Option<f64>> {
    match (left, right) {
        (Some(a), Some(b)) => Err(SpectrumError::ConfigurationConflict(format!(
            "{}-terminus carries two modifications ({} and {})",
            terminus, a, b
        ))),
        (a, b) => Ok(a.or(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_overrides_static() {
        let mods = ModificationSet::new()
            .with_static('M', 15.994915)
            .unwrap()
            .with_variable(0, 0.0)
            .unwrap();
        assert_eq!(mods.delta_at(0, 'M'), 0.0);
        assert_eq!(mods.delta_at(1, 'M'), 15.994915);
    }

    #[test]
    fn test_out_of_range_position_is_a_conflict() {
        let mods = ModificationSet::new().with_variable(7, 79.966331).unwrap();
        assert!(mods.validate_for_length(8).is_ok());
        assert!(matches!(mods.validate_for_length(7), Err(SpectrumError::ConfigurationConflict(_))));
    }

    #[test]
    fn test_static_on_unknown_residue() {
        assert!(matches!(
            ModificationSet::new().with_static('B', 1.0),
            Err(SpectrumError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_merge() {
        let a = ModificationSet::new().with_variable(1, 1.0).unwrap().with_n_term(42.010565).unwrap();
        let b = ModificationSet::new().with_variable(2, 2.0).unwrap().with_c_term(-0.984016).unwrap();
        let merged = a.merge(&b).unwrap();
        assert_eq!(merged.variable_mods.len(), 2);
        assert_eq!(merged.n_term, Some(42.010565));
        assert_eq!(merged.c_term, Some(-0.984016));

        let clash = ModificationSet::new().with_variable(1, 3.0).unwrap();
        assert!(matches!(a.merge(&clash), Err(SpectrumError::ConfigurationConflict(_))));
        assert!(matches!(a.merge(&a), Err(SpectrumError::ConfigurationConflict(_))));
    }

    #[test]
    fn test_non_finite_delta() {
        assert!(ModificationSet::new().with_variable(0, f64::INFINITY).is_err());
        assert!(ModificationSet::new().is_empty());
    }
}
