use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::chemistry::sum_formula::SumFormula;
use crate::error::{Result, SpectrumError};

/// Losses commonly observed on peptide fragments, as formulas.
pub const COMMON_NEUTRAL_LOSSES: [&str; 13] = [
    "H", "NH3", "H2O", "CO", "CO2", "HCONH2", "HCOOH", "CH4OS", "SO3", "HPO3", "C2H5NOS", "C2H4O2S", "H3PO4",
];

/// A neutral mass change applied to a fragment before charging.
///
/// `mass_delta` is signed: losses are negative, gains positive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeutralLoss {
    pub name: String,
    pub mass_delta: f64,
}

impl NeutralLoss {
    /// Loss of the given formula.
    ///
    /// # Example
    ///
    /// ```
    /// use msannotate::chemistry::neutral_loss::NeutralLoss;
    ///
    /// let loss = NeutralLoss::loss("H3PO4").unwrap();
    /// assert!((loss.mass_delta + 97.976896).abs() < 1e-5);
    /// assert_eq!(loss.to_string(), "-H3PO4");
    /// ```
    pub fn loss(formula: &str) -> Result<Self> {
        let weight = SumFormula::new(formula)?.monoisotopic_weight();
        Ok(NeutralLoss { name: formula.to_string(), mass_delta: -weight })
    }

    /// Gain of the given formula.
    pub fn gain(formula: &str) -> Result<Self> {
        let weight = SumFormula::new(formula)?.monoisotopic_weight();
        Ok(NeutralLoss { name: formula.to_string(), mass_delta: weight })
    }

    /// A loss or gain without a formula, e.g. a labelled mass shift.
    pub fn custom(name: &str, mass_delta: f64) -> Result<Self> {
        if !mass_delta.is_finite() {
            return Err(SpectrumError::InvalidConfig(format!(
                "neutral loss {} has non-finite mass {}",
                name, mass_delta
            )));
        }
        Ok(NeutralLoss { name: name.to_string(), mass_delta })
    }

    /// Parses `"H2O"` / `"-H2O"` as a loss and `"+H2O"` as a gain.
    pub fn parse(text: &str) -> Result<Self> {
        match text.strip_prefix('+') {
            Some(formula) => Self::gain(formula),
            None => Self::loss(text.strip_prefix('-').unwrap_or(text)),
        }
    }

    pub fn water() -> Self {
        NeutralLoss { name: "H2O".to_string(), mass_delta: -crate::chemistry::constants::MASS_WATER }
    }

    pub fn ammonia() -> Self {
        NeutralLoss { name: "NH3".to_string(), mass_delta: -crate::chemistry::constants::MASS_NH3 }
    }
}

impl Display for NeutralLoss {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.mass_delta < 0.0 {
            write!(f, "-{}", self.name)
        } else {
            write!(f, "+{}", self.name)
        }
    }
}
