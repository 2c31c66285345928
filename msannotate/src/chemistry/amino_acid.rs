use crate::error::{Result, SpectrumError};

/// Monoisotopic residue mass of a one-letter code, `None` for symbols outside the alphabet.
///
/// `J` carries the Leu/Ile mass, `X` is a zero mass gap. The ambiguous codes `B` and `Z`
/// have no single mass and are rejected.
pub fn residue_mass(residue: char) -> Option<f64> {
    let mass = match residue {
        'A' => 71.037114,
        'R' => 156.101111,
        'N' => 114.042927,
        'D' => 115.026943,
        'C' => 103.009185,
        'E' => 129.042593,
        'Q' => 128.058578,
        'G' => 57.021464,
        'H' => 137.058912,
        'I' => 113.084064,
        'L' => 113.084064,
        'J' => 113.084064,
        'K' => 128.094963,
        'M' => 131.040485,
        'F' => 147.068414,
        'P' => 97.052764,
        'S' => 87.032028,
        'T' => 101.047679,
        'W' => 186.079313,
        'Y' => 163.063329,
        'V' => 99.068414,
        'U' => 150.953636,
        'O' => 237.147727,
        'X' => 0.0,
        _ => return None,
    };
    Some(mass)
}

/// Residue mass of the residue at `position`, failing with `UnknownResidue` outside the alphabet.
pub fn checked_residue_mass(residue: char, position: usize) -> Result<f64> {
    residue_mass(residue).ok_or(SpectrumError::UnknownResidue { residue, position })
}
