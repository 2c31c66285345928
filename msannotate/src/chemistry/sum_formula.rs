use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use crate::chemistry::elements::element;
use crate::error::{Result, SpectrumError};

/// An elemental composition, e.g. `H2O` or `C6H5NO2`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SumFormula {
    pub formula: String,
    pub elements: BTreeMap<String, i32>,
}

impl SumFormula {
    /// Parses a formula string.
    ///
    /// # Example
    ///
    /// ```
    /// use msannotate::chemistry::sum_formula::SumFormula;
    ///
    /// let water = SumFormula::new("H2O").unwrap();
    /// assert!((water.monoisotopic_weight() - 18.0105646863).abs() < 1e-8);
    /// assert!(SumFormula::new("H2Q").is_err());
    /// ```
    pub fn new(formula: &str) -> Result<Self> {
        let elements = parse_formula(formula)?;
        Ok(SumFormula {
            formula: formula.to_string(),
            elements,
        })
    }

    /// Builds a formula from element counts, dropping zero counts.
    pub fn from_counts(counts: BTreeMap<String, i32>) -> Self {
        let elements: BTreeMap<String, i32> = counts.into_iter().filter(|(_, n)| *n != 0).collect();
        let formula = hill_notation(&elements);
        SumFormula { formula, elements }
    }

    pub fn monoisotopic_weight(&self) -> f64 {
        self.elements.iter().fold(0.0, |acc, (symbol, count)| {
            let mass = element(symbol).map_or(0.0, |e| e.mono_isotopic_mass);
            acc + mass * *count as f64
        })
    }

    pub fn hill_notation(&self) -> String {
        hill_notation(&self.elements)
    }
}

impl Display for SumFormula {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hill_notation())
    }
}

/// Carbon first, hydrogen second, everything else alphabetical. Without carbon all elements are alphabetical.
fn hill_notation(elements: &BTreeMap<String, i32>) -> String {
    let mut out = String::new();
    let mut push = |symbol: &str, count: i32| {
        out.push_str(symbol);
        if count != 1 {
            out.push_str(&count.to_string());
        }
    };

    let has_carbon = elements.get("C").is_some_and(|n| *n != 0);
    if has_carbon {
        push("C", elements["C"]);
        if let Some(&h) = elements.get("H") {
            if h != 0 {
                push("H", h);
            }
        }
    }
    for (symbol, &count) in elements {
        if count == 0 || (has_carbon && (symbol == "C" || symbol == "H")) {
            continue;
        }
        push(symbol, count);
    }
    out
}

fn parse_formula(formula: &str) -> Result<BTreeMap<String, i32>> {
    let unparsable = |offset: usize, reason: String| SpectrumError::UnparsableStructure {
        input: formula.to_string(),
        offset,
        reason,
    };

    if formula.is_empty() {
        return Err(unparsable(0, "empty formula".to_string()));
    }

    let mut element_counts = BTreeMap::new();
    let chars: Vec<char> = formula.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let start = i;
        if !chars[i].is_ascii_uppercase() {
            return Err(unparsable(i, format!("expected an element symbol, found '{}'", chars[i])));
        }
        let mut symbol = chars[i].to_string();
        i += 1;
        while i < chars.len() && chars[i].is_ascii_lowercase() {
            symbol.push(chars[i]);
            i += 1;
        }
        if element(&symbol).is_none() {
            return Err(unparsable(start, format!("unknown element {}", symbol)));
        }

        let count_start = i;
        if i < chars.len() && chars[i] == '-' {
            i += 1;
        }
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        let digits: String = chars[count_start..i].iter().collect();
        let count = match digits.as_str() {
            "" => 1,
            "-" => -1,
            d => d
                .parse::<i32>()
                .map_err(|e| unparsable(count_start, format!("invalid count {}: {}", d, e)))?,
        };
        *element_counts.entry(symbol).or_insert(0) += count;
    }

    Ok(element_counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repeated_elements_are_summed() {
        let formula = SumFormula::new("CH3CH2OH").unwrap();
        assert_eq!(formula.elements["C"], 2);
        assert_eq!(formula.elements["H"], 6);
        assert_eq!(formula.elements["O"], 1);
        assert_eq!(formula.hill_notation(), "C2H6O");
    }

    #[test]
    fn test_negative_counts() {
        let formula = SumFormula::new("H-1N-1O").unwrap();
        assert_eq!(formula.elements["H"], -1);
        assert!((formula.monoisotopic_weight() - 0.984015583).abs() < 1e-6);
    }

    #[test]
    fn test_parse_errors_report_offset() {
        match SumFormula::new("C6Xy2") {
            Err(SpectrumError::UnparsableStructure { offset, .. }) => assert_eq!(offset, 2),
            other => panic!("unexpected result {:?}", other),
        }
        assert!(SumFormula::new("").is_err());
        assert!(SumFormula::new("2H").is_err());
    }

    #[test]
    fn test_hill_notation_without_carbon_is_alphabetical() {
        let formula = SumFormula::new("H3PO4").unwrap();
        assert_eq!(formula.to_string(), "H3O4P");
    }

    #[test]
    fn test_from_counts_drops_zeros() {
        let counts = BTreeMap::from([("C".to_string(), 6), ("H".to_string(), 5), ("N".to_string(), 0)]);
        let formula = SumFormula::from_counts(counts);
        assert_eq!(formula.formula, "C6H5");
        assert!(!formula.elements.contains_key("N"));
    }
}
