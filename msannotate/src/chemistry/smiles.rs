use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::chemistry::constants::{MASS_ELECTRON, MASS_HYDROGEN};
use crate::chemistry::elements::{element, isotope_mass, Element};
use crate::chemistry::sum_formula::SumFormula;
use crate::error::{Result, SpectrumError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondOrder {
    fn valence_contribution(&self) -> u32 {
        match self {
            BondOrder::Single | BondOrder::Aromatic => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            BondOrder::Single => '-',
            BondOrder::Double => '=',
            BondOrder::Triple => '#',
            BondOrder::Aromatic => ':',
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Atom {
    pub element: &'static Element,
    pub aromatic: bool,
    pub isotope: Option<u16>,
    pub charge: i8,
    /// Explicit (bracket atoms) or implicit hydrogen count.
    pub hydrogens: u8,
    pub bracket: bool,
}

impl Atom {
    /// Mass of the heavy atom alone, using the labelled nuclide where one is given.
    pub fn mass(&self) -> f64 {
        let nuclide = self
            .isotope
            .and_then(|a| isotope_mass(self.element, a))
            .unwrap_or(self.element.mono_isotopic_mass);
        nuclide - self.charge as f64 * MASS_ELECTRON
    }

    /// Mass including the attached hydrogens.
    pub fn mass_with_hydrogens(&self) -> f64 {
        self.mass() + self.hydrogens as f64 * MASS_HYDROGEN
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bond {
    pub source: usize,
    pub target: usize,
    pub order: BondOrder,
}

impl Bond {
    pub fn other(&self, atom: usize) -> usize {
        if self.source == atom {
            self.target
        } else {
            self.source
        }
    }
}

/// A molecular graph parsed from SMILES.
#[derive(Clone, Debug, PartialEq)]
pub struct Molecule {
    pub smiles: String,
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
}

impl Molecule {
    /// Parses a SMILES string.
    ///
    /// # Example
    ///
    /// ```
    /// use msannotate::chemistry::smiles::Molecule;
    ///
    /// let ethanol = Molecule::from_smiles("CCO").unwrap();
    /// assert_eq!(ethanol.atoms.len(), 3);
    /// assert_eq!(ethanol.formula().to_string(), "C2H6O");
    /// assert!(Molecule::from_smiles("C1CC").is_err());
    /// ```
    pub fn from_smiles(smiles: &str) -> Result<Self> {
        SmilesParser::new(smiles).parse()
    }

    /// Neighbour lists as `(atom, bond index)` pairs.
    pub fn adjacency(&self) -> Vec<Vec<(usize, usize)>> {
        let mut adjacency = vec![Vec::new(); self.atoms.len()];
        for (index, bond) in self.bonds.iter().enumerate() {
            adjacency[bond.source].push((bond.target, index));
            adjacency[bond.target].push((bond.source, index));
        }
        adjacency
    }

    /// Connected components when the bonds flagged in `broken` are removed.
    ///
    /// Components are listed by their lowest atom index; atoms inside a component are sorted.
    pub fn components(&self, broken: &[bool]) -> Vec<Vec<usize>> {
        let adjacency = self.adjacency();
        let mut seen = vec![false; self.atoms.len()];
        let mut components = Vec::new();

        for start in 0..self.atoms.len() {
            if seen[start] {
                continue;
            }
            seen[start] = true;
            let mut component = vec![start];
            let mut queue = VecDeque::from([start]);
            while let Some(atom) = queue.pop_front() {
                for &(next, bond) in &adjacency[atom] {
                    if !seen[next] && !broken.get(bond).copied().unwrap_or(false) {
                        seen[next] = true;
                        component.push(next);
                        queue.push_back(next);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }

    /// Mass of a subset of atoms with their hydrogens.
    pub fn mass_of(&self, atoms: &[usize]) -> f64 {
        atoms.iter().map(|&i| self.atoms[i].mass_with_hydrogens()).sum()
    }

    /// Element counts of a subset of atoms, hydrogens included.
    pub fn composition_of(&self, atoms: &[usize]) -> BTreeMap<String, i32> {
        let mut counts = BTreeMap::new();
        for &i in atoms {
            let atom = &self.atoms[i];
            *counts.entry(atom.element.symbol.to_string()).or_insert(0) += 1;
            if atom.hydrogens > 0 {
                *counts.entry("H".to_string()).or_insert(0) += atom.hydrogens as i32;
            }
        }
        counts
    }

    pub fn monoisotopic_mass(&self) -> f64 {
        self.atoms.iter().map(Atom::mass_with_hydrogens).sum()
    }

    pub fn formula(&self) -> SumFormula {
        let all: Vec<usize> = (0..self.atoms.len()).collect();
        SumFormula::from_counts(self.composition_of(&all))
    }
}

struct RingOpening {
    atom: usize,
    order: Option<BondOrder>,
    offset: usize,
}

struct SmilesParser<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    previous: Option<usize>,
    branches: Vec<usize>,
    pending_bond: Option<(BondOrder, usize)>,
    rings: BTreeMap<u32, RingOpening>,
}

impl<'a> SmilesParser<'a> {
    fn new(input: &'a str) -> Self {
        SmilesParser {
            input,
            chars: input.chars().collect(),
            pos: 0,
            atoms: Vec::new(),
            bonds: Vec::new(),
            previous: None,
            branches: Vec::new(),
            pending_bond: None,
            rings: BTreeMap::new(),
        }
    }

    fn error(&self, offset: usize, reason: impl Into<String>) -> SpectrumError {
        SpectrumError::UnparsableStructure {
            input: self.input.to_string(),
            offset,
            reason: reason.into(),
        }
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn parse(mut self) -> Result<Molecule> {
        while let Some(c) = self.peek(0) {
            match c {
                '(' => {
                    let atom = self
                        .previous
                        .ok_or_else(|| self.error(self.pos, "branch without a preceding atom"))?;
                    if self.pending_bond.is_some() {
                        return Err(self.error(self.pos, "bond symbol before '('"));
                    }
                    self.branches.push(atom);
                    self.pos += 1;
                }
                ')' => {
                    if self.pending_bond.is_some() {
                        return Err(self.error(self.pos, "bond symbol before ')'"));
                    }
                    let atom = self.branches.pop().ok_or_else(|| self.error(self.pos, "unbalanced ')'"))?;
                    self.previous = Some(atom);
                    self.pos += 1;
                }
                '-' | '=' | '#' | ':' | '/' | '\\' => {
                    if self.previous.is_none() {
                        return Err(self.error(self.pos, "bond without a preceding atom"));
                    }
                    if self.pending_bond.is_some() {
                        return Err(self.error(self.pos, "consecutive bond symbols"));
                    }
                    let order = match c {
                        '=' => BondOrder::Double,
                        '#' => BondOrder::Triple,
                        ':' => BondOrder::Aromatic,
                        _ => BondOrder::Single,
                    };
                    self.pending_bond = Some((order, self.pos));
                    self.pos += 1;
                }
                '.' => {
                    if self.pending_bond.is_some() {
                        return Err(self.error(self.pos, "bond symbol before '.'"));
                    }
                    self.previous = None;
                    self.pos += 1;
                }
                '0'..='9' | '%' => self.ring_closure()?,
                '[' => {
                    let atom = self.bracket_atom()?;
                    self.attach(atom)?;
                }
                _ => {
                    let atom = self.organic_atom()?;
                    self.attach(atom)?;
                }
            }
        }

        if let Some((_, offset)) = self.pending_bond {
            return Err(self.error(offset, "dangling bond"));
        }
        if !self.branches.is_empty() {
            return Err(self.error(self.chars.len(), "unclosed branch"));
        }
        if let Some((label, opening)) = self.rings.iter().next() {
            return Err(self.error(opening.offset, format!("unclosed ring {}", label)));
        }
        if self.atoms.is_empty() {
            return Err(self.error(0, "no atoms"));
        }

        self.assign_implicit_hydrogens();
        Ok(Molecule {
            smiles: self.input.to_string(),
            atoms: self.atoms,
            bonds: self.bonds,
        })
    }

    fn default_order(&self, a: usize, b: usize) -> BondOrder {
        if self.atoms[a].aromatic && self.atoms[b].aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    fn add_bond(&mut self, source: usize, target: usize, order: BondOrder, offset: usize) -> Result<()> {
        let duplicate = self.bonds.iter().any(|b| {
            (b.source == source && b.target == target) || (b.source == target && b.target == source)
        });
        if duplicate {
            return Err(self.error(offset, format!("atoms {} and {} are bonded twice", source, target)));
        }
        self.bonds.push(Bond { source, target, order });
        Ok(())
    }

    fn attach(&mut self, atom: Atom) -> Result<()> {
        let index = self.atoms.len();
        self.atoms.push(atom);
        if let Some(previous) = self.previous {
            let order = match self.pending_bond.take() {
                Some((order, _)) => order,
                None => self.default_order(previous, index),
            };
            self.add_bond(previous, index, order, self.pos)?;
        }
        self.previous = Some(index);
        Ok(())
    }

    fn ring_closure(&mut self) -> Result<()> {
        let start = self.pos;
        let label = if self.peek(0) == Some('%') {
            let digits: Option<u32> = match (self.peek(1), self.peek(2)) {
                (Some(a), Some(b)) => a.to_digit(10).zip(b.to_digit(10)).map(|(a, b)| a * 10 + b),
                _ => None,
            };
            self.pos += 3;
            digits.ok_or_else(|| self.error(start, "'%' must be followed by two digits"))?
        } else {
            self.pos += 1;
            self.chars[start].to_digit(10).unwrap_or_default()
        };

        let atom = self
            .previous
            .ok_or_else(|| self.error(start, "ring closure without a preceding atom"))?;
        let order = self.pending_bond.take().map(|(order, _)| order);

        match self.rings.remove(&label) {
            Some(opening) => {
                if opening.atom == atom {
                    return Err(self.error(start, format!("ring {} closes on its own atom", label)));
                }
                let order = match (opening.order, order) {
                    (Some(a), Some(b)) if a != b => {
                        return Err(self.error(start, format!("conflicting bond orders on ring {}", label)))
                    }
                    (a, b) => a.or(b).unwrap_or_else(|| self.default_order(opening.atom, atom)),
                };
                self.add_bond(opening.atom, atom, order, start)
            }
            None => {
                self.rings.insert(label, RingOpening { atom, order, offset: start });
                Ok(())
            }
        }
    }

    fn organic_atom(&mut self) -> Result<Atom> {
        let c = self.chars[self.pos];
        let (symbol, aromatic, width) = match (c, self.peek(1)) {
            ('C', Some('l')) => ("Cl", false, 2),
            ('B', Some('r')) => ("Br", false, 2),
            ('B', _) => ("B", false, 1),
            ('C', _) => ("C", false, 1),
            ('N', _) => ("N", false, 1),
            ('O', _) => ("O", false, 1),
            ('P', _) => ("P", false, 1),
            ('S', _) => ("S", false, 1),
            ('F', _) => ("F", false, 1),
            ('I', _) => ("I", false, 1),
            ('b', _) => ("B", true, 1),
            ('c', _) => ("C", true, 1),
            ('n', _) => ("N", true, 1),
            ('o', _) => ("O", true, 1),
            ('p', _) => ("P", true, 1),
            ('s', _) => ("S", true, 1),
            _ => return Err(self.error(self.pos, format!("unexpected character '{}'", c))),
        };
        let element = element(symbol).ok_or_else(|| self.error(self.pos, format!("unknown element {}", symbol)))?;
        self.pos += width;
        Ok(Atom { element, aromatic, isotope: None, charge: 0, hydrogens: 0, bracket: false })
    }

    fn read_number(&mut self) -> Result<Option<u32>> {
        let start = self.pos;
        while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return Ok(None);
        }
        self.chars[start..self.pos]
            .iter()
            .collect::<String>()
            .parse()
            .map(Some)
            .map_err(|_| self.error(start, "number out of range"))
    }

    fn bracket_atom(&mut self) -> Result<Atom> {
        let open = self.pos;
        self.pos += 1;

        let isotope = match self.read_number()? {
            Some(n) => Some(u16::try_from(n).map_err(|_| self.error(open + 1, "isotope out of range"))?),
            None => None,
        };

        let first = self
            .peek(0)
            .ok_or_else(|| self.error(self.pos, "unterminated bracket atom"))?;
        let (symbol, aromatic) = if first.is_ascii_lowercase() {
            let two: String = [first, self.peek(1).unwrap_or(' ')].iter().collect();
            if two == "se" || two == "as" {
                self.pos += 2;
                (two[..1].to_uppercase() + &two[1..], true)
            } else {
                self.pos += 1;
                (first.to_ascii_uppercase().to_string(), true)
            }
        } else if first.is_ascii_uppercase() {
            let two: String = [first, self.peek(1).unwrap_or(' ')].iter().collect();
            if self.peek(1).is_some_and(|c| c.is_ascii_lowercase()) && element(&two).is_some() {
                self.pos += 2;
                (two, false)
            } else {
                self.pos += 1;
                (first.to_string(), false)
            }
        } else {
            return Err(self.error(self.pos, format!("expected an element symbol, found '{}'", first)));
        };
        let element = element(&symbol).ok_or_else(|| self.error(open + 1, format!("unknown element {}", symbol)))?;
        if let Some(mass_number) = isotope {
            if isotope_mass(element, mass_number).is_none() {
                return Err(self.error(open + 1, format!("unknown isotope {}{}", mass_number, symbol)));
            }
        }

        // chirality carries no mass
        while self.peek(0) == Some('@') {
            self.pos += 1;
        }

        let mut hydrogens = 0;
        if self.peek(0) == Some('H') {
            self.pos += 1;
            hydrogens = self.read_number()?.unwrap_or(1);
        }

        let mut charge: i32 = 0;
        if let Some(sign @ ('+' | '-')) = self.peek(0) {
            let unit = if sign == '+' { 1 } else { -1 };
            let offset = self.pos;
            self.pos += 1;
            match self.read_number()? {
                Some(n) => {
                    charge = unit * i32::try_from(n).map_err(|_| self.error(offset, "charge out of range"))?;
                }
                None => {
                    charge = unit;
                    while self.peek(0) == Some(sign) {
                        charge = charge.saturating_add(unit);
                        self.pos += 1;
                    }
                }
            }
        }

        if self.peek(0) == Some(':') {
            self.pos += 1;
            self.read_number()?
                .ok_or_else(|| self.error(self.pos, "atom class must be numeric"))?;
        }

        if self.peek(0) != Some(']') {
            return Err(self.error(self.pos, "expected ']'"));
        }
        self.pos += 1;

        Ok(Atom {
            element,
            aromatic,
            isotope,
            charge: i8::try_from(charge).map_err(|_| self.error(open, "charge out of range"))?,
            hydrogens: u8::try_from(hydrogens).map_err(|_| self.error(open, "hydrogen count out of range"))?,
            bracket: true,
        })
    }

    fn assign_implicit_hydrogens(&mut self) {
        let mut bond_sum = vec![0u32; self.atoms.len()];
        for bond in &self.bonds {
            bond_sum[bond.source] = bond_sum[bond.source].saturating_add(bond.order.valence_contribution());
            bond_sum[bond.target] = bond_sum[bond.target].saturating_add(bond.order.valence_contribution());
        }

        for (atom, &used) in self.atoms.iter_mut().zip(&bond_sum) {
            if atom.bracket {
                continue;
            }
            atom.hydrogens = if atom.aromatic {
                // one valence goes to the delocalised system
                atom.element
                    .valences
                    .first()
                    .map_or(0, |&v| (v as u32).saturating_sub(1).saturating_sub(used) as u8)
            } else {
                atom.element
                    .valences
                    .iter()
                    .find(|&&v| v as u32 >= used)
                    .map_or(0, |&v| (v as u32 - used) as u8)
            };
        }
    }
}
