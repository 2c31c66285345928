use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::algorithm::peptide::IonType;
use crate::chemistry::neutral_loss::NeutralLoss;

/// Annotations per peak index; peaks without a match have no entry.
pub type AnnotationMap = BTreeMap<usize, Vec<Annotation>>;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PeptideFragmentAnnotation {
    pub ion_type: IonType,
    /// Number of residues in the fragment, the sequence length for the precursor. Immonium and
    /// internal ions count from the N-terminus: the residue, or the first residue spanned.
    pub position: usize,
    /// Last residue spanned by an internal ion, 1-based.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<usize>,
    /// Residue of an immonium ion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub residue: Option<char>,
    pub charge: u32,
    pub neutral_loss: Option<NeutralLoss>,
    /// 13C isotope peak, 0 for the monoisotopic peak.
    pub isotope: u8,
    pub mz_delta: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MoleculeFragmentAnnotation {
    pub fragment_id: usize,
    pub formula: String,
    /// Broken bonds, e.g. `C1-N2`.
    pub description: String,
    pub hydrogen_shift: i32,
    pub charge: u32,
    pub mz_delta: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CustomAnnotation {
    pub label: String,
    pub mz_delta: f64,
}

/// The identity assigned to an observed peak. `mz_delta` is observed minus theoretical m/z.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Annotation {
    PeptideFragment(PeptideFragmentAnnotation),
    MoleculeFragment(MoleculeFragmentAnnotation),
    Custom(CustomAnnotation),
}

/// Label and m/z error of one annotation, for consumers that only display them.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LabelledDelta {
    pub label: String,
    pub mz_delta: f64,
}

impl Annotation {
    pub fn mz_delta(&self) -> f64 {
        match self {
            Annotation::PeptideFragment(a) => a.mz_delta,
            Annotation::MoleculeFragment(a) => a.mz_delta,
            Annotation::Custom(a) => a.mz_delta,
        }
    }

    pub fn with_mz_delta(mut self, mz_delta: f64) -> Self {
        match &mut self {
            Annotation::PeptideFragment(a) => a.mz_delta = mz_delta,
            Annotation::MoleculeFragment(a) => a.mz_delta = mz_delta,
            Annotation::Custom(a) => a.mz_delta = mz_delta,
        }
        self
    }

    /// Peak label in the style of the PSI peak annotation format.
    ///
    /// # Example
    ///
    /// ```
    /// use msannotate::algorithm::peptide::IonType;
    /// use msannotate::chemistry::neutral_loss::NeutralLoss;
    /// use msannotate::data::annotation::{Annotation, PeptideFragmentAnnotation};
    ///
    /// let annotation = Annotation::PeptideFragment(PeptideFragmentAnnotation {
    ///     ion_type: IonType::Y,
    ///     position: 4,
    ///     end: None,
    ///     residue: None,
    ///     charge: 2,
    ///     neutral_loss: Some(NeutralLoss::water()),
    ///     isotope: 1,
    ///     mz_delta: 0.0,
    /// });
    /// assert_eq!(annotation.label(), "y4-H2O+i^2");
    /// ```
    pub fn label(&self) -> String {
        match self {
            Annotation::PeptideFragment(a) => {
                let mut label = a.ion_type.letter().to_string();
                match (a.ion_type, a.residue, a.end) {
                    (IonType::Precursor, _, _) => {}
                    (IonType::Immonium, Some(residue), _) => label.push(residue),
                    (IonType::Internal, _, Some(end)) => label.push_str(&format!("{}:{}", a.position, end)),
                    _ => label.push_str(&a.position.to_string()),
                }
                if let Some(loss) = &a.neutral_loss {
                    label.push_str(&loss.to_string());
                }
                match a.isotope {
                    0 => {}
                    1 => label.push_str("+i"),
                    n => label.push_str(&format!("+{}i", n)),
                }
                if a.charge > 1 {
                    label.push_str(&format!("^{}", a.charge));
                }
                label
            }
            Annotation::MoleculeFragment(a) => {
                let mut label = format!("f{{{}}}", a.formula);
                match a.hydrogen_shift.cmp(&0) {
                    Ordering::Greater => label.push_str(&format!("+{}H", a.hydrogen_shift)),
                    Ordering::Less => label.push_str(&format!("-{}H", -a.hydrogen_shift)),
                    Ordering::Equal => {}
                }
                if a.charge > 1 {
                    label.push_str(&format!("^{}", a.charge));
                }
                label
            }
            Annotation::Custom(a) => a.label.clone(),
        }
    }

    pub fn to_labelled_delta(&self) -> LabelledDelta {
        LabelledDelta { label: self.label(), mz_delta: self.mz_delta() }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Annotation::PeptideFragment(_) => 0,
            Annotation::MoleculeFragment(_) => 1,
            Annotation::Custom(_) => 2,
        }
    }

    /// Order of annotations sharing a peak: smallest absolute m/z error first, then a fixed
    /// key per kind so that the result does not depend on generation order.
    pub fn cmp_priority(&self, other: &Annotation) -> Ordering {
        self.mz_delta()
            .abs()
            .total_cmp(&other.mz_delta().abs())
            .then_with(|| self.kind_rank().cmp(&other.kind_rank()))
            .then_with(|| match (self, other) {
                (Annotation::PeptideFragment(a), Annotation::PeptideFragment(b)) => a
                    .ion_type
                    .cmp(&b.ion_type)
                    .then(a.position.cmp(&b.position))
                    .then(a.end.cmp(&b.end))
                    .then(a.charge.cmp(&b.charge))
                    .then(a.isotope.cmp(&b.isotope))
                    .then_with(|| loss_name(a).cmp(&loss_name(b))),
                (Annotation::MoleculeFragment(a), Annotation::MoleculeFragment(b)) => a
                    .fragment_id
                    .cmp(&b.fragment_id)
                    .then(a.hydrogen_shift.cmp(&b.hydrogen_shift))
                    .then(a.charge.cmp(&b.charge)),
                (Annotation::Custom(a), Annotation::Custom(b)) => a.label.cmp(&b.label),
                _ => Ordering::Equal,
            })
    }
}

fn loss_name(annotation: &PeptideFragmentAnnotation) -> Option<String> {
    annotation.neutral_loss.as_ref().map(NeutralLoss::to_string)
}

impl Display for Annotation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{:.4}", self.label(), self.mz_delta())
    }
}
