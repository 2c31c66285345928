use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::algorithm::molecule::{theoretical_fragments as molecule_fragments, FragmentationRules};
use crate::algorithm::peptide::{theoretical_fragments as peptide_fragments, IonTypeConfig};
use crate::algorithm::tolerance::{Tolerance, ToleranceMatcher};
use crate::chemistry::smiles::Molecule;
use crate::data::annotation::{Annotation, AnnotationMap, CustomAnnotation};
use crate::data::peaks::PeakArray;
use crate::data::peptide::Peptide;
use crate::error::{Result, SpectrumError};

/// A theoretical ion and the annotation it produces when matched.
#[derive(Clone, Debug, PartialEq)]
pub struct TheoreticalFragment {
    pub mz: f64,
    pub annotation: Annotation,
}

/// A caller supplied m/z with its label, used as is.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomFragment {
    pub mz: f64,
    pub label: String,
}

impl CustomFragment {
    pub fn new(mz: f64, label: &str) -> Self {
        CustomFragment { mz, label: label.to_string() }
    }
}

/// What the peaks are assumed to come from.
#[derive(Clone, Debug)]
pub enum Hypothesis<'a> {
    Peptide {
        peptide: &'a Peptide,
        ions: &'a IonTypeConfig,
    },
    Molecule {
        molecule: &'a Molecule,
        rules: &'a FragmentationRules,
    },
    Custom(&'a [CustomFragment]),
}

impl Hypothesis<'_> {
    /// All theoretical ions of the hypothesis; fails before any matching happens.
    pub fn theoretical_fragments(&self) -> Result<Vec<TheoreticalFragment>> {
        match self {
            Hypothesis::Peptide { peptide, ions } => peptide_fragments(peptide, ions),
            Hypothesis::Molecule { molecule, rules } => molecule_fragments(molecule, rules),
            Hypothesis::Custom(fragments) => fragments
                .iter()
                .map(|fragment| {
                    if !fragment.mz.is_finite() || fragment.mz <= 0.0 {
                        return Err(SpectrumError::InvalidInput(format!(
                            "custom fragment '{}' has invalid m/z {}",
                            fragment.label, fragment.mz
                        )));
                    }
                    Ok(TheoreticalFragment {
                        mz: fragment.mz,
                        annotation: Annotation::Custom(CustomAnnotation {
                            label: fragment.label.clone(),
                            mz_delta: 0.0,
                        }),
                    })
                })
                .collect(),
        }
    }
}

/// Matches theoretical fragments against the peaks.
///
/// Each fragment is assigned to its closest peak within `tolerance`, several fragments may
/// share a peak. Annotations on a peak are ordered by ascending absolute m/z error, see
/// [`Annotation::cmp_priority`]. The peaks are not modified and the returned map replaces any
/// earlier annotation.
///
/// # Example
///
/// ```
/// use msannotate::algorithm::annotation::{annotate, CustomFragment, Hypothesis};
/// use msannotate::algorithm::tolerance::Tolerance;
/// use msannotate::data::peaks::PeakArray;
///
/// let peaks = PeakArray::new(vec![100.0, 200.0], vec![1.0, 1.0]).unwrap();
/// let fragments = vec![CustomFragment::new(200.01, "reporter")];
/// let annotations = annotate(&peaks, &Hypothesis::Custom(&fragments), Tolerance::da(0.02)).unwrap();
/// assert_eq!(annotations[&1][0].label(), "reporter");
/// assert!(!annotations.contains_key(&0));
/// ```
pub fn annotate(peaks: &PeakArray, hypothesis: &Hypothesis<'_>, tolerance: Tolerance) -> Result<AnnotationMap> {
    let matcher = ToleranceMatcher::new(peaks.mz(), tolerance)?;
    let fragments = hypothesis.theoretical_fragments()?;

    let mut annotations = AnnotationMap::new();
    for fragment in fragments {
        if let Some(hit) = matcher.closest(fragment.mz) {
            trace!("{} at {:.5} matched peak {} ({:+.5})", fragment.annotation.label(), fragment.mz, hit.index, hit.mz_delta);
            annotations
                .entry(hit.index)
                .or_default()
                .push(fragment.annotation.with_mz_delta(hit.mz_delta));
        }
    }

    for peak_annotations in annotations.values_mut() {
        peak_annotations.sort_by(|a, b| a.cmp_priority(b));
    }

    debug!(
        "annotated {} of {} peaks within {}",
        annotations.len(),
        peaks.len(),
        tolerance
    );
    Ok(annotations)
}
