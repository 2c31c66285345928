use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use log::debug;
use serde::Serialize;

use crate::algorithm::annotation::{annotate, CustomFragment, Hypothesis};
use crate::algorithm::molecule::FragmentationRules;
use crate::algorithm::peptide::IonTypeConfig;
use crate::algorithm::tolerance::Tolerance;
use crate::chemistry::constants::{MASS_C13_DIFF, MASS_PROTON};
use crate::chemistry::modification::ModificationSet;
use crate::chemistry::smiles::Molecule;
use crate::data::annotation::{Annotation, AnnotationMap, LabelledDelta};
use crate::data::peaks::{IntensityFilter, PeakArray, ScalingMethod};
use crate::data::peptide::Peptide;
use crate::error::{Result, SpectrumError};

/// An MS/MS spectrum with its precursor information and peak annotations.
///
/// Processing methods borrow the spectrum and return a new one, so a failed step leaves the
/// input untouched and calls can be chained with `?`:
///
/// ```
/// use msannotate::algorithm::peptide::IonTypeConfig;
/// use msannotate::algorithm::tolerance::Tolerance;
/// use msannotate::data::peaks::{IntensityFilter, ScalingMethod};
/// use msannotate::data::spectrum::Spectrum;
///
/// # fn main() -> msannotate::error::Result<()> {
/// let spectrum = Spectrum::new("scan=1", 400.71, 2, vec![98.06, 148.06, 400.71, 700.0], vec![5.0, 20.0, 100.0, 0.5])?
///     .with_peptide("PEPTIDE")?;
/// let processed = spectrum
///     .set_mz_range(50.0, 1500.0)?
///     .remove_precursor_peak(Tolerance::da(0.02), 0)?
///     .filter_intensity(&IntensityFilter { min_relative_intensity: Some(0.05), ..Default::default() })?
///     .scale_intensity(ScalingMethod::Root { degree: 2.0 })?
///     .annotate_peptide_fragments(&IonTypeConfig::default(), Tolerance::da(0.02))?;
/// assert_eq!(processed.peaks().len(), 2);
/// assert_eq!(processed.annotations_at(1)[0].label(), "y1");
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Spectrum {
    identifier: String,
    precursor_mz: f64,
    precursor_charge: i32,
    retention_time: Option<f64>,
    peptide: Option<Peptide>,
    peaks: PeakArray,
    annotations: AnnotationMap,
}

/// Serializable snapshot of a spectrum for consumers such as plotting tools.
#[derive(Clone, Debug, Serialize)]
pub struct SpectrumView<'a> {
    pub identifier: &'a str,
    pub precursor_mz: f64,
    pub precursor_charge: i32,
    pub retention_time: Option<f64>,
    pub peptide: Option<String>,
    pub mz: &'a [f64],
    pub intensity: &'a [f64],
    pub labels: BTreeMap<usize, Vec<LabelledDelta>>,
    pub annotations: &'a AnnotationMap,
}

impl Spectrum {
    pub fn new(
        identifier: &str,
        precursor_mz: f64,
        precursor_charge: i32,
        mz: Vec<f64>,
        intensity: Vec<f64>,
    ) -> Result<Self> {
        if !precursor_mz.is_finite() || precursor_mz <= 0.0 {
            return Err(SpectrumError::InvalidInput(format!(
                "precursor m/z of {} must be positive, got {}",
                identifier, precursor_mz
            )));
        }
        if precursor_charge == 0 {
            return Err(SpectrumError::InvalidInput(format!("precursor charge of {} is zero", identifier)));
        }

        Ok(Spectrum {
            identifier: identifier.to_string(),
            precursor_mz,
            precursor_charge,
            retention_time: None,
            peptide: None,
            peaks: PeakArray::new(mz, intensity)?,
            annotations: AnnotationMap::new(),
        })
    }

    pub fn with_retention_time(mut self, retention_time: f64) -> Result<Self> {
        if !retention_time.is_finite() {
            return Err(SpectrumError::InvalidInput(format!(
                "retention time {} is not finite",
                retention_time
            )));
        }
        self.retention_time = Some(retention_time);
        Ok(self)
    }

    /// Sets the peptide used by [`Spectrum::annotate_peptide_fragments`].
    pub fn with_peptide(mut self, sequence: &str) -> Result<Self> {
        self.peptide = Some(Peptide::parse(sequence)?);
        Ok(self)
    }

    /// Adds modifications to the peptide set with [`Spectrum::with_peptide`].
    pub fn with_modifications(mut self, modifications: &ModificationSet) -> Result<Self> {
        let peptide = self.peptide.as_ref().ok_or_else(|| {
            SpectrumError::InvalidConfig(format!("{} has modifications but no peptide sequence", self.identifier))
        })?;
        self.peptide = Some(peptide.with_modifications(modifications)?);
        Ok(self)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn precursor_mz(&self) -> f64 {
        self.precursor_mz
    }

    pub fn precursor_charge(&self) -> i32 {
        self.precursor_charge
    }

    pub fn retention_time(&self) -> Option<f64> {
        self.retention_time
    }

    pub fn peptide(&self) -> Option<&Peptide> {
        self.peptide.as_ref()
    }

    pub fn modifications(&self) -> Option<&ModificationSet> {
        self.peptide.as_ref().map(Peptide::modifications)
    }

    pub fn peaks(&self) -> &PeakArray {
        &self.peaks
    }

    pub fn mz(&self) -> &[f64] {
        self.peaks.mz()
    }

    pub fn intensity(&self) -> &[f64] {
        self.peaks.intensity()
    }

    pub fn annotations(&self) -> &AnnotationMap {
        &self.annotations
    }

    /// Annotations of one peak, empty if it was not matched.
    pub fn annotations_at(&self, index: usize) -> &[Annotation] {
        self.annotations.get(&index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn peak_labels(&self) -> BTreeMap<usize, Vec<LabelledDelta>> {
        self.annotations
            .iter()
            .map(|(&index, annotations)| (index, annotations.iter().map(Annotation::to_labelled_delta).collect()))
            .collect()
    }

    pub fn view(&self) -> SpectrumView<'_> {
        SpectrumView {
            identifier: &self.identifier,
            precursor_mz: self.precursor_mz,
            precursor_charge: self.precursor_charge,
            retention_time: self.retention_time,
            peptide: self.peptide.as_ref().map(Peptide::to_string),
            mz: self.peaks.mz(),
            intensity: self.peaks.intensity(),
            labels: self.peak_labels(),
            annotations: &self.annotations,
        }
    }

    /// Neutral mass of the precursor derived from its m/z and charge.
    pub fn precursor_mass(&self) -> f64 {
        let polarity = self.precursor_charge.signum() as f64;
        (self.precursor_mz - polarity * MASS_PROTON) * self.precursor_charge.unsigned_abs() as f64
    }

    /// Keeps the peaks at `indices` (ascending) and carries their annotations along.
    fn retain(&self, indices: &[usize]) -> Spectrum {
        let annotations = self
            .annotations
            .iter()
            .filter_map(|(old, annotations)| {
                indices
                    .binary_search(old)
                    .ok()
                    .map(|new| (new, annotations.clone()))
            })
            .collect();

        debug!("{}: kept {} of {} peaks", self.identifier, indices.len(), self.peaks.len());
        Spectrum {
            peaks: self.peaks.select(indices),
            annotations,
            ..self.clone_metadata()
        }
    }

    fn clone_metadata(&self) -> Spectrum {
        Spectrum {
            identifier: self.identifier.clone(),
            precursor_mz: self.precursor_mz,
            precursor_charge: self.precursor_charge,
            retention_time: self.retention_time,
            peptide: self.peptide.clone(),
            peaks: PeakArray::empty(),
            annotations: AnnotationMap::new(),
        }
    }

    fn with_annotations(&self, annotations: AnnotationMap) -> Spectrum {
        Spectrum {
            peaks: self.peaks.clone(),
            annotations,
            ..self.clone_metadata()
        }
    }

    /// Restricts the peaks to `[min_mz, max_mz]`, both inclusive.
    pub fn set_mz_range(&self, min_mz: f64, max_mz: f64) -> Result<Spectrum> {
        Ok(self.retain(&self.peaks.range_indices(min_mz, max_mz)?))
    }

    /// Removes the precursor peak at every charge from 1 to the precursor charge, including
    /// its first `isotope` 13C isotope peaks.
    pub fn remove_precursor_peak(&self, tolerance: Tolerance, isotope: u8) -> Result<Spectrum> {
        let polarity = self.precursor_charge.signum() as f64;
        let mass = self.precursor_mass();

        let centers: Vec<f64> = (1..=self.precursor_charge.unsigned_abs())
            .flat_map(|charge| {
                (0..=isotope).map(move |i| {
                    let charge = charge as f64;
                    (mass + i as f64 * MASS_C13_DIFF + polarity * charge * MASS_PROTON) / charge
                })
            })
            .collect();

        Ok(self.retain(&self.peaks.outside_tolerance_indices(&centers, tolerance)?))
    }

    pub fn filter_intensity(&self, filter: &IntensityFilter) -> Result<Spectrum> {
        Ok(self.retain(&self.peaks.intensity_filter_indices(filter)?))
    }

    pub fn scale_intensity(&self, method: ScalingMethod) -> Result<Spectrum> {
        Ok(Spectrum {
            peaks: self.peaks.scale_intensity(method)?,
            annotations: self.annotations.clone(),
            ..self.clone_metadata()
        })
    }

    /// Annotates fragments of the spectrum's peptide, replacing earlier annotations.
    pub fn annotate_peptide_fragments(&self, ions: &IonTypeConfig, tolerance: Tolerance) -> Result<Spectrum> {
        let peptide = self.peptide.as_ref().ok_or_else(|| {
            SpectrumError::InvalidConfig(format!("{} has no peptide sequence to annotate", self.identifier))
        })?;
        let annotations = annotate(&self.peaks, &Hypothesis::Peptide { peptide, ions }, tolerance)?;
        Ok(self.with_annotations(annotations))
    }

    /// Annotates fragments of a small molecule given as SMILES, replacing earlier annotations.
    pub fn annotate_molecule_fragments(
        &self,
        smiles: &str,
        rules: &FragmentationRules,
        tolerance: Tolerance,
    ) -> Result<Spectrum> {
        let molecule = Molecule::from_smiles(smiles)?;
        let annotations = annotate(&self.peaks, &Hypothesis::Molecule { molecule: &molecule, rules }, tolerance)?;
        Ok(self.with_annotations(annotations))
    }

    /// Annotates caller supplied m/z values, replacing earlier annotations.
    pub fn annotate_custom(&self, fragments: &[CustomFragment], tolerance: Tolerance) -> Result<Spectrum> {
        let annotations = annotate(&self.peaks, &Hypothesis::Custom(fragments), tolerance)?;
        Ok(self.with_annotations(annotations))
    }
}

impl Display for Spectrum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Spectrum({}, precursor {:.4} ({:+}), {} peaks, TIC {:.1}, {} annotated)",
            self.identifier,
            self.precursor_mz,
            self.precursor_charge,
            self.peaks.len(),
            self.peaks.total_ion_current(),
            self.annotations.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum() -> Spectrum {
        Spectrum::new("test", 500.0, 2, vec![200.0, 300.0, 400.0], vec![1.0, 10.0, 5.0]).unwrap()
    }

    #[test]
    fn test_new_validates() {
        assert!(matches!(
            Spectrum::new("x", 0.0, 2, vec![], vec![]),
            Err(SpectrumError::InvalidInput(_))
        ));
        assert!(matches!(
            Spectrum::new("x", 500.0, 0, vec![], vec![]),
            Err(SpectrumError::InvalidInput(_))
        ));
        assert!(matches!(
            Spectrum::new("x", 500.0, 1, vec![1.0], vec![]),
            Err(SpectrumError::InvalidInput(_))
        ));
        assert!(spectrum().with_retention_time(f64::INFINITY).is_err());
    }

    #[test]
    fn test_filter_intensity_scenario() {
        let filter = IntensityFilter { min_intensity: Some(0.1), max_num_peaks: Some(1), ..Default::default() };
        let filtered = spectrum().filter_intensity(&filter).unwrap();
        assert_eq!(filtered.mz(), &[300.0]);
        assert_eq!(filtered.intensity(), &[10.0]);
    }

    #[test]
    fn test_failed_step_leaves_spectrum_unchanged() {
        let original = spectrum();
        let before = original.clone();
        assert!(original.scale_intensity(ScalingMethod::Root { degree: 0.0 }).is_err());
        assert!(original.set_mz_range(400.0, 100.0).is_err());
        assert_eq!(original, before);
    }

    #[test]
    fn test_remove_precursor_all_charges() {
        let mass = (500.0 - MASS_PROTON) * 2.0;
        let singly = mass + MASS_PROTON;
        let spectrum = Spectrum::new("p", 500.0, 2, vec![250.0, 500.0, singly, 500.0 + MASS_C13_DIFF / 2.0], vec![1.0; 4]).unwrap();

        let removed = spectrum.remove_precursor_peak(Tolerance::da(0.01), 0).unwrap();
        assert_eq!(removed.mz(), &[250.0, 500.0 + MASS_C13_DIFF / 2.0]);

        let with_isotope = spectrum.remove_precursor_peak(Tolerance::da(0.01), 1).unwrap();
        assert_eq!(with_isotope.mz(), &[250.0]);
    }

    #[test]
    fn test_negative_mode_precursor() {
        let spectrum = Spectrum::new("n", 300.0, -1, vec![300.0, 301.0], vec![1.0, 1.0]).unwrap();
        assert!((spectrum.precursor_mass() - (300.0 + MASS_PROTON)).abs() < 1e-9);
        let removed = spectrum.remove_precursor_peak(Tolerance::ppm(20.0), 0).unwrap();
        assert_eq!(removed.mz(), &[301.0]);
    }

    #[test]
    fn test_annotations_follow_surviving_peaks() {
        let fragments = vec![CustomFragment::new(300.0, "a"), CustomFragment::new(400.0, "b")];
        let annotated = spectrum().annotate_custom(&fragments, Tolerance::da(0.01)).unwrap();
        assert_eq!(annotated.annotations_at(1)[0].label(), "a");

        let trimmed = annotated.set_mz_range(250.0, 1000.0).unwrap();
        assert_eq!(trimmed.annotations_at(0)[0].label(), "a");
        assert_eq!(trimmed.annotations_at(1)[0].label(), "b");
        assert!(trimmed.annotations_at(2).is_empty());

        let scaled = trimmed.scale_intensity(ScalingMethod::Max).unwrap();
        assert_eq!(scaled.annotations(), trimmed.annotations());
    }

    #[test]
    fn test_reannotation_replaces() {
        let first = spectrum()
            .annotate_custom(&[CustomFragment::new(200.0, "old")], Tolerance::da(0.01))
            .unwrap();
        let second = first
            .annotate_custom(&[CustomFragment::new(400.0, "new")], Tolerance::da(0.01))
            .unwrap();
        assert!(second.annotations_at(0).is_empty());
        assert_eq!(second.annotations_at(2)[0].label(), "new");
        assert_eq!(second.annotations().len(), 1);

        let again = second
            .annotate_custom(&[CustomFragment::new(400.0, "new")], Tolerance::da(0.01))
            .unwrap();
        assert_eq!(again, second);
    }

    #[test]
    fn test_peptide_annotation_requires_peptide() {
        assert!(matches!(
            spectrum().annotate_peptide_fragments(&IonTypeConfig::default(), Tolerance::ppm(10.0)),
            Err(SpectrumError::InvalidConfig(_))
        ));
        assert!(matches!(
            spectrum().with_modifications(&ModificationSet::new()),
            Err(SpectrumError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_molecule_annotation_rejects_bad_smiles() {
        let result = spectrum().annotate_molecule_fragments("C1CC", &FragmentationRules::default(), Tolerance::ppm(10.0));
        assert!(matches!(result, Err(SpectrumError::UnparsableStructure { .. })));
    }

    #[test]
    fn test_view_serializes() {
        let annotated = spectrum()
            .with_peptide("PEPTIDE")
            .unwrap()
            .annotate_custom(&[CustomFragment::new(300.0, "x")], Tolerance::da(0.01))
            .unwrap();
        let json = serde_json::to_value(annotated.view()).unwrap();
        assert_eq!(json["identifier"], "test");
        assert_eq!(json["peptide"], "PEPTIDE");
        assert_eq!(json["labels"]["1"][0]["label"], "x");
        assert_eq!(annotated.to_string(), "Spectrum(test, precursor 500.0000 (+2), 3 peaks, TIC 16.0, 1 annotated)");
    }
}
