use msannotate::algorithm::annotation::CustomFragment;
use msannotate::algorithm::molecule::FragmentationRules;
use msannotate::algorithm::peptide::{theoretical_fragments, IonType, IonTypeConfig};
use msannotate::algorithm::tolerance::{Tolerance, ToleranceMatcher};
use msannotate::chemistry::modification::ModificationSet;
use msannotate::chemistry::neutral_loss::NeutralLoss;
use msannotate::config::{process_batch, Job, Pipeline};
use msannotate::data::annotation::{Annotation, PeptideFragmentAnnotation};
use msannotate::data::peaks::{IntensityFilter, ScalingMethod};
use msannotate::data::peptide::Peptide;
use msannotate::data::spectrum::Spectrum;
use msannotate::error::SpectrumError;

const Y1_PEPTIDE: f64 = 148.0604342;

fn spectrum(mz: &[f64], intensity: &[f64]) -> Spectrum {
    Spectrum::new("scan=1", 400.71, 2, mz.to_vec(), intensity.to_vec()).unwrap()
}

#[test]
fn test_set_mz_range_scenario() {
    let spectrum = spectrum(&[100.0, 500.0, 1000.0], &[5.0, 50.0, 2.0]);
    let restricted = spectrum.set_mz_range(200.0, 900.0).unwrap();
    assert_eq!(restricted.mz(), &[500.0]);
    assert_eq!(restricted.intensity(), &[50.0]);
}

#[test]
fn test_filter_intensity_scenario() {
    let spectrum = spectrum(&[200.0, 300.0, 400.0], &[1.0, 10.0, 5.0]);
    let filter = IntensityFilter { min_intensity: Some(0.1), max_num_peaks: Some(1), ..Default::default() };
    let filtered = spectrum.filter_intensity(&filter).unwrap();
    assert_eq!(filtered.mz(), &[300.0]);
    assert_eq!(filtered.intensity(), &[10.0]);
}

#[test]
fn test_y1_of_peptide() {
    let peptide = Peptide::parse("PEPTIDE").unwrap();
    let fragments = theoretical_fragments(&peptide, &IonTypeConfig::from_letters("y", 1).unwrap()).unwrap();
    let y1 = fragments
        .iter()
        .find(|f| f.annotation.label() == "y1")
        .unwrap();
    assert!((y1.mz - Y1_PEPTIDE).abs() < 1e-6);

    let annotated = spectrum(&[y1.mz, 250.0], &[10.0, 3.0])
        .with_peptide("PEPTIDE")
        .unwrap()
        .annotate_peptide_fragments(&IonTypeConfig::from_letters("y", 1).unwrap(), Tolerance::ppm(10.0))
        .unwrap();

    assert_eq!(annotated.annotations().len(), 1);
    let annotations = annotated.annotations_at(0);
    assert_eq!(annotations.len(), 1);
    match &annotations[0] {
        Annotation::PeptideFragment(PeptideFragmentAnnotation { ion_type, position, charge, neutral_loss, mz_delta, .. }) => {
            assert_eq!(*ion_type, IonType::Y);
            assert_eq!(*position, 1);
            assert_eq!(*charge, 1);
            assert!(neutral_loss.is_none());
            assert!(mz_delta.abs() < 1e-9);
        }
        other => panic!("expected a peptide fragment, got {:?}", other),
    }
}

#[test]
fn test_modifications_shift_fragments() {
    let carbamidomethyl = 57.021464;
    let modifications = ModificationSet::new().with_static('C', carbamidomethyl).unwrap();
    let plain = Peptide::parse("ACK").unwrap();
    let modified = plain.with_modifications(&modifications).unwrap();
    let config = IonTypeConfig::from_letters("b", 1).unwrap();

    let plain_b2 = theoretical_fragments(&plain, &config).unwrap()[1].mz;
    let modified_b2 = theoretical_fragments(&modified, &config).unwrap()[1].mz;
    assert!((modified_b2 - plain_b2 - carbamidomethyl).abs() < 1e-9);

    let out_of_bounds = ModificationSet::new().with_variable(7, 15.994915).unwrap();
    assert!(matches!(
        plain.with_modifications(&out_of_bounds),
        Err(SpectrumError::ConfigurationConflict(_))
    ));
}

#[test]
fn test_neutral_loss_and_charge_labels() {
    let peptide = Peptide::parse("PEPTIDE").unwrap();
    let config = IonTypeConfig::from_letters("y", 2)
        .unwrap()
        .with_neutral_losses(vec![NeutralLoss::water()]);
    let labels: Vec<String> = theoretical_fragments(&peptide, &config)
        .unwrap()
        .iter()
        .map(|f| f.annotation.label())
        .collect();
    assert!(labels.contains(&"y1".to_string()));
    assert!(labels.contains(&"y3-H2O".to_string()));
    assert!(labels.contains(&"y6^2".to_string()));
}

#[test]
fn test_unknown_residue() {
    assert!(matches!(
        spectrum(&[100.0], &[1.0]).with_peptide("PEPBIDE"),
        Err(SpectrumError::UnknownResidue { residue: 'B', position: 3 })
    ));
}

#[test]
fn test_unparsable_smiles_leaves_spectrum_usable() {
    let original = spectrum(&[100.0, 200.0], &[1.0, 2.0]);
    let result = original.annotate_molecule_fragments("C(C", &FragmentationRules::default(), Tolerance::ppm(10.0));
    assert!(matches!(result, Err(SpectrumError::UnparsableStructure { .. })));

    let resumed = original
        .annotate_custom(&[CustomFragment::new(200.0, "reporter")], Tolerance::da(0.01))
        .unwrap();
    assert_eq!(resumed.annotations_at(1)[0].label(), "reporter");
}

#[test]
fn test_ppm_boundary_is_inclusive() {
    let tolerance = Tolerance::ppm(10.0);
    let query = 500.0;
    let boundary = query + tolerance.delta(query);
    let beyond = boundary + 1e-6;

    let mz = [boundary];
    let hit = ToleranceMatcher::new(&mz, tolerance).unwrap().closest(query);
    assert_eq!(hit.map(|h| h.index), Some(0));

    let mz = [beyond];
    assert!(ToleranceMatcher::new(&mz, tolerance).unwrap().closest(query).is_none());
}

#[test]
fn test_reannotation_replaces_annotations() {
    let spectrum = spectrum(&[Y1_PEPTIDE, 300.0], &[1.0, 1.0]).with_peptide("PEPTIDE").unwrap();
    let by_peptide = spectrum
        .annotate_peptide_fragments(&IonTypeConfig::default(), Tolerance::ppm(10.0))
        .unwrap();
    assert_eq!(by_peptide.annotations_at(0)[0].label(), "y1");

    let by_custom = by_peptide
        .annotate_custom(&[CustomFragment::new(300.0, "contaminant")], Tolerance::ppm(10.0))
        .unwrap();
    assert!(by_custom.annotations_at(0).is_empty());
    assert_eq!(by_custom.annotations_at(1).len(), 1);

    let again = by_peptide
        .annotate_peptide_fragments(&IonTypeConfig::default(), Tolerance::ppm(10.0))
        .unwrap();
    assert_eq!(again, by_peptide);
}

#[test]
fn test_failed_steps_leave_spectrum_unchanged() {
    let original = spectrum(&[100.0, 200.0, 300.0], &[1.0, 0.0, 3.0]);
    let before = original.clone();

    assert!(matches!(original.set_mz_range(300.0, 100.0), Err(SpectrumError::InvalidConfig(_))));
    assert!(matches!(
        original.remove_precursor_peak(Tolerance::da(-1.0), 0),
        Err(SpectrumError::InvalidConfig(_))
    ));
    assert!(matches!(
        original.filter_intensity(&IntensityFilter { min_relative_intensity: Some(1.5), ..Default::default() }),
        Err(SpectrumError::InvalidConfig(_))
    ));
    assert!(matches!(ScalingMethod::from_name("cubic", None), Err(SpectrumError::InvalidConfig(_))));
    assert!(matches!(
        original.annotate_peptide_fragments(&IonTypeConfig::default(), Tolerance::ppm(10.0)),
        Err(SpectrumError::InvalidConfig(_))
    ));

    assert_eq!(original, before);
}

#[test]
fn test_annotation_order_decides_matches() {
    let spectrum = spectrum(&[Y1_PEPTIDE, 300.0], &[1.0, 100.0]).with_peptide("PEPTIDE").unwrap();
    let top = IntensityFilter::top_n(1);

    let annotated_first = spectrum
        .annotate_peptide_fragments(&IonTypeConfig::default(), Tolerance::ppm(10.0))
        .unwrap()
        .filter_intensity(&top)
        .unwrap();
    assert!(annotated_first.annotations().is_empty());

    let filtered_first = spectrum
        .filter_intensity(&top)
        .unwrap()
        .annotate_peptide_fragments(&IonTypeConfig::default(), Tolerance::ppm(10.0))
        .unwrap();
    assert!(filtered_first.annotations().is_empty());
    assert_eq!(filtered_first.mz(), &[300.0]);
}

#[test]
fn test_toml_job_through_batch() {
    let job = Job::from_toml_str(
        r#"
[[spectra]]
identifier = "a"
precursor_mz = 400.71
precursor_charge = 2
peptide = "PEPTIDE"
mz = [148.0604, 400.71]
intensity = [10.0, 100.0]

[[spectra]]
identifier = "b"
precursor_mz = 195.0877
precursor_charge = 1
mz = [195.0877, 138.0662]
intensity = [100.0, 40.0]

[[steps]]
op = "remove_precursor_peak"
tolerance = { mode = "ppm", value = 20.0 }

[[steps]]
op = "annotate_custom"
tolerance = { mode = "da", value = 0.01 }
fragments = [{ mz = 148.06, label = "y1?" }, { mz = 138.066, label = "C6H8N3O+" }]
"#,
    )
    .unwrap();

    let spectra: Vec<Spectrum> = job.spectra.iter().map(|s| s.to_spectrum().unwrap()).collect();
    let results = process_batch(&spectra, &job.pipeline(), 2).unwrap();

    let a = results[0].as_ref().unwrap();
    assert_eq!(a.mz(), &[148.0604]);
    assert_eq!(a.annotations_at(0)[0].label(), "y1?");

    let b = results[1].as_ref().unwrap();
    assert_eq!(b.mz(), &[138.0662]);
    assert_eq!(b.annotations_at(0)[0].label(), "C6H8N3O+");

    assert!(Pipeline::from_toml_str("steps = 3").is_err());
}
