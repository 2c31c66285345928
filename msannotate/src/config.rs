use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};

use crate::algorithm::annotation::CustomFragment;
use crate::algorithm::molecule::FragmentationRules;
use crate::algorithm::peptide::IonTypeConfig;
use crate::algorithm::tolerance::Tolerance;
use crate::chemistry::modification::ModificationSet;
use crate::chemistry::neutral_loss::NeutralLoss;
use crate::data::peaks::{IntensityFilter, ScalingMethod};
use crate::data::spectrum::Spectrum;
use crate::error::{Result, SpectrumError};

/// One processing or annotation step, tagged by `op`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ProcessingStep {
    SetMzRange {
        min_mz: f64,
        max_mz: f64,
    },
    RemovePrecursorPeak {
        tolerance: Tolerance,
        #[serde(default)]
        isotope: u8,
    },
    FilterIntensity {
        #[serde(default)]
        min_intensity: Option<f64>,
        #[serde(default)]
        min_relative_intensity: Option<f64>,
        #[serde(default)]
        max_num_peaks: Option<usize>,
    },
    ScaleIntensity {
        method: String,
        #[serde(default)]
        degree: Option<f64>,
    },
    AnnotatePeptide {
        /// Ion letters, e.g. `"by"`.
        ion_types: String,
        #[serde(default = "default_charge")]
        max_charge: u32,
        /// Formulas, `"H2O"` or `"-H2O"` for losses and `"+HPO3"` for gains.
        #[serde(default)]
        neutral_losses: Vec<String>,
        #[serde(default)]
        max_isotope: u8,
        tolerance: Tolerance,
    },
    AnnotateMolecule {
        smiles: String,
        #[serde(default)]
        rules: FragmentationRules,
        tolerance: Tolerance,
    },
    AnnotateCustom {
        fragments: Vec<CustomFragment>,
        tolerance: Tolerance,
    },
}

fn default_charge() -> u32 {
    1
}

impl ProcessingStep {
    pub fn apply(&self, spectrum: &Spectrum) -> Result<Spectrum> {
        match self {
            ProcessingStep::SetMzRange { min_mz, max_mz } => spectrum.set_mz_range(*min_mz, *max_mz),
            ProcessingStep::RemovePrecursorPeak { tolerance, isotope } => {
                spectrum.remove_precursor_peak(*tolerance, *isotope)
            }
            ProcessingStep::FilterIntensity { min_intensity, min_relative_intensity, max_num_peaks } => {
                spectrum.filter_intensity(&IntensityFilter {
                    min_intensity: *min_intensity,
                    min_relative_intensity: *min_relative_intensity,
                    max_num_peaks: *max_num_peaks,
                })
            }
            ProcessingStep::ScaleIntensity { method, degree } => {
                spectrum.scale_intensity(ScalingMethod::from_name(method, *degree)?)
            }
            ProcessingStep::AnnotatePeptide { ion_types, max_charge, neutral_losses, max_isotope, tolerance } => {
                let losses = neutral_losses
                    .iter()
                    .map(|loss| NeutralLoss::parse(loss))
                    .collect::<Result<Vec<_>>>()?;
                let ions = IonTypeConfig::from_letters(ion_types, *max_charge)?
                    .with_neutral_losses(losses)
                    .with_max_isotope(*max_isotope);
                spectrum.annotate_peptide_fragments(&ions, *tolerance)
            }
            ProcessingStep::AnnotateMolecule { smiles, rules, tolerance } => {
                spectrum.annotate_molecule_fragments(smiles, rules, *tolerance)
            }
            ProcessingStep::AnnotateCustom { fragments, tolerance } => spectrum.annotate_custom(fragments, *tolerance),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProcessingStep::SetMzRange { .. } => "set_mz_range",
            ProcessingStep::RemovePrecursorPeak { .. } => "remove_precursor_peak",
            ProcessingStep::FilterIntensity { .. } => "filter_intensity",
            ProcessingStep::ScaleIntensity { .. } => "scale_intensity",
            ProcessingStep::AnnotatePeptide { .. } => "annotate_peptide",
            ProcessingStep::AnnotateMolecule { .. } => "annotate_molecule",
            ProcessingStep::AnnotateCustom { .. } => "annotate_custom",
        }
    }
}

/// An ordered list of steps applied to every spectrum.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(default)]
    pub steps: Vec<ProcessingStep>,
}

impl Pipeline {
    /// Parses a pipeline from TOML.
    ///
    /// # Example
    ///
    /// ```
    /// use msannotate::config::Pipeline;
    ///
    /// let pipeline = Pipeline::from_toml_str(r#"
    ///     [[steps]]
    ///     op = "set_mz_range"
    ///     min_mz = 100.0
    ///     max_mz = 1400.0
    ///
    ///     [[steps]]
    ///     op = "scale_intensity"
    ///     method = "root"
    /// "#).unwrap();
    /// assert_eq!(pipeline.steps.len(), 2);
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SpectrumError::InvalidConfig(format!("invalid pipeline: {}", e)))
    }

    /// Runs every step in order; the first failing step aborts with its error.
    pub fn apply(&self, spectrum: &Spectrum) -> Result<Spectrum> {
        let mut current = spectrum.clone();
        for step in &self.steps {
            current = step.apply(&current)?;
            debug!("{} after {}: {} peaks", current.identifier(), step.name(), current.peaks().len());
        }
        Ok(current)
    }
}

impl Display for Pipeline {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.steps.iter().map(ProcessingStep::name).collect();
        write!(f, "Pipeline[{}]", names.join(" -> "))
    }
}

/// Applies `pipeline` to independent spectra on a pool of `num_threads` threads.
///
/// Results keep the input order; a failure only affects its own spectrum.
pub fn process_batch(spectra: &[Spectrum], pipeline: &Pipeline, num_threads: usize) -> Result<Vec<Result<Spectrum>>> {
    let pool = ThreadPoolBuilder::new().num_threads(num_threads).build()?;
    info!("processing {} spectra with {} on {} threads", spectra.len(), pipeline, pool.current_num_threads());

    let processed = pool.install(|| spectra.par_iter().map(|spectrum| pipeline.apply(spectrum)).collect());
    Ok(processed)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariableModification {
    pub position: usize,
    pub mass_delta: f64,
}

/// Modifications as written in a job file; residue keys are one-letter codes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModificationsInput {
    #[serde(default)]
    pub static_mods: BTreeMap<String, f64>,
    #[serde(default)]
    pub variable_mods: Vec<VariableModification>,
    #[serde(default)]
    pub n_term: Option<f64>,
    #[serde(default)]
    pub c_term: Option<f64>,
}

impl ModificationsInput {
    pub fn to_modification_set(&self) -> Result<ModificationSet> {
        let mut set = ModificationSet::new();
        for (residue, &delta) in &self.static_mods {
            let mut chars = residue.chars();
            let code = match (chars.next(), chars.next()) {
                (Some(code), None) => code,
                _ => {
                    return Err(SpectrumError::InvalidConfig(format!(
                        "static modification key '{}' is not a one-letter residue code",
                        residue
                    )))
                }
            };
            set = set.with_static(code, delta)?;
        }
        for modification in &self.variable_mods {
            if set.variable_mods.contains_key(&modification.position) {
                return Err(SpectrumError::ConfigurationConflict(format!(
                    "position {} carries two variable modifications",
                    modification.position
                )));
            }
            set = set.with_variable(modification.position, modification.mass_delta)?;
        }
        if let Some(delta) = self.n_term {
            set = set.with_n_term(delta)?;
        }
        if let Some(delta) = self.c_term {
            set = set.with_c_term(delta)?;
        }
        Ok(set)
    }
}

/// A spectrum as written in a job file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpectrumInput {
    pub identifier: String,
    pub precursor_mz: f64,
    pub precursor_charge: i32,
    #[serde(default)]
    pub retention_time: Option<f64>,
    #[serde(default)]
    pub peptide: Option<String>,
    #[serde(default)]
    pub modifications: Option<ModificationsInput>,
    pub mz: Vec<f64>,
    pub intensity: Vec<f64>,
}

impl SpectrumInput {
    pub fn to_spectrum(&self) -> Result<Spectrum> {
        let mut spectrum = Spectrum::new(
            &self.identifier,
            self.precursor_mz,
            self.precursor_charge,
            self.mz.clone(),
            self.intensity.clone(),
        )?;
        if let Some(retention_time) = self.retention_time {
            spectrum = spectrum.with_retention_time(retention_time)?;
        }
        if let Some(sequence) = &self.peptide {
            spectrum = spectrum.with_peptide(sequence)?;
        }
        if let Some(modifications) = &self.modifications {
            spectrum = spectrum.with_modifications(&modifications.to_modification_set()?)?;
        }
        Ok(spectrum)
    }
}

/// Spectra plus the pipeline to run on them, as read by the command line tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub threads: Option<usize>,
    pub spectra: Vec<SpectrumInput>,
    #[serde(default)]
    pub steps: Vec<ProcessingStep>,
}

impl Job {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SpectrumError::InvalidConfig(format!("invalid job: {}", e)))
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline { steps: self.steps.clone() }
    }

    /// Spectra of the job, entries that fail validation are logged and left out.
    pub fn spectra(&self) -> Vec<Spectrum> {
        self.spectra
            .iter()
            .filter_map(|input| match input.to_spectrum() {
                Ok(spectrum) => Some(spectrum),
                Err(e) => {
                    warn!("skipping invalid spectrum {}: {}", input.identifier, e);
                    None
                }
            })
            .collect()
    }
}
