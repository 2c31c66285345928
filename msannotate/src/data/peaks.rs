use std::fmt::{Display, Formatter};

use itertools::Itertools;
use log::{debug, warn};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::algorithm::tolerance::{Tolerance, ToleranceMatcher};
use crate::error::{Result, SpectrumError};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub mz: f64,
    pub intensity: f64,
}

/// Intensity based peak selection.
///
/// Thresholds are applied first, then the `max_num_peaks` most intense of the survivors are kept.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IntensityFilter {
    #[serde(default)]
    pub min_intensity: Option<f64>,
    /// Fraction of the base peak intensity, in `[0, 1]`.
    #[serde(default)]
    pub min_relative_intensity: Option<f64>,
    #[serde(default)]
    pub max_num_peaks: Option<usize>,
}

impl IntensityFilter {
    pub fn top_n(max_num_peaks: usize) -> Self {
        IntensityFilter { max_num_peaks: Some(max_num_peaks), ..Default::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(min) = self.min_intensity {
            if !min.is_finite() || min < 0.0 {
                return Err(SpectrumError::InvalidConfig(format!(
                    "minimum intensity must be a non-negative number, got {}",
                    min
                )));
            }
        }
        if let Some(relative) = self.min_relative_intensity {
            if !(0.0..=1.0).contains(&relative) {
                return Err(SpectrumError::InvalidConfig(format!(
                    "minimum relative intensity must be within [0, 1], got {}",
                    relative
                )));
            }
        }
        Ok(())
    }
}

/// Intensity transformations.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum ScalingMethod {
    /// `intensity^(1/degree)`, `degree = 2` is square root scaling.
    Root { degree: f64 },
    /// `ln(1 + intensity)`.
    Log,
    /// Rank by decreasing intensity, the base peak gets rank 1.
    Rank,
    /// Divide by the base peak intensity.
    Max,
}

impl ScalingMethod {
    /// Resolves a method by name; `degree` only applies to `root` and defaults to 2.
    ///
    /// # Example
    ///
    /// ```
    /// use msannotate::data::peaks::ScalingMethod;
    ///
    /// assert_eq!(ScalingMethod::from_name("root", None).unwrap(), ScalingMethod::Root { degree: 2.0 });
    /// assert!(ScalingMethod::from_name("cubic", None).is_err());
    /// assert!(ScalingMethod::from_name("root", Some(0.0)).is_err());
    /// ```
    pub fn from_name(name: &str, degree: Option<f64>) -> Result<Self> {
        let method = match name.to_ascii_lowercase().as_str() {
            "root" => ScalingMethod::Root { degree: degree.unwrap_or(2.0) },
            "log" => ScalingMethod::Log,
            "rank" => ScalingMethod::Rank,
            "max" => ScalingMethod::Max,
            other => {
                return Err(SpectrumError::InvalidConfig(format!(
                    "unknown intensity scaling method '{}'",
                    other
                )))
            }
        };
        method.validate()?;
        Ok(method)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            ScalingMethod::Root { degree } if !(degree.is_finite() && *degree > 0.0) => {
                Err(SpectrumError::InvalidConfig(format!(
                    "root scaling degree must be positive, got {}",
                    degree
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Centroided peaks, sorted by ascending m/z.
///
/// Peaks with equal m/z keep their input order. Every transformation returns a new array.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PeakArray {
    mz: Vec<f64>,
    intensity: Vec<f64>,
}

impl PeakArray {
    /// Validates and sorts the peaks.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use msannotate::data::peaks::PeakArray;
    /// let peaks = PeakArray::new(vec![300.0, 100.0, 200.0], vec![3.0, 1.0, 2.0]).unwrap();
    /// assert_eq!(peaks.mz(), &[100.0, 200.0, 300.0]);
    /// assert_eq!(peaks.intensity(), &[1.0, 2.0, 3.0]);
    /// assert!(PeakArray::new(vec![100.0], vec![]).is_err());
    /// ```
    pub fn new(mz: Vec<f64>, intensity: Vec<f64>) -> Result<Self> {
        if mz.len() != intensity.len() {
            return Err(SpectrumError::InvalidInput(format!(
                "m/z and intensity arrays differ in length ({} vs {})",
                mz.len(),
                intensity.len()
            )));
        }
        if let Some((index, value)) = mz.iter().find_position(|m| !m.is_finite()) {
            return Err(SpectrumError::InvalidInput(format!(
                "m/z value {} at index {} is not finite",
                value, index
            )));
        }
        if let Some((index, value)) = intensity.iter().find_position(|i| !i.is_finite() || **i < 0.0) {
            return Err(SpectrumError::InvalidInput(format!(
                "intensity {} at index {} is negative or not finite",
                value, index
            )));
        }

        if mz.windows(2).all(|w| w[0] <= w[1]) {
            return Ok(PeakArray { mz, intensity });
        }

        // stable, so equal m/z keep their input order
        let order: Vec<usize> = (0..mz.len()).sorted_by(|&a, &b| mz[a].total_cmp(&mz[b])).collect();
        Ok(PeakArray {
            mz: order.iter().map(|&i| mz[i]).collect(),
            intensity: order.iter().map(|&i| intensity[i]).collect(),
        })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn mz(&self) -> &[f64] {
        &self.mz
    }

    pub fn intensity(&self) -> &[f64] {
        &self.intensity
    }

    pub fn len(&self) -> usize {
        self.mz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Peak> {
        Some(Peak { mz: *self.mz.get(index)?, intensity: self.intensity[index] })
    }

    pub fn iter(&self) -> impl Iterator<Item = Peak> + '_ {
        self.mz
            .iter()
            .zip(&self.intensity)
            .map(|(&mz, &intensity)| Peak { mz, intensity })
    }

    pub fn max_intensity(&self) -> Option<f64> {
        self.intensity.iter().copied().max_by(f64::total_cmp)
    }

    pub fn total_ion_current(&self) -> f64 {
        self.intensity.iter().sum()
    }

    /// Peaks at the given indices, which must be ascending.
    pub(crate) fn select(&self, indices: &[usize]) -> PeakArray {
        PeakArray {
            mz: indices.iter().map(|&i| self.mz[i]).collect(),
            intensity: indices.iter().map(|&i| self.intensity[i]).collect(),
        }
    }

    pub(crate) fn range_indices(&self, min_mz: f64, max_mz: f64) -> Result<Vec<usize>> {
        if !min_mz.is_finite() || !max_mz.is_finite() || min_mz > max_mz {
            return Err(SpectrumError::InvalidConfig(format!(
                "invalid m/z range [{}, {}]",
                min_mz, max_mz
            )));
        }
        let start = self.mz.partition_point(|&m| m < min_mz);
        let end = self.mz.partition_point(|&m| m <= max_mz);
        Ok((start..end.max(start)).collect())
    }

    /// Keeps peaks with `min_mz <= mz <= max_mz`.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use msannotate::data::peaks::PeakArray;
    /// let peaks = PeakArray::new(vec![100.0, 200.0, 300.0], vec![1.0, 1.0, 1.0]).unwrap();
    /// assert_eq!(peaks.restrict_range(100.0, 200.0).unwrap().mz(), &[100.0, 200.0]);
    /// assert!(peaks.restrict_range(400.0, 500.0).unwrap().is_empty());
    /// assert!(peaks.restrict_range(200.0, 100.0).is_err());
    /// ```
    pub fn restrict_range(&self, min_mz: f64, max_mz: f64) -> Result<PeakArray> {
        Ok(self.select(&self.range_indices(min_mz, max_mz)?))
    }

    pub(crate) fn outside_tolerance_indices(&self, centers: &[f64], tolerance: Tolerance) -> Result<Vec<usize>> {
        let matcher = ToleranceMatcher::new(&self.mz, tolerance)?;
        let mut keep = vec![true; self.len()];
        for &center in centers {
            for index in matcher.within(center) {
                keep[index] = false;
            }
        }
        Ok(keep.iter().positions(|&k| k).collect())
    }

    /// Drops every peak within `tolerance` of `center_mz`.
    pub fn remove_around_mz(&self, center_mz: f64, tolerance: Tolerance) -> Result<PeakArray> {
        if !center_mz.is_finite() {
            return Err(SpectrumError::InvalidConfig(format!("center m/z {} is not finite", center_mz)));
        }
        Ok(self.select(&self.outside_tolerance_indices(&[center_mz], tolerance)?))
    }

    pub(crate) fn intensity_filter_indices(&self, filter: &IntensityFilter) -> Result<Vec<usize>> {
        filter.validate()?;

        let base_peak = self.max_intensity().unwrap_or(0.0);
        let threshold = filter
            .min_intensity
            .unwrap_or(0.0)
            .max(filter.min_relative_intensity.unwrap_or(0.0) * base_peak);

        let mut indices: Vec<usize> = self.intensity.iter().positions(|&i| i >= threshold).collect();

        if let Some(top_n) = filter.max_num_peaks {
            if indices.len() > top_n {
                // most intense first, ties to the lower m/z
                indices.sort_by_key(|&i| (std::cmp::Reverse(OrderedFloat(self.intensity[i])), OrderedFloat(self.mz[i]), i));
                indices.truncate(top_n);
                indices.sort_unstable();
            }
        }

        debug!("intensity filter kept {} of {} peaks", indices.len(), self.len());
        Ok(indices)
    }

    /// Applies thresholds and top-N selection, see [`IntensityFilter`].
    ///
    /// # Example
    ///
    /// ```rust
    /// # use msannotate::data::peaks::{IntensityFilter, PeakArray};
    /// let peaks = PeakArray::new(vec![200.0, 300.0, 400.0], vec![1.0, 10.0, 5.0]).unwrap();
    /// let top = peaks.filter_by_intensity(&IntensityFilter::top_n(2)).unwrap();
    /// assert_eq!(top.mz(), &[300.0, 400.0]);
    /// ```
    pub fn filter_by_intensity(&self, filter: &IntensityFilter) -> Result<PeakArray> {
        Ok(self.select(&self.intensity_filter_indices(filter)?))
    }

    /// Transforms intensities; m/z values and peak order are unchanged.
    pub fn scale_intensity(&self, method: ScalingMethod) -> Result<PeakArray> {
        method.validate()?;

        let intensity = match method {
            ScalingMethod::Root { degree } => self.intensity.iter().map(|i| i.powf(1.0 / degree)).collect(),
            ScalingMethod::Log => self.intensity.iter().map(|i| i.ln_1p()).collect(),
            ScalingMethod::Rank => {
                let mut ranks = vec![0.0; self.len()];
                let order = (0..self.len())
                    .sorted_by_key(|&i| (std::cmp::Reverse(OrderedFloat(self.intensity[i])), OrderedFloat(self.mz[i]), i));
                for (rank, index) in order.enumerate() {
                    ranks[index] = (rank + 1) as f64;
                }
                ranks
            }
            ScalingMethod::Max => match self.max_intensity() {
                Some(max) if max > 0.0 => self.intensity.iter().map(|i| i / max).collect(),
                _ => {
                    if !self.is_empty() {
                        warn!("max scaling of a spectrum without signal leaves intensities unchanged");
                    }
                    self.intensity.clone()
                }
            },
        };

        Ok(PeakArray { mz: self.mz.clone(), intensity })
    }
}

impl Display for PeakArray {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let preview = self
            .iter()
            .take(5)
            .map(|p| format!("({:.4}, {:.1})", p.mz, p.intensity))
            .join(", ");
        write!(f, "PeakArray(n={}, [{}{}])", self.len(), preview, if self.len() > 5 { ", ..." } else { "" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peaks(mz: &[f64], intensity: &[f64]) -> PeakArray {
        PeakArray::new(mz.to_vec(), intensity.to_vec()).unwrap()
    }

    #[test]
    fn test_new_sorts_stably() {
        let array = peaks(&[200.0, 100.0, 200.0, 150.0], &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(array.mz(), &[100.0, 150.0, 200.0, 200.0]);
        assert_eq!(array.intensity(), &[2.0, 4.0, 1.0, 3.0]);
        assert_eq!(array.max_intensity(), Some(4.0));
        assert_eq!(array.total_ion_current(), 10.0);
        assert_eq!(peaks(&[], &[]).total_ion_current(), 0.0);
    }

    #[test]
    fn test_new_rejects_invalid_input() {
        assert!(matches!(PeakArray::new(vec![1.0, 2.0], vec![1.0]), Err(SpectrumError::InvalidInput(_))));
        assert!(matches!(PeakArray::new(vec![f64::NAN], vec![1.0]), Err(SpectrumError::InvalidInput(_))));
        assert!(matches!(PeakArray::new(vec![1.0], vec![-1.0]), Err(SpectrumError::InvalidInput(_))));
        assert!(PeakArray::new(vec![], vec![]).unwrap().is_empty());
    }

    #[test]
    fn test_restrict_range_inclusive() {
        let array = peaks(&[100.0, 200.0, 300.0, 400.0], &[1.0; 4]);
        assert_eq!(array.restrict_range(200.0, 300.0).unwrap().mz(), &[200.0, 300.0]);
        assert_eq!(array.restrict_range(250.0, 250.0).unwrap().len(), 0);
        assert!(array.restrict_range(f64::NAN, 300.0).is_err());
    }

    #[test]
    fn test_remove_around_mz() {
        let array = peaks(&[499.99, 500.0, 500.004, 501.0], &[1.0; 4]);
        let removed = array.remove_around_mz(500.0, Tolerance::ppm(10.0)).unwrap();
        assert_eq!(removed.mz(), &[499.99, 501.0]);
        assert!(array.remove_around_mz(500.0, Tolerance::da(-1.0)).is_err());
    }

    #[test]
    fn test_filter_thresholds() {
        let array = peaks(&[100.0, 200.0, 300.0], &[5.0, 50.0, 100.0]);
        let absolute = IntensityFilter { min_intensity: Some(50.0), ..Default::default() };
        assert_eq!(array.filter_by_intensity(&absolute).unwrap().mz(), &[200.0, 300.0]);

        let relative = IntensityFilter { min_relative_intensity: Some(0.6), ..Default::default() };
        assert_eq!(array.filter_by_intensity(&relative).unwrap().mz(), &[300.0]);

        let invalid = IntensityFilter { min_relative_intensity: Some(1.5), ..Default::default() };
        assert!(matches!(array.filter_by_intensity(&invalid), Err(SpectrumError::InvalidConfig(_))));
    }

    #[test]
    fn test_top_n_ties_prefer_lower_mz() {
        let array = peaks(&[100.0, 200.0, 300.0, 400.0], &[10.0, 20.0, 10.0, 10.0]);
        let top = array.filter_by_intensity(&IntensityFilter::top_n(2)).unwrap();
        assert_eq!(top.mz(), &[100.0, 200.0]);
        assert_eq!(array.filter_by_intensity(&IntensityFilter::top_n(10)).unwrap(), array);
        assert!(array.filter_by_intensity(&IntensityFilter::top_n(0)).unwrap().is_empty());
    }

    #[test]
    fn test_scale_root_and_log() {
        let array = peaks(&[100.0, 200.0], &[4.0, 16.0]);
        let root = array.scale_intensity(ScalingMethod::Root { degree: 2.0 }).unwrap();
        assert!((root.intensity()[0] - 2.0).abs() < 1e-12);
        assert!((root.intensity()[1] - 4.0).abs() < 1e-12);
        assert_eq!(root.mz(), array.mz());

        let log = array.scale_intensity(ScalingMethod::Log).unwrap();
        assert!((log.intensity()[0] - 5.0f64.ln()).abs() < 1e-12);

        assert!(array.scale_intensity(ScalingMethod::Root { degree: -1.0 }).is_err());
    }

    #[test]
    fn test_scale_rank_and_max() {
        let array = peaks(&[100.0, 200.0, 300.0], &[5.0, 10.0, 5.0]);
        let rank = array.scale_intensity(ScalingMethod::Rank).unwrap();
        assert_eq!(rank.intensity(), &[2.0, 1.0, 3.0]);

        let max = array.scale_intensity(ScalingMethod::Max).unwrap();
        assert_eq!(max.intensity(), &[0.5, 1.0, 0.5]);

        let silent = peaks(&[100.0], &[0.0]);
        assert_eq!(silent.scale_intensity(ScalingMethod::Max).unwrap().intensity(), &[0.0]);
    }

    #[test]
    fn test_scaling_empty_array() {
        let empty = PeakArray::empty();
        for method in [ScalingMethod::Log, ScalingMethod::Rank, ScalingMethod::Max] {
            assert!(empty.scale_intensity(method).unwrap().is_empty());
        }
    }

    #[test]
    fn test_display() {
        let array = peaks(&[100.0], &[1.0]);
        assert_eq!(array.to_string(), "PeakArray(n=1, [(100.0000, 1.0)])");
    }
}
