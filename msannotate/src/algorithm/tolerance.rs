use std::fmt::{Display, Formatter};
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::chemistry::constants::PPM;
use crate::error::{Result, SpectrumError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToleranceMode {
    /// Absolute window in Dalton (m/z units).
    Da,
    /// Window relative to the queried m/z, in parts per million.
    Ppm,
}

/// A symmetric m/z matching window.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub mode: ToleranceMode,
    pub value: f64,
}

impl Tolerance {
    pub fn da(value: f64) -> Self {
        Tolerance { mode: ToleranceMode::Da, value }
    }

    pub fn ppm(value: f64) -> Self {
        Tolerance { mode: ToleranceMode::Ppm, value }
    }

    pub fn validate(&self) -> Result<()> {
        if self.value.is_finite() && self.value > 0.0 {
            Ok(())
        } else {
            Err(SpectrumError::InvalidConfig(format!(
                "tolerance must be positive and finite, got {}",
                self
            )))
        }
    }

    /// Half width of the window around `query`.
    pub fn delta(&self, query: f64) -> f64 {
        match self.mode {
            ToleranceMode::Da => self.value,
            ToleranceMode::Ppm => query.abs() * self.value * PPM,
        }
    }

    /// Inclusive bounds `[query - delta, query + delta]`.
    pub fn window(&self, query: f64) -> (f64, f64) {
        let delta = self.delta(query);
        (query - delta, query + delta)
    }

    pub fn contains(&self, query: f64, observed: f64) -> bool {
        let (low, high) = self.window(query);
        low <= observed && observed <= high
    }
}

impl Display for Tolerance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.mode {
            ToleranceMode::Da => write!(f, "{} Da", self.value),
            ToleranceMode::Ppm => write!(f, "{} ppm", self.value),
        }
    }
}

/// A peak found for a theoretical m/z; `mz_delta` is observed minus theoretical.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PeakMatch {
    pub index: usize,
    pub mz_delta: f64,
}

/// Finds peaks near query m/z values in an ascending m/z array.
#[derive(Clone, Copy, Debug)]
pub struct ToleranceMatcher<'a> {
    mz: &'a [f64],
    tolerance: Tolerance,
}

impl<'a> ToleranceMatcher<'a> {
    /// `mz` must be sorted ascending, as held by a `PeakArray`.
    pub fn new(mz: &'a [f64], tolerance: Tolerance) -> Result<Self> {
        tolerance.validate()?;
        Ok(ToleranceMatcher { mz, tolerance })
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    /// The closest peak inside the window of `query`.
    ///
    /// Equidistant candidates resolve to the lower index.
    ///
    /// # Example
    ///
    /// ```
    /// use msannotate::algorithm::tolerance::{Tolerance, ToleranceMatcher};
    ///
    /// let mz = [100.0, 200.0, 300.0];
    /// let matcher = ToleranceMatcher::new(&mz, Tolerance::da(0.5)).unwrap();
    /// let hit = matcher.closest(200.2).unwrap();
    /// assert_eq!(hit.index, 1);
    /// assert!((hit.mz_delta + 0.2).abs() < 1e-9);
    /// assert!(matcher.closest(250.0).is_none());
    /// ```
    pub fn closest(&self, query: f64) -> Option<PeakMatch> {
        if self.mz.is_empty() || !query.is_finite() {
            return None;
        }

        let (low, high) = self.tolerance.window(query);
        let insertion = self.mz.partition_point(|&m| m < query);
        let mut best: Option<(usize, f64)> = None;

        let mut consider = |index: usize| {
            let observed = self.mz[index];
            if low <= observed && observed <= high {
                let distance = (observed - query).abs();
                if best.map_or(true, |(_, d)| distance < d) {
                    best = Some((index, distance));
                }
            }
        };

        if insertion > 0 {
            let mut left = insertion - 1;
            while left > 0 && self.mz[left - 1] == self.mz[left] {
                left -= 1;
            }
            consider(left);
        }
        if insertion < self.mz.len() {
            consider(insertion);
        }

        best.map(|(index, _)| PeakMatch {
            index,
            mz_delta: self.mz[index] - query,
        })
    }

    /// Index range of all peaks inside the window of `center`.
    pub fn within(&self, center: f64) -> Range<usize> {
        let (low, high) = self.tolerance.window(center);
        let start = self.mz.partition_point(|&m| m < low);
        let end = self.mz.partition_point(|&m| m <= high);
        start..end.max(start)
    }
}
