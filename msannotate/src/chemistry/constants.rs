// Purpose: To store constants that are used in the program
pub const MASS_PROTON: f64 = 1.007276466621; // Unified atomic mass unit
pub const MASS_ELECTRON: f64 = 0.00054857990946; // Unified atomic mass unit
pub const MASS_HYDROGEN: f64 = 1.00782503207; // Unified atomic mass unit
pub const MASS_WATER: f64 = 18.0105646863; // Unified atomic mass unit
pub const MASS_CO: f64 = 27.99491461956; // Unified atomic mass unit
pub const MASS_CO2: f64 = 43.98982923912; // Unified atomic mass unit
pub const MASS_NH3: f64 = 17.02654910101; // Unified atomic mass unit

// Spacing of the isotope envelope, 13C - 12C
pub const MASS_C13_DIFF: f64 = 1.00335483778;

pub const PPM: f64 = 1e-6;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_masses_are_consistent() {
        let oxygen = 15.99491461956;
        let nitrogen = 14.0030740048;
        assert!((MASS_WATER - (2.0 * MASS_HYDROGEN + oxygen)).abs() < 1e-8);
        assert!((MASS_CO2 - (MASS_CO + oxygen)).abs() < 1e-10);
        assert!((MASS_NH3 - (nitrogen + 3.0 * MASS_HYDROGEN)).abs() < 1e-8);
        assert!((MASS_HYDROGEN - MASS_PROTON - MASS_ELECTRON).abs() < 1e-6);
    }
}
