/// Element data needed for structure parsing and mass calculation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Element {
    pub symbol: &'static str,
    /// Mass of the most abundant isotope.
    pub mono_isotopic_mass: f64,
    /// Nucleon count of the most abundant isotope.
    pub nominal_mass: u16,
    /// Allowed default valences in ascending order, empty where implicit hydrogens are never added.
    pub valences: &'static [u8],
}

const ELEMENTS: &[Element] = &[
    Element { symbol: "H", mono_isotopic_mass: 1.00782503207, nominal_mass: 1, valences: &[1] },
    Element { symbol: "B", mono_isotopic_mass: 11.0093054, nominal_mass: 11, valences: &[3] },
    Element { symbol: "C", mono_isotopic_mass: 12.0, nominal_mass: 12, valences: &[4] },
    Element { symbol: "N", mono_isotopic_mass: 14.0030740048, nominal_mass: 14, valences: &[3, 5] },
    Element { symbol: "O", mono_isotopic_mass: 15.99491461956, nominal_mass: 16, valences: &[2] },
    Element { symbol: "F", mono_isotopic_mass: 18.99840322, nominal_mass: 19, valences: &[1] },
    Element { symbol: "Na", mono_isotopic_mass: 22.9897692809, nominal_mass: 23, valences: &[] },
    Element { symbol: "Mg", mono_isotopic_mass: 23.985041700, nominal_mass: 24, valences: &[] },
    Element { symbol: "Si", mono_isotopic_mass: 27.9769265325, nominal_mass: 28, valences: &[] },
    Element { symbol: "P", mono_isotopic_mass: 30.97376163, nominal_mass: 31, valences: &[3, 5] },
    Element { symbol: "S", mono_isotopic_mass: 31.97207100, nominal_mass: 32, valences: &[2, 4, 6] },
    Element { symbol: "Cl", mono_isotopic_mass: 34.96885268, nominal_mass: 35, valences: &[1] },
    Element { symbol: "K", mono_isotopic_mass: 38.96370668, nominal_mass: 39, valences: &[] },
    Element { symbol: "Ca", mono_isotopic_mass: 39.96259098, nominal_mass: 40, valences: &[] },
    Element { symbol: "Fe", mono_isotopic_mass: 55.9349375, nominal_mass: 56, valences: &[] },
    Element { symbol: "Cu", mono_isotopic_mass: 62.9295975, nominal_mass: 63, valences: &[] },
    Element { symbol: "Zn", mono_isotopic_mass: 63.9291422, nominal_mass: 64, valences: &[] },
    Element { symbol: "Se", mono_isotopic_mass: 79.9165213, nominal_mass: 80, valences: &[] },
    Element { symbol: "Br", mono_isotopic_mass: 78.9183371, nominal_mass: 79, valences: &[1] },
    Element { symbol: "I", mono_isotopic_mass: 126.904473, nominal_mass: 127, valences: &[1] },
];

/// Nuclides besides the most abundant one that appear as isotope labels.
const ISOTOPES: &[(&str, u16, f64)] = &[
    ("H", 2, 2.01410177812),
    ("H", 3, 3.0160492779),
    ("B", 10, 10.0129369),
    ("C", 13, 13.00335483507),
    ("C", 14, 14.0032419884),
    ("N", 15, 15.00010889888),
    ("O", 17, 16.99913175650),
    ("O", 18, 17.99915961286),
    ("Mg", 25, 24.98583696),
    ("Mg", 26, 25.98259297),
    ("Si", 29, 28.9764946649),
    ("Si", 30, 29.973770136),
    ("P", 32, 31.97390765),
    ("S", 33, 32.97145876),
    ("S", 34, 33.96786690),
    ("S", 36, 35.96708076),
    ("Cl", 37, 36.96590259),
    ("K", 41, 40.96182576),
    ("Ca", 44, 43.9554818),
    ("Fe", 54, 53.9396105),
    ("Fe", 57, 56.9353940),
    ("Cu", 65, 64.9277895),
    ("Zn", 66, 65.9260334),
    ("Zn", 68, 67.9248442),
    ("Se", 78, 77.9173091),
    ("Br", 81, 80.9162906),
];

/// Looks up an element by its (case sensitive) symbol.
///
/// # Example
///
/// ```
/// use msannotate::chemistry::elements::element;
///
/// let carbon = element("C").unwrap();
/// assert_eq!(carbon.mono_isotopic_mass, 12.0);
/// assert!(element("Xx").is_none());
/// ```
pub fn element(symbol: &str) -> Option<&'static Element> {
    ELEMENTS.iter().find(|e| e.symbol == symbol)
}

/// Mass of the nuclide of `element` with `mass_number` nucleons, if known.
///
/// # Example
///
/// ```
/// use msannotate::chemistry::elements::{element, isotope_mass};
///
/// let hydrogen = element("H").unwrap();
/// assert_eq!(isotope_mass(hydrogen, 2), Some(2.01410177812));
/// assert_eq!(isotope_mass(hydrogen, 1), Some(hydrogen.mono_isotopic_mass));
/// assert_eq!(isotope_mass(hydrogen, 5), None);
/// ```
pub fn isotope_mass(element: &Element, mass_number: u16) -> Option<f64> {
    if mass_number == element.nominal_mass {
        return Some(element.mono_isotopic_mass);
    }
    ISOTOPES
        .iter()
        .find(|(symbol, a, _)| *symbol == element.symbol && *a == mass_number)
        .map(|&(_, _, mass)| mass)
}
