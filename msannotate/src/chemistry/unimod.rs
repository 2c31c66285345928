use std::collections::HashMap;

// UNIMOD accession -> (PSI-MS name, monoisotopic mass delta)
pub fn unimod_modifications() -> HashMap<u32, (&'static str, f64)> {
    let mut map = HashMap::new();
    map.insert(1, ("Acetyl", 42.010565));
    map.insert(3, ("Biotin", 226.077598));
    map.insert(4, ("Carbamidomethyl", 57.021464));
    map.insert(5, ("Carbamyl", 43.005814));
    map.insert(7, ("Deamidated", 0.984016));
    map.insert(21, ("Phospho", 79.966331));
    map.insert(27, ("Glu->pyro-Glu", -18.010565));
    map.insert(28, ("Gln->pyro-Glu", -17.026549));
    map.insert(34, ("Methyl", 14.015650));
    map.insert(35, ("Oxidation", 15.994915));
    map.insert(36, ("Dimethyl", 28.031300));
    map.insert(37, ("Trimethyl", 42.046950));
    map.insert(43, ("HexNAc", 203.079373));
    map.insert(58, ("Propionyl", 56.026215));
    map.insert(64, ("Succinyl", 100.016044));
    map.insert(121, ("GG", 114.042927));
    map.insert(122, ("Formyl", 27.994915));
    map.insert(214, ("iTRAQ4plex", 144.102063));
    map.insert(312, ("Cysteinyl", 119.004099));
    map.insert(354, ("Nitro", 44.985078));
    map.insert(408, ("Glycosyl", 148.037173));
    map.insert(737, ("TMT6plex", 229.162932));
    map.insert(747, ("Malonyl", 86.000394));
    map.insert(1289, ("Butyryl", 70.041865));
    map.insert(1363, ("Crotonyl", 68.026215));
    map.insert(1848, ("Glutaryl", 114.031694));
    map.insert(1849, ("Hydroxyisobutyryl", 86.036779));
    map
}

/// Resolves a bracketed modification token to its mass delta.
///
/// Accepts `UNIMOD:<id>`, `U:<id>` and PSI-MS names (case insensitive). Numeric deltas
/// are handled by the sequence parser, not here.
///
/// # Example
///
/// ```
/// use msannotate::chemistry::unimod::modification_mass;
///
/// assert_eq!(modification_mass("UNIMOD:35"), Some(15.994915));
/// assert_eq!(modification_mass("U:21"), Some(79.966331));
/// assert_eq!(modification_mass("carbamidomethyl"), Some(57.021464));
/// assert_eq!(modification_mass("UNIMOD:999999"), None);
/// ```
pub fn modification_mass(token: &str) -> Option<f64> {
    let table = unimod_modifications();
    let accession = token
        .strip_prefix("UNIMOD:")
        .or_else(|| token.strip_prefix("U:"));

    match accession {
        Some(id) => id.parse::<u32>().ok().and_then(|id| table.get(&id)).map(|(_, mass)| *mass),
        None => table
            .values()
            .find(|(name, _)| name.eq_ignore_ascii_case(token))
            .map(|(_, mass)| *mass),
    }
}
