// chemistry module
pub mod chemistry {
    pub mod constants;
    pub mod elements;
    pub mod amino_acid;
    pub mod sum_formula;
    pub mod neutral_loss;
    pub mod unimod;
    pub mod modification;
    pub mod smiles;
}

// algorithm module
pub mod algorithm {
    pub mod tolerance;
    pub mod peptide;
    pub mod molecule;
    pub mod annotation;
}

// data module
pub mod data {
    pub mod peaks;
    pub mod peptide;
    pub mod annotation;
    pub mod spectrum;
}

pub mod config;
pub mod error;
