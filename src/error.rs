//! src/error.rs
//! Error types for the whole crate.
//!
//! Hard failures (unreadable or malformed input, inconsistent shapes) are reported
//! through [`TbError`]. The Hamiltonian builder never fails hard on physics grounds;
//! its two validity checks return a [`ValidationIssue`] instead, see [`crate::hamk`].

use std::fmt;

use num_complex::Complex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The primary error type for all fallible operations in this library.
#[derive(Error, Debug)]
pub enum TbError {
    // --- I/O and Parsing Errors ---
    #[error("I/O error on '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse data from file '{file}': {message}")]
    FileParse { file: String, message: String },

    #[error("Marker '{marker}' not found in '{file}'")]
    MissingMarker { file: String, marker: &'static str },

    #[error("Unrecognized length unit in '{file}': '{line}'")]
    UnknownUnit { file: String, line: String },

    #[error("'{file}' declares {expected} {what}, but {found} were found")]
    RecordCountMismatch {
        file: String,
        what: &'static str,
        expected: usize,
        found: usize,
    },

    // --- Invalid Input and Arguments ---
    #[error("Dimension mismatch for '{context}': expected {expected}, got {found}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    #[error("Orbital index {index} is out of range for a model with {norb} orbitals")]
    OrbitalIndexOutOfRange { index: usize, norb: usize },

    #[error("Invalid number of k-points per segment: {0}. Must be >= 1.")]
    InvalidPathSamples(usize),

    // --- Model Consistency and Physics Errors ---
    #[error("On-site hopping energy must be a real number, but got {0}")]
    OnsiteHoppingMustBeReal(Complex<f64>),
}

/// A specialized `Result` type for this library's operations.
pub type Result<T> = std::result::Result<T, TbError>;

/// Which of the two Hamiltonians produced by the builder an issue refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HamiltonianForm {
    /// Expressed in the lattice placeholders `a1k`, `a2k`, `a3k`.
    Analytical,
    /// Expressed in the Cartesian components `kx`, `ky`, `kz`.
    Numerical,
}

impl fmt::Display for HamiltonianForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HamiltonianForm::Analytical => write!(f, "analytical"),
            HamiltonianForm::Numerical => write!(f, "numerical"),
        }
    }
}

/// Soft failure of the reciprocal-space builder.
///
/// The Hamiltonian was constructed but is not usable as is. Callers usually retry
/// with a different precision or unit cell.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationIssue {
    #[error("The resulting {form} Hamiltonian is not hermitian: H[{row},{col}] != conj(H[{col},{row}])")]
    NonHermitian {
        form: HamiltonianForm,
        row: usize,
        col: usize,
    },

    #[error(
        "The {form} Hamiltonian element H[{row},{col}] has a complex exponential. \
         Choosing a different unit cell could make the expression real."
    )]
    ResidualPhase {
        form: HamiltonianForm,
        row: usize,
        col: usize,
    },
}

impl ValidationIssue {
    /// The offending `(row, col)` pair.
    pub fn position(&self) -> (usize, usize) {
        match *self {
            ValidationIssue::NonHermitian { row, col, .. }
            | ValidationIssue::ResidualPhase { row, col, .. } => (row, col),
        }
    }

    pub fn form(&self) -> HamiltonianForm {
        match *self {
            ValidationIssue::NonHermitian { form, .. }
            | ValidationIssue::ResidualPhase { form, .. } => form,
        }
    }
}
