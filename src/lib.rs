//! Momentum-space Hamiltonians of tight-binding models.
//!
//! This crate turns real-space hoppings $\bra{i\bm 0}\hat H\ket{j\bm R}$, either assembled
//! by hand or read from a Wannier90 `_hr.dat`/`.wout` pair, into a closed-form
//! $H(\bm k)$, currently including:
//!
//! 1: Import Wannier90 hoppings and lattice vectors
//!
//! 2: Build $H(\bm k)$ in terms of $\bm a_n\cdot\bm k$ or of $k_x,k_y,k_z$, checking that it is hermitian and free of complex phases
//!
//! 3: Sample k-point paths for band-structure plots
//!
#![allow(non_snake_case)]
pub mod error;
pub mod fourier_expr;
pub mod generics;
pub mod hamk;
pub mod hopping;
pub mod kpoints;
pub mod model;
pub mod symbolic;
pub mod wannier90;

pub use crate::error::{HamiltonianForm, Result, TbError, ValidationIssue};
pub use crate::fourier_expr::{FourierExpr, Harmonic, Term};
pub use crate::generics::hop_use;
pub use crate::hamk::{
    BuildOptions, DEFAULT_PRECISION, HamiltonianK, build, build_expr, build_with,
};
pub use crate::hopping::{HoppingStore, LatticeDisplacement};
pub use crate::kpoints::{DEFAULT_PATH_SAMPLES, k_space_path};
pub use crate::model::{LatticeBasis, Orbital, TightBindingModel};
pub use crate::symbolic::{LinearForm, Symbol, Symbolic};
pub use crate::wannier90::{BOHR_TO_ANGSTROM, import_wannier90, parse_hr, parse_wout_lattice};
