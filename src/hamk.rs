//! Closed-form Bloch Hamiltonian
//! $$H_{ij}(\bm k)=\sum_{\bm R}H_{ij}(\bm R)\,e^{-i\bm k\cdot\bm R},\qquad
//! \bm k\cdot\bm R=\sum_n R_n\,(\bm a_n\cdot\bm k).$$
//!
//! The hoppings are laid out on a dense window spanning every stored $\bm R$, each
//! cell gets its phase factor in terms of the placeholders `a1k`, `a2k`, `a3k`, and
//! the sum is rewritten with cosines and sines. The numerical form substitutes
//! $\bm a_n\cdot\bm k\to a_{n,x}k_x+a_{n,y}k_y+a_{n,z}k_z$.
//! $\bm a_n$ is row $n$ of the lattice matrix, as in
//! [`TightBindingModel::gen_ham`], not column $n$; on a cell whose lattice matrix is
//! not symmetric this differs from substituting the columns.
//!
//! Two checks guard the result: every element must satisfy
//! $H_{ij}=H^*_{ji}$, and no element may keep a complex exponential. A failure is not
//! an error of the input files, it is reported as a [`ValidationIssue`].
use std::collections::HashMap;
use std::fmt;

use log::debug;
use ndarray::prelude::*;
use num_complex::Complex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{HamiltonianForm, Result, TbError, ValidationIssue};
use crate::fourier_expr::FourierExpr;
use crate::generics::{round_complex, round_to};
use crate::model::TightBindingModel;
use crate::symbolic::{LinearForm, Symbol, Symbolic};

/// Decimal digits kept from hoppings and lattice vectors unless asked otherwise.
pub const DEFAULT_PRECISION: u32 = 6;
/// Coefficient tolerance of the hermiticity check.
pub const HERMITIAN_TOL: f64 = 1e-9;

const LATTICE_SYMBOLS: [&str; 3] = ["a1k", "a2k", "a3k"];
const CARTESIAN_SYMBOLS: [&str; 3] = ["kx", "ky", "kz"];

fn symbols(names: [&str; 3]) -> [Symbol; 3] {
    names.map(Symbol::new)
}

fn default_analytical() -> bool {
    true
}

fn default_precision() -> u32 {
    DEFAULT_PRECISION
}

/// Parameters of [`build_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Return the form in `a1k`, `a2k`, `a3k` instead of `kx`, `ky`, `kz`.
    #[serde(default = "default_analytical")]
    pub analytical: bool,
    /// Decimal digits kept, rounding half to even.
    #[serde(default = "default_precision")]
    pub precision: u32,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            analytical: default_analytical(),
            precision: default_precision(),
        }
    }
}

/// A $N\times N$ matrix of expressions in three real variables.
#[derive(Debug, Clone, PartialEq)]
pub struct HamiltonianK<E> {
    entries: Array2<E>,
    variables: [Symbol; 3],
    form: HamiltonianForm,
}

impl<E: Symbolic> HamiltonianK<E> {
    pub fn entries(&self) -> &Array2<E> {
        &self.entries
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&E> {
        self.entries.get([row, col])
    }

    /// `[a1k, a2k, a3k]` for the analytical form, `[kx, ky, kz]` for the numerical one.
    pub fn variables(&self) -> &[Symbol; 3] {
        &self.variables
    }

    pub fn form(&self) -> HamiltonianForm {
        self.form
    }

    pub fn norb(&self) -> usize {
        self.entries.nrows()
    }

    /// Numeric matrix with `values[n]` assigned to `variables()[n]`.
    pub fn evaluate(&self, values: &[f64]) -> Result<Array2<Complex<f64>>> {
        if values.len() != self.variables.len() {
            return Err(TbError::DimensionMismatch {
                context: "Hamiltonian variables".to_string(),
                expected: self.variables.len(),
                found: values.len(),
            });
        }
        let values: HashMap<Symbol, f64> = self
            .variables
            .iter()
            .cloned()
            .zip(values.iter().copied())
            .collect();
        let mut hamk = Array2::<Complex<f64>>::zeros(self.entries.raw_dim());
        for ((i, j), e) in self.entries.indexed_iter() {
            hamk[[i, j]] = match e.eval(&values) {
                Some(v) => v,
                None => {
                    return Err(TbError::DimensionMismatch {
                        context: format!("free symbols of H[{},{}]", i, j),
                        expected: self.variables.len(),
                        found: e.free_symbols().len(),
                    });
                }
            };
        }
        Ok(hamk)
    }
}

impl<E: Symbolic> fmt::Display for HamiltonianK<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Matrix([")?;
        for (i, row) in self.entries.outer_iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "[")?;
            for (j, e) in row.iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", e)?;
            }
            write!(f, "]")?;
        }
        write!(f, "])")
    }
}

/// Hoppings rounded to `precision` and placed on the window
/// $(2x_{\max}+1)\times(2y_{\max}+1)\times(2z_{\max}+1)\times N\times N$, centred on
/// $\bm R=0$.
fn hopping_window(model: &TightBindingModel, precision: u32) -> (Array5<Complex<f64>>, [usize; 3]) {
    let norb = model.norb();
    let max = model.hoppings().max_extent();
    let mut window = Array5::<Complex<f64>>::zeros((
        2 * max[0] + 1,
        2 * max[1] + 1,
        2 * max[2] + 1,
        norb,
        norb,
    ));
    for (R, ham) in model.hoppings().iter() {
        let [x, y, z] = R.0;
        let cell = (
            (x + max[0] as isize) as usize,
            (y + max[1] as isize) as usize,
            (z + max[2] as isize) as usize,
        );
        window
            .slice_mut(s![cell.0, cell.1, cell.2, .., ..])
            .assign(&ham.mapv(|t| round_complex(t, precision)));
    }
    (window, max)
}

/// The analytical form before any check.
fn fourier_sum<E: Symbolic>(model: &TightBindingModel, precision: u32) -> Array2<E> {
    let (window, max) = hopping_window(model, precision);
    let (nx, ny, nz, norb, _) = window.dim();
    debug!(
        "hopping window {}x{}x{} over {} orbitals",
        nx, ny, nz, norb
    );
    let lattice = symbols(LATTICE_SYMBOLS);
    let phases: Vec<E> = (0..nx * ny * nz)
        .into_par_iter()
        .map(|c| {
            let offset = [
                (c / (ny * nz)) as isize - max[0] as isize,
                ((c / nz) % ny) as isize - max[1] as isize,
                (c % nz) as isize - max[2] as isize,
            ];
            let phase = LinearForm::from_terms(
                lattice
                    .iter()
                    .cloned()
                    .zip(offset.iter().map(|r| *r as f64)),
            );
            E::exp_neg_i(&phase)
        })
        .collect();
    Array2::from_shape_fn((norb, norb), |(i, j)| {
        phases
            .iter()
            .enumerate()
            .map(|(c, phase)| (phase, window[[c / (ny * nz), (c / nz) % ny, c % nz, i, j]]))
            .filter(|(_, t)| t.norm() != 0.0)
            .fold(E::zero(), |acc, (phase, t)| acc.add(&phase.scale(t)))
            .rewrite_cos()
    })
}

/// $\bm a_n\cdot\bm k$ in Cartesian components, with $\bm a_n$ rounded to `precision`.
fn lattice_substitutions(model: &TightBindingModel, precision: u32) -> Vec<(Symbol, LinearForm)> {
    let cartesian = symbols(CARTESIAN_SYMBOLS);
    symbols(LATTICE_SYMBOLS)
        .into_iter()
        .enumerate()
        .map(|(n, a)| {
            let row = model.lat().vector(n);
            let form = LinearForm::from_terms(
                cartesian
                    .iter()
                    .cloned()
                    .zip(row.iter().map(|x| round_to(*x, precision))),
            );
            (a, form)
        })
        .collect()
}

fn check_hermitian<E: Symbolic>(entries: &Array2<E>, form: HamiltonianForm) -> Option<ValidationIssue> {
    let norb = entries.nrows();
    for row in 0..norb {
        for col in row..norb {
            if !entries[[row, col]].approx_eq(&entries[[col, row]].conj(), HERMITIAN_TOL) {
                return Some(ValidationIssue::NonHermitian { form, row, col });
            }
        }
    }
    None
}

fn check_residual_phase<E: Symbolic>(entries: &Array2<E>, form: HamiltonianForm) -> Option<ValidationIssue> {
    entries
        .indexed_iter()
        .find(|(_, e)| e.has_complex_exp())
        .map(|((row, col), _)| ValidationIssue::ResidualPhase { form, row, col })
}

/// Builds $H(\bm k)$ with any expression type.
///
/// Both forms are always built and checked, hermiticity first; the first issue found
/// is returned.
pub fn build_expr<E: Symbolic>(
    model: &TightBindingModel,
    options: &BuildOptions,
) -> std::result::Result<HamiltonianK<E>, ValidationIssue> {
    let precision = options.precision;
    let analytical = fourier_sum::<E>(model, precision);
    let subs = lattice_substitutions(model, precision);
    let numerical = analytical.map(|e| {
        subs.iter()
            .fold(e.clone(), |acc, (a, form)| acc.subs(a, form))
    });

    let issue = check_hermitian(&analytical, HamiltonianForm::Analytical)
        .or_else(|| check_hermitian(&numerical, HamiltonianForm::Numerical))
        .or_else(|| check_residual_phase(&analytical, HamiltonianForm::Analytical))
        .or_else(|| check_residual_phase(&numerical, HamiltonianForm::Numerical));
    if let Some(issue) = issue {
        debug!("{}", issue);
        return Err(issue);
    }

    Ok(if options.analytical {
        HamiltonianK {
            entries: analytical,
            variables: symbols(LATTICE_SYMBOLS),
            form: HamiltonianForm::Analytical,
        }
    } else {
        HamiltonianK {
            entries: numerical,
            variables: symbols(CARTESIAN_SYMBOLS),
            form: HamiltonianForm::Numerical,
        }
    })
}

pub fn build_with(
    model: &TightBindingModel,
    options: &BuildOptions,
) -> std::result::Result<HamiltonianK<FourierExpr>, ValidationIssue> {
    build_expr(model, options)
}

/// Closed-form $H(\bm k)$ of `model`.
///
/// ```
/// use ndarray::*;
/// use rustb_hamk::*;
/// let mut chain = TightBindingModel::tb_model(Array2::eye(3), array![[0.0, 0.0, 0.0]]).unwrap();
/// chain.add_hop(-1.0, 0, 0, [1, 0, 0]).unwrap();
/// let hamk = build(&chain, false, DEFAULT_PRECISION).unwrap();
/// assert_eq!(hamk.to_string(), "Matrix([[-2*cos(kx)]])");
/// ```
pub fn build(
    model: &TightBindingModel,
    analytical: bool,
    precision: u32,
) -> std::result::Result<HamiltonianK<FourierExpr>, ValidationIssue> {
    build_with(
        model,
        &BuildOptions {
            analytical,
            precision,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hopping::{HoppingStore, LatticeDisplacement};
    use crate::model::{LatticeBasis, Orbital};
    use approx::assert_abs_diff_eq;

    fn c(re: f64, im: f64) -> Complex<f64> {
        Complex::new(re, im)
    }

    fn model_of(lat: LatticeBasis, store: HoppingStore) -> TightBindingModel {
        let orbitals = (0..store.norb())
            .map(|i| Orbital::new(Array1::zeros(3), &i.to_string()))
            .collect();
        TightBindingModel::from_parts(lat, store, orbitals).unwrap()
    }

    fn chain(t: f64) -> TightBindingModel {
        let mut store = HoppingStore::new(1);
        store.insert(LatticeDisplacement::ORIGIN, array![[c(0.0, 0.0)]]).unwrap();
        store.insert(LatticeDisplacement::new(1, 0, 0), array![[c(t, 0.0)]]).unwrap();
        store.insert(LatticeDisplacement::new(-1, 0, 0), array![[c(t, 0.0)]]).unwrap();
        model_of(LatticeBasis::identity(), store)
    }

    fn triangular() -> TightBindingModel {
        let lat = array![[1.0, 0.0, 0.0], [-0.5, 0.866025, 0.0], [0.0, 0.0, 2.0]];
        let orb = array![[0.0, 0.0, 0.0], [0.5, 0.5, 0.0]];
        let mut model = TightBindingModel::tb_model(lat, orb).unwrap();
        model.set_onsite(&array![0.25, -0.25]).unwrap();
        model.add_hop(c(0.3, -0.1), 0, 1, [0, 0, 0]).unwrap();
        model.add_hop(c(-0.2, 0.05), 0, 1, [1, 0, 0]).unwrap();
        model.add_hop(c(0.1, 0.3), 0, 1, [-1, 0, 0]).unwrap();
        model.add_hop(1.0, 0, 0, [1, 1, 0]).unwrap();
        model.add_hop(c(0.0, 0.5), 1, 1, [0, 1, 0]).unwrap();
        model.add_hop(-0.75, 1, 0, [0, 0, 1]).unwrap();
        model.add_hop(0.4, 1, 0, [0, 0, -1]).unwrap();
        model
    }

    #[test]
    fn chain_is_a_cosine() {
        let model = chain(-1.0);
        let hamk = build(&model, true, DEFAULT_PRECISION).unwrap();
        assert_eq!(hamk.form(), HamiltonianForm::Analytical);
        assert_eq!(hamk.get(0, 0).unwrap().to_string(), "-2*cos(a1k)");
        let hamk = build(&model, false, DEFAULT_PRECISION).unwrap();
        assert_eq!(hamk.form(), HamiltonianForm::Numerical);
        assert_eq!(hamk.to_string(), "Matrix([[-2*cos(kx)]])");
        assert_eq!(
            hamk.variables(),
            &[Symbol::new("kx"), Symbol::new("ky"), Symbol::new("kz")]
        );
        let hamk = build(&chain(0.5), false, DEFAULT_PRECISION).unwrap();
        assert_eq!(hamk.to_string(), "Matrix([[cos(kx)]])");
    }

    #[test]
    fn home_cell_only_is_k_independent() {
        let mut store = HoppingStore::new(2);
        let h0 = array![[c(1.0, 0.0), c(0.5, -0.5)], [c(0.5, 0.5), c(-1.0, 0.0)]];
        store.insert(LatticeDisplacement::ORIGIN, h0.clone()).unwrap();
        let model = model_of(LatticeBasis::identity(), store);
        let hamk = build(&model, false, DEFAULT_PRECISION).unwrap();
        assert!(hamk.entries().iter().all(|e| e.terms().is_empty()));
        for k in [[0.0, 0.0, 0.0], [0.3, -1.2, 2.0]] {
            assert_eq!(hamk.evaluate(&k).unwrap(), h0);
        }
    }

    #[test]
    fn hermitian_store_passes_at_every_precision() {
        let model = triangular();
        assert!(model.hoppings().is_hermitian(1e-12));
        for precision in 1..=8 {
            for analytical in [true, false] {
                let hamk = build(&model, analytical, precision);
                assert!(hamk.is_ok(), "precision {}: {:?}", precision, hamk.err());
            }
        }
    }

    #[test]
    fn precision_beyond_f64_resolution() {
        let model = chain(-1.0);
        for precision in [15, 300, 309, 400, u32::MAX] {
            let hamk = build(&model, true, precision).unwrap();
            assert_eq!(hamk.to_string(), "Matrix([[-2*cos(a1k)]])");
        }
    }

    #[test]
    fn closed_form_matches_direct_sum() {
        let model = triangular();
        let analytical = build(&model, true, 8).unwrap();
        let numerical = build(&model, false, 8).unwrap();
        for k in [[0.0, 0.0, 0.0], [0.4, -1.1, 0.3], [2.5, 1.7, -0.9]] {
            let kvec = arr1(&k);
            let expected = model.gen_ham(&kvec).unwrap();
            let ak = model.lat().lat().dot(&kvec);
            let from_symbols = analytical.evaluate(ak.as_slice().unwrap()).unwrap();
            let from_cartesian = numerical.evaluate(&k).unwrap();
            for ((got_a, got_n), want) in from_symbols.iter().zip(from_cartesian.iter()).zip(expected.iter()) {
                assert_abs_diff_eq!(got_a.re, want.re, epsilon = 1e-10);
                assert_abs_diff_eq!(got_a.im, want.im, epsilon = 1e-10);
                assert_abs_diff_eq!(got_n.re, want.re, epsilon = 1e-10);
                assert_abs_diff_eq!(got_n.im, want.im, epsilon = 1e-10);
            }
        }
        assert!(numerical.evaluate(&[0.0, 0.0]).is_err());
    }

    #[test]
    fn missing_partner_is_not_hermitian() {
        let mut store = HoppingStore::new(1);
        store.insert(LatticeDisplacement::new(1, 0, 0), array![[c(1.0, 0.0)]]).unwrap();
        let model = model_of(LatticeBasis::identity(), store);
        let issue = build(&model, true, DEFAULT_PRECISION).unwrap_err();
        assert_eq!(
            issue,
            ValidationIssue::NonHermitian {
                form: HamiltonianForm::Analytical,
                row: 0,
                col: 0
            }
        );
    }

    #[test]
    fn corner_gauge_graphene_keeps_a_phase() {
        let lat = array![[1.0, 0.0, 0.0], [-0.5, 0.866025, 0.0], [0.0, 0.0, 1.0]];
        let mut model = TightBindingModel::tb_model(lat, Array2::zeros((2, 3))).unwrap();
        for R in [[0, 0, 0], [-1, 0, 0], [0, -1, 0]] {
            model.add_hop(-1.0, 0, 1, R).unwrap();
        }
        let issue = build(&model, false, DEFAULT_PRECISION).unwrap_err();
        assert_eq!(
            issue,
            ValidationIssue::ResidualPhase {
                form: HamiltonianForm::Analytical,
                row: 0,
                col: 1
            }
        );
        assert_eq!(issue.position(), (0, 1));
    }

    #[test]
    fn empty_store_gives_zero_matrix() {
        let model = model_of(LatticeBasis::identity(), HoppingStore::new(2));
        let hamk = build(&model, true, DEFAULT_PRECISION).unwrap();
        assert_eq!(hamk.norb(), 2);
        assert_eq!(hamk.to_string(), "Matrix([[0, 0], [0, 0]])");
        assert_eq!(
            hamk.evaluate(&[1.0, 2.0, 3.0]).unwrap(),
            Array2::<Complex<f64>>::zeros((2, 2))
        );
    }

    #[test]
    fn rounding_is_applied_before_the_sum() {
        let mut model = TightBindingModel::tb_model(Array2::eye(3), array![[0.0, 0.0, 0.0]]).unwrap();
        model.add_hop(-0.123456789, 0, 0, [0, 1, 0]).unwrap();
        let hamk = build(&model, false, 3).unwrap();
        assert_eq!(hamk.to_string(), "Matrix([[-0.246*cos(ky)]])");
    }

    #[test]
    fn options_from_json() {
        let options: BuildOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, BuildOptions::default());
        assert!(options.analytical);
        assert_eq!(options.precision, DEFAULT_PRECISION);
        let options: BuildOptions = serde_json::from_str(r#"{"analytical": false, "precision": 3}"#).unwrap();
        let hamk = build_with(&chain(-1.0), &options).unwrap();
        assert_eq!(hamk.form(), HamiltonianForm::Numerical);
    }
}
