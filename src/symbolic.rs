//! The symbolic capability the reciprocal-space builder is written against.
//!
//! The builder only ever needs phases that are real linear forms in a handful of
//! symbols ($\bm a_1\cdot\bm k$, ..., or $k_x$, ...), so [`LinearForm`] is the argument
//! type of every elementary function here. [`Symbolic`] is the seam: any expression type
//! implementing it can be handed to [`crate::hamk::build_expr`].
//! [`crate::fourier_expr::FourierExpr`] is the implementation shipped with the crate.
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use num_complex::Complex;
use serde::{Deserialize, Serialize};

/// Coefficients smaller than this are treated as exact zeros.
pub const ZERO_TOL: f64 = 1e-12;
/// Resolution used to decide whether two phases are the same.
const KEY_QUANTUM: f64 = 1e-9;

/// A named real symbol.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(name: &str) -> Self {
        Symbol(name.to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hashable image of a phase, quantized so that floating noise does not split terms.
pub type PhaseKey = Vec<(Symbol, i64)>;

/// $\sum_s c_s\, s$ with real coefficients.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinearForm {
    terms: BTreeMap<Symbol, f64>,
}

impl LinearForm {
    pub fn zero() -> Self {
        LinearForm::default()
    }

    pub fn symbol(s: &Symbol) -> Self {
        LinearForm::from_terms([(s.clone(), 1.0)])
    }

    pub fn from_terms<I: IntoIterator<Item = (Symbol, f64)>>(terms: I) -> Self {
        let mut form = LinearForm::zero();
        for (s, c) in terms {
            *form.terms.entry(s).or_insert(0.0) += c;
        }
        form.prune();
        form
    }

    fn prune(&mut self) {
        self.terms.retain(|_, c| c.abs() > ZERO_TOL);
    }

    pub fn coeff(&self, s: &Symbol) -> f64 {
        self.terms.get(s).copied().unwrap_or(0.0)
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &f64)> {
        self.terms.iter()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.terms.keys()
    }

    pub fn scaled(&self, factor: f64) -> LinearForm {
        LinearForm::from_terms(self.terms.iter().map(|(s, c)| (s.clone(), c * factor)))
    }

    pub fn neg(&self) -> LinearForm {
        self.scaled(-1.0)
    }

    pub fn plus(&self, other: &LinearForm) -> LinearForm {
        LinearForm::from_terms(
            self.terms
                .iter()
                .chain(other.terms.iter())
                .map(|(s, c)| (s.clone(), *c)),
        )
    }

    /// Replaces `s` by `value`.
    pub fn subs(&self, s: &Symbol, value: &LinearForm) -> LinearForm {
        match self.terms.get(s) {
            None => self.clone(),
            Some(c) => {
                let mut rest = self.clone();
                rest.terms.remove(s);
                rest.plus(&value.scaled(*c))
            }
        }
    }

    /// Orientation with a positive leading coefficient, and whether it had to be flipped.
    pub fn canonical(&self) -> (LinearForm, bool) {
        match self.terms.values().next() {
            Some(c) if *c < 0.0 => (self.neg(), true),
            _ => (self.clone(), false),
        }
    }

    pub fn key(&self) -> PhaseKey {
        self.terms
            .iter()
            .map(|(s, c)| (s.clone(), (c / KEY_QUANTUM).round() as i64))
            .filter(|(_, q)| *q != 0)
            .collect()
    }

    pub fn eval(&self, values: &HashMap<Symbol, f64>) -> Option<f64> {
        self.terms
            .iter()
            .map(|(s, c)| values.get(s).map(|v| c * v))
            .sum()
    }
}

impl fmt::Display for LinearForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        let pieces = self.terms.iter().map(|(s, c)| match *c {
            c if c == 1.0 => format!("{}", s),
            c if c == -1.0 => format!("-{}", s),
            c => format!("{}*{}", c, s),
        });
        write!(f, "{}", join_signed(pieces))
    }
}

/// Joins terms in the `a + b - c` style; pieces carry their own leading minus sign.
pub(crate) fn join_signed<I: IntoIterator<Item = String>>(pieces: I) -> String {
    let mut out = String::new();
    for (n, piece) in pieces.into_iter().enumerate() {
        if n == 0 {
            out.push_str(&piece);
        } else if let Some(rest) = piece.strip_prefix('-') {
            out.push_str(" - ");
            out.push_str(rest);
        } else {
            out.push_str(" + ");
            out.push_str(&piece);
        }
    }
    out
}

/// Expression capability needed by the Fourier-sum builder.
///
/// Every method returns a new expression; implementations are values, not handles to
/// shared state, so they can be built in parallel.
pub trait Symbolic: Clone + fmt::Display + fmt::Debug + Send + Sync {
    fn constant(value: Complex<f64>) -> Self;

    fn zero() -> Self {
        Self::constant(Complex::new(0.0, 0.0))
    }

    /// $e^{-i\varphi}$.
    fn exp_neg_i(phase: &LinearForm) -> Self;

    fn add(&self, other: &Self) -> Self;

    fn scale(&self, factor: Complex<f64>) -> Self;

    /// Rewrites exponentials as cosines and sines wherever the expression allows it.
    fn rewrite_cos(&self) -> Self;

    fn subs(&self, symbol: &Symbol, value: &LinearForm) -> Self;

    /// Complex conjugate, with every symbol taken as real.
    fn conj(&self) -> Self;

    /// Whether a complex exponential of a non-constant phase is left in the expression.
    fn has_complex_exp(&self) -> bool;

    fn approx_eq(&self, other: &Self, tol: f64) -> bool;

    fn free_symbols(&self) -> BTreeSet<Symbol>;

    /// Numeric value; `None` if a free symbol has no value.
    fn eval(&self, values: &HashMap<Symbol, f64>) -> Option<Complex<f64>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> Symbol {
        Symbol::new(name)
    }

    #[test]
    fn linear_form_drops_cancelled_terms() {
        let f = LinearForm::from_terms([(sym("kx"), 1.0), (sym("ky"), 2.0), (sym("kx"), -1.0)]);
        assert_eq!(f.coeff(&sym("kx")), 0.0);
        assert_eq!(f.symbols().count(), 1);
        assert!(LinearForm::symbol(&sym("kx")).plus(&LinearForm::symbol(&sym("kx")).neg()).is_zero());
    }

    #[test]
    fn substitution_expands_symbol() {
        let f = LinearForm::from_terms([(sym("a1k"), 2.0), (sym("a2k"), -1.0)]);
        let value = LinearForm::from_terms([(sym("kx"), 0.5), (sym("ky"), 1.5)]);
        let g = f.subs(&sym("a1k"), &value);
        assert_eq!(g.coeff(&sym("a1k")), 0.0);
        assert_eq!(g.coeff(&sym("kx")), 1.0);
        assert_eq!(g.coeff(&sym("ky")), 3.0);
        assert_eq!(g.coeff(&sym("a2k")), -1.0);
    }

    #[test]
    fn canonical_orientation_and_key() {
        let f = LinearForm::from_terms([(sym("a1k"), -1.0), (sym("a2k"), 2.0)]);
        let (canon, flipped) = f.canonical();
        assert!(flipped);
        assert_eq!(canon.coeff(&sym("a1k")), 1.0);
        let noisy = LinearForm::from_terms([(sym("a1k"), 1.0 + 1e-13), (sym("a2k"), -2.0)]);
        assert_eq!(canon.key(), noisy.key());
    }

    #[test]
    fn display_and_eval() {
        let f = LinearForm::from_terms([(sym("kx"), 1.0), (sym("ky"), -1.0), (sym("kz"), 0.5)]);
        assert_eq!(f.to_string(), "kx - ky + 0.5*kz");
        let values: HashMap<Symbol, f64> =
            [(sym("kx"), 1.0), (sym("ky"), 2.0), (sym("kz"), 4.0)].into_iter().collect();
        assert_eq!(f.eval(&values), Some(1.0));
        assert_eq!(LinearForm::symbol(&sym("q")).eval(&values), None);
    }
}
