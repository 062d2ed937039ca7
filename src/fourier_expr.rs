//! Finite Fourier series with linear phases,
//! $$c_0+\sum_t c_t\,f_t(\varphi_t),\qquad f_t\in\\{e^{-i\,\cdot},\cos,\sin\\}.$$
//!
//! This is everything a lattice Fourier sum can produce, which is why a small closed
//! representation is enough instead of a general computer-algebra system. Expressions
//! are kept canonical: like terms are merged, phases of `cos`/`sin` terms are oriented
//! with a positive leading coefficient, and vanishing terms are dropped.
//!
//! The builder only talks to the [`Symbolic`] trait; a binding to a full algebra
//! system can replace this type by implementing it and calling
//! [`crate::hamk::build_expr`].
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::symbolic::{LinearForm, PhaseKey, Symbol, Symbolic, ZERO_TOL, join_signed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Harmonic {
    Cos,
    Sin,
    /// $e^{-i\varphi}$
    Exp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub harmonic: Harmonic,
    pub phase: LinearForm,
    pub coeff: Complex<f64>,
}

impl Term {
    fn value(&self, values: &HashMap<Symbol, f64>) -> Option<Complex<f64>> {
        let x = self.phase.eval(values)?;
        Some(match self.harmonic {
            Harmonic::Cos => self.coeff * x.cos(),
            Harmonic::Sin => self.coeff * x.sin(),
            Harmonic::Exp => self.coeff * Complex::new(0.0, -x).exp(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FourierExpr {
    constant: Complex<f64>,
    terms: Vec<Term>,
}

impl FourierExpr {
    pub fn constant_part(&self) -> Complex<f64> {
        self.constant
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn is_zero(&self) -> bool {
        self.constant.norm() <= ZERO_TOL && self.terms.is_empty()
    }

    fn from_parts(constant: Complex<f64>, terms: Vec<Term>) -> Self {
        FourierExpr { constant, terms }.normalize()
    }

    fn normalize(self) -> Self {
        let mut constant = self.constant;
        let mut merged: BTreeMap<(Harmonic, PhaseKey), Term> = BTreeMap::new();
        for term in self.terms {
            if term.phase.is_zero() {
                // cos(0) = e^0 = 1, sin(0) = 0
                if term.harmonic != Harmonic::Sin {
                    constant += term.coeff;
                }
                continue;
            }
            let (phase, coeff) = match term.harmonic {
                Harmonic::Exp => (term.phase, term.coeff),
                Harmonic::Cos => (term.phase.canonical().0, term.coeff),
                Harmonic::Sin => {
                    let (phase, flipped) = term.phase.canonical();
                    (phase, if flipped { -term.coeff } else { term.coeff })
                }
            };
            merged
                .entry((term.harmonic, phase.key()))
                .and_modify(|t| t.coeff += coeff)
                .or_insert(Term {
                    harmonic: term.harmonic,
                    phase,
                    coeff,
                });
        }
        if constant.norm() <= ZERO_TOL {
            constant = Complex::new(0.0, 0.0);
        }
        let terms = merged
            .into_values()
            .filter(|t| t.coeff.norm() > ZERO_TOL)
            .collect();
        FourierExpr { constant, terms }
    }
}

fn format_coeff(c: Complex<f64>) -> String {
    if c.im == 0.0 {
        format!("{}", c.re)
    } else if c.re == 0.0 {
        format!("{}*I", c.im)
    } else if c.im < 0.0 {
        format!("({} - {}*I)", c.re, -c.im)
    } else {
        format!("({} + {}*I)", c.re, c.im)
    }
}

impl fmt::Display for FourierExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0");
        }
        let mut pieces = Vec::new();
        if self.constant.norm() > ZERO_TOL {
            pieces.push(format_coeff(self.constant));
        }
        for t in self.terms.iter() {
            let func = match t.harmonic {
                Harmonic::Cos => format!("cos({})", t.phase),
                Harmonic::Sin => format!("sin({})", t.phase),
                Harmonic::Exp => format!("exp(-I*({}))", t.phase),
            };
            let piece = if t.coeff == Complex::new(1.0, 0.0) {
                func
            } else if t.coeff == Complex::new(-1.0, 0.0) {
                format!("-{}", func)
            } else {
                format!("{}*{}", format_coeff(t.coeff), func)
            };
            pieces.push(piece);
        }
        write!(f, "{}", join_signed(pieces))
    }
}

impl Symbolic for FourierExpr {
    fn constant(value: Complex<f64>) -> Self {
        FourierExpr::from_parts(value, Vec::new())
    }

    fn exp_neg_i(phase: &LinearForm) -> Self {
        FourierExpr::from_parts(
            Complex::new(0.0, 0.0),
            vec![Term {
                harmonic: Harmonic::Exp,
                phase: phase.clone(),
                coeff: Complex::new(1.0, 0.0),
            }],
        )
    }

    fn add(&self, other: &Self) -> Self {
        let terms = self.terms.iter().chain(other.terms.iter()).cloned().collect();
        FourierExpr::from_parts(self.constant + other.constant, terms)
    }

    fn scale(&self, factor: Complex<f64>) -> Self {
        let terms = self
            .terms
            .iter()
            .map(|t| Term {
                coeff: t.coeff * factor,
                ..t.clone()
            })
            .collect();
        FourierExpr::from_parts(self.constant * factor, terms)
    }

    /// Pairs $c_+e^{-i\varphi}+c_-e^{i\varphi}$ into
    /// $(c_++c_-)\cos\varphi+i(c_--c_+)\sin\varphi$.
    ///
    /// An exponential whose partner $e^{+i\varphi}$ is absent has no real trigonometric
    /// form and is kept as is, unlike a blanket $e^{-i\varphi}=\cos\varphi-i\sin\varphi$
    /// rewrite. That surviving exponential is what
    /// [`Symbolic::has_complex_exp`] reports.
    fn rewrite_cos(&self) -> Self {
        let mut pairs: BTreeMap<PhaseKey, (LinearForm, Complex<f64>, Complex<f64>)> = BTreeMap::new();
        let mut terms = Vec::new();
        for t in self.terms.iter() {
            if t.harmonic != Harmonic::Exp {
                terms.push(t.clone());
                continue;
            }
            let (phase, flipped) = t.phase.canonical();
            let slot = pairs
                .entry(phase.key())
                .or_insert_with(|| (phase, Complex::new(0.0, 0.0), Complex::new(0.0, 0.0)));
            if flipped {
                slot.2 += t.coeff;
            } else {
                slot.1 += t.coeff;
            }
        }
        let li = Complex::new(0.0, 1.0);
        for (phase, plus, minus) in pairs.into_values() {
            match (plus.norm() > ZERO_TOL, minus.norm() > ZERO_TOL) {
                (true, true) => {
                    terms.push(Term {
                        harmonic: Harmonic::Cos,
                        phase: phase.clone(),
                        coeff: plus + minus,
                    });
                    terms.push(Term {
                        harmonic: Harmonic::Sin,
                        phase,
                        coeff: li * (minus - plus),
                    });
                }
                (true, false) => terms.push(Term {
                    harmonic: Harmonic::Exp,
                    phase,
                    coeff: plus,
                }),
                (false, true) => terms.push(Term {
                    harmonic: Harmonic::Exp,
                    phase: phase.neg(),
                    coeff: minus,
                }),
                (false, false) => {}
            }
        }
        FourierExpr::from_parts(self.constant, terms)
    }

    fn subs(&self, symbol: &Symbol, value: &LinearForm) -> Self {
        let terms = self
            .terms
            .iter()
            .map(|t| Term {
                phase: t.phase.subs(symbol, value),
                ..t.clone()
            })
            .collect();
        FourierExpr::from_parts(self.constant, terms)
    }

    fn conj(&self) -> Self {
        let terms = self
            .terms
            .iter()
            .map(|t| match t.harmonic {
                Harmonic::Exp => Term {
                    harmonic: Harmonic::Exp,
                    phase: t.phase.neg(),
                    coeff: t.coeff.conj(),
                },
                _ => Term {
                    coeff: t.coeff.conj(),
                    ..t.clone()
                },
            })
            .collect();
        FourierExpr::from_parts(self.constant.conj(), terms)
    }

    fn has_complex_exp(&self) -> bool {
        self.terms.iter().any(|t| t.harmonic == Harmonic::Exp)
    }

    fn approx_eq(&self, other: &Self, tol: f64) -> bool {
        let diff = self.add(&other.scale(Complex::new(-1.0, 0.0)));
        diff.constant.norm() <= tol && diff.terms.iter().all(|t| t.coeff.norm() <= tol)
    }

    fn free_symbols(&self) -> BTreeSet<Symbol> {
        self.terms
            .iter()
            .flat_map(|t| t.phase.symbols().cloned())
            .collect()
    }

    fn eval(&self, values: &HashMap<Symbol, f64>) -> Option<Complex<f64>> {
        self.terms
            .iter()
            .map(|t| t.value(values))
            .sum::<Option<Complex<f64>>>()
            .map(|s| s + self.constant)
    }
}
