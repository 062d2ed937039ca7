use ndarray::prelude::*;
use ndarray::Data;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TbError};
use crate::generics::hop_use;
use crate::hopping::{HoppingStore, LatticeDisplacement};

/// The three primitive lattice vectors, stored as the rows of a $3\times 3$ matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatticeBasis {
    lat: Array2<f64>,
}

impl LatticeBasis {
    pub fn new(lat: Array2<f64>) -> Result<Self> {
        for len in lat.shape() {
            if *len != 3 {
                return Err(TbError::DimensionMismatch {
                    context: "lattice basis".to_string(),
                    expected: 3,
                    found: *len,
                });
            }
        }
        Ok(LatticeBasis { lat })
    }

    pub fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        LatticeBasis { lat: arr2(&rows) }
    }

    pub fn identity() -> Self {
        LatticeBasis {
            lat: Array2::eye(3),
        }
    }

    /// The rows are $\bm a_1$, $\bm a_2$, $\bm a_3$.
    #[inline(always)]
    pub fn lat(&self) -> ArrayView2<'_, f64> {
        self.lat.view()
    }

    /// $\bm a_n$ in Cartesian components.
    pub fn vector(&self, n: usize) -> ArrayView1<'_, f64> {
        self.lat.row(n)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orbital {
    /// Fractional coordinates inside the unit cell.
    pub position: Array1<f64>,
    pub name: String,
}

impl Orbital {
    pub fn new(position: Array1<f64>, name: &str) -> Self {
        Orbital {
            position,
            name: name.to_string(),
        }
    }
}

/// A real-space tight-binding model: lattice, orbitals and $\bra{i\bm 0}\hat H\ket{j\bm R}$.
///
/// The reciprocal-space builder only reads it; every modification happens before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TightBindingModel {
    lat: LatticeBasis,
    hoppings: HoppingStore,
    orbitals: Vec<Orbital>,
}

impl TightBindingModel {
    /// An empty model, one orbital per row of `orb` (fractional coordinates), named
    /// by its index.
    ///
    /// ```
    /// use ndarray::*;
    /// use rustb_hamk::*;
    /// let lat = array![[1.0, 0.0, 0.0], [-0.5, 3_f64.sqrt() / 2.0, 0.0], [0.0, 0.0, 1.0]];
    /// let orb = array![[1.0 / 3.0, 2.0 / 3.0, 0.0], [2.0 / 3.0, 1.0 / 3.0, 0.0]];
    /// let mut graphene = TightBindingModel::tb_model(lat, orb).unwrap();
    /// graphene.add_hop(1.0, 0, 1, [0, 0, 0]).unwrap();
    /// assert_eq!(graphene.norb(), 2);
    /// ```
    pub fn tb_model(lat: Array2<f64>, orb: Array2<f64>) -> Result<Self> {
        let lat = LatticeBasis::new(lat)?;
        if orb.ncols() != 3 {
            return Err(TbError::DimensionMismatch {
                context: "orbital positions".to_string(),
                expected: 3,
                found: orb.ncols(),
            });
        }
        let orbitals = orb
            .outer_iter()
            .enumerate()
            .map(|(i, pos)| Orbital::new(pos.to_owned(), &i.to_string()))
            .collect::<Vec<_>>();
        let hoppings = HoppingStore::new(orbitals.len());
        Ok(TightBindingModel {
            lat,
            hoppings,
            orbitals,
        })
    }

    pub fn from_parts(
        lat: LatticeBasis,
        hoppings: HoppingStore,
        orbitals: Vec<Orbital>,
    ) -> Result<Self> {
        if orbitals.len() != hoppings.norb() {
            return Err(TbError::DimensionMismatch {
                context: "orbital list".to_string(),
                expected: hoppings.norb(),
                found: orbitals.len(),
            });
        }
        Ok(TightBindingModel {
            lat,
            hoppings,
            orbitals,
        })
    }

    #[inline(always)]
    pub fn norb(&self) -> usize {
        self.hoppings.norb()
    }

    #[allow(non_snake_case)]
    #[inline(always)]
    pub fn nR(&self) -> usize {
        self.hoppings.nR()
    }

    pub fn lat(&self) -> &LatticeBasis {
        &self.lat
    }

    pub fn hoppings(&self) -> &HoppingStore {
        &self.hoppings
    }

    pub fn orbitals(&self) -> &[Orbital] {
        &self.orbitals
    }

    fn check_orbital(&self, ind: usize) -> Result<()> {
        if ind >= self.norb() {
            return Err(TbError::OrbitalIndexOutOfRange {
                index: ind,
                norb: self.norb(),
            });
        }
        Ok(())
    }

    /// $\bra{i\bm 0}\hat H\ket{j\bm R}$ += tmp, together with its hermitian partner
    /// $\bra{j\bm 0}\hat H\ket{i,-\bm R}$ += tmp$^*$.
    ///
    /// An onsite term ($i=j$, $\bm R=0$) must be real and is added once.
    #[allow(non_snake_case)]
    pub fn add_hop<U: hop_use>(
        &mut self,
        tmp: U,
        ind_i: usize,
        ind_j: usize,
        R: [isize; 3],
    ) -> Result<()> {
        let tmp: Complex<f64> = tmp.to_complex();
        let R = LatticeDisplacement::from(R);
        self.check_orbital(ind_i)?;
        self.check_orbital(ind_j)?;
        if R.is_origin() && ind_i == ind_j {
            if tmp.im != 0.0 {
                return Err(TbError::OnsiteHoppingMustBeReal(tmp));
            }
            self.hoppings.entry_mut(R)[[ind_i, ind_i]] += tmp;
            return Ok(());
        }
        self.hoppings.entry_mut(R)[[ind_i, ind_j]] += tmp;
        self.hoppings.entry_mut(-R)[[ind_j, ind_i]] += tmp.conj();
        Ok(())
    }

    /// Overwrites the onsite energies.
    pub fn set_onsite(&mut self, onsite: &Array1<f64>) -> Result<()> {
        if onsite.len() != self.norb() {
            return Err(TbError::DimensionMismatch {
                context: "onsite energies".to_string(),
                expected: self.norb(),
                found: onsite.len(),
            });
        }
        let ham = self.hoppings.entry_mut(LatticeDisplacement::ORIGIN);
        for (i, e) in onsite.iter().enumerate() {
            ham[[i, i]] = Complex::new(*e, 0.0);
        }
        Ok(())
    }

    /// Adds a `norb`$\times$`norb` matrix to the $\bm R=0$ block.
    pub fn add_local(&mut self, local: &Array2<Complex<f64>>) -> Result<()> {
        self.hoppings.add_local(local)
    }

    /// Spinful copy of the model: $I_2\otimes H(\bm R)$, orbitals listed spin up first.
    pub fn extend_to_spin(&self) -> TightBindingModel {
        let orbitals = ["up", "dn"]
            .iter()
            .flat_map(|spin| {
                self.orbitals
                    .iter()
                    .map(move |o| Orbital::new(o.position.clone(), &format!("{}_{}", o.name, spin)))
            })
            .collect();
        TightBindingModel {
            lat: self.lat.clone(),
            hoppings: self.hoppings.extend_to_spin(),
            orbitals,
        }
    }

    /// Direct numeric Fourier sum
    /// $$H_{ij}(\bm k)=\sum_{\bm R}H_{ij}(\bm R)\,e^{-i\sum_n R_n\,\bm a_n\cdot\bm k},$$
    /// with $\bm k$ in Cartesian components.
    #[allow(non_snake_case)]
    pub fn gen_ham<S: Data<Elem = f64>>(&self, kvec: &ArrayBase<S, Ix1>) -> Result<Array2<Complex<f64>>> {
        if kvec.len() != 3 {
            return Err(TbError::DimensionMismatch {
                context: "k-vector".to_string(),
                expected: 3,
                found: kvec.len(),
            });
        }
        let ak: Array1<f64> = self.lat.lat().dot(kvec);
        let mut hamk = Array2::<Complex<f64>>::zeros((self.norb(), self.norb()));
        for (R, ham) in self.hoppings.iter() {
            let phase: f64 = R.0.iter().zip(ak.iter()).map(|(r, a)| *r as f64 * a).sum();
            hamk.scaled_add(Complex::new(0.0, -phase).exp(), ham);
        }
        Ok(hamk)
    }
}
