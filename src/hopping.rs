//! Real-space hopping data: $\bra{i\bm 0}\hat H\ket{j\bm R}$ indexed by the lattice
//! displacement $\bm R$.
use std::collections::HashMap;
use std::collections::hash_map;
use std::fmt;
use std::ops::Neg;

use ndarray::linalg::kron;
use ndarray::prelude::*;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TbError};

/// Unit-cell offset $\bm R$ in units of the lattice vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LatticeDisplacement(pub [isize; 3]);

impl LatticeDisplacement {
    /// The home cell $\bm R=0$, which carries the onsite terms.
    pub const ORIGIN: LatticeDisplacement = LatticeDisplacement([0, 0, 0]);

    pub fn new(x: isize, y: isize, z: isize) -> Self {
        LatticeDisplacement([x, y, z])
    }

    #[inline(always)]
    pub fn is_origin(&self) -> bool {
        self.0 == [0, 0, 0]
    }

    pub fn to_array(&self) -> Array1<isize> {
        arr1(&self.0)
    }
}

impl Neg for LatticeDisplacement {
    type Output = LatticeDisplacement;
    fn neg(self) -> Self::Output {
        let [x, y, z] = self.0;
        LatticeDisplacement([-x, -y, -z])
    }
}

impl From<[isize; 3]> for LatticeDisplacement {
    fn from(r: [isize; 3]) -> Self {
        LatticeDisplacement(r)
    }
}

impl fmt::Display for LatticeDisplacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z] = self.0;
        write!(f, "({}, {}, {})", x, y, z)
    }
}

/// Sparse set of hopping matrices, one `norb`$\times$`norb` block per displacement.
///
/// Displacements that are not stored are zero. Nothing here depends on the order of
/// the keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoppingStore {
    norb: usize,
    hoppings: HashMap<LatticeDisplacement, Array2<Complex<f64>>>,
}

impl HoppingStore {
    pub fn new(norb: usize) -> Self {
        HoppingStore {
            norb,
            hoppings: HashMap::new(),
        }
    }

    #[inline(always)]
    pub fn norb(&self) -> usize {
        self.norb
    }

    /// Number of stored displacements.
    #[allow(non_snake_case)]
    #[inline(always)]
    pub fn nR(&self) -> usize {
        self.hoppings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hoppings.is_empty()
    }

    pub fn get(&self, R: &LatticeDisplacement) -> Option<&Array2<Complex<f64>>> {
        self.hoppings.get(R)
    }

    pub fn contains(&self, R: &LatticeDisplacement) -> bool {
        self.hoppings.contains_key(R)
    }

    pub fn iter(&self) -> hash_map::Iter<'_, LatticeDisplacement, Array2<Complex<f64>>> {
        self.hoppings.iter()
    }

    pub fn displacements(&self) -> impl Iterator<Item = &LatticeDisplacement> {
        self.hoppings.keys()
    }

    fn check_shape(&self, context: &str, matrix: &Array2<Complex<f64>>) -> Result<()> {
        for len in matrix.shape() {
            if *len != self.norb {
                return Err(TbError::DimensionMismatch {
                    context: context.to_string(),
                    expected: self.norb,
                    found: *len,
                });
            }
        }
        Ok(())
    }

    /// Stores `matrix` as $H(\bm R)$, replacing any previous block. The hermitian
    /// partner at $-\bm R$ is not touched.
    #[allow(non_snake_case)]
    pub fn insert(
        &mut self,
        R: LatticeDisplacement,
        matrix: Array2<Complex<f64>>,
    ) -> Result<Option<Array2<Complex<f64>>>> {
        self.check_shape("hopping matrix", &matrix)?;
        Ok(self.hoppings.insert(R, matrix))
    }

    /// Mutable access to $H(\bm R)$, creating a zero block if absent.
    #[allow(non_snake_case)]
    pub(crate) fn entry_mut(&mut self, R: LatticeDisplacement) -> &mut Array2<Complex<f64>> {
        let norb = self.norb;
        self.hoppings
            .entry(R)
            .or_insert_with(|| Array2::zeros((norb, norb)))
    }

    /// Adds a local term to the $\bm R=0$ block.
    pub fn add_local(&mut self, local: &Array2<Complex<f64>>) -> Result<()> {
        self.check_shape("local term", local)?;
        *self.entry_mut(LatticeDisplacement::ORIGIN) += local;
        Ok(())
    }

    /// Doubles the orbital space as $I_2\otimes H(\bm R)$. The two spin blocks are
    /// identical copies and are not coupled.
    pub fn extend_to_spin(&self) -> HoppingStore {
        let eye: Array2<Complex<f64>> = Array2::eye(2);
        let hoppings = self
            .hoppings
            .iter()
            .map(|(R, ham)| (*R, kron(&eye, ham)))
            .collect();
        HoppingStore {
            norb: 2 * self.norb,
            hoppings,
        }
    }

    /// Largest $|R_x|$, $|R_y|$, $|R_z|$ over the stored displacements.
    pub fn max_extent(&self) -> [usize; 3] {
        self.hoppings.keys().fold([0; 3], |mut acc, R| {
            for (a, r) in acc.iter_mut().zip(R.0.iter()) {
                *a = (*a).max(r.unsigned_abs());
            }
            acc
        })
    }

    /// Checks $H_{ij}(\bm R)=H^*_{ji}(-\bm R)$ for every stored block.
    ///
    /// A missing partner block counts as zero.
    #[allow(non_snake_case)]
    pub fn is_hermitian(&self, tol: f64) -> bool {
        let zero = Array2::<Complex<f64>>::zeros((self.norb, self.norb));
        self.hoppings.iter().all(|(R, ham)| {
            let partner = self.hoppings.get(&-*R).unwrap_or(&zero);
            ham.iter()
                .zip(partner.t().iter())
                .all(|(a, b)| (a - b.conj()).norm() <= tol)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: f64, im: f64) -> Complex<f64> {
        Complex::new(re, im)
    }

    #[test]
    fn displacement_is_a_value_key() {
        let mut store = HoppingStore::new(1);
        store
            .insert(LatticeDisplacement::new(1, -2, 0), array![[c(1.0, 0.0)]])
            .unwrap();
        assert!(store.contains(&LatticeDisplacement::from([1, -2, 0])));
        assert!(!store.contains(&LatticeDisplacement::new(-1, 2, 0)));
        assert_eq!(-LatticeDisplacement::new(1, -2, 0), LatticeDisplacement::new(-1, 2, 0));
    }

    #[test]
    fn insert_rejects_wrong_shape() {
        let mut store = HoppingStore::new(2);
        let err = store
            .insert(LatticeDisplacement::ORIGIN, Array2::zeros((3, 3)))
            .unwrap_err();
        assert!(matches!(err, TbError::DimensionMismatch { expected: 2, found: 3, .. }));
    }

    #[test]
    fn add_local_creates_origin_block() {
        let mut store = HoppingStore::new(2);
        store
            .insert(LatticeDisplacement::new(1, 0, 0), Array2::zeros((2, 2)))
            .unwrap();
        let local = array![[c(0.5, 0.0), c(0.0, 0.0)], [c(0.0, 0.0), c(-0.5, 0.0)]];
        store.add_local(&local).unwrap();
        store.add_local(&local).unwrap();
        assert_eq!(store.get(&LatticeDisplacement::ORIGIN).unwrap(), &(&local * c(2.0, 0.0)));
        assert!(store.add_local(&Array2::zeros((1, 1))).is_err());
    }

    #[test]
    fn extend_to_spin_replicates_blocks() {
        let mut store = HoppingStore::new(2);
        let h = array![[c(1.0, 0.0), c(0.2, -0.3)], [c(0.4, 0.1), c(-1.0, 0.0)]];
        store.insert(LatticeDisplacement::new(0, 1, 0), h.clone()).unwrap();
        store.insert(LatticeDisplacement::ORIGIN, h.t().mapv(|x| x.conj())).unwrap();
        let spin = store.extend_to_spin();
        assert_eq!(spin.norb(), 4);
        assert_eq!(spin.nR(), 2);
        for (R, old) in store.iter() {
            let new = spin.get(R).unwrap();
            assert_eq!(new.slice(s![0..2, 0..2]), old.view());
            assert_eq!(new.slice(s![2..4, 2..4]), old.view());
            assert!(new.slice(s![0..2, 2..4]).iter().all(|x| *x == c(0.0, 0.0)));
            assert!(new.slice(s![2..4, 0..2]).iter().all(|x| *x == c(0.0, 0.0)));
        }
    }

    #[test]
    fn max_extent_uses_absolute_values() {
        let mut store = HoppingStore::new(1);
        assert_eq!(store.max_extent(), [0, 0, 0]);
        for R in [[0isize, 0, 0], [-3, 1, 0], [2, -1, 1]] {
            store.insert(R.into(), array![[c(1.0, 0.0)]]).unwrap();
        }
        assert_eq!(store.max_extent(), [3, 1, 1]);
    }

    #[test]
    fn hermiticity_of_store() {
        let mut store = HoppingStore::new(2);
        let t = array![[c(0.0, 0.0), c(1.0, 0.5)], [c(0.0, 0.0), c(0.0, 0.0)]];
        store.insert(LatticeDisplacement::new(1, 0, 0), t.clone()).unwrap();
        assert!(!store.is_hermitian(1e-9));
        store
            .insert(LatticeDisplacement::new(-1, 0, 0), t.t().mapv(|x| x.conj()))
            .unwrap();
        assert!(store.is_hermitian(1e-9));
    }
}
