//! Readers for the Wannier90 outputs `seedname_hr.dat` (hoppings) and `seedname.wout`
//! (lattice vectors).
//!
//! `seedname_hr.dat` needs `write_hr = true` in the Wannier90 input.
use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use log::{debug, info};
use ndarray::prelude::*;
use num_complex::Complex;

use crate::error::{Result, TbError};
use crate::hopping::{HoppingStore, LatticeDisplacement};
use crate::model::{LatticeBasis, Orbital, TightBindingModel};

/// Bohr radius in Angstrom.
pub const BOHR_TO_ANGSTROM: f64 = 0.5291772105638411;
/// Degeneracy weights per line in `seedname_hr.dat`.
const WEIGHTS_PER_LINE: usize = 15;
const LATTICE_MARKER: &str = "Lattice Vectors";

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| TbError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(content.lines().map(|l| l.to_string()).collect())
}

fn parse_field<T>(file: &str, token: Option<&str>, what: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let token = token.ok_or_else(|| TbError::FileParse {
        file: file.to_string(),
        message: format!("Missing {}", what),
    })?;
    token.parse::<T>().map_err(|e| TbError::FileParse {
        file: file.to_string(),
        message: format!("Failed to parse {} '{}': {}", what, token, e),
    })
}

/// Reads `seedname_hr.dat`.
///
/// Returns the hoppings, each block divided by the degeneracy of its Wigner-Seitz
/// point, and the number of Wannier functions.
///
/// Each block keeps the order of the file, where the first orbital column runs
/// fastest: the record with orbital columns `(m, n)` is stored at `[n-1, m-1]` of
/// block $\bm R$.
#[allow(non_snake_case)]
pub fn parse_hr<P: AsRef<Path>>(path: P) -> Result<(HoppingStore, usize)> {
    let path = path.as_ref();
    let file = path.display().to_string();
    let reads = read_lines(path)?;
    if reads.len() < 3 {
        return Err(TbError::FileParse {
            file,
            message: "Truncated header".to_string(),
        });
    }
    // reads[0] is the date stamp
    let nsta: usize = parse_field(&file, Some(reads[1].trim()), "number of Wannier functions")?;
    let n_R: usize = parse_field(&file, Some(reads[2].trim()), "number of R points")?;
    if nsta == 0 {
        return Err(TbError::FileParse {
            file,
            message: "No Wannier functions declared".to_string(),
        });
    }
    let Some(block) = nsta.checked_mul(nsta) else {
        return Err(TbError::FileParse {
            file,
            message: format!("{} Wannier functions is too many", nsta),
        });
    };

    let n_weight_lines = n_R.div_ceil(WEIGHTS_PER_LINE);
    let weight_end = (3 + n_weight_lines).min(reads.len());
    let weights = reads[3..weight_end]
        .iter()
        .flat_map(|line| line.split_whitespace())
        .map(|w| parse_field::<usize>(&file, Some(w), "degeneracy weight"))
        .collect::<Result<Vec<_>>>()?;
    if weights.len() != n_R {
        return Err(TbError::RecordCountMismatch {
            file,
            what: "degeneracy weights",
            expected: n_R,
            found: weights.len(),
        });
    }

    let records: Vec<&str> = reads[weight_end..]
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect();
    let Some(n_records) = n_R.checked_mul(block) else {
        return Err(TbError::FileParse {
            file,
            message: format!("{} R points of {} Wannier functions is too many", n_R, nsta),
        });
    };
    if records.len() != n_records {
        return Err(TbError::RecordCountMismatch {
            file,
            what: "hopping records",
            expected: n_records,
            found: records.len(),
        });
    }

    let mut store = HoppingStore::new(nsta);
    for (r, (weight, lines)) in weights.iter().zip(records.chunks(block)).enumerate() {
        if *weight == 0 {
            return Err(TbError::FileParse {
                file,
                message: format!("Zero degeneracy for R point {}", r),
            });
        }
        let mut R0: Option<LatticeDisplacement> = None;
        let mut ham = Array2::<Complex<f64>>::zeros((nsta, nsta));
        for line in lines.iter() {
            let mut string = line.split_whitespace();
            let mut R = [0isize; 3];
            for x in R.iter_mut() {
                *x = parse_field(&file, string.next(), "R vector component")?;
            }
            let R = LatticeDisplacement(R);
            match R0 {
                None => R0 = Some(R),
                Some(first) if first != R => {
                    return Err(TbError::FileParse {
                        file,
                        message: format!("R point {} mixes {} and {}", r, first, R),
                    });
                }
                _ => {}
            }
            let ind_i: usize = parse_field(&file, string.next(), "orbital index")?;
            let ind_j: usize = parse_field(&file, string.next(), "orbital index")?;
            let re: f64 = parse_field(&file, string.next(), "Hamiltonian real part")?;
            let im: f64 = parse_field(&file, string.next(), "Hamiltonian imaginary part")?;
            if ind_i == 0 || ind_i > nsta || ind_j == 0 || ind_j > nsta {
                return Err(TbError::FileParse {
                    file,
                    message: format!("Orbital pair ({}, {}) out of range 1..={}", ind_i, ind_j, nsta),
                });
            }
            ham[[ind_j - 1, ind_i - 1]] = Complex::new(re, im) / (*weight as f64);
        }
        if let Some(R) = R0 {
            if store.insert(R, ham)?.is_some() {
                return Err(TbError::FileParse {
                    file,
                    message: format!("R point {} appears twice", R),
                });
            }
        }
    }
    info!("read {} R points of {} Wannier functions from {}", n_R, nsta, file);
    Ok((store, nsta))
}

/// Reads the lattice vectors printed in `seedname.wout`, in Angstrom.
pub fn parse_wout_lattice<P: AsRef<Path>>(path: P) -> Result<LatticeBasis> {
    let path = path.as_ref();
    let file = path.display().to_string();
    let reads = read_lines(path)?;
    let idx = reads
        .iter()
        .position(|line| line.contains(LATTICE_MARKER))
        .ok_or_else(|| TbError::MissingMarker {
            file: file.clone(),
            marker: LATTICE_MARKER,
        })?;
    let unit = if reads[idx].contains("(Ang)") {
        1.0
    } else if reads[idx].contains("(Bohr)") {
        BOHR_TO_ANGSTROM
    } else {
        return Err(TbError::UnknownUnit {
            file,
            line: reads[idx].trim().to_string(),
        });
    };
    let mut lat = Array2::<f64>::zeros((3, 3));
    for i in 0..3 {
        let line = reads.get(idx + 1 + i).ok_or_else(|| TbError::FileParse {
            file: file.clone(),
            message: "Missing lattice vector line".to_string(),
        })?;
        // first column is the label a_1, a_2, a_3
        let mut string = line.split_whitespace().skip(1);
        for j in 0..3 {
            let x: f64 = parse_field(&file, string.next(), "lattice vector component")?;
            lat[[i, j]] = x * unit;
        }
    }
    debug!("lattice vectors from {} (unit factor {}):\n{}", file, unit, lat);
    LatticeBasis::new(lat)
}

/// Builds a model from `path/seed_hr.dat` and `path/seed.wout`.
///
/// With `extend_to_spin` each orbital is doubled as $I_2\otimes H(\bm R)$;
/// `add_local` is then added to the $\bm R=0$ block and must have the final size.
/// The orbitals are all placed at the origin and named by their index.
pub fn import_wannier90<P: AsRef<Path>>(
    seed: &str,
    path: P,
    extend_to_spin: bool,
    add_local: Option<&Array2<Complex<f64>>>,
) -> Result<TightBindingModel> {
    let path = path.as_ref();
    let (mut hoppings, mut nsta) = parse_hr(path.join(format!("{}_hr.dat", seed)))?;
    let lat = parse_wout_lattice(path.join(format!("{}.wout", seed)))?;

    if extend_to_spin {
        hoppings = hoppings.extend_to_spin();
        nsta *= 2;
    }
    if let Some(local) = add_local {
        hoppings.add_local(local)?;
    }
    let orbitals = (0..nsta)
        .map(|i| Orbital::new(Array1::zeros(3), &i.to_string()))
        .collect();
    TightBindingModel::from_parts(lat, hoppings, orbitals)
}
