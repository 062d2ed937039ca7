use ndarray::prelude::*;

use crate::error::{Result, TbError};

/// Default number of k-points per path segment.
pub const DEFAULT_PATH_SAMPLES: usize = 101;

/// Samples straight segments through reciprocal space, for band-structure plots.
///
/// Each `(start, end)` pair gives `num` points from `start` to `end` inclusive, so the
/// shared node between two segments appears twice. The second array is the distance
/// travelled along the path, measured after mapping every vector through `cell`
/// ($\bm k\to\bm k\cdot$`cell`, the identity if `None`); the nodes are found at
/// `dist[num-1..]` in steps of `num`.
#[allow(non_snake_case)]
pub fn k_space_path(
    paths: &[([f64; 3], [f64; 3])],
    num: usize,
    cell: Option<&Array2<f64>>,
) -> Result<(Array2<f64>, Array1<f64>)> {
    if num == 0 {
        return Err(TbError::InvalidPathSamples(num));
    }
    let cell = match cell {
        Some(cell) => {
            if cell.shape() != [3, 3] {
                return Err(TbError::DimensionMismatch {
                    context: "path cell".to_string(),
                    expected: 3,
                    found: if cell.nrows() != 3 { cell.nrows() } else { cell.ncols() },
                });
            }
            cell.clone()
        }
        None => Array2::eye(3),
    };
    let x: Array1<f64> = if num == 1 {
        Array1::zeros(1)
    } else {
        Array1::linspace(0.0, 1.0, num)
    };

    let mut k_vec = Array2::<f64>::zeros((paths.len() * num, 3));
    let mut k_dist = Array1::<f64>::zeros(paths.len() * num);
    let mut cur_dist = 0.0;
    for (n, (k_i, k_f)) in paths.iter().enumerate() {
        let k_i = arr1(k_i);
        let dk = arr1(k_f) - &k_i;
        let dk_abs = dk.dot(&cell);
        let dklen = dk_abs.dot(&dk_abs).sqrt();
        for (j, frac) in x.iter().enumerate() {
            k_vec.row_mut(n * num + j).assign(&(&k_i + &(*frac * &dk)));
            k_dist[[n * num + j]] = cur_dist + frac * dklen;
        }
        cur_dist = k_dist[[n * num + num - 1]];
    }
    Ok((k_vec, k_dist))
}
