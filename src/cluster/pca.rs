//! Principal component scores of the sparse expression matrix.
//!
//! Power iteration with Gram-Schmidt deflation on the implicitly mean-centred matrix. The
//! matrix itself is never densified; both multiplications stream over the stored triplets
//! and the centring term is applied analytically.

use nalgebra_sparse::CsrMatrix;
use ndarray::{Array1, Array2};

use crate::rng::SimpleRng;

const POWER_ITERATIONS: usize = 50;
const CONVERGENCE_TOL: f64 = 1e-9;

/// Compute per-cell scores on the `n_components` leading principal components.
///
/// The requested component count is clamped to the rank bound `min(n_cells - 1, n_genes)`
/// so tiny inputs stay valid. Rank-deficient directions come back as zero columns.
pub fn principal_component_scores(
    matrix: &CsrMatrix<f64>,
    n_components: usize,
    seed: u64,
) -> Array2<f64> {
    let n_cells = matrix.nrows();
    let n_genes = matrix.ncols();
    let k = n_components
        .min(n_genes)
        .min(n_cells.saturating_sub(1))
        .max(1);

    let mut mean = Array1::<f64>::zeros(n_genes);
    for (_, gene, &value) in matrix.triplet_iter() {
        mean[gene] += value;
    }
    if n_cells > 0 {
        mean /= n_cells as f64;
    }

    // u = (X - 1 mu^T) v, streamed over the stored entries
    let right_mul = |v: &Array1<f64>| -> Array1<f64> {
        let mut u = Array1::<f64>::zeros(n_cells);
        for (cell, gene, &value) in matrix.triplet_iter() {
            u[cell] += value * v[gene];
        }
        let shift = mean.dot(v);
        u -= shift;
        u
    };

    // w = (X - 1 mu^T)^T u
    let left_mul = |u: &Array1<f64>| -> Array1<f64> {
        let mut w = Array1::<f64>::zeros(n_genes);
        for (cell, gene, &value) in matrix.triplet_iter() {
            w[gene] += value * u[cell];
        }
        let total: f64 = u.sum();
        w.scaled_add(-total, &mean);
        w
    };

    let mut rng = SimpleRng::new(seed);
    let mut components: Vec<Array1<f64>> = Vec::with_capacity(k);

    for _ in 0..k {
        let mut v = Array1::from_iter((0..n_genes).map(|_| rng.next_f64() - 0.5));
        orthogonalize(&mut v, &components);
        if !normalize(&mut v) {
            components.push(Array1::zeros(n_genes));
            continue;
        }

        let mut degenerate = false;
        for _ in 0..POWER_ITERATIONS {
            let u = right_mul(&v);
            let mut w = left_mul(&u);
            orthogonalize(&mut w, &components);
            if !normalize(&mut w) {
                degenerate = true;
                break;
            }
            let delta = (&w - &v).mapv(f64::abs).sum();
            v = w;
            if delta < CONVERGENCE_TOL {
                break;
            }
        }

        if degenerate {
            components.push(Array1::zeros(n_genes));
        } else {
            components.push(v);
        }
    }

    let mut scores = Array2::<f64>::zeros((n_cells, k));
    for (c, component) in components.iter().enumerate() {
        let column = right_mul(component);
        scores.column_mut(c).assign(&column);
    }
    scores
}

fn orthogonalize(v: &mut Array1<f64>, basis: &[Array1<f64>]) {
    for b in basis {
        let projection = v.dot(b);
        v.scaled_add(-projection, b);
    }
}

fn normalize(v: &mut Array1<f64>) -> bool {
    let norm = v.dot(v).sqrt();
    if norm < 1e-12 {
        return false;
    }
    *v /= norm;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra_sparse::CooMatrix;

    fn two_group_matrix() -> CsrMatrix<f64> {
        // 6 cells, 3 genes; gene 0 separates the first three cells from the rest,
        // gene 2 carries no signal
        let mut coo = CooMatrix::new(6, 3);
        for cell in 0..3 {
            coo.push(cell, 0, 8.0 + cell as f64 * 0.1);
            coo.push(cell, 2, 1.0);
        }
        for cell in 3..6 {
            coo.push(cell, 1, 8.0 + cell as f64 * 0.1);
            coo.push(cell, 2, 1.0);
        }
        CsrMatrix::from(&coo)
    }

    #[test]
    fn leading_component_separates_groups() {
        let scores = principal_component_scores(&two_group_matrix(), 2, 42);
        assert_eq!(scores.dim(), (6, 2));
        // the first component splits the groups by sign
        let first_sign = scores[[0, 0]].signum();
        for cell in 0..3 {
            assert_eq!(scores[[cell, 0]].signum(), first_sign);
        }
        for cell in 3..6 {
            assert_eq!(scores[[cell, 0]].signum(), -first_sign);
        }
    }

    #[test]
    fn scores_are_centred() {
        let scores = principal_component_scores(&two_group_matrix(), 2, 42);
        for c in 0..2 {
            let mean: f64 = scores.column(c).sum() / 6.0;
            assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn component_count_is_clamped() {
        let scores = principal_component_scores(&two_group_matrix(), 50, 42);
        // rank bound: min(n_cells - 1, n_genes) = 3
        assert_eq!(scores.dim(), (6, 3));

        let mut coo = CooMatrix::new(1, 2);
        coo.push(0, 0, 1.0);
        let single = CsrMatrix::from(&coo);
        let scores = principal_component_scores(&single, 10, 42);
        assert_eq!(scores.dim(), (1, 1));
        assert_abs_diff_eq!(scores[[0, 0]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn deterministic_for_equal_seeds() {
        let a = principal_component_scores(&two_group_matrix(), 3, 7);
        let b = principal_component_scores(&two_group_matrix(), 3, 7);
        assert_eq!(a, b);
    }
}
