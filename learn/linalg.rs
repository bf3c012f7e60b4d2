use ndarray::{Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Axis, Data, Ix2, s};
use ndarray_linalg::{Eigh, SVD, UPLO};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinalgError {
    #[error("Symmetric eigendecomposition failed: {0}")]
    Eigendecomposition(ndarray_linalg::error::LinalgError),
    #[error("Singular value decomposition failed: {0}")]
    Svd(ndarray_linalg::error::LinalgError),
    #[error("SVD did not return the requested singular vectors")]
    MissingSingularVectors,
    #[error("Non-finite values (NaN or Infinity) found in {context}")]
    NonFinite { context: &'static str },
    #[error("Expected a square matrix, found {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
    #[error("Right-hand side has {found} rows, but the matrix has {expected}")]
    RhsMismatch { expected: usize, found: usize },
}

/// Minimum-norm least-squares solution together with the rank information
/// the solver used to obtain it.
#[derive(Clone, Debug)]
pub struct LeastSquaresSolution {
    pub solution: Array1<f64>,
    pub rank: usize,
    pub singular_values: Array1<f64>,
}

/// Resolves the relative singular value cutoff.
///
/// `None` selects machine epsilon scaled by the larger matrix dimension,
/// a negative ratio selects plain machine epsilon.
pub fn cutoff_ratio(rcond: Option<f64>, rows: usize, cols: usize) -> f64 {
    match rcond {
        None => f64::EPSILON * rows.max(cols) as f64,
        Some(ratio) if ratio < 0.0 => f64::EPSILON,
        Some(ratio) => ratio,
    }
}

pub fn all_finite<S: Data<Elem = f64>, D: ndarray::Dimension>(array: &ArrayBase<S, D>) -> bool {
    array.iter().all(|value| value.is_finite())
}

pub fn ensure_square<S: Data<Elem = f64>>(matrix: &ArrayBase<S, Ix2>) -> Result<usize, LinalgError> {
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return Err(LinalgError::NotSquare { rows, cols });
    }
    Ok(rows)
}

/// Largest absolute difference between `A[i, j]` and `A[j, i]`.
pub fn max_asymmetry(matrix: ArrayView2<f64>) -> f64 {
    let n = matrix.nrows().min(matrix.ncols());
    let mut worst = 0.0_f64;
    for i in 0..n {
        for j in (i + 1)..n {
            worst = worst.max((matrix[(i, j)] - matrix[(j, i)]).abs());
        }
    }
    worst
}

/// Copy of a square matrix with the strict upper triangle replaced by the
/// transpose of the lower one.
pub fn mirror_lower_triangle(matrix: ArrayView2<f64>) -> Array2<f64> {
    Array2::from_shape_fn(matrix.dim(), |(i, j)| {
        if i >= j { matrix[(i, j)] } else { matrix[(j, i)] }
    })
}

/// Full eigendecomposition of a symmetric matrix with the eigenpairs ordered
/// by descending eigenvalue. Only the lower triangle is read.
///
/// Ties keep the reverse of LAPACK's ascending order, so the later of two
/// equal eigenvalues comes first.
pub fn symmetric_eigen_descending(
    matrix: ArrayView2<f64>,
) -> Result<(Array1<f64>, Array2<f64>), LinalgError> {
    let n = ensure_square(&matrix)?;
    if !all_finite(&matrix) {
        return Err(LinalgError::NonFinite {
            context: "symmetric eigendecomposition input",
        });
    }
    if n == 0 {
        return Ok((Array1::zeros(0), Array2::zeros((0, 0))));
    }

    // ndarray-linalg may transpose row-major input before handing it to
    // LAPACK, which would flip the triangle `UPLO` selects.
    let symmetric = mirror_lower_triangle(matrix);
    let (values, vectors) = symmetric
        .eigh(UPLO::Lower)
        .map_err(LinalgError::Eigendecomposition)?;

    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| {
        values[j]
            .partial_cmp(&values[i])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(j.cmp(&i))
    });

    let sorted_values = Array1::from_iter(order.iter().map(|&idx| values[idx]));
    let sorted_vectors = vectors.select(Axis(1), &order);
    Ok((sorted_values, sorted_vectors))
}

/// Solves `A x = b` in the least-squares sense through the SVD of `A`.
///
/// Singular values `s_i <= ratio * s_max` are discarded, which yields the
/// minimum-norm solution whenever `A` is rank deficient or ill-conditioned.
pub fn lstsq(
    a: ArrayView2<f64>,
    b: ArrayView1<f64>,
    rcond: Option<f64>,
) -> Result<LeastSquaresSolution, LinalgError> {
    let (rows, cols) = a.dim();
    if b.len() != rows {
        return Err(LinalgError::RhsMismatch {
            expected: rows,
            found: b.len(),
        });
    }
    if !all_finite(&a) {
        return Err(LinalgError::NonFinite {
            context: "least-squares matrix",
        });
    }
    if !all_finite(&b) {
        return Err(LinalgError::NonFinite {
            context: "least-squares right-hand side",
        });
    }
    if rows == 0 || cols == 0 {
        return Ok(LeastSquaresSolution {
            solution: Array1::zeros(cols),
            rank: 0,
            singular_values: Array1::zeros(0),
        });
    }

    let (u, singular_values, vt) = a.svd(true, true).map_err(LinalgError::Svd)?;
    let u = u.ok_or(LinalgError::MissingSingularVectors)?;
    let vt = vt.ok_or(LinalgError::MissingSingularVectors)?;

    let k = singular_values.len();
    let s_max = singular_values.iter().fold(0.0_f64, |acc, &v| acc.max(v));
    let threshold = cutoff_ratio(rcond, rows, cols) * s_max;

    let mut scaled = Array1::<f64>::zeros(k);
    let mut rank = 0;
    for (idx, &value) in singular_values.iter().enumerate() {
        if value > threshold {
            scaled[idx] = u.column(idx).dot(&b) / value;
            rank += 1;
        }
    }

    let solution = vt.slice(s![..k, ..]).t().dot(&scaled);
    if !all_finite(&solution) {
        return Err(LinalgError::NonFinite {
            context: "least-squares solution",
        });
    }

    Ok(LeastSquaresSolution {
        solution,
        rank,
        singular_values,
    })
}
