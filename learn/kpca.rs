//! # Kernel Principal Component Analysis
//!
//! Projects the elements behind a precomputed kernel matrix onto the three
//! leading kernel principal axes. The routine works on the Gram matrix only:
//! the kernel is doubly centered, which is the kernel-space equivalent of
//! subtracting the feature-space mean from every sample, then diagonalized.
//!
//! The projections follow a fixed sign convention, `x_k = -K f_k`, where
//! `f_k` is the eigenvector of the centered kernel with the k-th largest
//! eigenvalue. Note that the *uncentered* kernel is used for the product.

use crate::linalg::{self, LinalgError};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use thiserror::Error;

/// Number of principal axes returned by [`kpca`].
pub const KPCA_COMPONENTS: usize = 3;

/// Asymmetry above which the kernel is reported as suspicious. The solver
/// reads the lower triangle only, so the upper triangle is silently ignored.
const ASYMMETRY_WARN_TOLERANCE: f64 = 1.0e-8;

/// Relative gap under which two leading eigenvalues are reported as
/// near-degenerate; their axes are then not uniquely defined.
const DEGENERACY_WARN_TOLERANCE: f64 = 1.0e-10;

#[derive(Debug, Error)]
pub enum KpcaError {
    #[error("Kernel matrix must be square, found {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
    #[error("Kernel matrix is empty")]
    EmptyKernel,
    #[error("Kernel PCA needs at least {required} elements, found {found}")]
    TooFewElements { found: usize, required: usize },
    #[error("Linear algebra failure during kernel PCA: {0}")]
    Linalg(#[from] LinalgError),
}

/// Coordinates of every element along the three leading kernel principal
/// axes, together with the full spectrum of the centered kernel.
#[derive(Clone, Debug)]
pub struct KpcaProjection {
    pub x1: Array1<f64>,
    pub x2: Array1<f64>,
    pub x3: Array1<f64>,
    /// Eigenvalues of the centered kernel, largest first.
    pub eigenvalues: Array1<f64>,
}

impl KpcaProjection {
    pub fn n_elements(&self) -> usize {
        self.x1.len()
    }

    /// The three projections as columns of an `N x 3` matrix.
    pub fn to_columns(&self) -> Array2<f64> {
        let n = self.n_elements();
        Array2::from_shape_fn((n, KPCA_COMPONENTS), |(row, col)| match col {
            0 => self.x1[row],
            1 => self.x2[row],
            _ => self.x3[row],
        })
    }

    pub fn into_components(self) -> (Array1<f64>, Array1<f64>, Array1<f64>) {
        (self.x1, self.x2, self.x3)
    }
}

/// Doubly centers a kernel matrix: `K - U K - K U + U K U` with `U = 1/N`.
///
/// Every row and column of the result sums to zero up to rounding.
pub fn center_kernel(kernel: ArrayView2<f64>) -> Result<Array2<f64>, KpcaError> {
    let (rows, cols) = kernel.dim();
    if rows != cols {
        return Err(KpcaError::NotSquare { rows, cols });
    }
    // (U K)[i, j] is the mean of column j, (K U)[i, j] the mean of row i.
    let column_means = kernel.mean_axis(Axis(0)).ok_or(KpcaError::EmptyKernel)?;
    let row_means = kernel.mean_axis(Axis(1)).ok_or(KpcaError::EmptyKernel)?;
    let grand_mean = column_means.mean().ok_or(KpcaError::EmptyKernel)?;

    let centered = Array2::from_shape_fn((rows, cols), |(i, j)| {
        kernel[(i, j)] - column_means[j] - row_means[i] + grand_mean
    });
    Ok(centered)
}

/// Kernel PCA returning the three projections and the centered spectrum.
pub fn kpca_with_spectrum(kernel: ArrayView2<f64>) -> Result<KpcaProjection, KpcaError> {
    let (rows, cols) = kernel.dim();
    if rows != cols {
        return Err(KpcaError::NotSquare { rows, cols });
    }
    if rows < KPCA_COMPONENTS {
        return Err(KpcaError::TooFewElements {
            found: rows,
            required: KPCA_COMPONENTS,
        });
    }

    let asymmetry = linalg::max_asymmetry(kernel);
    if asymmetry > ASYMMETRY_WARN_TOLERANCE {
        log::warn!(
            "Kernel matrix is not symmetric (max |K_ij - K_ji| = {:.3e}); only the lower triangle of the centered kernel is used",
            asymmetry
        );
    }

    log::info!("Centering {}x{} kernel matrix", rows, cols);
    let centered = center_kernel(kernel)?;

    let (eigenvalues, eigenvectors) = linalg::symmetric_eigen_descending(centered.view())?;
    log::debug!(
        "Leading centered-kernel eigenvalues: {:?}",
        eigenvalues.iter().take(KPCA_COMPONENTS).collect::<Vec<_>>()
    );

    let scale = eigenvalues[0].abs().max(f64::MIN_POSITIVE);
    for idx in 0..KPCA_COMPONENTS - 1 {
        let gap = (eigenvalues[idx] - eigenvalues[idx + 1]).abs() / scale;
        if gap < DEGENERACY_WARN_TOLERANCE {
            log::warn!(
                "Eigenvalues {} and {} are nearly degenerate ({:.6e} vs {:.6e}); the corresponding axes are not unique",
                idx + 1,
                idx + 2,
                eigenvalues[idx],
                eigenvalues[idx + 1]
            );
        }
    }

    let project = |component: usize| -> Array1<f64> {
        let projection = kernel.dot(&eigenvectors.column(component));
        -projection
    };

    Ok(KpcaProjection {
        x1: project(0),
        x2: project(1),
        x3: project(2),
        eigenvalues,
    })
}

/// Projects a kernel matrix onto its top three kernel principal axes.
///
/// The kernel must be symmetric; symmetry is not enforced.
pub fn kpca(
    kernel: ArrayView2<f64>,
) -> Result<(Array1<f64>, Array1<f64>, Array1<f64>), KpcaError> {
    kpca_with_spectrum(kernel).map(KpcaProjection::into_components)
}
