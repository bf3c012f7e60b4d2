//! # Kernel Ridge Regression
//!
//! Fits the coefficients of a kernel ridge model by solving
//! `(K + sigma I) c = y` with a rank-revealing least-squares solve, and
//! predicts through `y = K_cross c`. Nothing is retained between calls: the
//! coefficient vector belongs to the caller, and so does the responsibility
//! of passing the same mean-centering value to `fit` and `predict`.

use crate::linalg::{self, LinalgError};
use ndarray::{Array1, ArrayView1, ArrayView2};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KrrError {
    #[error("Shape mismatch in {context}: expected {expected}, found {found}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Kernel matrix must be square, found {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
    #[error("Regularization must be finite and non-negative, found {0}")]
    InvalidRegularization(f64),
    #[error("Mean-centering value must be finite, found {0}")]
    InvalidMeanCenter(f64),
    #[error("Prediction produced non-finite values")]
    NonFiniteSolution,
    #[error("Linear algebra failure during kernel ridge regression: {0}")]
    Linalg(#[from] LinalgError),
}

/// Optional knobs of [`fit`].
///
/// `per_element_sigma`, when present, fully replaces the scalar `sigma`
/// passed to [`fit`]; the two are never combined.
#[derive(Clone, Debug, Default)]
pub struct FitOptions {
    pub per_element_sigma: Option<Array1<f64>>,
    pub rcond: Option<f64>,
    pub mean_center: Option<f64>,
}

impl FitOptions {
    pub fn with_per_element_sigma(mut self, sigmas: Array1<f64>) -> Self {
        self.per_element_sigma = Some(sigmas);
        self
    }

    pub fn with_rcond(mut self, rcond: f64) -> Self {
        self.rcond = Some(rcond);
        self
    }

    pub fn with_mean_center(mut self, mean_center: f64) -> Self {
        self.mean_center = Some(mean_center);
        self
    }
}

fn check_regularization(value: f64) -> Result<(), KrrError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(KrrError::InvalidRegularization(value))
    }
}

fn check_mean_center(mean_center: Option<f64>) -> Result<(), KrrError> {
    match mean_center {
        Some(value) if !value.is_finite() => Err(KrrError::InvalidMeanCenter(value)),
        _ => Ok(()),
    }
}

/// Fits kernel ridge regression coefficients.
///
/// `Some(0.0)` as mean center is honored as a shift by zero, which is
/// numerically the same as `None`.
pub fn fit(
    kernel: ArrayView2<f64>,
    targets: ArrayView1<f64>,
    sigma: f64,
    options: &FitOptions,
) -> Result<Array1<f64>, KrrError> {
    let (rows, cols) = kernel.dim();
    if rows != cols {
        return Err(KrrError::NotSquare { rows, cols });
    }
    if targets.len() != rows {
        return Err(KrrError::ShapeMismatch {
            context: "training targets vs. kernel rows",
            expected: rows,
            found: targets.len(),
        });
    }
    check_mean_center(options.mean_center)?;

    let mut system = kernel.to_owned();
    match &options.per_element_sigma {
        Some(per_element) => {
            if per_element.len() != rows {
                return Err(KrrError::ShapeMismatch {
                    context: "per-element regularization vs. kernel rows",
                    expected: rows,
                    found: per_element.len(),
                });
            }
            for (idx, &value) in per_element.iter().enumerate() {
                check_regularization(value)?;
                system[(idx, idx)] += value;
            }
        }
        None => {
            check_regularization(sigma)?;
            system.diag_mut().mapv_inplace(|d| d + sigma);
        }
    }

    let shifted = match options.mean_center {
        Some(mean_center) => targets.mapv(|y| y - mean_center),
        None => targets.to_owned(),
    };

    let solved = linalg::lstsq(system.view(), shifted.view(), options.rcond)?;
    if solved.rank < rows {
        log::warn!(
            "Regularized kernel is rank deficient (rank {} of {}); returning the minimum-norm solution",
            solved.rank,
            rows
        );
    }
    log::trace!(
        "KRR solve: rank {}, largest singular value {:.6e}",
        solved.rank,
        solved.singular_values.first().copied().unwrap_or(0.0)
    );

    Ok(solved.solution)
}

/// Predicts targets from a cross kernel between query and training elements.
pub fn predict(
    cross_kernel: ArrayView2<f64>,
    coefficients: ArrayView1<f64>,
    mean_center: Option<f64>,
) -> Result<Array1<f64>, KrrError> {
    if cross_kernel.ncols() != coefficients.len() {
        return Err(KrrError::ShapeMismatch {
            context: "cross-kernel columns vs. coefficients",
            expected: coefficients.len(),
            found: cross_kernel.ncols(),
        });
    }
    check_mean_center(mean_center)?;

    let mut predictions = cross_kernel.dot(&coefficients);
    if let Some(mean_center) = mean_center {
        predictions += mean_center;
    }
    if !linalg::all_finite(&predictions) {
        return Err(KrrError::NonFiniteSolution);
    }
    Ok(predictions)
}
