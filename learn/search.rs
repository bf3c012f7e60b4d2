// learn/search.rs

//! # One-dimensional Validation-Set Grid Search
//!
//! Sweeps a list of regularization strengths, fitting a kernel ridge model on
//! the training split for each one and scoring it with the RMSE on both the
//! training and the validation split. The resulting error curve (the
//! "hypersurface") is written once, after the whole sweep succeeded, to
//! `<destination>/hypersurface_data.txt`:
//!
//! ```text
//! # sigma, train, validation
//! 1.000000000000000056e-1 2.345678901234567890e-3 4.567890123456789012e-2
//! ...
//! ```
//!
//! Any failure for any sigma aborts the sweep before the table is written.
//! Rows always follow the input sigma order, also when the sweep runs in
//! parallel.

use crate::krr::{self, FitOptions, KrrError};
use crate::metrics::{self, MetricError};
use crate::progress::{NoopSweepProgress, SweepProgressObserver};
use crate::shared::files::{create_output_file, ensure_dir};
use ndarray::{ArrayView1, ArrayView2};
use rayon::prelude::*;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// File name of the error table inside the destination directory.
pub const HYPERSURFACE_FILENAME: &str = "hypersurface_data.txt";
/// Destination used when the caller does not pick one.
pub const DEFAULT_DESTINATION: &str = "./Results_validation_set";
/// Header line of the error table.
pub const HYPERSURFACE_HEADER: &str = "# sigma, train, validation";

#[derive(Debug, Error)]
pub enum GridSearchError {
    #[error("Failed to prepare or write grid search output: {0}")]
    Io(#[from] io::Error),
    #[error("Kernel ridge regression failed for sigma = {sigma}: {source}")]
    Fit {
        sigma: f64,
        #[source]
        source: KrrError,
    },
    #[error("Error metric failed for sigma = {sigma}: {source}")]
    Metric {
        sigma: f64,
        #[source]
        source: MetricError,
    },
    #[error("Shape mismatch in {context}: expected {expected}, found {found}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Sigma at position {index} must be finite and non-negative, found {value}")]
    InvalidSigma { index: usize, value: f64 },
    #[error("Malformed hypersurface table at line {line}: {message}")]
    MalformedTable { line: usize, message: String },
}

/// Training and validation kernels with their targets.
///
/// `train_kernel` is `N x N`, `validation_kernel` is `M x N`.
#[derive(Clone, Copy, Debug)]
pub struct ValidationSplit<'a> {
    pub train_kernel: ArrayView2<'a, f64>,
    pub validation_kernel: ArrayView2<'a, f64>,
    pub train_targets: ArrayView1<'a, f64>,
    pub validation_targets: ArrayView1<'a, f64>,
}

impl<'a> ValidationSplit<'a> {
    pub fn new(
        train_kernel: ArrayView2<'a, f64>,
        validation_kernel: ArrayView2<'a, f64>,
        train_targets: ArrayView1<'a, f64>,
        validation_targets: ArrayView1<'a, f64>,
    ) -> Self {
        Self {
            train_kernel,
            validation_kernel,
            train_targets,
            validation_targets,
        }
    }

    pub fn n_train(&self) -> usize {
        self.train_kernel.nrows()
    }

    pub fn n_validation(&self) -> usize {
        self.validation_kernel.nrows()
    }

    /// Checks that all four arrays agree on `N` and `M`.
    pub fn validate(&self) -> Result<(), GridSearchError> {
        let n = self.train_kernel.nrows();
        let checks = [
            ("training kernel columns", n, self.train_kernel.ncols()),
            ("training targets", n, self.train_targets.len()),
            (
                "validation kernel columns",
                n,
                self.validation_kernel.ncols(),
            ),
            (
                "validation targets",
                self.validation_kernel.nrows(),
                self.validation_targets.len(),
            ),
        ];
        for (context, expected, found) in checks {
            if expected != found {
                return Err(GridSearchError::ShapeMismatch {
                    context,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct SweepOptions {
    pub mean_center: Option<f64>,
    pub rcond: Option<f64>,
    /// Evaluate the sigmas on the rayon pool. Row order is unaffected.
    pub parallel: bool,
}

impl SweepOptions {
    fn fit_options(&self) -> FitOptions {
        FitOptions {
            per_element_sigma: None,
            rcond: self.rcond,
            mean_center: self.mean_center,
        }
    }
}

/// One row of the error table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridPoint {
    pub sigma: f64,
    pub train_rmse: f64,
    pub validation_rmse: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GridSearchResult {
    points: Vec<GridPoint>,
}

impl GridSearchResult {
    pub fn new(points: Vec<GridPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Grid point with the lowest validation RMSE; the earliest one wins ties.
    pub fn best(&self) -> Option<&GridPoint> {
        self.points.iter().fold(None, |best: Option<&GridPoint>, point| match best {
            Some(current) if current.validation_rmse <= point.validation_rmse => Some(current),
            _ if point.validation_rmse.is_nan() => best,
            _ => Some(point),
        })
    }

    /// Writes the table to `path`, replacing any existing file.
    pub fn write_table<P: AsRef<Path>>(&self, path: P) -> Result<(), GridSearchError> {
        let mut writer = create_output_file(path)?;
        writeln!(writer, "{HYPERSURFACE_HEADER}")?;
        for point in &self.points {
            writeln!(
                writer,
                "{:.18e} {:.18e} {:.18e}",
                point.sigma, point.train_rmse, point.validation_rmse
            )?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Reads a table produced by [`GridSearchResult::write_table`].
pub fn read_hypersurface<P: AsRef<Path>>(path: P) -> Result<GridSearchResult, GridSearchError> {
    let content = fs::read_to_string(path)?;
    let mut points = Vec::new();
    for (idx, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let values = line
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| GridSearchError::MalformedTable {
                line: idx + 1,
                message: err.to_string(),
            })?;
        match values.as_slice() {
            &[sigma, train_rmse, validation_rmse] => points.push(GridPoint {
                sigma,
                train_rmse,
                validation_rmse,
            }),
            other => {
                return Err(GridSearchError::MalformedTable {
                    line: idx + 1,
                    message: format!("expected 3 columns, found {}", other.len()),
                });
            }
        }
    }
    Ok(GridSearchResult::new(points))
}

/// An empty grid is valid and yields a header-only table.
fn validate_sigmas(sigmas: &[f64]) -> Result<(), GridSearchError> {
    for (index, &value) in sigmas.iter().enumerate() {
        if !value.is_finite() || value < 0.0 {
            return Err(GridSearchError::InvalidSigma { index, value });
        }
    }
    Ok(())
}

/// Fits on the training split for a single sigma and scores both splits.
pub fn evaluate_sigma(
    split: &ValidationSplit<'_>,
    sigma: f64,
    options: &FitOptions,
) -> Result<GridPoint, GridSearchError> {
    let fit_err = |source| GridSearchError::Fit { sigma, source };
    let metric_err = |source| GridSearchError::Metric { sigma, source };

    let coefficients = krr::fit(split.train_kernel, split.train_targets, sigma, options)
        .map_err(fit_err)?;
    let train_prediction = krr::predict(split.train_kernel, coefficients.view(), options.mean_center)
        .map_err(fit_err)?;
    let validation_prediction =
        krr::predict(split.validation_kernel, coefficients.view(), options.mean_center)
            .map_err(fit_err)?;

    let train_rmse =
        metrics::rmse(split.train_targets, train_prediction.view()).map_err(metric_err)?;
    let validation_rmse = metrics::rmse(split.validation_targets, validation_prediction.view())
        .map_err(metric_err)?;

    log::debug!(
        "sigma = {:.6e}: train RMSE = {:.6e}, validation RMSE = {:.6e}",
        sigma,
        train_rmse,
        validation_rmse
    );

    Ok(GridPoint {
        sigma,
        train_rmse,
        validation_rmse,
    })
}

/// Sweeps `sigmas` and writes `<destination>/hypersurface_data.txt`.
pub fn grid_search_1d<'a>(
    train_kernel: ArrayView2<'a, f64>,
    validation_kernel: ArrayView2<'a, f64>,
    train_targets: ArrayView1<'a, f64>,
    validation_targets: ArrayView1<'a, f64>,
    sigmas: &[f64],
    destination: &Path,
    mean_center: Option<f64>,
) -> Result<GridSearchResult, GridSearchError> {
    let split = ValidationSplit::new(
        train_kernel,
        validation_kernel,
        train_targets,
        validation_targets,
    );
    let options = SweepOptions {
        mean_center,
        ..SweepOptions::default()
    };
    grid_search_1d_with_options(&split, sigmas, destination, &options, &mut NoopSweepProgress)
}

pub fn grid_search_1d_with_options(
    split: &ValidationSplit<'_>,
    sigmas: &[f64],
    destination: &Path,
    options: &SweepOptions,
    observer: &mut (dyn SweepProgressObserver + Send),
) -> Result<GridSearchResult, GridSearchError> {
    validate_sigmas(sigmas)?;
    split.validate()?;
    ensure_dir(destination)?;

    log::info!(
        "Starting grid search over {} sigma values ({} training, {} validation elements)",
        sigmas.len(),
        split.n_train(),
        split.n_validation()
    );

    let fit_options = options.fit_options();
    observer.on_sweep_start(sigmas.len());

    let points = if options.parallel {
        let completed = AtomicUsize::new(0);
        let observer = Mutex::new(&mut *observer);
        sigmas
            .par_iter()
            .map(|&sigma| -> Result<GridPoint, GridSearchError> {
                let point = evaluate_sigma(split, sigma, &fit_options)?;
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                report_progress(&observer, &point, done);
                Ok(point)
            })
            .collect::<Result<Vec<_>, GridSearchError>>()?
    } else {
        let mut points = Vec::with_capacity(sigmas.len());
        for &sigma in sigmas {
            let point = evaluate_sigma(split, sigma, &fit_options)?;
            points.push(point);
            observer.on_sigma_evaluated(&point, points.len());
        }
        points
    };
    observer.on_sweep_finish();

    let result = GridSearchResult::new(points);
    let table_path = hypersurface_path(destination);
    result.write_table(&table_path)?;

    if let Some(best) = result.best() {
        log::info!(
            "Lowest validation RMSE {:.6e} at sigma = {:.6e}; table written to {}",
            best.validation_rmse,
            best.sigma,
            table_path.display()
        );
    }

    Ok(result)
}

/// Forwards one evaluated point to an observer shared across rayon workers.
/// A poisoned lock still delivers the point.
fn report_progress<'o, 'd>(
    observer: &Mutex<&'o mut (dyn SweepProgressObserver + Send + 'd)>,
    point: &GridPoint,
    completed: usize,
) {
    let mut guard = observer.lock().unwrap_or_else(PoisonError::into_inner);
    guard.on_sigma_evaluated(point, completed);
}

pub fn hypersurface_path(destination: &Path) -> PathBuf {
    destination.join(HYPERSURFACE_FILENAME)
}
