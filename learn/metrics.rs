use ndarray::ArrayView1;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MetricError {
    #[error("Cannot compare {truth} reference values with {predicted} predictions")]
    LengthMismatch { truth: usize, predicted: usize },
    #[error("Cannot compute an error metric over zero values")]
    Empty,
}

/// Root-mean-square deviation between reference values and predictions.
///
/// Length-mismatched or empty inputs are an error rather than NaN.
pub fn rmse(truth: ArrayView1<f64>, predicted: ArrayView1<f64>) -> Result<f64, MetricError> {
    if truth.len() != predicted.len() {
        return Err(MetricError::LengthMismatch {
            truth: truth.len(),
            predicted: predicted.len(),
        });
    }
    if truth.is_empty() {
        return Err(MetricError::Empty);
    }
    let sum_sq: f64 = truth
        .iter()
        .zip(predicted.iter())
        .map(|(&t, &p)| {
            let diff = t - p;
            diff * diff
        })
        .sum();
    Ok((sum_sq / truth.len() as f64).sqrt())
}
