use crate::search::GridPoint;

/// Observer for reporting progress while sweeping regularization strengths.
///
/// In a parallel sweep `on_sigma_evaluated` fires in completion order, not
/// input order; `completed` counts the points finished so far.
pub trait SweepProgressObserver {
    fn on_sweep_start(&mut self, total_sigmas: usize) {
        let _ = total_sigmas;
    }
    fn on_sigma_evaluated(&mut self, point: &GridPoint, completed: usize) {
        let _ = (point, completed);
    }
    fn on_sweep_finish(&mut self) {}
}

#[derive(Default)]
pub struct NoopSweepProgress;

impl SweepProgressObserver for NoopSweepProgress {}
