use approx::assert_abs_diff_eq;
use mlincrs::progress::SweepProgressObserver;
use mlincrs::search::{
    GridPoint, GridSearchError, HYPERSURFACE_HEADER, SweepOptions, ValidationSplit,
    grid_search_1d, grid_search_1d_with_options, hypersurface_path, read_hypersurface,
};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::fs;

struct Problem {
    train_kernel: Array2<f64>,
    validation_kernel: Array2<f64>,
    train_targets: Array1<f64>,
    validation_targets: Array1<f64>,
}

impl Problem {
    fn split(&self) -> ValidationSplit<'_> {
        ValidationSplit::new(
            self.train_kernel.view(),
            self.validation_kernel.view(),
            self.train_targets.view(),
            self.validation_targets.view(),
        )
    }
}

fn rbf(a: f64, b: f64) -> f64 {
    let d = a - b;
    (-d * d / 2.0).exp()
}

/// Noisy samples of a smooth curve, split into interleaved train/validation sets.
fn noisy_problem(seed: u64) -> Problem {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 0.05).expect("valid normal");
    let train_x = Array1::from_shape_fn(20, |i| i as f64 * 0.6);
    let validation_x = Array1::from_shape_fn(8, |i| i as f64 * 1.4 + 0.3);
    let curve = |x: f64| (0.7 * x).sin() + 0.05 * x;

    Problem {
        train_kernel: Array2::from_shape_fn((20, 20), |(i, j)| rbf(train_x[i], train_x[j])),
        validation_kernel: Array2::from_shape_fn((8, 20), |(i, j)| {
            rbf(validation_x[i], train_x[j])
        }),
        train_targets: train_x.mapv(|x| curve(x) + noise.sample(&mut rng)),
        validation_targets: validation_x.mapv(|x| curve(x) + noise.sample(&mut rng)),
    }
}

#[test]
fn table_has_one_row_per_sigma_in_input_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let destination = dir.path().join("Results_validation_set");
    let problem = noisy_problem(1);
    let sigmas = [0.1, 1.0, 10.0];

    let result = grid_search_1d(
        problem.train_kernel.view(),
        problem.validation_kernel.view(),
        problem.train_targets.view(),
        problem.validation_targets.view(),
        &sigmas,
        &destination,
        None,
    )
    .expect("grid search");

    let table_path = hypersurface_path(&destination);
    let text = fs::read_to_string(&table_path).expect("table");
    assert_eq!(text.lines().next(), Some(HYPERSURFACE_HEADER));

    let table = read_hypersurface(&table_path).expect("parse table");
    assert_eq!(table.len(), 3);
    for ((row, point), sigma) in table.points().iter().zip(result.points()).zip(sigmas) {
        assert_eq!(row.sigma, sigma);
        assert_eq!(point.sigma, sigma);
        assert_abs_diff_eq!(row.train_rmse, point.train_rmse, epsilon = 1e-15);
        assert_abs_diff_eq!(row.validation_rmse, point.validation_rmse, epsilon = 1e-15);
    }
}

#[test]
fn training_error_does_not_decrease_along_sorted_sigmas() {
    let dir = tempfile::tempdir().expect("tempdir");
    let problem = noisy_problem(2);
    let sigmas = [1e-4, 1e-3, 1e-2, 1e-1, 1.0, 10.0, 100.0];

    let result = grid_search_1d(
        problem.train_kernel.view(),
        problem.validation_kernel.view(),
        problem.train_targets.view(),
        problem.validation_targets.view(),
        &sigmas,
        dir.path(),
        None,
    )
    .expect("grid search");

    for pair in result.points().windows(2) {
        assert!(
            pair[1].train_rmse + 1e-9 >= pair[0].train_rmse,
            "train RMSE fell from {} (sigma {}) to {} (sigma {})",
            pair[0].train_rmse,
            pair[0].sigma,
            pair[1].train_rmse,
            pair[1].sigma
        );
    }
}

#[test]
fn rerunning_overwrites_the_previous_table() {
    let dir = tempfile::tempdir().expect("tempdir");
    let problem = noisy_problem(3);
    let run = |sigmas: &[f64]| {
        grid_search_1d(
            problem.train_kernel.view(),
            problem.validation_kernel.view(),
            problem.train_targets.view(),
            problem.validation_targets.view(),
            sigmas,
            dir.path(),
            Some(0.1),
        )
        .expect("grid search")
    };

    run(&[0.01, 0.1, 1.0, 10.0]);
    run(&[0.5]);

    let table = read_hypersurface(hypersurface_path(dir.path())).expect("parse table");
    assert_eq!(table.len(), 1);
    assert_eq!(table.points()[0].sigma, 0.5);
}

#[test]
fn existing_destination_directory_is_reused() {
    let dir = tempfile::tempdir().expect("tempdir");
    let destination = dir.path().join("nested").join("results");
    fs::create_dir_all(&destination).expect("pre-create");
    fs::write(destination.join("unrelated.txt"), "keep me").expect("write");

    let problem = noisy_problem(4);
    grid_search_1d(
        problem.train_kernel.view(),
        problem.validation_kernel.view(),
        problem.train_targets.view(),
        problem.validation_targets.view(),
        &[1.0],
        &destination,
        None,
    )
    .expect("grid search");

    assert!(hypersurface_path(&destination).is_file());
    assert_eq!(
        fs::read_to_string(destination.join("unrelated.txt")).expect("read"),
        "keep me"
    );
}

#[test]
fn failing_sigma_leaves_no_table_behind() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut problem = noisy_problem(5);
    problem.validation_kernel[(0, 0)] = f64::INFINITY;

    let err = grid_search_1d_with_options(
        &problem.split(),
        &[0.1, 1.0],
        dir.path(),
        &SweepOptions::default(),
        &mut mlincrs::progress::NoopSweepProgress,
    )
    .unwrap_err();

    assert!(matches!(err, GridSearchError::Fit { sigma, .. } if sigma == 0.1));
    assert!(!hypersurface_path(dir.path()).exists());
}

#[test]
fn empty_grid_writes_a_header_only_table() {
    let dir = tempfile::tempdir().expect("tempdir");
    let destination = dir.path().join("empty_sweep");
    let problem = noisy_problem(9);

    let result = grid_search_1d(
        problem.train_kernel.view(),
        problem.validation_kernel.view(),
        problem.train_targets.view(),
        problem.validation_targets.view(),
        &[],
        &destination,
        None,
    )
    .expect("grid search over an empty grid");

    assert!(result.is_empty());
    assert!(result.best().is_none());
    let text = fs::read_to_string(hypersurface_path(&destination)).expect("table");
    assert_eq!(text.lines().collect::<Vec<_>>(), vec![HYPERSURFACE_HEADER]);
    assert!(read_hypersurface(hypersurface_path(&destination)).expect("parse").is_empty());
}

#[test]
fn mismatched_split_is_rejected_before_touching_the_filesystem() {
    let dir = tempfile::tempdir().expect("tempdir");
    let destination = dir.path().join("not_created");
    let mut problem = noisy_problem(6);
    problem.validation_targets = Array1::zeros(3);

    let err = grid_search_1d_with_options(
        &problem.split(),
        &[1.0],
        &destination,
        &SweepOptions::default(),
        &mut mlincrs::progress::NoopSweepProgress,
    )
    .unwrap_err();
    assert!(matches!(err, GridSearchError::ShapeMismatch { .. }));
    assert!(!destination.exists());
}

#[test]
fn parallel_sweep_matches_sequential_sweep() {
    let problem = noisy_problem(7);
    let sigmas: Vec<f64> = (0..12).map(|k| 10f64.powf(-4.0 + 0.5 * k as f64)).collect();

    let sequential_dir = tempfile::tempdir().expect("tempdir");
    let sequential = grid_search_1d_with_options(
        &problem.split(),
        &sigmas,
        sequential_dir.path(),
        &SweepOptions {
            mean_center: Some(0.2),
            ..SweepOptions::default()
        },
        &mut mlincrs::progress::NoopSweepProgress,
    )
    .expect("sequential");

    let parallel_dir = tempfile::tempdir().expect("tempdir");
    let parallel = grid_search_1d_with_options(
        &problem.split(),
        &sigmas,
        parallel_dir.path(),
        &SweepOptions {
            mean_center: Some(0.2),
            parallel: true,
            ..SweepOptions::default()
        },
        &mut mlincrs::progress::NoopSweepProgress,
    )
    .expect("parallel");

    assert_eq!(sequential.len(), parallel.len());
    for (a, b) in sequential.points().iter().zip(parallel.points()) {
        assert_eq!(a.sigma, b.sigma);
        assert_abs_diff_eq!(a.train_rmse, b.train_rmse, epsilon = 1e-12);
        assert_abs_diff_eq!(a.validation_rmse, b.validation_rmse, epsilon = 1e-12);
    }

    let table = read_hypersurface(hypersurface_path(parallel_dir.path())).expect("parse table");
    let written: Vec<f64> = table.points().iter().map(|p| p.sigma).collect();
    assert_eq!(written, sigmas);
}

#[derive(Default)]
struct RecordingObserver {
    total: Option<usize>,
    seen: Vec<(f64, usize)>,
    finished: bool,
}

impl SweepProgressObserver for RecordingObserver {
    fn on_sweep_start(&mut self, total_sigmas: usize) {
        self.total = Some(total_sigmas);
    }

    fn on_sigma_evaluated(&mut self, point: &GridPoint, completed: usize) {
        self.seen.push((point.sigma, completed));
    }

    fn on_sweep_finish(&mut self) {
        self.finished = true;
    }
}

#[test]
fn observer_sees_every_grid_point() {
    let dir = tempfile::tempdir().expect("tempdir");
    let problem = noisy_problem(8);
    let sigmas = [0.001, 0.01, 0.1, 1.0, 10.0];

    for parallel in [false, true] {
        let mut observer = RecordingObserver::default();
        grid_search_1d_with_options(
            &problem.split(),
            &sigmas,
            dir.path(),
            &SweepOptions {
                parallel,
                ..SweepOptions::default()
            },
            &mut observer,
        )
        .expect("grid search");

        assert_eq!(observer.total, Some(sigmas.len()));
        assert!(observer.finished);

        let mut counts: Vec<usize> = observer.seen.iter().map(|&(_, c)| c).collect();
        counts.sort_unstable();
        assert_eq!(counts, (1..=sigmas.len()).collect::<Vec<_>>());

        let mut seen_sigmas: Vec<f64> = observer.seen.iter().map(|&(s, _)| s).collect();
        seen_sigmas.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(seen_sigmas, sigmas.to_vec());
    }
}
