#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::error::Error;
use std::path::PathBuf;
use std::process;

use mlincrs::config::SweepConfig;
use mlincrs::data::{load_matrix, load_vector, write_matrix, write_vector};
use mlincrs::kpca::kpca_with_spectrum;
use mlincrs::krr::{self, FitOptions};
use mlincrs::network::{append_rearrangement_energy, read_reaction_network};
use mlincrs::progress::SweepProgressObserver;
use mlincrs::search::{GridPoint, ValidationSplit, grid_search_1d_with_options, hypersurface_path};

#[derive(Parser)]
#[command(
    name = "mlincrs",
    about = "Kernel PCA and kernel ridge regression over precomputed kernel matrices",
    long_about = "Projects precomputed kernel matrices onto their leading kernel principal axes, \
                  fits and applies kernel ridge regression models, and sweeps the ridge \
                  regularization against a validation set."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Project a kernel matrix onto its top three kernel principal axes
    #[command(about = "Kernel PCA (outputs: three columns x1 x2 x3)")]
    Kpca(KpcaArgs),
    /// Fit kernel ridge regression coefficients
    #[command(about = "Fit a KRR model (outputs: coefficient column)")]
    Fit(FitArgs),
    /// Predict targets from a cross kernel and fitted coefficients
    #[command(about = "Apply KRR coefficients (outputs: prediction column)")]
    Predict(PredictArgs),
    /// Sweep the regularization strength against a validation set
    #[command(about = "1-D grid search (outputs: hypersurface_data.txt)")]
    GridSearch(GridSearchArgs),
    /// Read a reaction-network table and export its energies
    #[command(about = "Read a reaction network (outputs: optional energy column)")]
    Network(NetworkArgs),
}

#[derive(Args)]
struct KpcaArgs {
    /// Square, symmetric kernel matrix
    #[arg(long)]
    kernel: PathBuf,

    /// Destination of the N x 3 projection table
    #[arg(long)]
    output: PathBuf,

    /// Optional destination of the centered-kernel eigenvalues, largest first
    #[arg(long)]
    eigenvalues: Option<PathBuf>,
}

#[derive(Args)]
struct FitArgs {
    /// Square training kernel matrix
    #[arg(long)]
    kernel: PathBuf,

    /// Training targets, one per kernel row
    #[arg(long)]
    targets: PathBuf,

    /// Regularization added to the kernel diagonal
    #[arg(long, default_value = "0")]
    sigma: f64,

    /// Per-element regularization; replaces --sigma entirely when given
    #[arg(long, value_name = "FILE")]
    sigma_per_element: Option<PathBuf>,

    /// Relative singular value cutoff of the least-squares solve
    #[arg(long, allow_negative_numbers = true)]
    rcond: Option<f64>,

    /// Value subtracted from the targets before fitting
    #[arg(long, allow_negative_numbers = true)]
    mean_center: Option<f64>,

    /// Destination of the coefficient column
    #[arg(long)]
    output: PathBuf,
}

#[derive(Args)]
struct PredictArgs {
    /// Cross kernel between query and training elements (M x N)
    #[arg(long)]
    kernel: PathBuf,

    /// Fitted coefficients (length N)
    #[arg(long)]
    coefficients: PathBuf,

    /// Mean-centering value used at fit time
    #[arg(long, allow_negative_numbers = true)]
    mean_center: Option<f64>,

    /// Destination of the prediction column
    #[arg(long)]
    output: PathBuf,
}

#[derive(Args)]
struct GridSearchArgs {
    /// Training kernel (N x N)
    #[arg(long)]
    train_kernel: PathBuf,

    /// Validation cross kernel (M x N)
    #[arg(long)]
    validation_kernel: PathBuf,

    /// Training targets (length N)
    #[arg(long)]
    train_targets: PathBuf,

    /// Validation targets (length M)
    #[arg(long)]
    validation_targets: PathBuf,

    /// Comma-separated regularization grid, e.g. 1e-4,1e-2,1
    #[arg(
        long,
        value_delimiter = ',',
        num_args = 1..,
        required_unless_present = "config",
        conflicts_with = "config"
    )]
    sigmas: Option<Vec<f64>>,

    /// TOML sweep configuration; command-line flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory receiving hypersurface_data.txt
    #[arg(long)]
    destination: Option<PathBuf>,

    /// Mean-centering value applied to every fit and prediction
    #[arg(long, allow_negative_numbers = true)]
    mean_center: Option<f64>,

    /// Relative singular value cutoff of the least-squares solve
    #[arg(long, allow_negative_numbers = true)]
    rcond: Option<f64>,

    /// Evaluate the grid points in parallel
    #[arg(long)]
    parallel: bool,
}

#[derive(Args)]
struct NetworkArgs {
    /// Comma-delimited reaction table: educt, product, product|[x], energy
    input: PathBuf,

    /// Highest molecule index appearing in the network
    #[arg(long, value_name = "ID")]
    highest_molecule_id: usize,

    /// Optional destination of the reaction energies
    #[arg(long)]
    output: Option<PathBuf>,

    /// Append the zero energy of the rearrangement placeholder
    #[arg(long)]
    append_rearrangement: bool,
}

#[derive(Default)]
struct SweepProgressBar {
    bar: Option<ProgressBar>,
}

impl SweepProgressObserver for SweepProgressBar {
    fn on_sweep_start(&mut self, total_sigmas: usize) {
        let bar = ProgressBar::new(total_sigmas as u64);
        if let Ok(style) =
            ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} sigma {msg}")
        {
            bar.set_style(style);
        }
        self.bar = Some(bar);
    }

    fn on_sigma_evaluated(&mut self, point: &GridPoint, completed: usize) {
        if let Some(bar) = &self.bar {
            bar.set_position(completed as u64);
            bar.set_message(format!(
                "{:.3e} (validation RMSE {:.4e})",
                point.sigma, point.validation_rmse
            ));
        }
    }

    fn on_sweep_finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Kpca(args) => kpca_command(args),
        Commands::Fit(args) => fit_command(args),
        Commands::Predict(args) => predict_command(args),
        Commands::GridSearch(args) => grid_search_command(args),
        Commands::Network(args) => network_command(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn kpca_command(args: KpcaArgs) -> Result<(), Box<dyn Error>> {
    let kernel = load_matrix(&args.kernel)?;
    println!(
        "Loaded {}x{} kernel from {}",
        kernel.nrows(),
        kernel.ncols(),
        args.kernel.display()
    );

    let projection = kpca_with_spectrum(kernel.view())?;
    write_matrix(&args.output, projection.to_columns().view())?;
    println!(
        "Wrote projections of {} elements to {}",
        projection.n_elements(),
        args.output.display()
    );

    if let Some(path) = args.eigenvalues {
        write_vector(&path, projection.eigenvalues.view())?;
        println!("Wrote centered-kernel eigenvalues to {}", path.display());
    }
    Ok(())
}

fn fit_command(args: FitArgs) -> Result<(), Box<dyn Error>> {
    let kernel = load_matrix(&args.kernel)?;
    let targets = load_vector(&args.targets)?;

    let mut options = FitOptions::default();
    if let Some(path) = &args.sigma_per_element {
        options = options.with_per_element_sigma(load_vector(path)?);
    }
    if let Some(rcond) = args.rcond {
        options = options.with_rcond(rcond);
    }
    if let Some(mean_center) = args.mean_center {
        options = options.with_mean_center(mean_center);
    }

    let coefficients = krr::fit(kernel.view(), targets.view(), args.sigma, &options)?;
    write_vector(&args.output, coefficients.view())?;
    println!(
        "Fitted {} coefficients; written to {}",
        coefficients.len(),
        args.output.display()
    );
    Ok(())
}

fn predict_command(args: PredictArgs) -> Result<(), Box<dyn Error>> {
    let cross_kernel = load_matrix(&args.kernel)?;
    let coefficients = load_vector(&args.coefficients)?;

    let predictions = krr::predict(cross_kernel.view(), coefficients.view(), args.mean_center)?;
    write_vector(&args.output, predictions.view())?;
    println!(
        "Predicted {} values; written to {}",
        predictions.len(),
        args.output.display()
    );
    Ok(())
}

fn resolve_sweep_config(args: &GridSearchArgs) -> Result<SweepConfig, Box<dyn Error>> {
    let mut config = match (&args.config, &args.sigmas) {
        (Some(path), _) => SweepConfig::load(path)?,
        (None, Some(sigmas)) => SweepConfig::new(sigmas.clone()),
        (None, None) => return Err("either --sigmas or --config is required".into()),
    };
    if let Some(destination) = &args.destination {
        config.destination = destination.clone();
    }
    if args.mean_center.is_some() {
        config.mean_center = args.mean_center;
    }
    if args.rcond.is_some() {
        config.rcond = args.rcond;
    }
    config.parallel |= args.parallel;
    Ok(config)
}

fn grid_search_command(args: GridSearchArgs) -> Result<(), Box<dyn Error>> {
    let config = resolve_sweep_config(&args)?;

    let train_kernel = load_matrix(&args.train_kernel)?;
    let validation_kernel = load_matrix(&args.validation_kernel)?;
    let train_targets = load_vector(&args.train_targets)?;
    let validation_targets = load_vector(&args.validation_targets)?;

    let split = ValidationSplit::new(
        train_kernel.view(),
        validation_kernel.view(),
        train_targets.view(),
        validation_targets.view(),
    );

    let mut progress = SweepProgressBar::default();
    let result = grid_search_1d_with_options(
        &split,
        &config.sigmas,
        &config.destination,
        &config.to_options(),
        &mut progress,
    )?;

    println!(
        "Evaluated {} sigma values; table written to {}",
        result.len(),
        hypersurface_path(&config.destination).display()
    );
    if let Some(best) = result.best() {
        println!(
            "Best sigma: {:.6e} (train RMSE {:.6e}, validation RMSE {:.6e})",
            best.sigma, best.train_rmse, best.validation_rmse
        );
    }
    Ok(())
}

fn network_command(args: NetworkArgs) -> Result<(), Box<dyn Error>> {
    let network = read_reaction_network(&args.input, args.highest_molecule_id)?;
    println!(
        "Read {} reactions, {} of them rearrangements",
        network.n_reactions(),
        network.n_rearrangements(args.highest_molecule_id)
    );

    if let Some(path) = args.output {
        let energies = if args.append_rearrangement {
            append_rearrangement_energy(network.energies.view())
        } else {
            network.energies.clone()
        };
        write_vector(&path, energies.view())?;
        println!("Wrote {} energies to {}", energies.len(), path.display());
    }
    Ok(())
}
