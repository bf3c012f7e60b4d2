#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod config;
pub mod data;
pub mod kpca;
pub mod krr;
pub mod linalg;
pub mod metrics;
pub mod progress;
pub mod search;
#[path = "../shared/files.rs"]
pub mod shared_files;
pub mod shared {
    pub use super::shared_files as files;
}

#[path = "../network/mod.rs"]
pub mod network;

pub use kpca::{KpcaProjection, center_kernel, kpca, kpca_with_spectrum};
pub use krr::{FitOptions, fit, predict};
pub use metrics::rmse;
pub use search::{GridPoint, GridSearchResult, SweepOptions, ValidationSplit, grid_search_1d};
pub use shared::files::ensure_dir;
