pub mod cli;
pub mod config;
pub mod dataset;
pub mod detect;
pub mod embed;
pub mod eval;
pub mod gallery;
pub mod ledger;
pub mod metrics;
pub mod occlusion;
pub mod utils;

pub use config::Opts;
pub use gallery::Gallery;
