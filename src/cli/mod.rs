mod build;
mod identify;
mod metrics;
mod verify;

pub use build::*;
pub use identify::*;
pub use metrics::*;
pub use verify::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> anyhow::Result<()>;
}
