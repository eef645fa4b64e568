use anyhow::Result;
use clap::Parser;
use faceval::Opts;
use faceval::cli::SubCommandExtend;
use faceval::config::SubCommand;

fn main() -> Result<()> {
    env_logger::init();

    let opts = Opts::parse();
    match &opts.subcmd {
        SubCommand::Build(config) => config.run(&opts),
        SubCommand::Identify(config) => config.run(&opts),
        SubCommand::Verify(config) => config.run(&opts),
        SubCommand::Metrics(config) => config.run(&opts),
    }
}
