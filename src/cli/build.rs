use anyhow::Result;
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::{DatasetOptions, EmbedOptions, Opts};
use crate::dataset;
use crate::embed::CommandEmbedder;
use crate::gallery;

#[derive(Parser, Debug, Clone)]
pub struct BuildCommand {
    #[command(flatten)]
    pub dataset: DatasetOptions,
    #[command(flatten)]
    pub embed: EmbedOptions,
}

impl SubCommandExtend for BuildCommand {
    fn run(&self, opts: &Opts) -> Result<()> {
        let samples = dataset::discover(&self.dataset.dataset, &self.dataset.suffix)?;
        let sets = dataset::enrollment_sets(&samples, self.dataset.split_ratio);
        info!("开始构建画廊: {} 个身份", sets.len());

        let embedder = CommandEmbedder::new(self.embed.embed_cmd.clone(), self.embed.dim);
        let gallery = gallery::build(&sets, &embedder)?;
        gallery.save(&opts.data_dir)?;

        println!("画廊构建完成: {} 个身份, 维度 {}", gallery.len(), gallery.dim());
        Ok(())
    }
}
