use std::fs;

use anyhow::Result;
use clap::Parser;
use log::info;

use crate::Gallery;
use crate::cli::SubCommandExtend;
use crate::config::{DatasetOptions, EmbedOptions, EvalOptions, Opts};
use crate::dataset;
use crate::embed::CommandEmbedder;
use crate::eval::EvalContext;
use crate::eval::verify::evaluate;
use crate::ledger;

#[derive(Parser, Debug, Clone)]
pub struct VerifyCommand {
    #[command(flatten)]
    pub dataset: DatasetOptions,
    #[command(flatten)]
    pub embed: EmbedOptions,
    #[command(flatten)]
    pub eval: EvalOptions,
}

impl SubCommandExtend for VerifyCommand {
    fn run(&self, opts: &Opts) -> Result<()> {
        let samples = dataset::discover(&self.dataset.dataset, &self.dataset.suffix)?;
        let tasks = dataset::query_tasks(&samples, self.dataset.split_ratio);
        let attempted = tasks.len();

        let gallery = Gallery::load(&opts.data_dir, self.embed.dim)?;
        info!("画廊加载完成: {} 个身份, 维度 {}", gallery.len(), gallery.dim());

        let embedder = CommandEmbedder::new(self.embed.embed_cmd.clone(), self.embed.dim);
        let ctx = EvalContext {
            gallery: &gallery,
            embedder: &embedder,
            occlusion_size: self.eval.occlusion_size,
            audit_dir: None,
        };
        let workers = self.eval.workers.unwrap_or_else(num_cpus::get);
        let pairs = evaluate(&ctx, tasks, workers);

        let path = opts.data_dir.verification_ledger();
        fs::create_dir_all(opts.data_dir.path())?;
        ledger::write_verification(&path, &pairs)?;

        let genuine = pairs.iter().filter(|p| p.genuine).count();
        println!("--- 验证评估 (1:1) ---");
        println!("尝试查询数:     {}", attempted);
        println!("比对总数:       {}", pairs.len());
        println!("genuine 比对:   {}", genuine);
        println!("imposter 比对:  {}", pairs.len() - genuine);
        println!("结果已写入 {}", path.display());
        Ok(())
    }
}
