use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use crate::Gallery;
use crate::cli::SubCommandExtend;
use crate::config::{DatasetOptions, EmbedOptions, EvalOptions, Opts};
use crate::dataset;
use crate::embed::CommandEmbedder;
use crate::eval::identify::evaluate;
use crate::eval::EvalContext;
use crate::ledger;
use crate::metrics;

#[derive(Parser, Debug, Clone)]
pub struct IdentifyCommand {
    #[command(flatten)]
    pub dataset: DatasetOptions,
    #[command(flatten)]
    pub embed: EmbedOptions,
    #[command(flatten)]
    pub eval: EvalOptions,
    /// 识别检索返回的 top-K 数量
    #[arg(short = 'k', long, default_value_t = 3)]
    pub top_k: usize,
    /// 遮挡后查询图片的留档目录，不填则不留档
    #[arg(long, value_name = "DIR")]
    pub save_occluded: Option<PathBuf>,
}

impl SubCommandExtend for IdentifyCommand {
    fn run(&self, opts: &Opts) -> Result<()> {
        let samples = dataset::discover(&self.dataset.dataset, &self.dataset.suffix)?;
        let tasks = dataset::query_tasks(&samples, self.dataset.split_ratio);
        let attempted = tasks.len();

        let gallery = Gallery::load(&opts.data_dir, self.embed.dim)?;
        info!("画廊加载完成: {} 个身份, 维度 {}", gallery.len(), gallery.dim());

        if let Some(dir) = &self.save_occluded {
            fs::create_dir_all(dir)?;
        }

        let embedder = CommandEmbedder::new(self.embed.embed_cmd.clone(), self.embed.dim);
        let ctx = EvalContext {
            gallery: &gallery,
            embedder: &embedder,
            occlusion_size: self.eval.occlusion_size,
            audit_dir: self.save_occluded.as_deref(),
        };
        let workers = self.eval.workers.unwrap_or_else(num_cpus::get);
        let records = evaluate(&ctx, tasks, self.top_k, workers);

        let path = opts.data_dir.identification_ledger();
        fs::create_dir_all(opts.data_dir.path())?;
        ledger::write_identification(&path, &records)?;

        let report = metrics::rank_report(&records, self.top_k);
        println!("--- 识别评估 (1:N) ---");
        println!("尝试查询数:   {}", attempted);
        println!("成功查询数:   {}", report.total);
        println!("跳过查询数:   {}", attempted - report.total);
        println!("Rank-1 命中:  {}", report.rank1_correct);
        println!("Rank-1 准确率: {:.2}%", report.rank1_accuracy() * 100.0);
        println!("结果已写入 {}", path.display());
        Ok(())
    }
}
