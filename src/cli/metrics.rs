use anyhow::{Result, bail};
use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::ledger;
use crate::metrics::{self, MetricsError};

#[derive(Parser, Debug, Clone)]
pub struct MetricsCommand {
    /// 识别指标使用的 rank-K
    #[arg(short = 'k', long, default_value_t = 3)]
    pub top_k: usize,
    /// 验证准确率的阈值集合，逗号分隔
    #[arg(long, value_name = "LIST", value_delimiter = ',', default_value = "0.5,0.6,0.7")]
    pub thresholds: Vec<f32>,
    /// TAR@FAR 的 FAR 目标集合，逗号分隔
    #[arg(long, value_name = "LIST", value_delimiter = ',', default_value = "0.1,0.01,0.001")]
    pub far_targets: Vec<f64>,
}

impl SubCommandExtend for MetricsCommand {
    fn run(&self, opts: &Opts) -> Result<()> {
        let identification = opts.data_dir.identification_ledger();
        let verification = opts.data_dir.verification_ledger();
        if !identification.exists() && !verification.exists() {
            bail!(
                "在 {} 中没有找到任何评估结果清单，请先执行 identify 或 verify",
                opts.data_dir.path().display()
            );
        }

        if identification.exists() {
            let records = ledger::read_identification(&identification)?;
            let report = metrics::rank_report(&records, self.top_k);
            println!("--- 识别指标 (1:N) ---");
            println!("查询总数:     {}", report.total);
            println!("Rank-1 命中:  {}", report.rank1_correct);
            println!("Rank-{} 命中:  {}", report.k, report.rankk_correct);
            println!("Rank-1 准确率: {:.2}%", report.rank1_accuracy() * 100.0);
            println!("Rank-{} 准确率: {:.2}%", report.k, report.rankk_accuracy() * 100.0);
        }

        if verification.exists() {
            let pairs = ledger::read_verification(&verification)?;
            let genuine = pairs.iter().filter(|p| p.genuine).count();
            println!("--- 验证指标 (1:1) ---");
            println!("比对总数:       {}", pairs.len());
            println!("genuine 比对:   {}", genuine);
            println!("imposter 比对:  {}", pairs.len() - genuine);

            // ROC-AUC 算不出来不影响其余指标
            match metrics::roc_auc(&pairs) {
                Ok(auc) => println!("ROC-AUC: {:.6}", auc),
                Err(e @ MetricsError::InsufficientClassBalance) => {
                    println!("ROC-AUC 不可用: {}", e)
                }
            }

            for report in metrics::threshold_report(&pairs, &self.thresholds) {
                println!(
                    "准确率 @ 阈值 {:.2}: {:.2}% (TP: {}, TN: {}, FP: {}, FN: {})",
                    report.threshold,
                    report.accuracy() * 100.0,
                    report.tp,
                    report.tn,
                    report.fp,
                    report.fn_
                );
            }

            match metrics::tar_at_far(&pairs, &self.far_targets) {
                Ok(points) => {
                    for p in points {
                        println!(
                            "TAR @ FAR = {}%: {:.2}% (实际 FAR {:.4}, 阈值 ~{:.4})",
                            p.far_target * 100.0,
                            p.tar * 100.0,
                            p.far,
                            p.threshold
                        );
                    }
                }
                Err(e @ MetricsError::InsufficientClassBalance) => {
                    println!("TAR@FAR 不可用: {}", e)
                }
            }
        }

        Ok(())
    }
}
