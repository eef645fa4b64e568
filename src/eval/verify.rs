use log::{info, warn};

use crate::dataset::QueryTask;
use crate::eval::{EvalContext, occlude_and_embed, run_pool};

/// 一次 1:1 比对的结果
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationPair {
    pub score: f32,
    pub genuine: bool,
}

/// 对查询样本批量执行 1:1 验证
///
/// 每条查询与**全部**画廊质心比对，产生 (分数, genuine/imposter)
/// 对，用于构建不依赖阈值的分数分布。真值身份不在画廊中
/// 说明切分结果与画廊状态不一致，该查询跳过并记录警告。
pub fn evaluate(ctx: &EvalContext, tasks: Vec<QueryTask>, workers: usize) -> Vec<VerificationPair> {
    let attempted = tasks.len();
    let results = run_pool(tasks, workers, |task| {
        let Some(truth) = ctx.gallery.ordinal_of(&task.identity) else {
            warn!("身份 {} 不在画廊中，跳过查询 {}", task.identity, task.group.image.display());
            return None;
        };
        let embedding = occlude_and_embed(ctx, &task)?;
        let scores = ctx.gallery.scores(&embedding);
        let pairs = scores
            .iter()
            .enumerate()
            .map(|(ordinal, &score)| VerificationPair { score, genuine: ordinal == truth })
            .collect::<Vec<_>>();
        Some(pairs)
    });

    info!(
        "验证评估完成: 尝试 {} 条查询，成功 {} 条，跳过 {} 条",
        attempted,
        results.len(),
        attempted - results.len()
    );
    results.into_iter().flatten().collect()
}
