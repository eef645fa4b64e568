use log::info;

use crate::dataset::QueryTask;
use crate::eval::{EvalContext, occlude_and_embed, run_pool};

/// 一条识别查询的结果：身份真值与按相似度降序的 top-K 列表
#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub identity: String,
    pub top: Vec<(String, f32)>,
}

impl QueryRecord {
    /// rank-1 命中：最相似的画廊身份等于真值
    pub fn correct_top1(&self) -> bool {
        self.top.first().is_some_and(|(id, _)| *id == self.identity)
    }

    /// rank-K 命中：真值出现在 top-K 列表的任意位置
    pub fn correct_topk(&self) -> bool {
        self.top.iter().any(|(id, _)| *id == self.identity)
    }
}

/// 对查询样本批量执行 1:N 识别
///
/// 每条查询：遮挡、嵌入、归一化，再与全部画廊质心比相似度
/// 取 top-K。嵌入失败的查询被跳过，既不算对也不算错。
pub fn evaluate(
    ctx: &EvalContext,
    tasks: Vec<QueryTask>,
    top_k: usize,
    workers: usize,
) -> Vec<QueryRecord> {
    let attempted = tasks.len();
    let records = run_pool(tasks, workers, |task| {
        let embedding = occlude_and_embed(ctx, &task)?;
        let top = ctx
            .gallery
            .search(&embedding, top_k)
            .into_iter()
            .map(|(ordinal, score)| (ctx.gallery.identity(ordinal).to_string(), score))
            .collect();
        Some(QueryRecord { identity: task.identity, top })
    });

    info!(
        "识别评估完成: 尝试 {} 条查询，成功 {} 条，跳过 {} 条",
        attempted,
        records.len(),
        attempted - records.len()
    );
    records
}
