pub mod identify;
pub mod verify;

use std::path::Path;
use std::sync::Mutex;
use std::thread;

use crossbeam_channel::bounded;
use indicatif::ProgressBar;
use log::warn;
use ndarray::Array1;

use crate::dataset::QueryTask;
use crate::detect::Detection;
use crate::embed::{Embedder, normalize};
use crate::gallery::Gallery;
use crate::occlusion::apply_occlusion;
use crate::utils::{imread, pb_style};

/// 评估上下文
///
/// 画廊矩阵与 embedding 能力在工作线程启动前加载完毕，
/// 评估期间只读共享，工作线程之间无需任何加锁。
pub struct EvalContext<'a> {
    pub gallery: &'a Gallery,
    pub embedder: &'a dyn Embedder,
    /// 遮挡条带总高度（像素）
    pub occlusion_size: u32,
    /// 遮挡图片的留档目录，None 表示不留档
    pub audit_dir: Option<&'a Path>,
}

/// 有界工作线程池：任务经有界通道分发给固定数量的工作线程
///
/// 结果在所有线程结束后统一收集，顺序与提交顺序无关——
/// 每条结果自带真值，清单顺序不影响指标。返回 None 的任务
/// 视为跳过，不计入结果。
pub fn run_pool<T, R, F>(tasks: Vec<T>, workers: usize, f: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> Option<R> + Sync,
{
    let pb = ProgressBar::new(tasks.len() as u64).with_style(pb_style());
    let results = Mutex::new(Vec::new());

    thread::scope(|s| {
        let (tx, rx) = bounded::<T>(workers * 2);

        for _ in 0..workers.max(1) {
            let rx = rx.clone();
            let f = &f;
            let results = &results;
            let pb = &pb;
            s.spawn(move || {
                while let Ok(task) = rx.recv() {
                    if let Some(r) = f(task) {
                        results.lock().unwrap().push(r);
                    }
                    pb.inc(1);
                }
            });
        }
        drop(rx);

        for task in tasks {
            tx.send(task).expect("worker pool closed unexpectedly");
        }
        drop(tx);
    });

    pb.finish_and_clear();
    results.into_inner().unwrap()
}

/// 读取查询图片，施加遮挡并提取归一化后的 embedding
///
/// 任何一步失败都只影响当前样本：记录警告并返回 None，
/// 批处理照常继续。元数据不可读属于样本跳过；元数据可读
/// 但缺少眼部关键点时遮挡退化为直通，样本仍然参与评估。
pub(crate) fn occlude_and_embed(ctx: &EvalContext, task: &QueryTask) -> Option<Array1<f32>> {
    let image = match imread(&task.group.image) {
        Ok(image) => image,
        Err(e) => {
            warn!("跳过查询样本: {}", e);
            return None;
        }
    };

    let det = match Detection::from_path(&task.group.metadata) {
        Ok(det) => det,
        Err(e) => {
            warn!("跳过查询样本 {}: {}", task.group.metadata.display(), e);
            return None;
        }
    };

    let occluded = apply_occlusion(&image, &det, ctx.occlusion_size);

    // 留档失败不影响评估结果
    if let Some(dir) = ctx.audit_dir {
        let name = task.group.image.file_name().unwrap_or_default().to_string_lossy();
        let path = dir.join(format!("occluded_{}_{}", task.identity, name));
        if let Err(e) = occluded.save(&path) {
            warn!("保存遮挡图片失败 {}: {}", path.display(), e);
        }
    }

    let embedding = match ctx.embedder.embed(&occluded) {
        Ok(v) => v,
        Err(e) => {
            warn!("提取 embedding 失败 {}: {}", task.group.image.display(), e);
            return None;
        }
    };
    match normalize(embedding) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("归一化 embedding 失败 {}: {}", task.group.image.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_run_pool_collects_all_results() {
        let tasks: Vec<usize> = (0..100).collect();
        let mut results = run_pool(tasks, 4, |n| Some(n * 2));
        results.sort();
        assert_eq!(results, (0..100).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_run_pool_skips_none() {
        let tasks: Vec<usize> = (0..10).collect();
        let results = run_pool(tasks, 2, |n| (n % 2 == 0).then_some(n));
        let results: HashSet<usize> = results.into_iter().collect();
        assert_eq!(results, HashSet::from([0, 2, 4, 6, 8]));
    }

    #[test]
    fn test_run_pool_single_worker() {
        let results = run_pool(vec![1, 2, 3], 1, Some);
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_run_pool_empty_tasks() {
        let results = run_pool(Vec::<usize>::new(), 4, Some);
        assert!(results.is_empty());
    }
}
