use thiserror::Error;

use crate::eval::identify::QueryRecord;
use crate::eval::verify::VerificationPair;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("计算 ROC 指标需要同时存在 genuine 与 imposter 比对")]
    InsufficientClassBalance,
}

/// 识别指标汇总
#[derive(Debug, Clone)]
pub struct RankReport {
    pub total: usize,
    pub rank1_correct: usize,
    pub rankk_correct: usize,
    pub k: usize,
}

impl RankReport {
    pub fn rank1_accuracy(&self) -> f64 {
        ratio(self.rank1_correct, self.total)
    }

    pub fn rankk_accuracy(&self) -> f64 {
        ratio(self.rankk_correct, self.total)
    }
}

/// 单个阈值下的验证准确率与混淆计数
///
/// 决策规则：score >= threshold 判为同一人。
#[derive(Debug, Clone)]
pub struct ThresholdReport {
    pub threshold: f32,
    pub tp: usize,
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
}

impl ThresholdReport {
    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.tp + self.tn + self.fp + self.fn_)
    }
}

/// ROC 曲线上的一个工作点
#[derive(Debug, Clone, Copy)]
pub struct RocPoint {
    pub far: f64,
    pub tar: f64,
    pub threshold: f32,
}

/// 某个 FAR 目标下实际取到的工作点
#[derive(Debug, Clone, Copy)]
pub struct TarAtFar {
    pub far_target: f64,
    pub far: f64,
    pub tar: f64,
    pub threshold: f32,
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 { 0.0 } else { part as f64 / total as f64 }
}

/// 从识别结果统计 rank-1 / rank-K 准确率
///
/// rank-1 命中必然也是 rank-K 命中，所以 rank1_correct 永远
/// 不超过 rankk_correct。
pub fn rank_report(records: &[QueryRecord], k: usize) -> RankReport {
    let mut rank1_correct = 0;
    let mut rankk_correct = 0;
    for record in records {
        if record.correct_top1() {
            rank1_correct += 1;
        }
        if record.top.iter().take(k).any(|(id, _)| *id == record.identity) {
            rankk_correct += 1;
        }
    }
    RankReport { total: records.len(), rank1_correct, rankk_correct, k }
}

fn class_counts(pairs: &[VerificationPair]) -> Result<(usize, usize), MetricsError> {
    let genuine = pairs.iter().filter(|p| p.genuine).count();
    let imposter = pairs.len() - genuine;
    if genuine == 0 || imposter == 0 {
        return Err(MetricsError::InsufficientClassBalance);
    }
    Ok((genuine, imposter))
}

/// Mann-Whitney 秩和法计算 ROC-AUC，并列分数取平均秩
pub fn roc_auc(pairs: &[VerificationPair]) -> Result<f64, MetricsError> {
    let (genuine, imposter) = class_counts(pairs)?;

    let mut sorted: Vec<(f32, bool)> = pairs.iter().map(|p| (p.score, p.genuine)).collect();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut rank_sum = 0.0f64;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j < sorted.len() && sorted[j].0 == sorted[i].0 {
            j += 1;
        }
        // 秩从 1 开始，并列组 [i, j) 共享平均秩
        let avg_rank = (i + 1 + j) as f64 / 2.0;
        for entry in &sorted[i..j] {
            if entry.1 {
                rank_sum += avg_rank;
            }
        }
        i = j;
    }

    let genuine = genuine as f64;
    let imposter = imposter as f64;
    Ok((rank_sum - genuine * (genuine + 1.0) / 2.0) / (genuine * imposter))
}

/// 在给定的阈值集合上计算验证准确率与 TP/TN/FP/FN
pub fn threshold_report(pairs: &[VerificationPair], thresholds: &[f32]) -> Vec<ThresholdReport> {
    thresholds
        .iter()
        .map(|&threshold| {
            let mut report = ThresholdReport { threshold, tp: 0, tn: 0, fp: 0, fn_: 0 };
            for pair in pairs {
                let accept = pair.score >= threshold;
                match (accept, pair.genuine) {
                    (true, true) => report.tp += 1,
                    (false, false) => report.tn += 1,
                    (true, false) => report.fp += 1,
                    (false, true) => report.fn_ += 1,
                }
            }
            report
        })
        .collect()
}

/// 从分数分布计算 ROC 曲线
///
/// 阈值从高到低扫过每个不同的分数值，FAR 与 TAR 都随之
/// 单调非降。曲线以 (0, 0)、阈值 +inf 的锚点开始。
pub fn roc_curve(pairs: &[VerificationPair]) -> Result<Vec<RocPoint>, MetricsError> {
    let (genuine, imposter) = class_counts(pairs)?;

    let mut sorted: Vec<(f32, bool)> = pairs.iter().map(|p| (p.score, p.genuine)).collect();
    sorted.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut curve = vec![RocPoint { far: 0.0, tar: 0.0, threshold: f32::INFINITY }];
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut i = 0;
    while i < sorted.len() {
        let threshold = sorted[i].0;
        while i < sorted.len() && sorted[i].0 == threshold {
            if sorted[i].1 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        curve.push(RocPoint {
            far: fp as f64 / imposter as f64,
            tar: tp as f64 / genuine as f64,
            threshold,
        });
    }
    Ok(curve)
}

/// TAR@FAR：对每个 FAR 目标取 FAR 不超过目标的最近工作点
///
/// 曲线上未必存在 FAR 恰好等于目标的点，这里永远向下取最近
/// 工作点而不是精确匹配。(0, 0) 锚点保证总有点可取。
pub fn tar_at_far(
    pairs: &[VerificationPair],
    far_targets: &[f64],
) -> Result<Vec<TarAtFar>, MetricsError> {
    let curve = roc_curve(pairs)?;
    Ok(far_targets
        .iter()
        .map(|&far_target| {
            let point = curve
                .iter()
                .filter(|p| p.far <= far_target)
                .last()
                .expect("roc curve always starts at far = 0");
            TarAtFar { far_target, far: point.far, tar: point.tar, threshold: point.threshold }
        })
        .collect())
}
