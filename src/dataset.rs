use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::info;
use regex::Regex;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("目录 {0} 中没有找到任何带元数据的样本")]
    NoSamples(PathBuf),
    #[error("扫描目录失败: {0}")]
    Walk(#[from] walkdir::Error),
}

/// 一次物理采集：一张图片和与之配对的检测元数据文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleGroup {
    pub image: PathBuf,
    pub metadata: PathBuf,
}

/// 一个身份及其全部采集组，采集组按路径排序
#[derive(Debug, Clone)]
pub struct IdentitySamples {
    pub identity: String,
    pub groups: Vec<SampleGroup>,
}

/// 一个身份的注册样本集合
#[derive(Debug, Clone)]
pub struct EnrollmentSet {
    pub identity: String,
    pub groups: Vec<SampleGroup>,
}

/// 一条查询任务：身份真值加一个查询采集组
#[derive(Debug, Clone)]
pub struct QueryTask {
    pub identity: String,
    pub group: SampleGroup,
}

/// 扫描数据集目录，收集所有图片与元数据配对完整的采集组
///
/// 目录结构为 <root>/<身份>/<采集组>/<图片>，元数据是图片的
/// 同名 .json 文件。没有元数据的图片无法参与遮挡合成，直接忽略。
/// 返回结果按身份、采集组路径排序，保证多次扫描结果一致。
pub fn discover(root: &Path, suffix: &str) -> Result<Vec<IdentitySamples>, DiscoveryError> {
    let re_suf = format!("(?i)^({})$", suffix.replace(',', "|"));
    let re_suf = Regex::new(&re_suf).expect("failed to build regex");

    let mut identities: BTreeMap<String, BTreeMap<PathBuf, SampleGroup>> = BTreeMap::new();
    let mut total = 0usize;

    for entry in WalkDir::new(root) {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(ext) = path.extension() else {
            continue;
        };
        if !re_suf.is_match(&ext.to_string_lossy()) {
            continue;
        }
        total += 1;

        let metadata = path.with_extension("json");
        if !metadata.exists() {
            continue;
        }

        // 采集组目录的上一级目录名即身份
        let Some(group_dir) = path.parent() else {
            continue;
        };
        let Some(identity) = group_dir.parent().and_then(|p| p.file_name()) else {
            continue;
        };

        identities.entry(identity.to_string_lossy().to_string()).or_default().insert(
            group_dir.to_path_buf(),
            SampleGroup { image: path.to_path_buf(), metadata },
        );
    }

    if identities.is_empty() {
        return Err(DiscoveryError::NoSamples(root.to_path_buf()));
    }

    let identities = identities
        .into_iter()
        .map(|(identity, groups)| IdentitySamples {
            identity,
            groups: groups.into_values().collect(),
        })
        .collect::<Vec<_>>();

    info!(
        "扫描完成: {} 张图片，其中 {} 个身份拥有完整的图片/元数据配对",
        total,
        identities.len()
    );

    Ok(identities)
}

/// 按固定比例把一个身份的采集组切分为注册/查询两半
///
/// 切分点为 max(1, floor(n * ratio))，输入已排序，
/// 因此相同输入总是得到相同切分。只有一个采集组的身份
/// 全部进入注册集，不贡献查询。
pub fn partition(samples: &IdentitySamples, ratio: f32) -> (&[SampleGroup], &[SampleGroup]) {
    let n = samples.groups.len();
    let split = ((n as f32 * ratio).floor() as usize).max(1).min(n);
    samples.groups.split_at(split)
}

/// 收集所有身份的注册样本集合
pub fn enrollment_sets(samples: &[IdentitySamples], ratio: f32) -> Vec<EnrollmentSet> {
    samples
        .iter()
        .map(|s| {
            let (enroll, _) = partition(s, ratio);
            EnrollmentSet { identity: s.identity.clone(), groups: enroll.to_vec() }
        })
        .collect()
}

/// 收集所有身份的查询任务
pub fn query_tasks(samples: &[IdentitySamples], ratio: f32) -> Vec<QueryTask> {
    samples
        .iter()
        .flat_map(|s| {
            let (_, query) = partition(s, ratio);
            query
                .iter()
                .map(|g| QueryTask { identity: s.identity.clone(), group: g.clone() })
                .collect::<Vec<_>>()
        })
        .collect()
}
