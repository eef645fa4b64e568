use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use indicatif::{ParallelProgressIterator, ProgressBar};
use log::{info, warn};
use ndarray::{Array1, Array2, ArrayView1};
use ndarray_npy::{ReadNpyError, WriteNpyError, read_npy, write_npy};
use rayon::prelude::*;
use thiserror::Error;

use crate::config::DataDir;
use crate::dataset::EnrollmentSet;
use crate::embed::{Embedder, normalize};
use crate::utils::{imread, pb_style};

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("画廊为空：没有任何身份产生可用的 embedding")]
    Empty,
    #[error("画廊文件缺失: {0}，请先执行 build")]
    Missing(PathBuf),
    #[error("画廊向量存储读取失败: {0}")]
    ReadVectors(#[from] ReadNpyError),
    #[error("画廊向量存储写入失败: {0}")]
    WriteVectors(#[from] WriteNpyError),
    #[error("序号映射损坏: {0}")]
    Mapping(String),
    #[error("画廊维度不匹配: 期望 {expected}, 实际 {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// 注册画廊：每个身份一行单位范数的质心向量
///
/// 序号即矩阵行号。身份列表与向量矩阵必须作为整体读写，
/// 分开加载会导致序号映射漂移，所以两个文件都由本结构管理。
pub struct Gallery {
    identities: Vec<String>,
    ordinals: HashMap<String, usize>,
    matrix: Array2<f32>,
}

impl Gallery {
    pub fn new(entries: Vec<(String, Array1<f32>)>) -> Result<Self, GalleryError> {
        let Some(dim) = entries.first().map(|(_, v)| v.len()) else {
            return Err(GalleryError::Empty);
        };

        let mut identities = Vec::with_capacity(entries.len());
        let mut matrix = Array2::zeros((entries.len(), dim));
        for (i, (identity, vector)) in entries.into_iter().enumerate() {
            matrix.row_mut(i).assign(&vector);
            identities.push(identity);
        }

        let ordinals =
            identities.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();
        Ok(Self { identities, ordinals, matrix })
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.matrix.ncols()
    }

    /// 序号对应的身份
    pub fn identity(&self, ordinal: usize) -> &str {
        &self.identities[ordinal]
    }

    /// 身份对应的序号，不在画廊中时返回 None
    pub fn ordinal_of(&self, identity: &str) -> Option<usize> {
        self.ordinals.get(identity).copied()
    }

    pub fn centroid(&self, ordinal: usize) -> ArrayView1<'_, f32> {
        self.matrix.row(ordinal)
    }

    /// 查询向量与所有质心的余弦相似度（双方都是单位向量，即内积）
    pub fn scores(&self, query: &Array1<f32>) -> Array1<f32> {
        self.matrix.dot(query)
    }

    /// top-k 检索，按相似度降序返回 (序号, 分数)
    ///
    /// 分数相同时序号小的排前，即先注册的身份优先，保证结果确定。
    pub fn search(&self, query: &Array1<f32>, k: usize) -> Vec<(usize, f32)> {
        let scores = self.scores(query);
        let mut ordinals: Vec<usize> = (0..self.len()).collect();
        ordinals.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
        ordinals.truncate(k);
        ordinals.into_iter().map(|i| (i, scores[i])).collect()
    }

    /// 原子地持久化画廊：向量存储与序号映射成对写入
    ///
    /// 两个文件都先写到 .tmp 再重命名，中断的构建不会留下
    /// 看似完整实则缺损的画廊。
    pub fn save(&self, dir: &DataDir) -> Result<(), GalleryError> {
        fs::create_dir_all(dir.path())?;

        let vectors = dir.gallery_vectors();
        let mapping = dir.gallery_mapping();
        let vectors_tmp = vectors.with_extension("npy.tmp");
        let mapping_tmp = mapping.with_extension("json.tmp");

        write_npy(&vectors_tmp, &self.matrix)?;

        let map: HashMap<String, &String> =
            self.identities.iter().enumerate().map(|(i, id)| (i.to_string(), id)).collect();
        fs::write(&mapping_tmp, serde_json::to_vec(&map)?)?;

        fs::rename(&vectors_tmp, &vectors)?;
        fs::rename(&mapping_tmp, &mapping)?;
        Ok(())
    }

    /// 成对加载画廊，校验维度与映射完整性
    pub fn load(dir: &DataDir, expected_dim: usize) -> Result<Self, GalleryError> {
        let vectors = dir.gallery_vectors();
        let mapping = dir.gallery_mapping();
        for path in [&vectors, &mapping] {
            if !path.exists() {
                return Err(GalleryError::Missing(path.clone()));
            }
        }

        let matrix: Array2<f32> = read_npy(&vectors)?;
        if matrix.ncols() != expected_dim {
            return Err(GalleryError::DimensionMismatch {
                expected: expected_dim,
                got: matrix.ncols(),
            });
        }

        let map: HashMap<String, String> = serde_json::from_slice(&fs::read(&mapping)?)?;
        if map.len() != matrix.nrows() {
            return Err(GalleryError::Mapping(format!(
                "映射条目数 {} 与向量行数 {} 不一致",
                map.len(),
                matrix.nrows()
            )));
        }
        let identities = (0..matrix.nrows())
            .map(|i| {
                map.get(&i.to_string())
                    .cloned()
                    .ok_or_else(|| GalleryError::Mapping(format!("缺少序号 {}", i)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let ordinals =
            identities.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();
        Ok(Self { identities, ordinals, matrix })
    }
}

/// 为每个身份嵌入全部注册样本并聚合为质心
///
/// 单个样本嵌入失败只是跳过；一个身份的全部样本都失败时，
/// 该身份不进入画廊并记录警告。质心取成功 embedding 的均值
/// 再归一化——这里假设同一身份的 embedding 可以凸组合，
/// 是建模假设而非模型保证。
pub fn build(sets: &[EnrollmentSet], embedder: &dyn Embedder) -> Result<Gallery, GalleryError> {
    let pb = ProgressBar::new(sets.len() as u64).with_style(pb_style());

    let entries = sets
        .par_iter()
        .progress_with(pb)
        .map(|set| {
            let mut sum = Array1::<f32>::zeros(embedder.dim());
            let mut count = 0usize;
            for group in &set.groups {
                let embedding = imread(&group.image)
                    .map_err(|e| e.to_string())
                    .and_then(|image| embedder.embed(&image).map_err(|e| e.to_string()))
                    .and_then(|v| normalize(v).map_err(|e| e.to_string()));
                match embedding {
                    Ok(v) => {
                        sum += &v;
                        count += 1;
                    }
                    Err(e) => {
                        warn!("跳过注册样本 {}: {}", group.image.display(), e);
                    }
                }
            }
            if count == 0 {
                warn!("身份 {} 没有可用的注册 embedding，不进入画廊", set.identity);
                return None;
            }
            let mean = sum / count as f32;
            match normalize(mean) {
                Ok(centroid) => Some((set.identity.clone(), centroid)),
                Err(e) => {
                    warn!("身份 {} 的质心无法归一化: {}", set.identity, e);
                    None
                }
            }
        })
        .collect::<Vec<_>>();

    let enrolled = entries.into_iter().flatten().collect::<Vec<_>>();
    info!("画廊构建: 尝试 {} 个身份，成功注册 {} 个", sets.len(), enrolled.len());
    Gallery::new(enrolled)
}
