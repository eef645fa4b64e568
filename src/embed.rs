use std::process::Command;

use image::{ImageFormat, RgbImage};
use ndarray::Array1;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("执行嵌入命令失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("嵌入命令异常退出: {0}")]
    CommandFailed(String),
    #[error("解析嵌入输出失败: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("嵌入维度不匹配: 期望 {expected}, 实际 {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("嵌入向量范数过小，无法归一化")]
    DegenerateNorm,
    #[error("图片编码失败: {0}")]
    Image(#[from] image::ImageError),
}

/// 人脸 embedding 能力接口
///
/// embedding 模型本身不属于本系统，评估器只依赖这一个注入的能力。
pub trait Embedder: Sync {
    /// 提取单张图片的 embedding，失败时由调用方跳过该样本
    fn embed(&self, image: &RgbImage) -> Result<Array1<f32>, EmbedError>;

    /// embedding 向量维度
    fn dim(&self) -> usize;
}

/// 将向量归一化为单位长度
///
/// 所有相似度计算之前都必须归一化，否则内积不再是余弦相似度。
pub fn normalize(mut v: Array1<f32>) -> Result<Array1<f32>, EmbedError> {
    let norm = v.dot(&v).sqrt();
    if !norm.is_finite() || norm <= f32::EPSILON {
        return Err(EmbedError::DegenerateNorm);
    }
    v /= norm;
    Ok(v)
}

/// 通过外部命令提取 embedding
///
/// 图片以 PNG 格式写入临时文件，命令按空白切分后把文件路径
/// 追加为最后一个参数执行，stdout 应输出一个 JSON 浮点数组。
pub struct CommandEmbedder {
    cmd: String,
    dim: usize,
}

impl CommandEmbedder {
    pub fn new(cmd: String, dim: usize) -> Self {
        Self { cmd, dim }
    }
}

impl Embedder for CommandEmbedder {
    fn embed(&self, image: &RgbImage) -> Result<Array1<f32>, EmbedError> {
        let file = tempfile::Builder::new().prefix("faceval-").suffix(".png").tempfile()?;
        image.save_with_format(file.path(), ImageFormat::Png)?;

        let mut parts = self.cmd.split_whitespace();
        let program = parts.next().ok_or_else(|| {
            EmbedError::CommandFailed("嵌入命令为空".to_string())
        })?;
        let output = Command::new(program).args(parts).arg(file.path()).output()?;
        if !output.status.success() {
            return Err(EmbedError::CommandFailed(format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let vector: Vec<f32> = serde_json::from_slice(&output.stdout)?;
        if vector.len() != self.dim {
            return Err(EmbedError::DimensionMismatch { expected: self.dim, got: vector.len() });
        }
        Ok(Array1::from(vector))
    }

    fn dim(&self) -> usize {
        self.dim
    }
}
