use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("读取元数据失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("解析元数据失败: {0}")]
    Parse(#[from] serde_json::Error),
}

/// 人脸检测元数据，由外部检测器产生并以 .json 文件随图片保存
///
/// bbox 为 [x1, y1, x2, y2]，landmarks 为命名关键点到 [x, y] 的映射。
/// bbox 与 landmarks 两个字段缺失即解析失败；个别关键点缺失
/// 不影响解析，由使用方决定如何降级。
#[derive(Debug, Clone, Deserialize)]
pub struct Detection {
    pub bbox: [f32; 4],
    pub landmarks: HashMap<String, [f32; 2]>,
}

impl Detection {
    pub fn from_path(path: &Path) -> Result<Self, MetadataError> {
        let data = fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// 双眼中心的纵坐标，左右眼任一关键点缺失时返回 None
    pub fn eye_center_y(&self) -> Option<f32> {
        let left = self.landmarks.get("left_eye")?;
        let right = self.landmarks.get("right_eye")?;
        Some((left[1] + right[1]) / 2.0)
    }
}
