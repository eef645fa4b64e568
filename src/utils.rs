use std::path::Path;

use anyhow::{Context, Result};
use image::RgbImage;
use indicatif::ProgressStyle;

/// 读取图片并转换为 RGB 格式
pub fn imread(path: &Path) -> Result<RgbImage> {
    let image = image::open(path).with_context(|| format!("读取图片失败: {}", path.display()))?;
    Ok(image.to_rgb8())
}

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template("{wide_bar} {pos}/{len} ({eta}) {msg}")
        .expect("failed to build progress style")
}
