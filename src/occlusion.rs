use image::{Rgb, RgbImage};
use log::warn;

use crate::detect::Detection;

/// 在眼睛高度处涂抹一条黑色遮挡带，返回新图片
///
/// 条带横向覆盖检测框的整个宽度，纵向以双眼中心为中线，
/// 上下各占 band_height / 2，越界部分裁剪到图像范围内。
/// 左右眼关键点缺失时无法定位条带，此时返回未修改的副本
/// 并记录警告，调用方照常继续。
pub fn apply_occlusion(image: &RgbImage, det: &Detection, band_height: u32) -> RgbImage {
    let mut out = image.clone();

    let Some(eye_y) = det.eye_center_y() else {
        warn!("缺少左右眼关键点，遮挡退化为直通");
        return out;
    };

    let (width, height) = (out.width() as i64, out.height() as i64);
    let half = (band_height / 2) as i64;
    let eye_y = eye_y as i64;

    let x1 = (det.bbox[0] as i64).clamp(0, width);
    let x2 = (det.bbox[2] as i64).clamp(0, width);
    let y1 = (eye_y - half).clamp(0, height);
    let y2 = (eye_y + half).clamp(0, height);

    for y in y1..y2 {
        for x in x1..x2 {
            out.put_pixel(x as u32, y as u32, Rgb([0, 0, 0]));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn white_image(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
    }

    fn detection(bbox: [f32; 4], eyes: &[(&str, [f32; 2])]) -> Detection {
        let landmarks =
            eyes.iter().map(|(k, v)| (k.to_string(), *v)).collect::<HashMap<_, _>>();
        Detection { bbox, landmarks }
    }

    #[test]
    fn test_band_covers_eye_region() {
        let image = white_image(20, 20);
        let det = detection(
            [2.0, 0.0, 18.0, 20.0],
            &[("left_eye", [5.0, 9.0]), ("right_eye", [15.0, 11.0])],
        );
        let out = apply_occlusion(&image, &det, 6);

        // 眼睛中心 y = 10，条带覆盖 7..13 行、2..18 列
        assert_eq!(*out.get_pixel(10, 10), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(2, 7), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(17, 12), Rgb([0, 0, 0]));
        // 条带之外不受影响
        assert_eq!(*out.get_pixel(10, 6), Rgb([255, 255, 255]));
        assert_eq!(*out.get_pixel(10, 13), Rgb([255, 255, 255]));
        assert_eq!(*out.get_pixel(1, 10), Rgb([255, 255, 255]));
        assert_eq!(*out.get_pixel(18, 10), Rgb([255, 255, 255]));
        // 原图不被修改
        assert_eq!(*image.get_pixel(10, 10), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_band_clipped_to_image_bounds() {
        let image = white_image(10, 10);
        let det = detection(
            [-5.0, 0.0, 50.0, 10.0],
            &[("left_eye", [3.0, 1.0]), ("right_eye", [7.0, 1.0])],
        );
        let out = apply_occlusion(&image, &det, 30);
        // 条带纵向越界，整张图被覆盖也不会 panic
        assert_eq!(*out.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(9, 9), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_missing_eye_is_passthrough() {
        let image = white_image(8, 8);
        let det = detection([0.0, 0.0, 8.0, 8.0], &[("right_eye", [4.0, 4.0])]);
        let out = apply_occlusion(&image, &det, 4);
        assert_eq!(out, image);
    }

    #[test]
    fn test_degenerate_bbox_is_noop() {
        let image = white_image(8, 8);
        let det = detection(
            [6.0, 0.0, 2.0, 8.0],
            &[("left_eye", [4.0, 4.0]), ("right_eye", [4.0, 4.0])],
        );
        // x2 < x1 时填充区域为空
        let out = apply_occlusion(&image, &det, 4);
        assert_eq!(out, image);
    }
}
