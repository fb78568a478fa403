// 该文件是 Cheyan （车眼） 项目的一部分。
// src/capture/zoom.rs - 放大抓拍的裁剪计算
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use image::{RgbImage, imageops::FilterType};

use crate::bbox::BoundingBox;

/// 像素坐标下的裁剪区域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
  pub x: u32,
  pub y: u32,
  pub width: u32,
  pub height: u32,
}

/// 归一化坐标转像素下标，四舍五入后限制在 `[0, dimension - 1]`
pub fn pixel_bound(value: f32, dimension: u32) -> u32 {
  let max = dimension.saturating_sub(1) as i64;
  let pixel = (value * dimension as f32).round() as i64;
  pixel.clamp(0, max) as u32
}

/// 检测框对应的裁剪区域，宽高至少 1 像素
pub fn crop_region(bbox: &BoundingBox, width: u32, height: u32) -> CropRegion {
  let x1 = pixel_bound(bbox.x1, width);
  let y1 = pixel_bound(bbox.y1, height);
  let x2 = pixel_bound(bbox.x2, width);
  let y2 = pixel_bound(bbox.y2, height);

  CropRegion {
    x: x1,
    y: y1,
    width: x2.saturating_sub(x1).max(1),
    height: y2.saturating_sub(y1).max(1),
  }
}

/// 裁剪检测框区域并双线性放大回原图尺寸
pub fn zoomed_image(image: &RgbImage, bbox: &BoundingBox) -> RgbImage {
  let (width, height) = image.dimensions();
  let region = crop_region(bbox, width, height);
  let cropped =
    image::imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image();
  image::imageops::resize(&cropped, width, height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
    BoundingBox::from_center(
      (x1 + x2) / 2.0,
      (y1 + y2) / 2.0,
      x2 - x1,
      y2 - y1,
      0.9,
      0,
      "truck",
    )
  }

  #[test]
  fn right_edge_clamps_inside_frame() {
    assert_eq!(pixel_bound(1.0, 100), 99);
    assert_eq!(pixel_bound(0.0, 100), 0);
    assert_eq!(pixel_bound(-0.3, 100), 0);
    assert_eq!(pixel_bound(0.256, 100), 26);
  }

  #[test]
  fn region_follows_box() {
    let region = crop_region(&bbox(0.25, 0.5, 0.75, 1.0), 200, 100);
    assert_eq!(
      region,
      CropRegion {
        x: 50,
        y: 50,
        width: 100,
        height: 49,
      }
    );
  }

  #[test]
  fn degenerate_box_yields_one_pixel_crop() {
    let region = crop_region(&bbox(0.5, 0.5, 0.5, 0.5), 64, 48);
    assert_eq!(region.width, 1);
    assert_eq!(region.height, 1);

    let region = crop_region(&bbox(1.0, 1.0, 1.0, 1.0), 64, 48);
    assert_eq!((region.x, region.y), (63, 47));
    assert_eq!((region.width, region.height), (1, 1));
  }

  #[test]
  fn zoom_keeps_frame_dimensions() {
    let mut image = RgbImage::from_pixel(40, 30, Rgb([0, 0, 0]));
    for y in 0..15 {
      for x in 0..20 {
        image.put_pixel(x, y, Rgb([255, 0, 0]));
      }
    }
    let zoomed = zoomed_image(&image, &bbox(0.0, 0.0, 0.25, 0.25));
    assert_eq!(zoomed.dimensions(), (40, 30));
    assert_eq!(zoomed.get_pixel(20, 15), &Rgb([255, 0, 0]));
  }
}
