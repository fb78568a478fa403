// 该文件是 Cheyan （车眼） 项目的一部分。
// src/bbox.rs - 检测框定义
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

/// 检测框
///
/// 所有坐标均为相对模型输入帧的归一化坐标，取值范围 [0, 1]。
/// 角点由中心点和宽高推导而来，`w`、`h` 再由角点求差，保证 `w == x2 - x1`、`h == y2 - y1` 严格成立。
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
  /// 左上角 x
  pub x1: f32,
  /// 左上角 y
  pub y1: f32,
  /// 右下角 x
  pub x2: f32,
  /// 右下角 y
  pub y2: f32,
  /// 中心 x
  pub cx: f32,
  /// 中心 y
  pub cy: f32,
  /// 宽度
  pub w: f32,
  /// 高度
  pub h: f32,
  /// 最大类别置信度
  pub confidence: f32,
  /// 类别索引
  pub class_index: usize,
  /// 类别名称
  pub class_name: String,
}

impl BoundingBox {
  /// 由中心点与宽高构造检测框
  pub fn from_center(
    cx: f32,
    cy: f32,
    w: f32,
    h: f32,
    confidence: f32,
    class_index: usize,
    class_name: impl Into<String>,
  ) -> Self {
    let x1 = cx - w / 2.0;
    let y1 = cy - h / 2.0;
    let x2 = cx + w / 2.0;
    let y2 = cy + h / 2.0;
    Self {
      x1,
      y1,
      x2,
      y2,
      cx,
      cy,
      w: x2 - x1,
      h: y2 - y1,
      confidence,
      class_index,
      class_name: class_name.into(),
    }
  }

  /// 所有角点都落在 [0, 1] 之内，且宽高非负
  pub fn is_within_frame(&self) -> bool {
    let unit = 0.0..=1.0;
    self.x1 <= self.x2
      && self.y1 <= self.y2
      && unit.contains(&self.x1)
      && unit.contains(&self.y1)
      && unit.contains(&self.x2)
      && unit.contains(&self.y2)
  }

  /// 由角点计算的面积，退化框为 0
  pub fn area(&self) -> f32 {
    (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
  }

  /// 计算两个检测框的 IoU
  ///
  /// 并集面积为 0（两个退化框）时返回 0，不会返回 NaN。
  pub fn iou(&self, other: &BoundingBox) -> f32 {
    let x1 = self.x1.max(other.x1);
    let y1 = self.y1.max(other.y1);
    let x2 = self.x2.min(other.x2);
    let y2 = self.y2.min(other.y2);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = self.area() + other.area() - intersection;

    if union > 0.0 {
      let iou = intersection / union;
      if iou.is_finite() { iou } else { 0.0 }
    } else {
      0.0
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn boxed(x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
    BoundingBox::from_center(
      (x1 + x2) / 2.0,
      (y1 + y2) / 2.0,
      x2 - x1,
      y2 - y1,
      0.9,
      0,
      "car",
    )
  }

  #[test]
  fn corners_follow_center_and_size() {
    let b = BoundingBox::from_center(0.5, 0.5, 0.2, 0.4, 0.8, 2, "bus");
    assert!((b.x1 - 0.4).abs() < 1e-6);
    assert!((b.y1 - 0.3).abs() < 1e-6);
    assert!((b.x2 - 0.6).abs() < 1e-6);
    assert!((b.y2 - 0.7).abs() < 1e-6);
    assert!((b.w - 0.2).abs() < 1e-6);
    assert!((b.h - 0.4).abs() < 1e-6);
    assert!(b.is_within_frame());
  }

  #[test]
  fn size_matches_corners_exactly() {
    for i in 0..50 {
      let t = i as f32 / 50.0;
      let b = BoundingBox::from_center(0.06 + t * 0.88, 0.5, 0.01 + t * 0.38, 0.2, 0.9, 0, "car");
      assert_eq!(b.x2 - b.x1, b.w);
      assert_eq!(b.y2 - b.y1, b.h);
    }
  }

  #[test]
  fn iou_of_box_with_itself_is_one() {
    let a = boxed(0.1, 0.2, 0.5, 0.7);
    assert_eq!(a.iou(&a), 1.0);
  }

  #[test]
  fn iou_is_symmetric() {
    let pairs = [
      (boxed(0.1, 0.1, 0.5, 0.5), boxed(0.3, 0.3, 0.7, 0.7)),
      (boxed(0.0, 0.0, 1.0, 1.0), boxed(0.25, 0.25, 0.5, 0.5)),
      (boxed(0.1, 0.1, 0.2, 0.2), boxed(0.6, 0.6, 0.9, 0.9)),
      (boxed(0.33, 0.17, 0.71, 0.59), boxed(0.21, 0.44, 0.93, 0.88)),
    ];
    for (a, b) in &pairs {
      assert_eq!(a.iou(b), b.iou(a));
    }
  }

  #[test]
  fn disjoint_boxes_have_zero_iou() {
    let a = boxed(0.0, 0.0, 0.2, 0.2);
    let b = boxed(0.5, 0.5, 0.8, 0.8);
    assert_eq!(a.iou(&b), 0.0);
  }

  #[test]
  fn degenerate_boxes_never_produce_nan() {
    let a = BoundingBox::from_center(0.5, 0.5, 0.0, 0.0, 0.9, 0, "car");
    let b = a.clone();
    assert_eq!(a.iou(&b), 0.0);

    let line = BoundingBox::from_center(0.5, 0.5, 0.3, 0.0, 0.9, 0, "car");
    assert_eq!(line.iou(&a), 0.0);
  }

  #[test]
  fn boxes_crossing_the_frame_are_detected() {
    let b = BoundingBox::from_center(0.05, 0.5, 0.2, 0.2, 0.9, 0, "van");
    assert!(!b.is_within_frame());

    let inverted = BoundingBox::from_center(0.5, 0.5, -0.2, 0.2, 0.9, 0, "van");
    assert!(!inverted.is_within_frame());
  }
}
