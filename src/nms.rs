// 该文件是 Cheyan （车眼） 项目的一部分。
// src/nms.rs - 非极大值抑制
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

use tracing::debug;

use crate::bbox::BoundingBox;

/// 贪心非极大值抑制（不区分类别）
///
/// 按置信度降序排序，置信度相同的候选保持输入顺序（稳定排序）。
/// 每轮保留剩余候选中置信度最高者，并移除与其 IoU `>= iou_threshold` 的候选。
pub fn suppress(mut boxes: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
  let candidates = boxes.len();
  boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

  let mut kept: Vec<BoundingBox> = Vec::with_capacity(boxes.len());

  // 已排序，依次检查是否被先保留的框抑制，与逐轮移除等价
  for candidate in boxes {
    if kept.iter().all(|best| best.iou(&candidate) < iou_threshold) {
      kept.push(candidate);
    }
  }

  debug!("NMS: {} 个候选, 保留 {} 个", candidates, kept.len());
  kept
}

#[cfg(test)]
mod tests {
  use super::*;

  fn boxed(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, class_index: usize) -> BoundingBox {
    BoundingBox::from_center(
      (x1 + x2) / 2.0,
      (y1 + y2) / 2.0,
      x2 - x1,
      y2 - y1,
      confidence,
      class_index,
      format!("class{class_index}"),
    )
  }

  #[test]
  fn overlapping_lower_confidence_box_is_removed() {
    let a = boxed(0.1, 0.1, 0.5, 0.5, 0.7, 0);
    let b = boxed(0.12, 0.12, 0.52, 0.52, 0.9, 1);
    assert!(a.iou(&b) >= 0.4);

    let kept = suppress(vec![a, b.clone()], 0.4);
    assert_eq!(kept, vec![b]);
  }

  #[test]
  fn weakly_overlapping_boxes_both_survive() {
    let a = boxed(0.0, 0.0, 0.4, 0.4, 0.7, 0);
    let b = boxed(0.3, 0.3, 0.7, 0.7, 0.9, 0);
    assert!(a.iou(&b) < 0.4);

    let kept = suppress(vec![a.clone(), b.clone()], 0.4);
    assert_eq!(kept, vec![b, a]);
  }

  #[test]
  fn suppression_is_class_agnostic() {
    let truck = boxed(0.2, 0.2, 0.6, 0.6, 0.8, 1);
    let bus = boxed(0.2, 0.2, 0.6, 0.6, 0.6, 2);
    let kept = suppress(vec![bus, truck.clone()], 0.4);
    assert_eq!(kept, vec![truck]);
  }

  #[test]
  fn ties_keep_scan_order() {
    let first = boxed(0.1, 0.1, 0.3, 0.3, 0.8, 0);
    let second = boxed(0.11, 0.11, 0.31, 0.31, 0.8, 1);
    let kept = suppress(vec![first.clone(), second], 0.4);
    assert_eq!(kept, vec![first]);
  }

  #[test]
  fn suppression_is_idempotent() {
    let boxes = vec![
      boxed(0.1, 0.1, 0.4, 0.4, 0.95, 0),
      boxed(0.12, 0.1, 0.42, 0.41, 0.85, 0),
      boxed(0.3, 0.3, 0.6, 0.6, 0.8, 1),
      boxed(0.5, 0.5, 0.9, 0.9, 0.75, 2),
      boxed(0.55, 0.52, 0.88, 0.93, 0.7, 2),
      boxed(0.0, 0.6, 0.2, 1.0, 0.6, 3),
    ];
    let once = suppress(boxes, 0.4);
    let twice = suppress(once.clone(), 0.4);
    assert_eq!(once, twice);
  }

  #[test]
  fn degenerate_boxes_are_not_suppressed() {
    let a = boxed(0.5, 0.5, 0.5, 0.5, 0.9, 0);
    let b = boxed(0.5, 0.5, 0.5, 0.5, 0.8, 0);
    let kept = suppress(vec![a, b], 0.4);
    assert_eq!(kept.len(), 2);
  }

  #[test]
  fn empty_input_yields_empty_output() {
    assert!(suppress(Vec::new(), 0.4).is_empty());
  }
}
