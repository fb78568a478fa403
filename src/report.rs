// 该文件是 Cheyan （车眼） 项目的一部分。
// src/report.rs - 检测结果输出
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

use serde_json::{Value, json};
use tracing::{debug, info};

use crate::{bbox::BoundingBox, pipeline::DetectListener};

pub fn bbox_to_json(bbox: &BoundingBox) -> Value {
  json!({
    "class": bbox.class_name,
    "class_index": bbox.class_index,
    "confidence": bbox.confidence,
    "box": [bbox.x1, bbox.y1, bbox.x2, bbox.y2],
  })
}

/// 一帧检测结果对应的一行 JSON
pub fn detection_to_json(boxes: &[BoundingBox], elapsed_ms: u64) -> Value {
  json!({
    "elapsed_ms": elapsed_ms,
    "detections": boxes.iter().map(bbox_to_json).collect::<Vec<_>>(),
  })
}

/// 把检测结果写入日志，或以 JSON 行输出到标准输出
#[derive(Debug, Default, Clone, Copy)]
pub struct ReportListener {
  json: bool,
}

impl ReportListener {
  pub fn new(json: bool) -> Self {
    Self { json }
  }
}

impl DetectListener for ReportListener {
  fn on_empty_detect(&self) {
    debug!("未检测到目标");
  }

  fn on_detect(&self, boxes: &[BoundingBox], elapsed_ms: u64) {
    if self.json {
      println!("{}", detection_to_json(boxes, elapsed_ms));
      return;
    }

    info!("检测到 {} 个目标, 耗时 {} ms", boxes.len(), elapsed_ms);
    for bbox in boxes {
      info!(
        "  {} ({:.2}%): [{:.3}, {:.3}, {:.3}, {:.3}]",
        bbox.class_name,
        bbox.confidence * 100.0,
        bbox.x1,
        bbox.y1,
        bbox.x2,
        bbox.y2
      );
    }
  }
}
