// 该文件是 Cheyan （车眼） 项目的一部分。
// src/config.rs - 检测与抓拍参数
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

use std::time::Duration;

use crate::preprocess::Normalize;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.4;
pub const DEFAULT_TRIGGER_CLASSES: [&str; 3] = ["truck", "bus", "van"];
pub const DEFAULT_CAPTURE_DELAY_MS: u64 = 4000;
pub const DEFAULT_CAPTURE_DELAY: Duration = Duration::from_millis(DEFAULT_CAPTURE_DELAY_MS);
pub const DEFAULT_INPUT_MEAN: f32 = 0.0;
pub const DEFAULT_INPUT_STD: f32 = 255.0;

/// 触发抓拍的类别集合
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerClasses {
  names: Vec<String>,
}

impl TriggerClasses {
  pub fn new<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      names: names.into_iter().map(Into::into).collect(),
    }
  }

  pub fn contains(&self, class_name: &str) -> bool {
    self.names.iter().any(|name| name == class_name)
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }
}

impl Default for TriggerClasses {
  fn default() -> Self {
    Self::new(DEFAULT_TRIGGER_CLASSES)
  }
}

/// 检测流程的固定配置，初始化后只读
#[derive(Debug, Clone)]
pub struct DetectConfig {
  pub confidence_threshold: f32,
  pub iou_threshold: f32,
  pub trigger_classes: TriggerClasses,
  pub capture_delay: Duration,
  pub normalize: Normalize,
}

impl Default for DetectConfig {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      trigger_classes: TriggerClasses::default(),
      capture_delay: DEFAULT_CAPTURE_DELAY,
      normalize: Normalize::new(DEFAULT_INPUT_MEAN, DEFAULT_INPUT_STD),
    }
  }
}

impl DetectConfig {
  pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
    self.iou_threshold = threshold;
    self
  }

  pub fn with_trigger_classes(mut self, classes: TriggerClasses) -> Self {
    self.trigger_classes = classes;
    self
  }

  pub fn with_capture_delay(mut self, delay: Duration) -> Self {
    self.capture_delay = delay;
    self
  }

  pub fn with_normalize(mut self, normalize: Normalize) -> Self {
    self.normalize = normalize;
    self
  }
}
