// 该文件是 Cheyan （车眼） 项目的一部分。
// src/decode.rs - 输出张量解码
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

//! # 输出张量解码
//!
//! 输出张量形状为 `[1, C, N]`，通道优先排列：候选 `c` 的第 `j` 个通道位于
//! `c + N * j`。前 4 个通道依次为 `cx, cy, w, h`，其余 `C - 4` 个通道为各类别置信度。

use thiserror::Error;
use tracing::debug;

use crate::{
  bbox::BoundingBox,
  labels::{Labels, LabelsError},
};

/// 框回归通道数 (cx, cy, w, h)
pub const BOX_CHANNELS: usize = 4;

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("输出通道数无效: {0}, 至少需要 5 个通道")]
  InvalidChannels(usize),
  #[error("候选数量无效: 0")]
  NoCandidates,
  #[error("输出张量大小不匹配: 期望 {expected}, 实际 {actual}")]
  TensorSizeMismatch { expected: usize, actual: usize },
  #[error("标签错误: {0}")]
  LabelsError(#[from] LabelsError),
}

/// 输出张量布局 `[1, channels, candidates]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLayout {
  pub channels: usize,
  pub candidates: usize,
}

impl OutputLayout {
  pub fn new(channels: usize, candidates: usize) -> Self {
    Self {
      channels,
      candidates,
    }
  }

  pub fn num_classes(&self) -> usize {
    self.channels.saturating_sub(BOX_CHANNELS)
  }

  pub fn len(&self) -> usize {
    self.channels * self.candidates
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// 把原始输出张量解码为超过置信度阈值的候选框
#[derive(Debug, Clone)]
pub struct Decoder {
  layout: OutputLayout,
  labels: Labels,
  confidence_threshold: f32,
}

impl Decoder {
  /// 构造时校验布局与标签，标签数量不符直接报错
  pub fn new(
    layout: OutputLayout,
    labels: Labels,
    confidence_threshold: f32,
  ) -> Result<Self, DecodeError> {
    if layout.channels <= BOX_CHANNELS {
      return Err(DecodeError::InvalidChannels(layout.channels));
    }
    if layout.candidates == 0 {
      return Err(DecodeError::NoCandidates);
    }
    labels.ensure_class_count(layout.num_classes())?;

    Ok(Self {
      layout,
      labels,
      confidence_threshold,
    })
  }

  pub fn layout(&self) -> OutputLayout {
    self.layout
  }

  pub fn labels(&self) -> &Labels {
    &self.labels
  }

  pub fn decode(&self, output: &[f32]) -> Result<Vec<BoundingBox>, DecodeError> {
    let expected = self.layout.len();
    if output.len() < expected {
      return Err(DecodeError::TensorSizeMismatch {
        expected,
        actual: output.len(),
      });
    }

    let n = self.layout.candidates;
    let mut boxes = Vec::new();

    for c in 0..n {
      // 并列最大值取第一个通道，NaN 永远不会胜出
      let mut max_conf = f32::NEG_INFINITY;
      let mut class_index = 0usize;
      for j in BOX_CHANNELS..self.layout.channels {
        let score = output[c + n * j];
        if score > max_conf {
          max_conf = score;
          class_index = j - BOX_CHANNELS;
        }
      }

      if max_conf <= self.confidence_threshold {
        continue;
      }

      let cx = output[c];
      let cy = output[c + n];
      let w = output[c + 2 * n];
      let h = output[c + 3 * n];

      // Decoder::new 已保证标签数量等于类别通道数
      let class_name = &self.labels[class_index];
      let candidate = BoundingBox::from_center(cx, cy, w, h, max_conf, class_index, class_name);

      // 越过画面边界的候选直接丢弃，不做裁剪
      if !candidate.is_within_frame() {
        continue;
      }

      boxes.push(candidate);
    }

    debug!("解码得到 {} 个候选框", boxes.len());
    Ok(boxes)
  }
}
