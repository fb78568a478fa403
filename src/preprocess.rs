// 该文件是 Cheyan （车眼） 项目的一部分。
// src/preprocess.rs - 推理前处理
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

use crate::frame::Frame;

/// 像素归一化 `(x - mean) / std`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalize {
  pub mean: f32,
  pub std: f32,
}

impl Normalize {
  pub fn new(mean: f32, std: f32) -> Self {
    Self { mean, std }
  }

  pub fn apply(&self, value: u8) -> f32 {
    let std = if self.std == 0.0 { 1.0 } else { self.std };
    (value as f32 - self.mean) / std
  }
}

/// 缩放到模型输入尺寸后的帧
pub struct PreparedInput {
  image: RgbImage,
  normalize: Normalize,
}

impl PreparedInput {
  /// 最近邻缩放到 `width x height`
  pub fn from_frame(frame: &Frame, width: u32, height: u32, normalize: Normalize) -> Self {
    let image = if frame.width() == width && frame.height() == height {
      frame.image().clone()
    } else {
      image::imageops::resize(frame.image(), width, height, FilterType::Nearest)
    };
    Self { image, normalize }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  /// 原始 uint8 NHWC 数据，供量化模型直接使用
  pub fn as_nhwc_u8(&self) -> &[u8] {
    self.image.as_raw()
  }

  /// 归一化后的 float32 NHWC 数据
  pub fn to_nhwc_f32(&self) -> Vec<f32> {
    self
      .image
      .as_raw()
      .iter()
      .map(|&v| self.normalize.apply(v))
      .collect()
  }
}
