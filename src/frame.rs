// 该文件是 Cheyan （车眼） 项目的一部分。
// src/frame.rs - 视频帧定义
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

use std::sync::Arc;

use image::RgbImage;

/// 一帧 RGB 图像（NHWC 排列）
///
/// 像素数据由 `Arc` 共享，延迟抓拍任务持有自己的引用，
/// 与检测流程的生命周期无关。
#[derive(Debug, Clone)]
pub struct Frame {
  index: u64,
  image: Arc<RgbImage>,
}

impl Frame {
  pub fn new(index: u64, image: RgbImage) -> Self {
    Self {
      index,
      image: Arc::new(image),
    }
  }

  pub fn from_shared(index: u64, image: Arc<RgbImage>) -> Self {
    Self { index, image }
  }

  pub fn index(&self) -> u64 {
    self.index
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn shared_image(&self) -> Arc<RgbImage> {
    Arc::clone(&self.image)
  }

  pub fn as_nhwc(&self) -> &[u8] {
    self.image.as_raw()
  }
}

impl From<RgbImage> for Frame {
  fn from(image: RgbImage) -> Self {
    Frame::new(0, image)
  }
}
