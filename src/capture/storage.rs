// 该文件是 Cheyan （车眼） 项目的一部分。
// src/capture/storage.rs - 抓拍图像存储
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

use std::{
  fs::File,
  io::{BufWriter, Write},
  path::{Path, PathBuf},
};

use image::{RgbImage, codecs::jpeg::JpegEncoder};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CAPTURE_DIRECTORY: &str = "VehicleDetections";
pub const DEFAULT_JPEG_QUALITY: u8 = 100;

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像编码错误: {0}")]
  ImageError(#[from] image::ImageError),
}

/// 抓拍图像的写入目标
///
/// 并发写入不同文件名时互不影响，每次写入使用独立的文件句柄。
pub trait ImageStore: Send + Sync {
  /// 写入图像，返回实际保存路径
  fn write_image(&self, image: &RgbImage, name: &str) -> Result<PathBuf, StoreError>;
}

/// 把 JPEG 写入固定目录
#[derive(Debug, Clone)]
pub struct DirectoryStore {
  directory: PathBuf,
  quality: u8,
}

impl Default for DirectoryStore {
  fn default() -> Self {
    Self::new(DEFAULT_CAPTURE_DIRECTORY)
  }
}

impl DirectoryStore {
  pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
    Self {
      directory: directory.into(),
      quality: DEFAULT_JPEG_QUALITY,
    }
  }

  pub fn with_quality(mut self, quality: u8) -> Self {
    self.quality = quality.clamp(1, 100);
    self
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }
}

impl ImageStore for DirectoryStore {
  fn write_image(&self, image: &RgbImage, name: &str) -> Result<PathBuf, StoreError> {
    if !self.directory.exists() {
      std::fs::create_dir_all(&self.directory)?;
    }

    let path = self.directory.join(name);
    let mut writer = BufWriter::new(File::create(&path)?);
    JpegEncoder::new_with_quality(&mut writer, self.quality).encode_image(image)?;
    writer.flush()?;

    debug!("图像已写入: {}", path.display());
    Ok(path)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn writes_jpeg_into_directory() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirectoryStore::new(dir.path().join("nested").join("captures"));
    let image = RgbImage::from_pixel(16, 8, Rgb([200, 100, 50]));

    let path = store.write_image(&image, "IMG_20260101_120000.jpg").unwrap();
    assert_eq!(path, store.directory().join("IMG_20260101_120000.jpg"));

    let decoded = image::open(&path).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (16, 8));
  }

  #[test]
  fn unwritable_target_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, b"not a directory").unwrap();
    let store = DirectoryStore::new(&blocker);
    let image = RgbImage::new(2, 2);
    assert!(store.write_image(&image, "IMG_x.jpg").is_err());
  }
}
