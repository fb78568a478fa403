// 该文件是 Cheyan （车眼） 项目的一部分。
// src/input/image_file.rs - 单张图像输入
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

use image::{ImageReader, RgbImage};
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{InputError, check_scheme},
};

/// 单张图像，可通过 `repeat` 参数重复输出
///
/// URL 形如 `image:///path/car.jpg?repeat=10`。
pub struct ImageFileInput {
  image: Arc<RgbImage>,
  repeat: u64,
  emitted: u64,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    check_scheme::<Self>(url)?;

    let repeat = match url.query_pairs().find(|(key, _)| key == "repeat") {
      Some((_, value)) => value
        .trim()
        .parse()
        .map_err(|_| InputError::InvalidParameter(format!("repeat={}", value)))?,
      None => 1,
    };
    Self::open(url.path(), repeat)
  }
}

impl ImageFileInput {
  pub fn open(path: &str, repeat: u64) -> Result<Self, InputError> {
    let image = ImageReader::open(path)?.decode()?.to_rgb8();
    info!(
      "读取图像 {} ({}x{}), 重复 {} 次",
      path,
      image.width(),
      image.height(),
      repeat
    );
    Ok(Self::from_image(image, repeat))
  }

  pub fn from_image(image: RgbImage, repeat: u64) -> Self {
    Self {
      image: Arc::new(image),
      repeat,
      emitted: 0,
    }
  }
}

impl Iterator for ImageFileInput {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.emitted >= self.repeat {
      return None;
    }
    let index = self.emitted;
    self.emitted += 1;
    Some(Ok(Frame::from_shared(index, Arc::clone(&self.image))))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn repeats_the_same_pixels() {
    let input = ImageFileInput::from_image(RgbImage::new(4, 2), 3);
    let frames: Vec<_> = input.map(Result::unwrap).collect();
    assert_eq!(
      frames.iter().map(Frame::index).collect::<Vec<_>>(),
      vec![0, 1, 2]
    );
    assert!(Arc::ptr_eq(&frames[0].shared_image(), &frames[2].shared_image()));
  }

  #[test]
  fn reads_file_from_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("car.png");
    RgbImage::new(6, 3).save(&path).unwrap();

    let url = Url::parse(&format!("image://{}?repeat=2", path.display())).unwrap();
    let frames: Vec<_> = ImageFileInput::from_url(&url)
      .unwrap()
      .map(Result::unwrap)
      .collect();
    assert_eq!(frames.len(), 2);
    assert_eq!((frames[1].width(), frames[1].height()), (6, 3));
  }
}
