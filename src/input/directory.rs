// 该文件是 Cheyan （车眼） 项目的一部分。
// src/input/directory.rs - 图像目录输入
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
  path::{Path, PathBuf},
  vec::IntoIter,
};

use image::ImageReader;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{InputError, check_scheme},
};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// 按文件名顺序逐张读取目录中的图像，模拟连续帧
///
/// URL 形如 `folder:///path/frames`，不递归子目录。
pub struct DirectoryInput {
  files: IntoIter<PathBuf>,
  next_index: u64,
}

impl FromUrlWithScheme for DirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryInput {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    check_scheme::<Self>(url)?;
    Self::open(url.path())
  }
}

fn is_image(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| {
      IMAGE_EXTENSIONS
        .iter()
        .any(|known| ext.eq_ignore_ascii_case(known))
    })
}

impl DirectoryInput {
  pub fn open<P: AsRef<Path>>(directory: P) -> Result<Self, InputError> {
    let directory = directory.as_ref();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
      let path = entry?.path();
      if path.is_file() && is_image(&path) {
        files.push(path);
      }
    }
    if files.is_empty() {
      return Err(InputError::EmptyDirectory(directory.display().to_string()));
    }
    files.sort();
    info!("目录 {} 中共有 {} 张图像", directory.display(), files.len());

    Ok(Self {
      files: files.into_iter(),
      next_index: 0,
    })
  }

  pub fn remaining(&self) -> usize {
    self.files.len()
  }
}

impl Iterator for DirectoryInput {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.files.next()?;
    let index = self.next_index;
    self.next_index += 1;
    debug!("读取第 {} 帧: {}", index, path.display());

    let frame = ImageReader::open(&path)
      .map_err(InputError::from)
      .and_then(|reader| Ok(reader.decode()?))
      .map(|image| Frame::new(index, image.to_rgb8()));
    Some(frame)
  }
}
