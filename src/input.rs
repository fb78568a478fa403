// 该文件是 Cheyan （车眼） 项目的一部分。
// src/input.rs - 帧输入源
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

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

mod directory;
mod image_file;

pub use self::directory::DirectoryInput;
pub use self::image_file::ImageFileInput;

#[derive(Error, Debug)]
pub enum InputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("参数无效: {0}")]
  InvalidParameter(String),
  #[error("目录中没有图像: {0}")]
  EmptyDirectory(String),
}

pub(crate) fn check_scheme<T: FromUrlWithScheme>(url: &Url) -> Result<(), InputError> {
  if url.scheme() != T::SCHEME {
    return Err(InputError::SchemeMismatch(format!(
      "期望 '{}', 实际 '{}'",
      T::SCHEME,
      url.scheme()
    )));
  }
  Ok(())
}

pub enum InputWrapper {
  ImageFile(ImageFileInput),
  Directory(DirectoryInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ImageFileInput::SCHEME => Ok(InputWrapper::ImageFile(ImageFileInput::from_url(url)?)),
      DirectoryInput::SCHEME => Ok(InputWrapper::Directory(DirectoryInput::from_url(url)?)),
      other => Err(InputError::SchemeMismatch(format!(
        "不支持的输入 '{}'",
        other
      ))),
    }
  }
}

impl Iterator for InputWrapper {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::ImageFile(input) => input.next(),
      InputWrapper::Directory(input) => input.next(),
    }
  }
}
