// 该文件是 Cheyan （车眼） 项目的一部分。
// src/labels.rs - 类别标签列表
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
  io::{BufRead, BufReader, Read},
  ops::Index,
  path::Path,
};

use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LabelsError {
  #[error("标签文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("标签数量与模型不匹配: 模型类别数 {expected}, 标签数 {actual}")]
  CountMismatch { expected: usize, actual: usize },
}

/// 按类别索引排列的标签列表，加载后只读
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels {
  names: Box<[String]>,
}

impl Labels {
  /// 每行一个标签，空行跳过
  pub fn from_reader<R: Read>(reader: R) -> Result<Self, LabelsError> {
    let mut names = Vec::new();
    for line in BufReader::new(reader).lines() {
      let line = line?;
      let name = line.trim_end();
      if !name.trim().is_empty() {
        names.push(name.to_string());
      }
    }
    debug!("读取到 {} 个标签", names.len());
    Ok(Self {
      names: names.into_boxed_slice(),
    })
  }

  pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, LabelsError> {
    let path = path.as_ref();
    info!("加载标签文件: {}", path.display());
    let file = std::fs::File::open(path)?;
    Self::from_reader(file)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<&str> {
    self.names.get(index).map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }

  /// 标签数量必须与模型类别通道数完全一致
  pub fn ensure_class_count(&self, num_classes: usize) -> Result<(), LabelsError> {
    if self.names.len() != num_classes {
      return Err(LabelsError::CountMismatch {
        expected: num_classes,
        actual: self.names.len(),
      });
    }
    Ok(())
  }
}

impl Index<usize> for Labels {
  type Output = str;

  fn index(&self, index: usize) -> &str {
    &self.names[index]
  }
}

impl<S: Into<String>> FromIterator<S> for Labels {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    Self {
      names: iter.into_iter().map(Into::into).collect(),
    }
  }
}
