// 该文件是 Cheyan （车眼） 项目的一部分。
// src/engine.rs - 推理引擎接口
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

use crate::{FromUrl, FromUrlWithScheme, decode::OutputLayout, preprocess::PreparedInput};

mod replay;
pub use self::replay::ReplayEngine;

#[cfg(feature = "backend_tract")]
mod onnx;
#[cfg(feature = "backend_tract")]
pub use self::onnx::TractEngine;

#[cfg(feature = "backend_rknpu")]
mod rknn;
#[cfg(feature = "backend_rknpu")]
pub use self::rknn::RknpuEngine;

#[derive(Error, Debug)]
pub enum EngineError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("张量形状无效: {0}")]
  InvalidShape(String),
  #[error("回放文件无效: {0}")]
  InvalidReplay(String),
  #[error("JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("推理失败: {0}")]
  InferenceFailed(String),
  #[cfg(feature = "backend_rknpu")]
  #[error("RKNN 错误: {0}")]
  RknnError(rknpu::Error),
}

#[cfg(feature = "backend_rknpu")]
impl From<rknpu::Error> for EngineError {
  fn from(err: rknpu::Error) -> Self {
    EngineError::RknnError(err)
  }
}

/// 输入张量形状 `[batch, W, H, channels]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputShape {
  pub batch: usize,
  pub width: usize,
  pub height: usize,
  pub channels: usize,
}

impl InputShape {
  pub fn new(width: usize, height: usize) -> Self {
    Self {
      batch: 1,
      width,
      height,
      channels: 3,
    }
  }

  pub fn from_dims(dims: &[usize]) -> Result<Self, EngineError> {
    match dims {
      [batch, width, height, channels] => Ok(Self {
        batch: *batch,
        width: *width,
        height: *height,
        channels: *channels,
      }),
      _ => Err(EngineError::InvalidShape(format!(
        "输入张量应为 4 维, 实际为 {:?}",
        dims
      ))),
    }
  }

  pub fn is_ready(&self) -> bool {
    self.batch != 0 && self.width != 0 && self.height != 0 && self.channels != 0
  }
}

/// 输出张量形状 `[batch, C, N]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputShape {
  pub batch: usize,
  pub channels: usize,
  pub candidates: usize,
}

impl OutputShape {
  pub fn new(channels: usize, candidates: usize) -> Self {
    Self {
      batch: 1,
      channels,
      candidates,
    }
  }

  pub fn from_dims(dims: &[usize]) -> Result<Self, EngineError> {
    match dims {
      [batch, channels, candidates] => Ok(Self {
        batch: *batch,
        channels: *channels,
        candidates: *candidates,
      }),
      _ => Err(EngineError::InvalidShape(format!(
        "输出张量应为 3 维, 实际为 {:?}",
        dims
      ))),
    }
  }

  pub fn is_ready(&self) -> bool {
    self.batch != 0 && self.channels != 0 && self.candidates != 0
  }

  pub fn layout(&self) -> OutputLayout {
    OutputLayout::new(self.channels, self.candidates)
  }
}

/// 已加载的推理引擎，张量形状固定
///
/// 引擎不保证线程安全，同一时刻只允许一次 `run`。
pub trait InferenceEngine {
  fn name(&self) -> &'static str;
  fn input_shape(&self) -> InputShape;
  fn output_shape(&self) -> OutputShape;
  /// 同步执行推理，返回通道优先排列的输出张量
  fn run(&mut self, input: &PreparedInput) -> Result<Vec<f32>, EngineError>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
  fn name(&self) -> &'static str {
    (**self).name()
  }

  fn input_shape(&self) -> InputShape {
    (**self).input_shape()
  }

  fn output_shape(&self) -> OutputShape {
    (**self).output_shape()
  }

  fn run(&mut self, input: &PreparedInput) -> Result<Vec<f32>, EngineError> {
    (**self).run(input)
  }
}

/// 解析形如 `640x640` 的尺寸参数
pub fn parse_pair(value: &str) -> Option<(usize, usize)> {
  let (a, b) = value.split_once(['x', 'X'])?;
  Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

/// 读取 URL 查询参数中的尺寸
pub fn query_pair(url: &Url, key: &str) -> Result<(usize, usize), EngineError> {
  url
    .query_pairs()
    .find(|(k, _)| k == key)
    .and_then(|(_, v)| parse_pair(&v))
    .ok_or_else(|| EngineError::InvalidShape(format!("缺少或无法解析参数 '{}'", key)))
}

/// 读取 URL 查询参数中的单个数值
pub fn query_usize(url: &Url, key: &str) -> Result<usize, EngineError> {
  url
    .query_pairs()
    .find(|(k, _)| k == key)
    .and_then(|(_, v)| v.trim().parse().ok())
    .ok_or_else(|| EngineError::InvalidShape(format!("缺少或无法解析参数 '{}'", key)))
}

pub enum EngineWrapper {
  Replay(ReplayEngine),
  #[cfg(feature = "backend_tract")]
  Tract(TractEngine),
  #[cfg(feature = "backend_rknpu")]
  Rknpu(RknpuEngine),
}

impl FromUrl for EngineWrapper {
  type Error = EngineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ReplayEngine::SCHEME => Ok(EngineWrapper::Replay(ReplayEngine::from_url(url)?)),
      #[cfg(feature = "backend_tract")]
      TractEngine::SCHEME => Ok(EngineWrapper::Tract(TractEngine::from_url(url)?)),
      #[cfg(feature = "backend_rknpu")]
      RknpuEngine::SCHEME => Ok(EngineWrapper::Rknpu(RknpuEngine::from_url(url)?)),
      other => Err(EngineError::SchemeMismatch(other.to_string())),
    }
  }
}

impl InferenceEngine for EngineWrapper {
  fn name(&self) -> &'static str {
    match self {
      EngineWrapper::Replay(engine) => engine.name(),
      #[cfg(feature = "backend_tract")]
      EngineWrapper::Tract(engine) => engine.name(),
      #[cfg(feature = "backend_rknpu")]
      EngineWrapper::Rknpu(engine) => engine.name(),
    }
  }

  fn input_shape(&self) -> InputShape {
    match self {
      EngineWrapper::Replay(engine) => engine.input_shape(),
      #[cfg(feature = "backend_tract")]
      EngineWrapper::Tract(engine) => engine.input_shape(),
      #[cfg(feature = "backend_rknpu")]
      EngineWrapper::Rknpu(engine) => engine.input_shape(),
    }
  }

  fn output_shape(&self) -> OutputShape {
    match self {
      EngineWrapper::Replay(engine) => engine.output_shape(),
      #[cfg(feature = "backend_tract")]
      EngineWrapper::Tract(engine) => engine.output_shape(),
      #[cfg(feature = "backend_rknpu")]
      EngineWrapper::Rknpu(engine) => engine.output_shape(),
    }
  }

  fn run(&mut self, input: &PreparedInput) -> Result<Vec<f32>, EngineError> {
    match self {
      EngineWrapper::Replay(engine) => engine.run(input),
      #[cfg(feature = "backend_tract")]
      EngineWrapper::Tract(engine) => engine.run(input),
      #[cfg(feature = "backend_rknpu")]
      EngineWrapper::Rknpu(engine) => engine.run(input),
    }
  }
}
