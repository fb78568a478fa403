// 该文件是 Cheyan （车眼） 项目的一部分。
// src/engine/replay.rs - 输出张量回放引擎
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

//! 回放预先录制的输出张量，不执行真实推理。
//!
//! 回放文件为 JSON：
//!
//! ```json
//! {
//!   "input_shape": [1, 640, 640, 3],
//!   "output_shape": [1, 9, 8400],
//!   "outputs": [[0.5, 0.5, ...], [...]]
//! }
//! ```
//!
//! 每次 `run` 依次返回 `outputs` 中的下一项，末尾后从头循环。

use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  engine::{EngineError, InferenceEngine, InputShape, OutputShape},
  preprocess::PreparedInput,
};

pub struct ReplayEngine {
  input_shape: InputShape,
  output_shape: OutputShape,
  outputs: Vec<Vec<f32>>,
  cursor: usize,
}

impl FromUrlWithScheme for ReplayEngine {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayEngine {
  type Error = EngineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(EngineError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }
    Self::from_path(url.path())
  }
}

fn dims(value: &Value, key: &str) -> Result<Vec<usize>, EngineError> {
  value
    .get(key)
    .and_then(Value::as_array)
    .ok_or_else(|| EngineError::InvalidReplay(format!("缺少字段 '{}'", key)))?
    .iter()
    .map(|v| {
      v.as_u64()
        .map(|d| d as usize)
        .ok_or_else(|| EngineError::InvalidReplay(format!("字段 '{}' 必须为非负整数数组", key)))
    })
    .collect()
}

impl ReplayEngine {
  pub fn new(
    input_shape: InputShape,
    output_shape: OutputShape,
    outputs: Vec<Vec<f32>>,
  ) -> Result<Self, EngineError> {
    if outputs.is_empty() {
      return Err(EngineError::InvalidReplay("没有可回放的输出".to_string()));
    }
    let expected = output_shape.batch * output_shape.channels * output_shape.candidates;
    if let Some((index, output)) = outputs
      .iter()
      .enumerate()
      .find(|(_, output)| output.len() != expected)
    {
      return Err(EngineError::InvalidReplay(format!(
        "第 {} 个输出长度为 {}, 期望 {}",
        index,
        output.len(),
        expected
      )));
    }

    Ok(Self {
      input_shape,
      output_shape,
      outputs,
      cursor: 0,
    })
  }

  pub fn from_json(text: &str) -> Result<Self, EngineError> {
    let value: Value = serde_json::from_str(text)?;
    let input_shape = InputShape::from_dims(&dims(&value, "input_shape")?)?;
    let output_shape = OutputShape::from_dims(&dims(&value, "output_shape")?)?;

    let outputs = value
      .get("outputs")
      .and_then(Value::as_array)
      .ok_or_else(|| EngineError::InvalidReplay("缺少字段 'outputs'".to_string()))?
      .iter()
      .map(|output| {
        output
          .as_array()
          .ok_or_else(|| EngineError::InvalidReplay("'outputs' 的每一项必须为数组".to_string()))?
          .iter()
          .map(|v| {
            v.as_f64()
              .map(|f| f as f32)
              .ok_or_else(|| EngineError::InvalidReplay("输出值必须为数字".to_string()))
          })
          .collect::<Result<Vec<f32>, _>>()
      })
      .collect::<Result<Vec<_>, _>>()?;

    Self::new(input_shape, output_shape, outputs)
  }

  pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
    let path = path.as_ref();
    info!("加载回放文件: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    let engine = Self::from_json(&text)?;
    debug!(
      "回放输出 {} 组, 输入形状 {:?}, 输出形状 {:?}",
      engine.outputs.len(),
      engine.input_shape,
      engine.output_shape
    );
    Ok(engine)
  }
}

impl InferenceEngine for ReplayEngine {
  fn name(&self) -> &'static str {
    "replay"
  }

  fn input_shape(&self) -> InputShape {
    self.input_shape
  }

  fn output_shape(&self) -> OutputShape {
    self.output_shape
  }

  fn run(&mut self, _input: &PreparedInput) -> Result<Vec<f32>, EngineError> {
    let output = self.outputs[self.cursor % self.outputs.len()].clone();
    self.cursor = (self.cursor + 1) % self.outputs.len();
    Ok(output)
  }
}
