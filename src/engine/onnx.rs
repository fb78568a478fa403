// 该文件是 Cheyan （车眼） 项目的一部分。
// src/engine/onnx.rs - 基于 tract 的 ONNX 推理引擎
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

use tracing::{debug, info};
use tract_onnx::prelude::*;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  engine::{EngineError, InferenceEngine, InputShape, OutputShape, query_usize},
  preprocess::PreparedInput,
};

fn tract_error(err: TractError) -> EngineError {
  EngineError::InferenceFailed(format!("{:#}", err))
}

/// float32 NHWC 输入的 ONNX 模型
///
/// URL 形如 `onnx:///path/model.onnx?width=640&height=640`。
pub struct TractEngine {
  plan: TypedRunnableModel<TypedModel>,
  input_shape: InputShape,
  output_shape: OutputShape,
}

impl FromUrlWithScheme for TractEngine {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for TractEngine {
  type Error = EngineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(EngineError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let width = query_usize(url, "width")?;
    let height = query_usize(url, "height")?;
    Self::load(url.path(), InputShape::new(width, height))
  }
}

impl TractEngine {
  pub fn load(model_path: &str, input_shape: InputShape) -> Result<Self, EngineError> {
    info!("加载 ONNX 模型: {}", model_path);
    let model = tract_onnx::onnx()
      .model_for_path(model_path)
      .map_err(tract_error)?
      .with_input_fact(
        0,
        InferenceFact::dt_shape(
          f32::datum_type(),
          tvec!(
            input_shape.batch,
            input_shape.width,
            input_shape.height,
            input_shape.channels
          ),
        ),
      )
      .map_err(tract_error)?
      .into_optimized()
      .map_err(tract_error)?;

    let dims = model
      .output_fact(0)
      .map_err(tract_error)?
      .shape
      .as_concrete()
      .map(|dims| dims.to_vec())
      .ok_or_else(|| EngineError::InvalidShape("模型输出形状不是常量".to_string()))?;
    let output_shape = OutputShape::from_dims(&dims)?;
    debug!("模型输入形状: {:?}, 输出形状: {:?}", input_shape, output_shape);

    let plan = model.into_runnable().map_err(tract_error)?;
    info!("模型加载完成");

    Ok(Self {
      plan,
      input_shape,
      output_shape,
    })
  }
}

impl InferenceEngine for TractEngine {
  fn name(&self) -> &'static str {
    "tract"
  }

  fn input_shape(&self) -> InputShape {
    self.input_shape
  }

  fn output_shape(&self) -> OutputShape {
    self.output_shape
  }

  fn run(&mut self, input: &PreparedInput) -> Result<Vec<f32>, EngineError> {
    let shape = [
      self.input_shape.batch,
      self.input_shape.width,
      self.input_shape.height,
      self.input_shape.channels,
    ];
    let tensor = Tensor::from_shape(&shape, &input.to_nhwc_f32()).map_err(tract_error)?;

    let outputs = self.plan.run(tvec!(tensor.into())).map_err(tract_error)?;
    let output = outputs
      .first()
      .ok_or_else(|| EngineError::InferenceFailed("模型没有输出".to_string()))?;
    let data = output.as_slice::<f32>().map_err(tract_error)?;
    Ok(data.to_vec())
  }
}
