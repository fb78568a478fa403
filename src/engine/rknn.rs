// 该文件是 Cheyan （车眼） 项目的一部分。
// src/engine/rknn.rs - RKNPU 推理引擎
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

use rknpu::{Context, InitFlags, TensorFormat, TensorType};
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  engine::{EngineError, InferenceEngine, InputShape, OutputShape, query_pair},
  preprocess::PreparedInput,
};

const RKNN_NUM_INPUTS: u32 = 1;
const RKNN_NUM_OUTPUTS: u32 = 1;

/// RKNN 模型，输入为 uint8 NHWC，归一化在模型转换时完成
///
/// URL 形如 `rknpu:///path/model.rknn?input=640x640&output=9x8400`。
pub struct RknpuEngine {
  context: Context,
  input_shape: InputShape,
  output_shape: OutputShape,
}

impl FromUrlWithScheme for RknpuEngine {
  const SCHEME: &'static str = "rknpu";
}

impl FromUrl for RknpuEngine {
  type Error = EngineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(EngineError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let (width, height) = query_pair(url, "input")?;
    let (channels, candidates) = query_pair(url, "output")?;
    Self::load(
      url.path(),
      InputShape::new(width, height),
      OutputShape::new(channels, candidates),
    )
  }
}

impl RknpuEngine {
  pub fn load(
    model_path: &str,
    input_shape: InputShape,
    output_shape: OutputShape,
  ) -> Result<Self, EngineError> {
    info!("加载模型文件: {}", model_path);
    let model_data = std::fs::read(model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&model_data, InitFlags::default())?;

    let num_inputs = context.num_inputs()?;
    let num_outputs = context.num_outputs()?;
    if num_inputs != RKNN_NUM_INPUTS || num_outputs != RKNN_NUM_OUTPUTS {
      error!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        RKNN_NUM_INPUTS, RKNN_NUM_OUTPUTS, num_inputs, num_outputs
      );
      return Err(EngineError::InvalidShape(format!(
        "模型输入/输出数量为 {}/{}",
        num_inputs, num_outputs
      )));
    }
    info!("模型加载完成");

    Ok(Self {
      context,
      input_shape,
      output_shape,
    })
  }
}

impl InferenceEngine for RknpuEngine {
  fn name(&self) -> &'static str {
    "rknpu"
  }

  fn input_shape(&self) -> InputShape {
    self.input_shape
  }

  fn output_shape(&self) -> OutputShape {
    self.output_shape
  }

  fn run(&mut self, input: &PreparedInput) -> Result<Vec<f32>, EngineError> {
    debug!("设置模型输入");
    self
      .context
      .set_input(0, input.as_nhwc_u8(), TensorFormat::NHWC, TensorType::UInt8)?;

    debug!("执行模型推理");
    self.context.run()?;

    let outputs = self.context.get_outputs()?;
    let data = outputs.get_f32(0)?;
    Ok(data.to_vec())
  }
}
