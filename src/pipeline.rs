// 该文件是 Cheyan （车眼） 项目的一部分。
// src/pipeline.rs - 检测流程
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

//! # 检测流程
//!
//! 单帧处理顺序固定为：预处理、推理、解码、非极大值抑制、通知。
//! 流程本身不在帧之间保存检测状态，也不创建线程，`detect` 返回时本帧处理完毕。
//!
//! 生命周期：
//!
//! ```text
//! new ──> install(engine, labels) ──> detect ... ──> release
//!              (校验形状与标签)                        (释放引擎)
//! ```
//!
//! 未安装引擎或已释放时调用 `detect` 不会触发任何回调，只返回 [`DetectStatus::NotReady`]。

use std::{sync::Arc, time::Instant};

use thiserror::Error;
use tracing::{debug, warn};

use crate::{
  bbox::BoundingBox,
  config::DetectConfig,
  decode::{DecodeError, Decoder},
  engine::{EngineError, InferenceEngine, InputShape},
  frame::Frame,
  labels::Labels,
  nms,
  preprocess::PreparedInput,
};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("张量形状无效: {0}")]
  InvalidShape(String),
  #[error("解码错误: {0}")]
  DecodeError(#[from] DecodeError),
  #[error("推理引擎错误: {0}")]
  EngineError(#[from] EngineError),
}

/// 检测结果的接收方
pub trait DetectListener {
  /// 本帧没有任何检测框
  fn on_empty_detect(&self);
  /// 本帧的检测框（已抑制重叠）与处理耗时
  fn on_detect(&self, boxes: &[BoundingBox], elapsed_ms: u64);
}

impl<L: DetectListener + ?Sized> DetectListener for Arc<L> {
  fn on_empty_detect(&self) {
    (**self).on_empty_detect()
  }

  fn on_detect(&self, boxes: &[BoundingBox], elapsed_ms: u64) {
    (**self).on_detect(boxes, elapsed_ms)
  }
}

/// 需要原始帧的检测结果旁路，例如抓拍
///
/// 流程可能整体移交给帧处理线程，旁路必须可跨线程转移。
pub trait FrameObserver: Send {
  fn observe(&self, frame: &Frame, boxes: &[BoundingBox]);
}

impl<O: FrameObserver + Sync + ?Sized> FrameObserver for Arc<O> {
  fn observe(&self, frame: &Frame, boxes: &[BoundingBox]) {
    (**self).observe(frame, boxes)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectStatus {
  /// 引擎未安装或已释放
  NotReady,
  Empty,
  Detected(usize),
}

struct Installed<E> {
  engine: E,
  input: InputShape,
  decoder: Decoder,
}

pub struct DetectionPipeline<E, L> {
  config: DetectConfig,
  listener: L,
  observers: Vec<Box<dyn FrameObserver>>,
  installed: Option<Installed<E>>,
}

impl<E, L> DetectionPipeline<E, L>
where
  E: InferenceEngine,
  L: DetectListener,
{
  pub fn new(config: DetectConfig, listener: L) -> Self {
    Self {
      config,
      listener,
      observers: Vec::new(),
      installed: None,
    }
  }

  pub fn with_observer<O: FrameObserver + 'static>(mut self, observer: O) -> Self {
    self.observers.push(Box::new(observer));
    self
  }

  pub fn config(&self) -> &DetectConfig {
    &self.config
  }

  /// 安装推理引擎，形状或标签数量不符时直接失败
  pub fn install(&mut self, engine: E, labels: Labels) -> Result<(), PipelineError> {
    let input = engine.input_shape();
    let output = engine.output_shape();
    if !input.is_ready() {
      return Err(PipelineError::InvalidShape(format!(
        "输入形状 {:?} 含有 0",
        input
      )));
    }
    if !output.is_ready() {
      return Err(PipelineError::InvalidShape(format!(
        "输出形状 {:?} 含有 0",
        output
      )));
    }

    let decoder = Decoder::new(output.layout(), labels, self.config.confidence_threshold)?;
    debug!(
      "安装推理引擎 {}: 输入 {}x{}, 输出 {}x{}",
      engine.name(),
      input.width,
      input.height,
      output.channels,
      output.candidates
    );

    if self.installed.is_some() {
      warn!("替换已安装的推理引擎");
    }
    self.installed = Some(Installed {
      engine,
      input,
      decoder,
    });
    Ok(())
  }

  pub fn is_ready(&self) -> bool {
    self.installed.is_some()
  }

  /// 释放推理引擎，之后的 `detect` 均为空操作
  pub fn release(&mut self) -> Option<E> {
    self.installed.take().map(|installed| installed.engine)
  }

  /// 处理一帧
  ///
  /// 调用方负责串行调用，同一个引擎不支持并发推理。
  pub fn detect(&mut self, frame: &Frame) -> Result<DetectStatus, PipelineError> {
    let Some(installed) = self.installed.as_mut() else {
      debug!("推理引擎未就绪, 跳过第 {} 帧", frame.index());
      return Ok(DetectStatus::NotReady);
    };

    let start = Instant::now();
    let input = PreparedInput::from_frame(
      frame,
      installed.input.width as u32,
      installed.input.height as u32,
      self.config.normalize,
    );
    let output = installed.engine.run(&input)?;
    let candidates = installed.decoder.decode(&output)?;
    let candidate_count = candidates.len();
    let boxes = nms::suppress(candidates, self.config.iou_threshold);
    let elapsed_ms = start.elapsed().as_millis() as u64;

    debug!(
      "第 {} 帧: {} 个候选, 保留 {} 个, 耗时 {} ms",
      frame.index(),
      candidate_count,
      boxes.len(),
      elapsed_ms
    );

    if boxes.is_empty() {
      self.listener.on_empty_detect();
    } else {
      self.listener.on_detect(&boxes, elapsed_ms);
    }

    for observer in &self.observers {
      observer.observe(frame, &boxes);
    }

    Ok(match boxes.len() {
      0 => DetectStatus::Empty,
      n => DetectStatus::Detected(n),
    })
  }
}
