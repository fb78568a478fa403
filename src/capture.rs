// 该文件是 Cheyan （车眼） 项目的一部分。
// src/capture.rs - 车辆抓拍流程
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

//! # 车辆抓拍
//!
//! 检测结果中出现触发类别时执行两段式抓拍：
//!
//! 1. 立即保存完整原图 `IMG_<时间戳>.jpg`；
//! 2. 延迟固定时间后，按触发框裁剪并放大原图，保存为 `IMG_<时间戳>_zoom.jpg`。
//!
//! 每帧只由扫描顺序中第一个触发框启动流程。连续多帧满足条件时各自独立启动，
//! 不做去重。

use std::{path::Path, sync::Arc, time::Duration};

use chrono::Local;
use image::RgbImage;
use tracing::{error, info};

use crate::{
  bbox::BoundingBox,
  config::{DEFAULT_CAPTURE_DELAY, DetectConfig, TriggerClasses},
  frame::Frame,
  pipeline::FrameObserver,
  scheduler::Scheduler,
};

pub mod storage;
pub mod zoom;

pub use self::storage::{DirectoryStore, ImageStore, StoreError};

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
  Original,
  Zoom,
}

impl CaptureKind {
  pub fn file_name(&self, timestamp: &str) -> String {
    match self {
      CaptureKind::Original => format!("IMG_{}.jpg", timestamp),
      CaptureKind::Zoom => format!("IMG_{}_zoom.jpg", timestamp),
    }
  }
}

/// 图像保存成功后的提示
pub trait CaptureNotifier: Send + Sync {
  fn on_saved(&self, kind: CaptureKind, path: &Path);
}

/// 通过日志提示保存结果
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl CaptureNotifier for LogNotifier {
  fn on_saved(&self, kind: CaptureKind, path: &Path) {
    match kind {
      CaptureKind::Original => info!("原图已保存: {}", path.display()),
      CaptureKind::Zoom => info!("放大图已保存: {}", path.display()),
    }
  }
}

/// 一次已启动的抓拍
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureTicket {
  pub timestamp: String,
  pub trigger: BoundingBox,
}

fn persist<St: ImageStore + ?Sized>(
  store: &St,
  notifier: &dyn CaptureNotifier,
  image: &RgbImage,
  timestamp: &str,
  kind: CaptureKind,
) {
  let name = kind.file_name(timestamp);
  match store.write_image(image, &name) {
    Ok(path) => notifier.on_saved(kind, &path),
    Err(e) => error!("保存图像 {} 失败: {}", name, e),
  }
}

pub struct CaptureOrchestrator<St, Sc> {
  store: Arc<St>,
  scheduler: Sc,
  notifier: Arc<dyn CaptureNotifier>,
  triggers: TriggerClasses,
  delay: Duration,
}

impl<St, Sc> CaptureOrchestrator<St, Sc>
where
  St: ImageStore + 'static,
  Sc: Scheduler,
{
  pub fn new(store: Arc<St>, scheduler: Sc) -> Self {
    Self {
      store,
      scheduler,
      notifier: Arc::new(LogNotifier),
      triggers: TriggerClasses::default(),
      delay: DEFAULT_CAPTURE_DELAY,
    }
  }

  pub fn with_config(mut self, config: &DetectConfig) -> Self {
    self.triggers = config.trigger_classes.clone();
    self.delay = config.capture_delay;
    self
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn CaptureNotifier>) -> Self {
    self.notifier = notifier;
    self
  }

  pub fn with_triggers(mut self, triggers: TriggerClasses) -> Self {
    self.triggers = triggers;
    self
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn delay(&self) -> Duration {
    self.delay
  }

  /// 扫描顺序中第一个触发类别的检测框
  pub fn find_trigger<'a>(&self, boxes: &'a [BoundingBox]) -> Option<&'a BoundingBox> {
    boxes
      .iter()
      .find(|bbox| self.triggers.contains(&bbox.class_name))
  }

  /// 检查一帧的检测结果，满足条件时保存原图并调度放大抓拍
  pub fn inspect(&self, frame: &Frame, boxes: &[BoundingBox]) -> Option<CaptureTicket> {
    let trigger = self.find_trigger(boxes)?.clone();
    let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
    info!(
      "第 {} 帧检测到 {} ({:.2}%), 开始抓拍 {}",
      frame.index(),
      trigger.class_name,
      trigger.confidence * 100.0,
      timestamp
    );

    persist(
      self.store.as_ref(),
      self.notifier.as_ref(),
      frame.image(),
      &timestamp,
      CaptureKind::Original,
    );

    let store = Arc::clone(&self.store);
    let notifier = Arc::clone(&self.notifier);
    let image = frame.shared_image();
    let zoom_box = trigger.clone();
    let zoom_timestamp = timestamp.clone();
    self.scheduler.schedule(
      self.delay,
      Box::new(move || {
        let zoomed = zoom::zoomed_image(&image, &zoom_box);
        persist(
          store.as_ref(),
          notifier.as_ref(),
          &zoomed,
          &zoom_timestamp,
          CaptureKind::Zoom,
        );
      }),
    );

    Some(CaptureTicket { timestamp, trigger })
  }
}

impl<St, Sc> FrameObserver for CaptureOrchestrator<St, Sc>
where
  St: ImageStore + 'static,
  Sc: Scheduler,
{
  fn observe(&self, frame: &Frame, boxes: &[BoundingBox]) {
    self.inspect(frame, boxes);
  }
}
