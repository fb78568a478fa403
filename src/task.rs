// 该文件是 Cheyan （车眼） 项目的一部分。
// src/task.rs - 连续检测任务
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

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use tracing::{error, info, warn};

use crate::{
  engine::InferenceEngine,
  frame::Frame,
  input::InputError,
  pipeline::{DetectListener, DetectStatus, DetectionPipeline},
};

pub trait Task<I, P>: Sized {
  type Error;
  fn run_task(self, input: I, pipeline: P) -> Result<TaskSummary, Self::Error>;
}

/// 任务结束时的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TaskSummary {
  pub frames_read: u64,
  pub frames_processed: u64,
  pub frames_with_detections: u64,
  pub failures: u64,
}

/// 逐帧处理输入直到输入结束、达到帧数上限或收到停止信号
#[derive(Debug)]
pub struct ContinuousTask {
  frame_number: Option<u64>,
  frame_skip: u64,
  stop: Option<Arc<AtomicBool>>,
}

impl Default for ContinuousTask {
  fn default() -> Self {
    Self {
      frame_number: None,
      frame_skip: 1,
      stop: None,
    }
  }
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<u64>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 每 `frame_skip` 帧处理一帧，0 视为 1
  pub fn with_frame_skip(mut self, frame_skip: u64) -> Self {
    self.frame_skip = frame_skip.max(1);
    self
  }

  pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
    self.stop = Some(stop);
    self
  }

  fn should_stop(&self) -> bool {
    self
      .stop
      .as_ref()
      .is_some_and(|stop| stop.load(Ordering::SeqCst))
  }
}

impl<'a, I, E, L> Task<I, &'a mut DetectionPipeline<E, L>> for ContinuousTask
where
  I: Iterator<Item = Result<Frame, InputError>>,
  E: InferenceEngine,
  L: DetectListener,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: I,
    pipeline: &'a mut DetectionPipeline<E, L>,
  ) -> Result<TaskSummary, Self::Error> {
    if !pipeline.is_ready() {
      anyhow::bail!("推理引擎未安装");
    }

    info!("开始任务, 每 {} 帧处理一帧", self.frame_skip);
    let mut summary = TaskSummary::default();

    for frame in input {
      if self.should_stop() {
        warn!("收到停止信号，退出任务循环");
        break;
      }

      summary.frames_read += 1;
      match frame {
        Ok(frame) if summary.frames_read % self.frame_skip == 0 => {
          summary.frames_processed += 1;
          match pipeline.detect(&frame) {
            Ok(DetectStatus::Detected(_)) => summary.frames_with_detections += 1,
            Ok(DetectStatus::Empty) => {}
            Ok(DetectStatus::NotReady) => {
              warn!("推理引擎已释放，退出任务循环");
              break;
            }
            Err(e) => {
              summary.failures += 1;
              error!("第 {} 帧检测失败: {}", frame.index(), e);
            }
          }
        }
        Ok(_) => {}
        Err(e) => {
          summary.failures += 1;
          warn!("读取第 {} 帧失败: {}", summary.frames_read, e);
        }
      }

      if self
        .frame_number
        .is_some_and(|n| summary.frames_read >= n)
      {
        info!("达到指定帧数 {}, 退出任务循环", summary.frames_read);
        break;
      }
    }

    info!(
      "任务完成: 读取 {} 帧, 处理 {} 帧, {} 帧有检测结果, {} 次失败",
      summary.frames_read,
      summary.frames_processed,
      summary.frames_with_detections,
      summary.failures
    );
    Ok(summary)
  }
}
