// 该文件是 Cheyan （车眼） 项目的一部分。
// src/bin/vehicle_watch.rs - 车辆检测与抓拍
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
  path::PathBuf,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread,
  time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use cheyan::{
  DetectConfig, DetectionPipeline, FromUrl, Labels, TriggerClasses,
  capture::{
    CaptureOrchestrator, DirectoryStore,
    storage::{DEFAULT_CAPTURE_DIRECTORY, DEFAULT_JPEG_QUALITY},
  },
  config::{
    DEFAULT_CAPTURE_DELAY_MS, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_INPUT_MEAN, DEFAULT_INPUT_STD,
    DEFAULT_IOU_THRESHOLD, DEFAULT_TRIGGER_CLASSES,
  },
  engine::EngineWrapper,
  input::InputWrapper,
  preprocess::Normalize,
  report::ReportListener,
  scheduler::TimerScheduler,
  task::{ContinuousTask, Task},
};

/// 车辆检测与抓拍参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 推理引擎，例如 `onnx:///models/yolo.onnx?width=640&height=640`
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 标签文件，每行一个类别
  #[arg(long, value_name = "LABELS")]
  pub labels: PathBuf,
  /// 输入来源，`image://` 或 `folder://`
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 抓拍保存目录
  #[arg(long, value_name = "DIR", default_value = DEFAULT_CAPTURE_DIRECTORY)]
  pub output_dir: PathBuf,

  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
  pub confidence: f32,
  #[arg(long, default_value_t = DEFAULT_IOU_THRESHOLD)]
  pub iou: f32,
  /// 触发抓拍的类别
  #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_TRIGGER_CLASSES.map(String::from))]
  pub trigger: Vec<String>,
  /// 放大抓拍延迟（毫秒）
  #[arg(long, default_value_t = DEFAULT_CAPTURE_DELAY_MS)]
  pub capture_delay_ms: u64,
  #[arg(long, default_value_t = DEFAULT_INPUT_MEAN)]
  pub input_mean: f32,
  #[arg(long, default_value_t = DEFAULT_INPUT_STD)]
  pub input_std: f32,
  #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY)]
  pub jpeg_quality: u8,

  /// 每 N 帧处理一帧
  #[arg(long, default_value_t = 1)]
  pub frame_skip: u64,
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<u64>,
  /// 以 JSON 行输出检测结果
  #[arg(long)]
  pub json: bool,
}

fn install_ctrlc(stop: Arc<AtomicBool>) -> Result<()> {
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    stop.store(true, Ordering::SeqCst);
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })
  .context("无法设置 Ctrl-C 处理函数")
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("推理引擎: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("抓拍目录: {}", args.output_dir.display());

  let config = DetectConfig::default()
    .with_confidence_threshold(args.confidence)
    .with_iou_threshold(args.iou)
    .with_trigger_classes(TriggerClasses::new(args.trigger))
    .with_capture_delay(Duration::from_millis(args.capture_delay_ms))
    .with_normalize(Normalize::new(args.input_mean, args.input_std));

  let labels = Labels::from_path(&args.labels)
    .with_context(|| format!("无法读取标签文件: {}", args.labels.display()))?;
  let engine = EngineWrapper::from_url(&args.model)?;
  let input = InputWrapper::from_url(&args.input)?;

  let scheduler = Arc::new(TimerScheduler::new()?);
  let store = Arc::new(DirectoryStore::new(&args.output_dir).with_quality(args.jpeg_quality));
  let orchestrator = CaptureOrchestrator::new(store, Arc::clone(&scheduler)).with_config(&config);

  let mut pipeline =
    DetectionPipeline::new(config, ReportListener::new(args.json)).with_observer(orchestrator);
  pipeline.install(engine, labels)?;

  let stop = Arc::new(AtomicBool::new(false));
  install_ctrlc(Arc::clone(&stop))?;

  let result = ContinuousTask::default()
    .with_frame_skip(args.frame_skip)
    .with_frame_number(args.frame_number)
    .with_stop_flag(stop)
    .run_task(input, &mut pipeline);

  pipeline.release();
  info!("等待 {} 个待执行的抓拍任务", scheduler.pending());
  scheduler.shutdown();

  result?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use cheyan::config::DEFAULT_CAPTURE_DELAY;

  #[test]
  fn defaults_come_from_config() {
    let args = Args::try_parse_from([
      "vehicle-watch",
      "--model",
      "replay:///tmp/outputs.json",
      "--labels",
      "labels.txt",
      "--input",
      "image:///tmp/car.jpg",
    ])
    .unwrap();

    assert_eq!(
      Duration::from_millis(args.capture_delay_ms),
      DEFAULT_CAPTURE_DELAY
    );
    assert_eq!(args.trigger, vec!["truck", "bus", "van"]);
    assert_eq!(args.jpeg_quality, DEFAULT_JPEG_QUALITY);
    assert_eq!(args.confidence, DEFAULT_CONFIDENCE_THRESHOLD);
    assert_eq!(args.frame_skip, 1);
  }
}
