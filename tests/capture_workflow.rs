// 该文件是 Cheyan （车眼） 项目的一部分。
// tests/capture_workflow.rs - 抓拍流程集成测试
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
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
  time::{Duration, Instant},
};

use cheyan::{
  BoundingBox, DetectConfig, DetectListener, DetectStatus, DetectionPipeline, Frame, Labels,
  capture::{
    CaptureKind, CaptureNotifier, CaptureOrchestrator, DirectoryStore, ImageStore, StoreError,
  },
  engine::{InputShape, OutputShape, ReplayEngine},
  scheduler::{DeferredTask, Scheduler, TimerScheduler},
};
use image::{Rgb, RgbImage};

struct Silent;

impl DetectListener for Silent {
  fn on_empty_detect(&self) {}
  fn on_detect(&self, _boxes: &[BoundingBox], _elapsed_ms: u64) {}
}

/// 记录写入时间的存储
#[derive(Default)]
struct TimedStore {
  writes: Mutex<Vec<(String, Instant)>>,
}

impl ImageStore for TimedStore {
  fn write_image(&self, _image: &RgbImage, name: &str) -> Result<PathBuf, StoreError> {
    self
      .writes
      .lock()
      .unwrap()
      .push((name.to_string(), Instant::now()));
    Ok(PathBuf::from(name))
  }
}

#[derive(Default)]
struct RecordingScheduler {
  delays: Mutex<Vec<Duration>>,
  tasks: Mutex<Vec<DeferredTask>>,
}

impl Scheduler for RecordingScheduler {
  fn schedule(&self, delay: Duration, task: DeferredTask) {
    self.delays.lock().unwrap().push(delay);
    self.tasks.lock().unwrap().push(task);
  }
}

#[derive(Default)]
struct RecordingNotifier {
  saved: Mutex<Vec<(CaptureKind, PathBuf)>>,
}

impl CaptureNotifier for RecordingNotifier {
  fn on_saved(&self, kind: CaptureKind, path: &Path) {
    self.saved.lock().unwrap().push((kind, path.to_path_buf()));
  }
}

fn labels() -> Labels {
  ["car", "truck", "bus", "van", "person"].into_iter().collect()
}

fn truck_engine() -> ReplayEngine {
  ReplayEngine::new(
    InputShape::new(16, 16),
    OutputShape::new(9, 1),
    vec![vec![0.5, 0.5, 0.2, 0.2, 0.1, 0.9, 0.05, 0.0, 0.0]],
  )
  .unwrap()
}

fn car_engine() -> ReplayEngine {
  ReplayEngine::new(
    InputShape::new(16, 16),
    OutputShape::new(9, 1),
    vec![vec![0.5, 0.5, 0.2, 0.2, 0.9, 0.1, 0.05, 0.0, 0.0]],
  )
  .unwrap()
}

fn frame() -> Frame {
  let mut image = RgbImage::from_pixel(100, 80, Rgb([0, 0, 255]));
  for y in 32..48 {
    for x in 40..60 {
      image.put_pixel(x, y, Rgb([255, 255, 0]));
    }
  }
  Frame::new(0, image)
}

fn timestamp_of(name: &str) -> &str {
  name
    .strip_prefix("IMG_")
    .and_then(|rest| rest.strip_suffix(".jpg"))
    .map(|rest| rest.strip_suffix("_zoom").unwrap_or(rest))
    .unwrap()
}

#[test]
fn truck_schedules_two_artifacts_with_shared_timestamp() {
  let store = Arc::new(TimedStore::default());
  let scheduler = Arc::new(RecordingScheduler::default());
  let orchestrator = CaptureOrchestrator::new(Arc::clone(&store), Arc::clone(&scheduler))
    .with_config(&DetectConfig::default());

  let mut pipeline =
    DetectionPipeline::new(DetectConfig::default(), Silent).with_observer(orchestrator);
  pipeline.install(truck_engine(), labels()).unwrap();
  assert_eq!(pipeline.detect(&frame()).unwrap(), DetectStatus::Detected(1));

  assert_eq!(store.writes.lock().unwrap().len(), 1);
  assert_eq!(
    *scheduler.delays.lock().unwrap(),
    vec![Duration::from_millis(4000)]
  );

  // 引擎释放后延迟任务仍可完成
  pipeline.release();
  for task in scheduler.tasks.lock().unwrap().drain(..) {
    task();
  }

  let writes = store.writes.lock().unwrap();
  assert_eq!(writes.len(), 2);
  let original = &writes[0].0;
  let zoom = &writes[1].0;
  assert!(original.starts_with("IMG_") && !original.ends_with("_zoom.jpg"));
  assert!(zoom.ends_with("_zoom.jpg"));
  assert_eq!(timestamp_of(original), timestamp_of(zoom));
}

#[test]
fn non_trigger_class_captures_nothing() {
  let store = Arc::new(TimedStore::default());
  let scheduler = Arc::new(RecordingScheduler::default());
  let orchestrator = CaptureOrchestrator::new(Arc::clone(&store), Arc::clone(&scheduler));

  let mut pipeline =
    DetectionPipeline::new(DetectConfig::default(), Silent).with_observer(orchestrator);
  pipeline.install(car_engine(), labels()).unwrap();
  assert_eq!(pipeline.detect(&frame()).unwrap(), DetectStatus::Detected(1));

  assert!(store.writes.lock().unwrap().is_empty());
  assert!(scheduler.delays.lock().unwrap().is_empty());
}

#[test]
fn zoom_capture_lands_no_earlier_than_delay() {
  let store = Arc::new(TimedStore::default());
  let scheduler = Arc::new(TimerScheduler::new().unwrap());
  let orchestrator = CaptureOrchestrator::new(Arc::clone(&store), Arc::clone(&scheduler));

  let start = Instant::now();
  let ticket = orchestrator
    .inspect(
      &frame(),
      &[BoundingBox::from_center(0.5, 0.5, 0.2, 0.2, 0.9, 1, "truck")],
    )
    .unwrap();
  assert!(start.elapsed() < Duration::from_millis(4000));

  scheduler.shutdown();

  let writes = store.writes.lock().unwrap();
  assert_eq!(writes.len(), 2);
  assert_eq!(writes[0].0, format!("IMG_{}.jpg", ticket.timestamp));
  assert_eq!(writes[1].0, format!("IMG_{}_zoom.jpg", ticket.timestamp));
  assert!(writes[1].1.duration_since(writes[0].1) >= Duration::from_millis(4000));
}

#[test]
fn captures_are_written_to_disk() {
  let dir = tempfile::tempdir().unwrap();
  let store = Arc::new(DirectoryStore::new(dir.path().join("VehicleDetections")));
  let scheduler = Arc::new(TimerScheduler::new().unwrap());
  let notifier = Arc::new(RecordingNotifier::default());
  let orchestrator = CaptureOrchestrator::new(Arc::clone(&store), Arc::clone(&scheduler))
    .with_delay(Duration::from_millis(20))
    .with_notifier(notifier.clone());

  let mut pipeline =
    DetectionPipeline::new(DetectConfig::default(), Silent).with_observer(orchestrator);
  pipeline.install(truck_engine(), labels()).unwrap();
  pipeline.detect(&frame()).unwrap();
  scheduler.shutdown();

  let saved = notifier.saved.lock().unwrap();
  assert_eq!(saved.len(), 2);
  assert_eq!(saved[0].0, CaptureKind::Original);
  assert_eq!(saved[1].0, CaptureKind::Zoom);

  let original = image::open(&saved[0].1).unwrap().to_rgb8();
  let zoom = image::open(&saved[1].1).unwrap().to_rgb8();
  assert_eq!(original.dimensions(), (100, 80));
  assert_eq!(zoom.dimensions(), (100, 80));

  // 放大图中心为触发框内的黄色区域
  let center = zoom.get_pixel(50, 40);
  assert!(center[0] > 200 && center[1] > 200 && center[2] < 60);
}

#[test]
fn pipeline_moves_onto_frame_worker() {
  let store = Arc::new(TimedStore::default());
  let scheduler = Arc::new(RecordingScheduler::default());
  let orchestrator = CaptureOrchestrator::new(Arc::clone(&store), Arc::clone(&scheduler));

  let mut pipeline =
    DetectionPipeline::new(DetectConfig::default(), Silent).with_observer(orchestrator);
  pipeline.install(truck_engine(), labels()).unwrap();

  let worker = std::thread::spawn(move || {
    let status = pipeline.detect(&frame()).unwrap();
    pipeline.release();
    status
  });
  assert_eq!(worker.join().unwrap(), DetectStatus::Detected(1));

  assert_eq!(store.writes.lock().unwrap().len(), 1);
  assert_eq!(scheduler.delays.lock().unwrap().len(), 1);
}
