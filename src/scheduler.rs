// 该文件是 Cheyan （车眼） 项目的一部分。
// src/scheduler.rs - 延迟任务调度
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

//! # 延迟任务调度
//!
//! 放大抓拍需要在固定延迟后执行，且不能阻塞处理帧的线程。
//! [`TimerScheduler`] 使用一个独立的计时线程，按截止时间依次执行任务。

use std::{
  cmp::Ordering,
  collections::BinaryHeap,
  panic::{AssertUnwindSafe, catch_unwind},
  sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
  thread::{self, JoinHandle},
  time::{Duration, Instant},
};

use tracing::{debug, error, info, warn};

pub type DeferredTask = Box<dyn FnOnce() + Send + 'static>;

/// 延迟执行设施
pub trait Scheduler: Send + Sync {
  /// 在 `delay` 之后执行 `task`，调用本身立即返回
  fn schedule(&self, delay: Duration, task: DeferredTask);
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
  fn schedule(&self, delay: Duration, task: DeferredTask) {
    (**self).schedule(delay, task)
  }
}

struct Entry {
  deadline: Instant,
  seq: u64,
  task: DeferredTask,
}

impl PartialEq for Entry {
  fn eq(&self, other: &Self) -> bool {
    self.deadline == other.deadline && self.seq == other.seq
  }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Entry {
  // BinaryHeap 为大顶堆，反转后最早的截止时间在堆顶
  fn cmp(&self, other: &Self) -> Ordering {
    other
      .deadline
      .cmp(&self.deadline)
      .then_with(|| other.seq.cmp(&self.seq))
  }
}

#[derive(Default)]
struct TimerQueue {
  entries: BinaryHeap<Entry>,
  next_seq: u64,
  closing: bool,
}

#[derive(Default)]
struct TimerShared {
  queue: Mutex<TimerQueue>,
  cond: Condvar,
}

impl TimerShared {
  fn lock(&self) -> MutexGuard<'_, TimerQueue> {
    self.queue.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

/// 基于独立计时线程的调度器
///
/// 关闭时已排队的任务仍会在各自的截止时间执行，之后计时线程退出；
/// 关闭后提交的任务会被丢弃。
pub struct TimerScheduler {
  shared: Arc<TimerShared>,
  worker: Mutex<Option<JoinHandle<()>>>,
}

impl TimerScheduler {
  pub fn new() -> std::io::Result<Self> {
    let shared = Arc::new(TimerShared::default());
    let worker_shared = Arc::clone(&shared);
    let worker = thread::Builder::new()
      .name("capture-timer".to_string())
      .spawn(move || timer_loop(&worker_shared))?;

    Ok(Self {
      shared,
      worker: Mutex::new(Some(worker)),
    })
  }

  /// 尚未执行的任务数量
  pub fn pending(&self) -> usize {
    self.shared.lock().entries.len()
  }

  /// 等待已排队任务全部执行后停止计时线程
  pub fn shutdown(&self) {
    {
      let mut queue = self.shared.lock();
      if !queue.closing {
        info!("关闭调度器, 剩余 {} 个待执行任务", queue.entries.len());
      }
      queue.closing = true;
    }
    self.shared.cond.notify_all();

    let handle = self
      .worker
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take();
    if let Some(handle) = handle
      && handle.join().is_err()
    {
      error!("计时线程异常退出");
    }
  }
}

impl Scheduler for TimerScheduler {
  fn schedule(&self, delay: Duration, task: DeferredTask) {
    let mut queue = self.shared.lock();
    if queue.closing {
      warn!("调度器已关闭, 丢弃延迟 {:?} 的任务", delay);
      return;
    }
    let seq = queue.next_seq;
    queue.next_seq += 1;
    queue.entries.push(Entry {
      deadline: Instant::now() + delay,
      seq,
      task,
    });
    debug!("已调度任务 #{}, 延迟 {:?}", seq, delay);
    drop(queue);
    self.shared.cond.notify_all();
  }
}

impl Drop for TimerScheduler {
  fn drop(&mut self) {
    self.shutdown();
  }
}

fn timer_loop(shared: &TimerShared) {
  loop {
    let task = {
      let mut queue = shared.lock();
      loop {
        let now = Instant::now();
        let next = queue.entries.peek().map(|entry| entry.deadline);
        match next {
          None if queue.closing => return,
          None => {
            queue = shared
              .cond
              .wait(queue)
              .unwrap_or_else(PoisonError::into_inner);
          }
          Some(deadline) if deadline <= now => {
            if let Some(entry) = queue.entries.pop() {
              debug!("执行任务 #{}", entry.seq);
              break entry.task;
            }
          }
          Some(deadline) => {
            queue = shared
              .cond
              .wait_timeout(queue, deadline - now)
              .unwrap_or_else(PoisonError::into_inner)
              .0;
          }
        }
      }
    };

    if catch_unwind(AssertUnwindSafe(task)).is_err() {
      error!("延迟任务执行时发生 panic");
    }
  }
}
