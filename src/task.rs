// 该文件是 Kanjian （看见） 项目的一部分。
// src/task.rs - 检测周期与实时循环调度
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
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread,
  time::{Duration, Instant},
};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  config::SharedConfig,
  frame::{Frame, FrameError},
  model::{BBox, CoordinateMapper, Detection, InferenceEngine, Preprocessor, decode, non_max_suppression},
  output::{DetectionLogEntry, LogRecord, LogSink, RenderOptions, RenderReport, Renderer, Surface},
};

pub const DEFAULT_REFRESH_RATE: f32 = 60.0;

#[derive(Error, Debug)]
pub enum CycleError {
  #[error("无效帧: {0}")]
  InvalidFrame(#[from] FrameError),
  #[error("推理失败: {0}")]
  Inference(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("实时循环已在运行")]
  AlreadyRunning,
  #[error("{0}")]
  Cycle(#[from] CycleError),
}

/// 单个周期的耗时与数量统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleStats {
  pub inference: Duration,
  pub total: Duration,
  pub candidates: usize,
  pub kept: usize,
  /// 输出末尾存在被丢弃的不完整记录
  pub malformed: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
  pub stats: CycleStats,
  pub detections: Vec<Detection>,
  pub render: RenderReport,
}

/// 预处理 → 推理 → 解码 → 映射 → 抑制 → 渲染 → 记录
pub struct Pipeline<E> {
  engine: E,
  renderer: Renderer,
  config: SharedConfig,
}

impl<E: InferenceEngine> Pipeline<E> {
  pub fn new(engine: E, renderer: Renderer, config: SharedConfig) -> Self {
    Self {
      engine,
      renderer,
      config,
    }
  }

  pub fn engine(&self) -> &E {
    &self.engine
  }

  pub fn renderer(&self) -> &Renderer {
    &self.renderer
  }

  pub fn config(&self) -> &SharedConfig {
    &self.config
  }

  /// 处理一帧，配置在周期开始时取一次快照
  ///
  /// 无效帧直接返回错误，不绘制也不记录；推理失败会先写入日志再返回。
  pub fn process<S, L>(&self, frame: Frame, surface: &mut S, sink: &mut L) -> Result<CycleReport, CycleError>
  where
    S: Surface + ?Sized,
    L: LogSink + ?Sized,
  {
    let start = Instant::now();
    let config = self.config.snapshot();

    let frame = if config.mirror { frame.mirrored() } else { frame };
    let input = Preprocessor::new(config.resolution).preprocess(&frame)?;
    drop(frame);
    debug!("输入张量形状: {:?}", input.shape());

    let now = Instant::now();
    let output = match self.engine.infer(&input) {
      Ok(output) => output,
      Err(e) => {
        error!("推理失败: {}", e);
        sink.append(LogRecord::failure(e.to_string()));
        return Err(CycleError::Inference(Box::new(e)));
      }
    };
    let inference = now.elapsed();
    debug!("输出张量形状: {:?}", output.shape());

    let decoded = decode(&output, config.thresholds.confidence());
    let (display_width, display_height) = surface.size();
    let mapper = CoordinateMapper::new(config.resolution, display_width, display_height);
    let boxes: Vec<BBox> = decoded.candidates.iter().map(|c| mapper.map(&c.bbox)).collect();

    let keep: Vec<usize> = if config.apply_nms {
      let scores: Vec<f32> = decoded.candidates.iter().map(|c| c.score).collect();
      non_max_suppression(&boxes, &scores, config.thresholds.iou())
    } else {
      (0..boxes.len()).collect()
    };

    let detections: Vec<Detection> = keep
      .into_iter()
      .map(|i| Detection {
        bbox: boxes[i],
        class_id: decoded.candidates[i].class_id,
        score: decoded.candidates[i].score,
      })
      .collect();

    let render = self
      .renderer
      .render(surface, &detections, RenderOptions::from(&config));
    sink.append(LogRecord::Cycle(DetectionLogEntry::new(render.detections.clone())));

    let stats = CycleStats {
      inference,
      total: start.elapsed(),
      candidates: decoded.candidates.len(),
      kept: detections.len(),
      malformed: decoded.malformed.is_some(),
    };
    info!(
      "周期完成，候选 {} 个，保留 {} 个，推理耗时: {:.2?}，总耗时: {:.2?}",
      stats.candidates, stats.kept, stats.inference, stats.total
    );

    Ok(CycleReport {
      stats,
      detections,
      render,
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
  Idle,
  Running,
}

/// 实时循环的取消锁存器，可克隆后交给其他线程或信号处理函数
///
/// 循环只在两个周期之间检查它，正在进行的周期总会完整结束。
#[derive(Debug, Clone, Default)]
pub struct LoopControl {
  running: Arc<AtomicBool>,
}

impl LoopControl {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn state(&self) -> LoopState {
    if self.running.load(Ordering::SeqCst) {
      LoopState::Running
    } else {
      LoopState::Idle
    }
  }

  pub fn is_running(&self) -> bool {
    self.state() == LoopState::Running
  }

  /// Idle → Running，已在运行时返回 false
  pub fn start(&self) -> bool {
    self
      .running
      .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
      .is_ok()
  }

  pub fn stop(&self) {
    if self.running.swap(false, Ordering::SeqCst) {
      debug!("循环状态: Running → Idle");
    }
  }

  /// 返回切换后的状态
  ///
  /// 只能停止正在运行的循环，启动必须经由调度器，否则会出现没有循环却处于 Running 的状态。
  pub fn toggle(&self) -> LoopState {
    if self.running.swap(false, Ordering::SeqCst) {
      debug!("循环状态: Running → Idle");
    } else {
      debug!("循环未运行，切换不会启动循环");
    }
    LoopState::Idle
  }

  /// 清空叠加层并停止实时循环，切换摄像头前也会调用
  pub fn reset<S: Surface + ?Sized>(&self, surface: &mut S) {
    info!("重置叠加层");
    surface.clear();
    self.stop();
  }

  /// 宿主界面被隐藏时强制停止，不等待当前周期
  pub fn visibility_changed(&self, hidden: bool) {
    if hidden {
      info!("显示表面被隐藏，停止实时循环");
      self.stop();
    }
  }
}

/// 每个周期之后唯一的让出点
pub trait FrameYield {
  fn yield_frame(&mut self);
}

/// 按显示刷新率节流，距上次让出不足一个刷新间隔时休眠补齐
#[derive(Debug, Clone)]
pub struct RefreshTicker {
  interval: Duration,
  last: Option<Instant>,
}

impl RefreshTicker {
  pub fn new(refresh_rate: f32) -> Self {
    let refresh_rate = if refresh_rate.is_finite() && refresh_rate > 0.0 {
      refresh_rate
    } else {
      warn!("无效的刷新率 {}, 使用默认值 {}", refresh_rate, DEFAULT_REFRESH_RATE);
      DEFAULT_REFRESH_RATE
    };
    Self {
      interval: Duration::from_secs_f64(1.0 / refresh_rate as f64),
      last: None,
    }
  }

  pub fn interval(&self) -> Duration {
    self.interval
  }
}

impl Default for RefreshTicker {
  fn default() -> Self {
    Self::new(DEFAULT_REFRESH_RATE)
  }
}

impl FrameYield for RefreshTicker {
  fn yield_frame(&mut self) {
    if let Some(last) = self.last {
      let elapsed = last.elapsed();
      if elapsed < self.interval {
        thread::sleep(self.interval - elapsed);
      }
    }
    self.last = Some(Instant::now());
  }
}

/// 不等待，直接进入下一周期
#[derive(Debug, Clone, Copy, Default)]
pub struct NoYield;

impl FrameYield for NoYield {
  fn yield_frame(&mut self) {}
}

pub trait Task<I, E, S: ?Sized, L: ?Sized>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, pipeline: &Pipeline<E>, surface: &mut S, sink: &mut L) -> Result<Self::Output, Self::Error>;
}

/// 单次采集：先清空叠加层，再完整执行一次周期，与循环状态无关
#[derive(Debug, Clone, Copy, Default)]
pub struct OneShotTask;

impl<I, E, S, L> Task<I, E, S, L> for OneShotTask
where
  I: Iterator<Item = Frame>,
  E: InferenceEngine,
  S: Surface + ?Sized,
  L: LogSink + ?Sized,
{
  type Output = Option<CycleReport>;
  type Error = CycleError;

  fn run_task(self, mut input: I, pipeline: &Pipeline<E>, surface: &mut S, sink: &mut L) -> Result<Self::Output, Self::Error> {
    surface.clear();

    let Some(frame) = input.next() else {
      warn!("没有输入帧");
      return Ok(None);
    };

    match pipeline.process(frame, surface, sink) {
      Ok(report) => Ok(Some(report)),
      Err(CycleError::InvalidFrame(e)) => {
        warn!("跳过无效帧: {}", e);
        Ok(None)
      }
      Err(e) => Err(e),
    }
  }
}

/// 一次实时循环的汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
  pub cycles: usize,
  pub skipped: usize,
  pub detections: usize,
}

/// 实时循环调度器
pub struct ContinuousTask<Y = RefreshTicker> {
  frame_number: Option<usize>,
  control: LoopControl,
  started: bool,
  ticker: Y,
}

impl Default for ContinuousTask {
  fn default() -> Self {
    Self {
      frame_number: None,
      control: LoopControl::new(),
      started: false,
      ticker: RefreshTicker::default(),
    }
  }
}

impl<Y: FrameYield> ContinuousTask<Y> {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 由循环自己启动锁存器，已在运行时返回 `AlreadyRunning`
  pub fn with_control(mut self, control: LoopControl) -> Self {
    self.control = control;
    self.started = false;
    self
  }

  /// 锁存器已由调用方 `start()`，期间收到的停止信号会让循环不执行任何周期
  pub fn with_started_control(mut self, control: LoopControl) -> Self {
    self.control = control;
    self.started = true;
    self
  }

  pub fn with_ticker<T: FrameYield>(self, ticker: T) -> ContinuousTask<T> {
    ContinuousTask {
      frame_number: self.frame_number,
      control: self.control,
      started: self.started,
      ticker,
    }
  }

  pub fn control(&self) -> LoopControl {
    self.control.clone()
  }
}

impl<I, E, S, L, Y> Task<I, E, S, L> for ContinuousTask<Y>
where
  I: Iterator<Item = Frame>,
  E: InferenceEngine,
  S: Surface + ?Sized,
  L: LogSink + ?Sized,
  Y: FrameYield,
{
  type Output = LoopSummary;
  type Error = TaskError;

  fn run_task(mut self, mut input: I, pipeline: &Pipeline<E>, surface: &mut S, sink: &mut L) -> Result<Self::Output, Self::Error> {
    if !self.started && !self.control.start() {
      error!("实时循环已在运行");
      return Err(TaskError::AlreadyRunning);
    }
    info!("开始实时循环...");

    let mut summary = LoopSummary::default();
    let mut frame_index = 0usize;
    let result = loop {
      if !self.control.is_running() {
        warn!("收到停止信号，退出循环");
        break Ok(());
      }

      let Some(frame) = input.next() else {
        warn!("采集源不可用，退出循环");
        break Ok(());
      };
      frame_index += 1;
      debug!("处理第 {} 帧图像", frame_index);

      match pipeline.process(frame, surface, sink) {
        Ok(report) => {
          summary.cycles += 1;
          summary.detections += report.detections.len();
        }
        Err(CycleError::InvalidFrame(e)) => {
          warn!("跳过无效帧: {}", e);
          summary.skipped += 1;
        }
        Err(e) => break Err(TaskError::from(e)),
      }

      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出循环", frame_index);
        break Ok(());
      }

      self.ticker.yield_frame();
    };

    self.control.stop();
    info!(
      "循环结束: {} 个周期, 跳过 {} 帧, 共 {} 个检测",
      summary.cycles, summary.skipped, summary.detections
    );
    result.map(|()| summary)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    config::{ModelResolution, OverlayConfig},
    frame::{PixelLayout, Tensor},
    model::ReplayEngine,
    output::{
      DetectionLog,
      testing::{Op, RecordingSurface},
    },
  };

  fn frame() -> Frame {
    Frame::new(4, 4, PixelLayout::Rgb, vec![100; 48]).unwrap()
  }

  fn empty_frame() -> Frame {
    Frame::new(0, 0, PixelLayout::Rgb, vec![]).unwrap()
  }

  fn config(width: u32, height: u32) -> SharedConfig {
    SharedConfig::new(OverlayConfig {
      resolution: ModelResolution::new(width, height).unwrap(),
      ..OverlayConfig::default()
    })
  }

  fn pipeline<E: InferenceEngine>(engine: E, config: SharedConfig) -> Pipeline<E> {
    Pipeline::new(engine, Renderer::default(), config)
  }

  // 两个完全重叠的框加一个不相交的框
  fn overlapping_output() -> Vec<f32> {
    vec![
      0.0, 0.0, 10.0, 10.0, 0.9, 0.0, //
      0.0, 0.0, 10.0, 10.0, 0.8, 1.0, //
      20.0, 20.0, 30.0, 30.0, 0.7, 2.0, //
      40.0, 40.0, 50.0, 50.0, 0.49, 3.0,
    ]
  }

  struct FailingEngine;

  impl InferenceEngine for FailingEngine {
    type Error = std::io::Error;

    fn infer(&self, _input: &Tensor) -> Result<Tensor, Self::Error> {
      Err(std::io::Error::other("npu lost"))
    }
  }

  /// 推理期间执行一个副作用，模拟周期中途的外部操作
  struct HookEngine<F: Fn()> {
    hook: F,
    inner: ReplayEngine,
  }

  impl<F: Fn()> InferenceEngine for HookEngine<F> {
    type Error = crate::model::ReplayError;

    fn infer(&self, input: &Tensor) -> Result<Tensor, Self::Error> {
      (self.hook)();
      self.inner.infer(input)
    }
  }

  #[test]
  fn suppresses_duplicates_and_keeps_disjoint() {
    let pipeline = pipeline(ReplayEngine::new(overlapping_output()), config(100, 100));
    let mut surface = RecordingSurface::new(100, 100);
    let mut log = DetectionLog::unbounded();

    let report = pipeline.process(frame(), &mut surface, &mut log).unwrap();
    let classes: Vec<i64> = report.detections.iter().map(|d| d.class_id).collect();
    assert_eq!(classes, vec![0, 2]);
    assert_eq!(report.stats.candidates, 3);
    assert_eq!(report.stats.kept, 2);
    assert_eq!(log.len(), 1);
  }

  #[test]
  fn disabled_nms_renders_all_candidates() {
    let config = config(100, 100);
    config.set_apply_nms(false);
    let pipeline = pipeline(ReplayEngine::new(overlapping_output()), config);
    let mut surface = RecordingSurface::new(100, 100);
    let mut log = DetectionLog::unbounded();

    let report = pipeline.process(frame(), &mut surface, &mut log).unwrap();
    assert_eq!(report.detections.len(), 3);
    assert_eq!(surface.circles(), 3);
  }

  #[test]
  fn boxes_are_mapped_to_display_pixels() {
    let pipeline = pipeline(
      ReplayEngine::new(vec![100.0, 100.0, 200.0, 200.0, 0.9, 0.0]),
      config(800, 800),
    );
    let mut surface = RecordingSurface::new(640, 480);
    let mut log = DetectionLog::unbounded();

    let report = pipeline.process(frame(), &mut surface, &mut log).unwrap();
    assert_eq!(report.detections[0].bbox, BBox::new(80.0, 60.0, 160.0, 120.0));
  }

  #[test]
  fn malformed_tail_is_not_fatal() {
    let mut output = overlapping_output();
    output.extend_from_slice(&[1.0, 2.0, 3.0]);
    let pipeline = pipeline(ReplayEngine::new(output), config(100, 100));
    let mut surface = RecordingSurface::new(100, 100);
    let mut log = DetectionLog::unbounded();

    let report = pipeline.process(frame(), &mut surface, &mut log).unwrap();
    assert!(report.stats.malformed);
    assert_eq!(report.stats.kept, 2);
  }

  #[test]
  fn config_is_read_once_per_cycle() {
    let config = config(100, 100);
    let actor = config.clone();
    let engine = HookEngine {
      hook: move || actor.set_confidence_percent(95.0),
      inner: ReplayEngine::new(overlapping_output()),
    };
    let pipeline = pipeline(engine, config);
    let mut surface = RecordingSurface::new(100, 100);
    let mut log = DetectionLog::unbounded();

    // 第一个周期仍使用开始时的 0.5
    let first = pipeline.process(frame(), &mut surface, &mut log).unwrap();
    assert_eq!(first.detections.len(), 2);
    let second = pipeline.process(frame(), &mut surface, &mut log).unwrap();
    assert!(second.detections.is_empty());
  }

  #[test]
  fn mirrored_capture_is_flipped_before_inference() {
    let config = config(2, 1);
    config.set_mirror(true);
    let seen = std::cell::RefCell::new(Vec::new());
    struct Probe<'a>(&'a std::cell::RefCell<Vec<f32>>);
    impl InferenceEngine for Probe<'_> {
      type Error = std::io::Error;
      fn infer(&self, input: &Tensor) -> Result<Tensor, Self::Error> {
        self.0.borrow_mut().extend_from_slice(input.data());
        Ok(Tensor::from_flat("output0", vec![]))
      }
    }
    let pipeline = pipeline(Probe(&seen), config);
    let frame = Frame::new(2, 1, PixelLayout::Rgb, vec![255, 255, 255, 0, 0, 0]).unwrap();
    pipeline
      .process(frame, &mut RecordingSurface::new(2, 1), &mut DetectionLog::unbounded())
      .unwrap();
    // R 平面: 原本 [1, 0]，翻转后 [0, 1]
    assert_eq!(&seen.borrow()[..2], &[0.0, 1.0]);
  }

  #[test]
  fn one_shot_clears_before_capturing() {
    let pipeline = pipeline(ReplayEngine::new(vec![]), config(100, 100));
    let mut surface = RecordingSurface::new(100, 100);
    let mut log = DetectionLog::unbounded();

    let report = OneShotTask
      .run_task(std::iter::empty::<Frame>(), &pipeline, &mut surface, &mut log)
      .unwrap();
    assert!(report.is_none());
    assert_eq!(surface.ops, vec![Op::Clear]);
    assert!(log.is_empty());
  }

  #[test]
  fn one_shot_ignores_loop_state() {
    let pipeline = pipeline(ReplayEngine::new(overlapping_output()), config(100, 100));
    let control = LoopControl::new();
    control.start();
    let mut surface = RecordingSurface::new(100, 100);
    let mut log = DetectionLog::unbounded();

    let report = OneShotTask
      .run_task(std::iter::once(frame()), &pipeline, &mut surface, &mut log)
      .unwrap();
    assert_eq!(report.map(|r| r.detections.len()), Some(2));
    assert_eq!(control.state(), LoopState::Running);
  }

  #[test]
  fn loop_runs_until_source_is_exhausted() {
    let pipeline = pipeline(ReplayEngine::new(overlapping_output()), config(100, 100));
    let mut surface = RecordingSurface::new(100, 100);
    let mut log = DetectionLog::unbounded();
    let task = ContinuousTask::default().with_ticker(NoYield);
    let control = task.control();

    let summary = task
      .run_task(vec![frame(), frame(), frame()].into_iter(), &pipeline, &mut surface, &mut log)
      .unwrap();
    assert_eq!(
      summary,
      LoopSummary {
        cycles: 3,
        skipped: 0,
        detections: 6
      }
    );
    assert_eq!(log.len(), 3);
    assert_eq!(control.state(), LoopState::Idle);
  }

  #[test]
  fn invalid_frames_are_skipped_silently() {
    let pipeline = pipeline(ReplayEngine::new(overlapping_output()), config(100, 100));
    let mut surface = RecordingSurface::new(100, 100);
    let mut log = DetectionLog::unbounded();

    let summary = ContinuousTask::default()
      .with_ticker(NoYield)
      .run_task(vec![empty_frame(), frame()].into_iter(), &pipeline, &mut surface, &mut log)
      .unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.cycles, 1);
    assert_eq!(log.len(), 1);
  }

  #[test]
  fn inference_failure_stops_loop_and_is_logged() {
    let pipeline = pipeline(FailingEngine, config(100, 100));
    let mut surface = RecordingSurface::new(100, 100);
    let mut log = DetectionLog::unbounded();
    let task = ContinuousTask::default().with_ticker(NoYield);
    let control = task.control();

    let result = task.run_task(std::iter::repeat_with(frame), &pipeline, &mut surface, &mut log);
    assert!(matches!(result, Err(TaskError::Cycle(CycleError::Inference(_)))));
    assert_eq!(log.len(), 1);
    assert!(matches!(log.latest(), Some(LogRecord::Failure { message, .. }) if message == "npu lost"));
    assert_eq!(surface.circles(), 0);
    assert_eq!(control.state(), LoopState::Idle);
  }

  #[test]
  fn stop_lets_cycle_in_flight_finish() {
    let control = LoopControl::new();
    let stopper = control.clone();
    let engine = HookEngine {
      hook: move || stopper.stop(),
      inner: ReplayEngine::new(overlapping_output()),
    };
    let pipeline = pipeline(engine, config(100, 100));
    let mut surface = RecordingSurface::new(100, 100);
    let mut log = DetectionLog::unbounded();

    let summary = ContinuousTask::default()
      .with_control(control.clone())
      .with_ticker(NoYield)
      .run_task(std::iter::repeat_with(frame), &pipeline, &mut surface, &mut log)
      .unwrap();
    assert_eq!(summary.cycles, 1);
    assert_eq!(log.len(), 1);
    assert_eq!(surface.circles(), 2);
  }

  #[test]
  fn visibility_loss_stops_between_cycles() {
    let control = LoopControl::new();
    let host = control.clone();
    let engine = HookEngine {
      hook: move || host.visibility_changed(true),
      inner: ReplayEngine::new(vec![]),
    };
    let pipeline = pipeline(engine, config(100, 100));

    let summary = ContinuousTask::default()
      .with_control(control)
      .with_ticker(NoYield)
      .run_task(
        std::iter::repeat_with(frame),
        &pipeline,
        &mut RecordingSurface::new(100, 100),
        &mut DetectionLog::unbounded(),
      )
      .unwrap();
    assert_eq!(summary.cycles, 1);
  }

  #[test]
  fn frame_limit_ends_loop() {
    let pipeline = pipeline(ReplayEngine::new(vec![]), config(100, 100));
    let summary = ContinuousTask::default()
      .with_frame_number(Some(5))
      .with_ticker(NoYield)
      .run_task(
        std::iter::repeat_with(frame),
        &pipeline,
        &mut RecordingSurface::new(100, 100),
        &mut DetectionLog::unbounded(),
      )
      .unwrap();
    assert_eq!(summary.cycles, 5);
  }

  #[test]
  fn second_start_is_rejected() {
    let pipeline = pipeline(ReplayEngine::new(vec![]), config(100, 100));
    let task = ContinuousTask::default().with_ticker(NoYield);
    assert!(task.control().start());

    let result = task.run_task(
      std::iter::once(frame()),
      &pipeline,
      &mut RecordingSurface::new(100, 100),
      &mut DetectionLog::unbounded(),
    );
    assert!(matches!(result, Err(TaskError::AlreadyRunning)));
  }

  #[test]
  fn control_transitions() {
    let control = LoopControl::new();
    assert_eq!(control.state(), LoopState::Idle);
    assert!(control.start());
    assert!(!control.start());
    assert_eq!(control.toggle(), LoopState::Idle);
    assert_eq!(control.toggle(), LoopState::Idle);
    assert!(control.start());
    control.visibility_changed(false);
    assert!(control.is_running());
    control.visibility_changed(true);
    assert!(!control.is_running());
  }

  #[test]
  fn toggle_from_idle_leaves_loop_startable() {
    let pipeline = pipeline(ReplayEngine::new(vec![]), config(100, 100));
    let control = LoopControl::new();
    assert_eq!(control.toggle(), LoopState::Idle);
    assert_eq!(control.state(), LoopState::Idle);

    let summary = ContinuousTask::default()
      .with_control(control.clone())
      .with_ticker(NoYield)
      .run_task(
        vec![frame(), frame()].into_iter(),
        &pipeline,
        &mut RecordingSurface::new(100, 100),
        &mut DetectionLog::unbounded(),
      )
      .unwrap();
    assert_eq!(summary.cycles, 2);
    assert_eq!(control.state(), LoopState::Idle);
  }

  #[test]
  fn toggle_stops_running_loop() {
    let control = LoopControl::new();
    let host = control.clone();
    let engine = HookEngine {
      hook: move || {
        host.toggle();
      },
      inner: ReplayEngine::new(vec![]),
    };
    let pipeline = pipeline(engine, config(100, 100));

    let summary = ContinuousTask::default()
      .with_control(control.clone())
      .with_ticker(NoYield)
      .run_task(
        std::iter::repeat_with(frame),
        &pipeline,
        &mut RecordingSurface::new(100, 100),
        &mut DetectionLog::unbounded(),
      )
      .unwrap();
    assert_eq!(summary.cycles, 1);
    assert_eq!(control.state(), LoopState::Idle);
  }

  #[test]
  fn started_control_is_accepted() {
    let pipeline = pipeline(ReplayEngine::new(overlapping_output()), config(100, 100));
    let control = LoopControl::new();
    assert!(control.start());

    let summary = ContinuousTask::default()
      .with_started_control(control.clone())
      .with_ticker(NoYield)
      .run_task(
        vec![frame(), frame()].into_iter(),
        &pipeline,
        &mut RecordingSurface::new(100, 100),
        &mut DetectionLog::unbounded(),
      )
      .unwrap();
    assert_eq!(summary.cycles, 2);
    assert_eq!(control.state(), LoopState::Idle);
  }

  #[test]
  fn stop_before_started_loop_runs_is_kept() {
    let pipeline = pipeline(ReplayEngine::new(overlapping_output()), config(100, 100));
    let control = LoopControl::new();
    assert!(control.start());
    control.stop();
    let mut log = DetectionLog::unbounded();

    let summary = ContinuousTask::default()
      .with_started_control(control.clone())
      .with_ticker(NoYield)
      .run_task(
        std::iter::repeat_with(frame),
        &pipeline,
        &mut RecordingSurface::new(100, 100),
        &mut log,
      )
      .unwrap();
    assert_eq!(summary, LoopSummary::default());
    assert!(log.is_empty());
    assert_eq!(control.state(), LoopState::Idle);
  }

  #[test]
  fn reset_clears_overlay_and_stops_loop() {
    let pipeline = pipeline(ReplayEngine::new(overlapping_output()), config(100, 100));
    let control = LoopControl::new();
    let mut surface = RecordingSurface::new(100, 100);
    pipeline
      .process(frame(), &mut surface, &mut DetectionLog::unbounded())
      .unwrap();
    assert!(control.start());

    control.reset(&mut surface);
    assert_eq!(surface.ops.last(), Some(&Op::Clear));
    assert_eq!(control.state(), LoopState::Idle);

    control.reset(&mut surface);
    assert_eq!(control.state(), LoopState::Idle);
  }

  #[test]
  fn ticker_paces_cycles() {
    let mut ticker = RefreshTicker::new(100.0);
    assert_eq!(ticker.interval(), Duration::from_millis(10));
    let start = Instant::now();
    for _ in 0..4 {
      ticker.yield_frame();
    }
    assert!(start.elapsed() >= Duration::from_millis(30));
    assert_eq!(RefreshTicker::new(0.0).interval(), RefreshTicker::default().interval());
  }
}
