// 该文件是 Kanjian （看见） 项目的一部分。
// src/config.rs - 运行配置
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

use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.2;
pub const DEFAULT_MODEL_WIDTH: u32 = 800;
pub const DEFAULT_MODEL_HEIGHT: u32 = 800;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
  #[error("阈值必须位于 [0, 1] 区间, 实际为 {0}")]
  ThresholdOutOfRange(f32),
  #[error("模型分辨率不能为零: {0}x{1}")]
  ZeroResolution(u32, u32),
}

fn check_unit(value: f32) -> Result<f32, ConfigError> {
  if (0.0..=1.0).contains(&value) {
    Ok(value)
  } else {
    Err(ConfigError::ThresholdOutOfRange(value))
  }
}

/// 模型输入张量的空间尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelResolution {
  width: u32,
  height: u32,
}

impl ModelResolution {
  pub fn new(width: u32, height: u32) -> Result<Self, ConfigError> {
    if width == 0 || height == 0 {
      return Err(ConfigError::ZeroResolution(width, height));
    }
    Ok(Self { width, height })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }
}

impl Default for ModelResolution {
  fn default() -> Self {
    Self {
      width: DEFAULT_MODEL_WIDTH,
      height: DEFAULT_MODEL_HEIGHT,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
  confidence: f32,
  iou: f32,
}

impl Thresholds {
  pub fn new(confidence: f32, iou: f32) -> Result<Self, ConfigError> {
    Ok(Self {
      confidence: check_unit(confidence)?,
      iou: check_unit(iou)?,
    })
  }

  pub fn confidence(&self) -> f32 {
    self.confidence
  }

  pub fn iou(&self) -> f32 {
    self.iou
  }

  /// 界面上展示的百分比形式 (0 - 100)
  pub fn confidence_percent(&self) -> u8 {
    (self.confidence * 100.0).round() as u8
  }
}

impl Default for Thresholds {
  fn default() -> Self {
    Self {
      confidence: DEFAULT_CONFIDENCE_THRESHOLD,
      iou: DEFAULT_IOU_THRESHOLD,
    }
  }
}

/// 叠加层的全部可调参数，每个周期开始时读取一次
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayConfig {
  pub thresholds: Thresholds,
  pub resolution: ModelResolution,
  /// 标签后附带置信度
  pub show_confidence: bool,
  /// 关闭后跳过 NMS，渲染所有超过阈值的候选
  pub apply_nms: bool,
  /// 额外绘制边界框
  pub draw_boxes: bool,
  /// 采集时水平翻转（前置摄像头）
  pub mirror: bool,
}

impl Default for OverlayConfig {
  fn default() -> Self {
    Self {
      thresholds: Thresholds::default(),
      resolution: ModelResolution::default(),
      show_confidence: false,
      apply_nms: true,
      draw_boxes: false,
      mirror: false,
    }
  }
}

/// 可在周期之间被外部修改的共享配置
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
  inner: Arc<RwLock<OverlayConfig>>,
}

impl SharedConfig {
  pub fn new(config: OverlayConfig) -> Self {
    Self {
      inner: Arc::new(RwLock::new(config)),
    }
  }

  /// 取得当前配置的副本，周期内只使用这一份
  pub fn snapshot(&self) -> OverlayConfig {
    self
      .inner
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  pub fn update<F: FnOnce(&mut OverlayConfig)>(&self, f: F) {
    let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard);
    debug!("配置已更新: {:?}", *guard);
  }

  pub fn set_confidence_threshold(&self, value: f32) -> Result<(), ConfigError> {
    let confidence = check_unit(value)?;
    self.update(|config| config.thresholds.confidence = confidence);
    Ok(())
  }

  /// 按界面输入的百分比设置，超出 [0, 100] 的值会被截断
  pub fn set_confidence_percent(&self, percent: f32) {
    let percent = if percent.is_nan() {
      0.0
    } else {
      percent.clamp(0.0, 100.0)
    };
    self.update(|config| config.thresholds.confidence = percent / 100.0);
  }

  pub fn set_iou_threshold(&self, value: f32) -> Result<(), ConfigError> {
    let iou = check_unit(value)?;
    self.update(|config| config.thresholds.iou = iou);
    Ok(())
  }

  pub fn set_resolution(&self, width: u32, height: u32) -> Result<(), ConfigError> {
    let resolution = ModelResolution::new(width, height)?;
    self.update(|config| config.resolution = resolution);
    Ok(())
  }

  pub fn set_show_confidence(&self, show: bool) {
    self.update(|config| config.show_confidence = show);
  }

  pub fn set_apply_nms(&self, apply: bool) {
    self.update(|config| config.apply_nms = apply);
  }

  pub fn set_draw_boxes(&self, draw: bool) {
    self.update(|config| config.draw_boxes = draw);
  }

  pub fn set_mirror(&self, mirror: bool) {
    self.update(|config| config.mirror = mirror);
  }
}
