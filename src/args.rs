// 该文件是 Kanjian （看见） 项目的一部分。
// src/args.rs - 叠加层参数配置
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

use std::path::PathBuf;

use clap::Args;

use crate::{
  config::{
    ConfigError, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IOU_THRESHOLD, DEFAULT_MODEL_HEIGHT,
    DEFAULT_MODEL_WIDTH, ModelResolution, OverlayConfig, Thresholds,
  },
  model::{ClassColorMap, LabelError, LabelTable},
  output::Renderer,
};

/// 各个可执行程序共用的叠加层参数
#[derive(Args, Debug, Clone)]
pub struct OverlayArgs {
  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IoU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_IOU_THRESHOLD, value_name = "THRESHOLD")]
  pub iou: f32,

  /// 模型输入宽度
  #[arg(long, default_value_t = DEFAULT_MODEL_WIDTH, value_name = "PIXELS")]
  pub model_width: u32,

  /// 模型输入高度
  #[arg(long, default_value_t = DEFAULT_MODEL_HEIGHT, value_name = "PIXELS")]
  pub model_height: u32,

  /// 显示宽度，缺省时使用输入帧宽度
  #[arg(long, value_name = "PIXELS")]
  pub display_width: Option<u32>,

  /// 显示高度，缺省时使用输入帧高度
  #[arg(long, value_name = "PIXELS")]
  pub display_height: Option<u32>,

  /// 标签后显示置信度
  #[arg(long)]
  pub show_confidence: bool,

  /// 跳过 NMS，渲染全部超过阈值的候选
  #[arg(long)]
  pub no_nms: bool,

  /// 绘制边界框
  #[arg(long)]
  pub draw_boxes: bool,

  /// 水平翻转输入（前置摄像头）
  #[arg(long)]
  pub mirror: bool,

  /// 类别名称文件，每行一个，缺省为 COCO 80 类
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 使用色相环为每个类别分配颜色，而不是十色调色板
  #[arg(long)]
  pub hue_colors: bool,

  /// 绘制文字使用的 TTF/OTF 字体
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
}

impl OverlayArgs {
  pub fn to_config(&self) -> Result<OverlayConfig, ConfigError> {
    Ok(OverlayConfig {
      thresholds: Thresholds::new(self.confidence, self.iou)?,
      resolution: ModelResolution::new(self.model_width, self.model_height)?,
      show_confidence: self.show_confidence,
      apply_nms: !self.no_nms,
      draw_boxes: self.draw_boxes,
      mirror: self.mirror,
    })
  }

  pub fn to_renderer(&self) -> Result<Renderer, LabelError> {
    let labels = match &self.labels {
      Some(path) => LabelTable::from_file(path)?,
      None => LabelTable::coco(),
    };
    let colors = if self.hue_colors {
      ClassColorMap::hue_wheel(labels.len())
    } else {
      ClassColorMap::default()
    };
    Ok(Renderer::new(labels, colors))
  }

  /// 显示尺寸，未指定的一边取输入帧尺寸
  pub fn display_size(&self, frame_width: u32, frame_height: u32) -> (u32, u32) {
    (
      self.display_width.unwrap_or(frame_width),
      self.display_height.unwrap_or(frame_height),
    )
  }
}
