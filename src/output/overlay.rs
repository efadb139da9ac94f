// 该文件是 Kanjian （看见） 项目的一部分。
// src/output/overlay.rs - 检测结果叠加层渲染
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

use image::Rgba;
use tracing::debug;

use crate::{
  config::OverlayConfig,
  model::{ClassColorMap, Detection, LabelTable},
  output::{Color, LoggedDetection, Surface, TextAlign},
};

// 标记点与标签
const MARKER_RADIUS: f32 = 3.0;
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_OFFSET: f32 = 10.0; // 标签底部与中心点的距离

// 左上角计数面板
const COUNT_FONT_SIZE: f32 = 24.0;
const PANEL_COLOR: Color = Rgba([0, 0, 0, 153]); // 60% 不透明黑色
const TEXT_COLOR: Color = Rgba([255, 255, 255, 255]);
const TOTAL_PANEL_X: f32 = 25.0;
const TOTAL_PANEL_Y: f32 = 5.0;
const TOTAL_PANEL_HEIGHT: f32 = 34.0;
const CLASS_LINE_START: f32 = 60.0;
const CLASS_LINE_STEP: f32 = 45.0;
const CLASS_PANEL_HEIGHT: f32 = 30.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
  pub show_confidence: bool,
  pub draw_boxes: bool,
}

impl From<&OverlayConfig> for RenderOptions {
  fn from(config: &OverlayConfig) -> Self {
    Self {
      show_confidence: config.show_confidence,
      draw_boxes: config.draw_boxes,
    }
  }
}

/// 按首次出现顺序累计的各类别数量
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassCounts {
  counts: Vec<(String, usize)>,
}

impl ClassCounts {
  pub fn add(&mut self, label: &str) {
    match self.counts.iter_mut().find(|(name, _)| name == label) {
      Some((_, count)) => *count += 1,
      None => self.counts.push((label.to_string(), 1)),
    }
  }

  pub fn get(&self, label: &str) -> usize {
    self
      .counts
      .iter()
      .find(|(name, _)| name == label)
      .map(|(_, count)| *count)
      .unwrap_or(0)
  }

  pub fn total(&self) -> usize {
    self.counts.iter().map(|(_, count)| count).sum()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
    self.counts.iter().map(|(name, count)| (name.as_str(), *count))
  }

  pub fn is_empty(&self) -> bool {
    self.counts.is_empty()
  }
}

/// 一次渲染的结构化结果，只由输入的检测集合决定
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderReport {
  pub detections: Vec<LoggedDetection>,
  pub counts: ClassCounts,
}

/// 在检测框中心绘制标记点与标签，并在左上角绘制计数面板
#[derive(Debug, Clone, Default)]
pub struct Renderer {
  labels: LabelTable,
  colors: ClassColorMap,
}

impl Renderer {
  pub fn new(labels: LabelTable, colors: ClassColorMap) -> Self {
    Self { labels, colors }
  }

  pub fn labels(&self) -> &LabelTable {
    &self.labels
  }

  pub fn colors(&self) -> &ClassColorMap {
    &self.colors
  }

  fn display_text(&self, label: &str, detection: &Detection, options: RenderOptions) -> String {
    if options.show_confidence {
      format!("{} {:.1}%", label, detection.confidence_percent())
    } else {
      label.to_string()
    }
  }

  /// 清空表面后重绘整个叠加层
  pub fn render<S: Surface + ?Sized>(
    &self,
    surface: &mut S,
    detections: &[Detection],
    options: RenderOptions,
  ) -> RenderReport {
    surface.clear();

    let mut report = RenderReport::default();
    for detection in detections {
      let label = self.labels.label(detection.class_id);
      let color = self.colors.color(detection.class_id);
      let (cx, cy) = detection.bbox.center();

      if options.draw_boxes {
        surface.stroke_rect(
          detection.bbox.x0,
          detection.bbox.y0,
          detection.bbox.width(),
          detection.bbox.height(),
          color,
        );
      }

      surface.fill_circle(cx, cy, MARKER_RADIUS, color);
      let text = self.display_text(&label, detection, options);
      surface.fill_text(
        &text,
        cx,
        cy - LABEL_OFFSET - LABEL_FONT_SIZE,
        LABEL_FONT_SIZE,
        TextAlign::Center,
        color,
      );

      report.counts.add(&label);
      report.detections.push(LoggedDetection {
        class_name: label,
        confidence: detection.confidence_percent(),
      });
    }

    self.draw_counts(surface, &report.counts);
    debug!("渲染 {} 个检测结果", report.detections.len());
    report
  }

  fn draw_counts<S: Surface + ?Sized>(&self, surface: &mut S, counts: &ClassCounts) {
    let total = format!("Total: {}", counts.total());
    let width = surface.measure_text(&total, COUNT_FONT_SIZE);
    surface.fill_rect(
      TOTAL_PANEL_X,
      TOTAL_PANEL_Y,
      width + 20.0,
      TOTAL_PANEL_HEIGHT,
      PANEL_COLOR,
    );
    surface.fill_text(
      &total,
      TOTAL_PANEL_X + 10.0,
      TOTAL_PANEL_Y + 5.0,
      COUNT_FONT_SIZE,
      TextAlign::Left,
      TEXT_COLOR,
    );

    let mut offset_y = CLASS_LINE_START;
    for (label, count) in counts.iter() {
      let text = format!("Class {}: {}", label, count);
      let width = surface.measure_text(&text, COUNT_FONT_SIZE);
      let rect_y = offset_y - 20.0;
      surface.fill_rect(TOTAL_PANEL_X, rect_y, width + 10.0, CLASS_PANEL_HEIGHT, PANEL_COLOR);
      surface.fill_text(
        &text,
        TOTAL_PANEL_X + 5.0,
        rect_y + 3.0,
        COUNT_FONT_SIZE,
        TextAlign::Left,
        TEXT_COLOR,
      );
      offset_y += CLASS_LINE_STEP;
    }
  }
}
