// 该文件是 Kanjian （看见） 项目的一部分。
// src/output.rs - 显示表面与输出定义
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

pub type Color = image::Rgba<u8>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
  Left,
  Center,
}

/// 叠加层绘制表面，坐标为显示像素
///
/// 文本的 `y` 是文字顶部；`TextAlign::Center` 时 `x` 是文字水平中心。
pub trait Surface {
  fn size(&self) -> (u32, u32);
  fn clear(&mut self);
  fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Color);
  fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color);
  fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color);
  fn fill_text(&mut self, text: &str, x: f32, y: f32, font_size: f32, align: TextAlign, color: Color);
  fn measure_text(&self, text: &str, font_size: f32) -> f32;
}

mod log;
pub use self::log::{DetectionLog, DetectionLogEntry, LogRecord, LogSink, LoggedDetection, TracingLogSink};

mod overlay;
pub use self::overlay::{ClassCounts, RenderOptions, RenderReport, Renderer};

#[cfg(feature = "save_image_file")]
mod canvas;
#[cfg(feature = "save_image_file")]
pub use self::canvas::{CanvasError, ImageCanvas};

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};
