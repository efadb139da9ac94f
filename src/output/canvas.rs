// 该文件是 Kanjian （看见） 项目的一部分。
// src/output/canvas.rs - 基于图像的透明叠加层
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgba, RgbaImage, imageops};
use imageproc::{
  drawing::{
    Blend, draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut,
    text_size,
  },
  rect::Rect,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
  frame::Frame,
  output::{Color, Surface, TextAlign},
};

// 没有字体时估算的平均字符宽度（相对字号）
const ESTIMATED_CHAR_WIDTH: f32 = 0.55;
const TRANSPARENT: Color = Rgba([0, 0, 0, 0]);

#[derive(Error, Debug)]
pub enum CanvasError {
  #[error("字体文件读取错误: {0}")]
  FontIoError(#[from] std::io::Error),
  #[error("无效的字体文件: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 透明 RGBA 叠加层，绘制时做 alpha 混合
pub struct ImageCanvas {
  image: RgbaImage,
  font: Option<FontArc>,
}

impl ImageCanvas {
  pub fn new(width: u32, height: u32) -> Self {
    Self {
      image: RgbaImage::from_pixel(width, height, TRANSPARENT),
      font: None,
    }
  }

  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = Some(font);
    self
  }

  pub fn load_font(path: &Path) -> Result<FontArc, CanvasError> {
    info!("加载字体文件: {}", path.display());
    let data = std::fs::read(path)?;
    Ok(FontArc::try_from_vec(data)?)
  }

  /// 没有加载字体时文字不会被绘制
  pub fn warn_if_fontless(&self) {
    if self.font.is_none() {
      warn!("未配置字体，标签与计数文字将被跳过");
    }
  }

  pub fn image(&self) -> &RgbaImage {
    &self.image
  }

  pub fn into_image(self) -> RgbaImage {
    self.image
  }

  /// 把叠加层合成到背景帧上，背景尺寸不一致时先缩放
  pub fn composite_over(&self, backdrop: &Frame) -> Option<RgbaImage> {
    let mut base = backdrop.to_rgba_image()?;
    if base.dimensions() != self.image.dimensions() {
      base = imageops::resize(
        &base,
        self.image.width(),
        self.image.height(),
        imageops::FilterType::Triangle,
      );
    }
    imageops::overlay(&mut base, &self.image, 0, 0);
    Some(base)
  }

  fn with_blend<F: FnOnce(&mut Blend<RgbaImage>)>(&mut self, draw: F) {
    let mut canvas = Blend(std::mem::take(&mut self.image));
    draw(&mut canvas);
    self.image = canvas.0;
  }
}

fn rect(x: f32, y: f32, width: f32, height: f32) -> Option<Rect> {
  let (w, h) = (width.round(), height.round());
  if w < 1.0 || h < 1.0 {
    return None;
  }
  Some(Rect::at(x.round() as i32, y.round() as i32).of_size(w as u32, h as u32))
}

impl Surface for ImageCanvas {
  fn size(&self) -> (u32, u32) {
    self.image.dimensions()
  }

  fn clear(&mut self) {
    self.image.pixels_mut().for_each(|pixel| *pixel = TRANSPARENT);
  }

  fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Color) {
    let center = (cx.round() as i32, cy.round() as i32);
    let radius = radius.round() as i32;
    self.with_blend(|canvas| draw_filled_circle_mut(canvas, center, radius, color));
  }

  fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color) {
    if let Some(rect) = rect(x, y, width, height) {
      self.with_blend(|canvas| draw_filled_rect_mut(canvas, rect, color));
    }
  }

  fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color) {
    if let Some(rect) = rect(x, y, width, height) {
      self.with_blend(|canvas| draw_hollow_rect_mut(canvas, rect, color));
    }
  }

  fn fill_text(&mut self, text: &str, x: f32, y: f32, font_size: f32, align: TextAlign, color: Color) {
    let Some(font) = self.font.clone() else {
      return;
    };
    let x = match align {
      TextAlign::Left => x,
      TextAlign::Center => x - self.measure_text(text, font_size) / 2.0,
    };
    let scale = PxScale::from(font_size);
    self.with_blend(|canvas| {
      draw_text_mut(canvas, color, x.round() as i32, y.round() as i32, scale, &font, text)
    });
  }

  fn measure_text(&self, text: &str, font_size: f32) -> f32 {
    match &self.font {
      Some(font) => text_size(PxScale::from(font_size), font, text).0 as f32,
      None => text.chars().count() as f32 * font_size * ESTIMATED_CHAR_WIDTH,
    }
  }
}

impl std::fmt::Debug for ImageCanvas {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ImageCanvas")
      .field("size", &self.image.dimensions())
      .field("font", &self.font.is_some())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::PixelLayout;

  #[test]
  fn starts_transparent_and_clears() {
    let mut canvas = ImageCanvas::new(20, 10);
    assert!(canvas.image().pixels().all(|p| p[3] == 0));
    canvas.fill_rect(0.0, 0.0, 5.0, 5.0, Rgba([255, 0, 0, 255]));
    assert_eq!(*canvas.image().get_pixel(2, 2), Rgba([255, 0, 0, 255]));
    canvas.clear();
    assert!(canvas.image().pixels().all(|p| p[3] == 0));
  }

  #[test]
  fn circle_is_drawn_at_center() {
    let mut canvas = ImageCanvas::new(20, 20);
    canvas.fill_circle(10.0, 10.0, 3.0, Rgba([0, 255, 0, 255]));
    assert_eq!(canvas.image().get_pixel(10, 10)[1], 255);
    assert_eq!(canvas.image().get_pixel(0, 0)[3], 0);
  }

  #[test]
  fn translucent_panel_blends_over_opaque_pixels() {
    let mut canvas = ImageCanvas::new(10, 10);
    canvas.fill_rect(0.0, 0.0, 10.0, 10.0, Rgba([255, 255, 255, 255]));
    canvas.fill_rect(0.0, 0.0, 10.0, 10.0, Rgba([0, 0, 0, 153]));
    let pixel = canvas.image().get_pixel(5, 5);
    assert_eq!(pixel[3], 255);
    assert!(pixel[0] > 90 && pixel[0] < 115);
  }

  #[test]
  fn degenerate_rects_are_ignored() {
    let mut canvas = ImageCanvas::new(10, 10);
    canvas.fill_rect(2.0, 2.0, 0.0, 4.0, Rgba([255, 0, 0, 255]));
    canvas.stroke_rect(2.0, 2.0, 4.0, 0.2, Rgba([255, 0, 0, 255]));
    assert!(canvas.image().pixels().all(|p| p[3] == 0));
  }

  #[test]
  fn text_is_skipped_without_font() {
    let mut canvas = ImageCanvas::new(50, 50);
    canvas.fill_text("Person", 25.0, 10.0, 20.0, TextAlign::Center, Rgba([255, 255, 255, 255]));
    assert!(canvas.image().pixels().all(|p| p[3] == 0));
    assert!((canvas.measure_text("abcd", 20.0) - 44.0).abs() < 1e-4);
  }

  #[test]
  fn composite_scales_backdrop_to_overlay() {
    let mut canvas = ImageCanvas::new(4, 4);
    canvas.fill_rect(0.0, 0.0, 1.0, 1.0, Rgba([255, 0, 0, 255]));
    let backdrop = Frame::new(2, 2, PixelLayout::Rgb, vec![0, 0, 200].repeat(4)).unwrap();
    let composite = canvas.composite_over(&backdrop).unwrap();
    assert_eq!(composite.dimensions(), (4, 4));
    assert_eq!(*composite.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
    assert_eq!(*composite.get_pixel(3, 3), Rgba([0, 0, 200, 255]));
  }
}
