// 该文件是 Kanjian （看见） 项目的一部分。
// src/frame.rs - 帧与张量定义
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

use image::{RgbImage, RgbaImage};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
  #[error("无效帧: {width}x{height}")]
  InvalidFrame { width: u32, height: u32 },
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("张量形状 {shape:?} 与数据长度 {len} 不匹配")]
  ShapeMismatch { shape: Vec<usize>, len: usize },
}

/// 像素交织格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
  Rgb,
  Rgba,
}

impl PixelLayout {
  pub fn channels(self) -> usize {
    match self {
      PixelLayout::Rgb => 3,
      PixelLayout::Rgba => 4,
    }
  }
}

/// 采集得到的一帧原始像素，按行优先、像素交织存放
#[derive(Debug, Clone)]
pub struct Frame {
  width: u32,
  height: u32,
  layout: PixelLayout,
  data: Box<[u8]>,
}

impl Frame {
  pub fn new(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> Result<Self, FrameError> {
    let expected = layout.channels() * width as usize * height as usize;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      width,
      height,
      layout,
      data: data.into_boxed_slice(),
    })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn layout(&self) -> PixelLayout {
    self.layout
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.data
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }

  /// 水平翻转，用于前置摄像头
  pub fn mirrored(&self) -> Frame {
    let channels = self.layout.channels();
    let row_len = self.width as usize * channels;
    let mut data = Vec::with_capacity(self.data.len());
    if row_len > 0 {
      for row in self.data.chunks_exact(row_len) {
        for pixel in row.chunks_exact(channels).rev() {
          data.extend_from_slice(pixel);
        }
      }
    }

    Frame {
      width: self.width,
      height: self.height,
      layout: self.layout,
      data: data.into_boxed_slice(),
    }
  }

  /// 丢弃 alpha 通道，转为 RGB 图像
  pub fn to_rgb_image(&self) -> Option<RgbImage> {
    let data = match self.layout {
      PixelLayout::Rgb => self.data.to_vec(),
      PixelLayout::Rgba => self
        .data
        .chunks_exact(4)
        .flat_map(|pixel| [pixel[0], pixel[1], pixel[2]])
        .collect(),
    };
    RgbImage::from_raw(self.width, self.height, data)
  }

  pub fn to_rgba_image(&self) -> Option<RgbaImage> {
    let data = match self.layout {
      PixelLayout::Rgba => self.data.to_vec(),
      PixelLayout::Rgb => self
        .data
        .chunks_exact(3)
        .flat_map(|pixel| [pixel[0], pixel[1], pixel[2], u8::MAX])
        .collect(),
    };
    RgbaImage::from_raw(self.width, self.height, data)
  }
}

impl From<RgbImage> for Frame {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      width,
      height,
      layout: PixelLayout::Rgb,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}

impl From<RgbaImage> for Frame {
  fn from(image: RgbaImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      width,
      height,
      layout: PixelLayout::Rgba,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}

/// 与推理引擎交换的 float32 张量
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
  name: String,
  shape: Vec<usize>,
  data: Box<[f32]>,
}

impl Tensor {
  pub fn new(name: impl Into<String>, shape: Vec<usize>, data: Vec<f32>) -> Result<Self, FrameError> {
    let expected: usize = shape.iter().product();
    if expected != data.len() {
      return Err(FrameError::ShapeMismatch {
        shape,
        len: data.len(),
      });
    }

    Ok(Self {
      name: name.into(),
      shape,
      data: data.into_boxed_slice(),
    })
  }

  /// 形状为 `[1, N]` 的扁平张量
  pub fn from_flat(name: impl Into<String>, data: Vec<f32>) -> Self {
    Self {
      name: name.into(),
      shape: vec![1, data.len()],
      data: data.into_boxed_slice(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn shape(&self) -> &[usize] {
    &self.shape
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }
}
