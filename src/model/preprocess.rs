// 该文件是 Kanjian （看见） 项目的一部分。
// src/model/preprocess.rs - 输入预处理
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

use image::imageops::{self, FilterType};
use tracing::debug;

use crate::{
  config::ModelResolution,
  frame::{Frame, FrameError, Tensor},
};

pub const INPUT_TENSOR_NAME: &str = "images";

const RGB_CHANNELS: usize = 3;

/// 将采集帧缩放并归一化为 `[1, 3, W, H]` 的平面张量
///
/// 缩放使用最近邻采样。每个通道平面内按行优先存放，
/// 即 `(x, y)` 位于 `y * W + x`。数值除以 255 归一化到 `[0, 1]`。
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
  resolution: ModelResolution,
}

impl Preprocessor {
  pub fn new(resolution: ModelResolution) -> Self {
    Self { resolution }
  }

  pub fn resolution(&self) -> ModelResolution {
    self.resolution
  }

  pub fn preprocess(&self, frame: &Frame) -> Result<Tensor, FrameError> {
    let invalid = FrameError::InvalidFrame {
      width: frame.width(),
      height: frame.height(),
    };
    if frame.is_empty() {
      return Err(invalid);
    }
    let rgb = frame.to_rgb_image().ok_or(invalid)?;

    let (width, height) = (self.resolution.width(), self.resolution.height());
    let resized = if rgb.dimensions() == (width, height) {
      rgb
    } else {
      imageops::resize(&rgb, width, height, FilterType::Nearest)
    };

    let plane = width as usize * height as usize;
    let mut data = vec![0f32; RGB_CHANNELS * plane];
    for (x, y, pixel) in resized.enumerate_pixels() {
      let idx = y as usize * width as usize + x as usize;
      for c in 0..RGB_CHANNELS {
        data[c * plane + idx] = pixel[c] as f32 / 255.0;
      }
    }

    debug!(
      "预处理完成: {}x{} -> [1, 3, {}, {}]",
      frame.width(),
      frame.height(),
      width,
      height
    );

    Tensor::new(
      INPUT_TENSOR_NAME,
      vec![1, RGB_CHANNELS, width as usize, height as usize],
      data,
    )
  }
}
