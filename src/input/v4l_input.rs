// 该文件是 Kanjian （看见） 项目的一部分。
// src/input/v4l_input.rs - V4L 摄像头输入
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

use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, PixelLayout},
};

const DEFAULT_DEVICE: &str = "/dev/video0";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;

#[derive(Error, Debug)]
pub enum V4lInputError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch { expected: String, actual: String },
  #[error("V4L 错误: {0}")]
  V4lError(String),
  #[error("不支持的像素格式: {0}")]
  UnsupportedPixelFormat(String),
  #[error("YUYV 缓冲区过短: 期望 {expected} 字节, 实际 {actual} 字节")]
  ShortBuffer { expected: usize, actual: usize },
}

fn v4l_error(e: std::io::Error) -> V4lInputError {
  V4lInputError::V4lError(e.to_string())
}

/// YUYV 摄像头，打开后保持同一个 mmap 采集流
pub struct V4lInput {
  stream: Stream<'static>,
  width: u32,
  height: u32,
}

impl FromUrlWithScheme for V4lInput {
  const SCHEME: &'static str = "v4l";
}

impl FromUrl for V4lInput {
  type Error = V4lInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(V4lInputError::SchemeMismatch {
        expected: Self::SCHEME.to_string(),
        actual: url.scheme().to_string(),
      });
    }

    // v4l:///dev/video0
    let device_path = if url.path().is_empty() || url.path() == "/" {
      DEFAULT_DEVICE.to_string()
    } else {
      url.path().to_string()
    };

    info!("打开摄像头: {}", device_path);
    let device = Device::with_path(&device_path).map_err(v4l_error)?;

    let mut format = device.format().map_err(v4l_error)?;
    format.width = DEFAULT_WIDTH;
    format.height = DEFAULT_HEIGHT;
    format.fourcc = FourCC::new(b"YUYV");
    let format = device.set_format(&format).map_err(v4l_error)?;
    if format.fourcc != FourCC::new(b"YUYV") {
      return Err(V4lInputError::UnsupportedPixelFormat(format.fourcc.to_string()));
    }
    debug!("摄像头格式: {}x{} {}", format.width, format.height, format.fourcc);

    // 流需要设备活得和它一样久，输入源在进程内只打开一次
    let device: &'static Device = Box::leak(Box::new(device));
    let stream = Stream::with_buffers(device, Type::VideoCapture, 4).map_err(v4l_error)?;

    Ok(V4lInput {
      stream,
      width: format.width,
      height: format.height,
    })
  }
}

impl V4lInput {
  fn capture_frame(&mut self) -> Result<Frame, V4lInputError> {
    let (buf, _meta) = self.stream.next().map_err(v4l_error)?;

    let rgb = yuyv_to_rgb(buf, self.width, self.height)?;
    Frame::new(self.width, self.height, PixelLayout::Rgb, rgb)
      .map_err(|e| V4lInputError::V4lError(e.to_string()))
  }
}

impl Iterator for V4lInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    match self.capture_frame() {
      Ok(frame) => Some(frame),
      Err(e) => {
        error!("采集帧失败: {}", e);
        None
      }
    }
  }
}

/// YUYV 4:2:2 转 RGB，多余的字节被忽略
fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, V4lInputError> {
  let pixels = (width * height) as usize;
  let expected = pixels * 2;
  if yuyv.len() < expected {
    return Err(V4lInputError::ShortBuffer {
      expected,
      actual: yuyv.len(),
    });
  }
  let mut rgb = Vec::with_capacity(pixels * 3);

  for chunk in yuyv[..expected].chunks_exact(4) {
    let u = chunk[1] as f32 - 128.0;
    let v = chunk[3] as f32 - 128.0;
    for y in [chunk[0] as f32, chunk[2] as f32] {
      let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgb.extend_from_slice(&[r, g, b]);
    }
  }

  Ok(rgb)
}
